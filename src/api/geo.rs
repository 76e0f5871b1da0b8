//! Region lookups and geocoding for the report form.
//!
//! Upstream failures surface as an empty list or `"location": null`.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use super::validation::validate_region_id;
use crate::geo::{AddressSelection, Region};
use crate::AppState;

pub async fn provinces(State(state): State<Arc<AppState>>) -> Json<Vec<Region>> {
    Json(state.regions.provinces().await)
}

fn check_region_id(id: &str, field: &str) -> Result<(), ApiError> {
    validate_region_id(id, field).map_err(|message| ApiError::validation_field(field, message))
}

pub async fn regencies(
    State(state): State<Arc<AppState>>,
    Path(province_id): Path<String>,
) -> Result<Json<Vec<Region>>, ApiError> {
    check_region_id(&province_id, "province_id")?;
    Ok(Json(state.regions.regencies(&province_id).await))
}

pub async fn districts(
    State(state): State<Arc<AppState>>,
    Path(regency_id): Path<String>,
) -> Result<Json<Vec<Region>>, ApiError> {
    check_region_id(&regency_id, "regency_id")?;
    Ok(Json(state.regions.districts(&regency_id).await))
}

pub async fn villages(
    State(state): State<Arc<AppState>>,
    Path(district_id): Path<String>,
) -> Result<Json<Vec<Region>>, ApiError> {
    check_region_id(&district_id, "district_id")?;
    Ok(Json(state.regions.villages(&district_id).await))
}

#[derive(Debug, Deserialize)]
pub struct GeocodeQuery {
    pub province: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub village: Option<String>,
}

impl GeocodeQuery {
    fn selection(&self) -> AddressSelection {
        let mut selection = AddressSelection::default();
        let levels = [&self.province, &self.city, &self.district, &self.village];
        for (depth, level) in levels.into_iter().enumerate() {
            let Some(name) = level.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
                break;
            };
            match depth {
                0 => selection.select_province(name),
                1 => selection.select_city(name),
                2 => selection.select_district(name),
                _ => selection.select_village(name),
            }
        }
        selection
    }
}

#[derive(Debug, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize)]
pub struct GeocodeResponse {
    pub full_address: String,
    pub location: Option<LatLng>,
}

/// GET /api/geo/geocode?province=&city=&district=&village=
pub async fn geocode(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GeocodeQuery>,
) -> Result<Json<GeocodeResponse>, ApiError> {
    let full_address = query.selection().full_address().ok_or_else(|| {
        ApiError::validation_field("address", "Province, city, district and village are required")
    })?;

    let location = state
        .geocoder
        .geocode(&full_address)
        .await
        .map(|(lat, lng)| LatLng { lat, lng });

    Ok(Json(GeocodeResponse {
        full_address,
        location,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(levels: [Option<&str>; 4]) -> GeocodeQuery {
        let [province, city, district, village] = levels.map(|l| l.map(str::to_string));
        GeocodeQuery {
            province,
            city,
            district,
            village,
        }
    }

    #[test]
    fn test_complete_query_builds_full_address() {
        let q = query([Some("JAWA BARAT"), Some("KOTA BANDUNG"), Some(" COBLONG "), Some("DAGO")]);
        assert_eq!(
            q.selection().full_address().as_deref(),
            Some("DAGO, COBLONG, KOTA BANDUNG, JAWA BARAT")
        );
    }

    #[test]
    fn test_gap_in_query_leaves_address_incomplete() {
        let q = query([Some("JAWA BARAT"), None, Some("COBLONG"), Some("DAGO")]);
        assert!(q.selection().full_address().is_none());

        let q = query([Some("JAWA BARAT"), Some("KOTA BANDUNG"), Some(""), Some("DAGO")]);
        assert!(!q.selection().is_complete());
    }
}
