//! Region hierarchy lookups and address geocoding.
//!
//! Both services are third-party and read-only. Lookup failures are logged
//! and degrade to an empty list or `None`; they never fail a request.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GeoConfig;

/// One administrative region (province, regency, district or village)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub name: String,
}

/// Source of the province > regency > district > village hierarchy
#[async_trait]
pub trait RegionDirectory: Send + Sync {
    async fn provinces(&self) -> Vec<Region>;
    async fn regencies(&self, province_id: &str) -> Vec<Region>;
    async fn districts(&self, regency_id: &str) -> Vec<Region>;
    async fn villages(&self, district_id: &str) -> Vec<Region>;
}

/// Free-text address to coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Returns `(lat, lng)` of the best match
    async fn geocode(&self, address: &str) -> Option<(f64, f64)>;
}

/// Region ids are short decimal codes
pub fn is_region_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 20 && id.bytes().all(|b| b.is_ascii_digit())
}

fn build_client(config: &GeoConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .context("Failed to build HTTP client")
}

/// Region directory backed by a static JSON API laid out as
/// `{base}/provinces.json`, `{base}/regencies/{id}.json` and so on.
pub struct HttpRegionDirectory {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRegionDirectory {
    pub fn new(config: &GeoConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.region_base_url.trim_end_matches('/').to_string(),
            client: build_client(config)?,
        })
    }

    async fn get(&self, path: &str) -> Result<Vec<Region>> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach region service")?;

        if !response.status().is_success() {
            anyhow::bail!("Region service error: {}", response.status());
        }

        response
            .json()
            .await
            .context("Failed to parse region service response")
    }

    async fn list(&self, path: &str) -> Vec<Region> {
        match self.get(path).await {
            Ok(regions) => {
                debug!(path = %path, count = regions.len(), "Fetched regions");
                regions
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Region lookup failed");
                Vec::new()
            }
        }
    }

    /// Children of `parent_id` at `level`
    async fn children(&self, level: &str, parent_id: &str) -> Vec<Region> {
        if !is_region_id(parent_id) {
            warn!(parent_id = %parent_id, "Rejected malformed id for {} lookup", level);
            return Vec::new();
        }
        self.list(&format!("{}/{}.json", level, parent_id)).await
    }
}

#[async_trait]
impl RegionDirectory for HttpRegionDirectory {
    async fn provinces(&self) -> Vec<Region> {
        self.list("provinces.json").await
    }

    async fn regencies(&self, province_id: &str) -> Vec<Region> {
        self.children("regencies", province_id).await
    }

    async fn districts(&self, regency_id: &str) -> Vec<Region> {
        self.children("districts", regency_id).await
    }

    async fn villages(&self, district_id: &str) -> Vec<Region> {
        self.children("villages", district_id).await
    }
}

/// Nominatim search result. Coordinates arrive as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl Place {
    fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.lat.parse().ok()?, self.lon.parse().ok()?))
    }
}

pub struct NominatimGeocoder {
    search_url: String,
    client: reqwest::Client,
}

impl NominatimGeocoder {
    pub fn new(config: &GeoConfig) -> Result<Self> {
        Ok(Self {
            search_url: config.geocoder_url.clone(),
            client: build_client(config)?,
        })
    }

    async fn search(&self, address: &str) -> Result<Vec<Place>> {
        let response = self
            .client
            .get(&self.search_url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .context("Failed to reach geocoder")?;

        if !response.status().is_success() {
            anyhow::bail!("Geocoder error: {}", response.status());
        }

        response.json().await.context("Failed to parse geocoder response")
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Option<(f64, f64)> {
        match self.search(address).await {
            Ok(places) => places.first().and_then(Place::coordinates),
            Err(e) => {
                warn!(address = %address, error = %e, "Geocoding failed");
                None
            }
        }
    }
}

/// Cascading address pick. Choosing a level clears every level below it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressSelection {
    province: Option<String>,
    city: Option<String>,
    district: Option<String>,
    village: Option<String>,
}

impl AddressSelection {
    pub fn select_province(&mut self, name: impl Into<String>) {
        self.province = Some(name.into());
        self.city = None;
        self.district = None;
        self.village = None;
    }

    pub fn select_city(&mut self, name: impl Into<String>) {
        self.city = Some(name.into());
        self.district = None;
        self.village = None;
    }

    pub fn select_district(&mut self, name: impl Into<String>) {
        self.district = Some(name.into());
        self.village = None;
    }

    pub fn select_village(&mut self, name: impl Into<String>) {
        self.village = Some(name.into());
    }

    pub fn is_complete(&self) -> bool {
        self.province.is_some()
            && self.city.is_some()
            && self.district.is_some()
            && self.village.is_some()
    }

    /// `"village, district, city, province"` once all four levels are chosen
    pub fn full_address(&self) -> Option<String> {
        Some(format!(
            "{}, {}, {}, {}",
            self.village.as_deref()?,
            self.district.as_deref()?,
            self.city.as_deref()?,
            self.province.as_deref()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection() -> AddressSelection {
        let mut sel = AddressSelection::default();
        sel.select_province("JAWA BARAT");
        sel.select_city("KOTA BANDUNG");
        sel.select_district("COBLONG");
        sel.select_village("DAGO");
        sel
    }

    #[test]
    fn test_full_address_order() {
        assert_eq!(
            selection().full_address().as_deref(),
            Some("DAGO, COBLONG, KOTA BANDUNG, JAWA BARAT")
        );
    }

    #[test]
    fn test_selecting_a_level_clears_below() {
        let mut sel = selection();
        sel.select_city("KABUPATEN BANDUNG");
        assert!(!sel.is_complete());
        assert!(sel.full_address().is_none());

        sel.select_district("CILEUNYI");
        sel.select_village("CIBIRU WETAN");
        assert_eq!(
            sel.full_address().as_deref(),
            Some("CIBIRU WETAN, CILEUNYI, KABUPATEN BANDUNG, JAWA BARAT")
        );

        sel.select_province("BANTEN");
        assert_eq!(sel, {
            let mut only = AddressSelection::default();
            only.select_province("BANTEN");
            only
        });
    }

    #[test]
    fn test_region_ids_are_decimal_codes() {
        assert!(is_region_id("32"));
        assert!(is_region_id("3273010001"));
        assert!(!is_region_id(""));
        assert!(!is_region_id("../provinces"));
        assert!(!is_region_id("32.json"));
        assert!(!is_region_id("123456789012345678901"));
    }

    #[test]
    fn test_region_ignores_extra_fields() {
        let json = r#"[{"id":"3273","province_id":"32","name":"KOTA BANDUNG"}]"#;
        let regions: Vec<Region> = serde_json::from_str(json).unwrap();
        assert_eq!(
            regions,
            vec![Region {
                id: "3273".to_string(),
                name: "KOTA BANDUNG".to_string()
            }]
        );
    }

    #[test]
    fn test_place_coordinates_parse_strings() {
        let places: Vec<Place> =
            serde_json::from_str(r#"[{"lat":"-6.8845","lon":"107.6132","display_name":"Dago"}]"#)
                .unwrap();
        assert_eq!(places[0].coordinates(), Some((-6.8845, 107.6132)));

        let bad = Place {
            lat: "north".to_string(),
            lon: "107".to_string(),
        };
        assert_eq!(bad.coordinates(), None);
    }

    #[tokio::test]
    async fn test_unreachable_services_degrade() {
        let config = GeoConfig {
            region_base_url: "http://127.0.0.1:9".to_string(),
            geocoder_url: "http://127.0.0.1:9/search".to_string(),
            timeout_secs: 1,
            ..GeoConfig::default()
        };

        let regions = HttpRegionDirectory::new(&config).unwrap();
        assert!(regions.provinces().await.is_empty());

        let geocoder = NominatimGeocoder::new(&config).unwrap();
        assert_eq!(geocoder.geocode("DAGO, COBLONG").await, None);
    }
}
