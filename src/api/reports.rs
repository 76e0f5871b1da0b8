use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_description, validate_location};
use crate::db::{CancelReportQuery, CreateReportRequest, ReportResponse, UpdateReportStatusRequest};
use crate::ledger::StatusChange;
use crate::session::Caller;
use crate::AppState;

/// Every report, newest first
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ReportResponse>>, ApiError> {
    let reports = state.ledger.list_reports().await?;
    Ok(Json(reports.into_iter().map(ReportResponse::from).collect()))
}

pub async fn create_report(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateReportRequest>,
) -> Result<(StatusCode, Json<ReportResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("description", validate_description(&req.description));
    errors.check("location", validate_location(&req.location));
    errors.finish()?;

    let report = state
        .ledger
        .create_report(&caller, &req.description, req.location)
        .await?;

    Ok((StatusCode::CREATED, Json(ReportResponse::from(report))))
}

/// Resolve or reject a report (admin)
pub async fn update_report_status(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(req): Json<UpdateReportStatusRequest>,
) -> Result<Json<StatusChange>, ApiError> {
    let change = state
        .ledger
        .update_report_status(&caller, &id, req.status, req.user_id.as_deref())
        .await?;
    Ok(Json(change))
}

/// Withdraw one of the caller's pending reports.
/// `?user_id=` is optional and must name the caller when present.
pub async fn cancel_report(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
    Query(query): Query<CancelReportQuery>,
) -> Result<StatusCode, ApiError> {
    let caller_id = query.user_id.unwrap_or_else(|| caller.id.clone());
    state.ledger.cancel_report(&caller, &id, &caller_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
