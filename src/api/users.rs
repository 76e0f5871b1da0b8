use axum::{extract::State, Json};
use std::sync::Arc;

use super::error::ApiError;
use crate::db::UserWithReportCount;
use crate::session::Caller;
use crate::AppState;

/// Every account with its report count (admin)
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Vec<UserWithReportCount>>, ApiError> {
    Ok(Json(state.ledger.list_users(&caller).await?))
}
