use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_image_url, validate_points, validate_reward_name};
use crate::db::{
    CreateRewardRequest, RedeemResponse, RewardResponse, UpdateRewardRequest, UserReward,
};
use crate::ledger::LedgerError;
use crate::session::Caller;
use crate::AppState;

/// Reward catalog, cheapest first
pub async fn list_rewards(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RewardResponse>>, ApiError> {
    let rewards = state.ledger.list_rewards().await?;
    Ok(Json(rewards.into_iter().map(RewardResponse::from).collect()))
}

pub async fn create_reward(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateRewardRequest>,
) -> Result<(StatusCode, Json<RewardResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_reward_name(&req.name));
    errors.check("points_required", validate_points(req.points_required));
    errors.check("image_url", validate_image_url(&req.image_url));
    errors.finish()?;

    let reward = state.ledger.create_reward(&caller, req).await?;
    Ok((StatusCode::CREATED, Json(RewardResponse::from(reward))))
}

pub async fn update_reward(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(req): Json<UpdateRewardRequest>,
) -> Result<Json<RewardResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &req.name {
        errors.check("name", validate_reward_name(name));
    }
    if let Some(points) = req.points_required {
        errors.check("points_required", validate_points(points));
    }
    errors.check("image_url", validate_image_url(&req.image_url));
    errors.finish()?;

    let reward = state.ledger.update_reward(&caller, &id, req).await?;
    Ok(Json(RewardResponse::from(reward)))
}

pub async fn delete_reward(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.ledger.delete_reward(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Redeem a reward for the caller.
///
/// Answers `{"success": bool}` in every outcome the client can act on:
/// 200 on success, 409 when the balance is short, 404 for an unknown reward.
pub async fn redeem_reward(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match state.ledger.redeem_reward(&caller, &id).await {
        Ok(redemption) => Ok(redeemed(StatusCode::OK, Some(redemption))),
        Err(LedgerError::InsufficientPoints { balance, required }) => {
            tracing::info!(user_id = %caller.id, reward_id = %id, balance, required, "Redemption refused");
            Ok(redeemed(StatusCode::CONFLICT, None))
        }
        Err(LedgerError::NotFound(_)) => Ok(redeemed(StatusCode::NOT_FOUND, None)),
        Err(e) => Err(e.into()),
    }
}

fn redeemed(status: StatusCode, redemption: Option<UserReward>) -> Response {
    let body = RedeemResponse {
        success: redemption.is_some(),
        redemption,
    };
    (status, Json(body)).into_response()
}

/// The caller's redemption history
pub async fn my_rewards(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Vec<UserReward>>, ApiError> {
    Ok(Json(state.ledger.list_user_rewards(&caller).await?))
}
