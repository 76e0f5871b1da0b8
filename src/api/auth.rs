use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_password, validate_username};
use crate::db::{LoginRequest, LoginResponse, RegisterRequest, UserResponse};
use crate::session::Caller;
use crate::AppState;

/// Bearer token from `Authorization`, `X-API-Key` or a `token` query
/// parameter (for WebSocket clients, which cannot set headers)
pub fn extract_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(header) = headers.get("Authorization").and_then(|h| h.to_str().ok()) {
        let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    if let Some(api_key) = headers.get("X-API-Key").and_then(|h| h.to_str().ok()) {
        return Some(api_key.to_string());
    }

    uri.query().and_then(|q| {
        q.split('&').find_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next()?;
            if key == "token" && !value.is_empty() {
                Some(value.to_string())
            } else {
                None
            }
        })
    })
}

async fn resolve_caller(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
) -> Result<Caller, ApiError> {
    let token = extract_token(headers, uri)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    state
        .sessions
        .resolve(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))
}

/// Create an account. Failures are reported without their cause.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("username", validate_username(&request.username));
    errors.check("email", validate_email(&request.email));
    errors.check("password", validate_password(&request.password));
    errors.finish()?;

    if state
        .sessions
        .register(&request.username, &request.email, &request.password)
        .await
    {
        Ok((StatusCode::CREATED, Json(json!({ "success": true }))))
    } else {
        Err(ApiError::bad_request("Registration failed"))
    }
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    state
        .sessions
        .login(&request.email, &request.password)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))
}

/// End the session behind the presented token. Its live feeds are closed.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = extract_token(&headers, &uri)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let removed = state.sessions.logout(&token).await?;
    Ok(Json(json!({ "success": removed })))
}

/// Current profile, read fresh for this request
pub async fn me(caller: Caller) -> Json<UserResponse> {
    Json(caller.profile())
}

/// Resolve the session and attach the [`Caller`] to the request
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = resolve_caller(&state, request.headers(), request.uri()).await?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// Extractor for the authenticated caller. Uses the caller attached by
/// [`auth_middleware`] when present, otherwise resolves the token itself.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(caller) = parts.extensions.get::<Caller>() {
            return Ok(caller.clone());
        }
        resolve_caller(state, &parts.headers, &parts.uri).await
    }
}
