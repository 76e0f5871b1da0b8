pub mod auth;
pub mod error;
mod geo;
pub mod rate_limit;
mod reports;
mod rewards;
mod users;
pub mod validation;
mod ws;

use axum::{
    http::{header, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let authenticated = || middleware::from_fn_with_state(state.clone(), auth::auth_middleware);
    let api_limited = || middleware::from_fn_with_state(state.clone(), rate_limit::rate_limit_api);

    // Credential exchange (public, strict rate tier)
    let credential_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    let session_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .layer(authenticated())
        .layer(api_limited());

    // Protected API routes
    let api_routes = Router::new()
        // Reports
        .route("/reports", get(reports::list_reports))
        .route("/reports", post(reports::create_report))
        .route("/reports/:id", delete(reports::cancel_report))
        .route("/reports/:id/status", put(reports::update_report_status))
        // Rewards
        .route("/rewards", get(rewards::list_rewards))
        .route("/rewards", post(rewards::create_reward))
        .route("/rewards/:id", put(rewards::update_reward))
        .route("/rewards/:id", delete(rewards::delete_reward))
        .route("/rewards/:id/redeem", post(rewards::redeem_reward))
        .route("/me/rewards", get(rewards::my_rewards))
        // Users
        .route("/users", get(users::list_users))
        // Geo lookups
        .route("/geo/provinces", get(geo::provinces))
        .route("/geo/regencies/:id", get(geo::regencies))
        .route("/geo/districts/:id", get(geo::districts))
        .route("/geo/villages/:id", get(geo::villages))
        .route("/geo/geocode", get(geo::geocode))
        .layer(authenticated())
        .layer(api_limited())
        // The feed socket authenticates from its query string
        .route("/feeds/ws", get(ws::feeds_ws));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", credential_routes.merge(session_routes))
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
