use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::State,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Utc;
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth::handlers as auth, drivers, socket::ws_handler, state::AppState, users};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .nest("/api", api_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn api_router() -> Router<Arc<AppState>> {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/verify-otp", post(auth::verify_registration))
        .route("/login", post(auth::login))
        .route("/login/otp", post(auth::login_with_otp))
        .route("/otp/request", post(auth::request_otp))
        .route("/otp/verify", post(auth::verify_otp))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let user_routes = Router::new()
        .route(
            "/me",
            get(users::get_me)
                .put(users::update_me)
                .delete(users::delete_me),
        )
        .route("/{id}", get(users::get_user_by_id));

    let driver_routes = Router::new()
        .route("/me", get(drivers::get_me).put(drivers::update_me))
        .route("/me/vehicle", put(drivers::update_vehicle))
        .route("/me/status", put(drivers::update_availability))
        .route("/me/stats", get(drivers::get_stats))
        .route("/{id}", get(drivers::get_driver_by_id));

    Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/drivers", driver_routes)
}

pub async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "Lupad API Server",
        "version": VERSION,
    }))
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "connections": state.hub.connections(),
    }))
}
