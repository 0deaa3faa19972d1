//! Documentation of the Lupad ride-hailing API server.
//!
//!
//!
//! # General Infrastructure
//! - Mobile apps (customer and driver) talk JSON over HTTP under `/api`
//! - Live updates go over a single WebSocket at `/ws`
//! - Redis holds everything: accounts, driver profiles, OTPs, pending signups,
//!   revoked tokens, driver availability and last known positions
//! - `STORE_BACKEND=memory` swaps Redis for in-process maps, for local runs and tests
//!
//!
//!
//! # Accounts
//!
//! **Customers** are phone-only. Registration and every sign-in go through a 6 digit
//! SMS code. **Drivers** register with a password and a vehicle, prove their phone once
//! with a code, and sign in with the password afterwards. A driver cannot go online
//! until an operator marks them verified (`admin verify-driver`).
//!
//! See [`auth`] for the flows and [`database`] for the key layout.
//!
//!
//!
//! # Notes
//!
//! ## Redis as the database
//! The data is small and every lookup is by id or phone, so plain keys with JSON values
//! are enough. The phone index is claimed with `SET NX`, which is what keeps two
//! signups for the same number from both landing.
//!
//! ## Tokens
//! Access tokens last 15 minutes, refresh tokens 7 days. Both are HS256 with separate
//! secrets. Revocation is a `revoked:{jti}` key that lives exactly as long as the
//! token would have.
//!
//!
//!
//! # Setup
//!
//! Run against a local Redis.
//! ```sh
//! REDIS_URL=redis://127.0.0.1:6379 cargo run -p lupad
//! ```
//!
//! Run without Redis.
//! ```sh
//! STORE_BACKEND=memory cargo run -p lupad
//! ```
//!
//! JSON logs.
//! ```sh
//! LOG_FORMAT=json RUST_LOG=server=debug,tower_http=debug cargo run -p lupad
//! ```
//!
//!
//!
//! # Tooling
//!
//! Mark a driver verified.
//! ```sh
//! cargo run -p admin -- verify-driver 09171234567
//! ```
//!
//! End-to-end smoke run against a live server.
//! ```sh
//! BASE_URL=http://localhost:3000 cargo run -p tester
//! ```
use std::sync::Arc;

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod drivers;
pub mod error;
pub mod models;
pub mod routes;
pub mod sms;
pub mod socket;
pub mod state;
pub mod store;
pub mod users;
pub mod utils;
pub mod validation;

use config::{Config, LogFormat};
use routes::build_router;
use state::AppState;

pub async fn start_server() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config).await?;

    info!("Starting server...");
    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Lupad API Server running on {address}");

    serve(listener, state).await?;

    info!("Server shut down");
    Ok(())
}

pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

/// Runs before [`Config::load`] so its warnings are not lost.
fn init_tracing() {
    let format = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(LogFormat::Pretty);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("server=info,tower_http=info"));

    match format {
        LogFormat::Json => fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
