//! Realtime channel.
//!
//! One socket per signed-in client at `/ws`. Every socket receives what is
//! published on the [`SocketHub`]. Drivers push their position up the same
//! socket; it is kept for a couple of minutes and fanned out to everyone.
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::SplitSink,
};
use lupad_types::{Coordinates, SocketEvent, SocketMessage, UserType};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    auth::{AuthUser, authenticate, bearer_token, tokens::is_revoked},
    cache::put_json,
    database::keys,
    error::AppError,
    models::Driver,
    state::AppState,
    store::StoreError,
};

const HUB_CAPACITY: usize = 256;
pub const LOCATION_TTL: Duration = Duration::from_secs(120);
pub const SESSION_ENDED: &str = "Session is no longer valid";

pub struct SocketHub {
    sender: broadcast::Sender<SocketMessage>,
    connections: AtomicUsize,
}

impl SocketHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(HUB_CAPACITY);

        Self {
            sender,
            connections: AtomicUsize::new(0),
        }
    }

    /// Returns how many sockets will see the message.
    pub fn publish(&self, message: SocketMessage) -> usize {
        // Err only means nobody is listening
        self.sender.send(message).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SocketMessage> {
        self.sender.subscribe()
    }

    pub fn connect(&self) -> ConnectionGuard<'_> {
        self.connections.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard(&self.connections)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }
}

impl Default for SocketHub {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ConnectionGuard<'a>(&'a AtomicUsize);

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct SocketParams {
    pub token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<SocketParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let token = params
        .token
        .filter(|token| !token.is_empty())
        .or_else(|| bearer_token(&headers))
        .ok_or_else(|| AppError::unauthorized("No token provided"))?;

    let auth = authenticate(&state, &token).await?;

    Ok(ws.on_upgrade(move |socket| serve_socket(socket, state, auth)))
}

async fn serve_socket(socket: WebSocket, state: Arc<AppState>, auth: AuthUser) {
    let _connection = state.hub.connect();
    let user_id = auth.user.id;

    info!(%user_id, user_type = auth.user.user_type.as_str(), "Socket connected");

    let (mut sink, mut stream) = socket.split();
    let mut events = state.hub.subscribe();

    let ready = SocketMessage::new(
        SocketEvent::ConnectionReady,
        json!({ "userId": user_id, "userType": auth.user.user_type }),
    );

    if send(&mut sink, &ready).await.is_ok() {
        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_frame(&state, &auth, text.as_str()).await {
                            if send(&mut sink, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        if send(&mut sink, &error_event("Binary frames are not supported")).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(%user_id, "Socket read failed: {e}");
                        break;
                    }
                },
                event = events.recv() => match event {
                    Ok(message) => {
                        if send(&mut sink, &message).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%user_id, skipped, "Socket fell behind, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }

    info!(%user_id, "Socket disconnected");
}

async fn send(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &SocketMessage,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).map_err(axum::Error::new)?;

    sink.send(Message::Text(text.into())).await
}

pub fn error_event(message: &str) -> SocketMessage {
    SocketMessage::new(SocketEvent::Error, json!({ "message": message }))
}

/// Handles one text frame. Returns the reply meant only for the sender.
pub async fn handle_frame(state: &AppState, auth: &AuthUser, text: &str) -> Option<SocketMessage> {
    let Ok(message) = serde_json::from_str::<SocketMessage>(text) else {
        return Some(error_event("Malformed message"));
    };

    match (message.event, auth.user.user_type) {
        (SocketEvent::DriverLocationUpdated, UserType::Driver) => {
            let coordinates = serde_json::from_value::<Coordinates>(message.data)
                .ok()
                .filter(Coordinates::is_valid);

            let Some(coordinates) = coordinates else {
                return Some(error_event("Invalid coordinates"));
            };

            let driver = match live_driver(state, auth).await {
                Ok(Some(driver)) => driver,
                Ok(None) => return Some(error_event(SESSION_ENDED)),
                Err(e) => {
                    warn!(user_id = %auth.user.id, "Failed to load driver: {e}");
                    return Some(error_event("Could not update location"));
                }
            };

            match report_location(state, driver.id, coordinates).await {
                Ok(_) => None,
                Err(e) => {
                    warn!(driver_id = %driver.id, "Failed to store location: {e}");
                    Some(error_event("Could not update location"))
                }
            }
        }
        (SocketEvent::DriverLocationUpdated, UserType::Customer) => {
            Some(error_event("Only drivers can report their location"))
        }
        _ => Some(error_event("Unsupported event")),
    }
}

/// The socket outlives the checks made at upgrade time. Logging out, expiry or
/// deleting the account all end a driver's right to publish.
async fn live_driver(state: &AppState, auth: &AuthUser) -> Result<Option<Driver>, StoreError> {
    if auth.claims.remaining().is_zero() || is_revoked(state.cache.as_ref(), &auth.claims).await? {
        return Ok(None);
    }

    state.repo.driver_by_user(auth.user.id).await
}

pub async fn report_location(
    state: &AppState,
    driver_id: Uuid,
    coordinates: Coordinates,
) -> Result<usize, StoreError> {
    put_json(
        state.cache.as_ref(),
        &keys::driver_location(driver_id),
        &coordinates,
        Some(LOCATION_TTL),
    )
    .await?;

    Ok(state.hub.publish(SocketMessage::new(
        SocketEvent::DriverLocationUpdated,
        json!({ "driverId": driver_id, "lat": coordinates.lat, "lng": coordinates.lng }),
    )))
}

#[cfg(test)]
mod tests {
    use lupad_types::AuthMethod;

    use crate::{
        auth::tokens::{TokenKind, revoke},
        cache::{MemoryCache, get_json},
        config::Config,
        models::{User, Vehicle},
        sms::RecordingSender,
        store::MemoryRepository,
    };

    use super::*;

    fn state() -> AppState {
        AppState::with_backends(
            Config::default(),
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryRepository::new()),
            Arc::new(RecordingSender::new()),
        )
    }

    fn session(state: &AppState, user_type: UserType) -> AuthUser {
        let user = User::new(
            "+639281234567".to_string(),
            "Juan Dela Cruz".to_string(),
            None,
            user_type,
            None,
            AuthMethod::Password,
        );
        let claims = state
            .tokens
            .claims_for(TokenKind::Access, &user, AuthMethod::Password);

        AuthUser { user, claims }
    }

    /// A signed-in driver whose account is in the store.
    async fn driver_session(state: &AppState) -> (AuthUser, Driver) {
        let auth = session(state, UserType::Driver);
        let driver = Driver::new(
            auth.user.id,
            Vehicle {
                vehicle_type: "tricycle".to_string(),
                license_number: "N01-23-456789".to_string(),
                plate_number: "ABC 1234".to_string(),
            },
        );
        state
            .repo
            .insert_user(&auth.user, Some(&driver))
            .await
            .unwrap();

        (auth, driver)
    }

    const MANILA: &str = r#"{"event":"driver:location:updated","data":{"lat":14.5995,"lng":120.9842}}"#;

    fn error_text(reply: Option<SocketMessage>) -> String {
        let reply = reply.unwrap();
        assert_eq!(reply.event, SocketEvent::Error);
        reply.data["message"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_connection_guard_counts() {
        let hub = SocketHub::new();

        let first = hub.connect();
        let second = hub.connect();
        assert_eq!(hub.connections(), 2);

        drop(first);
        assert_eq!(hub.connections(), 1);
        drop(second);
        assert_eq!(hub.connections(), 0);
    }

    #[test]
    fn test_publish_without_listeners() {
        let hub = SocketHub::new();
        assert_eq!(hub.publish(error_event("nobody")), 0);
    }

    #[tokio::test]
    async fn test_driver_location_is_stored_and_broadcast() {
        let state = state();
        let (auth, driver) = driver_session(&state).await;
        let mut events = state.hub.subscribe();

        let reply = handle_frame(&state, &auth, MANILA).await;
        assert!(reply.is_none());

        let stored: Coordinates = get_json(state.cache.as_ref(), &keys::driver_location(driver.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, Coordinates { lat: 14.5995, lng: 120.9842 });

        let event = events.recv().await.unwrap();
        assert_eq!(event.event, SocketEvent::DriverLocationUpdated);
        assert_eq!(event.data["driverId"], json!(driver.id));
    }

    #[tokio::test]
    async fn test_location_out_of_range() {
        let state = state();
        let (auth, _) = driver_session(&state).await;

        let reply = handle_frame(
            &state,
            &auth,
            r#"{"event":"driver:location:updated","data":{"lat":91.0,"lng":0.0}}"#,
        )
        .await;

        assert_eq!(error_text(reply), "Invalid coordinates");
    }

    #[tokio::test]
    async fn test_customer_cannot_report_location() {
        let state = state();
        let auth = session(&state, UserType::Customer);

        let reply = handle_frame(
            &state,
            &auth,
            r#"{"event":"driver:location:updated","data":{"lat":14.0,"lng":121.0}}"#,
        )
        .await;

        assert_eq!(error_text(reply), "Only drivers can report their location");
    }

    #[tokio::test]
    async fn test_bad_frames() {
        let state = state();
        let auth = session(&state, UserType::Customer);

        assert_eq!(
            error_text(handle_frame(&state, &auth, "not json").await),
            "Malformed message"
        );
        assert_eq!(
            error_text(handle_frame(&state, &auth, r#"{"event":"ride:request","data":{}}"#).await),
            "Malformed message"
        );
        assert_eq!(
            error_text(handle_frame(&state, &auth, r#"{"event":"connection:ready"}"#).await),
            "Unsupported event"
        );
    }

    #[tokio::test]
    async fn test_deleted_driver_stops_publishing() {
        let state = state();
        let (auth, driver) = driver_session(&state).await;
        let mut events = state.hub.subscribe();

        state.repo.delete_user(auth.user.id).await.unwrap();

        let reply = handle_frame(&state, &auth, MANILA).await;
        assert_eq!(error_text(reply), SESSION_ENDED);

        assert!(events.try_recv().is_err());
        let stored: Option<Coordinates> =
            get_json(state.cache.as_ref(), &keys::driver_location(driver.id))
                .await
                .unwrap();
        assert_eq!(stored, None);
    }

    #[tokio::test]
    async fn test_logged_out_driver_stops_publishing() {
        let state = state();
        let (auth, _) = driver_session(&state).await;
        let mut events = state.hub.subscribe();

        revoke(state.cache.as_ref(), &auth.claims).await.unwrap();

        let reply = handle_frame(&state, &auth, MANILA).await;
        assert_eq!(error_text(reply), SESSION_ENDED);
        assert!(events.try_recv().is_err());
    }
}
