//! # Wire Types
//!
//! Payloads shared between the server and the tooling that talks to it.
//!
//! ## Envelope
//! Every HTTP response is wrapped in [`ApiResponse`]:
//! - success: `{ "success": true, "message"?: ..., "data"?: ... }`
//! - failure: `{ "success": false, "message": ..., "errors"?: { field: [..] } }`
//!
//! ## Socket
//! Socket frames are JSON text frames holding a [`SocketMessage`].
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    Customer,
    Driver,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Customer => "CUSTOMER",
            UserType::Driver => "DRIVER",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMethod {
    Otp,
    Password,
}

pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub errors: Option<FieldErrors>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            errors: None,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
            errors: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            errors: None,
        }
    }

    pub fn failure(message: impl Into<String>, errors: Option<FieldErrors>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            errors,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketEvent {
    #[serde(rename = "connection:ready")]
    ConnectionReady,

    #[serde(rename = "driver:availability:updated")]
    DriverAvailabilityUpdated,

    #[serde(rename = "driver:location:updated")]
    DriverLocationUpdated,

    #[serde(rename = "error")]
    Error,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SocketMessage {
    pub event: SocketEvent,

    #[serde(default)]
    pub data: Value,
}

impl SocketMessage {
    pub fn new(event: SocketEvent, data: Value) -> Self {
        Self { event, data }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_user_type_wire_names() {
        assert_eq!(serde_json::to_value(UserType::Driver).unwrap(), json!("DRIVER"));
        assert_eq!(
            serde_json::from_value::<UserType>(json!("CUSTOMER")).unwrap(),
            UserType::Customer
        );
        assert!(serde_json::from_value::<UserType>(json!("customer")).is_err());
    }

    #[test]
    fn test_failure_envelope_omits_data() {
        let body = serde_json::to_value(ApiResponse::failure("Invalid OTP", None)).unwrap();

        assert_eq!(body, json!({ "success": false, "message": "Invalid OTP" }));
    }

    #[test]
    fn test_socket_event_names() {
        let message = SocketMessage::new(SocketEvent::DriverLocationUpdated, json!({ "lat": 1.0 }));
        let body = serde_json::to_value(&message).unwrap();

        assert_eq!(body["event"], json!("driver:location:updated"));
    }

    #[test]
    fn test_coordinates_bounds() {
        assert!(Coordinates { lat: 14.6, lng: 121.0 }.is_valid());
        assert!(!Coordinates { lat: 91.0, lng: 0.0 }.is_valid());
        assert!(!Coordinates { lat: 0.0, lng: -180.5 }.is_valid());
    }
}
