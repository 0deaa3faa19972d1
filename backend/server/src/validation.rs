//! Request body parsing.
//!
//! Handlers take [`Payload<T>`]: the body is decoded as `T`, then `T::parse`
//! checks and normalizes it. Decoding failures are 400 `Malformed payload`, rule
//! violations are 400 `Validation failed` with messages per field.
use axum::{
    Json,
    extract::{FromRequest, Request},
};
use lupad_types::FieldErrors;
use serde::de::DeserializeOwned;

use crate::{
    error::AppError,
    models::Vehicle,
    utils::{PHONE_FORMAT_MESSAGE, is_valid_email, length_error, normalize_phone},
};

pub trait Schema: DeserializeOwned {
    type Output;

    fn parse(self) -> Result<Self::Output, FieldErrors>;
}

pub struct Payload<T: Schema>(pub T::Output);

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: Schema + Send,
    T::Output: Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(raw) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::MalformedPayload(rejection.body_text()))?;

        raw.parse().map(Payload).map_err(AppError::Validation)
    }
}

#[derive(Default, Debug)]
pub struct Violations(FieldErrors);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn check(&mut self, field: &str, complaint: Option<String>) {
        if let Some(message) = complaint {
            self.add(field, message);
        }
    }

    pub fn finish<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self.0)
        }
    }

    /// Normalized phone, or an empty string after recording the violation.
    pub fn phone(&mut self, raw: &str) -> String {
        normalize_phone(raw).unwrap_or_else(|| {
            self.add("phone", PHONE_FORMAT_MESSAGE);
            String::new()
        })
    }

    pub fn name(&mut self, raw: &str) -> String {
        let name = raw.trim().to_string();
        self.check("name", length_error("Name", &name, 2, 100));

        name
    }

    /// `""` reads as no email.
    pub fn email(&mut self, raw: Option<String>) -> Option<String> {
        let email = raw.map(|e| e.trim().to_string()).filter(|e| !e.is_empty())?;

        if !is_valid_email(&email) {
            self.add("email", "Invalid email format");
        }

        Some(email)
    }

    pub fn vehicle_type(&mut self, raw: &str) -> String {
        self.check("vehicleType", length_error("Vehicle type", raw, 2, 50));
        raw.to_string()
    }

    pub fn license_number(&mut self, raw: &str) -> String {
        self.check("licenseNumber", length_error("License number", raw, 5, 50));
        raw.to_string()
    }

    pub fn plate_number(&mut self, raw: &str) -> String {
        self.check("plateNumber", length_error("Plate number", raw, 5, 20));
        raw.to_string()
    }

    pub fn vehicle(&mut self, vehicle_type: &str, license_number: &str, plate_number: &str) -> Vehicle {
        Vehicle {
            vehicle_type: self.vehicle_type(vehicle_type),
            license_number: self.license_number(license_number),
            plate_number: self.plate_number(plate_number),
        }
    }
}
