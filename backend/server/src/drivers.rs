use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use lupad_types::{ApiResponse, FieldErrors, SocketEvent, SocketMessage};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, DriverUser},
    database::keys,
    error::AppError,
    models::{Driver, DriverProfile, PublicDriver, Vehicle},
    state::AppState,
    utils::parse_id,
    validation::{Payload, Schema, Violations},
};

#[derive(Serialize, Debug)]
pub struct DriverBody<T> {
    pub driver: T,
}

async fn own_driver(state: &AppState, auth: &AuthUser) -> Result<Driver, AppError> {
    state
        .repo
        .driver_by_user(auth.user.id)
        .await?
        .ok_or_else(|| AppError::not_found("Driver profile not found"))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDriverRequest {
    pub vehicle_type: Option<String>,
    pub license_number: Option<String>,
    pub plate_number: Option<String>,
}

#[derive(Debug, Default, PartialEq)]
pub struct DriverChanges {
    pub vehicle_type: Option<String>,
    pub license_number: Option<String>,
    pub plate_number: Option<String>,
}

impl DriverChanges {
    pub fn is_empty(&self) -> bool {
        self.vehicle_type.is_none() && self.license_number.is_none() && self.plate_number.is_none()
    }
}

impl Schema for UpdateDriverRequest {
    type Output = DriverChanges;

    fn parse(self) -> Result<DriverChanges, FieldErrors> {
        let mut v = Violations::new();

        let changes = DriverChanges {
            vehicle_type: self.vehicle_type.map(|raw| v.vehicle_type(&raw)),
            license_number: self.license_number.map(|raw| v.license_number(&raw)),
            plate_number: self.plate_number.map(|raw| v.plate_number(&raw)),
        };

        v.finish(changes)
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVehicleRequest {
    pub vehicle_type: String,
    pub license_number: String,
    pub plate_number: String,
}

impl Schema for UpdateVehicleRequest {
    type Output = Vehicle;

    fn parse(self) -> Result<Vehicle, FieldErrors> {
        let mut v = Violations::new();
        let vehicle = v.vehicle(&self.vehicle_type, &self.license_number, &self.plate_number);

        v.finish(vehicle)
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub is_available: bool,
}

impl Schema for UpdateStatusRequest {
    type Output = bool;

    fn parse(self) -> Result<bool, FieldErrors> {
        Ok(self.is_available)
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub id: Uuid,
    pub is_available: bool,
    pub is_verified: bool,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverStats {
    pub rating: f64,
    pub total_rides: u32,
    pub today_rides: u32,
    pub today_earnings: f64,
}

impl From<&Driver> for DriverStats {
    fn from(driver: &Driver) -> Self {
        // no ride ledger, so nothing accrues for the day
        Self {
            rating: driver.rating,
            total_rides: driver.total_rides,
            today_rides: 0,
            today_earnings: 0.0,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct StatsBody {
    pub stats: DriverStats,
}

pub async fn get_me(
    State(state): State<Arc<AppState>>,
    DriverUser(auth): DriverUser,
) -> Result<impl IntoResponse, AppError> {
    let driver = own_driver(&state, &auth).await?;

    Ok(Json(ApiResponse::data(DriverBody {
        driver: DriverProfile::new(&driver, &auth.user),
    })))
}

pub async fn update_me(
    State(state): State<Arc<AppState>>,
    DriverUser(auth): DriverUser,
    Payload(changes): Payload<UpdateDriverRequest>,
) -> Result<impl IntoResponse, AppError> {
    if changes.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }

    let mut driver = own_driver(&state, &auth).await?;

    if let Some(vehicle_type) = changes.vehicle_type {
        driver.vehicle_type = vehicle_type;
    }
    if let Some(license_number) = changes.license_number {
        driver.license_number = license_number;
    }
    if let Some(plate_number) = changes.plate_number {
        driver.plate_number = plate_number;
    }
    driver.updated_at = Utc::now();

    state.repo.save_driver(&driver).await?;

    Ok(Json(ApiResponse::with_message(
        "Driver profile updated successfully",
        DriverBody {
            driver: DriverProfile::new(&driver, &auth.user),
        },
    )))
}

pub async fn update_vehicle(
    State(state): State<Arc<AppState>>,
    DriverUser(auth): DriverUser,
    Payload(vehicle): Payload<UpdateVehicleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut driver = own_driver(&state, &auth).await?;

    driver.vehicle_type = vehicle.vehicle_type;
    driver.license_number = vehicle.license_number;
    driver.plate_number = vehicle.plate_number;
    driver.is_verified = false;
    driver.updated_at = Utc::now();

    state.repo.save_driver(&driver).await?;

    info!(driver_id = %driver.id, "Vehicle changed, verification reset");

    Ok(Json(ApiResponse::with_message(
        "Vehicle information updated successfully. Verification status has been reset.",
        DriverBody {
            driver: DriverProfile::new(&driver, &auth.user),
        },
    )))
}

pub async fn update_availability(
    State(state): State<Arc<AppState>>,
    DriverUser(auth): DriverUser,
    Payload(is_available): Payload<UpdateStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut driver = own_driver(&state, &auth).await?;

    if is_available && !driver.is_verified {
        return Err(AppError::bad_request(
            "Cannot go online until your account is verified",
        ));
    }

    driver.is_available = is_available;
    driver.updated_at = Utc::now();
    state.repo.save_driver(&driver).await?;

    let key = keys::driver_available(driver.id);
    if is_available {
        state.cache.set(&key, "true", None).await?;
    } else {
        state.cache.del(&key).await?;
    }

    state.hub.publish(SocketMessage::new(
        SocketEvent::DriverAvailabilityUpdated,
        json!({ "driverId": driver.id, "isAvailable": is_available }),
    ));

    info!(driver_id = %driver.id, is_available, "Driver availability changed");

    let message = if is_available {
        "You are now online"
    } else {
        "You are now offline"
    };

    Ok(Json(ApiResponse::with_message(
        message,
        DriverBody {
            driver: Availability {
                id: driver.id,
                is_available: driver.is_available,
                is_verified: driver.is_verified,
            },
        },
    )))
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    DriverUser(auth): DriverUser,
) -> Result<impl IntoResponse, AppError> {
    let driver = own_driver(&state, &auth).await?;

    Ok(Json(ApiResponse::data(StatsBody {
        stats: DriverStats::from(&driver),
    })))
}

pub async fn get_driver_by_id(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "id", "Invalid driver ID format")?;

    let driver = state
        .repo
        .driver_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Driver not found"))?;

    let user = state
        .repo
        .user_by_id(driver.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Driver not found"))?;

    Ok(Json(ApiResponse::data(DriverBody {
        driver: PublicDriver::new(&driver, &user),
    })))
}
