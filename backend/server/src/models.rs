//! Account records and the shapes they are rendered in.
use chrono::{DateTime, Utc};
use lupad_types::{AuthMethod, UserType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_DRIVER_RATING: f64 = 5.0;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub user_type: UserType,
    pub password_hash: Option<String>,
    pub auth_method: AuthMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        phone: String,
        name: String,
        email: Option<String>,
        user_type: UserType,
        password_hash: Option<String>,
        auth_method: AuthMethod,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            phone,
            name,
            email,
            user_type,
            password_hash,
            auth_method,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub vehicle_type: String,
    pub license_number: String,
    pub plate_number: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: Uuid,
    pub user_id: Uuid,
    pub vehicle_type: String,
    pub license_number: String,
    pub plate_number: String,
    pub is_verified: bool,
    pub is_available: bool,
    pub rating: f64,
    pub total_rides: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    pub fn new(user_id: Uuid, vehicle: Vehicle) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            user_id,
            vehicle_type: vehicle.vehicle_type,
            license_number: vehicle.license_number,
            plate_number: vehicle.plate_number,
            is_verified: false,
            is_available: false,
            rating: DEFAULT_DRIVER_RATING,
            total_rides: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Account as shown to its owner. Never carries the password hash.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub user_type: UserType,
    pub auth_method: AuthMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            phone: user.phone.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            user_type: user.user_type,
            auth_method: user.auth_method,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DriverSummary {
    pub id: Uuid,
    pub vehicle_type: String,
    pub license_number: String,
    pub plate_number: String,
    pub is_verified: bool,
    pub is_available: bool,
    pub rating: f64,
    pub total_rides: u32,
}

impl From<&Driver> for DriverSummary {
    fn from(driver: &Driver) -> Self {
        Self {
            id: driver.id,
            vehicle_type: driver.vehicle_type.clone(),
            license_number: driver.license_number.clone(),
            plate_number: driver.plate_number.clone(),
            is_verified: driver.is_verified,
            is_available: driver.is_available,
            rating: driver.rating,
            total_rides: driver.total_rides,
        }
    }
}

/// Owner view with the driver profile folded in.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: UserView,
    pub driver: Option<DriverSummary>,
}

impl UserProfile {
    pub fn new(user: &User, driver: Option<&Driver>) -> Self {
        Self {
            user: user.into(),
            driver: driver.map(DriverSummary::from),
        }
    }
}

/// Driver profile as shown to the driver.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DriverProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub vehicle_type: String,
    pub license_number: String,
    pub plate_number: String,
    pub is_verified: bool,
    pub is_available: bool,
    pub rating: f64,
    pub total_rides: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: UserView,
}

impl DriverProfile {
    pub fn new(driver: &Driver, user: &User) -> Self {
        Self {
            id: driver.id,
            user_id: driver.user_id,
            vehicle_type: driver.vehicle_type.clone(),
            license_number: driver.license_number.clone(),
            plate_number: driver.plate_number.clone(),
            is_verified: driver.is_verified,
            is_available: driver.is_available,
            rating: driver.rating,
            total_rides: driver.total_rides,
            created_at: driver.created_at,
            updated_at: driver.updated_at,
            user: user.into(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublicDriverSummary {
    pub vehicle_type: String,
    pub rating: f64,
    pub total_rides: u32,
    pub is_verified: bool,
}

/// What any signed-in user may see about another account.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub user_type: UserType,
    pub created_at: DateTime<Utc>,
    pub driver: Option<PublicDriverSummary>,
}

impl PublicUser {
    pub fn new(user: &User, driver: Option<&Driver>) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            user_type: user.user_type,
            created_at: user.created_at,
            driver: driver.map(|driver| PublicDriverSummary {
                vehicle_type: driver.vehicle_type.clone(),
                rating: driver.rating,
                total_rides: driver.total_rides,
                is_verified: driver.is_verified,
            }),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublicDriverOwner {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublicDriver {
    pub id: Uuid,
    pub vehicle_type: String,
    pub plate_number: String,
    pub is_verified: bool,
    pub rating: f64,
    pub total_rides: u32,
    pub user: PublicDriverOwner,
}

impl PublicDriver {
    pub fn new(driver: &Driver, user: &User) -> Self {
        Self {
            id: driver.id,
            vehicle_type: driver.vehicle_type.clone(),
            plate_number: driver.plate_number.clone(),
            is_verified: driver.is_verified,
            rating: driver.rating,
            total_rides: driver.total_rides,
            user: PublicDriverOwner {
                id: user.id,
                name: user.name.clone(),
                created_at: user.created_at,
            },
        }
    }
}
