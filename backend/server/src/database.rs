//! # Redis
//!
//! RAM database and short-lived state.
//!
//! Core purpose is to hold accounts, driver profiles, and everything the auth
//! flows park between requests (OTPs, pending registrations, revoked tokens).
//!
//! ## Requirements
//!
//! - Fast lookups by id and by phone
//! - Automatic expiry for OTPs and pending registrations
//! - Atomic phone uniqueness on signup
//!
//! ## Implementation
//!
//! - Records are JSON strings, one key per record
//! - `user:{id}` user record, `user:phone:{phone}` phone index (`SET NX`)
//! - `driver:{id}` driver profile, `driver:user:{user_id}` profile index
//! - `otp:{phone}` OTP record, TTL 5 minutes
//! - `otp:attempts:{phone}` failed attempt counter, same TTL as the OTP
//! - `registration:{phone}` pending registration, TTL 10 minutes
//! - `revoked:{jti}` revoked token marker, TTL is the token's remaining lifetime
//! - `driver:available:{driver_id}` online marker, no TTL
//! - `driver:location:{driver_id}` last reported position, TTL 2 minutes
use std::time::Duration;

use redis::{
    Client, RedisError,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use uuid::Uuid;

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, RedisError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;
    client.get_connection_manager_with_config(config).await
}

pub mod keys {
    use super::Uuid;

    pub fn user(id: Uuid) -> String {
        format!("user:{id}")
    }

    pub fn user_phone(phone: &str) -> String {
        format!("user:phone:{phone}")
    }

    pub fn driver(id: Uuid) -> String {
        format!("driver:{id}")
    }

    pub fn driver_user(user_id: Uuid) -> String {
        format!("driver:user:{user_id}")
    }

    pub fn otp(phone: &str) -> String {
        format!("otp:{phone}")
    }

    pub fn otp_attempts(phone: &str) -> String {
        format!("otp:attempts:{phone}")
    }

    pub fn registration(phone: &str) -> String {
        format!("registration:{phone}")
    }

    pub fn revoked(jti: &str) -> String {
        format!("revoked:{jti}")
    }

    pub fn driver_available(driver_id: Uuid) -> String {
        format!("driver:available:{driver_id}")
    }

    pub fn driver_location(driver_id: Uuid) -> String {
        format!("driver:location:{driver_id}")
    }
}
