//! # One-Time Passcodes
//!
//! One live OTP per phone under `otp:{phone}`. Issuing a new one replaces the old
//! one and resets the failed attempt counter.
//!
//! Each record remembers which flow asked for it, so a code sent for a login
//! cannot complete a registration and the other way around.
//!
//! ## Verification
//! 1. No record: `OTP expired or invalid`
//! 2. Past its expiry: record dropped, `OTP expired`
//! 3. Issued for another flow: `OTP expired or invalid`
//! 4. Wrong code: counter bumped, `Invalid OTP`. At the attempt limit the record
//!    is dropped and the caller has to request a new code.
//!
//! The record survives a successful check. Flows call [`consume`] once they have
//! finished their own work, so a failure after the check leaves the code usable.
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    cache::{get_json, put_json},
    database::keys,
    error::AppError,
    sms::otp_message,
    state::AppState,
    utils::constant_time_eq,
};

pub const OTP_MISSING: &str = "OTP expired or invalid";
pub const OTP_EXPIRED: &str = "OTP expired";
pub const OTP_MISMATCH: &str = "Invalid OTP";
pub const OTP_LOCKED: &str = "Too many failed attempts. Please request a new OTP";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OtpPurpose {
    Registration,
    Login { user_id: Uuid },
    Passwordless { user_id: Option<Uuid> },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OtpRecord {
    pub otp: String,
    /// Milliseconds since the epoch.
    pub expires_at: i64,
    pub purpose: OtpPurpose,
}

impl OtpRecord {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires_at)
    }

    fn is_expired(&self) -> bool {
        Utc::now().timestamp_millis() > self.expires_at
    }
}

pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

pub async fn issue(state: &AppState, phone: &str, purpose: OtpPurpose) -> Result<OtpRecord, AppError> {
    let ttl = state.config.otp_ttl;

    let record = OtpRecord {
        otp: generate_otp(),
        expires_at: Utc::now().timestamp_millis() + ttl.as_millis() as i64,
        purpose,
    };

    put_json(state.cache.as_ref(), &keys::otp(phone), &record, Some(ttl)).await?;
    state.cache.del(&keys::otp_attempts(phone)).await?;

    state.sms.send(phone, &otp_message(&record.otp)).await?;

    debug!(phone, purpose = ?record.purpose, "OTP issued");

    Ok(record)
}

pub async fn verify<F>(
    state: &AppState,
    phone: &str,
    code: &str,
    accepts: F,
) -> Result<OtpRecord, AppError>
where
    F: Fn(&OtpPurpose) -> bool,
{
    let cache = state.cache.as_ref();

    let Some(record) = get_json::<OtpRecord>(cache, &keys::otp(phone)).await? else {
        return Err(AppError::bad_request(OTP_MISSING));
    };

    if record.is_expired() {
        consume(state, phone).await?;
        return Err(AppError::bad_request(OTP_EXPIRED));
    }

    if !accepts(&record.purpose) {
        return Err(AppError::bad_request(OTP_MISSING));
    }

    if !constant_time_eq(code, &record.otp) {
        let attempts = cache
            .incr(&keys::otp_attempts(phone), state.config.otp_ttl)
            .await?;

        if attempts >= i64::from(state.config.otp_max_attempts) {
            warn!(phone, attempts, "OTP locked after repeated failures");
            consume(state, phone).await?;

            return Err(AppError::bad_request(OTP_LOCKED));
        }

        return Err(AppError::bad_request(OTP_MISMATCH));
    }

    Ok(record)
}

pub async fn consume(state: &AppState, phone: &str) -> Result<(), AppError> {
    state.cache.del(&keys::otp(phone)).await?;
    state.cache.del(&keys::otp_attempts(phone)).await?;

    Ok(())
}
