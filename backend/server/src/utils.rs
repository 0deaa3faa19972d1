use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::error::AppError;

pub const PHONE_FORMAT_MESSAGE: &str = "Invalid Philippine phone number format";
pub const PASSWORD_RULE_MESSAGE: &str =
    "Password must be at least 8 characters with 1 uppercase, 1 lowercase, and 1 number";

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\+639|639|09)[0-9]{9}$").expect("phone pattern"));

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

/// Accepts `+639XXXXXXXXX`, `639XXXXXXXXX` or `09XXXXXXXXX` and returns `+639XXXXXXXXX`.
pub fn normalize_phone(input: &str) -> Option<String> {
    let phone = input.trim();

    if !PHONE.is_match(phone) {
        return None;
    }

    let normalized = if let Some(rest) = phone.strip_prefix("09") {
        format!("+639{rest}")
    } else if phone.starts_with("639") {
        format!("+{phone}")
    } else {
        phone.to_string()
    };

    Some(normalized)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

pub fn is_otp_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

/// Returns the length complaint for `value`, if any.
pub fn length_error(label: &str, value: &str, min: usize, max: usize) -> Option<String> {
    let count = value.chars().count();

    if count < min {
        Some(format!("{label} must be at least {min} characters"))
    } else if count > max {
        Some(format!("{label} must not exceed {max} characters"))
    } else {
        None
    }
}

pub fn parse_id(raw: &str, field: &str, message: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::invalid_field(field, message))
}

/// Compares without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());

    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Lets `PATCH`-style bodies tell "absent" from an explicit `null`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}
