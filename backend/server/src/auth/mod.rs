//! # Authentication
//!
//! Phone-first, two modes:
//! - Customers never set a password. Every sign-in is an SMS OTP.
//! - Drivers register with a password and sign in with it. Their phone is
//!   proven once, by OTP, during registration.
//!
//! ## Registration
//! 1. `POST /auth/register` parks the signup under `registration:{phone}` (10 min)
//!    and texts an OTP (5 min). Driver passwords are hashed before parking.
//! 2. `POST /auth/verify-otp` checks the OTP, turns the parked signup into an
//!    account (plus driver profile), clears both keys and returns a token pair.
//!
//! ## Sign in
//! - Customer: `POST /auth/login` texts an OTP, `POST /auth/login/otp` trades it
//!   for a token pair.
//! - Driver: `POST /auth/login` with the password returns the token pair at once.
//! - Customer app shortcut: `POST /auth/otp/request` + `POST /auth/otp/verify`
//!   signs in or, for an unknown phone, creates the account on the spot.
//!
//! ## Sessions
//! Access tokens ride in `Authorization: Bearer`. Refreshing rotates the pair
//! and revokes the old refresh token. Logout revokes what it is handed.
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use lupad_types::UserType;

pub mod handlers;
pub mod otp;
pub mod password;
pub mod schemas;
pub mod tokens;

use crate::{error::AppError, models::User, state::AppState};
use tokens::{Claims, TokenError, TokenKind, is_revoked};

/// The caller behind a valid, unrevoked access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub claims: Claims,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

pub async fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, AppError> {
    let claims = state.tokens.verify(TokenKind::Access, token)?;

    if is_revoked(state.cache.as_ref(), &claims).await? {
        return Err(TokenError::Revoked.into());
    }

    let user = state
        .repo
        .user_by_id(claims.user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    Ok(AuthUser { user, claims })
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("No token provided"))?;

        authenticate(state, &token).await
    }
}

/// An [`AuthUser`] whose account is a driver.
#[derive(Debug, Clone)]
pub struct DriverUser(pub AuthUser);

impl FromRequestParts<Arc<AppState>> for DriverUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;

        if auth.user.user_type != UserType::Driver {
            return Err(AppError::Forbidden(format!(
                "Access denied. Required role: {}",
                UserType::Driver.as_str()
            )));
        }

        Ok(DriverUser(auth))
    }
}
