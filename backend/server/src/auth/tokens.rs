//! # Tokens
//!
//! HS256 JWT pairs.
//!
//! - Access token: 15 minutes, signed with `JWT_SECRET`
//! - Refresh token: 7 days, signed with `JWT_REFRESH_SECRET`
//! - Both carry `userId`, `userType`, `phone`, `authMethod` and a unique `jti`
//!
//! Logout and refresh rotation revoke a token by parking `revoked:{jti}` in the
//! cache until the token would have expired anyway.
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use lupad_types::{AuthMethod, TokenPair, UserType};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{cache::Cache, config::Config, database::keys, models::User, store::StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Refresh token expired")]
    RefreshExpired,

    #[error("Invalid refresh token")]
    RefreshInvalid,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Token signing failed: {0}")]
    Signing(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    pub user_type: UserType,
    pub phone: String,
    pub auth_method: AuthMethod,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Seconds until expiry, zero once past.
    pub fn remaining(&self) -> Duration {
        let left = self.exp - Utc::now().timestamp();
        Duration::from_secs(left.max(0) as u64)
    }
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Keys {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

pub struct TokenIssuer {
    access: Keys,
    refresh: Keys,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(config: &Config) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Self {
            access: Keys::new(&config.jwt_secret, config.access_token_ttl),
            refresh: Keys::new(&config.jwt_refresh_secret, config.refresh_token_ttl),
            validation,
        }
    }

    fn keys(&self, kind: TokenKind) -> &Keys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn claims_for(&self, kind: TokenKind, user: &User, auth_method: AuthMethod) -> Claims {
        let now = Utc::now().timestamp();

        Claims {
            user_id: user.id,
            user_type: user.user_type,
            phone: user.phone.clone(),
            auth_method,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.keys(kind).ttl.as_secs() as i64,
        }
    }

    pub fn sign(&self, kind: TokenKind, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.keys(kind).encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Pair for `user`, stamped with the method they just proved.
    pub fn issue_pair(&self, user: &User, auth_method: AuthMethod) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.sign(
                TokenKind::Access,
                &self.claims_for(TokenKind::Access, user, auth_method),
            )?,
            refresh_token: self.sign(
                TokenKind::Refresh,
                &self.claims_for(TokenKind::Refresh, user, auth_method),
            )?,
        })
    }

    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match (kind, e.kind()) {
                (TokenKind::Access, ErrorKind::ExpiredSignature) => TokenError::Expired,
                (TokenKind::Access, _) => TokenError::Invalid,
                (TokenKind::Refresh, ErrorKind::ExpiredSignature) => TokenError::RefreshExpired,
                (TokenKind::Refresh, _) => TokenError::RefreshInvalid,
            })
    }
}

pub async fn revoke(cache: &dyn Cache, claims: &Claims) -> Result<(), StoreError> {
    let remaining = claims.remaining();

    if remaining.is_zero() {
        return Ok(());
    }

    cache
        .set(&keys::revoked(&claims.jti), "1", Some(remaining))
        .await
}

/// Revokes the token and reports whether this call was the one that did it.
/// Lets a refresh token be spent exactly once under concurrent use.
pub async fn claim(cache: &dyn Cache, claims: &Claims) -> Result<bool, StoreError> {
    // verify() already rejected expired tokens; the floor covers the last second
    let ttl = claims.remaining().max(Duration::from_secs(1));

    cache.set_nx(&keys::revoked(&claims.jti), "1", ttl).await
}

pub async fn is_revoked(cache: &dyn Cache, claims: &Claims) -> Result<bool, StoreError> {
    Ok(cache.get(&keys::revoked(&claims.jti)).await?.is_some())
}
