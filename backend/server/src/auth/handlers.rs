use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use lupad_types::{ApiResponse, AuthMethod, TokenPair, UserType};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    AuthUser,
    otp::{self, OtpPurpose},
    password::{hash_password, verify_password},
    schemas::{
        LoginRequest, LogoutRequest, OtpRequest, RefreshRequest, RegisterRequest,
        VerifyOtpRequest,
    },
    tokens::{TokenError, TokenKind, claim, revoke},
};
use crate::{
    cache::{get_json, put_json},
    database::keys,
    error::AppError,
    models::{Driver, User, UserProfile, UserView, Vehicle},
    state::AppState,
    store::StoreError,
    users::load_profile,
    validation::Payload,
};

const PHONE_TAKEN: &str = "Phone number already registered";
const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Signup parked until the phone is proven.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct PendingRegistration {
    phone: String,
    name: String,
    email: Option<String>,
    user_type: UserType,
    password_hash: Option<String>,
    auth_method: AuthMethod,
    vehicle: Option<Vehicle>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OtpSent {
    pub phone: String,
    pub otp_sent: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_otp: Option<bool>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: UserView,

    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OtpRequested {
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

/// Customer account as the customer app expects it.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CustomerAccount {
    pub id: Uuid,
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub role: UserType,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for CustomerAccount {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            phone: user.phone.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.user_type,
            is_verified: true,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct PasswordlessSession {
    pub user: CustomerAccount,
    pub tokens: TokenPair,
}

#[derive(Serialize, Debug)]
pub struct Me {
    pub user: UserProfile,
}

fn phone_taken(e: StoreError) -> AppError {
    match e {
        StoreError::PhoneTaken => AppError::bad_request(PHONE_TAKEN),
        other => other.into(),
    }
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Payload(input): Payload<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if state.repo.user_by_phone(&input.phone).await?.is_some() {
        return Err(AppError::bad_request(PHONE_TAKEN));
    }

    let pending = match input.user_type {
        UserType::Customer => PendingRegistration {
            phone: input.phone.clone(),
            name: input.name,
            email: input.email,
            user_type: UserType::Customer,
            password_hash: None,
            auth_method: AuthMethod::Otp,
            vehicle: None,
        },
        UserType::Driver => {
            let password = input.password.ok_or_else(|| {
                AppError::bad_request("Password is required for driver registration")
            })?;
            let vehicle = input.vehicle.ok_or_else(|| {
                AppError::bad_request(
                    "Vehicle type, license number, and plate number are required for driver registration",
                )
            })?;

            PendingRegistration {
                phone: input.phone.clone(),
                name: input.name,
                email: input.email,
                user_type: UserType::Driver,
                password_hash: Some(hash_password(&password).await?),
                auth_method: AuthMethod::Password,
                vehicle: Some(vehicle),
            }
        }
    };

    put_json(
        state.cache.as_ref(),
        &keys::registration(&input.phone),
        &pending,
        Some(state.config.registration_ttl),
    )
    .await?;

    otp::issue(&state, &input.phone, OtpPurpose::Registration).await?;

    info!(phone = %input.phone, user_type = ?input.user_type, "Registration started");

    Ok(Json(ApiResponse::with_message(
        "OTP sent to your phone number. Please verify to complete registration.",
        OtpSent {
            phone: input.phone,
            otp_sent: true,
            requires_otp: None,
        },
    )))
}

pub async fn verify_registration(
    State(state): State<Arc<AppState>>,
    Payload(input): Payload<VerifyOtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    otp::verify(&state, &input.phone, &input.otp, |purpose| {
        matches!(purpose, OtpPurpose::Registration)
    })
    .await?;

    let registration_key = keys::registration(&input.phone);

    let pending: PendingRegistration = get_json(state.cache.as_ref(), &registration_key)
        .await?
        .ok_or_else(|| {
            AppError::bad_request("Registration data not found. Please register again.")
        })?;

    let user = User::new(
        pending.phone,
        pending.name,
        pending.email,
        pending.user_type,
        pending.password_hash,
        pending.auth_method,
    );

    let driver = match (user.user_type, pending.vehicle) {
        (UserType::Driver, Some(vehicle)) => Some(Driver::new(user.id, vehicle)),
        _ => None,
    };

    state
        .repo
        .insert_user(&user, driver.as_ref())
        .await
        .map_err(phone_taken)?;

    otp::consume(&state, &input.phone).await?;
    state.cache.del(&registration_key).await?;

    let tokens = state.tokens.issue_pair(&user, user.auth_method)?;

    info!(user_id = %user.id, user_type = ?user.user_type, "Registration completed");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Registration successful",
            Session {
                user: (&user).into(),
                tokens,
            },
        )),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Payload(input): Payload<LoginRequest>,
) -> Result<Response, AppError> {
    let user = state
        .repo
        .user_by_phone(&input.phone)
        .await?
        .filter(|user| user.user_type == input.user_type)
        .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;

    match user.user_type {
        UserType::Customer => {
            otp::issue(&state, &user.phone, OtpPurpose::Login { user_id: user.id }).await?;

            Ok(Json(ApiResponse::with_message(
                "OTP sent to your phone number",
                OtpSent {
                    phone: user.phone,
                    otp_sent: true,
                    requires_otp: Some(true),
                },
            ))
            .into_response())
        }
        UserType::Driver => {
            let password = input
                .password
                .ok_or_else(|| AppError::bad_request("Password is required"))?;

            let hash = user
                .password_hash
                .as_deref()
                .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;

            if !verify_password(&password, hash).await? {
                warn!(user_id = %user.id, "Driver login rejected");
                return Err(AppError::unauthorized(INVALID_CREDENTIALS));
            }

            let tokens = state.tokens.issue_pair(&user, user.auth_method)?;

            Ok(Json(ApiResponse::with_message(
                "Login successful",
                Session {
                    user: (&user).into(),
                    tokens,
                },
            ))
            .into_response())
        }
    }
}

pub async fn login_with_otp(
    State(state): State<Arc<AppState>>,
    Payload(input): Payload<VerifyOtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let record = otp::verify(&state, &input.phone, &input.otp, |purpose| {
        matches!(purpose, OtpPurpose::Login { .. })
    })
    .await?;

    let OtpPurpose::Login { user_id } = record.purpose else {
        return Err(AppError::bad_request(otp::OTP_MISSING));
    };

    let user = state
        .repo
        .user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    otp::consume(&state, &input.phone).await?;

    let tokens = state.tokens.issue_pair(&user, user.auth_method)?;

    Ok(Json(ApiResponse::with_message(
        "Login successful",
        Session {
            user: (&user).into(),
            tokens,
        },
    )))
}

pub async fn request_otp(
    State(state): State<Arc<AppState>>,
    Payload(phone): Payload<OtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let existing = state.repo.user_by_phone(&phone).await?;

    if existing
        .as_ref()
        .is_some_and(|user| user.user_type == UserType::Driver)
    {
        return Err(AppError::bad_request(
            "Drivers must sign in with their password",
        ));
    }

    let purpose = OtpPurpose::Passwordless {
        user_id: existing.map(|user| user.id),
    };
    let record = otp::issue(&state, &phone, purpose).await?;

    Ok(Json(ApiResponse::with_message(
        "OTP sent successfully",
        OtpRequested {
            message: "OTP sent to your phone number".to_string(),
            expires_at: record.expires_at().unwrap_or_else(Utc::now),
        },
    )))
}

pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Payload(input): Payload<VerifyOtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let record = otp::verify(&state, &input.phone, &input.otp, |purpose| {
        matches!(purpose, OtpPurpose::Passwordless { .. })
    })
    .await?;

    let OtpPurpose::Passwordless { user_id } = record.purpose else {
        return Err(AppError::bad_request(otp::OTP_MISSING));
    };

    let is_new_user = user_id.is_none();

    let user = match user_id {
        None => {
            // name is collected during onboarding
            let user = User::new(
                input.phone.clone(),
                String::new(),
                None,
                UserType::Customer,
                None,
                AuthMethod::Otp,
            );

            state
                .repo
                .insert_user(&user, None)
                .await
                .map_err(phone_taken)?;

            info!(user_id = %user.id, "Customer created from OTP sign-in");
            user
        }
        Some(id) => state
            .repo
            .user_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?,
    };

    otp::consume(&state, &input.phone).await?;

    let tokens = state.tokens.issue_pair(&user, AuthMethod::Otp)?;

    let message = if is_new_user {
        "Registration successful"
    } else {
        "Login successful"
    };

    Ok(Json(ApiResponse::with_message(
        message,
        PasswordlessSession {
            user: (&user).into(),
            tokens,
        },
    )))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Payload(refresh_token): Payload<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let claims = state.tokens.verify(TokenKind::Refresh, &refresh_token)?;

    // spending the token up front keeps two concurrent refreshes from both rotating
    if !claim(state.cache.as_ref(), &claims).await? {
        return Err(TokenError::Revoked.into());
    }

    let user = state
        .repo
        .user_by_id(claims.user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    let tokens = state.tokens.issue_pair(&user, claims.auth_method)?;

    Ok(Json(ApiResponse::data(tokens)))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request: LogoutRequest = if body.is_empty() {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::MalformedPayload(e.to_string()))?
    };

    revoke(state.cache.as_ref(), &auth.claims).await?;

    if let Some(refresh_token) = request.refresh_token {
        match state.tokens.verify(TokenKind::Refresh, &refresh_token) {
            Ok(claims) if claims.user_id == auth.user.id => {
                revoke(state.cache.as_ref(), &claims).await?;
            }
            _ => warn!(user_id = %auth.user.id, "Ignoring unusable refresh token on logout"),
        }
    }

    info!(user_id = %auth.user.id, "Logged out");

    Ok(Json(ApiResponse::message("Logged out successfully")))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user = load_profile(&state, &auth.user).await?;

    Ok(Json(ApiResponse::data(Me { user })))
}
