//! Account self-service and public profiles.
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use lupad_types::{ApiResponse, FieldErrors};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::AuthUser,
    database::keys,
    error::AppError,
    models::{PublicUser, User, UserProfile},
    state::AppState,
    utils::{double_option, parse_id},
    validation::{Payload, Schema, Violations},
};

#[derive(Serialize, Debug)]
pub struct ProfileBody<T> {
    pub user: T,
}

pub async fn load_profile(state: &AppState, user: &User) -> Result<UserProfile, AppError> {
    let driver = state.repo.driver_by_user(user.id).await?;

    Ok(UserProfile::new(user, driver.as_ref()))
}

#[derive(Deserialize, Debug)]
pub struct UpdateUserRequest {
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
}

/// `email: Some(None)` clears the address.
#[derive(Debug, Default, PartialEq)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<Option<String>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

impl Schema for UpdateUserRequest {
    type Output = UserChanges;

    fn parse(self) -> Result<UserChanges, FieldErrors> {
        let mut v = Violations::new();

        let name = self.name.map(|name| v.name(&name));
        let email = self.email.map(|email| v.email(email));

        v.finish(UserChanges { name, email })
    }
}

pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user = load_profile(&state, &auth.user).await?;

    Ok(Json(ApiResponse::data(ProfileBody { user })))
}

pub async fn update_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Payload(changes): Payload<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if changes.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }

    let mut user = auth.user;

    if let Some(name) = changes.name {
        user.name = name;
    }
    if let Some(email) = changes.email {
        user.email = email;
    }
    user.updated_at = Utc::now();

    state.repo.save_user(&user).await?;

    let user = load_profile(&state, &user).await?;

    Ok(Json(ApiResponse::with_message(
        "Profile updated successfully",
        ProfileBody { user },
    )))
}

pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    // rides are not tracked here, so there is no active-ride guard
    let driver = state.repo.driver_by_user(auth.user.id).await?;

    state.repo.delete_user(auth.user.id).await?;

    if let Some(driver) = driver {
        state.cache.del(&keys::driver_available(driver.id)).await?;
        state.cache.del(&keys::driver_location(driver.id)).await?;
    }

    info!(user_id = %auth.user.id, "Account deleted");

    Ok(Json(ApiResponse::message("Account deleted successfully")))
}

pub async fn get_user_by_id(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "id", "Invalid user ID format")?;

    let user = state
        .repo
        .user_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let driver = state.repo.driver_by_user(user.id).await?;

    Ok(Json(ApiResponse::data(ProfileBody {
        user: PublicUser::new(&user, driver.as_ref()),
    })))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn changes(body: serde_json::Value) -> Result<UserChanges, FieldErrors> {
        serde_json::from_value::<UpdateUserRequest>(body)
            .unwrap()
            .parse()
    }

    #[test]
    fn test_email_absent_null_and_blank() {
        assert_eq!(changes(json!({})).unwrap(), UserChanges::default());
        assert_eq!(changes(json!({ "email": null })).unwrap().email, Some(None));
        assert_eq!(changes(json!({ "email": "" })).unwrap().email, Some(None));
        assert_eq!(
            changes(json!({ "email": "maria@lupad.ph" })).unwrap().email,
            Some(Some("maria@lupad.ph".to_string()))
        );
    }

    #[test]
    fn test_name_is_trimmed_and_checked() {
        assert_eq!(
            changes(json!({ "name": " Maria " })).unwrap().name.as_deref(),
            Some("Maria")
        );
        assert!(changes(json!({ "name": "M" })).is_err());
    }

    #[test]
    fn test_empty_changes() {
        assert!(UserChanges::default().is_empty());
        assert!(!changes(json!({ "email": null })).unwrap().is_empty());
    }
}
