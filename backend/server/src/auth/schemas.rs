use lupad_types::{FieldErrors, UserType};
use serde::Deserialize;

use crate::{
    models::Vehicle,
    utils::{PASSWORD_RULE_MESSAGE, is_otp_code, is_strong_password},
    validation::{Schema, Violations},
};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub user_type: UserType,
    pub password: Option<String>,
    pub vehicle_type: Option<String>,
    pub license_number: Option<String>,
    pub plate_number: Option<String>,
}

#[derive(Debug)]
pub struct RegisterInput {
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub user_type: UserType,
    pub password: Option<String>,
    pub vehicle: Option<Vehicle>,
}

impl Schema for RegisterRequest {
    type Output = RegisterInput;

    fn parse(self) -> Result<RegisterInput, FieldErrors> {
        let mut v = Violations::new();

        let phone = v.phone(&self.phone);
        let name = v.name(&self.name);
        let email = v.email(self.email);

        if let Some(password) = &self.password {
            if !is_strong_password(password) {
                v.add("password", PASSWORD_RULE_MESSAGE);
            }
        }

        if let Some(vehicle_type) = &self.vehicle_type {
            v.vehicle_type(vehicle_type);
        }
        if let Some(license_number) = &self.license_number {
            v.license_number(license_number);
        }
        if let Some(plate_number) = &self.plate_number {
            v.plate_number(plate_number);
        }

        let vehicle = match (self.vehicle_type, self.license_number, self.plate_number) {
            (Some(vehicle_type), Some(license_number), Some(plate_number)) => Some(Vehicle {
                vehicle_type,
                license_number,
                plate_number,
            }),
            _ => None,
        };

        if self.user_type == UserType::Driver {
            if self.password.is_none() {
                v.add("password", "Password is required for driver registration");
            }

            if vehicle.is_none() {
                v.add(
                    "vehicleType",
                    "Vehicle type, license number, and plate number are required for driver registration",
                );
            }
        }

        v.finish(RegisterInput {
            phone,
            name,
            email,
            user_type: self.user_type,
            password: self.password,
            vehicle,
        })
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub phone: String,
    pub password: Option<String>,
    pub user_type: UserType,
}

#[derive(Debug)]
pub struct LoginInput {
    pub phone: String,
    pub password: Option<String>,
    pub user_type: UserType,
}

impl Schema for LoginRequest {
    type Output = LoginInput;

    fn parse(self) -> Result<LoginInput, FieldErrors> {
        let mut v = Violations::new();
        let phone = v.phone(&self.phone);

        v.finish(LoginInput {
            phone,
            password: self.password,
            user_type: self.user_type,
        })
    }
}

#[derive(Deserialize, Debug)]
pub struct VerifyOtpRequest {
    pub phone: String,
    pub otp: String,
}

#[derive(Debug)]
pub struct VerifyOtpInput {
    pub phone: String,
    pub otp: String,
}

impl Schema for VerifyOtpRequest {
    type Output = VerifyOtpInput;

    fn parse(self) -> Result<VerifyOtpInput, FieldErrors> {
        let mut v = Violations::new();
        let phone = v.phone(&self.phone);

        if !is_otp_code(&self.otp) {
            v.add("otp", "OTP must be 6 digits");
        }

        v.finish(VerifyOtpInput {
            phone,
            otp: self.otp,
        })
    }
}

#[derive(Deserialize, Debug)]
pub struct OtpRequest {
    pub phone: String,
}

impl Schema for OtpRequest {
    type Output = String;

    fn parse(self) -> Result<String, FieldErrors> {
        let mut v = Violations::new();
        let phone = v.phone(&self.phone);

        v.finish(phone)
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl Schema for RefreshRequest {
    type Output = String;

    fn parse(self) -> Result<String, FieldErrors> {
        let mut v = Violations::new();

        if self.refresh_token.trim().is_empty() {
            v.add("refreshToken", "Refresh token is required");
        }

        v.finish(self.refresh_token)
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}
