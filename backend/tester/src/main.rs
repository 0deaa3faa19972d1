//! Smoke run of the driver signup flow against a live server.
//!
//! Reads the OTP straight out of Redis, so point it at the same instance the
//! server uses.
use std::{
    env,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, anyhow, bail, ensure};
use lupad_types::{ApiResponse, TokenPair};
use redis::AsyncCommands;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Session {
    user: Value,

    #[serde(flatten)]
    tokens: TokenPair,
}

#[derive(Deserialize, Debug)]
struct StoredOtp {
    otp: String,
}

async fn read<T: DeserializeOwned>(res: Response) -> anyhow::Result<(StatusCode, ApiResponse<T>)> {
    let status = res.status();
    let body = res.json::<ApiResponse<T>>().await?;

    Ok((status, body))
}

fn data<T>(step: &str, status: StatusCode, body: ApiResponse<T>) -> anyhow::Result<T> {
    ensure!(
        status.is_success() && body.success,
        "{step} failed with {status}: {:?}",
        body.message
    );

    body.data.ok_or_else(|| anyhow!("{step} returned no data"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url = env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let api = format!("{base_url}/api");

    let client = Client::new();
    let mut redis = redis::Client::open(redis_url.as_str())?
        .get_multiplexed_async_connection()
        .await
        .context("connecting to Redis")?;

    let suffix = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos() % 10_000_000;
    let phone = format!("+63955{suffix:07}");
    println!("Phone: {phone}");

    let res = client
        .post(format!("{api}/auth/register"))
        .json(&json!({
            "phone": phone,
            "name": "Smoke Test Driver",
            "userType": "DRIVER",
            "password": "Secret123",
            "vehicleType": "tricycle",
            "licenseNumber": "N01-23-456789",
            "plateNumber": "SMK 1234"
        }))
        .send()
        .await?;
    let (status, body) = read::<Value>(res).await?;
    data("register", status, body)?;
    println!("Registered, OTP sent");

    let stored: Option<String> = redis.get(format!("otp:{phone}")).await?;
    let stored = stored.ok_or_else(|| anyhow!("no OTP in Redis for {phone}"))?;
    let otp = serde_json::from_str::<StoredOtp>(&stored)?.otp;

    let res = client
        .post(format!("{api}/auth/verify-otp"))
        .json(&json!({ "phone": phone, "otp": otp }))
        .send()
        .await?;
    let (status, body) = read::<Session>(res).await?;
    ensure!(status == StatusCode::CREATED, "verify-otp returned {status}");
    let session = data("verify-otp", status, body)?;
    println!("Verified, user {}", session.user["id"]);

    let res = client
        .get(format!("{api}/auth/me"))
        .bearer_auth(&session.tokens.access_token)
        .send()
        .await?;
    let (status, body) = read::<Value>(res).await?;
    let me = data("me", status, body)?;
    ensure!(
        me["user"]["driver"]["isVerified"] == json!(false),
        "new driver should be unverified"
    );
    println!("Profile loaded");

    let res = client
        .put(format!("{api}/drivers/me/status"))
        .bearer_auth(&session.tokens.access_token)
        .json(&json!({ "isAvailable": true }))
        .send()
        .await?;
    let (status, body) = read::<Value>(res).await?;
    if status != StatusCode::BAD_REQUEST {
        bail!("unverified driver went online ({status}: {:?})", body.message);
    }
    println!("Refused to go online: {:?}", body.message);

    let res = client
        .post(format!("{api}/auth/refresh"))
        .json(&json!({ "refreshToken": session.tokens.refresh_token }))
        .send()
        .await?;
    let (status, body) = read::<TokenPair>(res).await?;
    let tokens = data("refresh", status, body)?;
    println!("Tokens refreshed");

    let res = client
        .post(format!("{api}/auth/logout"))
        .bearer_auth(&tokens.access_token)
        .json(&json!({ "refreshToken": tokens.refresh_token }))
        .send()
        .await?;
    let (status, body) = read::<Value>(res).await?;
    ensure!(status.is_success() && body.success, "logout returned {status}");

    let res = client
        .get(format!("{api}/auth/me"))
        .bearer_auth(&tokens.access_token)
        .send()
        .await?;
    ensure!(
        res.status() == StatusCode::UNAUTHORIZED,
        "revoked token still accepted"
    );
    println!("Logged out, token revoked");

    println!("All steps passed");
    Ok(())
}
