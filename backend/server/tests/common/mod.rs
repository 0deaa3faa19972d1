#![allow(dead_code)]

use std::sync::Arc;

use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use server::{
    cache::MemoryCache, config::Config, routes::build_router, sms::RecordingSender,
    state::AppState, store::MemoryRepository,
};
use tokio::net::TcpListener;

pub struct TestApp {
    pub base: String,
    pub state: Arc<AppState>,
    pub sms: Arc<RecordingSender>,
    client: Client,
}

pub async fn spawn_app() -> TestApp {
    let sms = Arc::new(RecordingSender::new());
    let state = Arc::new(AppState::with_backends(
        Config::default(),
        Arc::new(MemoryCache::new()),
        Arc::new(MemoryRepository::new()),
        sms.clone(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let router = build_router(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });

    TestApp {
        base: format!("http://{addr}"),
        state,
        sms,
        client: Client::new(),
    }
}

impl TestApp {
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = self.client.request(method, format!("{}{path}", self.base));

        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let res = req.send().await.expect("send request");
        let status = res.status();
        let body = res.json::<Value>().await.expect("json body");

        (status, body)
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, path, None, Some(body)).await
    }

    pub async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, path, Some(token), None).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, path, Some(token), Some(body)).await
    }

    pub fn last_code(&self, phone: &str) -> String {
        self.sms.last_code(phone).expect("an OTP was texted")
    }

    /// Registers and verifies a customer. Returns the verify response data.
    pub async fn register_customer(&self, phone: &str, name: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/auth/register",
                json!({ "phone": phone, "name": name, "userType": "CUSTOMER" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let normalized = body["data"]["phone"].as_str().expect("phone").to_string();
        let otp = self.last_code(&normalized);

        let (status, body) = self
            .post(
                "/api/auth/verify-otp",
                json!({ "phone": phone, "otp": otp }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");

        body["data"].clone()
    }

    pub async fn register_driver(&self, phone: &str, name: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/auth/register",
                json!({
                    "phone": phone,
                    "name": name,
                    "userType": "DRIVER",
                    "password": "Secret123",
                    "vehicleType": "tricycle",
                    "licenseNumber": "N01-23-456789",
                    "plateNumber": "ABC 1234"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let normalized = body["data"]["phone"].as_str().expect("phone").to_string();
        let otp = self.last_code(&normalized);

        let (status, body) = self
            .post(
                "/api/auth/verify-otp",
                json!({ "phone": phone, "otp": otp }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");

        body["data"].clone()
    }
}

pub fn access_token(session: &Value) -> String {
    session["accessToken"].as_str().expect("access token").to_string()
}

pub fn refresh_token(session: &Value) -> String {
    session["refreshToken"].as_str().expect("refresh token").to_string()
}
