mod common;

use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use server::database::keys;
use uuid::Uuid;

use common::{TestApp, access_token, spawn_app};

fn user_id(session: &Value) -> Uuid {
    session["user"]["id"]
        .as_str()
        .and_then(|id| id.parse().ok())
        .expect("user id")
}

async fn mark_verified(app: &TestApp, session: &Value) -> Uuid {
    let mut driver = app
        .state
        .repo
        .driver_by_user(user_id(session))
        .await
        .unwrap()
        .expect("driver profile");

    driver.is_verified = true;
    app.state.repo.save_driver(&driver).await.unwrap();

    driver.id
}

#[tokio::test]
async fn service_root_and_health() {
    let app = spawn_app().await;

    let (status, body) = app.call(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["message"], "Lupad API Server");

    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn update_own_profile() {
    let app = spawn_app().await;
    let session = app.register_customer("09171234567", "Maria Clara").await;
    let token = access_token(&session);

    let (status, body) = app.put("/api/users/me", &token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No fields to update");

    let (status, body) = app
        .put(
            "/api/users/me",
            &token,
            json!({ "name": "Maria C. Santos", "email": "maria@lupad.ph" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Profile updated successfully");
    assert_eq!(body["data"]["user"]["email"], "maria@lupad.ph");

    let (_, body) = app
        .put("/api/users/me", &token, json!({ "email": null }))
        .await;
    assert_eq!(body["data"]["user"]["email"], Value::Null);
    assert_eq!(body["data"]["user"]["name"], "Maria C. Santos");

    let (status, body) = app
        .put("/api/users/me", &token, json!({ "email": "not-an-email" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["email"][0], "Invalid email format");
}

#[tokio::test]
async fn public_user_lookup() {
    let app = spawn_app().await;
    let viewer = app.register_customer("09171234567", "Maria Clara").await;
    let driver = app.register_driver("09281234567", "Juan Dela Cruz").await;
    let token = access_token(&viewer);

    let (status, body) = app.get("/api/users/not-a-uuid", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["id"][0], "Invalid user ID format");

    let (status, body) = app
        .get(&format!("/api/users/{}", Uuid::new_v4()), &token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");

    let (status, body) = app
        .get(&format!("/api/users/{}", user_id(&driver)), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let user = &body["data"]["user"];
    assert_eq!(user["name"], "Juan Dela Cruz");
    assert!(user.get("phone").is_none());
    assert_eq!(user["driver"]["vehicleType"], "tricycle");
}

#[tokio::test]
async fn delete_account() {
    let app = spawn_app().await;
    let session = app.register_driver("09281234567", "Juan Dela Cruz").await;
    let token = access_token(&session);
    let driver_id = mark_verified(&app, &session).await;

    app.put("/api/drivers/me/status", &token, json!({ "isAvailable": true }))
        .await;

    let (status, body) = app
        .call(Method::DELETE, "/api/users/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Account deleted successfully");

    assert!(
        app.state
            .cache
            .get(&keys::driver_available(driver_id))
            .await
            .unwrap()
            .is_none()
    );
    assert!(app.state.repo.driver_by_id(driver_id).await.unwrap().is_none());

    let (status, body) = app.get("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn driver_routes_need_driver_role() {
    let app = spawn_app().await;
    let session = app.register_customer("09171234567", "Maria Clara").await;

    let (status, body) = app.get("/api/drivers/me", &access_token(&session)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access denied. Required role: DRIVER");
}

#[tokio::test]
async fn driver_profile_and_vehicle() {
    let app = spawn_app().await;
    let session = app.register_driver("09281234567", "Juan Dela Cruz").await;
    let token = access_token(&session);

    let (status, body) = app.get("/api/drivers/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["driver"]["plateNumber"], "ABC 1234");
    assert_eq!(body["data"]["driver"]["user"]["name"], "Juan Dela Cruz");

    let (status, body) = app.put("/api/drivers/me", &token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No fields to update");

    let (status, body) = app
        .put("/api/drivers/me", &token, json!({ "plateNumber": "XYZ 9876" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Driver profile updated successfully");
    assert_eq!(body["data"]["driver"]["plateNumber"], "XYZ 9876");

    mark_verified(&app, &session).await;

    let (status, body) = app
        .put(
            "/api/drivers/me/vehicle",
            &token,
            json!({
                "vehicleType": "motorcycle",
                "licenseNumber": "N02-34-567890",
                "plateNumber": "MC 12345"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body["message"],
        "Vehicle information updated successfully. Verification status has been reset."
    );
    assert_eq!(body["data"]["driver"]["isVerified"], false);
    assert_eq!(body["data"]["driver"]["vehicleType"], "motorcycle");
}

#[tokio::test]
async fn going_online_and_offline() {
    let app = spawn_app().await;
    let session = app.register_driver("09281234567", "Juan Dela Cruz").await;
    let token = access_token(&session);

    let (status, body) = app
        .put("/api/drivers/me/status", &token, json!({ "isAvailable": true }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Cannot go online until your account is verified"
    );

    let driver_id = mark_verified(&app, &session).await;
    let mut events = app.state.hub.subscribe();

    let (status, body) = app
        .put("/api/drivers/me/status", &token, json!({ "isAvailable": true }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "You are now online");
    assert_eq!(body["data"]["driver"]["isAvailable"], true);
    assert_eq!(
        app.state
            .cache
            .get(&keys::driver_available(driver_id))
            .await
            .unwrap()
            .as_deref(),
        Some("true")
    );

    let event = events.recv().await.unwrap();
    assert_eq!(event.data["driverId"], json!(driver_id));
    assert_eq!(event.data["isAvailable"], true);

    let (_, body) = app
        .put("/api/drivers/me/status", &token, json!({ "isAvailable": false }))
        .await;
    assert_eq!(body["message"], "You are now offline");
    assert!(
        app.state
            .cache
            .get(&keys::driver_available(driver_id))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn stats_and_public_driver() {
    let app = spawn_app().await;
    let session = app.register_driver("09281234567", "Juan Dela Cruz").await;
    let viewer = app.register_customer("09171234567", "Maria Clara").await;

    let (status, body) = app
        .get("/api/drivers/me/stats", &access_token(&session))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stats"]["rating"], 5.0);
    assert_eq!(body["data"]["stats"]["todayRides"], 0);

    let driver_id = mark_verified(&app, &session).await;
    let token = access_token(&viewer);

    let (status, body) = app.get("/api/drivers/123", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["id"][0], "Invalid driver ID format");

    let (status, body) = app
        .get(&format!("/api/drivers/{}", Uuid::new_v4()), &token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Driver not found");

    let (status, body) = app
        .get(&format!("/api/drivers/{driver_id}"), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let driver = &body["data"]["driver"];
    assert_eq!(driver["isVerified"], true);
    assert!(driver.get("licenseNumber").is_none());
    assert_eq!(driver["user"]["name"], "Juan Dela Cruz");
}
