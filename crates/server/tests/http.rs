use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use chrono::Utc;
use http_body_util::BodyExt;
use sea_orm::{ConnectOptions, Database};
use serde_json::{Value, json};
use tower::ServiceExt;

use engine::Engine;
use migration::MigratorTrait;

const CUSTOMER: &str = "alice";
const PROVIDER: &str = "bob";

async fn app() -> Router {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();

    let engine = Engine::builder().database(db).build().await.unwrap();
    server::router(Arc::new(engine))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header("x-user-id", user);
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_booking(app: &Router, price: i64) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/booking",
        Some(CUSTOMER),
        Some(json!({
            "providerId": PROVIDER,
            "price": price,
            "dateTime": Utc::now().to_rfc3339(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "PENDING");
    body["id"].as_str().unwrap().to_string()
}

async fn set_status(app: &Router, id: &str, user: &str, status: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::PUT,
        &format!("/booking/{id}/status"),
        Some(user),
        Some(json!({ "status": status })),
    )
    .await
}

async fn top_up(app: &Router, user: &str, amount: i64) {
    let (status, _) = send(
        app,
        Method::POST,
        "/wallet/topup",
        Some(user),
        Some(json!({ "amount": amount })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

async fn balance(app: &Router, user: &str) -> i64 {
    let (status, body) = send(app, Method::GET, "/wallet/balance", Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    body["balance"].as_i64().unwrap()
}

#[tokio::test]
async fn requests_without_user_are_rejected() {
    let app = app().await;

    let (status, _) = send(&app, Method::GET, "/wallet/balance", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn booking_lifecycle_over_http() {
    let app = app().await;
    top_up(&app, CUSTOMER, 20000).await;
    let id = create_booking(&app, 20000).await;

    let (status, body) = set_status(&app, &id, PROVIDER, "accepted").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "ACCEPTED");

    let (status, body) = set_status(&app, &id, PROVIDER, "COMPLETED").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "COMPLETED");

    assert_eq!(balance(&app, CUSTOMER).await, 0);
    assert_eq!(balance(&app, PROVIDER).await, 17000);

    let (_, body) = send(&app, Method::GET, "/wallet/transactions", Some(PROVIDER), None).await;
    let rows = body["transactions"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["type"], "CREDIT");
    assert_eq!(rows[0]["source"], "BOOKING_COMPLETION");
    assert_eq!(rows[0]["bookingId"], id.as_str());

    let (status, body) = send(&app, Method::GET, "/booking/earnings", Some(PROVIDER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completedJobs"], 1);
    assert_eq!(body["totalEarnings"], 17000);
}

#[tokio::test]
async fn refused_transition_reports_current_status() {
    let app = app().await;
    top_up(&app, CUSTOMER, 5000).await;
    let id = create_booking(&app, 10000).await;
    set_status(&app, &id, PROVIDER, "ACCEPTED").await;

    let (status, body) = set_status(&app, &id, PROVIDER, "COMPLETED").await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["kind"], "INSUFFICIENT_FUNDS");
    assert_eq!(body["currentStatus"], "ACCEPTED");
    assert_eq!(balance(&app, CUSTOMER).await, 5000);

    let (status, body) = set_status(&app, &id, PROVIDER, "DONE").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "INVALID_STATUS");
    assert_eq!(body["currentStatus"], "ACCEPTED");

    let (status, body) = set_status(&app, &id, CUSTOMER, "CANCELLED").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "INVALID_TRANSITION");
    assert_eq!(body["currentStatus"], "ACCEPTED");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/booking/{id}/status"),
        Some(CUSTOMER),
        Some(json!({ "status": "CANCELLED", "expectedStatus": "ACCEPTED" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    let (status, body) = set_status(&app, &id, PROVIDER, "ACCEPTED").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "INVALID_TRANSITION");
    assert_eq!(body["currentStatus"], "CANCELLED");
}

#[tokio::test]
async fn stale_expected_status_is_a_conflict() {
    let app = app().await;
    let id = create_booking(&app, 1000).await;
    set_status(&app, &id, PROVIDER, "ACCEPTED").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/booking/{id}/status"),
        Some(CUSTOMER),
        Some(json!({ "status": "CANCELLED", "expectedStatus": "PENDING" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["currentStatus"], "ACCEPTED");
}

#[tokio::test]
async fn unknown_booking_is_not_found() {
    let app = app().await;
    let id = uuid::Uuid::new_v4();

    let (status, body) = set_status(&app, &id.to_string(), PROVIDER, "ACCEPTED").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "NOT_FOUND");
    assert!(body.get("currentStatus").is_none());
}

#[tokio::test]
async fn strangers_cannot_see_or_move_bookings() {
    let app = app().await;
    let id = create_booking(&app, 1000).await;

    let (status, _) = send(&app, Method::GET, &format!("/booking/{id}"), Some("mallory"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = set_status(&app, &id, "mallory", "CANCELLED").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["currentStatus"], "PENDING");

    let (status, body) = send(&app, Method::GET, &format!("/booking/{id}"), Some(PROVIDER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], CUSTOMER);
}

#[tokio::test]
async fn listings_filter_by_status() {
    let app = app().await;
    let first = create_booking(&app, 1000).await;
    let second = create_booking(&app, 2000).await;
    set_status(&app, &first, PROVIDER, "ACCEPTED").await;

    let (_, body) = send(&app, Method::GET, "/booking/my-bookings", Some(CUSTOMER), None).await;
    let ids: Vec<&str> = body["bookings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);

    let (_, body) = send(&app, Method::GET, "/booking/my-jobs/accepted", Some(PROVIDER), None).await;
    let jobs = body["bookings"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], first.as_str());

    let (status, _) = send(&app, Method::GET, "/booking/my-jobs/DONE", Some(PROVIDER), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_top_up_is_unprocessable() {
    let app = app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/wallet/topup",
        Some(CUSTOMER),
        Some(json!({ "amount": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "INVALID_INPUT");
    assert_eq!(balance(&app, CUSTOMER).await, 0);
}

#[tokio::test]
async fn one_cent_booking_is_unprocessable() {
    let app = app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/booking",
        Some(CUSTOMER),
        Some(json!({
            "providerId": PROVIDER,
            "price": 1,
            "dateTime": Utc::now().to_rfc3339(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "INVALID_INPUT");
}

#[tokio::test]
async fn notifications_can_be_marked_read() {
    let app = app().await;
    let id = create_booking(&app, 1000).await;
    set_status(&app, &id, PROVIDER, "ACCEPTED").await;

    let (status, body) = send(&app, Method::GET, "/notifications", Some(CUSTOMER), None).await;
    assert_eq!(status, StatusCode::OK);
    let notifications = body["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["read"], false);
    let notification_id = notifications[0]["id"].as_str().unwrap().to_string();

    let uri = format!("/notifications/{notification_id}/read");
    let (status, _) = send(&app, Method::PUT, &uri, Some(PROVIDER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::PUT, &uri, Some(CUSTOMER), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, Method::GET, "/notifications", Some(CUSTOMER), None).await;
    assert_eq!(body["notifications"][0]["read"], true);
}
