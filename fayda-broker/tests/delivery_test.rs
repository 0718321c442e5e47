//! Tests for webhook delivery of verified identities

mod common;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use common::{
    create_test_server, create_test_server_with, eventually, register_subscriber, sample_record,
    start_challenge, test_config, user_initiate_body, MockTransport, ScriptedDriver, CODE, FAN,
};
use fayda_broker::{DeliveryOutcome, ReqwestTransport, WebhookError, WebhookTransport};
use fayda_core::{CallbackPayload, CallbackToken, VERIFICATION_STATUS};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Verify an end user on behalf of `client_id`
async fn verify_for_client(ctx: &common::TestContext, client_id: &str) {
    let session_id = {
        let response = ctx
            .server
            .post("/api/v1/fayda/initiate")
            .add_header(
                HeaderName::from_static("x-client-id"),
                HeaderValue::from_str(client_id).unwrap(),
            )
            .json(&user_initiate_body())
            .await;
        assert_eq!(response.status_code(), 200);
        let body: Value = response.json();
        body["sessionId"].as_str().unwrap().to_string()
    };

    let response = ctx
        .server
        .post("/api/v1/fayda/verify")
        .json(&json!({ "sessionId": session_id, "code": CODE }))
        .await;
    assert_eq!(response.status_code(), 200);
}

// =============================================================================
// Through the HTTP flow
// =============================================================================

/// Test: a verified user is relayed to the calling client's webhook
#[tokio::test]
async fn test_verified_user_is_delivered() {
    let ctx = create_test_server(ScriptedDriver::challenge());
    let secret = register_subscriber(&ctx.state, "client-1", Some("https://hooks.example.com/fayda"));

    verify_for_client(&ctx, "client-1").await;

    let transport = ctx.transport.clone();
    assert!(eventually(|| transport.posts().len() == 1).await);

    let posted = &ctx.transport.posts()[0];
    assert_eq!(posted.url, "https://hooks.example.com/fayda");
    assert_eq!(posted.client_id, "client-1");

    let payload = CallbackToken::verify(&posted.token, &secret).unwrap();
    assert_eq!(payload.client_id, "client-1");
    assert_eq!(payload.fan, FAN);
    assert_eq!(payload.first_name, "Abebe");
    assert_eq!(payload.email, "abebe@example.com");
    assert_eq!(payload.verification_status, VERIFICATION_STATUS);

    let stored = ctx.state.registry.identities();
    assert_eq!(payload.user_id, stored[0].user_id);
    assert_eq!(ctx.email.failure_count(), 0);
}

/// Test: no webhook configured means nothing is posted
#[tokio::test]
async fn test_no_webhook_skips_delivery() {
    let ctx = create_test_server(ScriptedDriver::challenge());
    register_subscriber(&ctx.state, "client-1", None);

    verify_for_client(&ctx, "client-1").await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(ctx.transport.posts().is_empty());
    assert_eq!(ctx.email.failure_count(), 0);
}

/// Test: no X-Client-Id means nothing is queued
#[tokio::test]
async fn test_without_client_id_nothing_delivered() {
    let ctx = create_test_server(ScriptedDriver::challenge());
    register_subscriber(&ctx.state, "client-1", Some("https://hooks.example.com/fayda"));

    let session_id = start_challenge(&ctx.server, &user_initiate_body()).await;
    let response = ctx
        .server
        .post("/api/v1/fayda/verify")
        .json(&json!({ "sessionId": session_id, "code": CODE }))
        .await;
    assert_eq!(response.status_code(), 200);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(ctx.transport.posts().is_empty());
    assert!(ctx.state.registry.identities()[0].client_id.is_none());
}

/// Test: an unreachable webhook is tried three times, then escalated once
#[tokio::test]
async fn test_unreachable_webhook_escalates_once() {
    let ctx = create_test_server_with(
        test_config(),
        ScriptedDriver::challenge(),
        MockTransport::failing(),
    );
    register_subscriber(&ctx.state, "client-1", Some("https://down.example.com/hook"));

    // The HTTP response does not wait for delivery
    verify_for_client(&ctx, "client-1").await;

    let email = ctx.email.clone();
    assert!(eventually(|| email.failure_count() == 1).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(ctx.transport.posts().len(), 3);
    assert_eq!(ctx.email.failure_count(), 1);

    let (to, notice) = ctx.email.failures.read().unwrap()[0].clone();
    assert_eq!(to, "dev@example.com");
    assert_eq!(notice.webhook_url, "https://down.example.com/hook");
    assert_eq!(notice.attempts, 3);

    let dead = ctx.state.registrar.deliveries().service().dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].outcome, DeliveryOutcome::Escalated);
    assert_eq!(dead[0].client_id, "client-1");
}

// =============================================================================
// Over the wire
// =============================================================================

#[derive(Clone, Default)]
struct Receiver {
    received: Arc<RwLock<Vec<(Option<String>, Value)>>>,
}

async fn receive(
    State(receiver): State<Receiver>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let client_id = headers
        .get("x-client-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    receiver.received.write().unwrap().push((client_id, body));
    StatusCode::OK
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn slow() -> StatusCode {
    tokio::time::sleep(Duration::from_secs(2)).await;
    StatusCode::OK
}

/// Start a local webhook receiver and return its base URL
async fn spawn_receiver(receiver: Receiver) -> String {
    let app = Router::new()
        .route("/hook", post(receive))
        .route("/broken", post(broken))
        .route("/slow", post(slow))
        .with_state(receiver);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn payload() -> CallbackPayload {
    let record = sample_record(FAN);
    CallbackPayload {
        client_id: "client-1".to_string(),
        user_id: "user-1".to_string(),
        fan: record.fan,
        photo: record.image,
        name: record.name,
        first_name: "Abebe".to_string(),
        middle_name: "Kebede".to_string(),
        last_name: "Tesfaye".to_string(),
        email: "abebe@example.com".to_string(),
        region: record.region,
        date_of_birth: record.dob,
        zone: record.zone,
        gender: record.sex,
        woreda: record.woreda,
        nationality: record.nationality,
        phone_number: record.phone,
        verification_status: VERIFICATION_STATUS.to_string(),
    }
}

/// Test: the webhook receives `{token}` with the client id header
#[tokio::test]
async fn test_reqwest_transport_wire_format() {
    let receiver = Receiver::default();
    let base = spawn_receiver(receiver.clone()).await;
    let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
    let token = CallbackToken::sign(&payload(), "s3cret").unwrap();

    transport
        .post(&format!("{}/hook", base), "client-1", token.as_str())
        .await
        .unwrap();

    let received = receiver.received.read().unwrap().clone();
    assert_eq!(received.len(), 1);
    let (client_id, body) = &received[0];
    assert_eq!(client_id.as_deref(), Some("client-1"));
    assert_eq!(body.as_object().unwrap().len(), 1);

    let decoded = CallbackToken::verify(body["token"].as_str().unwrap(), "s3cret").unwrap();
    assert_eq!(decoded, payload());
}

/// Test: a non-2xx answer is a failed attempt
#[tokio::test]
async fn test_reqwest_transport_non_success_status() {
    let base = spawn_receiver(Receiver::default()).await;
    let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();

    let result = transport
        .post(&format!("{}/broken", base), "client-1", "token")
        .await;

    assert!(matches!(result, Err(WebhookError::Status(500))));
}

/// Test: a slow webhook times out
#[tokio::test]
async fn test_reqwest_transport_timeout() {
    let base = spawn_receiver(Receiver::default()).await;
    let transport = ReqwestTransport::new(Duration::from_millis(200)).unwrap();

    let result = transport
        .post(&format!("{}/slow", base), "client-1", "token")
        .await;

    assert!(matches!(result, Err(WebhookError::Timeout(_))));
}
