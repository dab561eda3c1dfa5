mod common;

use axum::{
    Json, Router,
    body::{Body, to_bytes},
    extract::State,
    http::{HeaderMap, Request, StatusCode, header::AUTHORIZATION},
    routing::post,
};
use chrono::Utc;
use common::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;
use vps_billing::adapters::admin::token_matches;
use vps_billing::adapters::notifier::HttpRenewalNotifier;
use vps_billing::domain::error::PipelineError;
use vps_billing::domain::provider::{RenewalNotice, RenewalNotifier, WebhookTarget};
use vps_billing::settings::{SettingsDefaults, SettingsStore};
use vps_billing::{AppState, app, with_request_limits};

const DB: &str = "vps_billing_test_http";

async fn state(admin_token: Option<&str>) -> AppState {
    let pool = setup_pool(DB).await;
    AppState {
        pool: pool.clone(),
        stripe_webhook_secret: Arc::from("whsec_test"),
        queue: Arc::new(RecordingQueue::default()),
        settings: Arc::new(SettingsStore::new(pool, SettingsDefaults::default())),
        admin_token: admin_token.map(Arc::from),
    }
}

/// `Stripe-Signature` header value for `body`, signed now.
fn sign(body: &str, secret: &str) -> String {
    let timestamp = Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.{body}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

fn signed_webhook(body: &str) -> Request<Body> {
    Request::post("/webhooks/stripe")
        .header("Stripe-Signature", sign(body, "whsec_test"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ── 1. health ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_check_answers_ok() {
    let response = app(state(None).await)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ── 2. webhook signature ───────────────────────────────────────────────────

#[tokio::test]
async fn webhook_without_signature_is_rejected() {
    let body = serde_json::json!({"id": new_event_id(), "type": "checkout.session.completed"});
    let response = app(state(None).await)
        .oneshot(
            Request::post("/webhooks/stripe")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error_code"], "webhook_error");
}

#[tokio::test]
async fn webhook_with_forged_signature_is_rejected() {
    let body = serde_json::json!({"id": new_event_id(), "type": "checkout.session.completed"});
    let response = app(state(None).await)
        .oneshot(
            Request::post("/webhooks/stripe")
                .header("Stripe-Signature", "t=1700000000,v1=deadbeef")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment_events WHERE gateway_event_id = $1")
        .bind(body["id"].as_str().unwrap())
        .fetch_one(&setup_pool(DB).await)
        .await
        .unwrap();
    assert_eq!(count, 0, "rejected deliveries never reach the ledger");
}

// ── 3. signed deliveries ───────────────────────────────────────────────────
// These envelopes lack fields the SDK's typed event requires, so they pass
// signature verification and then take the BadParse fallback parser.

#[tokio::test]
async fn signed_checkout_is_processed_once() {
    let state = state(None).await;
    let order = seed_order(&state.pool, "pending_payment", &[("monthly", 2999)]).await;
    let event = checkout_event(&new_event_id(), order.order_id, &new_intent_id());
    let body = event.payload.to_string();

    let response = app(state.clone()).oneshot(signed_webhook(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "processed");
    assert_eq!(order_status(&state.pool, order.order_id).await, "provisioning");

    // Gateway redelivery of the same event.
    let response = app(state.clone()).oneshot(signed_webhook(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "duplicate");
    assert_eq!(service_ids_for_order(&state.pool, order.order_id).await.len(), 1);
}

#[tokio::test]
async fn signed_checkout_for_unknown_order_asks_for_redelivery() {
    let state = state(None).await;
    let event = checkout_event(&new_event_id(), Uuid::now_v7(), &new_intent_id());

    let response = app(state)
        .oneshot(signed_webhook(&event.payload.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "event_failed");
    assert!(body["message"].as_str().unwrap().contains(&event.id.to_string()));
}

#[tokio::test]
async fn signed_event_of_unmodelled_type_is_ignored() {
    let body = serde_json::json!({
        "id": new_event_id(),
        "type": "customer.created",
        "data": {"object": {}}
    })
    .to_string();

    let response = app(state(None).await).oneshot(signed_webhook(&body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ignored");
}

#[tokio::test]
async fn signature_from_another_secret_is_rejected() {
    let body = serde_json::json!({"id": new_event_id(), "type": "customer.created"}).to_string();
    let response = app(state(None).await)
        .oneshot(
            Request::post("/webhooks/stripe")
                .header("Stripe-Signature", sign(&body, "whsec_other"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error_code"], "webhook_error");
}

// ── 4. admin auth ──────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_routes_closed_without_configured_token() {
    let response = app(state(None).await)
        .oneshot(
            Request::post("/admin/settings/reload")
                .header(AUTHORIZATION, "Bearer anything")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_rejects_wrong_bearer() {
    let uri = format!("/admin/services/{}/reprovision", Uuid::now_v7());
    let response = app(state(Some("admin-secret")).await)
        .oneshot(
            Request::post(uri)
                .header(AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_rejects_prefix_and_extended_tokens() {
    for presented in ["admin-secre", "admin-secretX", ""] {
        let response = app(state(Some("admin-secret")).await)
            .oneshot(
                Request::post("/admin/settings/reload")
                    .header(AUTHORIZATION, format!("Bearer {presented}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "token {presented:?}");
    }
}

#[test]
fn token_comparison_needs_exact_bytes() {
    assert!(token_matches("admin-secret", "admin-secret"));
    assert!(!token_matches("admin-secret", "admin-secreT"));
    assert!(!token_matches("admin-secret", "admin-secre"));
    assert!(!token_matches("admin-secret", "admin-secret "));
    assert!(!token_matches("", "x"));
}

#[tokio::test]
async fn reprovision_unknown_service_is_not_found() {
    let uri = format!("/admin/services/{}/reprovision", Uuid::now_v7());
    let response = app(state(Some("admin-secret")).await)
        .oneshot(
            Request::post(uri)
                .header(AUTHORIZATION, "Bearer admin-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error_code"], "not_found");
}

#[tokio::test]
async fn reprovision_suspended_service_queues_job() {
    let state = state(Some("admin-secret")).await;
    let service = seed_service(&state.pool, "active", "suspended", None).await;
    let uri = format!("/admin/services/{}/reprovision", service.service_id);

    let response = app(state.clone())
        .oneshot(
            Request::post(uri)
                .header(AUTHORIZATION, "Bearer admin-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "queued");
    assert_eq!(body["service_id"], service.service_id.to_string());
    assert_eq!(service_state(&state.pool, service.service_id).await.status, "provisioning");
}

// ── 5. request limits ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn slow_request_times_out_with_408() {
    let router = with_request_limits(Router::new().route(
        "/slow",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            "late"
        }),
    ));

    let response = router
        .oneshot(Request::post("/slow").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let router = with_request_limits(
        Router::new().route("/echo", post(|body: String| async move { body.len().to_string() })),
    );

    let response = router
        .oneshot(
            Request::post("/echo")
                .body(Body::from(vec![b'a'; 65 * 1024]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

// ── 6. renewal notifier ────────────────────────────────────────────────────

type Captured = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

async fn capture(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    captured.lock().unwrap().push((auth, body));
    StatusCode::NO_CONTENT
}

#[tokio::test]
async fn notifier_posts_json_with_bearer() {
    let captured: Captured = Arc::default();
    let receiver = Router::new()
        .route("/ok", post(capture))
        .route("/down", post(|| async { StatusCode::SERVICE_UNAVAILABLE }))
        .with_state(captured.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, receiver).await.unwrap() });

    let notifier = HttpRenewalNotifier::default();
    let notice = RenewalNotice {
        service_id: Uuid::now_v7(),
        user_id: Uuid::now_v7(),
        days_left: 3,
        sent_at: Utc::now(),
    };

    notifier
        .notify(
            WebhookTarget {
                url: format!("http://{addr}/ok"),
                token: Some("hook-token".into()),
                timeout: Duration::from_secs(2),
            },
            notice.clone(),
        )
        .await
        .unwrap();

    let captured = captured.lock().unwrap().clone();
    assert_eq!(captured.len(), 1);
    let (auth, body) = &captured[0];
    assert_eq!(auth.as_deref(), Some("Bearer hook-token"));
    assert_eq!(body["event"], "renewal_reminder");
    assert_eq!(body["service_id"], notice.service_id.to_string());
    assert_eq!(body["days_left"], 3);

    let err = notifier
        .notify(
            WebhookTarget {
                url: format!("http://{addr}/down"),
                token: None,
                timeout: Duration::from_secs(2),
            },
            notice,
        )
        .await
        .unwrap_err();
    match err {
        PipelineError::Notification(message) => assert!(message.contains("503"), "{message}"),
        other => panic!("unexpected error: {other:?}"),
    }
}
