//! Webhook tests: signature verification on the real Stripe client, and
//! endpoint behavior (signature gate, idempotent confirmation, account
//! status sync) against the mock gateway.

mod common;
use common::*;

use axum::http::StatusCode;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use supperclub::config::Config;
use supperclub::payments::StripeClient;

// ============ Signature verification (real client) ============

const PLATFORM_SECRET: &str = "whsec_platform_test";
const CONNECT_SECRET: &str = "whsec_connect_test";

fn stripe_client() -> StripeClient {
    StripeClient::new(&Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_path: ":memory:".to_string(),
        frontend_url: "http://localhost:3000".to_string(),
        stripe_secret_key: "sk_test_xxx".to_string(),
        stripe_webhook_secret: PLATFORM_SECRET.to_string(),
        stripe_connect_webhook_secret: CONNECT_SECRET.to_string(),
        jwt_secret: "test".to_string(),
        require_host_approval: false,
        dev_mode: true,
    })
}

fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let signed = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(signed.as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[test]
fn valid_signature_accepted() {
    let client = stripe_client();
    let payload = br#"{"type":"checkout.session.completed"}"#;
    let sig = sign(PLATFORM_SECRET, now(), payload);
    assert!(client
        .verify_webhook_signature(payload, &sig, WebhookEndpoint::Platform)
        .unwrap());
}

#[test]
fn signature_with_wrong_secret_rejected() {
    let client = stripe_client();
    let payload = br#"{"type":"checkout.session.completed"}"#;
    let sig = sign("whsec_other", now(), payload);
    assert!(!client
        .verify_webhook_signature(payload, &sig, WebhookEndpoint::Platform)
        .unwrap());
}

#[test]
fn endpoints_use_distinct_secrets() {
    let client = stripe_client();
    let payload = br#"{"type":"account.updated"}"#;
    let sig = sign(CONNECT_SECRET, now(), payload);
    assert!(client
        .verify_webhook_signature(payload, &sig, WebhookEndpoint::Connect)
        .unwrap());
    assert!(!client
        .verify_webhook_signature(payload, &sig, WebhookEndpoint::Platform)
        .unwrap());
}

#[test]
fn tampered_payload_rejected() {
    let client = stripe_client();
    let sig = sign(PLATFORM_SECRET, now(), b"original");
    assert!(!client
        .verify_webhook_signature(b"tampered", &sig, WebhookEndpoint::Platform)
        .unwrap());
}

#[test]
fn stale_timestamp_rejected() {
    let client = stripe_client();
    let payload = b"payload";
    let sig = sign(PLATFORM_SECRET, now() - 600, payload);
    assert!(!client
        .verify_webhook_signature(payload, &sig, WebhookEndpoint::Platform)
        .unwrap());
}

#[test]
fn malformed_signature_is_an_error() {
    let client = stripe_client();
    assert!(client
        .verify_webhook_signature(b"payload", "garbage", WebhookEndpoint::Platform)
        .is_err());
    assert!(client
        .verify_webhook_signature(b"payload", "t=notanumber,v1=abc", WebhookEndpoint::Platform)
        .is_err());
}

// ============ Endpoint behavior (mock gateway) ============

fn setup_event(state: &AppState) -> (User, Event) {
    let conn = state.db.get().unwrap();
    let chef = create_test_chef(&conn, "Chef", "chef@example.com");
    let foodie = create_test_user(&conn, "Foodie", "foodie@example.com");
    let meal = create_test_meal(&conn, &chef.id);
    let event = create_test_event(&conn, &chef.id, &meal.id, 1000, 4, now() + hours(72));
    (foodie, event)
}

fn checkout_completed_body(event_id: &str, foodie_id: &str) -> serde_json::Value {
    json!({
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_mock",
                "payment_status": "paid",
                "payment_intent": "pi_webhook",
                "metadata": {
                    "event_id": event_id,
                    "foodie_id": foodie_id,
                    "chef_id": "unused"
                }
            }
        }
    })
}

#[tokio::test]
async fn missing_signature_header_rejected() {
    let (state, _) = create_test_state(false);
    let (foodie, event) = setup_event(&state);
    let app = test_app(state);

    let body = checkout_completed_body(&event.id, &foodie.id);
    let (status, _) = send(&app, webhook_request("/webhooks/stripe", None, body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_signature_rejected_without_writes() {
    let (state, _) = create_test_state(false);
    let (foodie, event) = setup_event(&state);
    let app = test_app(state.clone());

    let body = checkout_completed_body(&event.id, &foodie.id);
    let (status, _) = send(
        &app,
        webhook_request("/webhooks/stripe", Some("t=1,v1=bogus"), body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let conn = state.db.get().unwrap();
    assert!(queries::get_participation(&conn, &event.id, &foodie.id)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn checkout_completed_confirms_participation() {
    let (state, _) = create_test_state(false);
    let (foodie, event) = setup_event(&state);
    let app = test_app(state.clone());

    let body = checkout_completed_body(&event.id, &foodie.id);
    let (status, _) = send(
        &app,
        webhook_request("/webhooks/stripe", Some(VALID_SIGNATURE), body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let conn = state.db.get().unwrap();
    let row = queries::get_participation(&conn, &event.id, &foodie.id)
        .unwrap()
        .unwrap();
    assert_eq!(row.status, ParticipantStatus::Confirmed);
    assert_eq!(row.payment_intent_id.as_deref(), Some("pi_webhook"));
    let fetched = queries::get_event_by_id(&conn, &event.id).unwrap().unwrap();
    assert_eq!(fetched.current_participants, 1);
}

#[tokio::test]
async fn redelivered_webhook_acknowledged_once_applied() {
    let (state, _) = create_test_state(false);
    let (foodie, event) = setup_event(&state);
    let app = test_app(state.clone());

    for _ in 0..2 {
        let body = checkout_completed_body(&event.id, &foodie.id);
        let (status, _) = send(
            &app,
            webhook_request("/webhooks/stripe", Some(VALID_SIGNATURE), body),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let conn = state.db.get().unwrap();
    assert_eq!(queries::confirmed_count(&conn, &event.id).unwrap(), 1);
    let fetched = queries::get_event_by_id(&conn, &event.id).unwrap().unwrap();
    assert_eq!(fetched.current_participants, 1);
}

#[tokio::test]
async fn missing_foodie_metadata_acknowledged_with_zero_writes() {
    let (state, _) = create_test_state(false);
    let (_, event) = setup_event(&state);
    let app = test_app(state.clone());

    let body = json!({
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_mock",
                "payment_status": "paid",
                "payment_intent": "pi_webhook",
                "metadata": { "event_id": event.id }
            }
        }
    });
    let (status, _) = send(
        &app,
        webhook_request("/webhooks/stripe", Some(VALID_SIGNATURE), body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let conn = state.db.get().unwrap();
    assert_eq!(queries::confirmed_count(&conn, &event.id).unwrap(), 0);
    let fetched = queries::get_event_by_id(&conn, &event.id).unwrap().unwrap();
    assert_eq!(fetched.current_participants, 0);
}

#[tokio::test]
async fn unpaid_session_ignored() {
    let (state, _) = create_test_state(false);
    let (foodie, event) = setup_event(&state);
    let app = test_app(state.clone());

    let body = json!({
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_mock",
                "payment_status": "unpaid",
                "payment_intent": "pi_webhook",
                "metadata": { "event_id": event.id, "foodie_id": foodie.id }
            }
        }
    });
    let (status, _) = send(
        &app,
        webhook_request("/webhooks/stripe", Some(VALID_SIGNATURE), body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let conn = state.db.get().unwrap();
    assert!(queries::get_participation(&conn, &event.id, &foodie.id)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn unknown_event_type_acknowledged() {
    let (state, _) = create_test_state(false);
    let app = test_app(state);

    let body = json!({ "type": "invoice.paid", "data": { "object": {} } });
    let (status, _) = send(
        &app,
        webhook_request("/webhooks/stripe", Some(VALID_SIGNATURE), body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn full_event_webhook_acknowledged_without_write() {
    let (state, _) = create_test_state(false);
    let (foodie, event) = setup_event(&state);
    {
        let mut conn = state.db.get().unwrap();
        conn.execute(
            "UPDATE events SET max_participants = 1 WHERE id = ?1",
            rusqlite::params![event.id],
        )
        .unwrap();
        let other = create_test_user(&conn, "Other", "other@example.com");
        confirm_test_participation(&mut conn, &event.id, &other.id, "pi_other");
    }
    let app = test_app(state.clone());

    let body = checkout_completed_body(&event.id, &foodie.id);
    let (status, _) = send(
        &app,
        webhook_request("/webhooks/stripe", Some(VALID_SIGNATURE), body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let conn = state.db.get().unwrap();
    assert!(queries::get_participation(&conn, &event.id, &foodie.id)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn account_updated_syncs_onboarding_flag() {
    let (state, _) = create_test_state(false);
    let user = {
        let conn = state.db.get().unwrap();
        let user = create_test_user(&conn, "Chef", "chef@example.com");
        queries::set_stripe_account(&conn, &user.id, "acct_hook").unwrap();
        user
    };
    let app = test_app(state.clone());

    let body = json!({
        "type": "account.updated",
        "data": {
            "object": {
                "id": "acct_hook",
                "charges_enabled": true,
                "details_submitted": true,
                "payouts_enabled": true
            }
        }
    });
    let (status, _) = send(
        &app,
        webhook_request("/webhooks/stripe-connect", Some(VALID_SIGNATURE), body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let conn = state.db.get().unwrap();
    let user = queries::get_user_by_id(&conn, &user.id).unwrap().unwrap();
    assert!(user.stripe_onboarding_complete);
}

#[tokio::test]
async fn account_updated_for_unknown_account_acknowledged() {
    let (state, _) = create_test_state(false);
    let app = test_app(state);

    let body = json!({
        "type": "account.updated",
        "data": {
            "object": { "id": "acct_unknown", "details_submitted": true }
        }
    });
    let (status, _) = send(
        &app,
        webhook_request("/webhooks/stripe-connect", Some(VALID_SIGNATURE), body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn approval_mode_books_without_counting() {
    let (state, _) = create_test_state(true);
    let (foodie, event) = setup_event(&state);
    let app = test_app(state.clone());

    let body = json!({
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_mock",
                "payment_status": "unpaid",
                "payment_intent": "pi_auth",
                "metadata": { "event_id": event.id, "foodie_id": foodie.id }
            }
        }
    });
    let (status, _) = send(
        &app,
        webhook_request("/webhooks/stripe", Some(VALID_SIGNATURE), body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let conn = state.db.get().unwrap();
    let row = queries::get_participation(&conn, &event.id, &foodie.id)
        .unwrap()
        .unwrap();
    assert_eq!(row.status, ParticipantStatus::Booked);
    let fetched = queries::get_event_by_id(&conn, &event.id).unwrap().unwrap();
    assert_eq!(fetched.current_participants, 0);
}
