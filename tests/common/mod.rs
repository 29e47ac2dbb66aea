//! Test utilities and fixtures for Supperclub integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tower::ServiceExt;

pub use supperclub::auth::TokenKeys;
pub use supperclub::db::{init_db, queries, AppState, DbPool};
pub use supperclub::error::Result;
pub use supperclub::models::*;
pub use supperclub::payments::{
    AccountStatus, CheckoutRequest, CheckoutSession, PaymentGateway, SessionStatus,
    WebhookEndpoint,
};

/// Signature the mock gateway accepts; anything else is rejected.
pub const VALID_SIGNATURE: &str = "t=1,v1=mock-valid";

/// Payment gateway double: records calls, never touches the network.
pub struct MockGateway {
    pub charges_enabled: AtomicBool,
    pub details_submitted: AtomicBool,
    pub refund_calls: AtomicUsize,
    pub capture_calls: AtomicUsize,
    pub checkout_calls: AtomicUsize,
    pub fail_refunds: AtomicBool,
    pub last_refund: Mutex<Option<(String, i64, bool)>>,
    pub last_checkout: Mutex<Option<CheckoutRequest>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            charges_enabled: AtomicBool::new(true),
            details_submitted: AtomicBool::new(true),
            refund_calls: AtomicUsize::new(0),
            capture_calls: AtomicUsize::new(0),
            checkout_calls: AtomicUsize::new(0),
            fail_refunds: AtomicBool::new(false),
            last_refund: Mutex::new(None),
            last_checkout: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_connected_account(&self, _email: &str) -> Result<String> {
        Ok("acct_mock".to_string())
    }

    async fn create_account_link(
        &self,
        _account_id: &str,
        _refresh_url: &str,
        _return_url: &str,
    ) -> Result<String> {
        Ok("https://connect.example/onboarding".to_string())
    }

    async fn get_account_status(&self, _account_id: &str) -> Result<AccountStatus> {
        Ok(AccountStatus {
            charges_enabled: self.charges_enabled.load(Ordering::SeqCst),
            details_submitted: self.details_submitted.load(Ordering::SeqCst),
            payouts_enabled: self.charges_enabled.load(Ordering::SeqCst),
        })
    }

    async fn create_login_link(&self, _account_id: &str) -> Result<String> {
        Ok("https://connect.example/login".to_string())
    }

    async fn create_checkout_session(&self, req: &CheckoutRequest) -> Result<CheckoutSession> {
        self.checkout_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_checkout.lock().unwrap() = Some(req.clone());
        Ok(CheckoutSession {
            id: "cs_mock".to_string(),
            client_secret: "cs_mock_secret".to_string(),
        })
    }

    async fn retrieve_session_status(&self, _session_id: &str) -> Result<SessionStatus> {
        Ok(SessionStatus {
            status: Some("complete".to_string()),
            payment_status: Some("paid".to_string()),
            customer_email: None,
        })
    }

    async fn capture_payment_intent(&self, _payment_intent_id: &str) -> Result<()> {
        self.capture_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount_cents: i64,
        reverse_transfer: bool,
    ) -> Result<String> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(supperclub::error::AppError::Gateway(
                "mock refund failure".to_string(),
            ));
        }
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refund.lock().unwrap() =
            Some((payment_intent_id.to_string(), amount_cents, reverse_transfer));
        Ok("re_mock".to_string())
    }

    fn verify_webhook_signature(
        &self,
        _payload: &[u8],
        signature: &str,
        _endpoint: WebhookEndpoint,
    ) -> Result<bool> {
        Ok(signature == VALID_SIGNATURE)
    }
}

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// AppState over a shared in-memory pool plus the mock gateway.
pub fn create_test_state(require_host_approval: bool) -> (AppState, Arc<MockGateway>) {
    let manager = SqliteConnectionManager::memory();
    let pool: DbPool = Pool::builder().max_size(4).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    let gateway = Arc::new(MockGateway::default());
    let state = AppState {
        db: pool,
        gateway: gateway.clone(),
        tokens: TokenKeys::from_secret("test-secret"),
        frontend_url: "http://localhost:3000".to_string(),
        require_host_approval,
    };
    (state, gateway)
}

pub fn test_app(state: AppState) -> Router {
    supperclub::handlers::router().with_state(state)
}

pub fn create_test_user(conn: &Connection, name: &str, email: &str) -> User {
    let input = CreateUser {
        name: name.to_string(),
        email: email.to_string(),
        password: "password123".to_string(),
        university: None,
        description: None,
    };
    // Fixture rows don't go through login, so the hash can be a placeholder.
    queries::create_user(conn, &input, "$argon2id$placeholder").expect("Failed to create test user")
}

/// User with a connected account ready to take charges.
pub fn create_test_chef(conn: &Connection, name: &str, email: &str) -> User {
    let user = create_test_user(conn, name, email);
    queries::set_stripe_account(conn, &user.id, "acct_mock").unwrap();
    queries::set_stripe_onboarding(conn, &user.id, true).unwrap();
    queries::get_user_by_id(conn, &user.id).unwrap().unwrap()
}

pub fn create_test_meal(conn: &Connection, user_id: &str) -> Meal {
    let input = CreateMeal {
        title: "Test Meal".to_string(),
        description: "A test dish".to_string(),
        ingredients: "ingredients".to_string(),
        image_url: None,
    };
    queries::create_meal(conn, user_id, &input).expect("Failed to create test meal")
}

pub fn create_test_event(
    conn: &Connection,
    host_id: &str,
    meal_id: &str,
    price: i64,
    max_participants: i64,
    event_date: i64,
) -> Event {
    let input = CreateEvent {
        meal_id: meal_id.to_string(),
        title: "Test Event".to_string(),
        description: "A test event".to_string(),
        max_participants,
        location: "Test Kitchen".to_string(),
        event_date,
        image_url: None,
        price,
        currency: "usd".to_string(),
    };
    queries::create_event(conn, host_id, &input).expect("Failed to create test event")
}

/// Shortcut past the webhook: confirmed participation with a payment intent.
pub fn confirm_test_participation(
    conn: &mut Connection,
    event_id: &str,
    foodie_id: &str,
    payment_intent: &str,
) {
    let outcome =
        queries::confirm_participation(conn, event_id, foodie_id, payment_intent, false)
            .expect("Failed to confirm test participation");
    assert!(
        matches!(outcome, queries::ConfirmOutcome::Created),
        "unexpected outcome {:?}",
        outcome
    );
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn hours(n: i64) -> i64 {
    n * 3600
}

// ============ HTTP helpers ============

pub fn bearer(state: &AppState, user_id: &str) -> String {
    format!("Bearer {}", state.tokens.issue(user_id).unwrap())
}

pub fn json_request(method: &str, uri: &str, auth: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, body)
}

/// Webhook POST with a stripe-signature header.
pub fn webhook_request(uri: &str, signature: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header("stripe-signature", sig);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
