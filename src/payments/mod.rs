//! Payment gateway abstraction.
//!
//! Handlers talk to `PaymentGateway` only; the Stripe implementation lives
//! in `stripe`. Tests inject a double instead of hitting the network.

mod stripe;

pub use stripe::{
    StripeAccountObject, StripeCheckoutSessionObject, StripeClient, StripeWebhookEvent,
};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Share of the event price forwarded to the chef's connected account;
/// the remainder stays with the platform.
pub const CHEF_SHARE_PERCENT: i64 = 84;

/// 84% of the price, floor division.
pub fn chef_transfer_amount(price_cents: i64) -> i64 {
    price_cents * CHEF_SHARE_PERCENT / 100
}

/// Which webhook endpoint a signature belongs to. Platform events and
/// Connect (account.*) events are signed with different secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEndpoint {
    Platform,
    Connect,
}

/// Capability flags of a connected account, as reported by the gateway.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AccountStatus {
    pub charges_enabled: bool,
    pub details_submitted: bool,
    pub payouts_enabled: bool,
}

/// Everything needed to open a checkout session for one event join.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub event_id: String,
    pub foodie_id: String,
    pub chef_id: String,
    pub chef_account_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub product_name: String,
    /// Where the embedded checkout sends the user afterwards. Must contain
    /// the `{CHECKOUT_SESSION_ID}` template placeholder.
    pub return_url: String,
    /// Authorize now, capture on host acceptance.
    pub capture_manually: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a connected account for a chef, returning the account id.
    async fn create_connected_account(&self, email: &str) -> Result<String>;

    /// Create an onboarding link for a connected account.
    async fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String>;

    async fn get_account_status(&self, account_id: &str) -> Result<AccountStatus>;

    /// One-time login link into the connected account's dashboard.
    async fn create_login_link(&self, account_id: &str) -> Result<String>;

    async fn create_checkout_session(&self, req: &CheckoutRequest) -> Result<CheckoutSession>;

    async fn retrieve_session_status(&self, session_id: &str) -> Result<SessionStatus>;

    /// Capture a previously authorized payment intent.
    async fn capture_payment_intent(&self, payment_intent_id: &str) -> Result<()>;

    /// Issue a partial refund, returning the refund id. `reverse_transfer`
    /// claws the proportional share back from the connected account.
    async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount_cents: i64,
        reverse_transfer: bool,
    ) -> Result<String>;

    /// Verify a webhook signature against the secret for `endpoint`.
    /// Returns Ok(false) for a well-formed but wrong or stale signature.
    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
        endpoint: WebhookEndpoint,
    ) -> Result<bool>;
}
