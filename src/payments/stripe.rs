use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::Config;
use crate::error::{msg, AppError, Result};

use super::{
    chef_transfer_amount, AccountStatus, CheckoutRequest, CheckoutSession, PaymentGateway,
    SessionStatus, WebhookEndpoint,
};

type HmacSha256 = Hmac<Sha256>;

const API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    webhook_secret: String,
    connect_webhook_secret: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct LinkResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct SessionStatusResponse {
    status: Option<String>,
    payment_status: Option<String>,
    customer_email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
}

impl StripeClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            secret_key: config.stripe_secret_key.clone(),
            webhook_secret: config.stripe_webhook_secret.clone(),
            connect_webhook_secret: config.stripe_connect_webhook_secret.clone(),
        }
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{}", API_BASE, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::GatewayUnavailable(format!("Stripe API error: {}", e)))?;

        Self::parse_response(response).await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", API_BASE, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::GatewayUnavailable(format!("Stripe API error: {}", e)))?;

        Self::parse_response(response).await
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(AppError::GatewayUnavailable(format!(
                    "Stripe API error ({}): {}",
                    status, error_text
                )));
            }
            return Err(AppError::Gateway(format!(
                "Stripe API error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::GatewayUnavailable(format!("Failed to parse Stripe response: {}", e)))
    }

    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    /// Stripe recommends 300 seconds (5 minutes).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    fn verify_signature_with(secret: &str, payload: &[u8], signature: &str) -> Result<bool> {
        // Stripe signature format: t=timestamp,v1=signature
        let mut timestamp = None;
        let mut sig_v1 = None;

        for part in signature.split(',') {
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                sig_v1 = Some(s);
            }
        }

        let timestamp_str =
            timestamp.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;
        let sig_v1 =
            sig_v1.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;

        // Reject stale timestamps to prevent replay.
        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| AppError::BadRequest(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

        let now = chrono::Utc::now().timestamp();
        let age = now - timestamp;

        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS
            );
            return Ok(false);
        }

        // Clock skew tolerance for timestamps from the future: 60 seconds.
        if age < -60 {
            tracing::warn!(
                "Stripe webhook rejected: timestamp in the future (age={}s)",
                age
            );
            return Ok(false);
        }

        let signed_payload = format!("{}.{}", timestamp_str, String::from_utf8_lossy(payload));

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        let expected_bytes = expected.as_bytes();
        let provided_bytes = sig_v1.as_bytes();

        // Length is not secret (always 64 hex chars for SHA-256), so a
        // non-constant-time length check is fine.
        if expected_bytes.len() != provided_bytes.len() {
            return Ok(false);
        }

        // Constant-time comparison to prevent timing attacks.
        Ok(expected_bytes.ct_eq(provided_bytes).into())
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_connected_account(&self, email: &str) -> Result<String> {
        let account: AccountResponse = self
            .post_form(
                "/accounts",
                &[
                    ("type", "express".to_string()),
                    ("email", email.to_string()),
                    ("capabilities[transfers][requested]", "true".to_string()),
                ],
            )
            .await?;
        Ok(account.id)
    }

    async fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String> {
        let link: LinkResponse = self
            .post_form(
                "/account_links",
                &[
                    ("account", account_id.to_string()),
                    ("refresh_url", refresh_url.to_string()),
                    ("return_url", return_url.to_string()),
                    ("type", "account_onboarding".to_string()),
                ],
            )
            .await?;
        Ok(link.url)
    }

    async fn get_account_status(&self, account_id: &str) -> Result<AccountStatus> {
        let account: StripeAccountObject = self.get(&format!("/accounts/{}", account_id)).await?;
        Ok(AccountStatus {
            charges_enabled: account.charges_enabled.unwrap_or(false),
            details_submitted: account.details_submitted.unwrap_or(false),
            payouts_enabled: account.payouts_enabled.unwrap_or(false),
        })
    }

    async fn create_login_link(&self, account_id: &str) -> Result<String> {
        let link: LinkResponse = self
            .post_form(&format!("/accounts/{}/login_links", account_id), &[])
            .await?;
        Ok(link.url)
    }

    async fn create_checkout_session(&self, req: &CheckoutRequest) -> Result<CheckoutSession> {
        let mut form: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("ui_mode", "embedded".to_string()),
            ("return_url", req.return_url.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", req.currency.clone()),
            (
                "line_items[0][price_data][unit_amount]",
                req.amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                req.product_name.clone(),
            ),
            (
                "payment_intent_data[transfer_data][destination]",
                req.chef_account_id.clone(),
            ),
            (
                "payment_intent_data[transfer_data][amount]",
                chef_transfer_amount(req.amount_cents).to_string(),
            ),
            ("metadata[event_id]", req.event_id.clone()),
            ("metadata[foodie_id]", req.foodie_id.clone()),
            ("metadata[chef_id]", req.chef_id.clone()),
        ];

        if req.capture_manually {
            form.push(("payment_intent_data[capture_method]", "manual".to_string()));
        }

        let session: CheckoutSessionResponse =
            self.post_form("/checkout/sessions", &form).await?;
        Ok(CheckoutSession {
            id: session.id,
            client_secret: session.client_secret,
        })
    }

    async fn retrieve_session_status(&self, session_id: &str) -> Result<SessionStatus> {
        let session: SessionStatusResponse = self
            .get(&format!("/checkout/sessions/{}", session_id))
            .await?;
        Ok(SessionStatus {
            status: session.status,
            payment_status: session.payment_status,
            customer_email: session.customer_email,
        })
    }

    async fn capture_payment_intent(&self, payment_intent_id: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_form(
                &format!("/payment_intents/{}/capture", payment_intent_id),
                &[],
            )
            .await?;
        Ok(())
    }

    async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount_cents: i64,
        reverse_transfer: bool,
    ) -> Result<String> {
        let refund: RefundResponse = self
            .post_form(
                "/refunds",
                &[
                    ("payment_intent", payment_intent_id.to_string()),
                    ("amount", amount_cents.to_string()),
                    ("reverse_transfer", reverse_transfer.to_string()),
                ],
            )
            .await?;
        Ok(refund.id)
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
        endpoint: WebhookEndpoint,
    ) -> Result<bool> {
        let secret = match endpoint {
            WebhookEndpoint::Platform => &self.webhook_secret,
            WebhookEndpoint::Connect => &self.connect_webhook_secret,
        };
        Self::verify_signature_with(secret, payload, signature)
    }
}

// ============ Webhook event payloads ============

/// Generic Stripe webhook event - object is parsed based on event_type.
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ============ checkout.session.completed / expired ============

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSessionObject {
    pub id: String,
    pub payment_status: Option<String>,
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: StripeMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeMetadata {
    pub event_id: Option<String>,
    pub foodie_id: Option<String>,
    pub chef_id: Option<String>,
}

// ============ account.updated ============

#[derive(Debug, Deserialize)]
pub struct StripeAccountObject {
    pub id: String,
    pub charges_enabled: Option<bool>,
    pub details_submitted: Option<bool>,
    pub payouts_enabled: Option<bool>,
}
