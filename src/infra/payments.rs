//! Stripe Checkout integration.
//!
//! Sessions are created and retrieved through `async-stripe`; webhook
//! signatures are verified locally (HMAC-SHA256 over `"{t}.{payload}"`).

use std::collections::HashMap;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, CheckoutSessionPaymentStatus, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, Currency, RequestStrategy,
};
use uuid::Uuid;

use crate::config::WEBHOOK_TOLERANCE_SECONDS;
use crate::domain::OrderItem;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

type HmacSha256 = Hmac<Sha256>;

/// Everything needed to open a hosted checkout page for an order
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionRequest {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub customer_email: String,
    pub currency: String,
    pub items: Vec<OrderItem>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl SessionPaymentStatus {
    /// Whether the buyer should receive the goods
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SessionPaymentStatus::Paid | SessionPaymentStatus::NoPaymentRequired
        )
    }
}

impl From<&str> for SessionPaymentStatus {
    fn from(s: &str) -> Self {
        match s {
            "paid" => SessionPaymentStatus::Paid,
            "no_payment_required" => SessionPaymentStatus::NoPaymentRequired,
            _ => SessionPaymentStatus::Unpaid,
        }
    }
}

/// Provider view of a checkout session
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionInfo {
    pub id: String,
    pub url: Option<String>,
    pub payment_status: SessionPaymentStatus,
    pub payment_intent_id: Option<String>,
}

/// Hosted checkout provider
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a one-off payment session. The order id is the idempotency key.
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> AppResult<CheckoutSessionInfo>;

    async fn retrieve_checkout_session(&self, session_id: &str) -> AppResult<CheckoutSessionInfo>;
}

/// `PaymentGateway` backed by the Stripe API
pub struct StripeGateway {
    client: Client,
}

impl StripeGateway {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> AppResult<CheckoutSessionInfo> {
        let currency: Currency = request
            .currency
            .parse()
            .map_err(|_| AppError::internal(format!("Unsupported currency '{}'", request.currency)))?;

        let client = self
            .client
            .clone()
            .with_strategy(RequestStrategy::Idempotent(request.order_id.to_string()));

        let order_id = request.order_id.to_string();
        let metadata: HashMap<String, String> = HashMap::from([
            ("order_id".to_string(), order_id.clone()),
            ("user_id".to_string(), request.user_id.to_string()),
        ]);

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Payment);
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.client_reference_id = Some(&order_id);
        params.customer_email = Some(&request.customer_email);
        params.metadata = Some(metadata);
        params.line_items = Some(
            request
                .items
                .iter()
                .map(|item| CreateCheckoutSessionLineItems {
                    price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                        currency,
                        product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                            name: item.title.clone(),
                            ..Default::default()
                        }),
                        unit_amount: Some(item.price_cents),
                        ..Default::default()
                    }),
                    quantity: Some(1),
                    ..Default::default()
                })
                .collect(),
        );

        let session = CheckoutSession::create(&client, params)
            .await
            .map_err(|e| AppError::payment_provider(e.to_string()))?;

        tracing::info!(
            order_id = %request.order_id,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(session_info(session))
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> AppResult<CheckoutSessionInfo> {
        let id: CheckoutSessionId = session_id
            .parse()
            .map_err(|_| AppError::bad_request("Invalid checkout session id"))?;

        let session = CheckoutSession::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| AppError::payment_provider(e.to_string()))?;

        Ok(session_info(session))
    }
}

fn session_info(session: CheckoutSession) -> CheckoutSessionInfo {
    let payment_status = match session.payment_status {
        CheckoutSessionPaymentStatus::Paid => SessionPaymentStatus::Paid,
        CheckoutSessionPaymentStatus::NoPaymentRequired => SessionPaymentStatus::NoPaymentRequired,
        CheckoutSessionPaymentStatus::Unpaid => SessionPaymentStatus::Unpaid,
    };

    CheckoutSessionInfo {
        id: session.id.to_string(),
        url: session.url,
        payment_status,
        payment_intent_id: session.payment_intent.as_ref().map(|pi| pi.id().to_string()),
    }
}

// =============================================================================
// Webhooks
// =============================================================================

/// Verify a `Stripe-Signature` header against the raw request body.
///
/// The header carries `t=<unix seconds>` and one or more `v1=<hex>` entries.
/// Any `v1` matching HMAC-SHA256(secret, "{t}.{payload}") is accepted, as
/// long as `t` is within the tolerance window around `now`.
pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> AppResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = value.parse().ok();
            }
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| AppError::WebhookSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(AppError::WebhookSignature("missing v1 signature".into()));
    }
    if now.abs_diff(timestamp) > WEBHOOK_TOLERANCE_SECONDS.unsigned_abs() {
        return Err(AppError::WebhookSignature("timestamp outside tolerance".into()));
    }

    let mac = signed_payload_mac(payload, secret, timestamp)?;
    let matched = signatures
        .iter()
        .any(|candidate| mac.clone().verify_slice(candidate).is_ok());

    if matched {
        Ok(())
    } else {
        Err(AppError::WebhookSignature("no matching signature".into()))
    }
}

/// Build a `Stripe-Signature` header for `payload`. Used to replay events
/// locally.
pub fn sign_webhook_payload(payload: &[u8], secret: &str, timestamp: i64) -> AppResult<String> {
    let mac = signed_payload_mac(payload, secret, timestamp)?;
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

fn signed_payload_mac(payload: &[u8], secret: &str, timestamp: i64) -> AppResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::internal(format!("Invalid webhook secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Envelope of a webhook event
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// Fields of a checkout session object used for fulfillment
#[derive(Debug, Clone, Deserialize)]
pub struct SessionObject {
    pub id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SessionObject {
    /// Order id from metadata, then from the client reference
    pub fn order_id(&self) -> Option<Uuid> {
        self.metadata
            .get("order_id")
            .or(self.client_reference_id.as_ref())
            .and_then(|id| id.parse().ok())
    }

    pub fn payment_status(&self) -> SessionPaymentStatus {
        self.payment_status
            .as_deref()
            .map(SessionPaymentStatus::from)
            .unwrap_or(SessionPaymentStatus::Unpaid)
    }
}

/// What a webhook event asks us to do
#[derive(Debug, Clone)]
pub enum CheckoutEvent {
    /// Payment settled, grant access
    Fulfill(SessionObject),
    /// Completed but still waiting for an async payment method
    AwaitingPayment(SessionObject),
    Failed(SessionObject),
    Expired(SessionObject),
    Ignored,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> AppResult<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| AppError::bad_request(format!("Malformed webhook event: {}", e)))
    }

    pub fn checkout_event(&self) -> AppResult<CheckoutEvent> {
        let session = || -> AppResult<SessionObject> {
            serde_json::from_value(self.data.object.clone()).map_err(|e| {
                AppError::bad_request(format!("Malformed checkout session: {}", e))
            })
        };

        Ok(match self.event_type.as_str() {
            "checkout.session.completed" => {
                let session = session()?;
                if session.payment_status().is_settled() {
                    CheckoutEvent::Fulfill(session)
                } else {
                    CheckoutEvent::AwaitingPayment(session)
                }
            }
            "checkout.session.async_payment_succeeded" => CheckoutEvent::Fulfill(session()?),
            "checkout.session.async_payment_failed" => CheckoutEvent::Failed(session()?),
            "checkout.session.expired" => CheckoutEvent::Expired(session()?),
            _ => CheckoutEvent::Ignored,
        })
    }
}
