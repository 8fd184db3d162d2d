pub mod refund;
pub mod signature;
pub mod stripe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use refund::{RefundKind, RefundQuote};
pub use stripe::StripeClient;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The processor answered with a non-2xx status. `body` is its error JSON.
    #[error("Payment processor rejected the request with status {status}")]
    Rejected { status: u16, body: Value },

    #[error("Payment processor request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected payment processor response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone)]
pub struct PaymentIntentRequest {
    pub amount_cents: i64,
    /// Lower-case ISO currency code as the processor expects it.
    pub currency: String,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub payment_intent_id: String,
    pub amount_cents: i64,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// External payment processor. The process holds one only when a secret key
/// is configured.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError>;

    async fn create_refund(&self, request: &RefundRequest) -> Result<Refund, GatewayError>;
}
