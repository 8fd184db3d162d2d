use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{
    GatewayError, PaymentGateway, PaymentIntent, PaymentIntentRequest, Refund, RefundRequest,
};
use crate::config::settings::StripeConfig;

/// Stripe REST client. Requests are form encoded and authenticated with the
/// secret key as a bearer token.
#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig, secret_key: &str) -> Result<Self, GatewayError> {
        let timeout = Duration::from_secs(if config.timeout_secs > 0 {
            config.timeout_secs
        } else {
            15
        });
        let http = Client::builder().use_rustls_tls().timeout(timeout).build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    fn post(&self, path: &str, idempotency_key: Option<&str>) -> RequestBuilder {
        let request = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key);

        match idempotency_key {
            Some(key) => request.header("Idempotency-Key", key),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let response = request.send().await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_value(body).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self, request), fields(event_id = %request.event_id, user_id = %request.user_id))]
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        let form = [
            ("amount", request.amount_cents.to_string()),
            ("currency", request.currency.to_lowercase()),
            ("payment_method_types[]", "card".to_string()),
            ("metadata[event_id]", request.event_id.to_string()),
            ("metadata[user_id]", request.user_id.to_string()),
        ];

        let intent: PaymentIntent = self
            .send(
                self.post("/v1/payment_intents", request.idempotency_key.as_deref())
                    .form(&form),
            )
            .await?;

        debug!(intent_id = %intent.id, "Payment intent created");
        Ok(intent)
    }

    #[instrument(skip(self, request), fields(intent_id = %request.payment_intent_id))]
    async fn create_refund(&self, request: &RefundRequest) -> Result<Refund, GatewayError> {
        let form = [
            ("payment_intent", request.payment_intent_id.clone()),
            ("amount", request.amount_cents.to_string()),
        ];

        let refund: Refund = self
            .send(
                self.post("/v1/refunds", request.idempotency_key.as_deref())
                    .form(&form),
            )
            .await?;

        debug!(refund_id = %refund.id, "Refund created");
        Ok(refund)
    }
}
