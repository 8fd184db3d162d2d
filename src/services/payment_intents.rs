use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::{NewPayment, Payment, PaymentStatus};
use crate::payments::PaymentIntentRequest;
use crate::utils::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateIntentRequest {
    #[serde(default)]
    pub event_id: Option<String>,
    /// Client-generated per join attempt. Retrying with the same key returns
    /// the same authorization and ledger row.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedIntent {
    pub client_secret: String,
    pub payment: Payment,
}

/// Authorizes the event's deposit with the processor and records it in the
/// ledger as `requires_action`.
#[instrument(skip(state, request), fields(user_id = %user.user_id))]
pub async fn create_payment_intent(
    state: &AppState,
    user: &AuthUser,
    request: CreateIntentRequest,
) -> AppResult<CreatedIntent> {
    let gateway = state
        .payments
        .as_ref()
        .ok_or_else(|| AppError::ConfigurationError("STRIPE_SECRET_KEY missing".to_string()))?;

    let raw_event_id = request
        .event_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::ValidationError("event_id required".to_string()))?;

    let not_found = || AppError::NotFound("Event not found".to_string());
    let event_id = Uuid::parse_str(raw_event_id).map_err(|_| not_found())?;
    let event = state.store.find_event(event_id).await?.ok_or_else(not_found)?;

    let amount_cents = event.effective_deposit_cents();
    let currency = event.effective_currency().to_string();
    let idempotency_key = request
        .idempotency_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| format!("{}:{}:{}", event.id, user.user_id, key));

    let intent = gateway
        .create_payment_intent(&PaymentIntentRequest {
            amount_cents,
            currency: currency.to_lowercase(),
            event_id: event.id,
            user_id: user.user_id,
            idempotency_key: idempotency_key.clone(),
        })
        .await?;

    let payment = state
        .store
        .insert_payment(&NewPayment {
            event_id: event.id,
            user_id: user.user_id,
            stripe_payment_intent_id: intent.id.clone(),
            amount_cents,
            currency: currency.to_uppercase(),
            status: PaymentStatus::RequiresAction,
            idempotency_key,
        })
        .await?;

    info!(
        event_id = %event.id,
        payment_id = %payment.id,
        intent_id = %intent.id,
        amount_cents,
        "Payment intent recorded"
    );

    Ok(CreatedIntent {
        client_secret: intent.client_secret,
        payment,
    })
}
