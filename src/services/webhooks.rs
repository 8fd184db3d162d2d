//! Payment processor notifications.
//!
//! The processor retries anything that is not a 2xx, so every well-formed
//! notification is acknowledged, including types this service ignores.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::models::{PaymentStatus, RefundStatus};
use crate::payments::signature::{verify_stripe_signature, SignatureError};
use crate::utils::error::{AppError, AppResult};
use crate::AppState;

/// Ledger change implied by a processor notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerUpdate {
    pub payment_intent_id: String,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Maps a `{ type, data: { object } }` envelope to a ledger update. `None`
/// for missing or unhandled types and for objects without an identifier.
pub fn classify(envelope: &Value) -> Option<LedgerUpdate> {
    let kind = envelope.get("type")?.as_str()?;
    let object = envelope.get("data")?.get("object")?;

    let (payment_intent_id, status) = match kind {
        "payment_intent.succeeded" => (string_field(object, "id")?, PaymentStatus::Succeeded),
        "payment_intent.payment_failed" => (string_field(object, "id")?, PaymentStatus::Failed),
        "payment_intent.canceled" => (string_field(object, "id")?, PaymentStatus::Canceled),
        "charge.refunded" | "refund.updated" | "charge.refund.updated" => {
            let intent_id = intent_reference(object, "payment_intent")
                .or_else(|| string_field(object, "payment_intent_id"))
                .or_else(|| string_field(object, "id"))?;
            (intent_id, refund_status(object))
        }
        _ => return None,
    };

    Some(LedgerUpdate {
        payment_intent_id,
        status,
    })
}

/// `partial_refund` while some but not all of the charge has been returned.
fn refund_status(object: &Value) -> PaymentStatus {
    let refunded = object.get("amount_refunded").and_then(Value::as_f64);
    let amount = object.get("amount").and_then(Value::as_f64);

    match (refunded, amount) {
        (Some(refunded), Some(amount)) if refunded > 0.0 && refunded < amount => {
            PaymentStatus::PartialRefund
        }
        _ => PaymentStatus::Refunded,
    }
}

fn string_field(object: &Value, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// The intent reference is a plain id unless the object was expanded.
fn intent_reference(object: &Value, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        expanded @ Value::Object(_) => string_field(expanded, "id"),
        _ => None,
    }
}

#[instrument(skip_all)]
pub async fn handle_webhook(
    state: &AppState,
    signature: Option<&str>,
    payload: &[u8],
    now: DateTime<Utc>,
) -> AppResult<WebhookAck> {
    if let Some(secret) = state.settings.stripe_webhook_secret() {
        let tolerance = state.settings.stripe.webhook_tolerance_secs;
        signature
            .ok_or(SignatureError::MissingHeader)
            .and_then(|header| {
                verify_stripe_signature(payload, header, secret, now.timestamp(), tolerance)
            })
            .map_err(|e| {
                warn!(error = %e, "Webhook signature rejected");
                AppError::AuthError("Invalid signature".to_string())
            })?;
    }

    let envelope: Value = serde_json::from_slice(payload)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    apply_webhook(state, &envelope).await?;
    Ok(WebhookAck { received: true })
}

/// Applies the notification along a forward transition only. Returns the
/// number of ledger rows that moved.
pub async fn apply_webhook(state: &AppState, envelope: &Value) -> AppResult<usize> {
    let Some(update) = classify(envelope) else {
        let kind = envelope.get("type").and_then(Value::as_str).unwrap_or("<none>");
        debug!(kind, "Ignoring webhook");
        return Ok(0);
    };

    let moved = state
        .store
        .transition_by_intent(&update.payment_intent_id, update.status)
        .await?;

    if moved.is_empty() {
        debug!(
            intent_id = %update.payment_intent_id,
            status = %update.status,
            "No ledger row eligible for webhook transition"
        );
    } else {
        info!(
            intent_id = %update.payment_intent_id,
            status = %update.status,
            rows = moved.len(),
            "Ledger updated from webhook"
        );
    }

    if let Some(refund_status) = settled_refund(update.status) {
        for payment in &moved {
            let settled = state
                .store
                .settle_pending_refund(payment.event_id, payment.user_id, refund_status)
                .await?;
            if settled {
                info!(
                    event_id = %payment.event_id,
                    user_id = %payment.user_id,
                    refund_status = %refund_status,
                    "Participant refund settled from webhook"
                );
            }
        }
    }

    Ok(moved.len())
}

/// Participant refund outcome a payment status settles, if any.
fn settled_refund(status: PaymentStatus) -> Option<RefundStatus> {
    match status {
        PaymentStatus::Refunded => Some(RefundStatus::FullRefund),
        PaymentStatus::PartialRefund => Some(RefundStatus::PartialRefund),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(kind: &str, object: Value) -> Value {
        json!({ "type": kind, "data": { "object": object } })
    }

    #[test]
    fn payment_intent_outcomes_map_directly() {
        let cases = [
            ("payment_intent.succeeded", PaymentStatus::Succeeded),
            ("payment_intent.payment_failed", PaymentStatus::Failed),
            ("payment_intent.canceled", PaymentStatus::Canceled),
        ];
        for (kind, status) in cases {
            let update = classify(&envelope(kind, json!({ "id": "pi_123" }))).unwrap();
            assert_eq!(
                update,
                LedgerUpdate {
                    payment_intent_id: "pi_123".to_string(),
                    status
                }
            );
        }
    }

    #[test]
    fn partially_refunded_charge_maps_to_partial_refund() {
        let charge = json!({
            "id": "ch_1",
            "payment_intent": "pi_9",
            "amount": 1000,
            "amount_refunded": 450
        });
        let update = classify(&envelope("charge.refunded", charge)).unwrap();
        assert_eq!(update.payment_intent_id, "pi_9");
        assert_eq!(update.status, PaymentStatus::PartialRefund);
    }

    #[test]
    fn fully_or_unknown_refunded_amounts_map_to_refunded() {
        let full = json!({ "payment_intent": "pi_9", "amount": 1000, "amount_refunded": 1000 });
        assert_eq!(
            classify(&envelope("charge.refunded", full)).unwrap().status,
            PaymentStatus::Refunded
        );

        // A refund object carries no amount_refunded.
        let refund = json!({ "id": "re_1", "payment_intent": "pi_9", "amount": 450 });
        assert_eq!(
            classify(&envelope("refund.updated", refund)).unwrap().status,
            PaymentStatus::Refunded
        );
    }

    #[test]
    fn refund_intent_id_falls_back_in_order() {
        let by_alias = json!({ "payment_intent_id": "pi_alias", "id": "ch_1" });
        assert_eq!(
            classify(&envelope("charge.refund.updated", by_alias))
                .unwrap()
                .payment_intent_id,
            "pi_alias"
        );

        let by_id = json!({ "id": "pi_self" });
        assert_eq!(
            classify(&envelope("charge.refunded", by_id)).unwrap().payment_intent_id,
            "pi_self"
        );

        let expanded = json!({ "payment_intent": { "id": "pi_expanded" }, "id": "ch_1" });
        assert_eq!(
            classify(&envelope("charge.refunded", expanded))
                .unwrap()
                .payment_intent_id,
            "pi_expanded"
        );
    }

    #[test]
    fn unknown_and_missing_types_are_ignored() {
        assert!(classify(&envelope("customer.created", json!({ "id": "cus_1" }))).is_none());
        assert!(classify(&json!({ "data": { "object": { "id": "pi_1" } } })).is_none());
        assert!(classify(&json!({ "type": "payment_intent.succeeded" })).is_none());
        assert!(classify(&json!([])).is_none());
    }
}
