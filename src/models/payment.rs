use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Ledger lifecycle of a deposit. Driven forward by processor webhooks and the
/// refund sweep; never moves backwards except when a refund claim is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Authorized,
    RequiresAction,
    Succeeded,
    Failed,
    Canceled,
    RefundInProgress,
    Refunded,
    PartialRefund,
}

text_enum!(PaymentStatus, "payment status", {
    Authorized => "authorized",
    RequiresAction => "requires_action",
    Succeeded => "succeeded",
    Failed => "failed",
    Canceled => "canceled",
    RefundInProgress => "refund_in_progress",
    Refunded => "refunded",
    PartialRefund => "partial_refund",
});

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Canceled | PaymentStatus::Refunded
        )
    }

    /// Statuses a row may be in for `self` to be reached by a forward move.
    pub fn predecessors(&self) -> &'static [PaymentStatus] {
        use PaymentStatus::*;
        match self {
            Authorized | RequiresAction => &[],
            Succeeded | Failed | Canceled => &[Authorized, RequiresAction],
            RefundInProgress => &[Succeeded],
            PartialRefund => &[Succeeded, RefundInProgress],
            Refunded => &[Succeeded, RefundInProgress, PartialRefund],
        }
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        next.predecessors().contains(self)
    }

    /// Statuses on which a refund completion still records its fee.
    pub const REFUND_RECORDABLE: [PaymentStatus; 3] = [
        PaymentStatus::RefundInProgress,
        PaymentStatus::PartialRefund,
        PaymentStatus::Refunded,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub stripe_payment_intent_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub fee_cents: i64,
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    pub idempotency_key: Option<String>,
    /// When the current refund claim was taken. Claims older than the
    /// configured lease may be taken over by a later sweep.
    pub refund_claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub stripe_payment_intent_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub idempotency_key: Option<String>,
}
