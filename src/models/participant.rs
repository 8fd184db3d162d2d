use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Invited,
    Requested,
    Confirmed,
    Attended,
    NoShow,
    Cancelled,
}

text_enum!(ParticipantStatus, "participant status", {
    Invited => "invited",
    Requested => "requested",
    Confirmed => "confirmed",
    Attended => "attended",
    NoShow => "no_show",
    Cancelled => "cancelled",
});

impl ParticipantStatus {
    /// Statuses that count a participant as having taken part in the date.
    pub const COUNTED: [ParticipantStatus; 2] =
        [ParticipantStatus::Confirmed, ParticipantStatus::Attended];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    FullRefund,
    PartialRefund,
    NoRefund,
}

text_enum!(RefundStatus, "refund status", {
    Pending => "pending",
    FullRefund => "full_refund",
    PartialRefund => "partial_refund",
    NoRefund => "no_refund",
});

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Participant {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: ParticipantStatus,
    pub deposit_amount_cents: i64,
    pub payment_id: Option<Uuid>,
    pub deposit_status: Option<String>,
    #[sqlx(try_from = "String")]
    pub refund_status: RefundStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub status: ParticipantStatus,
    pub deposit_amount_cents: i64,
    pub payment_id: Option<Uuid>,
    pub deposit_status: Option<String>,
}
