//! Persistence seam for the deposit flow.
//!
//! Every multi-writer gate (survey claim, payment transitions, refund claim)
//! is a single conditional statement so overlapping sweeps and webhook
//! deliveries cannot both win.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AdminBroadcast, AppRole, Event, Feedback, NewBroadcast, NewEvent, NewFeedback,
    NewNotification, NewParticipant, NewPayment, Notification, Participant, ParticipantStatus,
    Payment, PaymentStatus, Profile, ProfileContact, RefundStatus,
};
use crate::services::broadcast::BroadcastFilters;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Referenced row does not exist: {0}")]
    MissingReference(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn create_event(&self, event: &NewEvent) -> StoreResult<Event>;
    async fn find_event(&self, id: Uuid) -> StoreResult<Option<Event>>;
    /// Events with `from <= end_at <= to`, oldest first.
    async fn events_ended_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>>;
    /// Like [`events_ended_between`](Self::events_ended_between) but only events
    /// whose survey has not been dispatched yet.
    async fn events_awaiting_survey(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>>;
    /// Sets `survey_sent_at` if it is still unset. Returns whether this call
    /// won the gate.
    async fn claim_survey(&self, event_id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;
}

#[async_trait]
pub trait ParticipantStore: Send + Sync {
    /// Returns `None` when the user already participates in the event.
    async fn add_participant(&self, participant: &NewParticipant)
        -> StoreResult<Option<Participant>>;
    async fn list_participants(&self, event_id: Uuid) -> StoreResult<Vec<Participant>>;
    async fn participants_with_status(
        &self,
        event_id: Uuid,
        statuses: &[ParticipantStatus],
    ) -> StoreResult<Vec<Participant>>;
    async fn set_refund_status(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        status: RefundStatus,
    ) -> StoreResult<()>;
    /// Sets the refund status only while it is still `pending`. Returns
    /// whether a row changed.
    async fn settle_pending_refund(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        status: RefundStatus,
    ) -> StoreResult<bool>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a ledger row. A second insert for the same processor intent
    /// returns the existing row unchanged.
    async fn insert_payment(&self, payment: &NewPayment) -> StoreResult<Payment>;
    async fn find_payment(&self, id: Uuid) -> StoreResult<Option<Payment>>;
    /// The newest payment the refund sweep may claim: `succeeded`, or
    /// `refund_in_progress` under a claim taken before `stale_before`.
    async fn find_refundable_payment(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<Option<Payment>>;
    /// Moves every row for the intent to `to`, but only from one of
    /// `to.predecessors()`. Returns the updated rows.
    async fn transition_by_intent(
        &self,
        payment_intent_id: &str,
        to: PaymentStatus,
    ) -> StoreResult<Vec<Payment>>;
    /// `succeeded -> refund_in_progress`, stamping `refund_claimed_at = now`.
    /// A claim taken before `stale_before` is abandoned and may be taken over.
    /// Returns whether this call won the claim.
    async fn claim_refund(
        &self,
        payment_id: Uuid,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<bool>;
    /// `refund_in_progress -> succeeded`, used when the processor call fails.
    async fn release_refund(&self, payment_id: Uuid) -> StoreResult<()>;
    /// Records the fee on a claimed or already refunded row and moves it to
    /// `status` where that is a forward move. A webhook may have settled the
    /// row first; the fee is written either way. Returns the rows written.
    async fn complete_refund(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        fee_cents: i64,
    ) -> StoreResult<u64>;
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Returns `None` when the reviewer already left feedback for the event.
    async fn insert_feedback(&self, feedback: &NewFeedback) -> StoreResult<Option<Feedback>>;
    async fn feedback_from(
        &self,
        event_id: Uuid,
        reviewers: &[Uuid],
    ) -> StoreResult<Vec<Feedback>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: &NewNotification)
        -> StoreResult<Notification>;
    async fn notifications_for(&self, user_id: Uuid) -> StoreResult<Vec<Notification>>;
    /// Sets `read_at` on the caller's notification. `None` if it is not theirs.
    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Notification>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn contacts(&self, user_ids: &[Uuid]) -> StoreResult<Vec<ProfileContact>>;
    /// Candidate profiles for a broadcast. Implementations may pre-filter on
    /// the exact-match fields; callers still apply [`BroadcastFilters::matches`].
    async fn broadcast_candidates(&self, filters: &BroadcastFilters) -> StoreResult<Vec<Profile>>;
    async fn has_role(&self, user_id: Uuid, role: AppRole) -> StoreResult<bool>;
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn record_broadcast(&self, broadcast: &NewBroadcast) -> StoreResult<AdminBroadcast>;
    async fn add_broadcast_recipient(&self, broadcast_id: Uuid, user_id: Uuid)
        -> StoreResult<()>;
    async fn get_or_create_direct_chat(&self, a: Uuid, b: Uuid) -> StoreResult<Uuid>;
    async fn insert_chat_message(
        &self,
        chat_id: Uuid,
        sender_user_id: Uuid,
        content: &str,
    ) -> StoreResult<Uuid>;
}

/// Everything the service layer needs from persistence.
pub trait Datastore:
    EventStore + ParticipantStore + PaymentStore + FeedbackStore + NotificationStore + ProfileStore + ChatStore
{
}

impl<T> Datastore for T where
    T: EventStore
        + ParticipantStore
        + PaymentStore
        + FeedbackStore
        + NotificationStore
        + ProfileStore
        + ChatStore
{
}
