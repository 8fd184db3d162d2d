//! In-process store for local development (`database.backend = "memory"`) and
//! tests. Mirrors the conditional-update semantics of the Postgres store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::{
    ChatStore, EventStore, FeedbackStore, NotificationStore, ParticipantStore, PaymentStore,
    ProfileStore, StoreError, StoreResult,
};
use crate::models::{
    chat::chat_key, AdminBroadcast, AppRole, Event, Feedback, NewBroadcast, NewEvent,
    NewFeedback, NewNotification, NewParticipant, NewPayment, Notification, Participant,
    ParticipantStatus, Payment, PaymentStatus, Profile, ProfileContact, RefundStatus,
};
use crate::services::broadcast::BroadcastFilters;

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_user_id: Uuid,
    pub content: String,
}

#[derive(Default)]
struct Tables {
    events: Vec<Event>,
    participants: Vec<Participant>,
    payments: Vec<Payment>,
    feedback: Vec<Feedback>,
    notifications: Vec<Notification>,
    profiles: Vec<Profile>,
    roles: Vec<(Uuid, AppRole)>,
    chats: HashMap<(Uuid, Uuid), Uuid>,
    messages: Vec<ChatMessage>,
    broadcasts: Vec<AdminBroadcast>,
    broadcast_recipients: Vec<(Uuid, Uuid)>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Profiles and roles are owned by the identity side of the platform;
    /// these seeders stand in for it.
    pub fn insert_profile(&self, profile: Profile) {
        let mut tables = self.tables.lock();
        tables.profiles.retain(|p| p.user_id != profile.user_id);
        tables.profiles.push(profile);
    }

    pub fn grant_role(&self, user_id: Uuid, role: AppRole) {
        let mut tables = self.tables.lock();
        if !tables.roles.contains(&(user_id, role)) {
            tables.roles.push((user_id, role));
        }
    }

    /// Stores an event as-is, including its id and timestamps.
    pub fn insert_event(&self, event: Event) {
        self.tables.lock().events.push(event);
    }

    /// Overwrites a ledger row's status without transition checks, for
    /// simulating processor state in fixtures.
    pub fn force_payment_status(&self, payment_id: Uuid, status: PaymentStatus) {
        let mut tables = self.tables.lock();
        if let Some(payment) = tables.payments.iter_mut().find(|p| p.id == payment_id) {
            payment.status = status;
        }
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.tables.lock().payments.clone()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.tables.lock().participants.clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.tables.lock().notifications.clone()
    }

    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        self.tables.lock().messages.clone()
    }

    pub fn broadcasts(&self) -> Vec<AdminBroadcast> {
        self.tables.lock().broadcasts.clone()
    }
}

/// `succeeded`, or `refund_in_progress` under an abandoned claim.
fn claimable(payment: &Payment, stale_before: DateTime<Utc>) -> bool {
    match payment.status {
        PaymentStatus::Succeeded => true,
        PaymentStatus::RefundInProgress => payment
            .refund_claimed_at
            .map_or(true, |claimed_at| claimed_at < stale_before),
        _ => false,
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn create_event(&self, event: &NewEvent) -> StoreResult<Event> {
        let now = Utc::now();
        let row = Event {
            id: Uuid::new_v4(),
            organizer_user_id: event.organizer_user_id,
            title: event.title.clone(),
            description: event.description.clone(),
            address: event.address.clone(),
            place_lat: event.place_lat,
            place_lng: event.place_lng,
            start_at: event.start_at,
            end_at: event.end_at,
            max_participants: event.max_participants,
            gender_policy: event.gender_policy.clone(),
            age_min: event.age_min,
            age_max: event.age_max,
            deposit_cents: event.deposit_cents,
            currency: event.currency.clone(),
            survey_sent_at: None,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().events.push(row.clone());
        Ok(row)
    }

    async fn find_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.tables.lock().events.iter().find(|e| e.id == id).cloned())
    }

    async fn events_ended_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        let mut rows: Vec<Event> = self
            .tables
            .lock()
            .events
            .iter()
            .filter(|e| e.end_at >= from && e.end_at <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.end_at);
        Ok(rows)
    }

    async fn events_awaiting_survey(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        let rows = self.events_ended_between(from, to).await?;
        Ok(rows.into_iter().filter(|e| e.survey_sent_at.is_none()).collect())
    }

    async fn claim_survey(&self, event_id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables.lock();
        match tables.events.iter_mut().find(|e| e.id == event_id) {
            Some(event) if event.survey_sent_at.is_none() => {
                event.survey_sent_at = Some(at);
                event.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl ParticipantStore for MemoryStore {
    async fn add_participant(
        &self,
        participant: &NewParticipant,
    ) -> StoreResult<Option<Participant>> {
        let mut tables = self.tables.lock();
        if !tables.events.iter().any(|e| e.id == participant.event_id) {
            return Err(StoreError::MissingReference(format!(
                "event {}",
                participant.event_id
            )));
        }
        if tables
            .participants
            .iter()
            .any(|p| p.event_id == participant.event_id && p.user_id == participant.user_id)
        {
            return Ok(None);
        }
        let now = Utc::now();
        let row = Participant {
            id: Uuid::new_v4(),
            event_id: participant.event_id,
            user_id: participant.user_id,
            status: participant.status,
            deposit_amount_cents: participant.deposit_amount_cents,
            payment_id: participant.payment_id,
            deposit_status: participant.deposit_status.clone(),
            refund_status: RefundStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tables.participants.push(row.clone());
        Ok(Some(row))
    }

    async fn list_participants(&self, event_id: Uuid) -> StoreResult<Vec<Participant>> {
        Ok(self
            .tables
            .lock()
            .participants
            .iter()
            .filter(|p| p.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn participants_with_status(
        &self,
        event_id: Uuid,
        statuses: &[ParticipantStatus],
    ) -> StoreResult<Vec<Participant>> {
        Ok(self
            .tables
            .lock()
            .participants
            .iter()
            .filter(|p| p.event_id == event_id && statuses.contains(&p.status))
            .cloned()
            .collect())
    }

    async fn set_refund_status(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        status: RefundStatus,
    ) -> StoreResult<()> {
        let mut tables = self.tables.lock();
        for p in tables
            .participants
            .iter_mut()
            .filter(|p| p.event_id == event_id && p.user_id == user_id)
        {
            p.refund_status = status;
            p.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn settle_pending_refund(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        status: RefundStatus,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.lock();
        match tables.participants.iter_mut().find(|p| {
            p.event_id == event_id
                && p.user_id == user_id
                && p.refund_status == RefundStatus::Pending
        }) {
            Some(p) => {
                p.refund_status = status;
                p.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn insert_payment(&self, payment: &NewPayment) -> StoreResult<Payment> {
        let mut tables = self.tables.lock();
        if let Some(existing) = tables
            .payments
            .iter()
            .find(|p| p.stripe_payment_intent_id == payment.stripe_payment_intent_id)
        {
            return Ok(existing.clone());
        }
        if !tables.events.iter().any(|e| e.id == payment.event_id) {
            return Err(StoreError::MissingReference(format!(
                "event {}",
                payment.event_id
            )));
        }
        let now = Utc::now();
        let row = Payment {
            id: Uuid::new_v4(),
            event_id: payment.event_id,
            user_id: payment.user_id,
            stripe_payment_intent_id: payment.stripe_payment_intent_id.clone(),
            amount_cents: payment.amount_cents,
            currency: payment.currency.clone(),
            fee_cents: 0,
            status: payment.status,
            idempotency_key: payment.idempotency_key.clone(),
            refund_claimed_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.payments.push(row.clone());
        Ok(row)
    }

    async fn find_payment(&self, id: Uuid) -> StoreResult<Option<Payment>> {
        Ok(self.tables.lock().payments.iter().find(|p| p.id == id).cloned())
    }

    async fn find_refundable_payment(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<Option<Payment>> {
        Ok(self
            .tables
            .lock()
            .payments
            .iter()
            .filter(|p| {
                p.event_id == event_id
                    && p.user_id == user_id
                    && claimable(p, stale_before)
            })
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn transition_by_intent(
        &self,
        payment_intent_id: &str,
        to: PaymentStatus,
    ) -> StoreResult<Vec<Payment>> {
        let mut tables = self.tables.lock();
        let now = Utc::now();
        let mut updated = Vec::new();
        for p in tables
            .payments
            .iter_mut()
            .filter(|p| p.stripe_payment_intent_id == payment_intent_id)
        {
            if p.status.can_transition_to(to) {
                p.status = to;
                p.updated_at = now;
                updated.push(p.clone());
            }
        }
        Ok(updated)
    }

    async fn claim_refund(
        &self,
        payment_id: Uuid,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.lock();
        match tables.payments.iter_mut().find(|p| p.id == payment_id) {
            Some(p) if claimable(p, stale_before) => {
                p.status = PaymentStatus::RefundInProgress;
                p.refund_claimed_at = Some(now);
                p.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_refund(&self, payment_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.lock();
        if let Some(p) = tables
            .payments
            .iter_mut()
            .find(|p| p.id == payment_id && p.status == PaymentStatus::RefundInProgress)
        {
            p.status = PaymentStatus::Succeeded;
            p.refund_claimed_at = None;
            p.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn complete_refund(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        fee_cents: i64,
    ) -> StoreResult<u64> {
        let mut tables = self.tables.lock();
        let Some(p) = tables.payments.iter_mut().find(|p| {
            p.id == payment_id && PaymentStatus::REFUND_RECORDABLE.contains(&p.status)
        }) else {
            return Ok(0);
        };
        if p.status.can_transition_to(status) {
            p.status = status;
        }
        p.fee_cents = fee_cents;
        p.refund_claimed_at = None;
        p.updated_at = Utc::now();
        Ok(1)
    }
}

#[async_trait]
impl FeedbackStore for MemoryStore {
    async fn insert_feedback(&self, feedback: &NewFeedback) -> StoreResult<Option<Feedback>> {
        let mut tables = self.tables.lock();
        if tables.feedback.iter().any(|f| {
            f.event_id == feedback.event_id && f.reviewer_user_id == feedback.reviewer_user_id
        }) {
            return Ok(None);
        }
        let row = Feedback {
            id: Uuid::new_v4(),
            event_id: feedback.event_id,
            reviewer_user_id: feedback.reviewer_user_id,
            rating: feedback.rating,
            would_meet_again: feedback.would_meet_again,
            not_good: feedback.not_good,
            comments: feedback.comments.clone(),
            created_at: Utc::now(),
        };
        tables.feedback.push(row.clone());
        Ok(Some(row))
    }

    async fn feedback_from(
        &self,
        event_id: Uuid,
        reviewers: &[Uuid],
    ) -> StoreResult<Vec<Feedback>> {
        Ok(self
            .tables
            .lock()
            .feedback
            .iter()
            .filter(|f| f.event_id == event_id && reviewers.contains(&f.reviewer_user_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> StoreResult<Notification> {
        let row = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            title: notification.title.clone(),
            body: notification.body.clone(),
            link: notification.link.clone(),
            read_at: None,
            created_at: Utc::now(),
        };
        self.tables.lock().notifications.push(row.clone());
        Ok(row)
    }

    async fn notifications_for(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let mut rows: Vec<Notification> = self
            .tables
            .lock()
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Notification>> {
        let mut tables = self.tables.lock();
        Ok(tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .map(|n| {
                n.read_at.get_or_insert(at);
                n.clone()
            }))
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn contacts(&self, user_ids: &[Uuid]) -> StoreResult<Vec<ProfileContact>> {
        Ok(self
            .tables
            .lock()
            .profiles
            .iter()
            .filter(|p| user_ids.contains(&p.user_id))
            .map(|p| ProfileContact {
                user_id: p.user_id,
                email: p.email.clone(),
            })
            .collect())
    }

    async fn broadcast_candidates(&self, _filters: &BroadcastFilters) -> StoreResult<Vec<Profile>> {
        Ok(self.tables.lock().profiles.clone())
    }

    async fn has_role(&self, user_id: Uuid, role: AppRole) -> StoreResult<bool> {
        Ok(self.tables.lock().roles.contains(&(user_id, role)))
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn record_broadcast(&self, broadcast: &NewBroadcast) -> StoreResult<AdminBroadcast> {
        let row = AdminBroadcast {
            id: Uuid::new_v4(),
            admin_user_id: broadcast.admin_user_id,
            message: broadcast.message.clone(),
            filters: broadcast.filters.clone(),
            created_at: Utc::now(),
        };
        self.tables.lock().broadcasts.push(row.clone());
        Ok(row)
    }

    async fn add_broadcast_recipient(&self, broadcast_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        self.tables
            .lock()
            .broadcast_recipients
            .push((broadcast_id, user_id));
        Ok(())
    }

    async fn get_or_create_direct_chat(&self, a: Uuid, b: Uuid) -> StoreResult<Uuid> {
        let mut tables = self.tables.lock();
        let id = *tables
            .chats
            .entry(chat_key(a, b))
            .or_insert_with(Uuid::new_v4);
        Ok(id)
    }

    async fn insert_chat_message(
        &self,
        chat_id: Uuid,
        sender_user_id: Uuid,
        content: &str,
    ) -> StoreResult<Uuid> {
        let mut tables = self.tables.lock();
        if !tables.chats.values().any(|id| *id == chat_id) {
            return Err(StoreError::MissingReference(format!("chat {chat_id}")));
        }
        let id = Uuid::new_v4();
        tables.messages.push(ChatMessage {
            id,
            chat_id,
            sender_user_id,
            content: content.to_string(),
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_event(end_at: DateTime<Utc>) -> NewEvent {
        NewEvent {
            organizer_user_id: Uuid::new_v4(),
            title: "Picknick".to_string(),
            description: None,
            address: "Tiergarten, Berlin".to_string(),
            place_lat: None,
            place_lng: None,
            start_at: end_at - Duration::hours(2),
            end_at,
            max_participants: 2,
            gender_policy: "balanced".to_string(),
            age_min: None,
            age_max: None,
            deposit_cents: 1000,
            currency: "EUR".to_string(),
        }
    }

    #[tokio::test]
    async fn survey_gate_is_won_once() {
        let store = MemoryStore::new();
        let event = store.create_event(&new_event(Utc::now())).await.unwrap();

        assert!(store.claim_survey(event.id, Utc::now()).await.unwrap());
        assert!(!store.claim_survey(event.id, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn payment_insert_is_idempotent_per_intent() {
        let store = MemoryStore::new();
        let event = store.create_event(&new_event(Utc::now())).await.unwrap();
        let new_payment = NewPayment {
            event_id: event.id,
            user_id: Uuid::new_v4(),
            stripe_payment_intent_id: "pi_1".to_string(),
            amount_cents: 1000,
            currency: "EUR".to_string(),
            status: PaymentStatus::RequiresAction,
            idempotency_key: None,
        };

        let first = store.insert_payment(&new_payment).await.unwrap();
        let second = store.insert_payment(&new_payment).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.payments().len(), 1);
    }

    #[tokio::test]
    async fn refund_claim_cannot_be_taken_twice() {
        let store = MemoryStore::new();
        let event = store.create_event(&new_event(Utc::now())).await.unwrap();
        let payment = store
            .insert_payment(&NewPayment {
                event_id: event.id,
                user_id: Uuid::new_v4(),
                stripe_payment_intent_id: "pi_2".to_string(),
                amount_cents: 1000,
                currency: "EUR".to_string(),
                status: PaymentStatus::Succeeded,
                idempotency_key: None,
            })
            .await
            .unwrap();

        let now = Utc::now();
        let stale_before = now - Duration::minutes(15);
        assert!(store.claim_refund(payment.id, now, stale_before).await.unwrap());
        assert!(!store.claim_refund(payment.id, now, stale_before).await.unwrap());

        store.release_refund(payment.id).await.unwrap();
        assert!(store.payments()[0].refund_claimed_at.is_none());
        assert!(store.claim_refund(payment.id, now, stale_before).await.unwrap());
    }

    #[tokio::test]
    async fn abandoned_refund_claim_expires() {
        let store = MemoryStore::new();
        let event = store.create_event(&new_event(Utc::now())).await.unwrap();
        let user_id = Uuid::new_v4();
        let payment = store
            .insert_payment(&NewPayment {
                event_id: event.id,
                user_id,
                stripe_payment_intent_id: "pi_lease".to_string(),
                amount_cents: 1000,
                currency: "EUR".to_string(),
                status: PaymentStatus::Succeeded,
                idempotency_key: None,
            })
            .await
            .unwrap();
        let claimed_at = Utc::now() - Duration::hours(1);
        assert!(store
            .claim_refund(payment.id, claimed_at, claimed_at - Duration::minutes(15))
            .await
            .unwrap());

        let now = Utc::now();
        let fresh = now - Duration::hours(2);
        assert!(store
            .find_refundable_payment(event.id, user_id, fresh)
            .await
            .unwrap()
            .is_none());
        assert!(!store.claim_refund(payment.id, now, fresh).await.unwrap());

        let stale = now - Duration::minutes(15);
        let found = store
            .find_refundable_payment(event.id, user_id, stale)
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.id), Some(payment.id));
        assert!(store.claim_refund(payment.id, now, stale).await.unwrap());
        assert_eq!(store.payments()[0].refund_claimed_at, Some(now));
    }

    #[tokio::test]
    async fn refund_fee_is_recorded_after_a_webhook_settles_first() {
        let store = MemoryStore::new();
        let event = store.create_event(&new_event(Utc::now())).await.unwrap();
        let payment = store
            .insert_payment(&NewPayment {
                event_id: event.id,
                user_id: Uuid::new_v4(),
                stripe_payment_intent_id: "pi_fee".to_string(),
                amount_cents: 1000,
                currency: "EUR".to_string(),
                status: PaymentStatus::Succeeded,
                idempotency_key: None,
            })
            .await
            .unwrap();
        let now = Utc::now();
        store
            .claim_refund(payment.id, now, now - Duration::minutes(15))
            .await
            .unwrap();
        store
            .transition_by_intent("pi_fee", PaymentStatus::Refunded)
            .await
            .unwrap();

        let written = store
            .complete_refund(payment.id, PaymentStatus::Refunded, 100)
            .await
            .unwrap();

        assert_eq!(written, 1);
        let stored = &store.payments()[0];
        assert_eq!(stored.status, PaymentStatus::Refunded);
        assert_eq!(stored.fee_cents, 100);
        assert!(stored.refund_claimed_at.is_none());
    }

    #[tokio::test]
    async fn transitions_skip_rows_that_would_move_backwards() {
        let store = MemoryStore::new();
        let event = store.create_event(&new_event(Utc::now())).await.unwrap();
        store
            .insert_payment(&NewPayment {
                event_id: event.id,
                user_id: Uuid::new_v4(),
                stripe_payment_intent_id: "pi_3".to_string(),
                amount_cents: 1000,
                currency: "EUR".to_string(),
                status: PaymentStatus::Refunded,
                idempotency_key: None,
            })
            .await
            .unwrap();

        let updated = store
            .transition_by_intent("pi_3", PaymentStatus::Succeeded)
            .await
            .unwrap();
        assert!(updated.is_empty());
        assert_eq!(store.payments()[0].status, PaymentStatus::Refunded);
    }
}
