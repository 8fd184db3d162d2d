use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use super::{
    ChatStore, EventStore, FeedbackStore, NotificationStore, ParticipantStore, PaymentStore,
    ProfileStore, StoreError, StoreResult,
};
use crate::config::settings::DatabaseConfig;
use crate::models::{
    chat::chat_key, AdminBroadcast, AppRole, Event, Feedback, NewBroadcast, NewEvent,
    NewFeedback, NewNotification, NewParticipant, NewPayment, Notification, Participant,
    ParticipantStatus, Payment, PaymentStatus, Profile, ProfileContact, RefundStatus,
};
use crate::services::broadcast::BroadcastFilters;

const EVENT_COLUMNS: &str = "id, organizer_user_id, title, description, address, place_lat, \
     place_lng, start_at, end_at, max_participants, gender_policy, age_min, age_max, \
     deposit_cents, currency, survey_sent_at, created_at, updated_at";

const PARTICIPANT_COLUMNS: &str = "id, event_id, user_id, status, deposit_amount_cents, \
     payment_id, deposit_status, refund_status, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, event_id, user_id, stripe_payment_intent_id, amount_cents, \
     currency, fee_cents, status, idempotency_key, refund_claimed_at, created_at, updated_at";

const FEEDBACK_COLUMNS: &str =
    "id, event_id, reviewer_user_id, rating, would_meet_again, not_good, comments, created_at";

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, body, link, read_at, created_at";

const PROFILE_COLUMNS: &str = "user_id, email, display_name, birth_date, gender, city, \
     interests, relationship_status, created_at";

/// Postgres-backed store. Queries are checked at runtime so the crate builds
/// without a live database.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        tracing::info!("Successfully connected to database");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!().run(&self.pool).await?;
        tracing::info!("Migrations run successfully");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn status_texts<'a, I, S>(statuses: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a S>,
    S: std::fmt::Display + 'a,
{
    statuses.into_iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl EventStore for PgStore {
    async fn create_event(&self, event: &NewEvent) -> StoreResult<Event> {
        let sql = format!(
            "INSERT INTO events (organizer_user_id, title, description, address, place_lat, \
             place_lng, start_at, end_at, max_participants, gender_policy, age_min, age_max, \
             deposit_cents, currency) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {EVENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Event>(&sql)
            .bind(event.organizer_user_id)
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.address)
            .bind(event.place_lat)
            .bind(event.place_lng)
            .bind(event.start_at)
            .bind(event.end_at)
            .bind(event.max_participants)
            .bind(&event.gender_policy)
            .bind(event.age_min)
            .bind(event.age_max)
            .bind(event.deposit_cents)
            .bind(&event.currency)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        let row = sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn events_ended_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE end_at >= $1 AND end_at <= $2 \
             ORDER BY end_at ASC"
        );
        let rows = sqlx::query_as::<_, Event>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn events_awaiting_survey(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE end_at >= $1 AND end_at <= $2 \
             AND survey_sent_at IS NULL ORDER BY end_at ASC"
        );
        let rows = sqlx::query_as::<_, Event>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn claim_survey(&self, event_id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE events SET survey_sent_at = $2, updated_at = $2 \
             WHERE id = $1 AND survey_sent_at IS NULL",
        )
        .bind(event_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl ParticipantStore for PgStore {
    async fn add_participant(
        &self,
        participant: &NewParticipant,
    ) -> StoreResult<Option<Participant>> {
        let sql = format!(
            "INSERT INTO event_participants (event_id, user_id, status, deposit_amount_cents, \
             payment_id, deposit_status) VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (event_id, user_id) DO NOTHING RETURNING {PARTICIPANT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Participant>(&sql)
            .bind(participant.event_id)
            .bind(participant.user_id)
            .bind(participant.status.as_str())
            .bind(participant.deposit_amount_cents)
            .bind(participant.payment_id)
            .bind(&participant.deposit_status)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_participants(&self, event_id: Uuid) -> StoreResult<Vec<Participant>> {
        let sql = format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM event_participants WHERE event_id = $1 \
             ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, Participant>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn participants_with_status(
        &self,
        event_id: Uuid,
        statuses: &[ParticipantStatus],
    ) -> StoreResult<Vec<Participant>> {
        let sql = format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM event_participants \
             WHERE event_id = $1 AND status = ANY($2) ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, Participant>(&sql)
            .bind(event_id)
            .bind(status_texts(statuses))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn set_refund_status(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        status: RefundStatus,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE event_participants SET refund_status = $3, updated_at = NOW() \
             WHERE event_id = $1 AND user_id = $2",
        )
        .bind(event_id)
        .bind(user_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn settle_pending_refund(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        status: RefundStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE event_participants SET refund_status = $3, updated_at = NOW() \
             WHERE event_id = $1 AND user_id = $2 AND refund_status = $4",
        )
        .bind(event_id)
        .bind(user_id)
        .bind(status.as_str())
        .bind(RefundStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn insert_payment(&self, payment: &NewPayment) -> StoreResult<Payment> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let sql = format!(
            "INSERT INTO payments (event_id, user_id, stripe_payment_intent_id, amount_cents, \
             currency, status, idempotency_key) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (stripe_payment_intent_id) DO UPDATE SET updated_at = payments.updated_at \
             RETURNING {PAYMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment.event_id)
            .bind(payment.user_id)
            .bind(&payment.stripe_payment_intent_id)
            .bind(payment.amount_cents)
            .bind(&payment.currency)
            .bind(payment.status.as_str())
            .bind(&payment.idempotency_key)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_payment(&self, id: Uuid) -> StoreResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");
        let row = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_refundable_payment(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<Option<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE event_id = $1 AND user_id = $2 AND (status = $3 OR (status = $4 \
             AND (refund_claimed_at IS NULL OR refund_claimed_at < $5))) \
             ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, Payment>(&sql)
            .bind(event_id)
            .bind(user_id)
            .bind(PaymentStatus::Succeeded.as_str())
            .bind(PaymentStatus::RefundInProgress.as_str())
            .bind(stale_before)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn transition_by_intent(
        &self,
        payment_intent_id: &str,
        to: PaymentStatus,
    ) -> StoreResult<Vec<Payment>> {
        let sql = format!(
            "UPDATE payments SET status = $2, updated_at = NOW() \
             WHERE stripe_payment_intent_id = $1 AND status = ANY($3) \
             RETURNING {PAYMENT_COLUMNS}"
        );
        let rows = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment_intent_id)
            .bind(to.as_str())
            .bind(status_texts(to.predecessors()))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn claim_refund(
        &self,
        payment_id: Uuid,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE payments SET status = $2, refund_claimed_at = $4, updated_at = $4 \
             WHERE id = $1 AND (status = $3 OR (status = $2 \
             AND (refund_claimed_at IS NULL OR refund_claimed_at < $5)))",
        )
        .bind(payment_id)
        .bind(PaymentStatus::RefundInProgress.as_str())
        .bind(PaymentStatus::Succeeded.as_str())
        .bind(now)
        .bind(stale_before)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_refund(&self, payment_id: Uuid) -> StoreResult<()> {
        sqlx::query(
            "UPDATE payments SET status = $2, refund_claimed_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND status = $3",
        )
        .bind(payment_id)
        .bind(PaymentStatus::Succeeded.as_str())
        .bind(PaymentStatus::RefundInProgress.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_refund(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        fee_cents: i64,
    ) -> StoreResult<u64> {
        // A webhook may already have settled the row; the fee is recorded either way.
        let result = sqlx::query(
            "UPDATE payments SET \
             status = CASE WHEN status = ANY($4) THEN $2 ELSE status END, \
             fee_cents = $3, refund_claimed_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND status = ANY($5)",
        )
        .bind(payment_id)
        .bind(status.as_str())
        .bind(fee_cents)
        .bind(status_texts(status.predecessors()))
        .bind(status_texts(&PaymentStatus::REFUND_RECORDABLE))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl FeedbackStore for PgStore {
    async fn insert_feedback(&self, feedback: &NewFeedback) -> StoreResult<Option<Feedback>> {
        let sql = format!(
            "INSERT INTO feedback (event_id, reviewer_user_id, rating, would_meet_again, \
             not_good, comments) VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (event_id, reviewer_user_id) DO NOTHING RETURNING {FEEDBACK_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Feedback>(&sql)
            .bind(feedback.event_id)
            .bind(feedback.reviewer_user_id)
            .bind(feedback.rating)
            .bind(feedback.would_meet_again)
            .bind(feedback.not_good)
            .bind(&feedback.comments)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn feedback_from(
        &self,
        event_id: Uuid,
        reviewers: &[Uuid],
    ) -> StoreResult<Vec<Feedback>> {
        let sql = format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback \
             WHERE event_id = $1 AND reviewer_user_id = ANY($2)"
        );
        let rows = sqlx::query_as::<_, Feedback>(&sql)
            .bind(event_id)
            .bind(reviewers.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> StoreResult<Notification> {
        let sql = format!(
            "INSERT INTO notifications (user_id, title, body, link) VALUES ($1, $2, $3, $4) \
             RETURNING {NOTIFICATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Notification>(&sql)
            .bind(notification.user_id)
            .bind(&notification.title)
            .bind(&notification.body)
            .bind(&notification.link)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn notifications_for(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = $1 \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn mark_notification_read(
        &self,
        user_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Notification>> {
        let sql = format!(
            "UPDATE notifications SET read_at = COALESCE(read_at, $3) \
             WHERE id = $1 AND user_id = $2 RETURNING {NOTIFICATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Notification>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn contacts(&self, user_ids: &[Uuid]) -> StoreResult<Vec<ProfileContact>> {
        let rows = sqlx::query_as::<_, ProfileContact>(
            "SELECT user_id, email FROM profiles WHERE user_id = ANY($1)",
        )
        .bind(user_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn broadcast_candidates(&self, filters: &BroadcastFilters) -> StoreResult<Vec<Profile>> {
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles \
             WHERE ($1::text IS NULL OR gender = $1) \
             AND ($2::text IS NULL OR relationship_status = $2) \
             AND ($3::text IS NULL OR city ILIKE '%' || $3 || '%')"
        );
        let rows = sqlx::query_as::<_, Profile>(&sql)
            .bind(filters.gender.map(|g| g.as_str()))
            .bind(filters.relationship_status.map(|r| r.as_str()))
            .bind(filters.city_filter())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn has_role(&self, user_id: Uuid, role: AppRole) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM user_roles WHERE user_id = $1 AND role = $2)",
        )
        .bind(user_id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn record_broadcast(&self, broadcast: &NewBroadcast) -> StoreResult<AdminBroadcast> {
        let row = sqlx::query_as::<_, AdminBroadcast>(
            "INSERT INTO admin_broadcasts (admin_user_id, message, filters) VALUES ($1, $2, $3) \
             RETURNING id, admin_user_id, message, filters, created_at",
        )
        .bind(broadcast.admin_user_id)
        .bind(&broadcast.message)
        .bind(&broadcast.filters)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn add_broadcast_recipient(&self, broadcast_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO admin_broadcast_recipients (broadcast_id, user_id) VALUES ($1, $2)",
        )
        .bind(broadcast_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_or_create_direct_chat(&self, a: Uuid, b: Uuid) -> StoreResult<Uuid> {
        let (low, high) = chat_key(a, b);
        let id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO chats (user_low, user_high) VALUES ($1, $2) \
             ON CONFLICT (user_low, user_high) DO UPDATE SET user_low = EXCLUDED.user_low \
             RETURNING id",
        )
        .bind(low)
        .bind(high)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn insert_chat_message(
        &self,
        chat_id: Uuid,
        sender_user_id: Uuid,
        content: &str,
    ) -> StoreResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO chat_messages (chat_id, sender_user_id, content) VALUES ($1, $2, $3) \
             RETURNING id",
        )
        .bind(chat_id)
        .bind(sender_user_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                StoreError::MissingReference(format!("chat {chat_id}"))
            }
            other => StoreError::Sqlx(other),
        })?;
        Ok(id)
    }
}
