use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const DEFAULT_DEPOSIT_CENTS: i64 = 1000;
pub const DEFAULT_CURRENCY: &str = "EUR";
pub const DEFAULT_MAX_PARTICIPANTS: i32 = 2;
pub const DEFAULT_GENDER_POLICY: &str = "balanced";
pub const DEFAULT_AGE_MIN: i32 = 21;
pub const DEFAULT_AGE_MAX: i32 = 45;

/// A planned meetup. Only `survey_sent_at` changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub organizer_user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub address: String,
    pub place_lat: Option<f64>,
    pub place_lng: Option<f64>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub max_participants: i32,
    pub gender_policy: String,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub deposit_cents: i64,
    pub currency: String,
    pub survey_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Deposit charged on join. Events stored without a usable amount fall
    /// back to the platform default.
    pub fn effective_deposit_cents(&self) -> i64 {
        if self.deposit_cents > 0 {
            self.deposit_cents
        } else {
            DEFAULT_DEPOSIT_CENTS
        }
    }

    pub fn effective_currency(&self) -> &str {
        if self.currency.trim().is_empty() {
            DEFAULT_CURRENCY
        } else {
            &self.currency
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub organizer_user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub address: String,
    pub place_lat: Option<f64>,
    pub place_lng: Option<f64>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub max_participants: i32,
    pub gender_policy: String,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub deposit_cents: i64,
    pub currency: String,
}
