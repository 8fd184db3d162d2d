use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Feedback {
    pub id: Uuid,
    pub event_id: Uuid,
    pub reviewer_user_id: Uuid,
    pub rating: i16,
    pub would_meet_again: bool,
    pub not_good: bool,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub event_id: Uuid,
    pub reviewer_user_id: Uuid,
    pub rating: i16,
    pub would_meet_again: bool,
    pub not_good: bool,
    pub comments: Option<String>,
}
