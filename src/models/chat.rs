use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AdminBroadcast {
    pub id: Uuid,
    pub admin_user_id: Uuid,
    pub message: String,
    pub filters: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBroadcast {
    pub admin_user_id: Uuid,
    pub message: String,
    pub filters: Value,
}

/// Direct chats are keyed by the ordered pair so (a, b) and (b, a) share a row.
pub fn chat_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
