use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::Notification;
use crate::utils::error::{AppError, AppResult};
use crate::AppState;

pub async fn list_notifications(state: &AppState, user: &AuthUser) -> AppResult<Vec<Notification>> {
    Ok(state.store.notifications_for(user.user_id).await?)
}

/// Marking twice keeps the first `read_at`.
pub async fn mark_read(
    state: &AppState,
    user: &AuthUser,
    notification_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<Notification> {
    state
        .store
        .mark_notification_read(user.user_id, notification_id, now)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
}
