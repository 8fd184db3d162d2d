use axum::extract::{Path, State};
use axum::response::Response;
use chrono::Utc;

use crate::middleware::AuthUser;
use crate::services::notifications::{list_notifications, mark_read};
use crate::utils::response::success;
use crate::utils::{parse_id, AppResult};
use crate::AppState;

pub async fn list(State(state): State<AppState>, user: AuthUser) -> AppResult<Response> {
    Ok(success(list_notifications(&state, &user).await?))
}

pub async fn read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notification_id): Path<String>,
) -> AppResult<Response> {
    let notification_id = parse_id(&notification_id, "Notification not found")?;
    Ok(success(mark_read(&state, &user, notification_id, Utc::now()).await?))
}
