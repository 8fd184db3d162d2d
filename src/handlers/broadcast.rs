use axum::extract::State;
use axum::response::Response;
use chrono::Utc;

use crate::middleware::AuthUser;
use crate::services::broadcast::{send_broadcast, BroadcastRequest};
use crate::utils::response::success;
use crate::utils::{ApiJson, AppResult};
use crate::AppState;

pub async fn admin_broadcast(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<BroadcastRequest>,
) -> AppResult<Response> {
    let outcome = send_broadcast(&state, &user, request, Utc::now()).await?;
    Ok(success(outcome))
}
