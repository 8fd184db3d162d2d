use axum::extract::State;
use axum::response::Response;

use crate::middleware::AuthUser;
use crate::services::payment_intents::{create_payment_intent, CreateIntentRequest};
use crate::utils::response::success;
use crate::utils::{ApiJson, AppResult};
use crate::AppState;

pub async fn create_intent(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CreateIntentRequest>,
) -> AppResult<Response> {
    let created = create_payment_intent(&state, &user, request).await?;
    Ok(success(created))
}
