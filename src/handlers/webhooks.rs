use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use chrono::Utc;

use crate::payments::signature::SIGNATURE_HEADER;
use crate::services::webhooks::handle_webhook;
use crate::utils::response::success;
use crate::utils::AppResult;
use crate::AppState;

/// Takes the raw body: the signature covers the exact bytes sent.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let ack = handle_webhook(&state, signature, &body, Utc::now()).await?;
    Ok(success(ack))
}
