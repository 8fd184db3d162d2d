use axum::extract::{Path, State};
use axum::response::Response;

use crate::middleware::AuthUser;
use crate::services::feedback::{submit_feedback, SubmitFeedbackRequest};
use crate::services::participation::{
    confirm_participation, create_event, event_details, ConfirmParticipationRequest,
    CreateEventRequest,
};
use crate::utils::response::{created, success};
use crate::utils::{parse_id, ApiJson, AppResult};
use crate::AppState;

const EVENT_NOT_FOUND: &str = "Event not found";

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CreateEventRequest>,
) -> AppResult<Response> {
    let event = create_event(&state, &user, request).await?;
    Ok(created(event))
}

pub async fn details(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(event_id): Path<String>,
) -> AppResult<Response> {
    let event_id = parse_id(&event_id, EVENT_NOT_FOUND)?;
    Ok(success(event_details(&state, event_id).await?))
}

pub async fn participate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<String>,
    ApiJson(request): ApiJson<ConfirmParticipationRequest>,
) -> AppResult<Response> {
    let event_id = parse_id(&event_id, EVENT_NOT_FOUND)?;
    let participant = confirm_participation(&state, &user, event_id, request).await?;
    Ok(created(participant))
}

pub async fn feedback(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<String>,
    ApiJson(request): ApiJson<SubmitFeedbackRequest>,
) -> AppResult<Response> {
    let event_id = parse_id(&event_id, EVENT_NOT_FOUND)?;
    let feedback = submit_feedback(&state, &user, event_id, request).await?;
    Ok(created(feedback))
}
