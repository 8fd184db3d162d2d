use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::participation::find_event;
use crate::middleware::AuthUser;
use crate::models::{Feedback, NewFeedback, ParticipantStatus};
use crate::utils::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitFeedbackRequest {
    pub rating: i16,
    #[serde(default)]
    pub would_meet_again: bool,
    #[serde(default)]
    pub not_good: bool,
    #[serde(default)]
    pub comments: Option<String>,
}

/// Post-date survey answer. One per participant and event; the refund sweep
/// reads the `not_good` flags.
#[instrument(skip(state, request), fields(user_id = %user.user_id, event_id = %event_id))]
pub async fn submit_feedback(
    state: &AppState,
    user: &AuthUser,
    event_id: Uuid,
    request: SubmitFeedbackRequest,
) -> AppResult<Feedback> {
    if !(1..=5).contains(&request.rating) {
        return Err(AppError::ValidationError(
            "rating must be between 1 and 5".to_string(),
        ));
    }

    let event = find_event(state, event_id).await?;

    let participates = state
        .store
        .participants_with_status(event.id, &ParticipantStatus::COUNTED)
        .await?
        .iter()
        .any(|p| p.user_id == user.user_id);
    if !participates {
        return Err(AppError::Forbidden(
            "Only participants can leave feedback".to_string(),
        ));
    }

    let feedback = state
        .store
        .insert_feedback(&NewFeedback {
            event_id: event.id,
            reviewer_user_id: user.user_id,
            rating: request.rating,
            would_meet_again: request.would_meet_again,
            not_good: request.not_good,
            comments: request.comments.filter(|c| !c.trim().is_empty()),
        })
        .await?
        .ok_or_else(|| AppError::ValidationError("Feedback already submitted".to_string()))?;

    info!(feedback_id = %feedback.id, not_good = feedback.not_good, "Feedback recorded");
    Ok(feedback)
}
