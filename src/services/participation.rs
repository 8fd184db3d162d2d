//! Event creation and joining.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::event::{
    DEFAULT_AGE_MAX, DEFAULT_AGE_MIN, DEFAULT_CURRENCY, DEFAULT_DEPOSIT_CENTS,
    DEFAULT_GENDER_POLICY, DEFAULT_MAX_PARTICIPANTS,
};
use crate::models::{
    Event, NewEvent, NewParticipant, Participant, ParticipantStatus, PaymentStatus,
};
use crate::utils::error::{AppError, AppResult};
use crate::AppState;

const MIN_TEXT_LEN: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub address: String,
    #[serde(default)]
    pub place_lat: Option<f64>,
    #[serde(default)]
    pub place_lng: Option<f64>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default)]
    pub max_participants: Option<i32>,
    #[serde(default)]
    pub gender_policy: Option<String>,
    #[serde(default)]
    pub age_min: Option<i32>,
    #[serde(default)]
    pub age_max: Option<i32>,
    #[serde(default)]
    pub deposit_cents: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl CreateEventRequest {
    /// Applies the platform defaults and checks the result.
    pub fn into_new_event(self, organizer_user_id: Uuid) -> AppResult<NewEvent> {
        let title = self.title.trim().to_string();
        if title.chars().count() < MIN_TEXT_LEN {
            return Err(AppError::ValidationError(
                "title must be at least 3 characters".to_string(),
            ));
        }
        let address = self.address.trim().to_string();
        if address.chars().count() < MIN_TEXT_LEN {
            return Err(AppError::ValidationError(
                "address must be at least 3 characters".to_string(),
            ));
        }
        if self.end_at <= self.start_at {
            return Err(AppError::ValidationError(
                "end_at must be after start_at".to_string(),
            ));
        }

        let max_participants = self.max_participants.unwrap_or(DEFAULT_MAX_PARTICIPANTS);
        if max_participants < 1 {
            return Err(AppError::ValidationError(
                "max_participants must be at least 1".to_string(),
            ));
        }

        let deposit_cents = self.deposit_cents.unwrap_or(DEFAULT_DEPOSIT_CENTS);
        if deposit_cents < 0 {
            return Err(AppError::ValidationError(
                "deposit_cents must not be negative".to_string(),
            ));
        }

        let age_min = self.age_min.unwrap_or(DEFAULT_AGE_MIN);
        let age_max = self.age_max.unwrap_or(DEFAULT_AGE_MAX);
        if age_min > age_max {
            return Err(AppError::ValidationError(
                "age_min must not exceed age_max".to_string(),
            ));
        }

        let currency = match self.currency.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_CURRENCY.to_string(),
            Some(code) if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
                code.to_uppercase()
            }
            Some(_) => {
                return Err(AppError::ValidationError(
                    "currency must be a three-letter code".to_string(),
                ))
            }
        };

        Ok(NewEvent {
            organizer_user_id,
            title,
            description: self.description.filter(|d| !d.trim().is_empty()),
            address,
            place_lat: self.place_lat,
            place_lng: self.place_lng,
            start_at: self.start_at,
            end_at: self.end_at,
            max_participants,
            gender_policy: self
                .gender_policy
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GENDER_POLICY.to_string()),
            age_min: Some(age_min),
            age_max: Some(age_max),
            deposit_cents,
            currency,
        })
    }
}

#[instrument(skip(state, request), fields(user_id = %user.user_id))]
pub async fn create_event(
    state: &AppState,
    user: &AuthUser,
    request: CreateEventRequest,
) -> AppResult<Event> {
    let new_event = request.into_new_event(user.user_id)?;
    let event = state.store.create_event(&new_event).await?;
    info!(event_id = %event.id, "Event created");
    Ok(event)
}

#[derive(Debug, Clone, Serialize)]
pub struct EventDetails {
    pub event: Event,
    pub participants: Vec<Participant>,
}

pub async fn event_details(state: &AppState, event_id: Uuid) -> AppResult<EventDetails> {
    let event = find_event(state, event_id).await?;
    let participants = state.store.list_participants(event.id).await?;
    Ok(EventDetails {
        event,
        participants,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfirmParticipationRequest {
    #[serde(default)]
    pub payment_id: Option<Uuid>,
}

/// Records the caller as a confirmed participant once their deposit
/// authorization exists.
#[instrument(skip(state, request), fields(user_id = %user.user_id, event_id = %event_id))]
pub async fn confirm_participation(
    state: &AppState,
    user: &AuthUser,
    event_id: Uuid,
    request: ConfirmParticipationRequest,
) -> AppResult<Participant> {
    let payment_id = request
        .payment_id
        .ok_or_else(|| AppError::ValidationError("payment_id required".to_string()))?;

    let event = find_event(state, event_id).await?;

    let payment = state
        .store
        .find_payment(payment_id)
        .await?
        .filter(|p| p.user_id == user.user_id && p.event_id == event.id)
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;
    if matches!(payment.status, PaymentStatus::Failed | PaymentStatus::Canceled) {
        return Err(AppError::ValidationError(format!(
            "Payment is {}",
            payment.status
        )));
    }

    let counted = state
        .store
        .participants_with_status(event.id, &ParticipantStatus::COUNTED)
        .await?;
    if counted.iter().any(|p| p.user_id == user.user_id) {
        return Err(already_participating());
    }
    if counted.len() >= event.max_participants.max(0) as usize {
        return Err(AppError::ValidationError("Event is full".to_string()));
    }

    let participant = state
        .store
        .add_participant(&NewParticipant {
            event_id: event.id,
            user_id: user.user_id,
            status: ParticipantStatus::Confirmed,
            deposit_amount_cents: payment.amount_cents,
            payment_id: Some(payment.id),
            deposit_status: Some(payment.status.to_string()),
        })
        .await?
        .ok_or_else(already_participating)?;

    info!(participant_id = %participant.id, payment_id = %payment.id, "Participation confirmed");
    Ok(participant)
}

fn already_participating() -> AppError {
    AppError::ValidationError("Already participating".to_string())
}

pub(crate) async fn find_event(state: &AppState, event_id: Uuid) -> AppResult<Event> {
    state
        .store
        .find_event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}
