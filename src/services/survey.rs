use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::mail::Email;
use crate::models::{Event, NewNotification, ParticipantStatus};
use crate::utils::error::{AppError, AppResult};
use crate::AppState;

pub const SURVEY_TITLE: &str = "Wie war euer Date?";
pub const SURVEY_BODY: &str = "Bewerte dein Date und gib Feedback.";

pub fn survey_link(event_id: Uuid) -> String {
    format!("/events/{event_id}/survey")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SurveyReport {
    /// Events whose survey this run dispatched.
    pub events: usize,
    pub notifications: usize,
    pub emails: usize,
}

/// Notifies participants of recently ended events to leave feedback. Each
/// event is dispatched at most once, gated on `survey_sent_at`.
#[instrument(skip(state))]
pub async fn run_survey_sweep(state: &AppState, now: DateTime<Utc>) -> AppResult<SurveyReport> {
    let lookback = Duration::try_minutes(state.settings.sweeps.survey_lookback_minutes)
        .ok_or_else(|| {
            AppError::ConfigurationError("sweeps.survey_lookback_minutes out of range".to_string())
        })?;
    let events = state
        .store
        .events_awaiting_survey(now - lookback, now)
        .await?;

    let mut report = SurveyReport::default();
    for event in events {
        match state.store.claim_survey(event.id, now).await {
            Ok(true) => {}
            Ok(false) => {
                info!(event_id = %event.id, "Survey already claimed by another run");
                continue;
            }
            Err(e) => {
                error!(event_id = %event.id, error = %e, "Failed to claim survey");
                continue;
            }
        }

        report.events += 1;
        match dispatch_survey(state, &event).await {
            Ok((notifications, emails)) => {
                report.notifications += notifications;
                report.emails += emails;
            }
            Err(e) => {
                error!(event_id = %event.id, error = %e, "Survey dispatch failed");
            }
        }
    }

    info!(
        events = report.events,
        notifications = report.notifications,
        emails = report.emails,
        "Survey sweep finished"
    );
    Ok(report)
}

async fn dispatch_survey(state: &AppState, event: &Event) -> AppResult<(usize, usize)> {
    let participants = state
        .store
        .participants_with_status(event.id, &ParticipantStatus::COUNTED)
        .await?;
    if participants.is_empty() {
        return Ok((0, 0));
    }

    let user_ids: Vec<Uuid> = participants.iter().map(|p| p.user_id).collect();
    let emails: HashMap<Uuid, String> = state
        .store
        .contacts(&user_ids)
        .await?
        .into_iter()
        .filter_map(|contact| contact.email.map(|email| (contact.user_id, email)))
        .filter(|(_, email)| !email.trim().is_empty())
        .collect();

    let link = survey_link(event.id);
    let mut notifications = 0;
    let mut sent = 0;

    for user_id in user_ids {
        state
            .store
            .insert_notification(&NewNotification {
                user_id,
                title: SURVEY_TITLE.to_string(),
                body: SURVEY_BODY.to_string(),
                link: Some(link.clone()),
            })
            .await?;
        notifications += 1;

        let (Some(mailer), Some(address)) = (state.mailer.as_ref(), emails.get(&user_id)) else {
            continue;
        };

        let email = Email {
            to: address.clone(),
            subject: SURVEY_TITLE.to_string(),
            html: survey_email_html(&state.settings.app.base_url, event.id),
        };
        match mailer.send(&email).await {
            Ok(()) => sent += 1,
            Err(e) => warn!(event_id = %event.id, user_id = %user_id, error = %e, "Survey email failed"),
        }
    }

    Ok((notifications, sent))
}

fn survey_email_html(base_url: &str, event_id: Uuid) -> String {
    format!(
        "Bitte gib dein Feedback: <a href=\"{}{}\">Link</a>",
        base_url.trim_end_matches('/'),
        survey_link(event_id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_links_to_the_survey_page() {
        let id = Uuid::nil();
        assert_eq!(
            survey_email_html("https://dateideen.app/", id),
            format!("Bitte gib dein Feedback: <a href=\"https://dateideen.app/events/{id}/survey\">Link</a>")
        );
        assert_eq!(
            survey_email_html("", id),
            format!("Bitte gib dein Feedback: <a href=\"/events/{id}/survey\">Link</a>")
        );
    }
}
