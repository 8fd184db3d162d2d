//! Deposit refunds for finished two-person dates.
//!
//! Once both participants left feedback, each gets their deposit back: in
//! full when both marked the date as not good, otherwise half. A platform fee
//! is kept from the refunded base.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::models::{Event, Participant, ParticipantStatus};
use crate::payments::{PaymentGateway, RefundQuote, RefundRequest};
use crate::utils::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefundReport {
    /// Events that had exactly two counted participants and feedback from both.
    pub events_considered: usize,
    pub refunds_issued: usize,
    pub failures: usize,
}

enum Outcome {
    Refunded,
    Skipped,
}

/// Claims older than `stale_before` belong to a run that never finished.
#[derive(Clone, Copy)]
struct ClaimClock {
    now: DateTime<Utc>,
    stale_before: DateTime<Utc>,
}

#[instrument(skip(state))]
pub async fn run_refund_sweep(state: &AppState, now: DateTime<Utc>) -> AppResult<RefundReport> {
    let sweeps = &state.settings.sweeps;
    let lookback = Duration::try_days(sweeps.refund_lookback_days).ok_or_else(|| {
        AppError::ConfigurationError("sweeps.refund_lookback_days out of range".to_string())
    })?;
    let claim_ttl = Duration::try_seconds(sweeps.refund_claim_ttl_secs).ok_or_else(|| {
        AppError::ConfigurationError("sweeps.refund_claim_ttl_secs out of range".to_string())
    })?;
    let clock = ClaimClock {
        now,
        stale_before: now - claim_ttl,
    };
    let events = state.store.events_ended_between(now - lookback, now).await?;

    let mut report = RefundReport::default();
    for event in &events {
        if let Err(e) = reconcile_event(state, clock, event, &mut report).await {
            report.failures += 1;
            error!(event_id = %event.id, error = %e, "Refund reconciliation failed for event");
        }
    }

    info!(
        scanned = events.len(),
        considered = report.events_considered,
        issued = report.refunds_issued,
        failures = report.failures,
        "Refund sweep finished"
    );
    Ok(report)
}

async fn reconcile_event(
    state: &AppState,
    clock: ClaimClock,
    event: &Event,
    report: &mut RefundReport,
) -> AppResult<()> {
    let participants = state
        .store
        .participants_with_status(event.id, &ParticipantStatus::COUNTED)
        .await?;
    if participants.len() != 2 {
        return Ok(());
    }

    let user_ids: Vec<Uuid> = participants.iter().map(|p| p.user_id).collect();
    let feedback = state.store.feedback_from(event.id, &user_ids).await?;
    let everyone_reviewed = user_ids
        .iter()
        .all(|id| feedback.iter().any(|f| f.reviewer_user_id == *id));
    if !everyone_reviewed {
        return Ok(());
    }

    report.events_considered += 1;
    let both_not_good = feedback.iter().all(|f| f.not_good);

    let Some(gateway) = state.payments.as_deref() else {
        warn!(event_id = %event.id, "Refund due but no payment processor is configured");
        return Ok(());
    };

    for participant in &participants {
        let outcome =
            refund_participant(state, gateway, clock, event, participant, both_not_good).await;
        match outcome {
            Ok(Outcome::Refunded) => report.refunds_issued += 1,
            Ok(Outcome::Skipped) => {}
            Err(e) => {
                report.failures += 1;
                error!(
                    event_id = %event.id,
                    user_id = %participant.user_id,
                    error = %e,
                    "Refund failed"
                );
            }
        }
    }

    Ok(())
}

async fn refund_participant(
    state: &AppState,
    gateway: &dyn PaymentGateway,
    clock: ClaimClock,
    event: &Event,
    participant: &Participant,
    both_not_good: bool,
) -> AppResult<Outcome> {
    let Some(payment) = state
        .store
        .find_refundable_payment(event.id, participant.user_id, clock.stale_before)
        .await?
    else {
        return Ok(Outcome::Skipped);
    };

    let quote = RefundQuote::compute(
        payment.amount_cents,
        both_not_good,
        state.settings.sweeps.platform_fee_percent,
    );

    if !state
        .store
        .claim_refund(payment.id, clock.now, clock.stale_before)
        .await?
    {
        info!(payment_id = %payment.id, "Refund already claimed by another run");
        return Ok(Outcome::Skipped);
    }

    // A zero refund has nothing to send to the processor.
    if quote.refund_cents > 0 {
        let request = RefundRequest {
            payment_intent_id: payment.stripe_payment_intent_id.clone(),
            amount_cents: quote.refund_cents,
            idempotency_key: Some(format!("refund:{}", payment.id)),
        };
        if let Err(e) = gateway.create_refund(&request).await {
            error!(payment_id = %payment.id, error = %e, "Processor rejected refund");
            match state.store.release_refund(payment.id).await {
                Ok(()) => info!(payment_id = %payment.id, "Refund claim released"),
                Err(release) => error!(
                    payment_id = %payment.id,
                    error = %release,
                    "Failed to release refund claim; it expires after the claim TTL"
                ),
            }
            return Err(e.into());
        }
    }

    let written = state
        .store
        .complete_refund(payment.id, quote.kind.payment_status(), quote.fee_cents)
        .await?;
    if written == 0 {
        warn!(payment_id = %payment.id, "Refund issued but the payment row was not updated");
    }
    state
        .store
        .set_refund_status(event.id, participant.user_id, quote.kind.participant_status())
        .await?;

    info!(
        event_id = %event.id,
        payment_id = %payment.id,
        kind = ?quote.kind,
        refund_cents = quote.refund_cents,
        fee_cents = quote.fee_cents,
        "Refund issued"
    );
    Ok(Outcome::Refunded)
}
