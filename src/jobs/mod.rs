//! Background schedulers for the two sweeps. The HTTP sweep endpoints stay
//! available for external cron triggers; the gates make overlapping runs safe.

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::services::{run_refund_sweep, run_survey_sweep};
use crate::AppState;

pub fn spawn_survey_job(state: AppState) -> JoinHandle<()> {
    let period = Duration::from_secs(state.settings.sweeps.survey_interval_secs);
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            tracing::debug!("Starting scheduled survey sweep");

            if let Err(e) = run_survey_sweep(&state, Utc::now()).await {
                tracing::error!(error = %e, "Scheduled survey sweep failed");
            }
        }
    })
}

pub fn spawn_refund_job(state: AppState) -> JoinHandle<()> {
    let period = Duration::from_secs(state.settings.sweeps.refund_interval_secs);
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            tracing::debug!("Starting scheduled refund sweep");

            if let Err(e) = run_refund_sweep(&state, Utc::now()).await {
                tracing::error!(error = %e, "Scheduled refund sweep failed");
            }
        }
    })
}

/// Starts both schedulers unless `sweeps.enabled` is off.
pub fn spawn_all(state: &AppState) -> Vec<JoinHandle<()>> {
    if !state.settings.sweeps.enabled {
        tracing::info!("Scheduled sweeps disabled");
        return Vec::new();
    }

    tracing::info!(
        survey_every_secs = state.settings.sweeps.survey_interval_secs,
        refund_every_secs = state.settings.sweeps.refund_interval_secs,
        "Starting scheduled sweeps"
    );
    vec![spawn_survey_job(state.clone()), spawn_refund_job(state.clone())]
}
