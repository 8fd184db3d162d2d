use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use serde::Serialize;

use crate::services::{run_refund_sweep, run_survey_sweep, RefundReport};
use crate::utils::response::success;
use crate::utils::AppResult;
use crate::AppState;

#[derive(Serialize)]
struct SurveySweepResponse {
    ok: bool,
    events: usize,
}

#[derive(Serialize)]
struct RefundSweepResponse {
    ok: bool,
    #[serde(flatten)]
    report: RefundReport,
}

pub async fn survey_sweep(State(state): State<AppState>) -> AppResult<Response> {
    let report = run_survey_sweep(&state, Utc::now()).await?;
    Ok(success(SurveySweepResponse {
        ok: true,
        events: report.events,
    }))
}

pub async fn refund_sweep(State(state): State<AppState>) -> AppResult<Response> {
    let report = run_refund_sweep(&state, Utc::now()).await?;
    Ok(success(RefundSweepResponse { ok: true, report }))
}
