use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{
    broadcast, events, health_check, notifications, payments, sweeps, webhooks,
};
use crate::AppState;

pub fn create_routes(state: AppState) -> Router {
    let server = state.settings.server.clone();

    Router::new()
        .route("/health", get(health_check))
        .route("/payments/intents", post(payments::create_intent))
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        .route("/sweeps/survey", post(sweeps::survey_sweep))
        .route("/sweeps/refunds", post(sweeps::refund_sweep))
        .route("/admin/broadcasts", post(broadcast::admin_broadcast))
        .route("/events", post(events::create))
        .route("/events/:id", get(events::details))
        .route("/events/:id/participants", post(events::participate))
        .route("/events/:id/feedback", post(events::feedback))
        .route("/notifications", get(notifications::list))
        .route("/notifications/:id/read", post(notifications::read))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(&server))
        .layer(create_cors_layer(&server))
}
