pub mod config;
pub mod db;
pub mod handlers;
pub mod jobs;
pub mod mail;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::Settings;
use crate::db::Datastore;
use crate::mail::{Mailer, ResendMailer};
use crate::middleware::JwtVerifier;
use crate::payments::{PaymentGateway, StripeClient};
use crate::utils::error::{AppError, AppResult};

/// Shared handles for handlers and background jobs.
///
/// `payments` and `mailer` are `None` when their credential is not configured.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Datastore>,
    pub payments: Option<Arc<dyn PaymentGateway>>,
    pub mailer: Option<Arc<dyn Mailer>>,
    pub settings: Arc<Settings>,
    pub jwt: Arc<JwtVerifier>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Arc<dyn Datastore>,
        payments: Option<Arc<dyn PaymentGateway>>,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Self {
        let jwt = Arc::new(JwtVerifier::new(&settings.auth));
        Self {
            store,
            payments,
            mailer,
            settings: Arc::new(settings),
            jwt,
        }
    }

    /// Builds the Stripe and Resend clients for whichever credentials are set.
    pub fn from_settings(settings: Settings, store: Arc<dyn Datastore>) -> AppResult<Self> {
        let payments: Option<Arc<dyn PaymentGateway>> = match settings.stripe_secret_key() {
            Some(key) => Some(Arc::new(
                StripeClient::new(&settings.stripe, key)
                    .map_err(|e| AppError::ConfigurationError(e.to_string()))?,
            )),
            None => {
                tracing::warn!("stripe.secret_key not set; payment intents and refunds are disabled");
                None
            }
        };

        let mailer: Option<Arc<dyn Mailer>> = match settings.resend_api_key() {
            Some(key) => Some(Arc::new(
                ResendMailer::new(&settings.email, key)
                    .map_err(|e| AppError::ConfigurationError(e.to_string()))?,
            )),
            None => {
                tracing::info!("email.resend_api_key not set; survey emails are disabled");
                None
            }
        };

        Ok(Self::new(settings, store, payments, mailer))
    }
}
