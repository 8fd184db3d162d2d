#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use dateideen_server::config::{DatabaseBackend, Settings};
use dateideen_server::db::{
    Datastore, FeedbackStore, MemoryStore, ParticipantStore, PaymentStore,
};
use dateideen_server::mail::{Email, MailError, Mailer};
use dateideen_server::middleware::auth::Claims;
use dateideen_server::models::{
    Event, NewFeedback, NewParticipant, NewPayment, ParticipantStatus, Payment, PaymentStatus,
};
use dateideen_server::payments::{
    GatewayError, PaymentGateway, PaymentIntent, PaymentIntentRequest, Refund, RefundRequest,
};
use dateideen_server::routes::create_routes;
use dateideen_server::AppState;

pub const JWT_SECRET: &str = "integration-test-secret";

/// Records every processor call. Intents created with the same idempotency
/// key return the same id, as the real processor does.
#[derive(Default)]
pub struct FakeGateway {
    pub intents: Mutex<Vec<PaymentIntentRequest>>,
    pub refunds: Mutex<Vec<RefundRequest>>,
    pub reject_intents: Mutex<Option<Value>>,
    pub fail_refunds: Mutex<bool>,
    /// Refund calls never return, like a processor call cut off mid-flight.
    pub hang_refunds: Mutex<bool>,
}

impl FakeGateway {
    pub fn intent_calls(&self) -> Vec<PaymentIntentRequest> {
        self.intents.lock().clone()
    }

    pub fn refund_calls(&self) -> Vec<RefundRequest> {
        self.refunds.lock().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        if let Some(body) = self.reject_intents.lock().clone() {
            return Err(GatewayError::Rejected { status: 402, body });
        }

        let mut intents = self.intents.lock();
        let id = match &request.idempotency_key {
            Some(key) => format!("pi_{}", key.replace(':', "_")),
            None => format!("pi_test_{}", intents.len() + 1),
        };
        intents.push(request.clone());

        Ok(PaymentIntent {
            client_secret: format!("{id}_secret"),
            id,
        })
    }

    async fn create_refund(&self, request: &RefundRequest) -> Result<Refund, GatewayError> {
        self.refunds.lock().push(request.clone());
        let hang = *self.hang_refunds.lock();
        if hang {
            std::future::pending::<()>().await;
        }
        if *self.fail_refunds.lock() {
            return Err(GatewayError::Rejected {
                status: 500,
                body: json!({ "error": { "message": "processor unavailable" } }),
            });
        }
        Ok(Refund {
            id: format!("re_{}", self.refunds.lock().len()),
            status: Some("succeeded".to_string()),
        })
    }
}

#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<Email>>,
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        self.sent.lock().push(email.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<FakeGateway>,
    pub mailer: Arc<FakeMailer>,
    pub state: AppState,
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.auth.jwt_secret = JWT_SECRET.to_string();
    settings.database.backend = DatabaseBackend::Memory;
    settings.app.base_url = "https://dateideen.test".to_string();
    settings.sweeps.enabled = false;
    settings
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(test_settings(), true)
    }

    /// An app without payment processor credentials.
    pub fn without_gateway() -> Self {
        Self::with_settings(test_settings(), false)
    }

    pub fn with_settings(settings: Settings, with_gateway: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::default());
        let mailer = Arc::new(FakeMailer::default());

        let datastore: Arc<dyn Datastore> = store.clone();
        let payments: Option<Arc<dyn PaymentGateway>> = if with_gateway {
            Some(gateway.clone())
        } else {
            None
        };
        let state = AppState::new(settings, datastore, payments, Some(mailer.clone()));

        Self {
            router: create_routes(state.clone()),
            store,
            gateway,
            mailer,
            state,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        user: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(user_id)));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn post(&self, uri: &str, user: Option<Uuid>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, user, Some(body)).await
    }

    pub async fn get(&self, uri: &str, user: Option<Uuid>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, user, None).await
    }

    pub fn payment(&self, id: Uuid) -> Payment {
        self.store
            .payments()
            .into_iter()
            .find(|p| p.id == id)
            .expect("payment exists")
    }
}

pub fn token_for(user_id: Uuid) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
        aud: Some("authenticated".to_string()),
        email: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn event_ending_at(end_at: DateTime<Utc>, deposit_cents: i64) -> Event {
    let now = Utc::now();
    Event {
        id: Uuid::new_v4(),
        organizer_user_id: Uuid::new_v4(),
        title: "Abendessen am Kanal".to_string(),
        description: None,
        address: "Paul-Lincke-Ufer 20, Berlin".to_string(),
        place_lat: None,
        place_lng: None,
        start_at: end_at - Duration::hours(2),
        end_at,
        max_participants: 2,
        gender_policy: "balanced".to_string(),
        age_min: Some(21),
        age_max: Some(45),
        deposit_cents,
        currency: "EUR".to_string(),
        survey_sent_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub async fn add_participant(store: &MemoryStore, event_id: Uuid, user_id: Uuid, status: ParticipantStatus) {
    store
        .add_participant(&NewParticipant {
            event_id,
            user_id,
            status,
            deposit_amount_cents: 1000,
            payment_id: None,
            deposit_status: None,
        })
        .await
        .unwrap();
}

/// A ledger row already confirmed by the processor.
pub async fn succeeded_payment(store: &MemoryStore, event: &Event, user_id: Uuid) -> Payment {
    let payment = store
        .insert_payment(&NewPayment {
            event_id: event.id,
            user_id,
            stripe_payment_intent_id: format!("pi_{}", Uuid::new_v4().simple()),
            amount_cents: event.deposit_cents,
            currency: event.currency.clone(),
            status: PaymentStatus::RequiresAction,
            idempotency_key: None,
        })
        .await
        .unwrap();
    store.force_payment_status(payment.id, PaymentStatus::Succeeded);
    payment
}

pub async fn leave_feedback(store: &MemoryStore, event_id: Uuid, reviewer: Uuid, not_good: bool) {
    store
        .insert_feedback(&NewFeedback {
            event_id,
            reviewer_user_id: reviewer,
            rating: if not_good { 1 } else { 4 },
            would_meet_again: !not_good,
            not_good,
            comments: None,
        })
        .await
        .unwrap()
        .expect("first feedback from reviewer");
}

/// A finished two-person date with succeeded deposits for both.
pub struct PairedDate {
    pub event: Event,
    pub users: [Uuid; 2],
    pub payments: [Payment; 2],
}

pub async fn paired_date(app: &TestApp, ended_ago: Duration, deposit_cents: i64) -> PairedDate {
    let event = event_ending_at(Utc::now() - ended_ago, deposit_cents);
    app.store.insert_event(event.clone());

    let users = [Uuid::new_v4(), Uuid::new_v4()];
    for user in users {
        add_participant(&app.store, event.id, user, ParticipantStatus::Confirmed).await;
    }
    let first = succeeded_payment(&app.store, &event, users[0]).await;
    let second = succeeded_payment(&app.store, &event, users[1]).await;

    PairedDate {
        event,
        users,
        payments: [first, second],
    }
}
