use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{bearer_token, body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dateideen_server::config::settings::{EmailConfig, StripeConfig};
use dateideen_server::mail::{Email, MailError, Mailer, ResendMailer};
use dateideen_server::payments::{
    GatewayError, PaymentGateway, PaymentIntentRequest, RefundRequest, StripeClient,
};

fn stripe(server: &MockServer) -> StripeClient {
    let config = StripeConfig {
        api_base: format!("{}/", server.uri()),
        ..StripeConfig::default()
    };
    StripeClient::new(&config, "sk_test_123").unwrap()
}

#[tokio::test]
async fn payment_intent_is_form_encoded_with_metadata() {
    let server = MockServer::start().await;
    let event_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .and(bearer_token("sk_test_123"))
        .and(header("Idempotency-Key", "evt:usr:k1"))
        .and(body_string_contains("amount=1500"))
        .and(body_string_contains("currency=eur"))
        .and(body_string_contains("payment_method_types%5B%5D=card"))
        .and(body_string_contains(format!("metadata%5Bevent_id%5D={event_id}").as_str()))
        .and(body_string_contains(format!("metadata%5Buser_id%5D={user_id}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_123",
            "object": "payment_intent",
            "client_secret": "pi_123_secret_abc",
            "status": "requires_payment_method"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let intent = stripe(&server)
        .create_payment_intent(&PaymentIntentRequest {
            amount_cents: 1500,
            currency: "EUR".to_string(),
            event_id,
            user_id,
            idempotency_key: Some("evt:usr:k1".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(intent.id, "pi_123");
    assert_eq!(intent.client_secret, "pi_123_secret_abc");
}

#[tokio::test]
async fn processor_rejection_keeps_the_error_body() {
    let server = MockServer::start().await;
    let error_body = json!({ "error": { "type": "card_error", "message": "Your card was declined." } });

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(402).set_body_json(error_body.clone()))
        .mount(&server)
        .await;

    let err = stripe(&server)
        .create_payment_intent(&PaymentIntentRequest {
            amount_cents: 1000,
            currency: "EUR".to_string(),
            event_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            idempotency_key: None,
        })
        .await
        .unwrap_err();

    match err {
        GatewayError::Rejected { status, body } => {
            assert_eq!(status, 402);
            assert_eq!(body, error_body);
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn refund_targets_the_payment_intent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/refunds"))
        .and(header("Idempotency-Key", "refund:abc"))
        .and(body_string_contains("payment_intent=pi_456"))
        .and(body_string_contains("amount=450"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "re_1",
            "object": "refund",
            "status": "succeeded"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let refund = stripe(&server)
        .create_refund(&RefundRequest {
            payment_intent_id: "pi_456".to_string(),
            amount_cents: 450,
            idempotency_key: Some("refund:abc".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(refund.id, "re_1");
    assert_eq!(refund.status.as_deref(), Some("succeeded"));
}

fn resend(server: &MockServer) -> ResendMailer {
    let config = EmailConfig {
        resend_api_key: None,
        from: "Dateideen <no-reply@dateideen.app>".to_string(),
        api_base: server.uri(),
    };
    ResendMailer::new(&config, "re_key").unwrap()
}

#[tokio::test]
async fn email_is_posted_as_json() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(bearer_token("re_key"))
        .and(body_json(json!({
            "from": "Dateideen <no-reply@dateideen.app>",
            "to": "mia@example.com",
            "subject": "Wie war euer Date?",
            "html": "<p>Hallo</p>"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "email_1" })))
        .expect(1)
        .mount(&server)
        .await;

    resend(&server)
        .send(&Email {
            to: "mia@example.com".to_string(),
            subject: "Wie war euer Date?".to_string(),
            html: "<p>Hallo</p>".to_string(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn rejected_email_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({ "message": "Invalid `to` field" })),
        )
        .mount(&server)
        .await;

    let err = resend(&server)
        .send(&Email {
            to: "not-an-address".to_string(),
            subject: "x".to_string(),
            html: "x".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, MailError::Rejected { status: 422, .. }));
}
