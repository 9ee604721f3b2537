use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{debug, error};

use crate::domain::{
    repositories::payment_gateway::PaymentGateway,
    value_objects::payment_intents::{
        CaptureMode, CreateIntentRequest, ProcessorIntent, ProcessorIntentStatus,
    },
};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Payment-intent client for Stripe built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    status: ProcessorIntentStatus,
    amount: i64,
    last_payment_error: Option<StripeLastPaymentError>,
}

#[derive(Debug, Deserialize)]
struct StripeLastPaymentError {
    message: Option<String>,
    decline_code: Option<String>,
}

impl From<StripePaymentIntent> for ProcessorIntent {
    fn from(intent: StripePaymentIntent) -> Self {
        let failure_message = intent.last_payment_error.and_then(|err| {
            match (err.message, err.decline_code) {
                (Some(message), Some(code)) => Some(format!("{message} ({code})")),
                (Some(message), None) => Some(message),
                (None, Some(code)) => Some(code),
                (None, None) => None,
            }
        });

        ProcessorIntent {
            id: intent.id,
            status: intent.status,
            amount_minor: intent.amount,
            failure_message,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeRefund {
    amount: i64,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    decline_code: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            secret_key,
            api_base: STRIPE_API_BASE.to_string(),
        })
    }

    async fn post_form(
        &self,
        path: &str,
        body: &[(String, String)],
        idempotency_key: &str,
        context: &str,
    ) -> Result<reqwest::Response> {
        let resp = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("Idempotency-Key", idempotency_key)
            .form(body)
            .send()
            .await
            .map_err(|err| transport_error(err, context))?;

        Self::ensure_success(resp, context).await
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.as_deref()),
            context = %context,
            "stripe: api request failed"
        );

        let reason = details
            .and_then(|d| d.message)
            .unwrap_or_else(|| format!("status {status}"));
        anyhow::bail!("Stripe {context} failed: {reason}");
    }

    async fn intent_action(
        &self,
        intent_id: &str,
        action: &str,
        idempotency_key: &str,
    ) -> Result<ProcessorIntent> {
        // https://stripe.com/docs/api/payment_intents/{confirm,capture,cancel}
        let context = format!("{action} payment intent");
        let resp = self
            .post_form(
                &format!("/payment_intents/{intent_id}/{action}"),
                &[],
                idempotency_key,
                &context,
            )
            .await?;

        let intent: StripePaymentIntent = resp.json().await?;
        debug!(intent_id = %intent.id, status = intent.status.as_str(), action, "stripe: intent updated");
        Ok(intent.into())
    }
}

/// Form fields for `POST /v1/payment_intents`.
fn intent_form(request: &CreateIntentRequest) -> Vec<(String, String)> {
    let mut body: Vec<(String, String)> = vec![
        ("amount".to_string(), request.amount_minor.to_string()),
        ("currency".to_string(), request.currency.clone()),
        (
            "capture_method".to_string(),
            request.capture_mode.as_str().to_string(),
        ),
        ("payment_method_types[0]".to_string(), "card".to_string()),
    ];

    if let Some(customer) = &request.customer {
        body.push(("customer".to_string(), customer.clone()));
    }
    if let Some(payment_method) = &request.payment_method {
        body.push(("payment_method".to_string(), payment_method.clone()));
    }
    if let Some(description) = &request.description {
        body.push(("description".to_string(), description.clone()));
    }
    if request.confirm {
        body.push(("confirm".to_string(), "true".to_string()));
    }
    if request.off_session {
        body.push(("off_session".to_string(), "true".to_string()));
    }

    let mut metadata: Vec<_> = request.metadata.iter().collect();
    metadata.sort();
    for (key, value) in metadata {
        body.push((format!("metadata[{key}]"), value.clone()));
    }

    body
}

fn transport_error(err: reqwest::Error, context: &str) -> anyhow::Error {
    if err.is_timeout() {
        return anyhow!("Stripe {context} timed out");
    }
    if err.is_connect() {
        return anyhow!("Stripe {context} connection failed");
    }
    anyhow!("Stripe {context} request failed: {err}")
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<ProcessorIntent> {
        // https://stripe.com/docs/api/payment_intents/create
        let body = intent_form(&request);
        let context = match request.capture_mode {
            CaptureMode::Manual => "create authorization intent",
            CaptureMode::Automatic => "create charge intent",
        };

        let resp = self
            .post_form("/payment_intents", &body, &request.idempotency_key, context)
            .await?;

        let intent: StripePaymentIntent = resp.json().await?;
        debug!(
            intent_id = %intent.id,
            status = intent.status.as_str(),
            amount_minor = intent.amount,
            "stripe: payment intent created"
        );
        Ok(intent.into())
    }

    async fn confirm_intent(&self, intent_id: &str, idempotency_key: &str) -> Result<ProcessorIntent> {
        self.intent_action(intent_id, "confirm", idempotency_key).await
    }

    async fn capture_intent(&self, intent_id: &str, idempotency_key: &str) -> Result<ProcessorIntent> {
        self.intent_action(intent_id, "capture", idempotency_key).await
    }

    async fn refund_intent(
        &self,
        intent_id: &str,
        amount_minor: Option<i64>,
        idempotency_key: &str,
    ) -> Result<i64> {
        // https://stripe.com/docs/api/refunds/create
        let mut body = vec![("payment_intent".to_string(), intent_id.to_string())];
        if let Some(amount) = amount_minor {
            body.push(("amount".to_string(), amount.to_string()));
        }

        let resp = self
            .post_form("/refunds", &body, idempotency_key, "create refund")
            .await?;

        let refund: StripeRefund = resp.json().await?;
        if refund.status.as_deref() == Some("failed") {
            anyhow::bail!("Stripe refund for {intent_id} failed");
        }

        Ok(refund.amount)
    }

    async fn cancel_intent(&self, intent_id: &str, idempotency_key: &str) -> Result<ProcessorIntent> {
        self.intent_action(intent_id, "cancel", idempotency_key).await
    }
}
