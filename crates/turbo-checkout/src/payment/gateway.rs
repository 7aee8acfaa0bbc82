//! Hosted payment gateways.

use super::{PaymentAdapter, PaymentHandle, PaymentIntent, PaymentOutcome};
use crate::api::{send, send_json};
use crate::session::Session;
use crate::{BackendError, CheckoutError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use turbo_commerce::payment::{PaymentProvider, PaymentResult, PaymentStatus};
use turbo_commerce::{Currency, Money, TransactionId};
use turbo_data::{ClientRequestBuilder, FetchClient};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IntentRequest<'a> {
    amount: f64,
    currency: Currency,
    order_ref: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntentResponse {
    reference: String,
    #[serde(default)]
    redirect_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReferenceRequest<'a> {
    reference: &'a str,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
enum ConfirmStatus {
    Succeeded,
    Cancelled,
    Failed,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmResponse {
    status: ConfirmStatus,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Card, UPI and wallet providers behind
/// `POST /payments/<provider>/{intent,confirm,cancel}`.
#[derive(Debug, Clone)]
pub struct GatewayAdapter {
    provider: PaymentProvider,
    client: FetchClient,
    session: Option<Arc<Session>>,
}

impl GatewayAdapter {
    pub fn new(provider: PaymentProvider, client: FetchClient) -> Self {
        Self {
            provider,
            client,
            session: None,
        }
    }

    /// Send the shopper's bearer token when one is present.
    pub fn with_session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    fn post(&self, action: &str) -> ClientRequestBuilder {
        let identity = self.session.as_ref().and_then(|s| s.current());
        self.client
            .post(format!("/payments/{}/{}", self.provider, action))
            .maybe_bearer_auth(identity.as_ref().map(|i| i.token.as_str()))
    }
}

#[async_trait]
impl PaymentAdapter for GatewayAdapter {
    fn provider(&self) -> PaymentProvider {
        self.provider
    }

    fn is_available(&self, amount: Money) -> bool {
        amount.is_positive()
    }

    async fn initiate(&self, intent: &PaymentIntent) -> Result<PaymentHandle, CheckoutError> {
        let request = self.post("intent").json(&IntentRequest {
            amount: intent.amount.to_decimal(),
            currency: intent.currency(),
            order_ref: intent.order_ref.as_str(),
        })?;
        let response: IntentResponse = send_json(request).await?;
        debug!(
            provider = %self.provider,
            reference = %response.reference,
            "Payment intent created"
        );
        Ok(PaymentHandle {
            provider: self.provider,
            reference: response.reference,
            amount: intent.amount,
            redirect_url: response.redirect_url,
        })
    }

    async fn confirm(&self, handle: &PaymentHandle) -> Result<PaymentOutcome, CheckoutError> {
        let request = self.post("confirm").json(&ReferenceRequest {
            reference: &handle.reference,
        })?;
        let response: ConfirmResponse = match send_json(request).await {
            Ok(response) => response,
            // A refusal from the provider is a failed payment, not an outage.
            Err(BackendError::Rejected { message, .. }) => {
                return Ok(PaymentOutcome::Failed(message))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(match response.status {
            ConfirmStatus::Succeeded => PaymentOutcome::Succeeded(PaymentResult {
                transaction_id: TransactionId::new(
                    response
                        .transaction_id
                        .unwrap_or_else(|| handle.reference.clone()),
                ),
                provider: self.provider,
                payment_method: self.provider.tag(),
                amount: handle.amount,
                status: PaymentStatus::Succeeded,
            }),
            ConfirmStatus::Cancelled => PaymentOutcome::Cancelled,
            ConfirmStatus::Failed => PaymentOutcome::Failed(
                response
                    .message
                    .unwrap_or_else(|| "Payment was declined".to_string()),
            ),
        })
    }

    async fn cancel(&self, handle: &PaymentHandle) -> Result<(), CheckoutError> {
        let request = self.post("cancel").json(&ReferenceRequest {
            reference: &handle.reference,
        })?;
        send(request).await?;
        Ok(())
    }
}
