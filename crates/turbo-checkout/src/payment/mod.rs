//! Payment providers and the orchestrator that drives them.
//!
//! Each provider is a [`PaymentAdapter`]. The [`PaymentOrchestrator`] keeps
//! track of which provider the shopper selected and makes sure at most one
//! provider flow is in flight.

mod cod;
mod gateway;

pub use cod::CashOnDeliveryAdapter;
pub use gateway::GatewayAdapter;

use crate::CheckoutError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use turbo_commerce::payment::{PaymentProvider, PaymentResult, PaymentStatus};
use turbo_commerce::{CheckoutId, Currency, Money};

/// What to charge and which checkout it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub amount: Money,
    pub order_ref: CheckoutId,
}

impl PaymentIntent {
    pub fn new(amount: Money, order_ref: CheckoutId) -> Self {
        Self { amount, order_ref }
    }

    pub fn currency(&self) -> Currency {
        self.amount.currency
    }
}

/// A provider flow that has been started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentHandle {
    pub provider: PaymentProvider,
    /// Provider-side reference for the flow.
    pub reference: String,
    pub amount: Money,
    /// Where to send the shopper to approve, if the provider needs it.
    pub redirect_url: Option<String>,
}

/// How a provider flow ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    Succeeded(PaymentResult),
    Cancelled,
    /// Provider-reported failure message.
    Failed(String),
}

impl PaymentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PaymentOutcome::Succeeded(_))
    }
}

/// One payment provider.
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// Whether the provider can take a payment of `amount`.
    fn is_available(&self, amount: Money) -> bool;

    async fn initiate(&self, intent: &PaymentIntent) -> Result<PaymentHandle, CheckoutError>;

    async fn confirm(&self, handle: &PaymentHandle) -> Result<PaymentOutcome, CheckoutError>;

    async fn cancel(&self, handle: &PaymentHandle) -> Result<(), CheckoutError>;
}

struct InFlight {
    generation: u64,
    adapter: Arc<dyn PaymentAdapter>,
    handle: PaymentHandle,
}

#[derive(Default)]
struct FlowState {
    selected: Option<PaymentProvider>,
    /// Bumped on every selection; a flow started under an older value has
    /// been superseded.
    generation: u64,
    /// Generation a `pay` call has claimed, from before `initiate` until
    /// the outcome is known.
    paying: Option<u64>,
    in_flight: Option<InFlight>,
}

/// Releases a claimed payment slot when the `pay` call ends, including
/// when its future is dropped.
struct Claim<'a> {
    flow: &'a Mutex<FlowState>,
    generation: u64,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let mut flow = self.flow.lock().unwrap_or_else(|e| e.into_inner());
        if flow.paying == Some(self.generation) {
            flow.paying = None;
        }
    }
}

/// Chooses a provider and runs its flow.
///
/// Payments are never retried automatically, and only one `pay` may run
/// per selection at a time. The flow state lock is released before any
/// adapter call.
#[derive(Default)]
pub struct PaymentOrchestrator {
    adapters: Vec<Arc<dyn PaymentAdapter>>,
    flow: Mutex<FlowState>,
}

impl PaymentOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing one for the same provider.
    pub fn register(&mut self, adapter: Arc<dyn PaymentAdapter>) {
        let provider = adapter.provider();
        self.adapters.retain(|a| a.provider() != provider);
        self.adapters.push(adapter);
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn PaymentAdapter>) -> Self {
        self.register(adapter);
        self
    }

    fn adapter(&self, provider: PaymentProvider) -> Option<Arc<dyn PaymentAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.provider() == provider)
            .cloned()
    }

    /// Providers that can take `amount`, in registration order.
    pub fn available_providers(&self, amount: Money) -> Vec<PaymentProvider> {
        self.adapters
            .iter()
            .filter(|a| a.is_available(amount))
            .map(|a| a.provider())
            .collect()
    }

    pub fn selected(&self) -> Option<PaymentProvider> {
        self.lock().selected
    }

    /// Select a provider, cancelling the flow of any previous one.
    pub async fn select(&self, provider: PaymentProvider) -> Result<(), CheckoutError> {
        if self.adapter(provider).is_none() {
            return Err(CheckoutError::PaymentProviderUnavailable(provider));
        }

        let superseded = {
            let mut flow = self.lock();
            flow.generation += 1;
            flow.selected = Some(provider);
            flow.in_flight.take()
        };
        debug!(provider = %provider, "Payment provider selected");

        if let Some(previous) = superseded {
            info!(
                provider = %previous.handle.provider,
                reference = %previous.handle.reference,
                "Cancelling superseded payment flow"
            );
            if let Err(e) = previous.adapter.cancel(&previous.handle).await {
                warn!(
                    provider = %previous.handle.provider,
                    error = %e,
                    "Could not cancel superseded payment flow"
                );
            }
        }
        Ok(())
    }

    /// Run the selected provider's flow for `intent`.
    ///
    /// Fails with [`CheckoutError::PaymentInProgress`] while another `pay`
    /// for the same selection has not finished.
    pub async fn pay(&self, intent: &PaymentIntent) -> Result<PaymentOutcome, CheckoutError> {
        let (adapter, generation) = {
            let mut flow = self.lock();
            let provider = flow.selected.ok_or(CheckoutError::NoPaymentSelected)?;
            let adapter = self
                .adapter(provider)
                .ok_or(CheckoutError::PaymentProviderUnavailable(provider))?;
            if !adapter.is_available(intent.amount) {
                return Err(CheckoutError::PaymentProviderUnavailable(provider));
            }
            if flow.paying == Some(flow.generation) {
                warn!(provider = %provider, "Payment already in progress, refusing another");
                return Err(CheckoutError::PaymentInProgress);
            }
            flow.paying = Some(flow.generation);
            (adapter, flow.generation)
        };
        let _claim = Claim {
            flow: &self.flow,
            generation,
        };
        let provider = adapter.provider();
        info!(provider = %provider, amount = %intent.amount, "Starting payment");

        let handle = match adapter.initiate(intent).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(provider = %provider, error = %e, "Payment could not be started");
                return Ok(PaymentOutcome::Failed(e.user_message()));
            }
        };

        let registered = {
            let mut flow = self.lock();
            if flow.generation == generation {
                flow.in_flight = Some(InFlight {
                    generation,
                    adapter: adapter.clone(),
                    handle: handle.clone(),
                });
                true
            } else {
                false
            }
        };
        if !registered {
            if let Err(e) = adapter.cancel(&handle).await {
                warn!(provider = %provider, error = %e, "Could not cancel superseded payment flow");
            }
            return Ok(PaymentOutcome::Cancelled);
        }

        let outcome = match adapter.confirm(&handle).await {
            Ok(outcome) => outcome,
            Err(e) => PaymentOutcome::Failed(e.user_message()),
        };

        let superseded = {
            let mut flow = self.lock();
            if flow
                .in_flight
                .as_ref()
                .is_some_and(|f| f.generation == generation)
            {
                flow.in_flight = None;
            }
            flow.generation != generation
        };

        let outcome = if superseded {
            match outcome {
                PaymentOutcome::Succeeded(result) if result.status == PaymentStatus::Succeeded => {
                    warn!(
                        provider = %provider,
                        transaction_id = %result.transaction_id,
                        "Payment captured after provider was switched"
                    );
                    PaymentOutcome::Failed(format!(
                        "Payment {} was captured by {} after you switched payment method. \
                         Please contact support before paying again.",
                        result.transaction_id,
                        provider.display_name()
                    ))
                }
                _ => PaymentOutcome::Cancelled,
            }
        } else {
            outcome
        };

        match &outcome {
            PaymentOutcome::Succeeded(result) => info!(
                provider = %provider,
                transaction_id = %result.transaction_id,
                status = result.status.as_str(),
                "Payment completed"
            ),
            PaymentOutcome::Cancelled => info!(provider = %provider, "Payment cancelled"),
            PaymentOutcome::Failed(message) => {
                warn!(provider = %provider, message = %message, "Payment failed")
            }
        }
        Ok(outcome)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FlowState> {
        self.flow.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for PaymentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentOrchestrator")
            .field(
                "providers",
                &self.adapters.iter().map(|a| a.provider()).collect::<Vec<_>>(),
            )
            .field("selected", &self.selected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use turbo_commerce::payment::PaymentMethodTag;
    use turbo_commerce::TransactionId;

    fn inr(rupees: i64) -> Money {
        Money::from_major(rupees, Currency::INR)
    }

    fn intent(rupees: i64) -> PaymentIntent {
        PaymentIntent::new(inr(rupees), CheckoutId::new("chk_1"))
    }

    /// Captures funds once `release` is notified.
    struct HeldGateway {
        provider: PaymentProvider,
        started: Notify,
        release: Notify,
        cancels: AtomicUsize,
        confirms: AtomicUsize,
    }

    impl HeldGateway {
        fn new(provider: PaymentProvider) -> Arc<Self> {
            Arc::new(Self {
                provider,
                started: Notify::new(),
                release: Notify::new(),
                cancels: AtomicUsize::new(0),
                confirms: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PaymentAdapter for HeldGateway {
        fn provider(&self) -> PaymentProvider {
            self.provider
        }

        fn is_available(&self, _amount: Money) -> bool {
            true
        }

        async fn initiate(&self, intent: &PaymentIntent) -> Result<PaymentHandle, CheckoutError> {
            Ok(PaymentHandle {
                provider: self.provider,
                reference: "ref_1".to_string(),
                amount: intent.amount,
                redirect_url: None,
            })
        }

        async fn confirm(&self, handle: &PaymentHandle) -> Result<PaymentOutcome, CheckoutError> {
            self.confirms.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            self.release.notified().await;
            Ok(PaymentOutcome::Succeeded(PaymentResult {
                transaction_id: TransactionId::new("txn_held"),
                provider: self.provider,
                payment_method: self.provider.tag(),
                amount: handle.amount,
                status: PaymentStatus::Succeeded,
            }))
        }

        async fn cancel(&self, _handle: &PaymentHandle) -> Result<(), CheckoutError> {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Declines every payment.
    struct DecliningGateway {
        confirms: AtomicUsize,
    }

    #[async_trait]
    impl PaymentAdapter for DecliningGateway {
        fn provider(&self) -> PaymentProvider {
            PaymentProvider::Stripe
        }

        fn is_available(&self, _amount: Money) -> bool {
            true
        }

        async fn initiate(&self, intent: &PaymentIntent) -> Result<PaymentHandle, CheckoutError> {
            Ok(PaymentHandle {
                provider: PaymentProvider::Stripe,
                reference: "pi_1".to_string(),
                amount: intent.amount,
                redirect_url: None,
            })
        }

        async fn confirm(&self, _handle: &PaymentHandle) -> Result<PaymentOutcome, CheckoutError> {
            self.confirms.fetch_add(1, Ordering::SeqCst);
            Ok(PaymentOutcome::Failed("Card declined".to_string()))
        }

        async fn cancel(&self, _handle: &PaymentHandle) -> Result<(), CheckoutError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_pay_requires_selection() {
        let orchestrator =
            PaymentOrchestrator::new().with_adapter(Arc::new(CashOnDeliveryAdapter::new(inr(50000))));
        let err = orchestrator.pay(&intent(100)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::NoPaymentSelected));
    }

    #[tokio::test]
    async fn test_unregistered_provider_cannot_be_selected() {
        let orchestrator = PaymentOrchestrator::new();
        let err = orchestrator.select(PaymentProvider::PayPal).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::PaymentProviderUnavailable(PaymentProvider::PayPal)
        ));
    }

    #[test]
    fn test_available_providers_respects_amount() {
        let orchestrator = PaymentOrchestrator::new()
            .with_adapter(HeldGateway::new(PaymentProvider::PhonePe))
            .with_adapter(Arc::new(CashOnDeliveryAdapter::new(inr(50000))));
        assert_eq!(
            orchestrator.available_providers(inr(1000)),
            vec![PaymentProvider::PhonePe, PaymentProvider::CashOnDelivery]
        );
        assert_eq!(
            orchestrator.available_providers(inr(60000)),
            vec![PaymentProvider::PhonePe]
        );
    }

    #[tokio::test]
    async fn test_cod_payment_is_pending_collection() {
        let orchestrator =
            PaymentOrchestrator::new().with_adapter(Arc::new(CashOnDeliveryAdapter::new(inr(50000))));
        orchestrator.select(PaymentProvider::CashOnDelivery).await.unwrap();
        match orchestrator.pay(&intent(900)).await.unwrap() {
            PaymentOutcome::Succeeded(result) => {
                assert_eq!(result.status, PaymentStatus::PendingCollection);
                assert_eq!(result.payment_method, PaymentMethodTag::Cod);
                assert_eq!(result.amount, inr(900));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_is_not_retried() {
        let gateway = Arc::new(DecliningGateway {
            confirms: AtomicUsize::new(0),
        });
        let orchestrator = PaymentOrchestrator::new().with_adapter(gateway.clone());
        orchestrator.select(PaymentProvider::Stripe).await.unwrap();

        let outcome = orchestrator.pay(&intent(100)).await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Failed("Card declined".to_string()));
        assert_eq!(gateway.confirms.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_pay_for_same_selection_is_refused() {
        let gateway = HeldGateway::new(PaymentProvider::PhonePe);
        let orchestrator = Arc::new(PaymentOrchestrator::new().with_adapter(gateway.clone()));
        orchestrator.select(PaymentProvider::PhonePe).await.unwrap();

        let first = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.pay(&intent(900)).await })
        };
        gateway.started.notified().await;

        let second = orchestrator.pay(&intent(900)).await.unwrap_err();
        assert!(matches!(second, CheckoutError::PaymentInProgress));

        gateway.release.notify_one();
        assert!(first.await.unwrap().unwrap().is_success());
        assert_eq!(gateway.confirms.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_pays_capture_once() {
        let gateway = HeldGateway::new(PaymentProvider::PhonePe);
        let orchestrator = PaymentOrchestrator::new().with_adapter(gateway.clone());
        orchestrator.select(PaymentProvider::PhonePe).await.unwrap();

        let release = async {
            gateway.started.notified().await;
            gateway.release.notify_one();
        };
        let intent_a = intent(900);
        let intent_b = intent(900);
        let (a, b, ()) = tokio::join!(
            orchestrator.pay(&intent_a),
            orchestrator.pay(&intent_b),
            release
        );

        let outcomes = [a, b];
        let succeeded = outcomes
            .iter()
            .filter(|r| matches!(r, Ok(outcome) if outcome.is_success()))
            .count();
        let refused = outcomes
            .iter()
            .filter(|r| matches!(r, Err(CheckoutError::PaymentInProgress)))
            .count();
        assert_eq!((succeeded, refused), (1, 1));
        assert_eq!(gateway.confirms.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pay_can_run_again_after_failure() {
        let gateway = Arc::new(DecliningGateway {
            confirms: AtomicUsize::new(0),
        });
        let orchestrator = PaymentOrchestrator::new().with_adapter(gateway.clone());
        orchestrator.select(PaymentProvider::Stripe).await.unwrap();

        orchestrator.pay(&intent(100)).await.unwrap();
        orchestrator.pay(&intent(100)).await.unwrap();
        assert_eq!(gateway.confirms.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_switching_provider_cancels_in_flight_flow() {
        let gateway = HeldGateway::new(PaymentProvider::PhonePe);
        let orchestrator = Arc::new(
            PaymentOrchestrator::new()
                .with_adapter(gateway.clone())
                .with_adapter(Arc::new(CashOnDeliveryAdapter::new(inr(50000)))),
        );
        orchestrator.select(PaymentProvider::PhonePe).await.unwrap();

        let paying = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.pay(&intent(1000)).await })
        };
        gateway.started.notified().await;

        orchestrator.select(PaymentProvider::CashOnDelivery).await.unwrap();
        assert_eq!(gateway.cancels.load(Ordering::SeqCst), 1);

        // The provider captured anyway; the shopper must be told.
        gateway.release.notify_one();
        match paying.await.unwrap().unwrap() {
            PaymentOutcome::Failed(message) => assert!(message.contains("txn_held")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(orchestrator.selected(), Some(PaymentProvider::CashOnDelivery));
    }
}
