//! Cash on delivery.

use super::{PaymentAdapter, PaymentHandle, PaymentIntent, PaymentOutcome};
use crate::CheckoutError;
use async_trait::async_trait;
use turbo_commerce::payment::{PaymentProvider, PaymentResult, PaymentStatus};
use turbo_commerce::{Money, TransactionId};

/// Local adapter; nothing is charged until delivery.
#[derive(Debug, Clone)]
pub struct CashOnDeliveryAdapter {
    max_amount: Money,
}

impl CashOnDeliveryAdapter {
    /// Orders above `max_amount` cannot be paid on delivery.
    pub fn new(max_amount: Money) -> Self {
        Self { max_amount }
    }

    pub fn max_amount(&self) -> Money {
        self.max_amount
    }
}

#[async_trait]
impl PaymentAdapter for CashOnDeliveryAdapter {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::CashOnDelivery
    }

    fn is_available(&self, amount: Money) -> bool {
        amount.currency == self.max_amount.currency
            && amount.is_positive()
            && amount.amount_cents <= self.max_amount.amount_cents
    }

    async fn initiate(&self, intent: &PaymentIntent) -> Result<PaymentHandle, CheckoutError> {
        if !self.is_available(intent.amount) {
            return Err(CheckoutError::PaymentProviderUnavailable(
                PaymentProvider::CashOnDelivery,
            ));
        }
        Ok(PaymentHandle {
            provider: PaymentProvider::CashOnDelivery,
            reference: TransactionId::generate().into_inner(),
            amount: intent.amount,
            redirect_url: None,
        })
    }

    async fn confirm(&self, handle: &PaymentHandle) -> Result<PaymentOutcome, CheckoutError> {
        let provider = PaymentProvider::CashOnDelivery;
        Ok(PaymentOutcome::Succeeded(PaymentResult {
            transaction_id: TransactionId::new(handle.reference.clone()),
            provider,
            payment_method: provider.tag(),
            amount: handle.amount,
            status: PaymentStatus::PendingCollection,
        }))
    }

    async fn cancel(&self, _handle: &PaymentHandle) -> Result<(), CheckoutError> {
        Ok(())
    }
}
