//! Checkout flow state machine.
//!
//! A flow begins when the shopper reaches the payment step and ends either
//! with an order or with an order-creation failure after payment. Payment
//! failures and cancellations return the shopper to provider selection.

use crate::checkout::Address;
use crate::ids::{CheckoutId, OrderId, TransactionId};
use crate::payment::PaymentSelection;
use crate::CommerceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// States of the checkout flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    /// Choosing a provider, applying coupons.
    SelectingPayment,
    /// A provider flow is running.
    ProcessingPayment,
    /// Funds captured (or collection scheduled), order not yet submitted.
    PaymentSucceeded,
    /// Order submission in flight.
    CreatingOrder,
    /// Order recorded.
    OrderCreated,
    /// Payment was taken but the order could not be recorded.
    OrderCreationFailed,
    /// Provider reported failure.
    PaymentFailed,
    /// Shopper cancelled the provider flow.
    PaymentCancelled,
}

impl CheckoutState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::SelectingPayment => "selecting_payment",
            CheckoutState::ProcessingPayment => "processing_payment",
            CheckoutState::PaymentSucceeded => "payment_succeeded",
            CheckoutState::CreatingOrder => "creating_order",
            CheckoutState::OrderCreated => "order_created",
            CheckoutState::OrderCreationFailed => "order_creation_failed",
            CheckoutState::PaymentFailed => "payment_failed",
            CheckoutState::PaymentCancelled => "payment_cancelled",
        }
    }

    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutState::OrderCreated | CheckoutState::OrderCreationFailed
        )
    }

    /// A new payment attempt may start from this state.
    pub fn can_begin_payment(&self) -> bool {
        matches!(
            self,
            CheckoutState::SelectingPayment
                | CheckoutState::PaymentFailed
                | CheckoutState::PaymentCancelled
        )
    }
}

/// Checkout flow state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutFlow {
    /// Unique checkout identifier.
    pub id: CheckoutId,
    /// Current state.
    pub state: CheckoutState,
    pub shipping_address: Option<Address>,
    /// Provider of the current or last attempt.
    pub selection: Option<PaymentSelection>,
    /// Set once a payment succeeds.
    pub transaction_id: Option<TransactionId>,
    /// Set once the order is recorded.
    pub order_id: Option<OrderId>,
    /// Last failure message, if any.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckoutFlow {
    /// Create a new checkout flow.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: CheckoutId::generate(),
            state: CheckoutState::SelectingPayment,
            shipping_address: None,
            selection: None,
            transaction_id: None,
            order_id: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the shipping address.
    pub fn set_shipping_address(&mut self, address: Address) {
        self.shipping_address = Some(address);
        self.touch();
    }

    /// Start a payment attempt with the given provider.
    pub fn begin_payment(&mut self, selection: PaymentSelection) -> Result<(), CommerceError> {
        if !self.state.can_begin_payment() {
            return Err(self.invalid(CheckoutState::ProcessingPayment));
        }
        let missing = self
            .shipping_address
            .as_ref()
            .map(|a| a.missing_fields())
            .unwrap_or_else(|| vec!["shipping address"]);
        if !missing.is_empty() {
            return Err(CommerceError::CheckoutIncomplete(missing.join(", ")));
        }

        self.selection = Some(selection);
        self.last_error = None;
        self.transition(CheckoutState::ProcessingPayment);
        Ok(())
    }

    /// Record a successful payment.
    pub fn payment_succeeded(&mut self, transaction_id: TransactionId) -> Result<(), CommerceError> {
        self.expect(CheckoutState::ProcessingPayment, CheckoutState::PaymentSucceeded)?;
        self.transaction_id = Some(transaction_id);
        self.transition(CheckoutState::PaymentSucceeded);
        Ok(())
    }

    /// Record a provider failure.
    pub fn payment_failed(&mut self, message: impl Into<String>) -> Result<(), CommerceError> {
        self.expect(CheckoutState::ProcessingPayment, CheckoutState::PaymentFailed)?;
        self.last_error = Some(message.into());
        self.transition(CheckoutState::PaymentFailed);
        Ok(())
    }

    /// Record a shopper cancellation.
    pub fn payment_cancelled(&mut self) -> Result<(), CommerceError> {
        self.expect(CheckoutState::ProcessingPayment, CheckoutState::PaymentCancelled)?;
        self.transition(CheckoutState::PaymentCancelled);
        Ok(())
    }

    /// Start submitting the order.
    pub fn begin_order(&mut self) -> Result<(), CommerceError> {
        self.expect(CheckoutState::PaymentSucceeded, CheckoutState::CreatingOrder)?;
        self.transition(CheckoutState::CreatingOrder);
        Ok(())
    }

    /// Record the created order.
    pub fn order_created(&mut self, order_id: OrderId) -> Result<(), CommerceError> {
        self.expect(CheckoutState::CreatingOrder, CheckoutState::OrderCreated)?;
        self.order_id = Some(order_id);
        self.transition(CheckoutState::OrderCreated);
        Ok(())
    }

    /// Record an order-creation failure. Terminal: payment is never retried.
    pub fn order_failed(&mut self, message: impl Into<String>) -> Result<(), CommerceError> {
        self.expect(CheckoutState::CreatingOrder, CheckoutState::OrderCreationFailed)?;
        self.last_error = Some(message.into());
        self.transition(CheckoutState::OrderCreationFailed);
        Ok(())
    }

    /// Go back to provider selection after a failed or cancelled attempt.
    pub fn return_to_selection(&mut self) -> Result<(), CommerceError> {
        match self.state {
            CheckoutState::PaymentFailed | CheckoutState::PaymentCancelled => {
                self.transition(CheckoutState::SelectingPayment);
                Ok(())
            }
            CheckoutState::SelectingPayment => Ok(()),
            _ => Err(self.invalid(CheckoutState::SelectingPayment)),
        }
    }

    /// Check if checkout is finished.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn expect(&self, from: CheckoutState, to: CheckoutState) -> Result<(), CommerceError> {
        if self.state == from {
            Ok(())
        } else {
            Err(self.invalid(to))
        }
    }

    fn invalid(&self, to: CheckoutState) -> CommerceError {
        CommerceError::InvalidCheckoutTransition {
            from: self.state.as_str().to_string(),
            to: to.as_str().to_string(),
        }
    }

    fn transition(&mut self, to: CheckoutState) {
        self.state = to;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for CheckoutFlow {
    fn default() -> Self {
        Self::new()
    }
}
