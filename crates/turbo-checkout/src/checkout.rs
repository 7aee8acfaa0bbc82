//! One checkout attempt.

use crate::payment::{PaymentIntent, PaymentOutcome};
use crate::storefront::Storefront;
use crate::CheckoutError;
use chrono::Utc;
use tracing::{info, warn};
use turbo_commerce::cart::{CartState, CheckoutTotals, CouponApplication};
use turbo_commerce::checkout::{Address, CheckoutFlow, CheckoutState, Order};
use turbo_commerce::payment::{PaymentProvider, PaymentSelection};

/// How [`CheckoutSession::place_order`] ended, when it did not error.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    OrderCreated(Order),
    /// The provider declined; the shopper may pick a provider again.
    PaymentFailed(String),
    /// The shopper backed out; the shopper may pick a provider again.
    PaymentCancelled,
}

/// A checkout over a snapshot of the cart taken when it began.
///
/// Totals shown, charged and recorded all come from
/// [`CheckoutTotals::compute`] over this snapshot and the current coupon
/// application.
pub struct CheckoutSession<'a> {
    storefront: &'a Storefront,
    cart: CartState,
    flow: CheckoutFlow,
    coupon: Option<CouponApplication>,
}

impl<'a> CheckoutSession<'a> {
    pub(crate) fn new(storefront: &'a Storefront, cart: CartState) -> Result<Self, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let flow = CheckoutFlow::new();
        info!(checkout_id = %flow.id, items = cart.item_count(), "Checkout started");
        Ok(Self {
            storefront,
            cart,
            flow,
            coupon: None,
        })
    }

    pub fn cart(&self) -> &CartState {
        &self.cart
    }

    pub fn flow(&self) -> &CheckoutFlow {
        &self.flow
    }

    pub fn state(&self) -> CheckoutState {
        self.flow.state
    }

    pub fn coupon(&self) -> Option<&CouponApplication> {
        self.coupon.as_ref()
    }

    pub fn set_shipping_address(&mut self, address: Address) {
        self.flow.set_shipping_address(address);
    }

    pub fn totals(&self) -> Result<CheckoutTotals, CheckoutError> {
        Ok(CheckoutTotals::compute(&self.cart, self.coupon.as_ref())?)
    }

    /// Validate and apply a coupon for the current total and provider.
    pub async fn apply_coupon(&mut self, code: &str) -> Result<&CouponApplication, CheckoutError> {
        let identity = self.storefront.session().current();
        let order_value = self.cart.total_amount()?;
        let application = self
            .storefront
            .coupons()
            .validate(
                identity.as_ref(),
                code,
                order_value,
                self.storefront.payments().selected(),
                &self.cart.product_ids(),
            )
            .await?;
        Ok(self.coupon.insert(application))
    }

    pub fn remove_coupon(&mut self) -> Option<CouponApplication> {
        self.coupon.take()
    }

    /// Select a provider. A coupon that does not allow the provider's method
    /// is dropped; otherwise it is re-evaluated for the new method.
    pub async fn select_payment(&mut self, provider: PaymentProvider) -> Result<(), CheckoutError> {
        let payments = self.storefront.payments();
        let total = self.totals()?.total;
        if !payments.available_providers(total).contains(&provider) {
            return Err(CheckoutError::PaymentProviderUnavailable(provider));
        }
        payments.select(provider).await?;

        let method = Some(provider.tag());
        if let Some(application) = self.coupon.take() {
            let order_value = self.cart.total_amount()?;
            if application.is_current_for(order_value, method) {
                self.coupon = Some(application);
            } else {
                match application.coupon.evaluate(
                    order_value,
                    method,
                    &self.cart.product_ids(),
                    Utc::now(),
                ) {
                    Ok(revalidated) => self.coupon = Some(revalidated),
                    Err(reason) => info!(
                        code = %application.code(),
                        provider = %provider,
                        reason = %reason,
                        "Coupon dropped after payment method change"
                    ),
                }
            }
        }
        Ok(())
    }

    /// Pay with the selected provider and record the order.
    ///
    /// A declined or cancelled payment returns to provider selection. Once
    /// payment succeeds this never pays again: an order failure is returned
    /// as [`CheckoutError::OrderCreationFailed`] and the checkout ends.
    pub async fn place_order(&mut self) -> Result<CheckoutOutcome, CheckoutError> {
        let payments = self.storefront.payments();
        let provider = payments.selected().ok_or(CheckoutError::NoPaymentSelected)?;
        let totals = self.totals()?;

        self.flow.begin_payment(PaymentSelection::from(provider))?;
        let intent = PaymentIntent::new(totals.total, self.flow.id.clone());

        let outcome = match payments.pay(&intent).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.flow.payment_failed(e.user_message())?;
                return Err(e);
            }
        };

        let result = match outcome {
            PaymentOutcome::Succeeded(result) => result,
            PaymentOutcome::Cancelled => {
                self.flow.payment_cancelled()?;
                return Ok(CheckoutOutcome::PaymentCancelled);
            }
            PaymentOutcome::Failed(message) => {
                self.flow.payment_failed(message.clone())?;
                return Ok(CheckoutOutcome::PaymentFailed(message));
            }
        };

        self.flow.payment_succeeded(result.transaction_id.clone())?;
        self.flow.begin_order()?;

        let identity = self.storefront.session().current();
        let address = self
            .flow
            .shipping_address
            .clone()
            .ok_or_else(|| turbo_commerce::CommerceError::CheckoutIncomplete("shipping address".into()))?;

        match self
            .storefront
            .orders()
            .submit(
                identity.as_ref(),
                &self.cart,
                address,
                result,
                self.coupon.as_ref(),
            )
            .await
        {
            Ok(order) => {
                self.flow.order_created(order.id.clone())?;
                Ok(CheckoutOutcome::OrderCreated(order))
            }
            Err(e) => {
                warn!(checkout_id = %self.flow.id, error = %e, "Checkout ended without an order");
                self.flow.order_failed(e.to_string())?;
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for CheckoutSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutSession")
            .field("flow", &self.flow)
            .field("cart", &self.cart)
            .field("coupon", &self.coupon)
            .finish()
    }
}
