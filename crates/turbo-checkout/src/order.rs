//! Order creation after payment.

use crate::api::OrderBackend;
use crate::cart::CartService;
use crate::coupon::CouponEngine;
use crate::events::{CartEvent, CartEvents};
use crate::session::Identity;
use crate::CheckoutError;
use std::sync::Arc;
use tracing::{error, info, warn};
use turbo_commerce::cart::{CartState, CouponApplication};
use turbo_commerce::checkout::{Address, Order, OrderRequest};
use turbo_commerce::payment::PaymentResult;

/// Turns a paid cart into an order.
///
/// Runs once per payment. A failure after payment is reported with the
/// transaction id and is never followed by another charge.
pub struct OrderAssembler {
    orders: Arc<dyn OrderBackend>,
    coupons: CouponEngine,
    cart: Arc<CartService>,
    events: CartEvents,
}

impl OrderAssembler {
    pub fn new(
        orders: Arc<dyn OrderBackend>,
        coupons: CouponEngine,
        cart: Arc<CartService>,
        events: CartEvents,
    ) -> Self {
        Self {
            orders,
            coupons,
            cart,
            events,
        }
    }

    /// Record an order for `cart`, paid by `payment`.
    pub async fn submit(
        &self,
        identity: Option<&Identity>,
        cart: &CartState,
        shipping_address: Address,
        payment: PaymentResult,
        coupon: Option<&CouponApplication>,
    ) -> Result<Order, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let transaction_id = payment.transaction_id.clone();

        let request = OrderRequest::assemble(cart, shipping_address, payment, coupon).map_err(
            |e| {
                error!(transaction_id = %transaction_id, error = %e, "Could not assemble order");
                CheckoutError::OrderCreationFailed {
                    transaction_id: transaction_id.clone(),
                    message: e.to_string(),
                }
            },
        )?;

        if let Some(application) = coupon.filter(|_| request.coupon_code.is_some()) {
            self.record_coupon(identity, application).await;
        }

        let order = match self.orders.create(identity, &request).await {
            Ok(order) => order,
            Err(e) => {
                error!(
                    transaction_id = %transaction_id,
                    total = %request.total_price,
                    error = %e,
                    "Order creation failed after payment"
                );
                return Err(CheckoutError::OrderCreationFailed {
                    transaction_id,
                    message: e.to_string(),
                });
            }
        };

        info!(
            order_id = %order.id,
            transaction_id = %transaction_id,
            total = %order.total_price(),
            items = request.item_count(),
            "Order placed"
        );

        if let Err(e) = self.cart.clear_after_order().await {
            warn!(order_id = %order.id, error = %e, "Could not clear cart after order");
        }
        self.events.emit(CartEvent::OrderPlaced {
            order_id: order.id.clone(),
        });
        Ok(order)
    }

    /// Redemption is bookkeeping once payment is taken; failures are logged.
    async fn record_coupon(&self, identity: Option<&Identity>, application: &CouponApplication) {
        let Some(identity) = identity else {
            error!(code = %application.code(), "Coupon used without a signed-in shopper");
            return;
        };
        if let Err(e) = self.coupons.apply(identity, application).await {
            error!(
                code = %application.code(),
                error = %e,
                "Failed to record coupon usage"
            );
        }
    }
}

impl std::fmt::Debug for OrderAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderAssembler").finish_non_exhaustive()
    }
}
