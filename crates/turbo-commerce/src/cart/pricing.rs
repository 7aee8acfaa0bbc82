//! Checkout totals.

use crate::cart::{CartState, CouponApplication};
use crate::error::CommerceError;
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// The single set of totals shared by payment and order creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CheckoutTotals {
    /// Cart total before discounts.
    pub original: Money,
    /// Coupon discount.
    pub discount: Money,
    /// Amount to charge (`original - discount`).
    pub total: Money,
}

impl CheckoutTotals {
    /// Compute totals for a cart and an optional coupon application.
    ///
    /// An application computed against a different cart total is ignored,
    /// since its discount no longer describes this cart.
    pub fn compute(
        cart: &CartState,
        coupon: Option<&CouponApplication>,
    ) -> Result<Self, CommerceError> {
        let original = cart.total_amount()?;
        let discount = match coupon {
            Some(app) if app.order_value == original => app.discount_amount,
            _ => Money::zero(cart.currency),
        };
        let total = original
            .try_subtract(&discount)
            .ok_or(CommerceError::Overflow)?;
        Ok(Self {
            original,
            discount,
            total,
        })
    }

    /// Check if a discount is applied.
    pub fn has_discount(&self) -> bool {
        self.discount.is_positive()
    }
}
