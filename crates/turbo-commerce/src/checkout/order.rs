//! Order types.

use crate::cart::{CartLine, CartState, CheckoutTotals, CouponApplication};
use crate::checkout::Address;
use crate::error::CommerceError;
use crate::ids::{OrderId, ProductId, UserId};
use crate::money::Money;
use crate::payment::{PaymentMethodTag, PaymentResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A line in an order, snapshotted from the cart at submission time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub image_ref: Option<String>,
}

impl From<&CartLine> for OrderItem {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.clone(),
            name: line.display_name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            image_ref: line.image_ref.clone(),
        }
    }
}

/// Everything needed to create an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub items: Vec<OrderItem>,
    pub shipping_address: Address,
    pub payment_method: PaymentMethodTag,
    pub payment_result: PaymentResult,
    /// Amount charged (after discount).
    pub total_price: Money,
    /// Cart total before discount.
    pub original_price: Money,
    pub discount_amount: Money,
    pub coupon_code: Option<String>,
}

impl OrderRequest {
    /// Assemble an order from a cart snapshot, address, payment result and
    /// optional coupon application.
    ///
    /// The payment must have been taken for exactly the discounted total.
    pub fn assemble(
        cart: &CartState,
        shipping_address: Address,
        payment_result: PaymentResult,
        coupon: Option<&CouponApplication>,
    ) -> Result<Self, CommerceError> {
        if cart.is_empty() {
            return Err(CommerceError::EmptyCart);
        }
        let missing = shipping_address.missing_fields();
        if !missing.is_empty() {
            return Err(CommerceError::CheckoutIncomplete(missing.join(", ")));
        }

        let totals = CheckoutTotals::compute(cart, coupon)?;
        if payment_result.amount != totals.total {
            return Err(CommerceError::ValidationError(format!(
                "payment amount {} does not match order total {}",
                payment_result.amount, totals.total
            )));
        }

        Ok(Self {
            items: cart.lines.iter().map(OrderItem::from).collect(),
            shipping_address,
            payment_method: payment_result.payment_method,
            payment_result,
            total_price: totals.total,
            original_price: totals.original,
            discount_amount: totals.discount,
            coupon_code: coupon
                .filter(|_| totals.has_discount())
                .map(|app| app.code().to_string()),
        })
    }

    /// Get total item count.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// An order as recorded by the order backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub status: String,
    pub request: OrderRequest,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Amount charged.
    pub fn total_price(&self) -> Money {
        self.request.total_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TransactionId;
    use crate::money::Currency;
    use crate::payment::{PaymentProvider, PaymentStatus};

    fn cart() -> CartState {
        let mut cart = CartState::new(Currency::INR);
        cart.add_line(
            CartLine::new(ProductId::new("p1"), "Kurta", Money::from_major(500, Currency::INR), 2)
                .unwrap(),
        )
        .unwrap();
        cart
    }

    fn address() -> Address {
        Address::new("Asha Rao", "12 MG Road", "Bengaluru", "560001", "India")
    }

    fn paid(amount: Money) -> PaymentResult {
        PaymentResult {
            transaction_id: TransactionId::new("txn_1"),
            provider: PaymentProvider::PhonePe,
            payment_method: PaymentMethodTag::Upi,
            amount,
            status: PaymentStatus::Succeeded,
        }
    }

    #[test]
    fn test_assemble_without_coupon() {
        let order = OrderRequest::assemble(
            &cart(),
            address(),
            paid(Money::from_major(1000, Currency::INR)),
            None,
        )
        .unwrap();

        assert_eq!(order.original_price, order.total_price);
        assert!(order.discount_amount.is_zero());
        assert_eq!(order.coupon_code, None);
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.payment_method, PaymentMethodTag::Upi);
    }

    #[test]
    fn test_assemble_rejects_empty_cart() {
        let result = OrderRequest::assemble(
            &CartState::new(Currency::INR),
            address(),
            paid(Money::zero(Currency::INR)),
            None,
        );
        assert_eq!(result, Err(CommerceError::EmptyCart));
    }

    #[test]
    fn test_assemble_rejects_amount_mismatch() {
        let result = OrderRequest::assemble(
            &cart(),
            address(),
            paid(Money::from_major(999, Currency::INR)),
            None,
        );
        assert!(matches!(result, Err(CommerceError::ValidationError(_))));
    }

    #[test]
    fn test_assemble_rejects_incomplete_address() {
        let result = OrderRequest::assemble(
            &cart(),
            Address::default(),
            paid(Money::from_major(1000, Currency::INR)),
            None,
        );
        assert!(matches!(result, Err(CommerceError::CheckoutIncomplete(_))));
    }
}
