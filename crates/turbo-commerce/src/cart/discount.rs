//! Coupon definitions and discount evaluation.

use crate::error::CommerceError;
use crate::ids::ProductId;
use crate::money::Money;
use crate::payment::PaymentMethodTag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Type of discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// Percentage off the order value.
    Percentage,
    /// Fixed amount off.
    Fixed,
}

/// A promotional coupon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coupon {
    /// Normalized (trimmed, upper-case) code.
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    /// Percent for `Percentage` coupons, major currency units for `Fixed`.
    pub discount_value: f64,
    /// Cap on the computed discount (percentage coupons).
    pub max_discount: Option<Money>,
    pub min_order_value: Money,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    /// Maximum number of redemptions (None = unlimited).
    pub usage_limit: Option<i64>,
    pub usage_count: i64,
    /// Allowed payment methods. Empty means any method.
    pub payment_methods: BTreeSet<PaymentMethodTag>,
    /// Products the coupon applies to. Empty means every product.
    pub applicable_products: BTreeSet<ProductId>,
    pub is_active: bool,
}

/// Normalize a user-entered coupon code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl Coupon {
    /// Create a percentage coupon valid from `valid_from` to `valid_until`.
    pub fn percentage(
        code: &str,
        percent: f64,
        min_order_value: Money,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self::new(code, DiscountType::Percentage, percent, min_order_value, valid_from, valid_until)
    }

    /// Create a fixed-amount coupon.
    pub fn fixed(
        code: &str,
        amount: Money,
        min_order_value: Money,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self::new(
            code,
            DiscountType::Fixed,
            amount.to_decimal(),
            min_order_value,
            valid_from,
            valid_until,
        )
    }

    fn new(
        code: &str,
        discount_type: DiscountType,
        discount_value: f64,
        min_order_value: Money,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self {
            code: normalize_code(code),
            description: None,
            discount_type,
            discount_value,
            max_discount: None,
            min_order_value,
            valid_from,
            valid_until,
            usage_limit: None,
            usage_count: 0,
            payment_methods: BTreeSet::new(),
            applicable_products: BTreeSet::new(),
            is_active: true,
        }
    }

    /// Cap the discount amount.
    pub fn with_max_discount(mut self, max: Money) -> Self {
        self.max_discount = Some(max);
        self
    }

    /// Add a usage limit.
    pub fn with_usage_limit(mut self, limit: i64) -> Self {
        self.usage_limit = Some(limit);
        self
    }

    /// Restrict the coupon to the given payment methods.
    pub fn with_payment_methods(mut self, methods: impl IntoIterator<Item = PaymentMethodTag>) -> Self {
        self.payment_methods = methods.into_iter().collect();
        self
    }

    /// Restrict the coupon to the given products.
    pub fn with_products(mut self, products: impl IntoIterator<Item = ProductId>) -> Self {
        self.applicable_products = products.into_iter().collect();
        self
    }

    /// Check the time window, active flag and usage limit.
    pub fn check_validity(&self, now: DateTime<Utc>) -> Result<(), CouponRejection> {
        if !self.is_active {
            return Err(CouponRejection::Inactive);
        }
        if now < self.valid_from {
            return Err(CouponRejection::NotYetValid);
        }
        if now > self.valid_until {
            return Err(CouponRejection::Expired);
        }
        if self.is_exhausted() {
            return Err(CouponRejection::UsageLimitReached);
        }
        Ok(())
    }

    /// Whether the coupon can be redeemed at `now`.
    pub fn is_currently_valid(&self, now: DateTime<Utc>) -> bool {
        self.check_validity(now).is_ok()
    }

    /// Check if the usage limit has been reached. Unlimited coupons never are.
    pub fn is_exhausted(&self) -> bool {
        self.usage_limit
            .map(|limit| self.usage_count >= limit)
            .unwrap_or(false)
    }

    /// Check the payment-method restriction.
    pub fn allows_method(&self, method: Option<PaymentMethodTag>) -> bool {
        match method {
            Some(tag) => self.payment_methods.is_empty() || self.payment_methods.contains(&tag),
            None => true,
        }
    }

    /// Discount for `order_value`, without eligibility checks.
    ///
    /// Never exceeds `order_value`.
    pub fn discount_for(&self, order_value: Money) -> Money {
        let raw = match self.discount_type {
            DiscountType::Percentage => {
                let amount = order_value.percentage(self.discount_value);
                match self.max_discount {
                    Some(max) => amount.min(Money::new(max.amount_cents, order_value.currency)),
                    None => amount,
                }
            }
            DiscountType::Fixed => Money::from_decimal(self.discount_value, order_value.currency),
        };
        let capped = raw.min(order_value);
        if capped.is_negative() {
            Money::zero(order_value.currency)
        } else {
            capped
        }
    }

    /// Run every eligibility rule and compute the application.
    pub fn evaluate(
        &self,
        order_value: Money,
        method: Option<PaymentMethodTag>,
        product_ids: &[ProductId],
        now: DateTime<Utc>,
    ) -> Result<CouponApplication, CouponRejection> {
        self.check_validity(now)?;

        if order_value.amount_cents < self.min_order_value.amount_cents {
            return Err(CouponRejection::BelowMinimumOrder {
                minimum: self.min_order_value,
            });
        }

        if let Some(tag) = method {
            if !self.allows_method(Some(tag)) {
                return Err(CouponRejection::PaymentMethodNotEligible { method: tag });
            }
        }

        if !self.applicable_products.is_empty()
            && !product_ids
                .iter()
                .any(|id| self.applicable_products.contains(id))
        {
            return Err(CouponRejection::NotApplicableToProducts);
        }

        CouponApplication::new(self.clone(), order_value, method)
            .map_err(|e| CouponRejection::Unknown(e.to_string()))
    }
}

/// Why a coupon could not be applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CouponRejection {
    /// No coupon with that code exists.
    NotFound,
    Inactive,
    NotYetValid,
    Expired,
    UsageLimitReached,
    BelowMinimumOrder { minimum: Money },
    PaymentMethodNotEligible { method: PaymentMethodTag },
    NotApplicableToProducts,
    /// Rejected by the backend with its own message.
    Unknown(String),
}

impl fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CouponRejection::NotFound => write!(f, "Invalid coupon code"),
            CouponRejection::Inactive => write!(f, "This coupon is no longer active"),
            CouponRejection::NotYetValid => write!(f, "This coupon is not valid yet"),
            CouponRejection::Expired => write!(f, "This coupon has expired"),
            CouponRejection::UsageLimitReached => {
                write!(f, "This coupon has reached its usage limit")
            }
            CouponRejection::BelowMinimumOrder { minimum } => {
                write!(f, "Minimum order value of {} required", minimum)
            }
            CouponRejection::PaymentMethodNotEligible { method } => write!(
                f,
                "This coupon is not valid for {} payments",
                method.display_name()
            ),
            CouponRejection::NotApplicableToProducts => {
                write!(f, "This coupon does not apply to the items in your cart")
            }
            CouponRejection::Unknown(message) => write!(f, "{}", message),
        }
    }
}

/// A coupon that passed validation for one specific order context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CouponApplication {
    pub coupon: Coupon,
    /// Order value the discount was computed against.
    pub order_value: Money,
    /// Payment method the coupon was validated for.
    pub payment_method: Option<PaymentMethodTag>,
    pub discount_amount: Money,
    pub final_amount: Money,
}

impl CouponApplication {
    /// Compute the application of `coupon` against `order_value`.
    pub fn new(
        coupon: Coupon,
        order_value: Money,
        payment_method: Option<PaymentMethodTag>,
    ) -> Result<Self, CommerceError> {
        let discount_amount = coupon.discount_for(order_value);
        let final_amount = order_value
            .try_subtract(&discount_amount)
            .ok_or(CommerceError::Overflow)?;
        Ok(Self {
            coupon,
            order_value,
            payment_method,
            discount_amount,
            final_amount,
        })
    }

    /// The coupon code.
    pub fn code(&self) -> &str {
        &self.coupon.code
    }

    /// Whether the application still matches the order context. Any change
    /// of total or payment method requires validating again.
    pub fn is_current_for(&self, order_value: Money, method: Option<PaymentMethodTag>) -> bool {
        self.order_value == order_value && self.payment_method == method
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use chrono::Duration;

    fn inr(rupees: i64) -> Money {
        Money::from_major(rupees, Currency::INR)
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        (now - Duration::days(1), now + Duration::days(30), now)
    }

    #[test]
    fn test_percentage_discount_is_capped() {
        let (from, until, now) = window();
        let welcome = Coupon::percentage("welcome10", 10.0, inr(1000), from, until)
            .with_max_discount(inr(500));

        let app = welcome.evaluate(inr(6000), None, &[], now).unwrap();
        assert_eq!(app.discount_amount, inr(500));
        assert_eq!(app.final_amount, inr(5500));
        assert_eq!(app.code(), "WELCOME10");
    }

    #[test]
    fn test_percentage_discount_below_cap() {
        let (from, until, now) = window();
        let welcome = Coupon::percentage("WELCOME10", 10.0, inr(1000), from, until)
            .with_max_discount(inr(500));

        let app = welcome.evaluate(inr(2000), None, &[], now).unwrap();
        assert_eq!(app.discount_amount, inr(200));
    }

    #[test]
    fn test_fixed_discount_never_exceeds_order_value() {
        let (from, until, now) = window();
        let coupon = Coupon::fixed("BIG", inr(1000), inr(0), from, until);

        let app = coupon.evaluate(inr(600), None, &[], now).unwrap();
        assert_eq!(app.discount_amount, inr(600));
        assert!(app.final_amount.is_zero());
    }

    #[test]
    fn test_expired_coupon_rejected_even_if_active() {
        let now = Utc::now();
        let coupon = Coupon::fixed(
            "OLD",
            inr(100),
            inr(0),
            now - Duration::days(10),
            now - Duration::days(1),
        );
        assert!(coupon.is_active);
        assert_eq!(
            coupon.evaluate(inr(1000), None, &[], now),
            Err(CouponRejection::Expired)
        );
    }

    #[test]
    fn test_not_yet_valid_coupon_rejected() {
        let now = Utc::now();
        let coupon = Coupon::fixed("SOON", inr(100), inr(0), now + Duration::days(1), now + Duration::days(2));
        assert_eq!(coupon.check_validity(now), Err(CouponRejection::NotYetValid));
    }

    #[test]
    fn test_minimum_order_value() {
        let (from, until, now) = window();
        let coupon = Coupon::percentage("WELCOME10", 10.0, inr(1000), from, until);
        assert_eq!(
            coupon.evaluate(inr(999), None, &[], now),
            Err(CouponRejection::BelowMinimumOrder { minimum: inr(1000) })
        );
    }

    #[test]
    fn test_payment_method_restriction() {
        let (from, until, now) = window();
        let coupon = Coupon::fixed("UPIONLY", inr(50), inr(0), from, until)
            .with_payment_methods([PaymentMethodTag::Upi]);

        assert_eq!(
            coupon.evaluate(inr(500), Some(PaymentMethodTag::Card), &[], now),
            Err(CouponRejection::PaymentMethodNotEligible {
                method: PaymentMethodTag::Card
            })
        );
        assert!(coupon.evaluate(inr(500), Some(PaymentMethodTag::Upi), &[], now).is_ok());
        // No method chosen yet: restriction cannot fail
        assert!(coupon.evaluate(inr(500), None, &[], now).is_ok());
    }

    #[test]
    fn test_usage_limit() {
        let (from, until, now) = window();
        let mut coupon = Coupon::fixed("LIMITED", inr(50), inr(0), from, until).with_usage_limit(5);

        coupon.usage_count = 4;
        assert!(coupon.is_currently_valid(now));

        coupon.usage_count = 5;
        assert_eq!(coupon.check_validity(now), Err(CouponRejection::UsageLimitReached));
    }

    #[test]
    fn test_unlimited_coupon_never_exhausts() {
        let (from, until, now) = window();
        let mut coupon = Coupon::fixed("FOREVER", inr(50), inr(0), from, until);
        coupon.usage_count = 1_000_000;
        assert!(coupon.is_currently_valid(now));
    }

    #[test]
    fn test_product_restriction() {
        let (from, until, now) = window();
        let coupon = Coupon::fixed("SHOES", inr(50), inr(0), from, until)
            .with_products([ProductId::new("shoe-1")]);

        assert_eq!(
            coupon.evaluate(inr(500), None, &[ProductId::new("hat-1")], now),
            Err(CouponRejection::NotApplicableToProducts)
        );
        assert!(coupon
            .evaluate(inr(500), None, &[ProductId::new("hat-1"), ProductId::new("shoe-1")], now)
            .is_ok());
    }

    #[test]
    fn test_application_goes_stale() {
        let (from, until, now) = window();
        let coupon = Coupon::fixed("FLAT100", inr(100), inr(0), from, until);
        let app = coupon
            .evaluate(inr(1000), Some(PaymentMethodTag::Upi), &[], now)
            .unwrap();

        assert!(app.is_current_for(inr(1000), Some(PaymentMethodTag::Upi)));
        assert!(!app.is_current_for(inr(1100), Some(PaymentMethodTag::Upi)));
        assert!(!app.is_current_for(inr(1000), Some(PaymentMethodTag::Card)));
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  flat100 "), "FLAT100");
    }
}
