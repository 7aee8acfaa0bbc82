//! Storefront domain types and pricing rules for TurboCommerce.
//!
//! This crate holds the pure, I/O-free half of checkout:
//!
//! - **Money**: integer minor units with a currency
//! - **Cart**: cart lines, coupons and the single checkout total
//! - **Payment**: providers and the method tags coupons are scoped to
//! - **Checkout**: the checkout state machine, addresses and orders
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_commerce::prelude::*;
//!
//! let mut cart = CartState::new(Currency::INR);
//! cart.add_line(CartLine::new(
//!     ProductId::new("kurta-01"),
//!     "Cotton Kurta",
//!     Money::from_major(1000, Currency::INR),
//!     1,
//! )?)?;
//!
//! let coupon = Coupon::fixed("FLAT100", Money::from_major(100, Currency::INR),
//!     Money::zero(Currency::INR), valid_from, valid_until);
//! let app = coupon.evaluate(cart.total_amount()?, Some(PaymentMethodTag::Upi),
//!     &cart.product_ids(), Utc::now())?;
//!
//! let totals = CheckoutTotals::compute(&cart, Some(&app))?;
//! println!("Pay {}", totals.total.display()); // ₹900.00
//! ```

pub mod error;
pub mod ids;
pub mod money;
pub mod payment;

pub mod cart;
pub mod checkout;

pub use error::CommerceError;
pub use ids::*;
pub use money::{Currency, Money};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::CommerceError;
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};

    // Cart
    pub use crate::cart::{
        CartLine, CartState, CheckoutTotals, Coupon, CouponApplication, CouponRejection,
        DiscountType,
    };

    // Payment
    pub use crate::payment::{
        PaymentMethodTag, PaymentProvider, PaymentResult, PaymentSelection, PaymentStatus,
    };

    // Checkout
    pub use crate::checkout::{
        Address, CheckoutFlow, CheckoutState, Order, OrderItem, OrderRequest,
    };
}
