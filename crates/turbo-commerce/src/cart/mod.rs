//! Shopping cart module.
//!
//! Contains cart lines and state, coupons, and checkout totals.

mod cart;
mod discount;
mod pricing;

pub use cart::{CartLine, CartState, MAX_QUANTITY_PER_ITEM};
pub use discount::{normalize_code, Coupon, CouponApplication, CouponRejection, DiscountType};
pub use pricing::CheckoutTotals;
