//! Cart and checkout orchestration for TurboCommerce storefronts.
//!
//! This crate sits between a storefront UI and its backends:
//!
//! - **Cart**: one cart API over the guest cache and the remote cart, with
//!   offline fallback and guest cart migration on sign-in
//! - **Coupons**: backend validation with a single local discount rule
//! - **Payments**: provider adapters behind one orchestrator
//! - **Orders**: assembly and submission after payment, exactly once
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_checkout::prelude::*;
//!
//! let config = StorefrontConfig::load("turbo-checkout.toml")?;
//! let storefront = Storefront::from_config(&config)?;
//!
//! storefront.cart().add(&ProductId::new("kurta-01"), 1).await?;
//!
//! let mut checkout = storefront.begin_checkout().await?;
//! checkout.set_shipping_address(address);
//! checkout.select_payment(PaymentProvider::PhonePe).await?;
//! checkout.apply_coupon("FLAT100").await?;
//!
//! match checkout.place_order().await? {
//!     CheckoutOutcome::OrderCreated(order) => println!("Order {}", order.id),
//!     CheckoutOutcome::PaymentFailed(message) => println!("{}", message),
//!     CheckoutOutcome::PaymentCancelled => {}
//! }
//! ```

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod coupon;
pub mod error;
pub mod events;
pub mod liveness;
pub mod order;
pub mod payment;
pub mod session;
pub mod storefront;

pub use error::{BackendError, CheckoutError};
pub use storefront::{Storefront, StorefrontBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::cart::{ActiveStore, CartService, MigrationReport, ProductSummary};
    pub use crate::checkout::{CheckoutOutcome, CheckoutSession};
    pub use crate::config::StorefrontConfig;
    pub use crate::coupon::CouponEngine;
    pub use crate::error::{BackendError, CheckoutError};
    pub use crate::events::{CartEvent, CartEvents};
    pub use crate::liveness::{BackendStatus, LivenessProbe, Reachability};
    pub use crate::payment::{PaymentOrchestrator, PaymentOutcome};
    pub use crate::session::{Identity, Session};
    pub use crate::storefront::{Storefront, StorefrontBuilder};

    pub use turbo_commerce::prelude::*;
}
