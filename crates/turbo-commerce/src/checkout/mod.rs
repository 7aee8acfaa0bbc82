//! Checkout module.
//!
//! Contains the checkout state machine, shipping addresses and orders.

mod flow;
mod address;
mod order;

pub use flow::{CheckoutFlow, CheckoutState};
pub use address::Address;
pub use order::{Order, OrderItem, OrderRequest};
