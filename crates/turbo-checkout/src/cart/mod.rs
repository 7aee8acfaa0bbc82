//! Cart storage and reconciliation.

mod cache;
mod service;

pub use cache::{CartCache, CartScope, ProductCache, ProductSummary};
pub use service::{ActiveStore, CartService, MigrationFailure, MigrationReport};
