//! Type-safe Key-Value caching layer for TurboCommerce.
//!
//! Provides a simple, ergonomic API for caching data in a key-value store
//! with automatic JSON serialization. Stores are pluggable: process memory,
//! a directory of files, or Spin's Key-Value Store when compiled to wasm.
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_cache::{cache_key, Cache};
//!
//! let cache = Cache::file(".turbo-checkout")?;
//!
//! // Store a value
//! cache.set(&cache_key!("cart", "user", user_id), &cart)?;
//!
//! // Retrieve a value
//! let cart: Option<CartState> = cache.get("cart:guest")?;
//!
//! // Delete a value
//! cache.delete("cart:guest")?;
//! ```

mod error;
mod kv;

pub use error::CacheError;
pub use kv::{Cache, FileStore, KvStore, MemoryStore};

#[cfg(target_arch = "wasm32")]
pub use kv::SpinStore;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{cache_key, Cache, CacheError, KvStore};
}
