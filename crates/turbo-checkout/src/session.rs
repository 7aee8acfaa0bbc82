//! Shopper identity and its persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tracing::{debug, warn};
use turbo_cache::{Cache, CacheError};
use turbo_commerce::UserId;

/// Storage key for the persisted identity.
pub const IDENTITY_KEY: &str = "auth:identity";

/// An authenticated shopper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    /// Bearer token sent to the backends.
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(user_id: UserId, token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            token: token.into(),
            expires_at,
        }
    }

    /// Token present and not yet expired at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.token.trim().is_empty() && now < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

/// The current shopper's identity, persisted in the cache.
///
/// The lock is never held across an await.
#[derive(Debug)]
pub struct Session {
    cache: Cache,
    identity: RwLock<Option<Identity>>,
}

impl Session {
    /// Restore a session from the cache. A missing or unreadable identity
    /// starts a guest session.
    pub fn load(cache: Cache) -> Self {
        let identity = match cache.get::<Identity>(IDENTITY_KEY) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable stored identity");
                None
            }
        };
        Self {
            cache,
            identity: RwLock::new(identity),
        }
    }

    /// Guest session that is not restored from storage.
    pub fn guest(cache: Cache) -> Self {
        Self {
            cache,
            identity: RwLock::new(None),
        }
    }

    /// The identity if it is still valid. Expired identities read as guest.
    pub fn current(&self) -> Option<Identity> {
        let guard = self.identity.read().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().filter(|id| id.is_valid()).cloned()
    }

    /// The stored identity even if it has expired.
    pub fn stored(&self) -> Option<Identity> {
        self.identity
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    /// Persist and activate an identity.
    pub fn set(&self, identity: Identity) -> Result<(), CacheError> {
        self.cache.set(IDENTITY_KEY, &identity)?;
        debug!(user_id = %identity.user_id, "Identity stored");
        *self.identity.write().unwrap_or_else(|e| e.into_inner()) = Some(identity);
        Ok(())
    }

    /// Forget the identity.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.cache.delete(IDENTITY_KEY)?;
        *self.identity.write().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
