//! Cart reconciliation.
//!
//! [`CartService`] gives callers one cart API whether or not the shopper is
//! signed in. While a valid identity is present the remote cart is
//! authoritative and every result is written through to a local mirror;
//! otherwise the guest cache is. When the remote cart cannot be reached the
//! same operation is applied to the local cache for the current scope, so a
//! cart action never appears to fail because of backend trouble. Changes a
//! signed-in shopper makes that way are queued and sent to the remote cart,
//! in order, before any later remote result is accepted.

use super::cache::{CartCache, CartOp, CartScope, ProductCache, ProductSummary};
use crate::api::{CartBackend, RemoteCart};
use crate::events::{CartEvent, CartEvents};
use crate::session::{Identity, Session};
use crate::CheckoutError;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use turbo_commerce::cart::CartState;
use turbo_commerce::{Currency, ProductId};

/// Which backing store is authoritative for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveStore {
    /// Local guest cache.
    Guest,
    /// Server-persisted cart.
    Remote,
}

/// A guest line that could not be moved to the remote cart.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationFailure {
    pub product_id: ProductId,
    pub reason: String,
}

/// Outcome of moving the guest cart to the remote cart on sign-in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MigrationReport {
    pub migrated: Vec<ProductId>,
    pub failed: Vec<MigrationFailure>,
}

impl MigrationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn recovered(&mut self, product_id: &ProductId) {
        self.failed.retain(|f| &f.product_id != product_id);
        self.migrated.push(product_id.clone());
    }
}

/// Remote cart after queued changes were replayed.
struct Synced {
    state: CartState,
    /// Changes the backend accepted.
    replayed: Vec<CartOp>,
    /// Changes still waiting for the backend.
    queued: usize,
}

/// Single cart API over the guest cache and the remote cart.
///
/// Operations are serialized by an async mutex that also guards the
/// in-memory copy of the active cart.
pub struct CartService {
    backend: Arc<dyn CartBackend>,
    carts: CartCache,
    products: ProductCache,
    session: Arc<Session>,
    events: CartEvents,
    currency: Currency,
    state: Mutex<CartState>,
}

impl CartService {
    pub fn new(
        backend: Arc<dyn CartBackend>,
        carts: CartCache,
        products: ProductCache,
        session: Arc<Session>,
        events: CartEvents,
        currency: Currency,
    ) -> Self {
        Self {
            backend,
            carts,
            products,
            session,
            events,
            currency,
            state: Mutex::new(CartState::new(currency)),
        }
    }

    /// Store that is authoritative right now.
    pub fn active_store(&self) -> ActiveStore {
        if self.session.is_authenticated() {
            ActiveStore::Remote
        } else {
            ActiveStore::Guest
        }
    }

    /// Last cart returned by any operation, without touching a backend.
    pub async fn snapshot(&self) -> CartState {
        self.state.lock().await.clone()
    }

    /// Read the authoritative cart.
    pub async fn get(&self) -> Result<CartState, CheckoutError> {
        let mut slice = self.state.lock().await;
        let state = match self.session.current() {
            Some(identity) => {
                let scope = CartScope::User(identity.user_id.clone());
                self.sync(&identity, &scope).await?.state
            }
            None => self.carts.load(&CartScope::Guest)?,
        };
        *slice = state.clone();
        Ok(state)
    }

    /// Add `quantity` of a product, merging with an existing line.
    pub async fn add(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<CartState, CheckoutError> {
        if quantity < 1 {
            return Err(CheckoutError::InvalidQuantity(quantity));
        }
        self.mutate(CartOp::Add(product_id.clone(), quantity)).await
    }

    /// Remember a product's details, then add it.
    pub async fn add_product(
        &self,
        product: &ProductSummary,
        quantity: i64,
    ) -> Result<CartState, CheckoutError> {
        if quantity < 1 {
            return Err(CheckoutError::InvalidQuantity(quantity));
        }
        self.products.remember(product)?;
        self.add(&product.product_id, quantity).await
    }

    /// Set a line's quantity. A quantity below 1 removes the line.
    pub async fn update(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<CartState, CheckoutError> {
        if quantity < 1 {
            return self.remove(product_id).await;
        }
        self.mutate(CartOp::Update(product_id.clone(), quantity))
            .await
    }

    pub async fn remove(&self, product_id: &ProductId) -> Result<CartState, CheckoutError> {
        self.mutate(CartOp::Remove(product_id.clone())).await
    }

    pub async fn clear(&self) -> Result<CartState, CheckoutError> {
        self.mutate(CartOp::Clear).await
    }

    /// Sign in and move the guest cart to the remote cart.
    ///
    /// Lines are migrated one at a time with no rollback. Lines that fail
    /// because the backend is unreachable are queued like any other offline
    /// change: they stay in the cart and are tried again on every sync until
    /// the backend takes them. Lines the backend rejects are dropped and
    /// reported. The guest cache is cleared only after every line has been
    /// attempted.
    pub async fn sign_in(&self, identity: Identity) -> Result<MigrationReport, CheckoutError> {
        if !identity.is_valid() {
            return Err(CheckoutError::AuthenticationRequired);
        }
        self.session.set(identity.clone())?;
        info!(user_id = %identity.user_id, "Shopper signed in");

        let mut slice = self.state.lock().await;
        let scope = CartScope::User(identity.user_id.clone());
        let guest = self.carts.load(&CartScope::Guest)?;
        if let Err(e) = self.products.remember_cart(&guest) {
            warn!(error = %e, "Could not cache guest cart products");
        }

        let mut report = MigrationReport::default();
        let mut stranded = CartState::new(self.currency);
        for line in &guest.lines {
            match self
                .backend
                .add(&identity, &line.product_id, line.quantity)
                .await
            {
                Ok(_) => report.migrated.push(line.product_id.clone()),
                Err(e) => {
                    warn!(
                        product_id = %line.product_id,
                        quantity = line.quantity,
                        error = %e,
                        "Failed to migrate guest cart line"
                    );
                    if e.is_recoverable() {
                        stranded.add_line(line.clone())?;
                    }
                    report.failed.push(MigrationFailure {
                        product_id: line.product_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !stranded.is_empty() {
            let mut mirror = self.carts.load(&scope)?;
            mirror.merge(stranded.clone())?;
            self.carts.save(&scope, &mirror)?;
            for line in &stranded.lines {
                self.carts.push_pending(
                    &scope,
                    CartOp::Add(line.product_id.clone(), line.quantity),
                )?;
            }
        }
        self.carts.clear(&CartScope::Guest)?;

        let state = match self.sync(&identity, &scope).await {
            Ok(synced) => {
                for op in &synced.replayed {
                    if let CartOp::Add(id, _) = op {
                        if stranded.line(id).is_some() {
                            report.recovered(id);
                        }
                    }
                }
                synced.state
            }
            Err(e) => {
                warn!(error = %e, "Could not read remote cart after sign-in, using local mirror");
                self.carts.load(&scope)?
            }
        };

        info!(
            migrated = report.migrated.len(),
            failed = report.failed.len(),
            "Guest cart migration finished"
        );
        *slice = state.clone();
        self.announce(&state);
        Ok(report)
    }

    /// Forget the identity. The guest cart becomes authoritative.
    pub async fn sign_out(&self) -> Result<CartState, CheckoutError> {
        let mut slice = self.state.lock().await;
        if let Some(identity) = self.session.stored() {
            info!(user_id = %identity.user_id, "Shopper signed out");
        }
        self.session.clear()?;
        let state = self.carts.load(&CartScope::Guest)?;
        *slice = state.clone();
        self.announce(&state);
        Ok(state)
    }

    /// Empty every representation of the cart after an order was recorded.
    ///
    /// The order already exists, so a remote failure is logged, not returned.
    pub async fn clear_after_order(&self) -> Result<(), CheckoutError> {
        let mut slice = self.state.lock().await;
        if let Some(identity) = self.session.current() {
            if let Err(e) = self.backend.clear(&identity).await {
                warn!(error = %e, "Could not clear remote cart after order");
            }
            let scope = CartScope::User(identity.user_id.clone());
            self.carts.clear(&scope)?;
            self.carts.save_pending(&scope, &[])?;
        }
        self.carts.clear(&CartScope::Guest)?;
        *slice = CartState::new(self.currency);
        self.events.emit(CartEvent::Cleared);
        Ok(())
    }

    async fn mutate(&self, op: CartOp) -> Result<CartState, CheckoutError> {
        let mut slice = self.state.lock().await;
        let state = match self.session.current() {
            Some(identity) => {
                let scope = CartScope::User(identity.user_id.clone());
                let caught_up = self.carts.pending(&scope)?.is_empty()
                    || self.sync(&identity, &scope).await?.queued == 0;
                if caught_up {
                    match self.apply_remote(&identity, &op).await {
                        Ok(remote) => self.accept_remote(&scope, remote),
                        Err(e) if e.is_recoverable() => {
                            warn!(
                                op = op.name(),
                                error = %e,
                                "Cart backend unavailable, applying change to local mirror"
                            );
                            self.queue(&scope, op.clone())?
                        }
                        Err(e) => return Err(e.into()),
                    }
                } else {
                    // Earlier changes are still waiting; this one goes after them.
                    self.queue(&scope, op.clone())?
                }
            }
            None => self.apply_local(&CartScope::Guest, &op)?,
        };
        debug!(op = op.name(), lines = state.lines.len(), "Cart updated");
        *slice = state.clone();
        self.announce(&state);
        Ok(state)
    }

    async fn apply_remote(
        &self,
        identity: &Identity,
        op: &CartOp,
    ) -> Result<RemoteCart, crate::BackendError> {
        match op {
            CartOp::Add(id, qty) => self.backend.add(identity, id, *qty).await,
            CartOp::Update(id, qty) => self.backend.update(identity, id, *qty).await,
            CartOp::Remove(id) => self.backend.remove(identity, id).await,
            CartOp::Clear => self.backend.clear(identity).await,
        }
    }

    fn apply_local(&self, scope: &CartScope, op: &CartOp) -> Result<CartState, CheckoutError> {
        let mut state = self.carts.load(scope)?;
        op.apply(&mut state, &self.products)?;
        self.carts.save(scope, &state)?;
        Ok(state)
    }

    /// Apply a change to the local mirror and keep it for the remote cart.
    fn queue(&self, scope: &CartScope, op: CartOp) -> Result<CartState, CheckoutError> {
        let state = self.apply_local(scope, &op)?;
        let queued = self.carts.push_pending(scope, op)?;
        debug!(scope = %scope, queued, "Cart change queued");
        Ok(state)
    }

    /// Send queued changes to the remote cart, oldest first, then read it.
    ///
    /// Replay stops at the first change the backend cannot take right now;
    /// that change and the ones after it stay queued and are laid over the
    /// remote cart. Changes the backend rejects are dropped. Falls back to
    /// the local mirror while the backend is unreachable.
    async fn sync(&self, identity: &Identity, scope: &CartScope) -> Result<Synced, CheckoutError> {
        let mut queue = self.carts.pending(scope)?;
        let mut replayed = Vec::new();
        let mut latest = None;
        while let Some(op) = queue.first().cloned() {
            match self.apply_remote(identity, &op).await {
                Ok(remote) => {
                    latest = Some(remote);
                    replayed.push(op);
                }
                Err(e) if e.is_recoverable() => {
                    warn!(
                        op = op.name(),
                        queued = queue.len(),
                        error = %e,
                        "Cart backend unavailable, keeping queued changes"
                    );
                    break;
                }
                Err(e) => warn!(
                    op = op.name(),
                    error = %e,
                    "Queued cart change rejected, dropping it"
                ),
            }
            queue.remove(0);
            self.carts.save_pending(scope, &queue)?;
        }
        if !replayed.is_empty() {
            info!(scope = %scope, replayed = replayed.len(), "Queued cart changes sent");
        }

        let remote = match latest {
            Some(remote) => Ok(remote),
            None => self.backend.fetch(identity).await,
        };
        let state = match remote {
            Ok(remote) => {
                let mut state = self.accept_remote(scope, remote);
                if !queue.is_empty() {
                    for op in &queue {
                        if let Err(e) = op.apply(&mut state, &self.products) {
                            warn!(
                                op = op.name(),
                                error = %e,
                                "Could not apply queued cart change locally"
                            );
                        }
                    }
                    self.carts.save(scope, &state)?;
                }
                state
            }
            Err(e) if e.is_recoverable() || !queue.is_empty() => {
                warn!(error = %e, "Cart backend unavailable, reading local mirror");
                self.carts.load(scope)?
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Synced {
            state,
            replayed,
            queued: queue.len(),
        })
    }

    /// Take a remote result as truth and write it through locally.
    fn accept_remote(&self, scope: &CartScope, remote: RemoteCart) -> CartState {
        let RemoteCart {
            state,
            reported_total,
        } = remote;

        if let (Some(reported), Ok(computed)) = (reported_total, state.total_amount()) {
            if reported != computed {
                debug!(
                    reported = %reported,
                    computed = %computed,
                    "Backend cart total differs from line sum, using line sum"
                );
            }
        }
        if let Err(e) = self.carts.save(scope, &state) {
            warn!(scope = %scope, error = %e, "Could not write remote cart through to cache");
        }
        if let Err(e) = self.products.remember_cart(&state) {
            warn!(error = %e, "Could not cache cart products");
        }
        state
    }

    fn announce(&self, state: &CartState) {
        if let Ok(total) = state.total_amount() {
            self.events.emit(CartEvent::Changed {
                item_count: state.item_count(),
                total,
            });
        }
    }
}

impl std::fmt::Debug for CartService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartService")
            .field("currency", &self.currency)
            .field("active_store", &self.active_store())
            .finish_non_exhaustive()
    }
}
