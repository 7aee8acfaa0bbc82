//! Persistent cart and product caches.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;
use turbo_cache::{cache_key, Cache, CacheError};
use turbo_commerce::cart::{CartLine, CartState};
use turbo_commerce::{CommerceError, Currency, Money, ProductId, UserId};

/// Which cached cart a key belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CartScope {
    /// The browser-local cart of a shopper who is not signed in.
    Guest,
    /// Local mirror of a signed-in shopper's remote cart.
    User(UserId),
}

impl CartScope {
    pub fn key(&self) -> String {
        match self {
            CartScope::Guest => cache_key!("cart", "guest"),
            CartScope::User(user_id) => cache_key!("cart", "user", user_id),
        }
    }

    fn pending_key(&self) -> String {
        cache_key!("cart", "pending", self)
    }
}

impl fmt::Display for CartScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CartScope::Guest => write!(f, "guest"),
            CartScope::User(user_id) => write!(f, "user:{}", user_id),
        }
    }
}

/// A cart change, kept so it can be sent to the remote cart later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum CartOp {
    Add(ProductId, i64),
    Update(ProductId, i64),
    Remove(ProductId),
    Clear,
}

impl CartOp {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            CartOp::Add(..) => "add",
            CartOp::Update(..) => "update",
            CartOp::Remove(_) => "remove",
            CartOp::Clear => "clear",
        }
    }

    /// Apply the change to a local cart.
    pub(crate) fn apply(
        &self,
        state: &mut CartState,
        products: &ProductCache,
    ) -> Result<(), crate::CheckoutError> {
        match self {
            CartOp::Add(id, qty) => {
                if !state.increment(id, *qty)? {
                    let product = products
                        .lookup(id)?
                        .ok_or_else(|| crate::CheckoutError::UnknownProduct(id.clone()))?;
                    state.add_line(product.to_line(*qty)?)?;
                }
            }
            CartOp::Update(id, qty) => {
                if !state.set_quantity(id, *qty)? {
                    return Err(CommerceError::ItemNotInCart(id.to_string()).into());
                }
            }
            CartOp::Remove(id) => {
                state.remove_line(id);
            }
            CartOp::Clear => state.clear(),
        }
        Ok(())
    }
}

/// Cart state persisted per [`CartScope`], plus the changes made while the
/// remote cart was unreachable.
#[derive(Debug, Clone)]
pub struct CartCache {
    cache: Cache,
    currency: Currency,
}

impl CartCache {
    pub fn new(cache: Cache, currency: Currency) -> Self {
        Self { cache, currency }
    }

    /// Load a cart. Missing entries are empty carts; unreadable ones are
    /// logged and also treated as empty.
    pub fn load(&self, scope: &CartScope) -> Result<CartState, CacheError> {
        match self.cache.get::<CartState>(&scope.key()) {
            Ok(Some(state)) => Ok(state),
            Ok(None) => Ok(CartState::new(self.currency)),
            Err(e) if e.is_corrupt() => {
                warn!(scope = %scope, error = %e, "Discarding corrupt cached cart");
                Ok(CartState::new(self.currency))
            }
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, scope: &CartScope, state: &CartState) -> Result<(), CacheError> {
        self.cache.set(&scope.key(), state)
    }

    pub fn clear(&self, scope: &CartScope) -> Result<(), CacheError> {
        self.cache.delete(&scope.key())
    }

    /// Queued changes, oldest first. An unreadable queue is dropped.
    pub(crate) fn pending(&self, scope: &CartScope) -> Result<Vec<CartOp>, CacheError> {
        match self.cache.get::<Vec<CartOp>>(&scope.pending_key()) {
            Ok(ops) => Ok(ops.unwrap_or_default()),
            Err(e) if e.is_corrupt() => {
                warn!(scope = %scope, error = %e, "Discarding corrupt queued cart changes");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) fn save_pending(&self, scope: &CartScope, ops: &[CartOp]) -> Result<(), CacheError> {
        if ops.is_empty() {
            self.cache.delete(&scope.pending_key())
        } else {
            self.cache.set(&scope.pending_key(), &ops)
        }
    }

    pub(crate) fn push_pending(&self, scope: &CartScope, op: CartOp) -> Result<usize, CacheError> {
        let mut ops = self.pending(scope)?;
        ops.push(op);
        self.save_pending(scope, &ops)?;
        Ok(ops.len())
    }
}

/// What is needed to build a cart line for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub image_ref: Option<String>,
}

impl ProductSummary {
    pub fn new(product_id: ProductId, name: impl Into<String>, unit_price: Money) -> Self {
        Self {
            product_id,
            name: name.into(),
            unit_price,
            image_ref: None,
        }
    }

    pub fn to_line(&self, quantity: i64) -> Result<CartLine, turbo_commerce::CommerceError> {
        let mut line = CartLine::new(
            self.product_id.clone(),
            self.name.clone(),
            self.unit_price,
            quantity,
        )?;
        line.image_ref = self.image_ref.clone();
        Ok(line)
    }
}

impl From<&CartLine> for ProductSummary {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.clone(),
            name: line.display_name.clone(),
            unit_price: line.unit_price,
            image_ref: line.image_ref.clone(),
        }
    }
}

/// Per-product details, so a cart line can be built without a catalog call.
#[derive(Debug, Clone)]
pub struct ProductCache {
    cache: Cache,
}

impl ProductCache {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }

    fn key(product_id: &ProductId) -> String {
        cache_key!("product", product_id)
    }

    pub fn remember(&self, summary: &ProductSummary) -> Result<(), CacheError> {
        self.cache.set(&Self::key(&summary.product_id), summary)
    }

    /// Remember every line of a cart.
    pub fn remember_cart(&self, state: &CartState) -> Result<(), CacheError> {
        for line in &state.lines {
            self.remember(&ProductSummary::from(line))?;
        }
        Ok(())
    }

    pub fn lookup(&self, product_id: &ProductId) -> Result<Option<ProductSummary>, CacheError> {
        match self.cache.get(&Self::key(product_id)) {
            Err(e) if e.is_corrupt() => {
                warn!(product_id = %product_id, error = %e, "Discarding corrupt product entry");
                Ok(None)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kurta() -> ProductSummary {
        ProductSummary::new(
            ProductId::new("p1"),
            "Kurta",
            Money::from_major(500, Currency::INR),
        )
    }

    #[test]
    fn test_scope_keys() {
        assert_eq!(CartScope::Guest.key(), "cart:guest");
        assert_eq!(CartScope::User(UserId::new("42")).key(), "cart:user:42");
        assert_eq!(
            CartScope::User(UserId::new("42")).pending_key(),
            "cart:pending:user:42"
        );
    }

    #[test]
    fn test_scopes_are_isolated() {
        let carts = CartCache::new(Cache::memory(), Currency::INR);
        let mut state = CartState::new(Currency::INR);
        state.add_line(kurta().to_line(2).unwrap()).unwrap();

        carts.save(&CartScope::Guest, &state).unwrap();
        assert_eq!(carts.load(&CartScope::Guest).unwrap(), state);
        assert!(carts.load(&CartScope::User(UserId::new("42"))).unwrap().is_empty());

        carts.clear(&CartScope::Guest).unwrap();
        assert!(carts.load(&CartScope::Guest).unwrap().is_empty());
    }

    #[test]
    fn test_pending_changes_queue_in_order() {
        let carts = CartCache::new(Cache::memory(), Currency::INR);
        let scope = CartScope::User(UserId::new("42"));
        assert!(carts.pending(&scope).unwrap().is_empty());

        carts.push_pending(&scope, CartOp::Add(ProductId::new("p1"), 1)).unwrap();
        let queued = carts
            .push_pending(&scope, CartOp::Remove(ProductId::new("p2")))
            .unwrap();
        assert_eq!(queued, 2);
        assert_eq!(
            carts.pending(&scope).unwrap(),
            vec![
                CartOp::Add(ProductId::new("p1"), 1),
                CartOp::Remove(ProductId::new("p2"))
            ]
        );
        assert!(carts.pending(&CartScope::User(UserId::new("7"))).unwrap().is_empty());

        carts.save_pending(&scope, &[]).unwrap();
        assert!(carts.pending(&scope).unwrap().is_empty());
    }

    #[test]
    fn test_queued_add_needs_known_product() {
        let products = ProductCache::new(Cache::memory());
        let mut state = CartState::new(Currency::INR);
        let add = CartOp::Add(ProductId::new("p1"), 2);

        assert!(matches!(
            add.apply(&mut state, &products),
            Err(crate::CheckoutError::UnknownProduct(_))
        ));
        products.remember(&kurta()).unwrap();
        add.apply(&mut state, &products).unwrap();
        add.apply(&mut state, &products).unwrap();
        assert_eq!(state.lines[0].quantity, 4);
    }

    #[test]
    fn test_corrupt_cart_loads_empty() {
        let cache = Cache::memory();
        cache.set("cart:guest", &"not a cart").unwrap();
        let carts = CartCache::new(cache, Currency::INR);
        assert!(carts.load(&CartScope::Guest).unwrap().is_empty());
    }

    #[test]
    fn test_product_cache() {
        let products = ProductCache::new(Cache::memory());
        assert_eq!(products.lookup(&ProductId::new("p1")).unwrap(), None);
        products.remember(&kurta()).unwrap();
        assert_eq!(products.lookup(&ProductId::new("p1")).unwrap(), Some(kurta()));
    }
}
