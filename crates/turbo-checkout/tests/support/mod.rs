//! In-memory backends for driving the storefront in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use turbo_checkout::api::{
    ApplyCouponRequest, CartBackend, CouponBackend, CouponDto, OrderBackend, RemoteCart,
    ValidateCouponRequest, ValidateCouponResponse,
};
use turbo_checkout::events::CartEvent;
use turbo_checkout::payment::{
    CashOnDeliveryAdapter, PaymentAdapter, PaymentHandle, PaymentIntent, PaymentOutcome,
};
use turbo_checkout::session::Identity;
use turbo_checkout::{BackendError, CheckoutError, Storefront};
use turbo_cache::Cache;
use turbo_commerce::cart::{CartLine, CartState};
use turbo_commerce::checkout::{Address, Order, OrderRequest};
use turbo_commerce::payment::{PaymentProvider, PaymentResult, PaymentStatus};
use turbo_commerce::{Currency, Money, OrderId, ProductId, TransactionId, UserId};
use tokio::sync::broadcast;

pub fn inr(rupees: i64) -> Money {
    Money::from_major(rupees, Currency::INR)
}

pub fn shopper() -> Identity {
    Identity::new(UserId::new("user_1"), "tok_1", Utc::now() + Duration::hours(1))
}

pub fn address() -> Address {
    Address::new("Asha Rao", "12 MG Road", "Bengaluru", "560001", "India")
}

fn unavailable() -> BackendError {
    BackendError::Unavailable("connection refused".to_string())
}

/// Server-side carts keyed by user, priced from a fixed catalog.
#[derive(Default)]
pub struct FakeCartBackend {
    catalog: HashMap<ProductId, (String, Money)>,
    carts: Mutex<HashMap<UserId, Vec<(ProductId, i64)>>>,
    pub offline: AtomicBool,
    out_of_stock: Mutex<HashSet<ProductId>>,
    /// Products whose adds fail as if the backend were overloaded.
    flaky: Mutex<HashSet<ProductId>>,
    pub calls: AtomicUsize,
}

impl FakeCartBackend {
    pub fn with_catalog(products: &[(&str, &str, i64)]) -> Self {
        Self {
            catalog: products
                .iter()
                .map(|(id, name, rupees)| (ProductId::new(*id), (name.to_string(), inr(*rupees))))
                .collect(),
            ..Default::default()
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn mark_out_of_stock(&self, product_id: &str) {
        self.out_of_stock
            .lock()
            .unwrap()
            .insert(ProductId::new(product_id));
    }

    /// Make adds of one product fail with a 503 while everything else works.
    pub fn fail_adds_for(&self, product_id: &str) {
        self.flaky.lock().unwrap().insert(ProductId::new(product_id));
    }

    pub fn heal_adds(&self) {
        self.flaky.lock().unwrap().clear();
    }

    pub fn quantity(&self, user: &str, product_id: &str) -> Option<i64> {
        self.carts
            .lock()
            .unwrap()
            .get(&UserId::new(user))
            .and_then(|lines| {
                lines
                    .iter()
                    .find(|(id, _)| id.as_str() == product_id)
                    .map(|(_, qty)| *qty)
            })
    }

    pub fn seed(&self, user: &str, product_id: &str, quantity: i64) {
        self.carts
            .lock()
            .unwrap()
            .entry(UserId::new(user))
            .or_default()
            .push((ProductId::new(product_id), quantity));
    }

    fn render(&self, user: &UserId) -> RemoteCart {
        let carts = self.carts.lock().unwrap();
        let lines = carts.get(user).cloned().unwrap_or_default();
        let lines = lines.into_iter().map(|(id, qty)| {
            let (name, price) = self.catalog[&id].clone();
            CartLine::new(id, name, price, qty).unwrap()
        });
        let state = CartState::from_lines(Currency::INR, lines).unwrap();
        RemoteCart {
            reported_total: Some(state.total_amount().unwrap()),
            state,
        }
    }

    fn guard(&self) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

#[async_trait]
impl CartBackend for FakeCartBackend {
    async fn fetch(&self, identity: &Identity) -> Result<RemoteCart, BackendError> {
        self.guard()?;
        Ok(self.render(&identity.user_id))
    }

    async fn add(
        &self,
        identity: &Identity,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<RemoteCart, BackendError> {
        self.guard()?;
        if self.flaky.lock().unwrap().contains(product_id) {
            return Err(BackendError::Unavailable("HTTP 503: Service Unavailable".to_string()));
        }
        if self.out_of_stock.lock().unwrap().contains(product_id) {
            return Err(BackendError::Rejected {
                status: 400,
                message: "Out of stock".to_string(),
            });
        }
        if !self.catalog.contains_key(product_id) {
            return Err(BackendError::Rejected {
                status: 404,
                message: "Product not found".to_string(),
            });
        }
        {
            let mut carts = self.carts.lock().unwrap();
            let lines = carts.entry(identity.user_id.clone()).or_default();
            match lines.iter_mut().find(|(id, _)| id == product_id) {
                Some((_, qty)) => *qty += quantity,
                None => lines.push((product_id.clone(), quantity)),
            }
        }
        Ok(self.render(&identity.user_id))
    }

    async fn update(
        &self,
        identity: &Identity,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<RemoteCart, BackendError> {
        self.guard()?;
        {
            let mut carts = self.carts.lock().unwrap();
            let lines = carts.entry(identity.user_id.clone()).or_default();
            match lines.iter_mut().find(|(id, _)| id == product_id) {
                Some((_, qty)) => *qty = quantity,
                None => {
                    return Err(BackendError::Rejected {
                        status: 404,
                        message: "Item not in cart".to_string(),
                    })
                }
            }
        }
        Ok(self.render(&identity.user_id))
    }

    async fn remove(
        &self,
        identity: &Identity,
        product_id: &ProductId,
    ) -> Result<RemoteCart, BackendError> {
        self.guard()?;
        self.carts
            .lock()
            .unwrap()
            .entry(identity.user_id.clone())
            .or_default()
            .retain(|(id, _)| id != product_id);
        Ok(self.render(&identity.user_id))
    }

    async fn clear(&self, identity: &Identity) -> Result<RemoteCart, BackendError> {
        self.guard()?;
        self.carts.lock().unwrap().remove(&identity.user_id);
        Ok(self.render(&identity.user_id))
    }
}

/// Coupons known to the backend, with a record of redemptions.
#[derive(Default)]
pub struct FakeCouponBackend {
    coupons: HashMap<String, CouponDto>,
    pub applied: Mutex<Vec<ApplyCouponRequest>>,
    pub validations: Mutex<Vec<ValidateCouponRequest>>,
    pub fail_apply: AtomicBool,
}

impl FakeCouponBackend {
    pub fn with_coupons(coupons: Vec<serde_json::Value>) -> Self {
        Self {
            coupons: coupons
                .into_iter()
                .map(|raw| {
                    let dto: CouponDto = serde_json::from_value(raw).unwrap();
                    (dto.code.to_uppercase(), dto)
                })
                .collect(),
            ..Default::default()
        }
    }
}

pub fn flat100() -> serde_json::Value {
    json!({
        "code": "FLAT100",
        "discountType": "fixed",
        "discountValue": 100,
        "minOrderValue": 500,
        "validFrom": "2024-01-01T00:00:00Z",
        "validUntil": "2099-01-01T00:00:00Z",
        "paymentMethods": ["upi"]
    })
}

#[async_trait]
impl CouponBackend for FakeCouponBackend {
    async fn list_public(&self) -> Result<Vec<CouponDto>, BackendError> {
        Ok(self.coupons.values().cloned().collect())
    }

    async fn list_available(&self, _identity: &Identity) -> Result<Vec<CouponDto>, BackendError> {
        Ok(self.coupons.values().cloned().collect())
    }

    async fn validate(
        &self,
        _identity: &Identity,
        request: &ValidateCouponRequest,
    ) -> Result<ValidateCouponResponse, BackendError> {
        self.validations.lock().unwrap().push(request.clone());
        Ok(match self.coupons.get(&request.code) {
            Some(dto) => ValidateCouponResponse {
                valid: true,
                coupon: Some(dto.clone()),
                discount_amount: None,
                message: None,
            },
            None => ValidateCouponResponse::rejected("Invalid coupon code"),
        })
    }

    async fn apply(
        &self,
        _identity: &Identity,
        request: &ApplyCouponRequest,
    ) -> Result<(), BackendError> {
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.applied.lock().unwrap().push(request.clone());
        Ok(())
    }
}

/// Records submitted orders; can be told to fail.
#[derive(Default)]
pub struct FakeOrderBackend {
    pub submitted: Mutex<Vec<OrderRequest>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl OrderBackend for FakeOrderBackend {
    async fn create(
        &self,
        identity: Option<&Identity>,
        request: &OrderRequest,
    ) -> Result<Order, BackendError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("HTTP 500: internal error".to_string()));
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(request.clone());
        Ok(Order {
            id: OrderId::new(format!("ord_{}", submitted.len())),
            user_id: identity.map(|i| i.user_id.clone()),
            status: "processing".to_string(),
            request: request.clone(),
            created_at: Utc::now(),
        })
    }
}

/// A gateway that plays back a list of outcomes, succeeding once the list
/// is exhausted.
pub struct ScriptedGateway {
    provider: PaymentProvider,
    script: Mutex<VecDeque<PaymentOutcome>>,
    pub attempts: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(provider: PaymentProvider) -> Arc<Self> {
        Arc::new(Self {
            provider,
            script: Mutex::new(VecDeque::new()),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn then(self: &Arc<Self>, outcome: PaymentOutcome) -> Arc<Self> {
        self.script.lock().unwrap().push_back(outcome);
        self.clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentAdapter for ScriptedGateway {
    fn provider(&self) -> PaymentProvider {
        self.provider
    }

    fn is_available(&self, amount: Money) -> bool {
        amount.is_positive()
    }

    async fn initiate(&self, intent: &PaymentIntent) -> Result<PaymentHandle, CheckoutError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentHandle {
            provider: self.provider,
            reference: format!("ref_{}", attempt),
            amount: intent.amount,
            redirect_url: None,
        })
    }

    async fn confirm(&self, handle: &PaymentHandle) -> Result<PaymentOutcome, CheckoutError> {
        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            return Ok(outcome);
        }
        Ok(PaymentOutcome::Succeeded(PaymentResult {
            transaction_id: TransactionId::new(format!("txn_{}", handle.reference)),
            provider: self.provider,
            payment_method: self.provider.tag(),
            amount: handle.amount,
            status: PaymentStatus::Succeeded,
        }))
    }

    async fn cancel(&self, _handle: &PaymentHandle) -> Result<(), CheckoutError> {
        Ok(())
    }
}

/// Everything a test needs to poke at.
pub struct Harness {
    pub storefront: Storefront,
    pub cart: Arc<FakeCartBackend>,
    pub coupons: Arc<FakeCouponBackend>,
    pub orders: Arc<FakeOrderBackend>,
    pub upi: Arc<ScriptedGateway>,
    pub cache: Cache,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_gateway(ScriptedGateway::new(PaymentProvider::PhonePe))
    }

    pub fn with_gateway(upi: Arc<ScriptedGateway>) -> Self {
        let cart = Arc::new(FakeCartBackend::with_catalog(&[
            ("p1", "Cotton Kurta", 1000),
            ("p2", "Silk Dupatta", 250),
            ("p3", "Leather Juttis", 750),
        ]));
        let coupons = Arc::new(FakeCouponBackend::with_coupons(vec![flat100()]));
        let orders = Arc::new(FakeOrderBackend::default());
        let cache = Cache::memory();

        let storefront = Storefront::builder()
            .currency(Currency::INR)
            .cache(cache.clone())
            .cart_backend(cart.clone())
            .coupon_backend(coupons.clone())
            .order_backend(orders.clone())
            .payment_adapter(upi.clone())
            .payment_adapter(Arc::new(CashOnDeliveryAdapter::new(inr(50000))))
            .build()
            .unwrap();

        Self {
            storefront,
            cart,
            coupons,
            orders,
            upi,
            cache,
        }
    }

    /// Make a product's details known locally, as a product page would.
    pub fn remember(&self, product_id: &str) {
        let (name, price) = match product_id {
            "p1" => ("Cotton Kurta", 1000),
            "p2" => ("Silk Dupatta", 250),
            "p3" => ("Leather Juttis", 750),
            other => panic!("unknown test product {}", other),
        };
        turbo_checkout::cart::ProductCache::new(self.cache.clone())
            .remember(&turbo_checkout::cart::ProductSummary::new(
                ProductId::new(product_id),
                name,
                inr(price),
            ))
            .unwrap();
    }
}

/// Drain every event received so far.
pub fn drain(rx: &mut broadcast::Receiver<CartEvent>) -> Vec<CartEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
