//! Application state.
//!
//! A [`Storefront`] owns every service for one shopper session. Build it from
//! configuration for HTTP backends, or through [`StorefrontBuilder`] with any
//! backend implementations.

use crate::api::{
    CartBackend, CouponBackend, HttpCartBackend, HttpCouponBackend, HttpOrderBackend, OrderBackend,
};
use crate::cart::{CartCache, CartService, ProductCache};
use crate::checkout::CheckoutSession;
use crate::config::StorefrontConfig;
use crate::coupon::CouponEngine;
use crate::events::CartEvents;
use crate::liveness::{BackendStatus, LivenessHandle, LivenessProbe};
use crate::order::OrderAssembler;
use crate::payment::{CashOnDeliveryAdapter, GatewayAdapter, PaymentAdapter, PaymentOrchestrator};
use crate::session::Session;
use crate::CheckoutError;
use std::sync::Arc;
use tracing::info;
use turbo_cache::Cache;
use turbo_commerce::payment::PaymentProvider;
use turbo_commerce::Currency;
use turbo_data::{FetchClient, TimeoutConfig};

/// Everything a storefront needs for one shopper.
pub struct Storefront {
    currency: Currency,
    session: Arc<Session>,
    cart: Arc<CartService>,
    coupons: CouponEngine,
    payments: PaymentOrchestrator,
    orders: OrderAssembler,
    events: CartEvents,
    status: BackendStatus,
    probe: Option<LivenessProbe>,
}

impl Storefront {
    pub fn builder() -> StorefrontBuilder {
        StorefrontBuilder::default()
    }

    /// Wire HTTP backends, the file cache and the configured payment
    /// providers.
    pub fn from_config(config: &StorefrontConfig) -> Result<Self, CheckoutError> {
        config.validate()?;
        let currency = config.payments.currency;
        let client = FetchClient::http(TimeoutConfig::from_millis(config.api.timeout_ms))?
            .with_base_url(config.api.base_url.clone());
        let cache = Cache::file(&config.storage.dir)?;
        let session = Arc::new(Session::load(cache.clone()));
        let status = BackendStatus::new();

        let mut builder = Storefront::builder()
            .currency(currency)
            .cache(cache)
            .session(session.clone())
            .status(status.clone())
            .cart_backend(Arc::new(HttpCartBackend::new(client.clone(), currency)))
            .coupon_backend(Arc::new(HttpCouponBackend::new(client.clone())))
            .order_backend(Arc::new(HttpOrderBackend::new(client.clone())))
            .liveness(LivenessProbe::new(client.clone(), &config.liveness, status));

        for provider in config.payments.providers()? {
            let adapter: Arc<dyn PaymentAdapter> = match provider {
                PaymentProvider::CashOnDelivery => {
                    Arc::new(CashOnDeliveryAdapter::new(config.payments.cod_max()))
                }
                other => Arc::new(
                    GatewayAdapter::new(other, client.clone()).with_session(session.clone()),
                ),
            };
            builder = builder.payment_adapter(adapter);
        }

        let storefront = builder.build()?;
        info!(
            base_url = %config.api.base_url,
            storage = %config.storage.dir.display(),
            signed_in = storefront.session.is_authenticated(),
            "Storefront ready"
        );
        Ok(storefront)
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn cart(&self) -> &CartService {
        &self.cart
    }

    pub fn coupons(&self) -> &CouponEngine {
        &self.coupons
    }

    pub fn payments(&self) -> &PaymentOrchestrator {
        &self.payments
    }

    pub fn orders(&self) -> &OrderAssembler {
        &self.orders
    }

    pub fn events(&self) -> &CartEvents {
        &self.events
    }

    pub fn backend_status(&self) -> &BackendStatus {
        &self.status
    }

    /// Start polling backend liveness, if a probe was configured.
    pub fn start_liveness(&self) -> Option<LivenessHandle> {
        self.probe.clone().map(LivenessProbe::spawn)
    }

    /// Probe liveness once, if a probe was configured.
    pub async fn check_liveness(&self) -> Option<crate::liveness::Reachability> {
        match &self.probe {
            Some(probe) => Some(probe.check_once().await),
            None => None,
        }
    }

    /// Start checking out the current cart.
    pub async fn begin_checkout(&self) -> Result<CheckoutSession<'_>, CheckoutError> {
        let cart = self.cart.get().await?;
        CheckoutSession::new(self, cart)
    }
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("currency", &self.currency)
            .field("cart", &self.cart)
            .field("payments", &self.payments)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`Storefront`] from explicit parts.
#[derive(Default)]
pub struct StorefrontBuilder {
    currency: Currency,
    cache: Option<Cache>,
    session: Option<Arc<Session>>,
    status: Option<BackendStatus>,
    events: Option<CartEvents>,
    cart_backend: Option<Arc<dyn CartBackend>>,
    coupon_backend: Option<Arc<dyn CouponBackend>>,
    order_backend: Option<Arc<dyn OrderBackend>>,
    adapters: Vec<Arc<dyn PaymentAdapter>>,
    probe: Option<LivenessProbe>,
}

impl StorefrontBuilder {
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Local storage. Defaults to an in-memory cache.
    pub fn cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Session to use. Defaults to one restored from the cache.
    pub fn session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn status(mut self, status: BackendStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn events(mut self, events: CartEvents) -> Self {
        self.events = Some(events);
        self
    }

    pub fn cart_backend(mut self, backend: Arc<dyn CartBackend>) -> Self {
        self.cart_backend = Some(backend);
        self
    }

    pub fn coupon_backend(mut self, backend: Arc<dyn CouponBackend>) -> Self {
        self.coupon_backend = Some(backend);
        self
    }

    pub fn order_backend(mut self, backend: Arc<dyn OrderBackend>) -> Self {
        self.order_backend = Some(backend);
        self
    }

    pub fn payment_adapter(mut self, adapter: Arc<dyn PaymentAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn liveness(mut self, probe: LivenessProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn build(self) -> Result<Storefront, CheckoutError> {
        let missing = |what: &str| CheckoutError::Config(format!("{} backend not set", what));
        let cart_backend = self.cart_backend.ok_or_else(|| missing("cart"))?;
        let coupon_backend = self.coupon_backend.ok_or_else(|| missing("coupon"))?;
        let order_backend = self.order_backend.ok_or_else(|| missing("order"))?;

        let currency = self.currency;
        let cache = self.cache.unwrap_or_else(Cache::memory);
        let session = self
            .session
            .unwrap_or_else(|| Arc::new(Session::load(cache.clone())));
        let events = self.events.unwrap_or_default();

        let cart = Arc::new(CartService::new(
            cart_backend,
            CartCache::new(cache.clone(), currency),
            ProductCache::new(cache),
            session.clone(),
            events.clone(),
            currency,
        ));
        let coupons = CouponEngine::new(coupon_backend, currency);
        let orders = OrderAssembler::new(order_backend, coupons.clone(), cart.clone(), events.clone());

        let mut payments = PaymentOrchestrator::new();
        for adapter in self.adapters {
            payments.register(adapter);
        }

        Ok(Storefront {
            currency,
            session,
            cart,
            coupons,
            payments,
            orders,
            events,
            status: self.status.unwrap_or_default(),
            probe: self.probe,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turbo_commerce::Money;

    #[test]
    fn test_builder_requires_backends() {
        let err = Storefront::builder().build().unwrap_err();
        assert!(matches!(err, CheckoutError::Config(ref m) if m.contains("cart")));
    }

    #[test]
    fn test_from_config_registers_configured_providers() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StorefrontConfig::default();
        config.storage.dir = dir.path().to_path_buf();
        config.payments.providers = vec!["PhonePe".into(), "cod".into()];
        config.payments.cod_max_amount = 1000.0;

        let storefront = Storefront::from_config(&config).unwrap();
        let payments = storefront.payments();
        assert_eq!(
            payments.available_providers(Money::from_major(500, Currency::INR)),
            vec![PaymentProvider::PhonePe, PaymentProvider::CashOnDelivery]
        );
        assert_eq!(
            payments.available_providers(Money::from_major(5000, Currency::INR)),
            vec![PaymentProvider::PhonePe]
        );
        assert!(!storefront.session().is_authenticated());
    }
}
