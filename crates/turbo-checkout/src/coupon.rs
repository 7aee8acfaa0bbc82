//! Coupon listing, validation and redemption.

use crate::api::{ApplyCouponRequest, CouponBackend, CouponDto, ValidateCouponRequest};
use crate::session::Identity;
use crate::{BackendError, CheckoutError};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use turbo_commerce::cart::{normalize_code, Coupon, CouponApplication, CouponRejection};
use turbo_commerce::payment::PaymentProvider;
use turbo_commerce::{Currency, Money, ProductId};

/// Validates coupons against the backend and computes the discount locally.
///
/// The backend decides whether a code may be used; the amount always comes
/// from [`Coupon::evaluate`], so payment and order creation see one total.
#[derive(Clone)]
pub struct CouponEngine {
    backend: Arc<dyn CouponBackend>,
    currency: Currency,
}

impl CouponEngine {
    pub fn new(backend: Arc<dyn CouponBackend>, currency: Currency) -> Self {
        Self { backend, currency }
    }

    /// Trimmed, upper-case code.
    pub fn normalize_code(code: &str) -> String {
        normalize_code(code)
    }

    /// Public offers. No identity needed.
    pub async fn list_public(&self) -> Result<Vec<Coupon>, CheckoutError> {
        let list = self.backend.list_public().await?;
        Ok(CouponDto::into_coupons(list, self.currency))
    }

    /// Offers the shopper may still redeem.
    pub async fn list_available(&self, identity: &Identity) -> Result<Vec<Coupon>, CheckoutError> {
        let list = self.backend.list_available(identity).await?;
        Ok(CouponDto::into_coupons(list, self.currency))
    }

    /// Validate `code` for an order context.
    ///
    /// The provider is reduced to its method tag before anything is sent,
    /// so "phonepe" and "googlepay" both validate as UPI.
    pub async fn validate(
        &self,
        identity: Option<&Identity>,
        code: &str,
        order_value: Money,
        provider: Option<PaymentProvider>,
        product_ids: &[ProductId],
    ) -> Result<CouponApplication, CheckoutError> {
        let identity = identity.ok_or(CheckoutError::AuthenticationRequired)?;
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(CheckoutError::CouponRejected(CouponRejection::NotFound));
        }
        let method = provider.map(|p| p.tag());

        let request = ValidateCouponRequest {
            code: code.clone(),
            order_value: order_value.to_decimal(),
            products: product_ids.iter().map(|id| id.to_string()).collect(),
            payment_method: method,
        };
        let response = self.backend.validate(identity, &request).await?;

        if !response.valid {
            let message = response
                .message
                .unwrap_or_else(|| CouponRejection::NotFound.to_string());
            debug!(code = %code, message = %message, "Coupon refused by backend");
            return Err(CheckoutError::CouponRejected(CouponRejection::Unknown(
                message,
            )));
        }

        let coupon = response
            .coupon
            .ok_or_else(|| {
                BackendError::Malformed(format!("validation of {} returned no coupon", code))
            })?
            .into_coupon(self.currency)?;

        let application = coupon
            .evaluate(order_value, method, product_ids, Utc::now())
            .map_err(CheckoutError::CouponRejected)?;

        if let Some(reported) = response.discount_amount {
            let reported = Money::from_decimal(reported, self.currency);
            if reported != application.discount_amount {
                debug!(
                    code = %code,
                    reported = %reported,
                    computed = %application.discount_amount,
                    "Backend discount differs from local evaluation, using local"
                );
            }
        }

        info!(
            code = %code,
            discount = %application.discount_amount,
            "Coupon validated"
        );
        Ok(application)
    }

    /// Record that a validated coupon was used.
    pub async fn apply(
        &self,
        identity: &Identity,
        application: &CouponApplication,
    ) -> Result<(), CheckoutError> {
        let request = ApplyCouponRequest {
            code: application.code().to_string(),
            order_value: application.order_value.to_decimal(),
            discount_applied: application.discount_amount.to_decimal(),
        };
        self.backend.apply(identity, &request).await?;
        info!(code = %request.code, "Coupon usage recorded");
        Ok(())
    }
}

impl std::fmt::Debug for CouponEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CouponEngine")
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}
