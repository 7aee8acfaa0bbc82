//! Coupon backend.

use super::{send, send_json};
use crate::session::Identity;
use crate::BackendError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use turbo_commerce::cart::{Coupon, DiscountType};
use turbo_commerce::payment::PaymentMethodTag;
use turbo_commerce::{Currency, Money, ProductId};
use turbo_data::FetchClient;

/// Coupon listing, validation and redemption.
///
/// Listing public offers needs no identity; everything that consumes a
/// coupon does.
#[async_trait]
pub trait CouponBackend: Send + Sync {
    async fn list_public(&self) -> Result<Vec<CouponDto>, BackendError>;

    async fn list_available(&self, identity: &Identity) -> Result<Vec<CouponDto>, BackendError>;

    /// A 4xx validation refusal is returned as `valid: false`, not an error.
    async fn validate(
        &self,
        identity: &Identity,
        request: &ValidateCouponRequest,
    ) -> Result<ValidateCouponResponse, BackendError>;

    async fn apply(
        &self,
        identity: &Identity,
        request: &ApplyCouponRequest,
    ) -> Result<(), BackendError>;
}

/// Coupon as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CouponDto {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_discount: Option<f64>,
    #[serde(default)]
    pub min_order_value: f64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_limit: Option<i64>,
    #[serde(default)]
    pub usage_count: i64,
    #[serde(default)]
    pub payment_methods: Vec<String>,
    #[serde(default)]
    pub applicable_products: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl CouponDto {
    /// Convert to the domain coupon.
    ///
    /// An unknown payment method is an error rather than being skipped, since
    /// dropping it could widen the restriction to every method.
    pub fn into_coupon(self, currency: Currency) -> Result<Coupon, BackendError> {
        let payment_methods = self
            .payment_methods
            .iter()
            .map(|m| {
                m.parse::<PaymentMethodTag>().map_err(|_| {
                    BackendError::Malformed(format!(
                        "coupon {} has unknown payment method {:?}",
                        self.code, m
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let min_order_value = Money::from_decimal(self.min_order_value, currency);
        let mut coupon = match self.discount_type {
            DiscountType::Percentage => Coupon::percentage(
                &self.code,
                self.discount_value,
                min_order_value,
                self.valid_from,
                self.valid_until,
            ),
            DiscountType::Fixed => Coupon::fixed(
                &self.code,
                Money::from_decimal(self.discount_value, currency),
                min_order_value,
                self.valid_from,
                self.valid_until,
            ),
        }
        .with_payment_methods(payment_methods)
        .with_products(self.applicable_products.into_iter().map(ProductId::new));

        if let Some(max) = self.max_discount {
            coupon = coupon.with_max_discount(Money::from_decimal(max, currency));
        }
        if let Some(limit) = self.usage_limit {
            coupon = coupon.with_usage_limit(limit);
        }
        coupon.description = self.description;
        coupon.usage_count = self.usage_count;
        coupon.is_active = self.is_active;
        Ok(coupon)
    }

    /// Convert a listing, dropping entries that cannot be understood.
    pub fn into_coupons(list: Vec<CouponDto>, currency: Currency) -> Vec<Coupon> {
        list.into_iter()
            .filter_map(|dto| {
                let code = dto.code.clone();
                match dto.into_coupon(currency) {
                    Ok(coupon) => Some(coupon),
                    Err(e) => {
                        warn!(code = %code, error = %e, "Skipping unreadable coupon");
                        None
                    }
                }
            })
            .collect()
    }
}

/// `POST /coupons/validate` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    pub code: String,
    pub order_value: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<String>,
    /// Normalized payment method tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethodTag>,
}

/// `POST /coupons/validate` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon: Option<CouponDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidateCouponResponse {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// `POST /coupons/apply` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplyCouponRequest {
    pub code: String,
    pub order_value: f64,
    pub discount_applied: f64,
}

/// Listing endpoints answer either a bare array or `{coupons: [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CouponList {
    Bare(Vec<CouponDto>),
    Wrapped { coupons: Vec<CouponDto> },
}

impl CouponList {
    fn into_vec(self) -> Vec<CouponDto> {
        match self {
            CouponList::Bare(list) | CouponList::Wrapped { coupons: list } => list,
        }
    }
}

/// [`CouponBackend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCouponBackend {
    client: FetchClient,
}

impl HttpCouponBackend {
    pub fn new(client: FetchClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CouponBackend for HttpCouponBackend {
    async fn list_public(&self) -> Result<Vec<CouponDto>, BackendError> {
        let list: CouponList = send_json(self.client.get("/coupons")).await?;
        Ok(list.into_vec())
    }

    async fn list_available(&self, identity: &Identity) -> Result<Vec<CouponDto>, BackendError> {
        let request = self
            .client
            .get("/coupons/user/available")
            .bearer_auth(&identity.token);
        let list: CouponList = send_json(request).await?;
        Ok(list.into_vec())
    }

    async fn validate(
        &self,
        identity: &Identity,
        request: &ValidateCouponRequest,
    ) -> Result<ValidateCouponResponse, BackendError> {
        let request = self
            .client
            .post("/coupons/validate")
            .bearer_auth(&identity.token)
            .json(request)?;
        match send_json::<ValidateCouponResponse>(request).await {
            Err(BackendError::Rejected { message, .. }) => {
                Ok(ValidateCouponResponse::rejected(message))
            }
            other => other,
        }
    }

    async fn apply(
        &self,
        identity: &Identity,
        request: &ApplyCouponRequest,
    ) -> Result<(), BackendError> {
        let request = self
            .client
            .post("/coupons/apply")
            .bearer_auth(&identity.token)
            .json(request)?;
        send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use turbo_commerce::UserId;
    use turbo_data::TimeoutConfig;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn identity() -> Identity {
        Identity::new(UserId::new("user_1"), "tok", Utc::now() + Duration::hours(1))
    }

    fn backend(server: &MockServer) -> HttpCouponBackend {
        HttpCouponBackend::new(
            FetchClient::http(TimeoutConfig::from_millis(2000))
                .unwrap()
                .with_base_url(server.uri()),
        )
    }

    fn welcome10() -> serde_json::Value {
        json!({
            "code": "welcome10",
            "discountType": "percentage",
            "discountValue": 10,
            "maxDiscount": 500,
            "minOrderValue": 1000,
            "validFrom": "2024-01-01T00:00:00Z",
            "validUntil": "2099-01-01T00:00:00Z",
            "paymentMethods": ["upi", "card"]
        })
    }

    #[test]
    fn test_dto_conversion() {
        let dto: CouponDto = serde_json::from_value(welcome10()).unwrap();
        let coupon = dto.into_coupon(Currency::INR).unwrap();
        assert_eq!(coupon.code, "WELCOME10");
        assert_eq!(coupon.max_discount, Some(Money::from_major(500, Currency::INR)));
        assert_eq!(coupon.min_order_value, Money::from_major(1000, Currency::INR));
        assert!(coupon.allows_method(Some(PaymentMethodTag::Upi)));
        assert!(!coupon.allows_method(Some(PaymentMethodTag::Cod)));
        assert!(coupon.is_active);
        assert_eq!(coupon.usage_limit, None);
    }

    #[test]
    fn test_unknown_method_is_malformed() {
        let mut raw = welcome10();
        raw["paymentMethods"] = json!(["crypto"]);
        let dto: CouponDto = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            dto.into_coupon(Currency::INR),
            Err(BackendError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_public_listing_is_unauthenticated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coupons"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([welcome10()])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/coupons/user/available"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"coupons": [welcome10(), welcome10()]})),
            )
            .mount(&server)
            .await;

        let backend = backend(&server);
        assert_eq!(backend.list_public().await.unwrap().len(), 1);
        assert_eq!(backend.list_available(&identity()).await.unwrap().len(), 2);

        let requests = server.received_requests().await.unwrap();
        let public = requests
            .iter()
            .find(|r| r.url.path() == "/coupons")
            .unwrap();
        assert!(!public.headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_validate_sends_tag_and_maps_refusal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/coupons/validate"))
            .and(body_json(json!({
                "code": "WELCOME10",
                "orderValue": 6000.0,
                "products": ["p1"],
                "paymentMethod": "upi"
            })))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "valid": false,
                "message": "Coupon usage limit reached"
            })))
            .mount(&server)
            .await;

        let response = backend(&server)
            .validate(
                &identity(),
                &ValidateCouponRequest {
                    code: "WELCOME10".to_string(),
                    order_value: 6000.0,
                    products: vec!["p1".to_string()],
                    payment_method: Some(PaymentMethodTag::Upi),
                },
            )
            .await
            .unwrap();
        assert!(!response.valid);
        assert_eq!(response.message.as_deref(), Some("Coupon usage limit reached"));
    }

    #[tokio::test]
    async fn test_apply_posts_discount() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/coupons/apply"))
            .and(body_json(json!({
                "code": "FLAT100",
                "orderValue": 1000.0,
                "discountApplied": 100.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        backend(&server)
            .apply(
                &identity(),
                &ApplyCouponRequest {
                    code: "FLAT100".to_string(),
                    order_value: 1000.0,
                    discount_applied: 100.0,
                },
            )
            .await
            .unwrap();
    }
}
