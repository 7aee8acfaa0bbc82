//! Order backend.

use super::cart::CartItemDto;
use super::send_json;
use crate::session::Identity;
use crate::BackendError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use turbo_commerce::checkout::{Address, Order, OrderRequest};
use turbo_commerce::payment::{PaymentMethodTag, PaymentProvider, PaymentStatus};
use turbo_commerce::{Currency, OrderId};
use turbo_data::FetchClient;

/// Records orders.
#[async_trait]
pub trait OrderBackend: Send + Sync {
    async fn create(
        &self,
        identity: Option<&Identity>,
        request: &OrderRequest,
    ) -> Result<Order, BackendError>;
}

/// `paymentResult` as sent to the order backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResultDto {
    pub transaction_id: String,
    pub provider: PaymentProvider,
    pub payment_method: PaymentMethodTag,
    pub amount: f64,
    pub currency: Currency,
    pub status: PaymentStatus,
}

/// `POST /orders` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub order_items: Vec<CartItemDto>,
    pub shipping_address: Address,
    pub payment_method: PaymentMethodTag,
    pub payment_result: PaymentResultDto,
    pub total_price: f64,
    pub original_price: f64,
    pub discount_amount: f64,
    pub coupon_code: Option<String>,
}

impl From<&OrderRequest> for OrderPayload {
    fn from(request: &OrderRequest) -> Self {
        let payment = &request.payment_result;
        Self {
            order_items: request
                .items
                .iter()
                .map(|item| CartItemDto {
                    product_id: item.product_id.to_string(),
                    name: item.name.clone(),
                    price: item.unit_price.to_decimal(),
                    quantity: item.quantity,
                    image: item.image_ref.clone(),
                })
                .collect(),
            shipping_address: request.shipping_address.clone(),
            payment_method: request.payment_method,
            payment_result: PaymentResultDto {
                transaction_id: payment.transaction_id.to_string(),
                provider: payment.provider,
                payment_method: payment.payment_method,
                amount: payment.amount.to_decimal(),
                currency: payment.amount.currency,
                status: payment.status,
            },
            total_price: request.total_price.to_decimal(),
            original_price: request.original_price.to_decimal(),
            discount_amount: request.discount_amount.to_decimal(),
            coupon_code: request.coupon_code.clone(),
        }
    }
}

/// The created order record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OrderEnvelope {
    Wrapped { order: OrderResponse },
    Bare(OrderResponse),
}

/// [`OrderBackend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpOrderBackend {
    client: FetchClient,
}

impl HttpOrderBackend {
    pub fn new(client: FetchClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrderBackend for HttpOrderBackend {
    async fn create(
        &self,
        identity: Option<&Identity>,
        request: &OrderRequest,
    ) -> Result<Order, BackendError> {
        let http = self
            .client
            .post("/orders")
            .maybe_bearer_auth(identity.map(|i| i.token.as_str()))
            .json(&OrderPayload::from(request))?;

        let created = match send_json::<OrderEnvelope>(http).await? {
            OrderEnvelope::Wrapped { order } | OrderEnvelope::Bare(order) => order,
        };
        debug!(order_id = %created.id, "Order recorded by backend");

        Ok(Order {
            id: OrderId::new(created.id),
            user_id: identity.map(|i| i.user_id.clone()),
            status: created.status.unwrap_or_else(|| "pending".to_string()),
            request: request.clone(),
            created_at: created.created_at.unwrap_or_else(Utc::now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use turbo_commerce::cart::{CartLine, CartState};
    use turbo_commerce::payment::PaymentResult;
    use turbo_commerce::{Money, ProductId, TransactionId, UserId};
    use turbo_data::TimeoutConfig;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> OrderRequest {
        let mut cart = CartState::new(Currency::INR);
        cart.add_line(
            CartLine::new(ProductId::new("p1"), "Kurta", Money::from_major(1000, Currency::INR), 1)
                .unwrap(),
        )
        .unwrap();
        OrderRequest::assemble(
            &cart,
            Address::new("Asha Rao", "12 MG Road", "Bengaluru", "560001", "India"),
            PaymentResult {
                transaction_id: TransactionId::new("txn_1"),
                provider: PaymentProvider::PhonePe,
                payment_method: PaymentMethodTag::Upi,
                amount: Money::from_major(1000, Currency::INR),
                status: PaymentStatus::Succeeded,
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_payload_wire_shape() {
        let value = serde_json::to_value(OrderPayload::from(&request())).unwrap();
        assert_eq!(value["orderItems"][0]["productId"], "p1");
        assert_eq!(value["shippingAddress"]["address"], "12 MG Road");
        assert_eq!(value["paymentMethod"], "upi");
        assert_eq!(value["paymentResult"]["transactionId"], "txn_1");
        assert_eq!(value["paymentResult"]["provider"], "phonepe");
        assert_eq!(value["totalPrice"], 1000.0);
        assert_eq!(value["originalPrice"], 1000.0);
        assert_eq!(value["discountAmount"], 0.0);
        assert!(value["couponCode"].is_null());
    }

    #[tokio::test]
    async fn test_create_parses_wrapped_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "order": {"_id": "ord_77", "status": "processing"}
            })))
            .mount(&server)
            .await;

        let backend = HttpOrderBackend::new(
            FetchClient::http(TimeoutConfig::from_millis(2000))
                .unwrap()
                .with_base_url(server.uri()),
        );
        let identity = Identity::new(UserId::new("user_1"), "tok", Utc::now() + Duration::hours(1));
        let order = backend.create(Some(&identity), &request()).await.unwrap();
        assert_eq!(order.id, OrderId::new("ord_77"));
        assert_eq!(order.status, "processing");
        assert_eq!(order.user_id, Some(UserId::new("user_1")));
    }
}
