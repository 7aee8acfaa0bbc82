//! Remote cart backend.

use super::{send, send_json};
use crate::session::Identity;
use crate::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use turbo_commerce::cart::{CartLine, CartState};
use turbo_commerce::{Currency, Money, ProductId};
use turbo_data::FetchClient;

/// A cart as returned by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCart {
    pub state: CartState,
    /// The backend's own total. Informational only; the displayed total is
    /// always recomputed from the lines.
    pub reported_total: Option<Money>,
}

/// Server-persisted cart for an authenticated shopper.
#[async_trait]
pub trait CartBackend: Send + Sync {
    async fn fetch(&self, identity: &Identity) -> Result<RemoteCart, BackendError>;

    async fn add(
        &self,
        identity: &Identity,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<RemoteCart, BackendError>;

    async fn update(
        &self,
        identity: &Identity,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<RemoteCart, BackendError>;

    async fn remove(
        &self,
        identity: &Identity,
        product_id: &ProductId,
    ) -> Result<RemoteCart, BackendError>;

    async fn clear(&self, identity: &Identity) -> Result<RemoteCart, BackendError>;
}

/// `{productId, name, price, quantity, image?}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartItemDto {
    pub product_id: String,
    #[serde(default)]
    pub name: String,
    pub price: f64,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// `{items, totalAmount}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    #[serde(default)]
    pub items: Vec<CartItemDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
}

impl CartResponse {
    /// Convert to domain types. Lines the domain rejects make the whole
    /// response malformed.
    pub fn into_remote(self, currency: Currency) -> Result<RemoteCart, BackendError> {
        let mut lines = Vec::with_capacity(self.items.len());
        for item in self.items {
            let mut line = CartLine::new(
                ProductId::new(item.product_id),
                item.name,
                Money::from_decimal(item.price, currency),
                item.quantity,
            )
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
            line.image_ref = item.image;
            lines.push(line);
        }
        let state = CartState::from_lines(currency, lines)
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        Ok(RemoteCart {
            state,
            reported_total: self.total_amount.map(|t| Money::from_decimal(t, currency)),
        })
    }

    /// Build a response body from domain state.
    pub fn from_state(state: &CartState) -> Self {
        Self {
            items: state
                .lines
                .iter()
                .map(|line| CartItemDto {
                    product_id: line.product_id.to_string(),
                    name: line.display_name.clone(),
                    price: line.unit_price.to_decimal(),
                    quantity: line.quantity,
                    image: line.image_ref.clone(),
                })
                .collect(),
            total_amount: state.total_amount().ok().map(|m| m.to_decimal()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LineRequest<'a> {
    product_id: &'a str,
    quantity: i64,
}

/// [`CartBackend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCartBackend {
    client: FetchClient,
    currency: Currency,
}

impl HttpCartBackend {
    pub fn new(client: FetchClient, currency: Currency) -> Self {
        Self { client, currency }
    }

    async fn decode(
        &self,
        request: turbo_data::ClientRequestBuilder,
    ) -> Result<RemoteCart, BackendError> {
        let body: CartResponse = send_json(request).await?;
        debug!(items = body.items.len(), total = ?body.total_amount, "Remote cart received");
        body.into_remote(self.currency)
    }
}

#[async_trait]
impl CartBackend for HttpCartBackend {
    async fn fetch(&self, identity: &Identity) -> Result<RemoteCart, BackendError> {
        self.decode(self.client.get("/cart").bearer_auth(&identity.token))
            .await
    }

    async fn add(
        &self,
        identity: &Identity,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<RemoteCart, BackendError> {
        let request = self
            .client
            .post("/cart/add")
            .bearer_auth(&identity.token)
            .json(&LineRequest {
                product_id: product_id.as_str(),
                quantity,
            })?;
        self.decode(request).await
    }

    async fn update(
        &self,
        identity: &Identity,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<RemoteCart, BackendError> {
        let request = self
            .client
            .put("/cart/update")
            .bearer_auth(&identity.token)
            .json(&LineRequest {
                product_id: product_id.as_str(),
                quantity,
            })?;
        self.decode(request).await
    }

    async fn remove(
        &self,
        identity: &Identity,
        product_id: &ProductId,
    ) -> Result<RemoteCart, BackendError> {
        let request = self
            .client
            .delete(format!("/cart/remove/{}", product_id))
            .bearer_auth(&identity.token);
        self.decode(request).await
    }

    async fn clear(&self, identity: &Identity) -> Result<RemoteCart, BackendError> {
        let request = self.client.delete("/cart/clear").bearer_auth(&identity.token);
        let response = send(request).await?;
        // Some backends answer 204 to a clear.
        if response.body.is_empty() {
            return Ok(RemoteCart {
                state: CartState::new(self.currency),
                reported_total: None,
            });
        }
        response
            .json::<CartResponse>()
            .map_err(|e| BackendError::Malformed(e.to_string()))?
            .into_remote(self.currency)
    }
}
