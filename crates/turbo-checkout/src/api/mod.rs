//! Backend contracts and their HTTP implementations.
//!
//! Each backend is an async trait so the services above can be driven by
//! in-memory fakes in tests and by [`turbo_data::FetchClient`] in production.

mod cart;
mod coupon;
mod order;

pub use cart::{CartBackend, CartItemDto, CartResponse, HttpCartBackend, RemoteCart};
pub use coupon::{
    ApplyCouponRequest, CouponBackend, CouponDto, HttpCouponBackend, ValidateCouponRequest,
    ValidateCouponResponse,
};
pub use order::{HttpOrderBackend, OrderBackend, OrderPayload, OrderResponse, PaymentResultDto};

use crate::BackendError;
use serde::de::DeserializeOwned;
use turbo_data::{ClientRequestBuilder, Response};

/// Send a request and map transport and status failures.
pub(crate) async fn send(request: ClientRequestBuilder) -> Result<Response, BackendError> {
    let response = request.send().await?;
    Ok(response.error_for_status()?)
}

/// Send a request and decode a JSON body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: ClientRequestBuilder,
) -> Result<T, BackendError> {
    let response = send(request).await?;
    response
        .json()
        .map_err(|e| BackendError::Malformed(e.to_string()))
}
