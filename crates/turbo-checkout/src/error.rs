//! Checkout error types.

use thiserror::Error;
use turbo_cache::CacheError;
use turbo_commerce::cart::CouponRejection;
use turbo_commerce::payment::PaymentProvider;
use turbo_commerce::{CommerceError, ProductId, TransactionId};
use turbo_data::FetchError;

/// Failure talking to a storefront backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// No usable response: network failure, timeout or 5xx.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Missing, expired or rejected credentials (401/403).
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// The backend refused the request (4xx validation).
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The backend answered with a body we could not understand.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Whether cart operations may fall back to the local cache.
    ///
    /// Only explicit validation rejections are fatal; everything else means
    /// the backend could not be trusted to answer.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, BackendError::Rejected { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BackendError::Unauthorized(_))
    }
}

impl From<FetchError> for BackendError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::HttpError { status, message } => match status {
                401 | 403 => BackendError::Unauthorized(message),
                408 | 429 => BackendError::Unavailable(format!("HTTP {}: {}", status, message)),
                400..=499 => BackendError::Rejected { status, message },
                _ => BackendError::Unavailable(format!("HTTP {}: {}", status, message)),
            },
            FetchError::ParseError(msg) | FetchError::JsonError(msg) => {
                BackendError::Malformed(msg)
            }
            other => BackendError::Unavailable(other.to_string()),
        }
    }
}

/// Errors returned by checkout operations.
#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// No price or name is known for the product.
    #[error("Unknown product: {0}")]
    UnknownProduct(ProductId),

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Coupon rejected: {0}")]
    CouponRejected(CouponRejection),

    #[error("Payment provider unavailable: {0}")]
    PaymentProviderUnavailable(PaymentProvider),

    #[error("No payment provider selected")]
    NoPaymentSelected,

    /// A payment for the current selection has already been started.
    #[error("A payment is already in progress")]
    PaymentInProgress,

    /// Payment was captured but the order could not be recorded.
    #[error("Order creation failed after payment {transaction_id}: {message}")]
    OrderCreationFailed {
        transaction_id: TransactionId,
        message: String,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Commerce(#[from] CommerceError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<FetchError> for CheckoutError {
    fn from(e: FetchError) -> Self {
        CheckoutError::Backend(e.into())
    }
}

impl CheckoutError {
    /// Message suitable for showing to the shopper.
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::EmptyCart | CheckoutError::Commerce(CommerceError::EmptyCart) => {
                "Your cart is empty".to_string()
            }
            CheckoutError::InvalidQuantity(_)
            | CheckoutError::Commerce(CommerceError::InvalidQuantity(_)) => {
                "Quantity must be at least 1".to_string()
            }
            CheckoutError::Commerce(CommerceError::QuantityExceedsLimit(_, max)) => {
                format!("You can add at most {} of this item", max)
            }
            CheckoutError::UnknownProduct(_) => "This product is not available".to_string(),
            CheckoutError::AuthenticationRequired => "Please sign in to continue".to_string(),
            CheckoutError::CouponRejected(reason) => reason.to_string(),
            CheckoutError::PaymentProviderUnavailable(provider) => {
                format!("{} is not available for this order", provider.display_name())
            }
            CheckoutError::NoPaymentSelected => "Please choose a payment method".to_string(),
            CheckoutError::PaymentInProgress => {
                "Your payment is already being processed".to_string()
            }
            CheckoutError::OrderCreationFailed { transaction_id, .. } => format!(
                "Your payment was received (transaction {}) but we could not confirm your order. \
                 Please check your orders or contact support before paying again.",
                transaction_id
            ),
            CheckoutError::Backend(BackendError::Rejected { message, .. }) => message.clone(),
            CheckoutError::Backend(BackendError::Unauthorized(_)) => {
                "Your session has expired. Please sign in again".to_string()
            }
            CheckoutError::Backend(_) => {
                "We couldn't reach the store. Please try again in a moment".to_string()
            }
            CheckoutError::Commerce(_) | CheckoutError::Cache(_) | CheckoutError::Config(_) => {
                "Something went wrong. Please try again".to_string()
            }
        }
    }

    /// Funds were captured and the shopper must not be asked to pay again.
    pub fn payment_captured(&self) -> bool {
        matches!(self, CheckoutError::OrderCreationFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> FetchError {
        FetchError::HttpError {
            status,
            message: "nope".to_string(),
        }
    }

    #[test]
    fn test_fetch_error_classification() {
        assert!(matches!(BackendError::from(FetchError::Timeout), BackendError::Unavailable(_)));
        assert!(matches!(BackendError::from(http(503)), BackendError::Unavailable(_)));
        assert!(matches!(BackendError::from(http(401)), BackendError::Unauthorized(_)));
        assert!(matches!(
            BackendError::from(http(409)),
            BackendError::Rejected { status: 409, .. }
        ));
        assert!(matches!(
            BackendError::from(FetchError::ParseError("eof".into())),
            BackendError::Malformed(_)
        ));
    }

    #[test]
    fn test_only_rejections_are_fatal() {
        assert!(BackendError::Unavailable("down".into()).is_recoverable());
        assert!(BackendError::Unauthorized("expired".into()).is_recoverable());
        assert!(BackendError::Malformed("eof".into()).is_recoverable());
        assert!(!BackendError::Rejected {
            status: 400,
            message: "Out of stock".into()
        }
        .is_recoverable());
    }

    #[test]
    fn test_order_failure_message_mentions_support() {
        let err = CheckoutError::OrderCreationFailed {
            transaction_id: TransactionId::new("txn_42"),
            message: "HTTP 500".to_string(),
        };
        let message = err.user_message();
        assert!(message.contains("txn_42"));
        assert!(message.contains("contact support"));
        assert!(err.payment_captured());
    }

    #[test]
    fn test_payment_in_progress_is_not_a_capture() {
        let err = CheckoutError::PaymentInProgress;
        assert_eq!(err.user_message(), "Your payment is already being processed");
        assert!(!err.payment_captured());
    }

    #[test]
    fn test_rejection_message_is_surfaced() {
        let err = CheckoutError::Backend(BackendError::Rejected {
            status: 400,
            message: "Only 2 left in stock".to_string(),
        });
        assert_eq!(err.user_message(), "Only 2 left in stock");
    }
}
