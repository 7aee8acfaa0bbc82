//! Payment providers, eligibility tags and normalized payment results.
//!
//! Providers are the concrete ways a shopper can pay (a card processor, a
//! UPI app, a wallet). Coupon eligibility never looks at providers directly;
//! it looks at the small set of [`PaymentMethodTag`]s they normalize to.

use crate::error::CommerceError;
use crate::ids::TransactionId;
use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Normalized payment method used for coupon eligibility and order records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethodTag {
    Card,
    Upi,
    Wallet,
    Cod,
}

impl PaymentMethodTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodTag::Card => "card",
            PaymentMethodTag::Upi => "upi",
            PaymentMethodTag::Wallet => "wallet",
            PaymentMethodTag::Cod => "cod",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentMethodTag::Card => "Card",
            PaymentMethodTag::Upi => "UPI",
            PaymentMethodTag::Wallet => "Wallet",
            PaymentMethodTag::Cod => "Cash on Delivery",
        }
    }
}

impl fmt::Display for PaymentMethodTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethodTag {
    type Err = CommerceError;

    /// Accepts either a tag ("upi") or any provider identifier ("phonepe").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "card" => Ok(PaymentMethodTag::Card),
            "upi" => Ok(PaymentMethodTag::Upi),
            "wallet" => Ok(PaymentMethodTag::Wallet),
            "cod" => Ok(PaymentMethodTag::Cod),
            other => PaymentProvider::from_str(other).map(|p| p.tag()),
        }
    }
}

/// A concrete payment provider the storefront can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Stripe,
    Razorpay,
    GooglePay,
    PhonePe,
    Paytm,
    Bhim,
    UpiId,
    PayPal,
    CashOnDelivery,
}

impl PaymentProvider {
    /// Every provider, in the order they are offered to the shopper.
    pub const ALL: [PaymentProvider; 9] = [
        PaymentProvider::Stripe,
        PaymentProvider::Razorpay,
        PaymentProvider::GooglePay,
        PaymentProvider::PhonePe,
        PaymentProvider::Paytm,
        PaymentProvider::Bhim,
        PaymentProvider::UpiId,
        PaymentProvider::PayPal,
        PaymentProvider::CashOnDelivery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::Razorpay => "razorpay",
            PaymentProvider::GooglePay => "googlepay",
            PaymentProvider::PhonePe => "phonepe",
            PaymentProvider::Paytm => "paytm",
            PaymentProvider::Bhim => "bhim",
            PaymentProvider::UpiId => "upiid",
            PaymentProvider::PayPal => "paypal",
            PaymentProvider::CashOnDelivery => "cashondelivery",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "Credit / Debit Card (Stripe)",
            PaymentProvider::Razorpay => "Credit / Debit Card (Razorpay)",
            PaymentProvider::GooglePay => "Google Pay",
            PaymentProvider::PhonePe => "PhonePe",
            PaymentProvider::Paytm => "Paytm",
            PaymentProvider::Bhim => "BHIM UPI",
            PaymentProvider::UpiId => "Pay with UPI ID",
            PaymentProvider::PayPal => "PayPal",
            PaymentProvider::CashOnDelivery => "Cash on Delivery",
        }
    }

    /// Collapse the provider into its eligibility tag.
    pub fn tag(&self) -> PaymentMethodTag {
        match self {
            PaymentProvider::Stripe | PaymentProvider::Razorpay => PaymentMethodTag::Card,
            PaymentProvider::GooglePay
            | PaymentProvider::PhonePe
            | PaymentProvider::Paytm
            | PaymentProvider::Bhim
            | PaymentProvider::UpiId => PaymentMethodTag::Upi,
            PaymentProvider::PayPal => PaymentMethodTag::Wallet,
            PaymentProvider::CashOnDelivery => PaymentMethodTag::Cod,
        }
    }

    /// Whether completing this provider's flow captures funds immediately.
    pub fn captures_upfront(&self) -> bool {
        !matches!(self, PaymentProvider::CashOnDelivery)
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentProvider {
    type Err = CommerceError;

    /// Parse a raw provider identifier. Separators and case are ignored, so
    /// "Google Pay", "google_pay" and "googlepay" are the same provider.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "stripe" => Ok(PaymentProvider::Stripe),
            "razorpay" => Ok(PaymentProvider::Razorpay),
            "googlepay" | "gpay" => Ok(PaymentProvider::GooglePay),
            "phonepe" => Ok(PaymentProvider::PhonePe),
            "paytm" => Ok(PaymentProvider::Paytm),
            "bhim" | "bhimupi" => Ok(PaymentProvider::Bhim),
            "upiid" | "upi" => Ok(PaymentProvider::UpiId),
            "paypal" => Ok(PaymentProvider::PayPal),
            "cashondelivery" | "cod" => Ok(PaymentProvider::CashOnDelivery),
            _ => Err(CommerceError::UnknownPaymentProvider(s.to_string())),
        }
    }
}

/// A provider chosen for the current checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSelection {
    pub provider: PaymentProvider,
    pub method: PaymentMethodTag,
}

impl From<PaymentProvider> for PaymentSelection {
    fn from(provider: PaymentProvider) -> Self {
        Self {
            provider,
            method: provider.tag(),
        }
    }
}

/// Status of a completed payment flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Funds captured by the provider.
    Succeeded,
    /// Collection happens on delivery.
    PendingCollection,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::PendingCollection => "pending_collection",
        }
    }
}

/// Provider-independent outcome of a successful payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub transaction_id: TransactionId,
    pub provider: PaymentProvider,
    pub payment_method: PaymentMethodTag,
    pub amount: Money,
    pub status: PaymentStatus,
}
