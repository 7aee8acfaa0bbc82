//! Cart lines and cart state.

use crate::error::CommerceError;
use crate::ids::ProductId;
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};

/// Maximum quantity allowed per line item.
pub const MAX_QUANTITY_PER_ITEM: i64 = 9999;

/// A single product line in the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    /// Product being purchased. Unique within a cart.
    pub product_id: ProductId,
    /// Unit price at the time the line was added.
    pub unit_price: Money,
    /// Quantity, always >= 1.
    pub quantity: i64,
    /// Product name (denormalized for display).
    pub display_name: String,
    /// Product image reference.
    pub image_ref: Option<String>,
}

impl CartLine {
    /// Create a new line, validating the quantity.
    pub fn new(
        product_id: ProductId,
        display_name: impl Into<String>,
        unit_price: Money,
        quantity: i64,
    ) -> Result<Self, CommerceError> {
        validate_quantity(quantity)?;
        Ok(Self {
            product_id,
            unit_price,
            quantity,
            display_name: display_name.into(),
            image_ref: None,
        })
    }

    /// Set the image reference.
    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    /// `unit_price × quantity`.
    pub fn line_total(&self) -> Result<Money, CommerceError> {
        self.unit_price
            .try_multiply(self.quantity)
            .ok_or(CommerceError::Overflow)
    }
}

/// The contents of a cart.
///
/// Lines keep insertion order, which is also display order. The total is
/// never stored; it is derived from the lines on demand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CartState {
    /// Cart currency.
    pub currency: Currency,
    /// Lines in insertion order.
    pub lines: Vec<CartLine>,
}

impl CartState {
    /// Create an empty cart.
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            lines: Vec::new(),
        }
    }

    /// Build a cart from lines, merging duplicates by product id.
    pub fn from_lines(
        currency: Currency,
        lines: impl IntoIterator<Item = CartLine>,
    ) -> Result<Self, CommerceError> {
        let mut cart = Self::new(currency);
        for line in lines {
            cart.add_line(line)?;
        }
        Ok(cart)
    }

    /// Add a line. If the product is already in the cart its quantity is
    /// incremented instead of creating a second line.
    pub fn add_line(&mut self, line: CartLine) -> Result<(), CommerceError> {
        validate_quantity(line.quantity)?;
        if line.unit_price.currency != self.currency {
            return Err(CommerceError::CurrencyMismatch {
                expected: self.currency.code().to_string(),
                got: line.unit_price.currency.code().to_string(),
            });
        }

        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id)
        {
            let new_quantity = existing
                .quantity
                .checked_add(line.quantity)
                .ok_or(CommerceError::Overflow)?;
            validate_quantity(new_quantity)?;
            existing.quantity = new_quantity;
            return Ok(());
        }

        self.lines.push(line);
        Ok(())
    }

    /// Increment the quantity of an existing line.
    ///
    /// Returns `false` if the product is not in the cart.
    pub fn increment(&mut self, product_id: &ProductId, quantity: i64) -> Result<bool, CommerceError> {
        validate_quantity(quantity)?;
        match self.lines.iter_mut().find(|l| &l.product_id == product_id) {
            Some(line) => {
                let new_quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or(CommerceError::Overflow)?;
                validate_quantity(new_quantity)?;
                line.quantity = new_quantity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Set the quantity of a line.
    ///
    /// A quantity below 1 removes the line. Returns `false` if the product
    /// is not in the cart.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: i64) -> Result<bool, CommerceError> {
        if quantity < 1 {
            return Ok(self.remove_line(product_id));
        }
        validate_quantity(quantity)?;

        match self.lines.iter_mut().find(|l| &l.product_id == product_id) {
            Some(line) => {
                line.quantity = quantity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a line.
    pub fn remove_line(&mut self, product_id: &ProductId) -> bool {
        let len_before = self.lines.len();
        self.lines.retain(|l| &l.product_id != product_id);
        self.lines.len() < len_before
    }

    /// Remove all lines.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Merge another cart into this one, incrementing quantities of shared
    /// products. Quantities are capped at MAX_QUANTITY_PER_ITEM.
    pub fn merge(&mut self, other: CartState) -> Result<(), CommerceError> {
        for line in other.lines {
            if let Some(existing) = self
                .lines
                .iter_mut()
                .find(|l| l.product_id == line.product_id)
            {
                existing.quantity = existing
                    .quantity
                    .saturating_add(line.quantity)
                    .min(MAX_QUANTITY_PER_ITEM);
            } else {
                self.add_line(line)?;
            }
        }
        Ok(())
    }

    /// `Σ(unit_price × quantity)` over the current lines.
    pub fn total_amount(&self) -> Result<Money, CommerceError> {
        let line_totals = self
            .lines
            .iter()
            .map(CartLine::line_total)
            .collect::<Result<Vec<_>, _>>()?;
        Money::try_sum(line_totals.iter(), self.currency).ok_or(CommerceError::Overflow)
    }

    /// Get a line by product ID.
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product_id == product_id)
    }

    /// Product IDs in display order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.iter().map(|l| l.product_id.clone()).collect()
    }

    /// Total item count (sum of quantities).
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Number of distinct products.
    pub fn unique_item_count(&self) -> usize {
        self.lines.len()
    }

    /// Check if cart is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

fn validate_quantity(quantity: i64) -> Result<(), CommerceError> {
    if quantity < 1 {
        return Err(CommerceError::InvalidQuantity(quantity));
    }
    if quantity > MAX_QUANTITY_PER_ITEM {
        return Err(CommerceError::QuantityExceedsLimit(
            quantity,
            MAX_QUANTITY_PER_ITEM,
        ));
    }
    Ok(())
}
