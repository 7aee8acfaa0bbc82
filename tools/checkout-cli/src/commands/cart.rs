//! Show and edit the cart.

use anyhow::Result;
use turbo_checkout::cart::{ActiveStore, ProductSummary};
use turbo_commerce::cart::CartState;
use turbo_commerce::{Money, ProductId};

use super::{CartArgs, CartCommand};
use crate::context::Context;
use crate::output::money;

/// Run the cart command.
pub async fn run(args: CartArgs, ctx: &Context) -> Result<()> {
    let storefront = ctx.storefront()?;
    let cart = storefront.cart();

    let state = match args.command {
        CartCommand::Show => cart.get().await?,
        CartCommand::Add {
            product,
            qty,
            name,
            price,
        } => {
            let product_id = ProductId::new(product);
            match (name, price) {
                (Some(name), Some(price)) => {
                    let unit_price = Money::from_decimal(price, storefront.currency());
                    let summary = ProductSummary::new(product_id, name, unit_price);
                    cart.add_product(&summary, qty).await?
                }
                _ => cart.add(&product_id, qty).await?,
            }
        }
        CartCommand::Update { product, qty } => cart.update(&ProductId::new(product), qty).await?,
        CartCommand::Remove { product } => cart.remove(&ProductId::new(product)).await?,
        CartCommand::Clear => cart.clear().await?,
    };

    let store = match cart.active_store() {
        ActiveStore::Guest => "guest",
        ActiveStore::Remote => "account",
    };
    print_cart(&state, store, ctx)
}

/// Print a cart as a table, or as JSON.
pub fn print_cart(state: &CartState, store: &str, ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(state);
        return Ok(());
    }

    ctx.output.header(&format!("Cart ({})", store));
    if state.is_empty() {
        ctx.output.info("Your cart is empty");
        return Ok(());
    }

    let widths = [12, 28, 6, 12, 12];
    ctx.output
        .table_row(&["PRODUCT", "NAME", "QTY", "PRICE", "SUBTOTAL"], &widths);
    for line in &state.lines {
        let subtotal = line.line_total()?;
        ctx.output.table_row(
            &[
                line.product_id.as_str(),
                &line.display_name,
                &line.quantity.to_string(),
                &money(&line.unit_price),
                &money(&subtotal),
            ],
            &widths,
        );
    }

    ctx.output.info("");
    ctx.output.kv("Items", &state.item_count().to_string());
    ctx.output.kv("Total", &money(&state.total_amount()?));
    Ok(())
}
