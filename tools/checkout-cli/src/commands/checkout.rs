//! Pay for the cart and place an order.

use anyhow::{bail, Result};
use dialoguer::Confirm;
use turbo_checkout::checkout::CheckoutOutcome;
use turbo_commerce::checkout::Address;
use turbo_commerce::payment::PaymentProvider;

use super::CheckoutArgs;
use crate::context::Context;
use crate::output::{money, status_badge};

/// Run the checkout command.
pub async fn run(args: CheckoutArgs, ctx: &Context) -> Result<()> {
    let provider: PaymentProvider = match args.provider.parse() {
        Ok(provider) => provider,
        Err(_) => bail!("Unknown payment provider: {}", args.provider),
    };

    let mut address = Address::new(
        args.name,
        args.address,
        args.city,
        args.postal_code,
        args.country,
    );
    if let Some(phone) = args.phone {
        address = address.with_phone(phone);
    }
    let missing = address.missing_fields();
    if !missing.is_empty() {
        bail!("Shipping address is missing: {}", missing.join(", "));
    }

    let storefront = ctx.storefront()?;
    let mut checkout = storefront.begin_checkout().await?;
    checkout.set_shipping_address(address);
    checkout.select_payment(provider).await?;
    if let Some(code) = &args.coupon {
        checkout.apply_coupon(code).await?;
    }

    let totals = checkout.totals()?;
    ctx.output.header("Order Summary");
    for line in &checkout.cart().lines {
        ctx.output.list_item(&format!(
            "{} x{} {}",
            line.display_name,
            line.quantity,
            money(&line.line_total()?)
        ));
    }
    ctx.output.info("");
    ctx.output.kv("Subtotal", &money(&totals.original));
    if let Some(coupon) = checkout.coupon() {
        ctx.output.kv(
            &format!("Coupon {}", coupon.code()),
            &format!("-{}", money(&totals.discount)),
        );
    }
    ctx.output.kv("Total", &money(&totals.total));
    ctx.output.kv("Payment", provider.display_name());

    if !args.yes && !ctx.output.is_json() {
        ctx.output.info("");
        let prompt = format!("Pay {} with {}?", totals.total, provider.display_name());
        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()?;

        if !confirmed {
            ctx.output.warn("Checkout cancelled");
            return Ok(());
        }
    }

    let spinner = ctx.output.spinner("Processing payment...");
    let outcome = checkout.place_order().await;
    spinner.finish_and_clear();

    match outcome? {
        CheckoutOutcome::OrderCreated(order) => {
            if ctx.output.is_json() {
                ctx.output.json(&order);
                return Ok(());
            }
            ctx.output.success("Order placed");
            ctx.output.kv("Order", order.id.as_str());
            ctx.output.kv("Status", &status_badge(&order.status));
            ctx.output.kv("Charged", &money(&order.total_price()));
            ctx.output.kv(
                "Payment",
                &status_badge(order.request.payment_result.status.as_str()),
            );
            ctx.output.kv(
                "Transaction",
                order.request.payment_result.transaction_id.as_str(),
            );
            Ok(())
        }
        CheckoutOutcome::PaymentFailed(message) => bail!("Payment failed: {}", message),
        CheckoutOutcome::PaymentCancelled => {
            ctx.output.warn("Payment cancelled. Your cart is unchanged");
            Ok(())
        }
    }
}
