//! List and check coupons.

use anyhow::{bail, Result};
use turbo_checkout::CheckoutError;
use turbo_commerce::cart::{Coupon, DiscountType};
use turbo_commerce::payment::PaymentProvider;
use turbo_commerce::Money;

use super::{CouponsArgs, CouponsCommand};
use crate::context::Context;
use crate::output::money;

/// Run the coupons command.
pub async fn run(args: CouponsArgs, ctx: &Context) -> Result<()> {
    match args.command {
        CouponsCommand::List { available } => list(available, ctx).await,
        CouponsCommand::Check { code, provider } => check(&code, provider.as_deref(), ctx).await,
    }
}

async fn list(available: bool, ctx: &Context) -> Result<()> {
    let storefront = ctx.storefront()?;
    let coupons = if available {
        let identity = storefront
            .session()
            .current()
            .ok_or(CheckoutError::AuthenticationRequired)?;
        storefront.coupons().list_available(&identity).await?
    } else {
        storefront.coupons().list_public().await?
    };

    if ctx.output.is_json() {
        ctx.output.json(&coupons);
        return Ok(());
    }

    ctx.output.header(if available {
        "Your Coupons"
    } else {
        "Coupons"
    });
    if coupons.is_empty() {
        ctx.output.info("No coupons found");
        return Ok(());
    }

    let widths = [12, 14, 14, 24];
    ctx.output
        .table_row(&["CODE", "DISCOUNT", "MIN ORDER", "METHODS"], &widths);
    for coupon in &coupons {
        ctx.output.table_row(
            &[
                &coupon.code,
                &describe_discount(coupon),
                &money(&coupon.min_order_value),
                &describe_methods(coupon),
            ],
            &widths,
        );
    }
    Ok(())
}

async fn check(code: &str, provider: Option<&str>, ctx: &Context) -> Result<()> {
    let provider = match provider {
        Some(raw) => match raw.parse::<PaymentProvider>() {
            Ok(provider) => Some(provider),
            Err(_) => bail!("Unknown payment provider: {}", raw),
        },
        None => None,
    };

    let storefront = ctx.storefront()?;
    let cart = storefront.cart().get().await?;
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart.into());
    }
    let identity = storefront.session().current();
    let application = storefront
        .coupons()
        .validate(
            identity.as_ref(),
            code,
            cart.total_amount()?,
            provider,
            &cart.product_ids(),
        )
        .await?;

    if ctx.output.is_json() {
        ctx.output.json(&application);
        return Ok(());
    }

    ctx.output
        .success(&format!("{} can be applied", application.code()));
    ctx.output.kv("Order value", &money(&application.order_value));
    ctx.output.kv("Discount", &money(&application.discount_amount));
    ctx.output.kv("You pay", &money(&application.final_amount));
    if let Some(method) = application.payment_method {
        ctx.output.kv("Checked for", method.display_name());
    }
    Ok(())
}

fn describe_discount(coupon: &Coupon) -> String {
    match coupon.discount_type {
        DiscountType::Percentage => match &coupon.max_discount {
            Some(cap) => format!("{}% (max {})", coupon.discount_value, cap),
            None => format!("{}%", coupon.discount_value),
        },
        DiscountType::Fixed => {
            let amount = Money::from_decimal(coupon.discount_value, coupon.min_order_value.currency);
            format!("{} off", amount)
        }
    }
}

fn describe_methods(coupon: &Coupon) -> String {
    if coupon.payment_methods.is_empty() {
        return "any".to_string();
    }
    coupon
        .payment_methods
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
