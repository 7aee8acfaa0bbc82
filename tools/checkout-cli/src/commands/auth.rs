//! Sign in, sign out and show the current shopper.

use anyhow::{bail, Result};
use chrono::{Duration, Utc};
use turbo_checkout::session::Identity;
use turbo_commerce::UserId;

use super::{AuthArgs, AuthCommand};
use crate::context::Context;
use crate::output::status_badge;

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuthCommand::Login {
            user,
            token,
            ttl_mins,
        } => login(user, token, ttl_mins, ctx).await,
        AuthCommand::Logout => logout(ctx).await,
        AuthCommand::Status => status(ctx),
    }
}

async fn login(user: String, token: String, ttl_mins: i64, ctx: &Context) -> Result<()> {
    if ttl_mins <= 0 {
        bail!("--ttl-mins must be positive");
    }
    let storefront = ctx.storefront()?;
    let identity = Identity::new(
        UserId::new(user),
        token,
        Utc::now() + Duration::minutes(ttl_mins),
    );
    let user_id = identity.user_id.clone();

    let spinner = ctx.output.spinner("Signing in...");
    let report = storefront.cart().sign_in(identity).await;
    spinner.finish_and_clear();
    let report = report?;

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "user_id": user_id,
            "migrated": report.migrated,
            "failed": report
                .failed
                .iter()
                .map(|f| serde_json::json!({ "product_id": f.product_id, "reason": f.reason }))
                .collect::<Vec<_>>(),
        }));
        return Ok(());
    }

    ctx.output.success(&format!("Signed in as {}", user_id));
    if !report.migrated.is_empty() {
        ctx.output.info(&format!(
            "Moved {} item(s) from your guest cart",
            report.migrated.len()
        ));
    }
    if !report.is_complete() {
        ctx.output
            .warn("Some items could not be moved to your account cart:");
        for failure in &report.failed {
            ctx.output
                .list_item(&format!("{}: {}", failure.product_id, failure.reason));
        }
    }
    Ok(())
}

async fn logout(ctx: &Context) -> Result<()> {
    let storefront = ctx.storefront()?;
    if !storefront.session().is_authenticated() {
        ctx.output.info("Not signed in");
        return Ok(());
    }
    let guest_cart = storefront.cart().sign_out().await?;

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({ "signed_out": true }));
        return Ok(());
    }
    ctx.output.success("Signed out");
    if !guest_cart.is_empty() {
        ctx.output.info(&format!(
            "Guest cart has {} item(s)",
            guest_cart.item_count()
        ));
    }
    Ok(())
}

fn status(ctx: &Context) -> Result<()> {
    let storefront = ctx.storefront()?;
    let session = storefront.session();

    let (state, identity) = match (session.current(), session.stored()) {
        (Some(identity), _) => ("signed in", Some(identity)),
        (None, Some(identity)) => ("expired", Some(identity)),
        (None, None) => ("guest", None),
    };

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "state": state,
            "user_id": identity.as_ref().map(|i| i.user_id.clone()),
            "expires_at": identity.as_ref().map(|i| i.expires_at),
        }));
        return Ok(());
    }

    ctx.output.header("Session");
    ctx.output.kv("State", &status_badge(state));
    if let Some(identity) = identity {
        ctx.output.kv("User", identity.user_id.as_str());
        ctx.output.kv("Expires", &identity.expires_at.to_rfc3339());
    }
    Ok(())
}
