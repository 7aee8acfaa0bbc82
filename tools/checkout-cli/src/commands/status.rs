//! Probe backend liveness.

use anyhow::Result;
use turbo_checkout::liveness::Reachability;

use super::StatusArgs;
use crate::context::Context;
use crate::output::status_badge;

/// Run the status command.
pub async fn run(args: StatusArgs, ctx: &Context) -> Result<()> {
    let storefront = ctx.storefront()?;

    if args.watch {
        return watch(&storefront, ctx).await;
    }

    let spinner = ctx.output.spinner("Checking backend...");
    let reachability = storefront
        .check_liveness()
        .await
        .unwrap_or(Reachability::Unknown);
    spinner.finish_and_clear();

    report(reachability, ctx);
    Ok(())
}

async fn watch(storefront: &turbo_checkout::Storefront, ctx: &Context) -> Result<()> {
    let mut changes = storefront.backend_status().subscribe();
    let Some(handle) = storefront.start_liveness() else {
        ctx.output.warn("Liveness polling is not configured");
        return Ok(());
    };
    ctx.output.info(&format!(
        "Polling {} every {}s (Ctrl-C to stop)",
        ctx.config.liveness.path, ctx.config.liveness.interval_secs
    ));

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let reachability = *changes.borrow_and_update();
                report(reachability, ctx);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.stop().await;
    Ok(())
}

fn report(reachability: Reachability, ctx: &Context) {
    let label = match reachability {
        Reachability::Unknown => "unknown",
        Reachability::Reachable => "reachable",
        Reachability::Unreachable => "unreachable",
    };

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "base_url": ctx.config.api.base_url,
            "backend": label,
        }));
        return;
    }
    ctx.output.kv("Backend", &ctx.config.api.base_url);
    ctx.output.kv("Status", &status_badge(label));
}
