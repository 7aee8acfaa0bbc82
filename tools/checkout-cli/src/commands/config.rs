//! Configuration management commands.

use std::fs;

use anyhow::{bail, Context as _, Result};

use super::{ConfigArgs, ConfigCommand};
use crate::config::{generate_default_config, CONFIG_NAMES};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Init { base_url, force } => init_config(&base_url, force, ctx),
        ConfigCommand::Validate => validate_config(ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    let config = &ctx.config;
    ctx.output.info("");
    ctx.output.info("[api]");
    ctx.output.kv("base_url", &config.api.base_url);
    ctx.output.kv("timeout_ms", &config.api.timeout_ms.to_string());

    ctx.output.info("");
    ctx.output.info("[storage]");
    ctx.output.kv("dir", &config.storage.dir.display().to_string());

    ctx.output.info("");
    ctx.output.info("[liveness]");
    ctx.output.kv("path", &config.liveness.path);
    ctx.output
        .kv("interval_secs", &config.liveness.interval_secs.to_string());
    ctx.output.kv("timeout_ms", &config.liveness.timeout_ms.to_string());

    ctx.output.info("");
    ctx.output.info("[payments]");
    ctx.output.kv("currency", config.payments.currency.code());
    let providers = config.payments.providers()?;
    ctx.output.kv(
        "providers",
        &providers
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    );
    ctx.output
        .kv("cod_max_amount", &config.payments.cod_max().to_string());

    ctx.output.info("");
    ctx.output.info("[logging]");
    ctx.output.kv("level", &config.logging.level);
    ctx.output.kv("format", &format!("{:?}", config.logging.format).to_lowercase());

    Ok(())
}

fn init_config(base_url: &str, force: bool, ctx: &Context) -> Result<()> {
    let path = ctx.cwd.join(CONFIG_NAMES[0]);

    if path.exists() && !force {
        bail!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        );
    }

    let content = generate_default_config(base_url);
    fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    ctx.output.success(&format!("Created {}", path.display()));
    Ok(())
}

fn validate_config(ctx: &Context) -> Result<()> {
    // Context::load already rejected files that fail validation; this
    // also covers the defaults and reports what is enabled.
    ctx.config.validate()?;
    let providers = ctx.config.payments.providers()?;

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "valid": true,
            "file": ctx.config_path.as_ref().map(|p| p.display().to_string()),
            "providers": providers,
        }));
        return Ok(());
    }

    ctx.output.success("Configuration is valid");
    ctx.output.kv("Payment providers", &providers.len().to_string());
    if ctx.config_path.is_none() {
        ctx.output
            .warn("No config file found, using defaults. Run `turbo-checkout config init`.");
    }
    Ok(())
}
