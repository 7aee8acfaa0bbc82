//! Tracing subscriber setup.

use tracing_subscriber::{fmt, EnvFilter};
use turbo_checkout::config::{LogFormat, LoggingConfig};

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init(config: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let directive = std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default_directive(level));

    let builder = fmt()
        .with_env_filter(EnvFilter::new(directive))
        .with_writer(std::io::stderr);

    let _ = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Human => builder.with_target(false).try_init(),
    };
}

fn default_directive(level: &str) -> String {
    format!(
        "turbo_checkout={level},turbo_data={level},turbo_cache={level},checkout_cli={level},warn",
        level = level
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_scopes_crates() {
        let directive = default_directive("debug");
        assert!(directive.starts_with("turbo_checkout=debug"));
        assert!(directive.ends_with(",warn"));
        assert!(EnvFilter::try_new(directive).is_ok());
    }
}
