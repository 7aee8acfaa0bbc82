//! CLI configuration file discovery.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use turbo_checkout::config::StorefrontConfig;

/// File names searched for, in order, in each directory.
pub const CONFIG_NAMES: [&str; 3] = [
    "turbo-checkout.toml",
    ".turbo-checkout.toml",
    "turbo-checkout.json",
];

/// Load a config file, attaching the path to any error.
pub fn load(path: &Path) -> Result<StorefrontConfig> {
    StorefrontConfig::load(path)
        .with_context(|| format!("Failed to load config file: {}", path.display()))
}

/// Find the nearest config file walking up from `start`.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        for name in &CONFIG_NAMES {
            let candidate = current.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Generate a default turbo-checkout.toml.
pub fn generate_default_config(base_url: &str) -> String {
    format!(
        r#"# TurboCommerce checkout configuration

[api]
base_url = "{base_url}"
timeout_ms = 10000

[storage]
# Guest cart, cart mirror and identity live here.
dir = ".turbo-checkout"

[liveness]
path = "/health"
interval_secs = 30
timeout_ms = 3000

[payments]
currency = "INR"
# Empty enables every provider.
providers = ["phonepe", "googlepay", "stripe", "cod"]
cod_max_amount = 50000.0

[logging]
level = "info"
format = "human"
"#,
        base_url = base_url
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = StorefrontConfig::from_toml(&generate_default_config("https://shop.example/api"))
            .unwrap();
        assert_eq!(config.api.base_url, "https://shop.example/api");
        assert_eq!(config.payments.providers().unwrap().len(), 4);
    }

    #[test]
    fn test_find_config_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("turbo-checkout.toml"), "").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("turbo-checkout.toml"));
    }

    #[test]
    fn test_find_config_none() {
        let dir = tempfile::tempdir().unwrap();
        // A config above the temp dir would be found; only check the
        // nearest match is not inside it.
        if let Some(found) = find_config_file(dir.path()) {
            assert!(!found.starts_with(dir.path()));
        }
    }
}
