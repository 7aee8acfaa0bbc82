//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use tracing::debug;
use turbo_checkout::config::StorefrontConfig;
use turbo_checkout::{CheckoutError, Storefront};

use crate::config;
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    /// Storefront configuration.
    pub config: StorefrontConfig,
    /// File the configuration came from, if any.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Load context, finding the config file when no path is given.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let config_path = match config_path {
            Some(path) => Some(resolve(&cwd, Path::new(path))),
            None => config::find_config_file(&cwd),
        };
        let mut config = match &config_path {
            Some(path) => config::load(path)?,
            None => StorefrontConfig::default(),
        };

        // Relative storage paths are relative to the config file.
        let base = config_path
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or(&cwd)
            .to_path_buf();
        config.storage.dir = resolve(&base, &config.storage.dir);

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
        })
    }

    /// Build the storefront for this invocation.
    pub fn storefront(&self) -> Result<Storefront> {
        debug!(
            config = ?self.config_path,
            storage = %self.config.storage.dir.display(),
            "Opening storefront"
        );
        std::fs::create_dir_all(&self.config.storage.dir).with_context(|| {
            format!(
                "Failed to create storage directory: {}",
                self.config.storage.dir.display()
            )
        })?;
        Storefront::from_config(&self.config).context("Failed to set up storefront")
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Render an error chain, preferring the shopper-facing message for
/// checkout errors.
pub fn describe_error(error: &anyhow::Error) -> String {
    match error.chain().find_map(|e| e.downcast_ref::<CheckoutError>()) {
        Some(CheckoutError::Config(_)) | None => format!("{:#}", error),
        Some(checkout) => checkout.user_message(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_keeps_absolute_paths() {
        let base = Path::new("/srv/shop");
        assert_eq!(resolve(base, Path::new("/var/cart")), PathBuf::from("/var/cart"));
        assert_eq!(
            resolve(base, Path::new(".turbo-checkout")),
            PathBuf::from("/srv/shop/.turbo-checkout")
        );
    }

    #[test]
    fn test_checkout_errors_use_shopper_message() {
        let error = anyhow::Error::new(CheckoutError::EmptyCart).context("Checkout failed");
        assert_eq!(describe_error(&error), "Your cart is empty");

        let other = anyhow::anyhow!("disk full");
        assert_eq!(describe_error(&other), "disk full");
    }
}
