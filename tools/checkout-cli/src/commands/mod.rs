//! CLI command implementations.

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod coupons;
pub mod status;

use clap::{Args, Subcommand};

/// Arguments for the cart command.
#[derive(Args)]
pub struct CartArgs {
    #[command(subcommand)]
    pub command: CartCommand,
}

#[derive(Subcommand)]
pub enum CartCommand {
    /// Show the cart and its total
    Show,

    /// Add a product to the cart
    Add {
        /// Product ID
        product: String,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        qty: i64,

        /// Product name, remembered for offline use
        #[arg(long, requires = "price")]
        name: Option<String>,

        /// Unit price in major units, remembered for offline use
        #[arg(long, requires = "name")]
        price: Option<f64>,
    },

    /// Set a line's quantity (0 removes it)
    Update {
        /// Product ID
        product: String,

        /// New quantity
        qty: i64,
    },

    /// Remove a product from the cart
    Remove {
        /// Product ID
        product: String,
    },

    /// Empty the cart
    Clear,
}

/// Arguments for the auth command.
#[derive(Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand)]
pub enum AuthCommand {
    /// Sign in and move the guest cart to the account
    Login {
        /// User ID
        #[arg(short, long)]
        user: String,

        /// Bearer token issued by the identity provider
        #[arg(short, long)]
        token: String,

        /// Minutes until the token expires
        #[arg(long, default_value_t = 60)]
        ttl_mins: i64,
    },

    /// Sign out and switch back to the guest cart
    Logout,

    /// Show the current shopper
    Status,
}

/// Arguments for the coupons command.
#[derive(Args)]
pub struct CouponsArgs {
    #[command(subcommand)]
    pub command: CouponsCommand,
}

#[derive(Subcommand)]
pub enum CouponsCommand {
    /// List coupons
    List {
        /// Only offers the signed-in shopper can still redeem
        #[arg(long)]
        available: bool,
    },

    /// Check a coupon against the current cart
    Check {
        /// Coupon code
        code: String,

        /// Payment provider to check eligibility for
        #[arg(short, long)]
        provider: Option<String>,
    },
}

/// Arguments for the checkout command.
#[derive(Args)]
pub struct CheckoutArgs {
    /// Payment provider (e.g. phonepe, googlepay, stripe, cod)
    #[arg(short, long)]
    pub provider: String,

    /// Coupon code to apply
    #[arg(long)]
    pub coupon: Option<String>,

    /// Recipient name
    #[arg(long)]
    pub name: String,

    /// Street address
    #[arg(long)]
    pub address: String,

    #[arg(long)]
    pub city: String,

    #[arg(long)]
    pub postal_code: String,

    #[arg(long, default_value = "IN")]
    pub country: String,

    #[arg(long)]
    pub phone: Option<String>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Keep polling at the configured interval until interrupted
    #[arg(short, long)]
    pub watch: bool,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Write a default turbo-checkout.toml
    Init {
        /// Backend base URL
        #[arg(long, default_value = "http://localhost:5000/api")]
        base_url: String,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Validate configuration
    Validate,
}
