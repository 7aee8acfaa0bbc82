//! TurboCommerce checkout CLI - drive a storefront cart and checkout from
//! the terminal.
//!
//! Commands:
//! - `turbo-checkout cart` - Show and edit the cart
//! - `turbo-checkout auth` - Sign in, sign out, show the session
//! - `turbo-checkout coupons` - List and check coupons
//! - `turbo-checkout checkout` - Pay and place an order
//! - `turbo-checkout status` - Probe backend liveness
//! - `turbo-checkout config` - Manage configuration

mod commands;
mod config;
mod context;
mod logging;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{AuthArgs, CartArgs, CheckoutArgs, ConfigArgs, CouponsArgs, StatusArgs};

/// TurboCommerce checkout CLI - carts, coupons, payments and orders
#[derive(Parser)]
#[command(name = "turbo-checkout")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show and edit the cart
    Cart(CartArgs),

    /// Manage the signed-in shopper
    Auth(AuthArgs),

    /// List and check coupons
    Coupons(CouponsArgs),

    /// Pay for the cart and place an order
    Checkout(CheckoutArgs),

    /// Check whether the backend is reachable
    Status(StatusArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = output::Output::new(cli.verbose, cli.json);

    let config_path = cli.config.as_deref();
    let ctx = context::Context::load(config_path, output)?;
    logging::init(&ctx.config.logging, cli.verbose);

    let result = match cli.command {
        Commands::Cart(args) => commands::cart::run(args, &ctx).await,
        Commands::Auth(args) => commands::auth::run(args, &ctx).await,
        Commands::Coupons(args) => commands::coupons::run(args, &ctx).await,
        Commands::Checkout(args) => commands::checkout::run(args, &ctx).await,
        Commands::Status(args) => commands::status::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&context::describe_error(&e));
        std::process::exit(1);
    }

    Ok(())
}
