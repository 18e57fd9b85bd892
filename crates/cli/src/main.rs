//! Marketstall CLI - Database migrations and catalog management.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations (schema + session table)
//! mcli migrate
//!
//! # Add a product
//! mcli product add --name "Tea Towel" --price 12.50 --stock 40
//!
//! # Restock a product
//! mcli product restock --id 3 --quantity 10
//! ```
//!
//! # Environment Variables
//!
//! - `MARKETSTALL_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;

#[derive(Parser)]
#[command(name = "mcli")]
#[command(author, version, about = "Marketstall CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage the product catalog
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// Add a new product
    Add {
        /// Product name
        #[arg(short, long)]
        name: String,

        /// Unit price, e.g. 12.50
        #[arg(short, long)]
        price: Decimal,

        /// Units in stock
        #[arg(short, long, default_value_t = 0)]
        stock: i32,
    },
    /// Add units to a product's stock
    Restock {
        /// Product ID
        #[arg(long)]
        id: i32,

        /// Units to add
        #[arg(short, long)]
        quantity: i32,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Product { action } => match action {
            ProductAction::Add { name, price, stock } => {
                let id = commands::product::add(&name, price, stock).await?;
                tracing::info!("Created product {id}");
            }
            ProductAction::Restock { id, quantity } => {
                commands::product::restock(id, quantity).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_product_add_parses_decimal_price() {
        let cli = Cli::try_parse_from([
            "mcli", "product", "add", "--name", "Mug", "--price", "7.25", "--stock", "4",
        ])
        .unwrap();
        let Commands::Product {
            action: ProductAction::Add { price, stock, .. },
        } = cli.command
        else {
            panic!("expected product add");
        };
        assert_eq!(price.to_string(), "7.25");
        assert_eq!(stock, 4);
    }
}
