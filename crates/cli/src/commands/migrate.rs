//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! mcli migrate
//! ```
//!
//! Applies the embedded schema migrations (`crates/storefront/migrations/`)
//! and creates the session store's table.

use marketstall_storefront::db::MIGRATOR;
use marketstall_storefront::middleware::create_session_store;

use super::{CommandError, connect};

/// Run all storefront migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running storefront migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Creating session store table...");
    create_session_store(&pool).migrate().await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
