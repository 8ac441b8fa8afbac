/// Database migration runner
///
/// This module provides utilities for running database migrations using
/// sqlx's migration system. Migrations are embedded at compile time from
/// the `migrations/` directory of this crate.
///
/// # Schema
///
/// Three tables:
/// - `users` — accounts (email, password hash, confirmation state)
/// - `token_balances` — one credit balance per user email
/// - `inventory_records` — confirmed counting results, append-only
///
/// # Example
///
/// ```no_run
/// use stocklens_shared::db::pool::{create_pool, DatabaseConfig};
/// use stocklens_shared::db::migrations::run_migrations;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let pool = create_pool(config).await?;
///     run_migrations(&pool).await?;
///
///     Ok(())
/// }
/// ```

use sqlx::postgres::PgPool;
use tracing::{info, warn};

/// Runs all pending database migrations
///
/// # Errors
///
/// Returns an error if a migration fails to execute or the database
/// connection is lost during migration. Failed migrations are rolled back.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Starting database migrations");

    let migrations = sqlx::migrate!("./migrations");

    match migrations.run(pool).await {
        Ok(()) => {
            info!("All database migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            warn!("Migration failed: {}", e);
            Err(e)
        }
    }
}
