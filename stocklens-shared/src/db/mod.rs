/// Database utilities
///
/// This module provides the PostgreSQL connection pool and the migration
/// runner used at startup.
///
/// - `pool`: Connection pool creation and health checks
/// - `migrations`: Embedded schema migrations

pub mod migrations;
pub mod pool;
