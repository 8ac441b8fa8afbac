//! # StockLens Shared Library
//!
//! This crate contains shared types, utilities, and business logic used by
//! the StockLens API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `ledger`: Token balance ledger (credit metering)
//! - `auth`: Authentication utilities (password hashing, JWT)
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod db;
pub mod ledger;
pub mod models;

/// Current version of the StockLens shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
