/// Inventory record store
///
/// Thin persistence seam over the shared `InventoryRecord` model. The
/// workflow talks to this trait so its tests can run against an in-memory
/// store while production uses PostgreSQL.

use async_trait::async_trait;
use sqlx::PgPool;
use stocklens_shared::models::record::{InventoryRecord, NewInventoryRecord};

/// Store error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store unavailable (used by test doubles to simulate outages)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Inventory store contract
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Lists a user's most recent records, newest first
    async fn list_recent(
        &self,
        user_email: &str,
        limit: i64,
    ) -> Result<Vec<InventoryRecord>, StoreError>;

    /// Inserts a batch of records in one transaction
    ///
    /// All records are written or none are.
    async fn insert_many(
        &self,
        records: &[NewInventoryRecord],
    ) -> Result<Vec<InventoryRecord>, StoreError>;
}

/// PostgreSQL-backed inventory store
pub struct PgInventoryStore {
    db: PgPool,
}

impl PgInventoryStore {
    /// Creates a store over an existing pool
    pub fn new(db: PgPool) -> Self {
        PgInventoryStore { db }
    }
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn list_recent(
        &self,
        user_email: &str,
        limit: i64,
    ) -> Result<Vec<InventoryRecord>, StoreError> {
        Ok(InventoryRecord::list_recent(&self.db, user_email, limit).await?)
    }

    async fn insert_many(
        &self,
        records: &[NewInventoryRecord],
    ) -> Result<Vec<InventoryRecord>, StoreError> {
        Ok(InventoryRecord::insert_many(&self.db, records).await?)
    }
}
