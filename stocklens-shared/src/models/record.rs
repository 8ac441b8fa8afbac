/// Inventory record model and database operations
///
/// Confirmed counting results, one row per (label, count) pair the user
/// accepted. Records are immutable after insert; the history listing is
/// ordered newest first.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE inventory_records (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_email TEXT NOT NULL,
///     label TEXT NOT NULL,
///     count BIGINT NOT NULL CHECK (count >= 0),
///     photo_url TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// A confirmed inventory record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryRecord {
    /// Unique record ID (UUID v4)
    pub id: Uuid,

    /// Email of the user who owns this record
    pub user_email: String,

    /// Product label, as confirmed (possibly edited) by the user
    pub label: String,

    /// Counted quantity, carried at the same width the recognition
    /// results use so confirmed values persist exactly
    pub count: i64,

    /// Public URL of the photo the count was taken from, if the upload
    /// succeeded
    pub photo_url: Option<String>,

    /// When the record was persisted
    pub created_at: DateTime<Utc>,
}

/// Input for creating inventory records
///
/// One `NewInventoryRecord` per accepted (label, count) pair; the whole
/// batch shares the photo URL of the analyzed capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInventoryRecord {
    /// Email of the owning user
    pub user_email: String,

    /// Product label
    pub label: String,

    /// Counted quantity
    pub count: i64,

    /// Photo URL, if available
    pub photo_url: Option<String>,
}

impl InventoryRecord {
    /// Inserts a batch of records
    ///
    /// The caller treats the batch as a single unit: either it returns Ok
    /// and the records are expected to be queryable, or it returns an error
    /// and the caller must assume nothing was persisted. The insert runs in
    /// one transaction so partial batches never survive a failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails
    pub async fn insert_many(
        pool: &PgPool,
        records: &[NewInventoryRecord],
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut inserted = Vec::with_capacity(records.len());

        for record in records {
            let row = sqlx::query_as::<_, InventoryRecord>(
                r#"
                INSERT INTO inventory_records (user_email, label, count, photo_url)
                VALUES ($1, $2, $3, $4)
                RETURNING id, user_email, label, count, photo_url, created_at
                "#,
            )
            .bind(&record.user_email)
            .bind(&record.label)
            .bind(record.count)
            .bind(&record.photo_url)
            .fetch_one(&mut *tx)
            .await?;

            inserted.push(row);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Lists a user's most recent records, newest first
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `user_email` - Owner to filter by
    /// * `limit` - Maximum number of records to return
    ///
    /// # Errors
    ///
    /// Returns an error if database connection fails
    pub async fn list_recent(
        pool: &PgPool,
        user_email: &str,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let records = sqlx::query_as::<_, InventoryRecord>(
            r#"
            SELECT id, user_email, label, count, photo_url, created_at
            FROM inventory_records
            WHERE user_email = LOWER($1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_email)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(records)
    }
}
