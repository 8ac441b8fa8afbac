/// Token balance ledger
///
/// Every analysis call is metered: the user's balance is checked and
/// debited before the external vision call is made. This module provides
/// the ledger contract and its PostgreSQL implementation.
///
/// # Semantics
///
/// - `balance`: returns the current balance, lazily initializing the row
///   to the starting balance on the first read for a user. Initialization
///   is idempotent (`INSERT ... ON CONFLICT DO NOTHING`), so concurrent
///   first reads never create two rows or reset an existing balance.
/// - `try_debit`: a single atomic conditional decrement with a floor at
///   zero. The decision happens inside the UPDATE's WHERE clause, so
///   concurrent debits from the same user cannot produce a lost update or
///   drive the balance negative.
///
/// Debits are not refunded when a later step of the workflow fails; the
/// attempt cost is sunk once debited.
///
/// # Example
///
/// ```no_run
/// use stocklens_shared::ledger::{Ledger, PgLedger};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let ledger = PgLedger::new(pool);
///
/// let balance = ledger.balance("user@example.com").await?;
/// if ledger.try_debit("user@example.com", 30).await? {
///     // proceed with the metered call
/// } else {
///     println!("Insufficient balance: {}", balance);
/// }
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

/// Balance granted to a user on first contact with the ledger
pub const STARTING_BALANCE: i64 = 1500;

/// Ledger error
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Debit amount was not positive
    #[error("Invalid debit amount: {0}")]
    InvalidAmount(i64),
}

/// Balance ledger contract
///
/// The orchestrator only talks to this trait; tests run against an
/// in-memory implementation.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Returns the user's current balance, initializing it to
    /// [`STARTING_BALANCE`] on first read
    async fn balance(&self, user_email: &str) -> Result<i64, LedgerError>;

    /// Attempts to debit `amount` from the user's balance
    ///
    /// Returns true and the new balance is exactly `old - amount` when the
    /// balance covers the debit; returns false and leaves the balance
    /// unchanged otherwise.
    async fn try_debit(&self, user_email: &str, amount: i64) -> Result<bool, LedgerError>;
}

/// PostgreSQL-backed ledger
///
/// Balances live in the `token_balances` table, one row per user email.
pub struct PgLedger {
    db: PgPool,
    starting_balance: i64,
}

impl PgLedger {
    /// Creates a ledger with the default starting balance
    pub fn new(db: PgPool) -> Self {
        PgLedger {
            db,
            starting_balance: STARTING_BALANCE,
        }
    }

    /// Creates a ledger with a custom starting balance
    pub fn with_starting_balance(db: PgPool, starting_balance: i64) -> Self {
        PgLedger {
            db,
            starting_balance,
        }
    }

    /// Ensures a balance row exists for the user
    ///
    /// Idempotent: an existing row is left untouched.
    async fn ensure_row(&self, user_email: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO token_balances (user_email, balance)
            VALUES (LOWER($1), $2)
            ON CONFLICT (user_email) DO NOTHING
            "#,
        )
        .bind(user_email)
        .bind(self.starting_balance)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn balance(&self, user_email: &str) -> Result<i64, LedgerError> {
        self.ensure_row(user_email).await?;

        let balance: i64 = sqlx::query_scalar(
            r#"
            SELECT balance
            FROM token_balances
            WHERE user_email = LOWER($1)
            "#,
        )
        .bind(user_email)
        .fetch_one(&self.db)
        .await?;

        Ok(balance)
    }

    async fn try_debit(&self, user_email: &str, amount: i64) -> Result<bool, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        self.ensure_row(user_email).await?;

        // The balance check and the write are one statement; there is no
        // read-then-write window for a concurrent debit to slip into.
        let result = sqlx::query(
            r#"
            UPDATE token_balances
            SET balance = balance - $2, updated_at = NOW()
            WHERE user_email = LOWER($1) AND balance >= $2
            "#,
        )
        .bind(user_email)
        .bind(amount)
        .execute(&self.db)
        .await?;

        let debited = result.rows_affected() > 0;
        if debited {
            tracing::debug!(user = %user_email, amount, "Debited balance");
        } else {
            tracing::debug!(user = %user_email, amount, "Debit rejected, insufficient balance");
        }

        Ok(debited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starting_balance_constant() {
        assert_eq!(STARTING_BALANCE, 1500);
    }

    #[test]
    fn test_ledger_error_display() {
        let err = LedgerError::InvalidAmount(-5);
        assert_eq!(err.to_string(), "Invalid debit amount: -5");
    }

    // Debit/initialization behavior against PostgreSQL requires a running
    // database; the same contract is exercised end-to-end through the
    // in-memory ledger in stocklens-api's workflow tests.
}
