//! SQLite persistence layer for Matchdesk.
//!
//! This crate stores client profiles, match records, the match status audit
//! trail and job leases using SQLx with SQLite.
//!
//! Data functions are generic over [`sqlx::SqliteExecutor`], so the same call
//! works against the pool or inside a transaction from [`Database::begin`].
//!
//! # Example
//!
//! ```no_run
//! use database::{client, Database, Gender, NewClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:matchdesk.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     // Register a client
//!     let mut profile = NewClient::new("Mei", Gender::Female);
//!     profile.age = 29;
//!     profile.education = 3;
//!     let id = client::create_client(db.pool(), &profile).await?;
//!
//!     // Edit inside a transaction
//!     let mut tx = db.begin().await?;
//!     profile.height = 165;
//!     client::update_profile(&mut *tx, id, &profile).await?;
//!     tx.commit().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod job_lock;
pub mod match_record;
pub mod models;
pub mod status_history;
pub mod validation;

pub use client::{ClientFilter, Pagination};
pub use error::{DatabaseError, Result};
pub use match_record::NewMatchRecord;
pub use models::{
    Client, ClientStatus, Gender, HouseStatus, JobLock, MaritalStatus, MatchRecord, MatchStatus,
    NewClient, StatusHistoryEntry,
};
pub use validation::ValidationError;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};

/// Shared handle to the Matchdesk store.
///
/// Cloning is cheap; every clone uses the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connections kept by [`Database::connect`].
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// How long a writer waits on a locked database before failing.
    const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Open the store at `url` with foreign keys enforced.
    ///
    /// Accepts `sqlite:path/to/file.db?mode=rwc` (created when missing) or
    /// `sqlite::memory:`, which every pooled connection shares.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // On disk
    /// let db = database::Database::connect("sqlite:data/matchdesk.db?mode=rwc").await?;
    ///
    /// // In memory, as the tests use
    /// let db = database::Database::connect("sqlite::memory:").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Like [`Database::connect`] with an explicit pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Self::BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Apply pending schema migrations from `migrations/`.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Applying schema migrations");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Schema up to date");
        Ok(())
    }

    /// The underlying pool, usable as an executor for any data function.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction.
    ///
    /// Writes made through the transaction land together on
    /// [`Transaction::commit`]. Dropping it uncommitted rolls everything back,
    /// including when the owning future is cancelled.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Wait for in-flight queries and close every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_transaction_commit_and_rollback() {
        let db = test_db().await;

        // Rolled back on drop
        {
            let mut tx = db.begin().await.unwrap();
            client::create_client(&mut *tx, &NewClient::new("Ghost", Gender::Male))
                .await
                .unwrap();
        }
        let count = client::count_clients(db.pool(), &ClientFilter::default())
            .await
            .unwrap();
        assert_eq!(count, 0);

        // Committed
        let mut tx = db.begin().await.unwrap();
        let id = client::create_client(&mut *tx, &NewClient::new("Kept", Gender::Female))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let fetched = client::get_client(db.pool(), id).await.unwrap();
        assert_eq!(fetched.name, "Kept");
    }
}
