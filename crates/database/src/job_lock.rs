//! Time-bounded leases for recurring jobs.
//!
//! A lease is a row keyed by job name. It can be taken when absent or expired,
//! and it lapses on its own if the holder never releases it.

use std::time::Duration;

use sqlx::SqliteExecutor;

use crate::models::JobLock;
use crate::Result;

/// Try to take the lease `key` for `holder`.
///
/// `now` is a unix timestamp in seconds. Returns `true` if the lease was
/// granted, `false` if another holder has an unexpired lease.
pub async fn try_acquire<'e, E>(
    executor: E,
    key: &str,
    holder: &str,
    now: i64,
    ttl: Duration,
) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    let expires_at = now.saturating_add(ttl_secs);
    let result = sqlx::query(
        r#"
        INSERT INTO job_locks (lock_key, holder, expires_at)
        VALUES (?, ?, ?)
        ON CONFLICT(lock_key) DO UPDATE SET
            holder = excluded.holder,
            expires_at = excluded.expires_at,
            acquired_at = datetime('now')
        WHERE job_locks.expires_at <= ?
        "#,
    )
    .bind(key)
    .bind(holder)
    .bind(expires_at)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Release the lease if `holder` still owns it.
///
/// Returns `false` when the lease had already expired and been taken over.
pub async fn release<'e, E>(executor: E, key: &str, holder: &str) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        DELETE FROM job_locks
        WHERE lock_key = ? AND holder = ?
        "#,
    )
    .bind(key)
    .bind(holder)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Get the current lease row for a key, expired or not.
pub async fn get_lock<'e, E>(executor: E, key: &str) -> Result<Option<JobLock>>
where
    E: SqliteExecutor<'e>,
{
    let lock = sqlx::query_as::<_, JobLock>(
        r#"
        SELECT lock_key, holder, expires_at, acquired_at
        FROM job_locks
        WHERE lock_key = ?
        "#,
    )
    .bind(key)
    .fetch_optional(executor)
    .await?;

    Ok(lock)
}
