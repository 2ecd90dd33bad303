//! Append-only audit trail of match status transitions.
//!
//! Rows can be appended and read, never changed. A trigger on the table
//! rejects updates from any other path as well.

use sqlx::SqliteExecutor;

use crate::models::{MatchStatus, StatusHistoryEntry};
use crate::Result;

/// Append one transition row and return its id.
pub async fn append_entry<'e, E>(
    executor: E,
    match_record_id: i64,
    old_status: MatchStatus,
    new_status: MatchStatus,
    operator: &str,
    reason: &str,
) -> Result<i64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO match_status_history (match_record_id, old_status, new_status, operator, reason)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(match_record_id)
    .bind(old_status)
    .bind(new_status)
    .bind(operator)
    .bind(reason)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// List the transitions of a match record, oldest first.
pub async fn list_for_record<'e, E>(
    executor: E,
    match_record_id: i64,
) -> Result<Vec<StatusHistoryEntry>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query_as::<_, StatusHistoryEntry>(
        r#"
        SELECT id, match_record_id, old_status, new_status, operator, reason, created_at
        FROM match_status_history
        WHERE match_record_id = ?
        ORDER BY id
        "#,
    )
    .bind(match_record_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}
