//! Match record storage.

use sqlx::SqliteExecutor;

use crate::error::{DatabaseError, Result};
use crate::models::{MatchRecord, MatchStatus};

/// Fields for a new match record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMatchRecord {
    pub male_client_id: i64,
    pub female_client_id: i64,
    pub match_score: i32,
    pub remark: String,
    pub admin_id: String,
}

/// Insert a match record in the initial `acquaintance` status and return its id.
///
/// Fails with [`DatabaseError::AlreadyExists`] when the pair already has a
/// record that is not broken.
pub async fn insert_match_record<'e, E>(executor: E, record: &NewMatchRecord) -> Result<i64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO match_records (male_client_id, female_client_id, match_score, status, remark, admin_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.male_client_id)
    .bind(record.female_client_id)
    .bind(record.match_score)
    .bind(MatchStatus::Acquaintance)
    .bind(&record.remark)
    .bind(&record.admin_id)
    .execute(executor)
    .await
    .map_err(|e| {
        DatabaseError::unique_or_sqlx(
            e,
            "MatchRecord",
            format!("{}/{}", record.male_client_id, record.female_client_id),
        )
    })?;

    Ok(result.last_insert_rowid())
}

/// Get a match record by ID.
pub async fn get_match_record<'e, E>(executor: E, id: i64) -> Result<MatchRecord>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, MatchRecord>(
        r#"
        SELECT id, male_client_id, female_client_id, match_date, match_score,
               status, remark, admin_id, created_at, updated_at
        FROM match_records
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "MatchRecord",
        id: id.to_string(),
    })
}

/// List every match record involving a client, newest first.
pub async fn list_for_client<'e, E>(executor: E, client_id: i64) -> Result<Vec<MatchRecord>>
where
    E: SqliteExecutor<'e>,
{
    let records = sqlx::query_as::<_, MatchRecord>(
        r#"
        SELECT id, male_client_id, female_client_id, match_date, match_score,
               status, remark, admin_id, created_at, updated_at
        FROM match_records
        WHERE male_client_id = ? OR female_client_id = ?
        ORDER BY id DESC
        "#,
    )
    .bind(client_id)
    .bind(client_id)
    .fetch_all(executor)
    .await?;

    Ok(records)
}

/// Move a record from `current` to `next`.
///
/// Returns `false` if the stored status is no longer `current`.
pub async fn update_status_if<'e, E>(
    executor: E,
    id: i64,
    current: MatchStatus,
    next: MatchStatus,
) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE match_records
        SET status = ?, updated_at = datetime('now')
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(next)
    .bind(id)
    .bind(current)
    .execute(executor)
    .await
    .map_err(|e| DatabaseError::unique_or_sqlx(e, "MatchRecord", id.to_string()))?;

    Ok(result.rows_affected() > 0)
}

/// Hard-delete a match record and return it. Its status history goes with it.
pub async fn delete_match_record<'e, E>(executor: E, id: i64) -> Result<MatchRecord>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, MatchRecord>(
        r#"
        DELETE FROM match_records
        WHERE id = ?
        RETURNING id, male_client_id, female_client_id, match_date, match_score,
                  status, remark, admin_id, created_at, updated_at
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "MatchRecord",
        id: id.to_string(),
    })
}
