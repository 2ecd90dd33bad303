//! Client profile storage.
//!
//! Profile edits, the pre-filter's candidate cache and the partner linkage are
//! written by separate functions so each writer only touches its own columns.

use sqlx::{Acquire, QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::{Client, ClientStatus, Gender, NewClient};
use crate::validation::validate_client;

const SELECT_CLIENT: &str = r#"
    SELECT id, name, gender, age, birth_year_month, height, education,
           marital_status, monthly_income, house_status, has_car, avatar,
           status, partner_id, candidate_cache, candidate_cache_updated_at,
           created_at, updated_at
    FROM clients
"#;

/// Filter for client queries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientFilter {
    pub status: Option<ClientStatus>,
    pub gender: Option<Gender>,
    /// Leave this client out of the results.
    pub exclude_id: Option<i64>,
    /// Only return clients with a larger id (keyset pagination).
    pub after_id: Option<i64>,
}

impl ClientFilter {
    /// Single clients of the given gender.
    pub fn single(gender: Gender) -> Self {
        Self {
            status: Some(ClientStatus::Single),
            gender: Some(gender),
            ..Self::default()
        }
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" WHERE 1 = 1");
        if let Some(status) = self.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(gender) = self.gender {
            builder.push(" AND gender = ").push_bind(gender);
        }
        if let Some(id) = self.exclude_id {
            builder.push(" AND id <> ").push_bind(id);
        }
        if let Some(id) = self.after_id {
            builder.push(" AND id > ").push_bind(id);
        }
    }
}

/// Limit/offset pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub fn first(limit: i64) -> Self {
        Self { limit, offset: 0 }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::first(50)
    }
}

/// Create a new client and return its id.
///
/// New clients start out single with no partner and no candidate cache.
pub async fn create_client<'e, E>(executor: E, client: &NewClient) -> Result<i64>
where
    E: SqliteExecutor<'e>,
{
    validate_client(client)?;

    let result = sqlx::query(
        r#"
        INSERT INTO clients (
            name, gender, age, birth_year_month, height, education,
            marital_status, monthly_income, house_status, has_car, avatar
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(client.name.trim())
    .bind(client.gender)
    .bind(client.age)
    .bind(&client.birth_year_month)
    .bind(client.height)
    .bind(client.education)
    .bind(client.marital_status)
    .bind(client.monthly_income)
    .bind(client.house_status)
    .bind(client.has_car)
    .bind(&client.avatar)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Get a client by ID.
pub async fn get_client<'e, E>(executor: E, id: i64) -> Result<Client>
where
    E: SqliteExecutor<'e>,
{
    find_client(executor, id)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Client",
            id: id.to_string(),
        })
}

/// Get a client by ID, returning `None` if it does not exist.
pub async fn find_client<'e, E>(executor: E, id: i64) -> Result<Option<Client>>
where
    E: SqliteExecutor<'e>,
{
    let query = format!("{SELECT_CLIENT} WHERE id = ?");
    let client = sqlx::query_as::<_, Client>(&query)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(client)
}

/// List clients matching a filter, ordered by id.
pub async fn list_clients<'e, E>(
    executor: E,
    filter: &ClientFilter,
    page: Pagination,
) -> Result<Vec<Client>>
where
    E: SqliteExecutor<'e>,
{
    let mut builder = QueryBuilder::<Sqlite>::new(SELECT_CLIENT);
    filter.push_where(&mut builder);
    builder
        .push(" ORDER BY id LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);

    let clients = builder
        .build_query_as::<Client>()
        .fetch_all(executor)
        .await?;

    Ok(clients)
}

/// Count clients matching a filter.
pub async fn count_clients<'e, E>(executor: E, filter: &ClientFilter) -> Result<i64>
where
    E: SqliteExecutor<'e>,
{
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM clients");
    filter.push_where(&mut builder);

    let count = builder
        .build_query_scalar::<i64>()
        .fetch_one(executor)
        .await?;

    Ok(count)
}

/// Replace a client's profile fields.
///
/// Matching state and the candidate cache are left untouched. Gender cannot
/// change while the client is linked to a partner.
pub async fn update_profile<'a, A>(conn: A, id: i64, profile: &NewClient) -> Result<()>
where
    A: Acquire<'a, Database = Sqlite>,
{
    validate_client(profile)?;

    let mut conn = conn.acquire().await?;
    let result = sqlx::query(
        r#"
        UPDATE clients
        SET name = ?, gender = ?, age = ?, birth_year_month = ?, height = ?,
            education = ?, marital_status = ?, monthly_income = ?,
            house_status = ?, has_car = ?, avatar = ?,
            updated_at = datetime('now')
        WHERE id = ? AND (partner_id IS NULL OR gender = ?)
        "#,
    )
    .bind(profile.name.trim())
    .bind(profile.gender)
    .bind(profile.age)
    .bind(&profile.birth_year_month)
    .bind(profile.height)
    .bind(profile.education)
    .bind(profile.marital_status)
    .bind(profile.monthly_income)
    .bind(profile.house_status)
    .bind(profile.has_car)
    .bind(&profile.avatar)
    .bind(id)
    .bind(profile.gender)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(());
    }

    match find_client(&mut *conn, id).await? {
        Some(_) => Err(DatabaseError::InvalidState {
            entity: "Client",
            id: id.to_string(),
            reason: "gender cannot change while linked to a partner".to_string(),
        }),
        None => Err(DatabaseError::NotFound {
            entity: "Client",
            id: id.to_string(),
        }),
    }
}

/// Delete a client.
///
/// Clients that are matching or matched are never deleted.
pub async fn delete_client(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM clients
        WHERE id = ? AND status NOT IN ('matching', 'matched')
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(());
    }

    match find_client(pool, id).await? {
        Some(client) => Err(DatabaseError::InvalidState {
            entity: "Client",
            id: id.to_string(),
            reason: format!("status is {}", client.status),
        }),
        None => Err(DatabaseError::NotFound {
            entity: "Client",
            id: id.to_string(),
        }),
    }
}

/// Overwrite a client's candidate cache.
///
/// This is the only column the candidate pre-filter writes.
pub async fn update_candidate_cache<'e, E>(executor: E, id: i64, cache: &str) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE clients
        SET candidate_cache = ?, candidate_cache_updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(cache)
    .bind(id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Client",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Mark a single client as matched with `partner_id`.
///
/// Returns `false` when the client is no longer single or already has a
/// partner. Fails with [`DatabaseError::AlreadyExists`] when another client
/// already points at `partner_id`.
pub async fn link_partner<'e, E>(executor: E, id: i64, partner_id: i64) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE clients
        SET status = 'matched', partner_id = ?, updated_at = datetime('now')
        WHERE id = ? AND status = 'single' AND partner_id IS NULL
        "#,
    )
    .bind(partner_id)
    .bind(id)
    .execute(executor)
    .await
    .map_err(|e| DatabaseError::unique_or_sqlx(e, "Partner link", partner_id.to_string()))?;

    Ok(result.rows_affected() > 0)
}

/// Return a client to single, provided it is still linked to `partner_id`.
///
/// Returns `false` when the client has moved on to someone else.
pub async fn release_partner<'e, E>(executor: E, id: i64, partner_id: i64) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE clients
        SET status = 'single', partner_id = NULL, updated_at = datetime('now')
        WHERE id = ? AND partner_id = ?
        "#,
    )
    .bind(id)
    .bind(partner_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Switch an unlinked client between single and stopped.
pub async fn set_availability(pool: &SqlitePool, id: i64, status: ClientStatus) -> Result<()> {
    if !matches!(status, ClientStatus::Single | ClientStatus::Stopped) {
        return Err(DatabaseError::InvalidState {
            entity: "Client",
            id: id.to_string(),
            reason: format!("availability cannot be set to {}", status),
        });
    }

    let result = sqlx::query(
        r#"
        UPDATE clients
        SET status = ?, updated_at = datetime('now')
        WHERE id = ? AND partner_id IS NULL AND status IN ('single', 'stopped')
        "#,
    )
    .bind(status)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(());
    }

    match find_client(pool, id).await? {
        Some(client) => Err(DatabaseError::InvalidState {
            entity: "Client",
            id: id.to_string(),
            reason: format!("status is {}", client.status),
        }),
        None => Err(DatabaseError::NotFound {
            entity: "Client",
            id: id.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HouseStatus, MaritalStatus};
    use crate::Database;

    async fn test_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn profile(name: &str, gender: Gender) -> NewClient {
        NewClient {
            age: 30,
            height: 170,
            education: 3,
            monthly_income: 9000,
            ..NewClient::new(name, gender)
        }
    }

    #[tokio::test]
    async fn test_client_crud() {
        let db = test_db().await;

        // Create
        let id = create_client(db.pool(), &profile("Alice", Gender::Female))
            .await
            .unwrap();

        // Read
        let fetched = get_client(db.pool(), id).await.unwrap();
        assert_eq!(fetched.name, "Alice");
        assert_eq!(fetched.status, ClientStatus::Single);
        assert!(fetched.partner_id.is_none());
        assert!(fetched.candidate_cache.is_none());

        // Update
        let updated = NewClient {
            house_status: HouseStatus::Owned,
            marital_status: MaritalStatus::Divorced,
            ..profile("Alice", Gender::Female)
        };
        update_profile(db.pool(), id, &updated).await.unwrap();
        let fetched = get_client(db.pool(), id).await.unwrap();
        assert_eq!(fetched.house_status, HouseStatus::Owned);
        assert_eq!(fetched.marital_status, MaritalStatus::Divorced);

        // Delete
        delete_client(db.pool(), id).await.unwrap();
        let result = get_client(db.pool(), id).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_profile() {
        let db = test_db().await;
        let bad = NewClient {
            education: 9,
            ..profile("Dan", Gender::Male)
        };
        let result = create_client(db.pool(), &bad).await;
        assert!(matches!(result, Err(DatabaseError::Invalid(_))));
        assert_eq!(count_clients(db.pool(), &ClientFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_with_filter_and_pagination() {
        let db = test_db().await;
        let mut women = Vec::new();
        for i in 0..5 {
            women.push(
                create_client(db.pool(), &profile(&format!("W{i}"), Gender::Female))
                    .await
                    .unwrap(),
            );
        }
        let man = create_client(db.pool(), &profile("M", Gender::Male))
            .await
            .unwrap();

        let filter = ClientFilter::single(Gender::Female);
        let first = list_clients(db.pool(), &filter, Pagination::first(3))
            .await
            .unwrap();
        assert_eq!(first.len(), 3);
        assert!(first.iter().all(|c| c.gender == Gender::Female));

        let rest = list_clients(
            db.pool(),
            &ClientFilter {
                after_id: Some(first[2].id),
                ..filter.clone()
            },
            Pagination::first(10),
        )
        .await
        .unwrap();
        assert_eq!(rest.len(), 2);

        let excluding = ClientFilter {
            exclude_id: Some(women[0]),
            ..filter.clone()
        };
        assert_eq!(count_clients(db.pool(), &excluding).await.unwrap(), 4);

        let men = list_clients(db.pool(), &ClientFilter::single(Gender::Male), Pagination::default())
            .await
            .unwrap();
        assert_eq!(men.len(), 1);
        assert_eq!(men[0].id, man);
    }

    #[tokio::test]
    async fn test_second_partner_assignment_is_rejected() {
        let db = test_db().await;
        let a = create_client(db.pool(), &profile("A", Gender::Male)).await.unwrap();
        let b = create_client(db.pool(), &profile("B", Gender::Female)).await.unwrap();
        let c = create_client(db.pool(), &profile("C", Gender::Male)).await.unwrap();

        assert!(link_partner(db.pool(), a, b).await.unwrap());

        // C is single and unlinked, but B is already taken.
        let result = link_partner(db.pool(), c, b).await;
        assert!(matches!(result, Err(DatabaseError::AlreadyExists { .. })));

        let c_row = get_client(db.pool(), c).await.unwrap();
        assert_eq!(c_row.status, ClientStatus::Single);
        assert!(c_row.partner_id.is_none());
    }

    #[tokio::test]
    async fn test_linked_client_keeps_gender() {
        let db = test_db().await;
        let a = create_client(db.pool(), &profile("A", Gender::Male)).await.unwrap();
        let b = create_client(db.pool(), &profile("B", Gender::Female)).await.unwrap();
        assert!(link_partner(db.pool(), a, b).await.unwrap());
        assert!(link_partner(db.pool(), b, a).await.unwrap());

        let result = update_profile(db.pool(), a, &profile("A", Gender::Female)).await;
        assert!(matches!(result, Err(DatabaseError::InvalidState { .. })));
        assert_eq!(get_client(db.pool(), a).await.unwrap().gender, Gender::Male);

        // Other fields stay editable while linked.
        let taller = NewClient {
            height: 182,
            ..profile("A", Gender::Male)
        };
        update_profile(db.pool(), a, &taller).await.unwrap();
        assert_eq!(get_client(db.pool(), a).await.unwrap().height, 182);

        // Once released, the gender may be corrected.
        assert!(release_partner(db.pool(), a, b).await.unwrap());
        update_profile(db.pool(), a, &profile("A", Gender::Female)).await.unwrap();
        assert_eq!(get_client(db.pool(), a).await.unwrap().gender, Gender::Female);

        let result = update_profile(db.pool(), 9999, &taller).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_link_requires_single() {
        let db = test_db().await;
        let a = create_client(db.pool(), &profile("A", Gender::Male)).await.unwrap();
        let b = create_client(db.pool(), &profile("B", Gender::Female)).await.unwrap();
        let d = create_client(db.pool(), &profile("D", Gender::Female)).await.unwrap();

        assert!(link_partner(db.pool(), a, b).await.unwrap());
        assert!(!link_partner(db.pool(), a, d).await.unwrap());

        // Releasing against the wrong partner is a no-op.
        assert!(!release_partner(db.pool(), a, d).await.unwrap());
        assert!(release_partner(db.pool(), a, b).await.unwrap());

        let a_row = get_client(db.pool(), a).await.unwrap();
        assert_eq!(a_row.status, ClientStatus::Single);
        assert!(a_row.partner_id.is_none());
    }

    #[tokio::test]
    async fn test_delete_refuses_matched_client() {
        let db = test_db().await;
        let a = create_client(db.pool(), &profile("A", Gender::Male)).await.unwrap();
        let b = create_client(db.pool(), &profile("B", Gender::Female)).await.unwrap();
        link_partner(db.pool(), a, b).await.unwrap();

        let result = delete_client(db.pool(), a).await;
        assert!(matches!(result, Err(DatabaseError::InvalidState { .. })));

        let result = delete_client(db.pool(), 9999).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_candidate_cache_only_touches_cache() {
        let db = test_db().await;
        let id = create_client(db.pool(), &profile("A", Gender::Male)).await.unwrap();
        let before = get_client(db.pool(), id).await.unwrap();

        update_candidate_cache(db.pool(), id, "[]").await.unwrap();

        let after = get_client(db.pool(), id).await.unwrap();
        assert_eq!(after.candidate_cache.as_deref(), Some("[]"));
        assert!(after.candidate_cache_updated_at.is_some());
        assert_eq!(after.status, before.status);
        assert_eq!(after.partner_id, before.partner_id);
        assert_eq!(after.name, before.name);

        let result = update_candidate_cache(db.pool(), 4242, "[]").await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_set_availability() {
        let db = test_db().await;
        let a = create_client(db.pool(), &profile("A", Gender::Male)).await.unwrap();
        let b = create_client(db.pool(), &profile("B", Gender::Female)).await.unwrap();

        set_availability(db.pool(), a, ClientStatus::Stopped).await.unwrap();
        assert_eq!(get_client(db.pool(), a).await.unwrap().status, ClientStatus::Stopped);
        set_availability(db.pool(), a, ClientStatus::Single).await.unwrap();

        let result = set_availability(db.pool(), a, ClientStatus::Matched).await;
        assert!(matches!(result, Err(DatabaseError::InvalidState { .. })));

        link_partner(db.pool(), b, a).await.unwrap();
        let result = set_availability(db.pool(), b, ClientStatus::Stopped).await;
        assert!(matches!(result, Err(DatabaseError::InvalidState { .. })));
    }
}
