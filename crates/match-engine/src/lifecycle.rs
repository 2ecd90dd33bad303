//! Match lifecycle: confirming a pairing and moving it through its statuses.
//!
//! ```text
//! acquaintance -> dating -> matched -> married
//!       \            \          \
//!        +------------+----------+---> broken
//! ```
//!
//! `married` and `broken` are terminal. Every operation that writes runs in a
//! single transaction, so the record, both clients and the history row land
//! together or not at all.
//!
//! Concurrent confirms on the same clients are settled by the store: the
//! conditional partner updates and the unique index on `partner_id` let at
//! most one writer through, and the loser gets [`MatchError::Conflict`].
//! Status changes and deletes open with their conditional write and only read
//! afterwards. A loser either sees the winner's status or, if SQLite refuses
//! the lock outright, also gets [`MatchError::Conflict`].

use database::{
    client, match_record, status_history, Client, ClientStatus, Database, DatabaseError,
    MatchRecord, MatchStatus, NewMatchRecord, StatusHistoryEntry,
};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info, warn};

use crate::error::{MatchError, Result};
use crate::profile::by_gender;
use crate::scoring::{ScoringStrategy, WeightedScorer};

/// Whether a record may move from `from` to `to`.
///
/// Only the next forward step or an early break is allowed.
pub fn can_transition(from: MatchStatus, to: MatchStatus) -> bool {
    use MatchStatus::*;

    match (from, to) {
        (Acquaintance, Dating) | (Dating, Matched) | (Matched, Married) => true,
        (from, Broken) => !from.is_terminal(),
        _ => false,
    }
}

/// Manages match records and the partner linkage on clients.
#[derive(Debug, Clone)]
pub struct MatchLifecycle {
    database: Database,
}

impl MatchLifecycle {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Pair two single clients of opposite genders.
    ///
    /// Availability is checked up front so the common rejection never opens a
    /// transaction. The transaction then re-checks it through conditional
    /// updates; losing that race yields [`MatchError::Conflict`].
    pub async fn confirm(
        &self,
        client_a: i64,
        client_b: i64,
        admin_id: &str,
        remark: &str,
    ) -> Result<MatchRecord> {
        if client_a == client_b {
            return Err(MatchError::Validation(
                "a client cannot be matched with themselves".to_string(),
            ));
        }

        let a = client::get_client(self.database.pool(), client_a).await?;
        let b = client::get_client(self.database.pool(), client_b).await?;

        let Some((man, woman)) = by_gender(&a, &b) else {
            return Err(MatchError::Validation(
                "clients must be of opposite genders".to_string(),
            ));
        };

        for party in [man, woman] {
            if !is_available(party) {
                return Err(MatchError::AlreadyMatched {
                    client_id: party.id,
                });
            }
        }

        let score = WeightedScorer::new().score(man, woman);
        let record = NewMatchRecord {
            male_client_id: man.id,
            female_client_id: woman.id,
            match_score: score.score,
            remark: remark.to_string(),
            admin_id: admin_id.to_string(),
        };

        let mut tx = self.database.begin().await?;
        let result = confirm_in(&mut tx, &record).await;
        let id = finish(tx, result).await?;

        info!(
            record_id = id,
            male = man.id,
            female = woman.id,
            score = score.score,
            admin = admin_id,
            "Match confirmed"
        );

        Ok(match_record::get_match_record(self.database.pool(), id).await?)
    }

    /// Move a record from `expected` to `next` and log the transition.
    ///
    /// The write only applies while the stored status is still `expected`;
    /// otherwise the call fails with [`MatchError::StatusMismatch`]. Breaking
    /// a match also returns both clients to single.
    pub async fn update_status(
        &self,
        record_id: i64,
        expected: MatchStatus,
        next: MatchStatus,
        operator: &str,
        reason: &str,
    ) -> Result<MatchRecord> {
        let mut tx = self.database.begin().await?;
        let result = transition_in(&mut tx, record_id, expected, next, operator, reason).await;
        finish(tx, result).await?;

        info!(
            record_id,
            from = %expected,
            to = %next,
            operator,
            "Match status updated"
        );

        Ok(match_record::get_match_record(self.database.pool(), record_id).await?)
    }

    /// Break a match from whatever status it is in.
    ///
    /// Both clients become single again and can be matched anew.
    pub async fn dissolve(&self, record_id: i64, operator: &str, reason: &str) -> Result<MatchRecord> {
        let current = match_record::get_match_record(self.database.pool(), record_id).await?;
        self.update_status(record_id, current.status, MatchStatus::Broken, operator, reason)
            .await
    }

    /// Hard-delete a record entered by mistake.
    ///
    /// Both clients are reset to single, but only where they are still linked
    /// to each other. The record's history is deleted with it.
    pub async fn delete(&self, record_id: i64, operator: &str) -> Result<()> {
        let mut tx = self.database.begin().await?;
        let result = delete_in(&mut tx, record_id).await;
        finish(tx, result).await?;

        info!(record_id, operator, "Match record deleted");
        Ok(())
    }

    pub async fn get_record(&self, record_id: i64) -> Result<MatchRecord> {
        Ok(match_record::get_match_record(self.database.pool(), record_id).await?)
    }

    /// Every record involving a client, newest first.
    pub async fn records_for_client(&self, client_id: i64) -> Result<Vec<MatchRecord>> {
        Ok(match_record::list_for_client(self.database.pool(), client_id).await?)
    }

    /// Status transitions of a record, oldest first.
    pub async fn history(&self, record_id: i64) -> Result<Vec<StatusHistoryEntry>> {
        Ok(status_history::list_for_record(self.database.pool(), record_id).await?)
    }
}

fn is_available(client: &Client) -> bool {
    client.status == ClientStatus::Single && client.partner_id.is_none()
}

/// Commit on success, roll back on failure.
async fn finish<T>(tx: Transaction<'static, Sqlite>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(DatabaseError::from)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                warn!("Rollback failed: {}", rollback);
            }
            Err(err)
        }
    }
}

async fn confirm_in(tx: &mut Transaction<'static, Sqlite>, record: &NewMatchRecord) -> Result<i64> {
    let pairs = [
        (record.male_client_id, record.female_client_id),
        (record.female_client_id, record.male_client_id),
    ];
    for (id, partner_id) in pairs {
        if !client::link_partner(&mut **tx, id, partner_id).await? {
            return Err(MatchError::Conflict(format!(
                "client {} was taken by a concurrent match",
                id
            )));
        }
    }

    Ok(match_record::insert_match_record(&mut **tx, record).await?)
}

async fn transition_in(
    tx: &mut Transaction<'static, Sqlite>,
    record_id: i64,
    expected: MatchStatus,
    next: MatchStatus,
    operator: &str,
    reason: &str,
) -> Result<()> {
    // The first statement is the write, so the transaction never has to
    // upgrade a read lock that a concurrent writer is waiting on.
    if !can_transition(expected, next)
        || !match_record::update_status_if(&mut **tx, record_id, expected, next).await?
    {
        return Err(rejection(tx, record_id, expected, next).await);
    }

    status_history::append_entry(&mut **tx, record_id, expected, next, operator, reason).await?;

    if next == MatchStatus::Broken {
        let record = match_record::get_match_record(&mut **tx, record_id).await?;
        release_both(tx, &record).await?;
    }

    Ok(())
}

/// Explain why `expected -> next` was not applied to a record.
async fn rejection(
    tx: &mut Transaction<'static, Sqlite>,
    record_id: i64,
    expected: MatchStatus,
    next: MatchStatus,
) -> MatchError {
    let record = match match_record::get_match_record(&mut **tx, record_id).await {
        Ok(record) => record,
        Err(err) => return err.into(),
    };

    if record.status != expected {
        MatchError::StatusMismatch {
            expected,
            actual: record.status,
        }
    } else if !can_transition(record.status, next) {
        MatchError::IllegalTransition {
            from: record.status,
            to: next,
        }
    } else {
        MatchError::Conflict(format!("match record {} changed concurrently", record_id))
    }
}

async fn delete_in(tx: &mut Transaction<'static, Sqlite>, record_id: i64) -> Result<()> {
    let record = match_record::delete_match_record(&mut **tx, record_id).await?;
    release_both(tx, &record).await
}

async fn release_both(tx: &mut Transaction<'static, Sqlite>, record: &MatchRecord) -> Result<()> {
    let pairs = [
        (record.male_client_id, record.female_client_id),
        (record.female_client_id, record.male_client_id),
    ];
    for (id, partner_id) in pairs {
        if !client::release_partner(&mut **tx, id, partner_id).await? {
            debug!(client_id = id, record_id = record.id, "Client no longer linked to this match");
        }
    }
    Ok(())
}
