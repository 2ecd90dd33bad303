//! Batch candidate pre-filter.
//!
//! Walks every single client, scores an opposite-gender candidate pool with
//! the quick heuristic, and writes the best entries into the client's
//! candidate cache. The cache column is the only thing this job writes.
//!
//! Runs are single-flight across processes sharing the database: each run
//! takes a TTL lease under [`PREFILTER_LOCK_KEY`] and skips if someone else
//! holds it. A crashed run's lease lapses on its own. The lease carries no
//! fencing token, so a run that stalls past its TTL can still overlap the
//! next one.

use chrono::Utc;
use database::{client, job_lock, Client, ClientFilter, ClientStatus, Database, Pagination};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::candidates::{encode_cache, rank_candidates};
use crate::config::{PrefilterSettings, PREFILTER_LOCK_KEY};
use crate::error::Result;
use crate::profile::today;
use crate::scoring::{QuickHeuristic, ScoringStrategy};

/// Counters for one completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefilterReport {
    /// Single clients visited.
    pub clients_seen: usize,
    /// Clients whose cache was rewritten.
    pub cached: usize,
    /// Clients skipped because of an error.
    pub failed: usize,
}

/// Result of a scheduled invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefilterOutcome {
    /// Another run holds the lease.
    Skipped,
    Completed(PrefilterReport),
}

/// The recurring candidate pre-filter job.
#[derive(Debug, Clone)]
pub struct CandidatePrefilter {
    database: Database,
    settings: PrefilterSettings,
}

impl CandidatePrefilter {
    pub fn new(database: Database, settings: PrefilterSettings) -> Self {
        Self { database, settings }
    }

    /// Lease key shared by every instance of this job.
    pub fn lock_key(&self) -> &'static str {
        PREFILTER_LOCK_KEY
    }

    /// Run one pass over all single clients.
    ///
    /// Returns [`PrefilterOutcome::Skipped`] without doing any work if another
    /// run holds the lease. The lease is released whether or not the pass
    /// succeeds.
    pub async fn run(&self) -> Result<PrefilterOutcome> {
        let holder = Uuid::new_v4().to_string();
        let acquired = job_lock::try_acquire(
            self.database.pool(),
            PREFILTER_LOCK_KEY,
            &holder,
            Utc::now().timestamp(),
            self.settings.lock_ttl,
        )
        .await?;

        if !acquired {
            info!(lock = PREFILTER_LOCK_KEY, "Pre-filter already running elsewhere, skipping");
            return Ok(PrefilterOutcome::Skipped);
        }

        info!(run = %holder, "Starting candidate pre-filter");
        let result = self.process_all().await;

        match job_lock::release(self.database.pool(), PREFILTER_LOCK_KEY, &holder).await {
            Ok(true) => {}
            Ok(false) => warn!(run = %holder, "Pre-filter lease expired before the run finished"),
            Err(err) => warn!(run = %holder, "Failed to release pre-filter lease: {}", err),
        }

        let report = result?;
        info!(
            run = %holder,
            seen = report.clients_seen,
            cached = report.cached,
            failed = report.failed,
            "Candidate pre-filter complete"
        );
        Ok(PrefilterOutcome::Completed(report))
    }

    async fn process_all(&self) -> Result<PrefilterReport> {
        let heuristic = QuickHeuristic::new(self.settings.max_jitter);
        let page_size = self.settings.page_size.max(1);
        let mut report = PrefilterReport::default();
        let mut after_id = None;

        loop {
            let page = client::list_clients(
                self.database.pool(),
                &ClientFilter {
                    status: Some(ClientStatus::Single),
                    after_id,
                    ..ClientFilter::default()
                },
                Pagination::first(page_size as i64),
            )
            .await?;

            let Some(last) = page.last() else {
                break;
            };
            after_id = Some(last.id);

            for subject in &page {
                report.clients_seen += 1;
                match self.process_client(&heuristic, subject).await {
                    Ok(count) => {
                        report.cached += 1;
                        debug!(client_id = subject.id, candidates = count, "Cached candidates");
                    }
                    Err(err) => {
                        report.failed += 1;
                        warn!(client_id = subject.id, "Skipping client in pre-filter: {}", err);
                    }
                }
            }

            if page.len() < page_size {
                break;
            }
        }

        Ok(report)
    }

    /// Rebuild one client's cache and return the number of entries written.
    async fn process_client(&self, strategy: &dyn ScoringStrategy, subject: &Client) -> Result<usize> {
        let candidates = client::list_clients(
            self.database.pool(),
            &ClientFilter {
                exclude_id: Some(subject.id),
                ..ClientFilter::single(subject.gender.opposite())
            },
            Pagination::first(self.settings.pool_limit as i64),
        )
        .await?;

        let ranked = rank_candidates(strategy, subject, &candidates, self.settings.top_n, today());
        let raw = encode_cache(&ranked)?;
        client::update_candidate_cache(self.database.pool(), subject.id, &raw).await?;

        Ok(ranked.len())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::candidates::decode_cache;
    use crate::scoring::tags;
    use database::{Gender, NewClient};

    async fn test_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn settings() -> PrefilterSettings {
        PrefilterSettings {
            max_jitter: 0,
            page_size: 4,
            ..PrefilterSettings::default()
        }
    }

    async fn add(db: &Database, name: &str, gender: Gender, age: i32, education: i32) -> i64 {
        let profile = NewClient {
            age,
            education,
            ..NewClient::new(name, gender)
        };
        client::create_client(db.pool(), &profile).await.unwrap()
    }

    async fn completed(prefilter: &CandidatePrefilter) -> PrefilterReport {
        match prefilter.run().await.unwrap() {
            PrefilterOutcome::Completed(report) => report,
            PrefilterOutcome::Skipped => panic!("run was skipped"),
        }
    }

    #[tokio::test]
    async fn test_cache_shape() {
        let db = test_db().await;
        let mut men = Vec::new();
        for i in 0..3 {
            men.push(add(&db, &format!("M{i}"), Gender::Male, 28 + i, 3).await);
        }
        for i in 0..25 {
            add(&db, &format!("W{i}"), Gender::Female, 22 + i, 1 + i % 5).await;
        }
        let stopped = add(&db, "Paused", Gender::Female, 29, 3).await;
        client::set_availability(db.pool(), stopped, ClientStatus::Stopped)
            .await
            .unwrap();
        let taken = add(&db, "Taken", Gender::Female, 29, 3).await;
        client::link_partner(db.pool(), taken, men[2]).await.unwrap();
        client::link_partner(db.pool(), men[2], taken).await.unwrap();

        let report = completed(&CandidatePrefilter::new(db.clone(), settings())).await;
        // 2 single men + 25 single women
        assert_eq!(report.clients_seen, 27);
        assert_eq!(report.cached, 27);
        assert_eq!(report.failed, 0);

        for man in &men[..2] {
            let row = client::get_client(db.pool(), *man).await.unwrap();
            let cache = decode_cache(row.candidate_cache.as_deref()).unwrap();
            assert_eq!(cache.len(), 20);
            assert!(cache.windows(2).all(|w| w[0].score >= w[1].score));

            for entry in &cache {
                let candidate = client::get_client(db.pool(), entry.candidate_id).await.unwrap();
                assert_eq!(candidate.gender, Gender::Female);
                assert_eq!(candidate.status, ClientStatus::Single);
                assert!((40..=99).contains(&entry.score));
            }
        }

        // The matched man was not visited and keeps his linkage.
        let matched = client::get_client(db.pool(), men[2]).await.unwrap();
        assert!(matched.candidate_cache.is_none());
        assert_eq!(matched.partner_id, Some(taken));

        // Women only see the two single men.
        let women = client::list_clients(
            db.pool(),
            &ClientFilter::single(Gender::Female),
            Pagination::first(1),
        )
        .await
        .unwrap();
        let row = client::get_client(db.pool(), women[0].id).await.unwrap();
        let cache = decode_cache(row.candidate_cache.as_deref()).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_heuristic_ranking_example() {
        let db = test_db().await;
        let a = add(&db, "A", Gender::Male, 30, 3).await;
        let c = add(&db, "C", Gender::Female, 40, 4).await;
        let b = add(&db, "B", Gender::Female, 28, 3).await;

        completed(&CandidatePrefilter::new(db.clone(), settings())).await;

        let row = client::get_client(db.pool(), a).await.unwrap();
        let cache = decode_cache(row.candidate_cache.as_deref()).unwrap();
        assert_eq!(cache.len(), 2);

        assert_eq!(cache[0].candidate_id, b);
        assert_eq!(cache[0].score, 95);
        assert!(cache[0].tags.iter().any(|t| t == tags::SIMILAR_AGE));
        assert!(cache[0].tags.iter().any(|t| t == tags::COMPARABLE_EDUCATION));

        assert_eq!(cache[1].candidate_id, c);
        assert!(cache[1].score < cache[0].score);
        assert!(cache[1].tags.iter().any(|t| t == tags::COMPARABLE_EDUCATION));
        assert!(!cache[1].tags.iter().any(|t| t == tags::SIMILAR_AGE));
    }

    #[tokio::test]
    async fn test_top_n_and_pool_limit() {
        let db = test_db().await;
        let man = add(&db, "M", Gender::Male, 30, 3).await;
        for i in 0..12 {
            add(&db, &format!("W{i}"), Gender::Female, 25 + i, 3).await;
        }

        let prefilter = CandidatePrefilter::new(
            db.clone(),
            PrefilterSettings {
                pool_limit: 8,
                top_n: 5,
                ..settings()
            },
        );
        completed(&prefilter).await;

        let row = client::get_client(db.pool(), man).await.unwrap();
        let cache = decode_cache(row.candidate_cache.as_deref()).unwrap();
        assert_eq!(cache.len(), 5);
    }

    #[tokio::test]
    async fn test_skips_when_lease_is_held() {
        let db = test_db().await;
        let man = add(&db, "M", Gender::Male, 30, 3).await;
        add(&db, "W", Gender::Female, 29, 3).await;

        job_lock::try_acquire(
            db.pool(),
            PREFILTER_LOCK_KEY,
            "other-instance",
            Utc::now().timestamp(),
            Duration::from_secs(1800),
        )
        .await
        .unwrap();

        let prefilter = CandidatePrefilter::new(db.clone(), settings());
        assert_eq!(prefilter.run().await.unwrap(), PrefilterOutcome::Skipped);

        let row = client::get_client(db.pool(), man).await.unwrap();
        assert!(row.candidate_cache.is_none());

        // The other instance's lease is left alone.
        let lock = job_lock::get_lock(db.pool(), PREFILTER_LOCK_KEY).await.unwrap().unwrap();
        assert_eq!(lock.holder, "other-instance");
    }

    #[tokio::test]
    async fn test_expired_lease_does_not_block() {
        let db = test_db().await;
        add(&db, "M", Gender::Male, 30, 3).await;

        job_lock::try_acquire(
            db.pool(),
            PREFILTER_LOCK_KEY,
            "crashed-run",
            Utc::now().timestamp() - 3600,
            Duration::from_secs(1800),
        )
        .await
        .unwrap();

        let prefilter = CandidatePrefilter::new(db.clone(), settings());
        let report = completed(&prefilter).await;
        assert_eq!(report.clients_seen, 1);

        // Released after completion.
        assert!(job_lock::get_lock(db.pool(), prefilter.lock_key())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_one_failing_client_does_not_abort_the_run() {
        let db = test_db().await;
        let broken = add(&db, "Broken", Gender::Male, 30, 3).await;
        let fine = add(&db, "Fine", Gender::Male, 31, 3).await;
        add(&db, "W", Gender::Female, 29, 3).await;

        let trigger = format!(
            "CREATE TRIGGER fail_cache BEFORE UPDATE OF candidate_cache ON clients \
             WHEN NEW.id = {broken} BEGIN SELECT RAISE(ABORT, 'disk full'); END"
        );
        sqlx::query(&trigger).execute(db.pool()).await.unwrap();

        let report = completed(&CandidatePrefilter::new(db.clone(), settings())).await;
        assert_eq!(report.clients_seen, 3);
        assert_eq!(report.cached, 2);
        assert_eq!(report.failed, 1);

        let row = client::get_client(db.pool(), fine).await.unwrap();
        assert!(row.candidate_cache.is_some());
        let row = client::get_client(db.pool(), broken).await.unwrap();
        assert!(row.candidate_cache.is_none());

        // Lease released even though a client failed.
        assert!(job_lock::get_lock(db.pool(), PREFILTER_LOCK_KEY)
            .await
            .unwrap()
            .is_none());
    }
}
