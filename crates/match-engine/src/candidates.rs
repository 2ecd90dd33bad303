//! Ranked candidate lists and the on-demand recommendation path.
//!
//! The pre-filter stores a ranked list on each single client. That list is a
//! best-effort cache: it may be missing, empty, corrupt or out of date, and
//! [`Recommender`] falls back to scoring the pool directly when it is.

use std::cmp::Reverse;

use chrono::NaiveDate;
use database::{client, Client, ClientFilter, ClientStatus, Database, Pagination};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RecommendSettings;
use crate::error::{MatchError, Result};
use crate::profile::{effective_age, is_opposite_gender, today};
use crate::scoring::{MatchScore, ScoringStrategy, WeightedScorer};

/// One scored candidate, as cached on a client or returned on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateScoreEntry {
    pub candidate_id: i64,
    pub name: String,
    pub avatar: Option<String>,
    pub score: i32,
    pub tags: Vec<String>,
    /// Resolved age; 0 when unknown.
    pub age: i32,
    pub height: i32,
    pub education: i32,
}

impl CandidateScoreEntry {
    pub fn new(candidate: &Client, result: MatchScore, today: NaiveDate) -> Self {
        Self {
            candidate_id: candidate.id,
            name: candidate.name.clone(),
            avatar: candidate.avatar.clone(),
            score: result.score,
            tags: result.tags,
            age: effective_age(candidate, today).unwrap_or(0),
            height: candidate.height,
            education: candidate.education,
        }
    }
}

/// Score every candidate against `client` and keep the best `top_n`,
/// highest score first.
pub fn rank_candidates(
    strategy: &dyn ScoringStrategy,
    client: &Client,
    candidates: &[Client],
    top_n: usize,
    today: NaiveDate,
) -> Vec<CandidateScoreEntry> {
    let mut ranked: Vec<CandidateScoreEntry> = candidates
        .iter()
        .filter(|candidate| candidate.id != client.id)
        .map(|candidate| {
            CandidateScoreEntry::new(candidate, strategy.score(client, candidate), today)
        })
        .collect();

    ranked.sort_by_key(|entry| Reverse(entry.score));
    ranked.truncate(top_n);
    ranked
}

/// Serialize a ranked list for the candidate cache column.
pub fn encode_cache(entries: &[CandidateScoreEntry]) -> Result<String> {
    Ok(serde_json::to_string(entries)?)
}

/// Parse a cached list. Missing or corrupt caches yield `None`.
pub fn decode_cache(raw: Option<&str>) -> Option<Vec<CandidateScoreEntry>> {
    let raw = raw?;
    match serde_json::from_str(raw) {
        Ok(entries) => Some(entries),
        Err(err) => {
            warn!("Ignoring unreadable candidate cache: {}", err);
            None
        }
    }
}

/// Where a recommendation list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Cache,
    Computed,
}

/// Candidates for one client.
#[derive(Debug, Clone)]
pub struct Recommendations {
    pub source: CandidateSource,
    pub entries: Vec<CandidateScoreEntry>,
}

/// Serves candidate lists to staff, preferring the pre-computed cache.
#[derive(Debug, Clone)]
pub struct Recommender {
    database: Database,
    settings: RecommendSettings,
}

impl Recommender {
    pub fn new(database: Database, settings: RecommendSettings) -> Self {
        Self { database, settings }
    }

    /// Candidates for `client_id`, at most `limit`, best first.
    ///
    /// Cached entries whose candidate is gone or no longer single are dropped.
    /// When nothing usable remains the list is computed with the weighted
    /// scorer.
    pub async fn candidates_for(&self, client_id: i64, limit: usize) -> Result<Recommendations> {
        let subject = client::get_client(self.database.pool(), client_id).await?;

        if let Some(cached) = decode_cache(subject.candidate_cache.as_deref()) {
            let mut entries = Vec::with_capacity(cached.len().min(limit));
            for entry in cached {
                if entries.len() >= limit {
                    break;
                }
                if self.still_available(&subject, entry.candidate_id).await? {
                    entries.push(entry);
                }
            }

            if !entries.is_empty() {
                debug!(client_id, count = entries.len(), "Serving candidates from cache");
                return Ok(Recommendations {
                    source: CandidateSource::Cache,
                    entries,
                });
            }
        }

        debug!(client_id, "Candidate cache unusable, computing on demand");
        let pool = client::list_clients(
            self.database.pool(),
            &ClientFilter {
                exclude_id: Some(subject.id),
                ..ClientFilter::single(subject.gender.opposite())
            },
            Pagination::first(self.settings.pool_limit as i64),
        )
        .await?;

        Ok(Recommendations {
            source: CandidateSource::Computed,
            entries: rank_candidates(&WeightedScorer::new(), &subject, &pool, limit, today()),
        })
    }

    /// Precise score for one pair.
    pub async fn score_pair(&self, client_id: i64, candidate_id: i64) -> Result<MatchScore> {
        let subject = client::get_client(self.database.pool(), client_id).await?;
        let candidate = client::get_client(self.database.pool(), candidate_id).await?;

        if !is_opposite_gender(&subject, &candidate) {
            return Err(MatchError::Validation(
                "clients must be of opposite genders".to_string(),
            ));
        }

        Ok(WeightedScorer::new().score(&subject, &candidate))
    }

    async fn still_available(&self, subject: &Client, candidate_id: i64) -> Result<bool> {
        let candidate = client::find_client(self.database.pool(), candidate_id).await?;
        Ok(candidate.is_some_and(|c| {
            c.status == ClientStatus::Single && is_opposite_gender(subject, &c)
        }))
    }
}
