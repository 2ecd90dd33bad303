//! Matching core for the Matchdesk back office.
//!
//! This crate provides:
//!
//! - [`scoring`] - The [`ScoringStrategy`] capability with a precise
//!   [`WeightedScorer`] and a cheap [`QuickHeuristic`]
//! - [`CandidatePrefilter`] - The recurring job that caches ranked candidates
//!   on every single client, guarded by a TTL lease
//! - [`Recommender`] - Candidate lists for staff, served from the cache with an
//!   on-demand fallback
//! - [`MatchLifecycle`] - Confirming pairings and moving them through
//!   `acquaintance -> dating -> matched -> married`, or `broken`
//!
//! # Example
//!
//! ```no_run
//! use database::{Database, MatchStatus};
//! use match_engine::{EngineSettings, MatchLifecycle, Recommender};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite:matchdesk.db?mode=rwc").await?;
//!     db.migrate().await?;
//!     let settings = EngineSettings::from_env();
//!
//!     let recommender = Recommender::new(db.clone(), settings.recommend);
//!     let candidates = recommender.candidates_for(1, 10).await?;
//!
//!     if let Some(best) = candidates.entries.first() {
//!         let lifecycle = MatchLifecycle::new(db.clone());
//!         let record = lifecycle.confirm(1, best.candidate_id, "admin-1", "").await?;
//!         lifecycle
//!             .update_status(
//!                 record.id,
//!                 MatchStatus::Acquaintance,
//!                 MatchStatus::Dating,
//!                 "Ms. Zhou",
//!                 "first date went well",
//!             )
//!             .await?;
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod candidates;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod prefilter;
pub mod profile;
pub mod scoring;

pub use candidates::{
    decode_cache, encode_cache, rank_candidates, CandidateScoreEntry, CandidateSource,
    Recommendations, Recommender,
};
pub use config::{EngineSettings, PrefilterSettings, RecommendSettings, PREFILTER_LOCK_KEY};
pub use error::{MatchError, Result};
pub use lifecycle::{can_transition, MatchLifecycle};
pub use prefilter::{CandidatePrefilter, PrefilterOutcome, PrefilterReport};
pub use profile::effective_age;
pub use scoring::{MatchLevel, MatchScore, QuickHeuristic, ScoringStrategy, WeightedScorer};
