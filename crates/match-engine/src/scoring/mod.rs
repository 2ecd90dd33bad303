//! Compatibility scoring.
//!
//! Two strategies share the [`ScoringStrategy`] capability:
//!
//! - [`WeightedScorer`]: the precise five-factor formula used for on-demand
//!   recommendations and for the score stored on a confirmed match.
//! - [`QuickHeuristic`]: a cheaper client-to-candidate heuristic with random
//!   jitter, used by the batch pre-filter across the whole client base.
//!
//! The two produce different numbers for the same pair. That difference is a
//! precision/throughput trade-off, not drift, and is kept in one place here.

mod quick;
mod weighted;

pub use quick::QuickHeuristic;
pub use weighted::WeightedScorer;

use database::Client;
use serde::{Deserialize, Serialize};

/// Human-readable reasons attached to a score.
pub mod tags {
    pub const SIMILAR_AGE: &str = "similar age";
    pub const COMPARABLE_EDUCATION: &str = "comparable education";
    pub const HEIGHT_MATCH: &str = "height match";
    pub const SAME_MARITAL_BACKGROUND: &str = "same marital background";
    pub const SIMILAR_INCOME: &str = "similar income";
    pub const BOTH_OWN_PROPERTY: &str = "both own property";
    pub const BOTH_OWN_CAR: &str = "both own a car";
    /// Used when no positive signal fires.
    pub const WORTH_TRYING: &str = "worth trying";
}

/// A way of scoring how well `candidate` suits `client`.
pub trait ScoringStrategy: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    /// Score the pair. Never mutates its inputs.
    fn score(&self, client: &Client, candidate: &Client) -> MatchScore;
}

/// A compatibility score with the reasons behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScore {
    /// 0-100.
    pub score: i32,
    pub tags: Vec<String>,
}

impl MatchScore {
    pub(crate) fn new(score: i32, mut tags: Vec<&'static str>) -> Self {
        if tags.is_empty() {
            tags.push(tags::WORTH_TRYING);
        }
        Self {
            score,
            tags: tags.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn level(&self) -> MatchLevel {
        MatchLevel::from_score(self.score)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Display bucket for a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchLevel {
    Perfect,
    Good,
    Average,
    Poor,
}

impl MatchLevel {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 85 => MatchLevel::Perfect,
            s if s >= 70 => MatchLevel::Good,
            s if s >= 55 => MatchLevel::Average,
            _ => MatchLevel::Poor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchLevel::Perfect => "perfect",
            MatchLevel::Good => "good",
            MatchLevel::Average => "average",
            MatchLevel::Poor => "poor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_buckets() {
        assert_eq!(MatchLevel::from_score(100), MatchLevel::Perfect);
        assert_eq!(MatchLevel::from_score(85), MatchLevel::Perfect);
        assert_eq!(MatchLevel::from_score(84), MatchLevel::Good);
        assert_eq!(MatchLevel::from_score(70), MatchLevel::Good);
        assert_eq!(MatchLevel::from_score(55), MatchLevel::Average);
        assert_eq!(MatchLevel::from_score(54), MatchLevel::Poor);
        assert_eq!(MatchLevel::from_score(0), MatchLevel::Poor);
        assert_eq!(MatchLevel::from_score(72).as_str(), "good");
    }

    #[test]
    fn test_fallback_tag() {
        let score = MatchScore::new(50, Vec::new());
        assert_eq!(score.tags, vec![tags::WORTH_TRYING.to_string()]);

        let score = MatchScore::new(80, vec![tags::SIMILAR_AGE]);
        assert!(score.has_tag(tags::SIMILAR_AGE));
        assert!(!score.has_tag(tags::WORTH_TRYING));
    }
}
