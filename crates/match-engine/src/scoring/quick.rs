//! Cheap client-to-candidate heuristic for the batch pre-filter.

use chrono::NaiveDate;
use database::Client;
use rand::Rng;

use super::{tags, MatchScore, ScoringStrategy};
use crate::profile::{by_gender, effective_age, today};

const BASE: i32 = 60;

/// A cheap heuristic never claims a perfect match nor drops below plausible.
const FLOOR: i32 = 40;
const CEILING: i32 = 99;

/// Fast heuristic scorer.
///
/// Asymmetric: education is judged from the client's side. A uniform jitter in
/// `0..=max_jitter` breaks ties and varies the ranking between runs.
#[derive(Debug, Clone)]
pub struct QuickHeuristic {
    today: NaiveDate,
    max_jitter: i32,
}

impl QuickHeuristic {
    /// Largest jitter accepted; anything above is capped.
    pub const MAX_JITTER: i32 = 20;

    pub fn new(max_jitter: i32) -> Self {
        Self::with_reference_date(today(), max_jitter)
    }

    pub fn with_reference_date(today: NaiveDate, max_jitter: i32) -> Self {
        Self {
            today,
            max_jitter: max_jitter.clamp(0, Self::MAX_JITTER),
        }
    }

    /// Score and tags before jitter and clamping.
    fn raw(&self, client: &Client, candidate: &Client) -> (i32, Vec<&'static str>) {
        let mut score = BASE;
        let mut out = Vec::new();

        let ages = effective_age(client, self.today).zip(effective_age(candidate, self.today));
        if let Some((client_age, candidate_age)) = ages {
            let gap = (client_age - candidate_age).abs();
            if gap <= 3 {
                score += 20;
                out.push(tags::SIMILAR_AGE);
            } else if gap <= 5 {
                score += 10;
            } else if gap > 10 {
                score -= 10;
            }
        }

        if client.education > 0 && candidate.education > 0 {
            if candidate.education >= client.education {
                score += 15;
                out.push(tags::COMPARABLE_EDUCATION);
            } else if client.education - candidate.education > 1 {
                score -= 5;
            }
        }

        if let Some((man, woman)) = by_gender(client, candidate) {
            if man.height > 0 && woman.height > 0 && man.height > woman.height {
                score += 5;
                out.push(tags::HEIGHT_MATCH);
            }
        }

        (score, out)
    }
}

impl Default for QuickHeuristic {
    fn default() -> Self {
        Self::new(5)
    }
}

impl ScoringStrategy for QuickHeuristic {
    fn name(&self) -> &'static str {
        "quick"
    }

    fn score(&self, client: &Client, candidate: &Client) -> MatchScore {
        let (mut score, out) = self.raw(client, candidate);
        if self.max_jitter > 0 {
            score = score.saturating_add(rand::thread_rng().gen_range(0..=self.max_jitter));
        }
        MatchScore::new(score.clamp(FLOOR, CEILING), out)
    }
}
