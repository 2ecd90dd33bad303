//! Weighted five-factor compatibility formula.

use chrono::NaiveDate;
use database::{Client, MaritalStatus};

use super::{tags, MatchScore, ScoringStrategy};
use crate::profile::{by_gender, effective_age, today};

const BASE: f64 = 50.0;

const BASIC_WEIGHT: f64 = 0.40;
const AGE_WEIGHT: f64 = 0.20;
const EDUCATION_WEIGHT: f64 = 0.15;
const INCOME_WEIGHT: f64 = 0.15;
const ASSET_WEIGHT: f64 = 0.10;

/// Height gap (cm) with the extra bonus when the man is taller.
const OPTIMAL_HEIGHT_GAP: std::ops::RangeInclusive<i32> = 10..=20;

/// Age gap (years) with the extra bonus when the man is older.
const OPTIMAL_AGE_GAP: std::ops::RangeInclusive<i32> = 1..=5;

/// Midpoint of the income factor's range, used when income is unknown.
const INCOME_NEUTRAL: i32 = 5;

/// Precise compatibility scorer.
///
/// Symmetric in its arguments and deterministic for a given reference date.
#[derive(Debug, Clone)]
pub struct WeightedScorer {
    today: NaiveDate,
}

impl WeightedScorer {
    /// Scorer that resolves ages against today's date.
    pub fn new() -> Self {
        Self::with_reference_date(today())
    }

    pub fn with_reference_date(today: NaiveDate) -> Self {
        Self { today }
    }

    fn ages(&self, a: &Client, b: &Client) -> Option<(i32, i32)> {
        Some((effective_age(a, self.today)?, effective_age(b, self.today)?))
    }
}

impl Default for WeightedScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoringStrategy for WeightedScorer {
    fn name(&self) -> &'static str {
        "weighted"
    }

    fn score(&self, client: &Client, candidate: &Client) -> MatchScore {
        let (a, b) = (client, candidate);

        let total = BASE
            + BASIC_WEIGHT * f64::from(basic_fit(a, b))
            + AGE_WEIGHT * f64::from(self.age_fit(a, b))
            + EDUCATION_WEIGHT * f64::from(education_fit(a, b))
            + INCOME_WEIGHT * f64::from(income_fit(a, b))
            + ASSET_WEIGHT * f64::from(asset_fit(a, b));

        let score = (total.round() as i32).clamp(0, 100);
        MatchScore::new(score, self.tags(a, b))
    }
}

impl WeightedScorer {
    /// Older-man convention with an optimal band; unknown ages are neutral.
    fn age_fit(&self, a: &Client, b: &Client) -> i32 {
        let Some((man, woman)) = by_gender(a, b) else {
            return 0;
        };
        let Some((man_age, woman_age)) = self.ages(man, woman) else {
            return 0;
        };

        let gap = (man_age - woman_age).abs();
        if man_age >= woman_age {
            if gap > 12 {
                -20
            } else if OPTIMAL_AGE_GAP.contains(&gap) {
                30
            } else {
                20
            }
        } else if gap <= 3 {
            5
        } else if gap > 8 {
            -20
        } else {
            -5
        }
    }

    fn tags(&self, a: &Client, b: &Client) -> Vec<&'static str> {
        let mut out = Vec::new();

        if let Some((age_a, age_b)) = self.ages(a, b) {
            if (age_a - age_b).abs() <= 3 {
                out.push(tags::SIMILAR_AGE);
            }
        }
        if a.education > 0 && b.education > 0 && (a.education - b.education).abs() <= 1 {
            out.push(tags::COMPARABLE_EDUCATION);
        }
        if let Some((man, woman)) = by_gender(a, b) {
            if known_heights(man, woman)
                && OPTIMAL_HEIGHT_GAP.contains(&(man.height - woman.height))
            {
                out.push(tags::HEIGHT_MATCH);
            }
        }
        if a.marital_status == b.marital_status {
            out.push(tags::SAME_MARITAL_BACKGROUND);
        }
        if income_ratio(a, b).is_some_and(|ratio| ratio <= 0.3) {
            out.push(tags::SIMILAR_INCOME);
        }
        if a.house_status.owns_home() && b.house_status.owns_home() {
            out.push(tags::BOTH_OWN_PROPERTY);
        }
        if a.has_car && b.has_car {
            out.push(tags::BOTH_OWN_CAR);
        }

        out
    }
}

fn known_heights(man: &Client, woman: &Client) -> bool {
    man.height > 0 && woman.height > 0
}

/// Taller-man convention and marital background.
fn basic_fit(a: &Client, b: &Client) -> i32 {
    let mut score = 0;

    if let Some((man, woman)) = by_gender(a, b) {
        if known_heights(man, woman) && man.height > woman.height {
            score += 20;
            if OPTIMAL_HEIGHT_GAP.contains(&(man.height - woman.height)) {
                score += 10;
            }
        }
    }

    let never_married_a = a.marital_status == MaritalStatus::Unmarried;
    let never_married_b = b.marital_status == MaritalStatus::Unmarried;
    if a.marital_status == b.marital_status {
        score += 15;
    } else if never_married_a != never_married_b {
        score -= 5;
    }

    score
}

fn education_fit(a: &Client, b: &Client) -> i32 {
    if a.education <= 0 || b.education <= 0 {
        return 0;
    }

    match (a.education - b.education).abs() {
        0 => 30,
        1 => 15,
        2 => 0,
        _ => -15,
    }
}

/// Relative income gap `(max - min) / max`, if both incomes are known.
fn income_ratio(a: &Client, b: &Client) -> Option<f64> {
    if a.monthly_income <= 0 || b.monthly_income <= 0 {
        return None;
    }
    let max = a.monthly_income.max(b.monthly_income) as f64;
    let min = a.monthly_income.min(b.monthly_income) as f64;
    Some((max - min) / max)
}

fn income_fit(a: &Client, b: &Client) -> i32 {
    match income_ratio(a, b) {
        None => INCOME_NEUTRAL,
        Some(r) if r <= 0.3 => 30,
        Some(r) if r <= 0.5 => 15,
        Some(r) if r <= 0.8 => -10,
        Some(_) => -20,
    }
}

fn asset_fit(a: &Client, b: &Client) -> i32 {
    let mut score = 0;

    match (a.house_status.owns_home(), b.house_status.owns_home()) {
        (true, true) => score += 20,
        (true, false) | (false, true) => score += 10,
        (false, false) => {}
    }
    match (a.has_car, b.has_car) {
        (true, true) => score += 10,
        (true, false) | (false, true) => score += 5,
        (false, false) => {}
    }

    score
}
