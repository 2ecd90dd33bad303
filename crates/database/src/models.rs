//! Database models.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Binary gender as recorded at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// The gender a client of this gender is paired with.
    pub fn opposite(self) -> Self {
        match self {
            Gender::Male => Gender::Female,
            Gender::Female => Gender::Male,
        }
    }
}

/// Marital background of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MaritalStatus {
    Unmarried,
    Married,
    Divorced,
    Widowed,
}

/// Housing situation of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum HouseStatus {
    None,
    Owned,
    Mortgaged,
}

impl HouseStatus {
    /// Owned and mortgaged homes both count as owning property.
    pub fn owns_home(&self) -> bool {
        matches!(self, HouseStatus::Owned | HouseStatus::Mortgaged)
    }
}

/// Availability of a client for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ClientStatus {
    Single,
    Matching,
    Matched,
    Stopped,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Single => "single",
            ClientStatus::Matching => "matching",
            ClientStatus::Matched => "matched",
            ClientStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a match record, in lifecycle order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MatchStatus {
    Acquaintance,
    Dating,
    Matched,
    Married,
    Broken,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Acquaintance => "acquaintance",
            MatchStatus::Dating => "dating",
            MatchStatus::Matched => "matched",
            MatchStatus::Married => "married",
            MatchStatus::Broken => "broken",
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Married | MatchStatus::Broken)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client registered with the agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Client {
    /// Auto-incrementing ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    pub gender: Gender,
    /// Age in years; 0 when not recorded.
    pub age: i32,
    /// Birth year and month as `YYYY-MM`, used when `age` is 0.
    pub birth_year_month: Option<String>,
    /// Height in centimetres; 0 when unknown.
    pub height: i32,
    /// Education ordinal 1-5; 0 when unknown.
    pub education: i32,
    pub marital_status: MaritalStatus,
    /// Monthly income; 0 when unknown.
    pub monthly_income: i64,
    pub house_status: HouseStatus,
    pub has_car: bool,
    /// Object-storage reference for the profile photo.
    pub avatar: Option<String>,
    pub status: ClientStatus,
    /// Current partner, if linked.
    pub partner_id: Option<i64>,
    /// JSON-encoded ranked candidate list written by the pre-filter.
    pub candidate_cache: Option<String>,
    /// When the candidate cache was last written.
    pub candidate_cache_updated_at: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

/// Profile fields supplied at intake or on edit.
///
/// Matching state (`status`, `partner_id`) and the candidate cache are not
/// part of a profile and cannot be set through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub gender: Gender,
    pub age: i32,
    pub birth_year_month: Option<String>,
    pub height: i32,
    pub education: i32,
    pub marital_status: MaritalStatus,
    pub monthly_income: i64,
    pub house_status: HouseStatus,
    pub has_car: bool,
    pub avatar: Option<String>,
}

impl NewClient {
    /// A minimal profile with every optional attribute unknown.
    pub fn new(name: impl Into<String>, gender: Gender) -> Self {
        Self {
            name: name.into(),
            gender,
            age: 0,
            birth_year_month: None,
            height: 0,
            education: 0,
            marital_status: MaritalStatus::Unmarried,
            monthly_income: 0,
            house_status: HouseStatus::None,
            has_car: false,
            avatar: None,
        }
    }
}

/// A proposed or realized pairing between two clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MatchRecord {
    /// Auto-incrementing ID.
    pub id: i64,
    pub male_client_id: i64,
    pub female_client_id: i64,
    /// Date the pairing was confirmed (`YYYY-MM-DD`).
    pub match_date: String,
    /// Compatibility score at confirmation time.
    pub match_score: i32,
    pub status: MatchStatus,
    pub remark: String,
    /// Administrator who confirmed the pairing.
    pub admin_id: String,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

impl MatchRecord {
    /// The other party of the pairing, if `client_id` is one of them.
    pub fn counterpart(&self, client_id: i64) -> Option<i64> {
        if client_id == self.male_client_id {
            Some(self.female_client_id)
        } else if client_id == self.female_client_id {
            Some(self.male_client_id)
        } else {
            None
        }
    }
}

/// An immutable audit row for one match status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StatusHistoryEntry {
    /// Auto-incrementing ID.
    pub id: i64,
    pub match_record_id: i64,
    pub old_status: MatchStatus,
    pub new_status: MatchStatus,
    /// Staff member who made the change.
    pub operator: String,
    pub reason: String,
    /// Creation timestamp.
    pub created_at: String,
}

/// A time-bounded lease held by a recurring job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct JobLock {
    pub lock_key: String,
    /// Token identifying the run holding the lease.
    pub holder: String,
    /// Unix timestamp (seconds) after which the lease may be taken over.
    pub expires_at: i64,
    pub acquired_at: String,
}
