//! Engine settings loaded from environment variables.

use std::env;
use std::time::Duration;

use crate::scoring::QuickHeuristic;

/// Lease key guarding the candidate pre-filter.
pub const PREFILTER_LOCK_KEY: &str = "lock:prefilter";

/// Settings for the batch candidate pre-filter.
#[derive(Debug, Clone)]
pub struct PrefilterSettings {
    /// Maximum candidates fetched per client.
    pub pool_limit: usize,
    /// Entries kept in each client's cache.
    pub top_n: usize,
    /// Single clients loaded per page while walking the client base.
    pub page_size: usize,
    /// How long a lease survives without being released.
    pub lock_ttl: Duration,
    /// Upper bound of the tie-breaking jitter added to each score.
    pub max_jitter: i32,
}

impl Default for PrefilterSettings {
    fn default() -> Self {
        Self {
            pool_limit: 100,
            top_n: 20,
            page_size: 200,
            lock_ttl: Duration::from_secs(30 * 60),
            max_jitter: 5,
        }
    }
}

/// Settings for on-demand recommendations.
#[derive(Debug, Clone)]
pub struct RecommendSettings {
    /// Maximum candidates scored when the cache cannot be used.
    pub pool_limit: usize,
}

impl Default for RecommendSettings {
    fn default() -> Self {
        Self { pool_limit: 100 }
    }
}

/// All engine settings.
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub prefilter: PrefilterSettings,
    pub recommend: RecommendSettings,
}

impl EngineSettings {
    /// Load settings from environment variables, keeping defaults for
    /// anything unset or unparseable.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `MATCH_PREFILTER_POOL_LIMIT` | 100 |
    /// | `MATCH_PREFILTER_TOP_N` | 20 |
    /// | `MATCH_PREFILTER_PAGE_SIZE` | 200 |
    /// | `MATCH_PREFILTER_LOCK_TTL_SECS` | 1800 |
    /// | `MATCH_PREFILTER_JITTER` | 5 |
    /// | `MATCH_RECOMMEND_POOL_LIMIT` | 100 |
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Some(value) = env_usize("MATCH_PREFILTER_POOL_LIMIT") {
            settings.prefilter.pool_limit = value.max(1);
        }
        if let Some(value) = env_usize("MATCH_PREFILTER_TOP_N") {
            settings.prefilter.top_n = value.max(1);
        }
        if let Some(value) = env_usize("MATCH_PREFILTER_PAGE_SIZE") {
            settings.prefilter.page_size = value.max(1);
        }
        if let Some(secs) = env_u64("MATCH_PREFILTER_LOCK_TTL_SECS") {
            settings.prefilter.lock_ttl = Duration::from_secs(secs.max(1));
        }
        if let Some(value) = env_usize("MATCH_PREFILTER_JITTER") {
            settings.prefilter.max_jitter = i32::try_from(value)
                .unwrap_or(i32::MAX)
                .min(QuickHeuristic::MAX_JITTER);
        }
        if let Some(value) = env_usize("MATCH_RECOMMEND_POOL_LIMIT") {
            settings.recommend.pool_limit = value.max(1);
        }

        settings
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok()?.parse().ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok()?.parse().ok()
}

/// Turn a bare file path into a SQLite URL.
pub fn sqlite_url_from_path(path: &str) -> String {
    if path.starts_with("sqlite:") {
        path.to_string()
    } else {
        format!("sqlite:{}?mode=rwc", path)
    }
}
