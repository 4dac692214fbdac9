use crate::limits::{DEFAULT_DURATION_MIN, MAX_CHAIN_LEN, MAX_SEGMENT_MIN};
use crate::model::Min;

/// Tunables shared by every query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Duration for services with neither pricing nor catalog duration.
    pub default_duration_min: Min,
    /// Id or name of the closing service appended when a chain needs one.
    pub finishing_service: Option<String>,
    pub max_chain_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_duration_min: DEFAULT_DURATION_MIN,
            finishing_service: None,
            max_chain_len: MAX_CHAIN_LEN,
        }
    }
}

impl EngineConfig {
    /// Read `SALONCHAIN_*` variables. Unparseable values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let default_duration_min = lookup("SALONCHAIN_DEFAULT_DURATION_MIN")
            .and_then(|s| parse_or_warn::<Min>("SALONCHAIN_DEFAULT_DURATION_MIN", &s))
            .filter(|d| (1..=MAX_SEGMENT_MIN).contains(d))
            .unwrap_or(defaults.default_duration_min);

        let finishing_service = lookup("SALONCHAIN_FINISHING_SERVICE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let max_chain_len = lookup("SALONCHAIN_MAX_CHAIN_LEN")
            .and_then(|s| parse_or_warn::<usize>("SALONCHAIN_MAX_CHAIN_LEN", &s))
            .filter(|n| *n > 0)
            .map_or(defaults.max_chain_len, |n| n.min(MAX_CHAIN_LEN));

        Self {
            default_duration_min,
            finishing_service,
            max_chain_len,
        }
    }
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T> {
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        tracing::warn!("ignoring invalid {key}={raw:?}, using default");
    }
    parsed
}
