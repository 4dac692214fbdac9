use crate::model::Min;

/// Minutes in a calendar day.
pub const MINUTES_PER_DAY: Min = 24 * 60;

/// Segment duration used when neither pricing nor catalog supply one.
pub const DEFAULT_DURATION_MIN: Min = 30;

/// Longest chain a single request may carry (primaries only).
pub const MAX_CHAIN_LEN: usize = 16;

/// Upper bound on candidate start times evaluated per query.
pub const MAX_CANDIDATES: usize = 24 * 60;

/// Upper bound on any single segment or wait gap.
pub const MAX_SEGMENT_MIN: Min = MINUTES_PER_DAY;
