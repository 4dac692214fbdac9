use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Minutes since midnight of the snapshot date; the engine's only time unit.
pub type Min = i32;

/// Half-open interval `[start, end)` in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    #[serde(rename = "startMin")]
    pub start: Min,
    #[serde(rename = "endMin")]
    pub end: Min,
}

/// A working window for a day; same shape as any other span.
pub type TimeWindow = Span;

impl Span {
    pub fn new(start: Min, end: Min) -> Self {
        debug_assert!(start <= end, "Span start must not be after end");
        Self { start, end }
    }

    pub fn duration_min(&self) -> Min {
        self.end - self.start
    }

    /// Half-open comparison: spans that merely touch do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn intersect(&self, other: &Span) -> Option<Span> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then(|| Span::new(start, end))
    }
}

/// Parse `"HH:mm"` (or `"H:mm"`) into minutes since midnight. `"24:00"` is
/// accepted as end-of-day so closing times can express midnight.
pub fn parse_hhmm(s: &str) -> Option<Min> {
    let (h, m) = s.trim().split_once(':')?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    let h: Min = h.parse().ok()?;
    let m: Min = m.parse().ok()?;
    if !(0..60).contains(&m) || !(0..=24).contains(&h) || (h == 24 && m != 0) {
        return None;
    }
    Some(h * 60 + m)
}

pub fn format_hhmm(minutes: Min) -> String {
    format!("{:02}:{:02}", minutes.div_euclid(60), minutes.rem_euclid(60))
}

/// Absolute instant for a minute offset on `date`.
pub fn at_minute(date: NaiveDate, minutes: Min) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(minutes))
}

/// Minute offset of `instant` relative to midnight of `date` (may exceed a day).
pub fn minute_of_day(date: NaiveDate, instant: NaiveDateTime) -> Min {
    (instant - date.and_time(NaiveTime::MIN)).num_minutes() as Min
}

/// Lowercased, whitespace-collapsed form used for name matching.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn default_true() -> bool {
    true
}

// ── Catalog ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakRange {
    pub start: String,
    pub end: String,
}

impl BreakRange {
    /// `None` when either bound is malformed or the range is empty.
    pub fn span(&self) -> Option<Span> {
        let start = parse_hhmm(&self.start)?;
        let end = parse_hhmm(&self.end)?;
        (start < end).then(|| Span::new(start, end))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    /// Catalog duration in minutes; 0 when not configured.
    #[serde(default)]
    pub duration: Min,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub requires_finish: bool,
    #[serde(default)]
    pub finish_gap_minutes: Option<Min>,
}

/// Second phase of a two-part service, separated by an idle wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
    pub name: String,
    #[serde(default)]
    pub service_id: Option<String>,
    pub duration_minutes: Min,
    #[serde(default)]
    pub wait_minutes: Min,
}

impl FollowUp {
    /// Identity used to collapse identical follow-ups within one chain.
    pub fn dedup_key(&self) -> String {
        match self.service_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => format!("id:{id}"),
            _ => format!("name:{}", normalize_name(&self.name)),
        }
    }

    /// True if this follow-up refers to the given catalog service.
    pub fn matches_service(&self, service: &Service) -> bool {
        let by_id = self
            .service_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty() && id.trim() == service.id);
        by_id || normalize_name(&self.name) == normalize_name(&service.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingItem {
    pub id: String,
    pub service_id: String,
    #[serde(default)]
    pub duration_min_minutes: Min,
    #[serde(default)]
    pub duration_max_minutes: Min,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub has_follow_up: bool,
    #[serde(default)]
    pub follow_up: Option<FollowUp>,
}

impl PricingItem {
    /// The follow-up only counts when flagged and of positive length.
    pub fn effective_follow_up(&self) -> Option<&FollowUp> {
        if !self.has_follow_up {
            return None;
        }
        self.follow_up.as_ref().filter(|f| f.duration_minutes > 0)
    }
}

/// One requested service in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainServiceInput {
    pub service: Service,
    pub pricing: PricingItem,
    /// Idle gap before this segment. Only set on an appended finishing service.
    #[serde(default)]
    pub finish_gap_before: Option<Min>,
}

impl ChainServiceInput {
    pub fn is_finishing(&self) -> bool {
        self.finish_gap_before.is_some()
    }

    /// Segment length: pricing max, then pricing min, then catalog duration,
    /// then the crate default.
    pub fn duration_min(&self) -> Min {
        [
            self.pricing.duration_max_minutes,
            self.pricing.duration_min_minutes,
            self.service.duration,
        ]
        .into_iter()
        .find(|d| *d > 0)
        .unwrap_or(crate::limits::DEFAULT_DURATION_MIN)
    }

    pub fn follow_up(&self) -> Option<&FollowUp> {
        self.pricing.effective_follow_up()
    }
}

// ── Chain output ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpSlot {
    pub name: String,
    #[serde(default)]
    pub service_id: Option<String>,
    pub duration_min: Min,
    pub wait_min: Min,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub worker_name: Option<String>,
}

/// A timed (and, once resolved, staffed) segment of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSlot {
    pub order: usize,
    pub service_name: String,
    pub service_id: String,
    #[serde(default)]
    pub service_type: Option<String>,
    pub duration_min: Min,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub worker_name: Option<String>,
    #[serde(default)]
    pub follow_up: Option<FollowUpSlot>,
}

// ── Roster ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAvailability {
    pub day: Weekday,
    #[serde(default)]
    pub open: Option<String>,
    #[serde(default)]
    pub close: Option<String>,
    /// Explicit day off.
    #[serde(default)]
    pub off: bool,
    #[serde(default)]
    pub breaks: Vec<BreakRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Allowed service identifiers (names or ids). Empty means none.
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub all_services_allowed: bool,
    #[serde(default)]
    pub availability: Vec<DayAvailability>,
}

impl Worker {
    pub fn day(&self, weekday: Weekday) -> Option<&DayAvailability> {
        self.availability.iter().find(|d| d.day == weekday)
    }
}

// ── Existing bookings ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BookingPhase {
    #[default]
    Primary,
    FollowUp,
}

impl TryFrom<u8> for BookingPhase {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Self::Primary),
            2 => Ok(Self::FollowUp),
            other => Err(format!("invalid booking phase {other}, expected 1 or 2")),
        }
    }
}

impl From<BookingPhase> for u8 {
    fn from(p: BookingPhase) -> u8 {
        match p {
            BookingPhase::Primary => 1,
            BookingPhase::FollowUp => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    #[default]
    Confirmed,
    Completed,
    NoShow,
    #[serde(alias = "canceled")]
    Cancelled,
    #[serde(other)]
    Other,
}

impl BookingStatus {
    /// Cancelled bookings free their time; everything else occupies it.
    pub fn occupies_time(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

/// Second segment stored on the same record by older writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryTiming {
    /// Falls back to the booking's own worker when absent.
    #[serde(default)]
    pub worker_id: Option<String>,
    pub start: Min,
    pub duration_min: Min,
}

/// Canonical existing booking, as produced by [`crate::ingest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub id: String,
    pub worker_id: String,
    pub date: NaiveDate,
    /// Start, minutes since midnight of `date`.
    pub start: Min,
    pub duration_min: Min,
    #[serde(default)]
    pub phase: BookingPhase,
    #[serde(default)]
    pub parent_booking_id: Option<String>,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub secondary: Option<SecondaryTiming>,
}

impl BookingRecord {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.start.saturating_add(self.duration_min.max(0)))
    }

    /// Every `(worker, span)` this booking keeps busy.
    pub fn occupied(&self) -> impl Iterator<Item = (&str, Span)> {
        let primary = (self.duration_min > 0).then(|| (self.worker_id.as_str(), self.span()));
        let secondary = self.secondary.as_ref().filter(|s| s.duration_min > 0).map(|s| {
            let worker = s.worker_id.as_deref().unwrap_or(&self.worker_id);
            (worker, Span::new(s.start, s.start.saturating_add(s.duration_min)))
        });
        primary.into_iter().chain(secondary)
    }
}
