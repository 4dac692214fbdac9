mod assignment;
mod availability;
mod eligibility;
mod error;
mod no_preference;
mod phase2;
mod repair;
mod slots;
mod timing;
mod trace;

pub use assignment::resolve_chain_workers;
pub use availability::{
    Claims, Unavailability, WorkerWindow, any_service_segment_overlaps_breaks, check_worker_in_span,
    fits_working_window, has_conflict, is_worker_available_in_slot, merge_overlapping,
    overlaps_breaks, subtract_intervals, worker_free_spans,
};
pub use eligibility::{
    can_worker_perform_segment, can_worker_perform_service, segment_eligible_workers,
    workers_who_can_perform_service,
};
pub use error::EngineError;
pub use no_preference::{NoPreferenceRejection, RejectReason, validate_no_preference_slot};
pub use phase2::{auto_assign_phase2_worker, get_eligible_phase2_workers, resolve_phase2_worker};
pub use repair::{AssignmentIssue, ChainValidation, repair_invalid_assignments, validate_chain_assignments};
pub use slots::{enumerate_slots, resolve_slot};
pub use timing::{
    build_chain_with_finishing_service, chain_total_duration, compute_chain_slots, dedup_follow_ups,
};
pub use trace::{NoopObserver, ReasonCode, TraceEvent, TraceObserver, TracingObserver};

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::model::*;

// ── Snapshot ─────────────────────────────────────────────────────

/// Caller-assembled, mutually consistent view of one business day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub date: NaiveDate,
    /// Roster in catalog order; scans and tie-breaks depend on this order.
    pub workers: Vec<Worker>,
    #[serde(default)]
    pub bookings: Vec<BookingRecord>,
    /// `None` leaves the day unrestricted at the business level.
    #[serde(default)]
    pub business_hours: Option<TimeWindow>,
    #[serde(default)]
    pub business_breaks: Vec<BreakRange>,
    /// Bookings of the chain being edited; their phase-2 children are
    /// ignored too.
    #[serde(default)]
    pub excluded_booking_ids: Vec<String>,
}

impl Snapshot {
    pub fn new(date: NaiveDate, workers: Vec<Worker>, bookings: Vec<BookingRecord>) -> Self {
        Self {
            date,
            workers,
            bookings,
            business_hours: None,
            business_breaks: Vec::new(),
            excluded_booking_ids: Vec::new(),
        }
    }
}

/// Per-date derived state: busy spans indexed by worker, parsed breaks.
/// Built once per query and shared by every resolver.
#[derive(Debug, Clone)]
pub struct DayContext<'a> {
    snapshot: &'a Snapshot,
    weekday: Weekday,
    /// Busy spans per worker, sorted by `start`.
    busy: HashMap<&'a str, Vec<Span>>,
    business_breaks: Vec<Span>,
}

impl<'a> DayContext<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        let excluded: HashSet<&str> = snapshot.excluded_booking_ids.iter().map(String::as_str).collect();
        let mut busy: HashMap<&'a str, Vec<Span>> = HashMap::new();
        for booking in &snapshot.bookings {
            if booking.date != snapshot.date || !booking.status.occupies_time() {
                continue;
            }
            let parent_excluded = booking
                .parent_booking_id
                .as_deref()
                .is_some_and(|p| excluded.contains(p));
            if excluded.contains(booking.id.as_str()) || parent_excluded {
                continue;
            }
            for (worker_id, span) in booking.occupied() {
                busy.entry(worker_id).or_default().push(span);
            }
        }
        for spans in busy.values_mut() {
            spans.sort_by_key(|s| s.start);
        }

        let mut business_breaks: Vec<Span> = snapshot
            .business_breaks
            .iter()
            .filter_map(|b| {
                let span = b.span();
                if span.is_none() {
                    tracing::warn!("ignoring malformed business break {}-{}", b.start, b.end);
                }
                span
            })
            .collect();
        business_breaks.sort_by_key(|s| s.start);

        Self {
            snapshot,
            weekday: snapshot.date.weekday(),
            busy,
            business_breaks,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.snapshot.date
    }

    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    pub fn workers(&self) -> &'a [Worker] {
        &self.snapshot.workers
    }

    pub fn worker(&self, id: &str) -> Option<&'a Worker> {
        self.snapshot.workers.iter().find(|w| w.id == id)
    }

    pub fn business_window(&self) -> Option<Span> {
        self.snapshot.business_hours
    }

    pub fn business_breaks(&self) -> &[Span] {
        &self.business_breaks
    }

    /// All busy spans of a worker for the date, sorted by start.
    pub fn busy(&self, worker_id: &str) -> &[Span] {
        self.busy.get(worker_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of existing busy spans, the phase-2 load measure.
    pub fn busy_count(&self, worker_id: &str) -> usize {
        self.busy(worker_id).len()
    }

    /// Busy spans overlapping `query`.
    /// Uses binary search to skip spans starting at or after `query.end`.
    pub fn busy_overlapping(&self, worker_id: &str, query: &Span) -> impl Iterator<Item = &Span> {
        let spans = self.busy(worker_id);
        let right_bound = spans.partition_point(|s| s.start < query.end);
        let start = query.start;
        spans[..right_bound].iter().filter(move |s| s.end > start)
    }

    /// Span of an absolute `[start_at, end_at)` relative to this date.
    pub fn span_of(&self, start_at: NaiveDateTime, end_at: NaiveDateTime) -> Span {
        let start = minute_of_day(self.date(), start_at);
        let end = minute_of_day(self.date(), end_at).max(start);
        Span::new(start, end)
    }
}

// ── Segments ─────────────────────────────────────────────────────

/// One unit of actual work in a timed chain: a primary or its follow-up.
/// Wait gaps never appear as segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'s> {
    pub order: usize,
    pub follow_up: bool,
    pub service_name: &'s str,
    pub service_id: Option<&'s str>,
    pub span: Span,
}

/// Flatten a chain into work segments: each primary followed by its
/// nested follow-up, in chain order.
pub fn service_segments<'s>(ctx: &DayContext<'_>, slots: &'s [ChainSlot]) -> Vec<Segment<'s>> {
    slots
        .iter()
        .flat_map(|slot| {
            let primary = Segment {
                order: slot.order,
                follow_up: false,
                service_name: &slot.service_name,
                service_id: Some(slot.service_id.as_str()),
                span: ctx.span_of(slot.start_at, slot.end_at),
            };
            let follow_up = slot.follow_up.as_ref().map(|f| Segment {
                order: slot.order,
                follow_up: true,
                service_name: &f.name,
                service_id: f.service_id.as_deref(),
                span: ctx.span_of(f.start_at, f.end_at),
            });
            std::iter::once(primary).chain(follow_up)
        })
        .collect()
}
