use crate::limits::MINUTES_PER_DAY;
use crate::model::*;

use super::DayContext;

// ── Working windows ──────────────────────────────────────────────

/// A worker's own working window for one weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerWindow {
    /// No schedule configured, or a day entry without open/close: only the
    /// business window applies.
    Unrestricted,
    /// Day off, no entry for this weekday, or hours that do not parse.
    Closed,
    Hours(Span),
}

impl WorkerWindow {
    pub fn for_day(worker: &Worker, ctx: &DayContext<'_>) -> Self {
        if worker.availability.is_empty() {
            return WorkerWindow::Unrestricted;
        }
        let Some(day) = worker.day(ctx.weekday()) else {
            return WorkerWindow::Closed;
        };
        if day.off {
            return WorkerWindow::Closed;
        }
        let (open, close) = (day.open.as_deref(), day.close.as_deref());
        if open.is_none() && close.is_none() {
            return WorkerWindow::Unrestricted;
        }
        match (open.and_then(parse_hhmm), close.and_then(parse_hhmm)) {
            (Some(open), Some(close)) if open < close => WorkerWindow::Hours(Span::new(open, close)),
            (Some(_), Some(_)) => WorkerWindow::Closed,
            _ => {
                tracing::warn!(
                    worker = %worker.id,
                    "malformed working hours {}-{}, treating day as closed",
                    open.unwrap_or("?"),
                    close.unwrap_or("?")
                );
                WorkerWindow::Closed
            }
        }
    }
}

/// Why a worker cannot take a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailability {
    /// Overlaps an existing booking or a span claimed earlier in the chain.
    Conflict,
    /// Outside the worker window intersected with the business window.
    OutsideHours,
    /// Overlaps a worker or business break.
    Break,
}

/// Spans already handed out while resolving the current chain.
#[derive(Debug, Clone, Default)]
pub struct Claims<'a> {
    held: Vec<(&'a str, Span)>,
}

impl<'a> Claims<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&mut self, worker_id: &'a str, span: Span) {
        self.held.push((worker_id, span));
    }

    pub fn conflicts(&self, worker_id: &str, span: &Span) -> bool {
        self.held.iter().any(|(w, s)| *w == worker_id && s.overlaps(span))
    }
}

// ── Checks ───────────────────────────────────────────────────────

pub fn has_conflict(ctx: &DayContext<'_>, worker_id: &str, span: &Span) -> bool {
    ctx.busy_overlapping(worker_id, span).next().is_some()
}

pub fn fits_working_window(ctx: &DayContext<'_>, worker: &Worker, span: &Span) -> bool {
    let within_business = ctx.business_window().is_none_or(|w| w.contains_span(span));
    let within_worker = match WorkerWindow::for_day(worker, ctx) {
        WorkerWindow::Unrestricted => true,
        WorkerWindow::Closed => false,
        WorkerWindow::Hours(w) => w.contains_span(span),
    };
    within_business && within_worker
}

/// Conflict and window test for one worker/span. Breaks are checked
/// separately so wait gaps can be exempted by the caller.
pub fn is_worker_available_in_slot(ctx: &DayContext<'_>, worker: &Worker, span: &Span) -> bool {
    !has_conflict(ctx, &worker.id, span) && fits_working_window(ctx, worker, span)
}

/// Half-open: a segment ending exactly when a break starts is fine.
pub fn overlaps_breaks(span: &Span, breaks: &[Span]) -> bool {
    breaks.iter().any(|b| span.start < b.end && span.end > b.start)
}

/// Only actual work segments go through here; idle waits may span a break.
pub fn any_service_segment_overlaps_breaks(segments: &[Span], breaks: &[Span]) -> bool {
    segments.iter().any(|s| overlaps_breaks(s, breaks))
}

/// The worker's own breaks for the snapshot weekday.
pub fn worker_breaks(ctx: &DayContext<'_>, worker: &Worker) -> Vec<Span> {
    worker
        .day(ctx.weekday())
        .map(|d| d.breaks.iter().filter_map(BreakRange::span).collect())
        .unwrap_or_default()
}

/// Full per-segment test: conflicts (bookings and chain claims), windows,
/// then worker and business breaks.
pub fn check_worker_in_span(
    ctx: &DayContext<'_>,
    worker: &Worker,
    span: &Span,
    claims: &Claims<'_>,
) -> Result<(), Unavailability> {
    if has_conflict(ctx, &worker.id, span) || claims.conflicts(&worker.id, span) {
        return Err(Unavailability::Conflict);
    }
    if !fits_working_window(ctx, worker, span) {
        return Err(Unavailability::OutsideHours);
    }
    if overlaps_breaks(span, ctx.business_breaks()) || overlaps_breaks(span, &worker_breaks(ctx, worker)) {
        return Err(Unavailability::Break);
    }
    Ok(())
}

// ── Free time ────────────────────────────────────────────────────

/// Free spans of a worker for the day: working window (clipped to the
/// business window) minus breaks minus busy spans.
pub fn worker_free_spans(ctx: &DayContext<'_>, worker: &Worker) -> Vec<Span> {
    let day = Span::new(0, MINUTES_PER_DAY);
    let business = ctx.business_window().unwrap_or(day);
    let window = match WorkerWindow::for_day(worker, ctx) {
        WorkerWindow::Unrestricted => Some(business),
        WorkerWindow::Closed => None,
        WorkerWindow::Hours(w) => w.intersect(&business),
    };
    let Some(window) = window else {
        return Vec::new();
    };

    let mut blocked: Vec<Span> = worker_breaks(ctx, worker);
    blocked.extend_from_slice(ctx.business_breaks());
    blocked.extend_from_slice(ctx.busy(&worker.id));
    blocked.sort_by_key(|s| s.start);
    let blocked = merge_overlapping(&blocked);

    subtract_intervals(&[window], &blocked)
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// Remove sorted, disjoint `to_remove` spans from sorted `base` spans.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}
