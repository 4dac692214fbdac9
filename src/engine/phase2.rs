use chrono::{Duration, NaiveDateTime};

use crate::model::*;

use super::DayContext;
use super::availability::{Claims, check_worker_in_span};
use super::eligibility::segment_eligible_workers;

/// Workers who may perform the follow-up and are free for `span`.
pub(super) fn phase2_candidates<'a>(
    ctx: &DayContext<'a>,
    name: &str,
    service_id: Option<&str>,
    span: &Span,
    claims: &Claims<'_>,
) -> Vec<&'a Worker> {
    segment_eligible_workers(ctx.workers(), name, service_id)
        .into_iter()
        .filter(|w| check_worker_in_span(ctx, w, span, claims).is_ok())
        .collect()
}

/// Eligible and available follow-up workers for a follow-up starting
/// `wait_minutes` after a phase-1 segment of `phase1_duration` minutes.
pub fn get_eligible_phase2_workers<'a>(
    ctx: &DayContext<'a>,
    follow_up: &FollowUp,
    phase1_start: NaiveDateTime,
    phase1_duration: Min,
) -> Vec<&'a Worker> {
    let minutes = |m: Min| Duration::minutes(i64::from(m.max(0)));
    let start_at = phase1_start + minutes(phase1_duration) + minutes(follow_up.wait_minutes);
    let end_at = start_at + minutes(follow_up.duration_minutes);
    let span = ctx.span_of(start_at, end_at);
    phase2_candidates(ctx, &follow_up.name, follow_up.service_id.as_deref(), &span, &Claims::new())
}

/// Deterministic pick: lightest day first, then ascending worker id.
pub fn auto_assign_phase2_worker<'a>(ctx: &DayContext<'_>, candidates: &[&'a Worker]) -> Option<&'a Worker> {
    candidates
        .iter()
        .copied()
        .min_by(|a, b| {
            ctx.busy_count(&a.id)
                .cmp(&ctx.busy_count(&b.id))
                .then_with(|| a.id.cmp(&b.id))
        })
}

pub(super) fn resolve_follow_up<'a>(
    ctx: &DayContext<'a>,
    slot: &FollowUpSlot,
    preferred: Option<&str>,
    phase1_worker: Option<&str>,
    claims: &Claims<'_>,
) -> Option<&'a Worker> {
    let span = ctx.span_of(slot.start_at, slot.end_at);
    let candidates = phase2_candidates(ctx, &slot.name, slot.service_id.as_deref(), &span, claims);
    let pick = |id: Option<&str>| id.and_then(|id| candidates.iter().copied().find(|w| w.id == id));

    pick(preferred)
        .or_else(|| pick(phase1_worker))
        .or_else(|| auto_assign_phase2_worker(ctx, &candidates))
}

/// Choose the follow-up worker: the customer's preference, else the phase-1
/// worker for continuity, else the deterministic auto-assignment.
pub fn resolve_phase2_worker<'a>(
    ctx: &DayContext<'a>,
    slot: &FollowUpSlot,
    preferred: Option<&str>,
    phase1_worker: Option<&str>,
) -> Option<&'a Worker> {
    resolve_follow_up(ctx, slot, preferred, phase1_worker, &Claims::new())
}
