use std::fmt;

use thiserror::Error;

use crate::model::*;
use crate::observability::REPAIRS_TOTAL;

use super::availability::{Claims, check_worker_in_span};
use super::eligibility::{can_worker_perform_segment, segment_eligible_workers};
use super::phase2::resolve_follow_up;
use super::trace::{TraceEvent, TraceObserver};
use super::DayContext;

/// Which part of a chain an issue refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRef {
    pub order: usize,
    pub follow_up: bool,
    pub service: String,
}

impl fmt::Display for SegmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.follow_up {
            write!(f, "follow-up {:?} of segment {}", self.service, self.order)
        } else {
            write!(f, "segment {} ({:?})", self.order, self.service)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignmentIssue {
    #[error("{0}: no worker assigned")]
    MissingWorker(SegmentRef),
    #[error("{segment}: worker {worker_id} does not exist")]
    UnknownWorker { segment: SegmentRef, worker_id: String },
    #[error("{segment}: {worker_name} cannot perform this service")]
    CannotPerform { segment: SegmentRef, worker_id: String, worker_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainValidation {
    pub valid: bool,
    pub errors: Vec<AssignmentIssue>,
}

fn check_assignment(
    workers: &[Worker],
    segment: SegmentRef,
    worker_id: Option<&str>,
    service_id: Option<&str>,
) -> Option<AssignmentIssue> {
    let Some(worker_id) = worker_id.filter(|id| !id.trim().is_empty()) else {
        return Some(AssignmentIssue::MissingWorker(segment));
    };
    let Some(worker) = workers.iter().find(|w| w.id == worker_id) else {
        return Some(AssignmentIssue::UnknownWorker { segment, worker_id: worker_id.to_string() });
    };
    if !can_worker_perform_segment(worker, &segment.service, service_id) {
        return Some(AssignmentIssue::CannotPerform {
            segment,
            worker_id: worker.id.clone(),
            worker_name: worker.name.clone(),
        });
    }
    None
}

/// Final guard before commit. Collects every problem rather than stopping
/// at the first.
pub fn validate_chain_assignments(workers: &[Worker], slots: &[ChainSlot]) -> ChainValidation {
    let errors: Vec<AssignmentIssue> = slots
        .iter()
        .flat_map(|slot| {
            let primary = check_assignment(
                workers,
                SegmentRef { order: slot.order, follow_up: false, service: slot.service_name.clone() },
                slot.worker_id.as_deref(),
                Some(&slot.service_id),
            );
            let follow_up = slot.follow_up.as_ref().and_then(|f| {
                check_assignment(
                    workers,
                    SegmentRef { order: slot.order, follow_up: true, service: f.name.clone() },
                    f.worker_id.as_deref(),
                    f.service_id.as_deref(),
                )
            });
            primary.into_iter().chain(follow_up)
        })
        .collect();

    ChainValidation { valid: errors.is_empty(), errors }
}

/// The current assignee if they still exist, qualify, and are free.
fn keep_current<'a>(
    ctx: &DayContext<'a>,
    worker_id: Option<&str>,
    name: &str,
    service_id: Option<&str>,
    span: &Span,
    claims: &Claims<'_>,
) -> Option<&'a Worker> {
    let worker = ctx.worker(worker_id?)?;
    (can_worker_perform_segment(worker, name, service_id) && check_worker_in_span(ctx, worker, span, claims).is_ok())
        .then_some(worker)
}

/// Re-check a previously resolved chain against a newer snapshot and heal
/// what no longer holds. Still-valid assignments are kept as they are;
/// anything else is replaced by the first eligible, available worker
/// (follow-ups through the phase-2 preference order). `None` when any
/// segment cannot be staffed: the edit must then be rejected.
pub fn repair_invalid_assignments(
    ctx: &DayContext<'_>,
    slots: &[ChainSlot],
    observer: &dyn TraceObserver,
) -> Option<Vec<ChainSlot>> {
    let mut claims = Claims::new();
    let mut replaced = 0usize;

    let repaired = slots
        .iter()
        .map(|slot| {
            let mut out = slot.clone();
            let span = ctx.span_of(slot.start_at, slot.end_at);
            let service_id = Some(slot.service_id.as_str());

            let worker = match keep_current(ctx, slot.worker_id.as_deref(), &slot.service_name, service_id, &span, &claims) {
                Some(w) => w,
                None => {
                    let w = segment_eligible_workers(ctx.workers(), &slot.service_name, service_id)
                        .into_iter()
                        .find(|w| check_worker_in_span(ctx, w, &span, &claims).is_ok())?;
                    observer.observe(&TraceEvent::AssignmentReplaced {
                        order: slot.order,
                        follow_up: false,
                        from: slot.worker_id.as_deref(),
                        to: &w.id,
                    });
                    replaced += 1;
                    out.worker_id = Some(w.id.clone());
                    out.worker_name = Some(w.name.clone());
                    w
                }
            };
            claims.hold(&worker.id, span);

            if let Some(follow_up) = out.follow_up.as_mut() {
                let fspan = ctx.span_of(follow_up.start_at, follow_up.end_at);
                let current = keep_current(
                    ctx,
                    follow_up.worker_id.as_deref(),
                    &follow_up.name,
                    follow_up.service_id.as_deref(),
                    &fspan,
                    &claims,
                );
                let second = match current {
                    Some(w) => w,
                    None => {
                        let w = resolve_follow_up(ctx, follow_up, None, Some(worker.id.as_str()), &claims)?;
                        observer.observe(&TraceEvent::AssignmentReplaced {
                            order: slot.order,
                            follow_up: true,
                            from: follow_up.worker_id.as_deref(),
                            to: &w.id,
                        });
                        replaced += 1;
                        follow_up.worker_id = Some(w.id.clone());
                        follow_up.worker_name = Some(w.name.clone());
                        w
                    }
                };
                claims.hold(&second.id, fspan);
            }

            Some(out)
        })
        .collect::<Option<Vec<_>>>();

    let status = match (&repaired, replaced) {
        (None, _) => "failed",
        (Some(_), 0) => "unchanged",
        (Some(_), _) => "repaired",
    };
    metrics::counter!(REPAIRS_TOTAL, "status" => status).increment(1);
    if status == "repaired" {
        tracing::info!(replaced, "repaired chain assignments");
    }
    repaired
}
