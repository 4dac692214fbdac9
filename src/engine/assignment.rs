use crate::model::*;
use crate::observability::{ASSIGNMENT_FAILURES_TOTAL, CHAIN_RESOLUTIONS_TOTAL};

use super::availability::{Claims, Unavailability, check_worker_in_span};
use super::eligibility::segment_eligible_workers;
use super::phase2::resolve_follow_up;
use super::trace::{ReasonCode, TraceEvent, TraceObserver};
use super::DayContext;

/// Collapse per-worker failures into one diagnostic code: `break` only when
/// every eligible worker was blocked by a break.
pub(super) fn summarize(failures: &[Unavailability]) -> ReasonCode {
    if !failures.is_empty() && failures.iter().all(|u| *u == Unavailability::Break) {
        ReasonCode::Break
    } else {
        ReasonCode::NoAvailable
    }
}

fn fail(observer: &dyn TraceObserver, order: usize, follow_up: bool, reason: ReasonCode) {
    metrics::counter!(ASSIGNMENT_FAILURES_TOTAL, "reason" => reason.as_str()).increment(1);
    observer.observe(&TraceEvent::SegmentUnassignable { order, follow_up, reason });
}

fn staff(slot: &mut ChainSlot, worker: &Worker) {
    slot.worker_id = Some(worker.id.clone());
    slot.worker_name = Some(worker.name.clone());
}

fn staff_follow_up(slot: &mut FollowUpSlot, worker: &Worker) {
    slot.worker_id = Some(worker.id.clone());
    slot.worker_name = Some(worker.name.clone());
}

/// Assign a worker to every segment of a timed chain, in order.
///
/// A preferred worker is honoured wherever they qualify; on the first
/// segment the preference is binding and the chain fails rather than
/// silently substituting someone else. Later segments fall back to the
/// first available eligible worker in roster order, and follow-ups go
/// through the phase-2 preference order. Returns `None` unless every
/// segment is staffed.
pub fn resolve_chain_workers(
    ctx: &DayContext<'_>,
    slots: &[ChainSlot],
    preferred: Option<&str>,
    observer: &dyn TraceObserver,
) -> Option<Vec<ChainSlot>> {
    let mut claims = Claims::new();

    let resolved = slots
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            let span = ctx.span_of(slot.start_at, slot.end_at);
            let eligible = segment_eligible_workers(ctx.workers(), &slot.service_name, Some(slot.service_id.as_str()));
            if eligible.is_empty() {
                fail(observer, slot.order, false, ReasonCode::NoEligible);
                return None;
            }

            let mut failures = Vec::new();
            let mut chosen = None;

            if let Some(pid) = preferred
                && let Some(worker) = eligible.iter().copied().find(|w| w.id == pid)
            {
                match check_worker_in_span(ctx, worker, &span, &claims) {
                    Ok(()) => chosen = Some(worker),
                    Err(u) => failures.push(u),
                }
            }

            if chosen.is_none()
                && index == 0
                && let Some(pid) = preferred
            {
                observer.observe(&TraceEvent::PreferredRejected { worker_id: pid });
                fail(observer, slot.order, false, summarize(&failures));
                return None;
            }

            if chosen.is_none() {
                chosen = eligible.iter().copied().find(|w| match check_worker_in_span(ctx, w, &span, &claims) {
                    Ok(()) => true,
                    Err(u) => {
                        failures.push(u);
                        false
                    }
                });
            }

            let Some(worker) = chosen else {
                fail(observer, slot.order, false, summarize(&failures));
                return None;
            };
            claims.hold(&worker.id, span);
            observer.observe(&TraceEvent::SegmentAssigned { order: slot.order, follow_up: false, worker_id: &worker.id });

            let mut out = slot.clone();
            staff(&mut out, worker);

            if let Some(follow_up) = out.follow_up.as_mut() {
                let Some(second) = resolve_follow_up(ctx, follow_up, preferred, Some(worker.id.as_str()), &claims) else {
                    let fspan = ctx.span_of(follow_up.start_at, follow_up.end_at);
                    let eligible =
                        segment_eligible_workers(ctx.workers(), &follow_up.name, follow_up.service_id.as_deref());
                    let reason = if eligible.is_empty() {
                        ReasonCode::NoEligible
                    } else {
                        let failures: Vec<_> = eligible
                            .into_iter()
                            .filter_map(|w| check_worker_in_span(ctx, w, &fspan, &claims).err())
                            .collect();
                        summarize(&failures)
                    };
                    fail(observer, slot.order, true, reason);
                    return None;
                };
                claims.hold(&second.id, ctx.span_of(follow_up.start_at, follow_up.end_at));
                observer.observe(&TraceEvent::SegmentAssigned {
                    order: slot.order,
                    follow_up: true,
                    worker_id: &second.id,
                });
                staff_follow_up(follow_up, second);
            }

            Some(out)
        })
        .collect::<Option<Vec<_>>>();

    let status = if resolved.is_some() { "assigned" } else { "unassignable" };
    metrics::counter!(CHAIN_RESOLUTIONS_TOTAL, "status" => status).increment(1);
    resolved
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::engine::{NoopObserver, Snapshot};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        date().and_hms_opt(h, m, 0).unwrap()
    }

    fn worker(id: &str, services: &[&str]) -> Worker {
        Worker {
            id: id.into(),
            name: id.to_uppercase(),
            active: true,
            services: services.iter().map(|s| (*s).to_string()).collect(),
            all_services_allowed: false,
            availability: vec![],
        }
    }

    fn booking(id: &str, worker_id: &str, start: Min, duration_min: Min) -> BookingRecord {
        BookingRecord {
            id: id.into(),
            worker_id: worker_id.into(),
            date: date(),
            start,
            duration_min,
            phase: BookingPhase::Primary,
            parent_booking_id: None,
            status: BookingStatus::Confirmed,
            secondary: None,
        }
    }

    fn slot(order: usize, name: &str, start: NaiveDateTime, minutes: i64) -> ChainSlot {
        ChainSlot {
            order,
            service_name: name.into(),
            service_id: format!("svc-{}", name.to_lowercase()),
            service_type: None,
            duration_min: minutes as Min,
            start_at: start,
            end_at: start + chrono::Duration::minutes(minutes),
            worker_id: None,
            worker_name: None,
            follow_up: None,
        }
    }

    fn assigned(slots: &[ChainSlot]) -> Vec<&str> {
        slots.iter().map(|s| s.worker_id.as_deref().unwrap_or("-")).collect()
    }

    #[test]
    fn scans_roster_order_without_preference() {
        let snap = Snapshot::new(
            date(),
            vec![worker("w1", &["Cut"]), worker("w2", &["Cut"])],
            vec![booking("b1", "w1", 540, 30)],
        );
        let ctx = DayContext::new(&snap);
        let out = resolve_chain_workers(&ctx, &[slot(0, "Cut", at(9, 0), 30)], None, &NoopObserver).unwrap();
        assert_eq!(assigned(&out), vec!["w2"]);
        assert_eq!(out[0].worker_name.as_deref(), Some("W2"));
    }

    #[test]
    fn preferred_worker_binding_on_first_segment() {
        let snap = Snapshot::new(
            date(),
            vec![worker("w1", &["Cut"]), worker("w2", &["Cut"])],
            vec![booking("b1", "w2", 540, 30)],
        );
        let ctx = DayContext::new(&snap);
        assert!(resolve_chain_workers(&ctx, &[slot(0, "Cut", at(9, 0), 30)], Some("w2"), &NoopObserver).is_none());
        let out = resolve_chain_workers(&ctx, &[slot(0, "Cut", at(9, 30), 30)], Some("w2"), &NoopObserver).unwrap();
        assert_eq!(assigned(&out), vec!["w2"]);
    }

    #[test]
    fn later_segments_may_substitute() {
        let snap = Snapshot::new(
            date(),
            vec![worker("w1", &["Cut", "Color"]), worker("w2", &["Color"])],
            vec![booking("b1", "w1", 570, 30)],
        );
        let ctx = DayContext::new(&snap);
        let chain = [slot(0, "Cut", at(9, 0), 30), slot(1, "Color", at(9, 30), 30)];
        let out = resolve_chain_workers(&ctx, &chain, Some("w1"), &NoopObserver).unwrap();
        assert_eq!(assigned(&out), vec!["w1", "w2"]);
    }

    #[test]
    fn claimed_spans_block_same_worker() {
        // Overlapping segments never come out of the timing compiler, but
        // the resolver still must not hand one worker two spans at once.
        let snap = Snapshot::new(date(), vec![worker("w1", &["Cut"]), worker("w2", &["Cut"])], vec![]);
        let ctx = DayContext::new(&snap);
        let chain = [slot(0, "Cut", at(9, 0), 30), slot(1, "Cut", at(9, 15), 30)];
        let out = resolve_chain_workers(&ctx, &chain, None, &NoopObserver).unwrap();
        assert_eq!(assigned(&out), vec!["w1", "w2"]);
    }

    #[test]
    fn follow_up_resolved_independently() {
        let snap = Snapshot::new(date(), vec![worker("w1", &["Color"]), worker("w2", &["Wash"])], vec![]);
        let ctx = DayContext::new(&snap);
        let mut color = slot(0, "Color", at(10, 0), 60);
        color.follow_up = Some(FollowUpSlot {
            name: "Wash".into(),
            service_id: None,
            duration_min: 20,
            wait_min: 10,
            start_at: at(11, 10),
            end_at: at(11, 30),
            worker_id: None,
            worker_name: None,
        });
        let out = resolve_chain_workers(&ctx, &[color], None, &NoopObserver).unwrap();
        let f = out[0].follow_up.as_ref().unwrap();
        assert_eq!(out[0].worker_id.as_deref(), Some("w1"));
        assert_eq!(f.worker_id.as_deref(), Some("w2"));
        assert_eq!(f.worker_name.as_deref(), Some("W2"));
    }

    #[test]
    fn reason_codes_reach_observer() {
        let snap = Snapshot::new(date(), vec![worker("w1", &["Cut"])], vec![booking("b1", "w1", 540, 30)]);
        let ctx = DayContext::new(&snap);
        let reasons = RefCell::new(Vec::new());
        let observer = |e: &TraceEvent<'_>| {
            if let TraceEvent::SegmentUnassignable { reason, .. } = e {
                reasons.borrow_mut().push(*reason);
            }
        };
        assert!(resolve_chain_workers(&ctx, &[slot(0, "Perm", at(9, 0), 30)], None, &observer).is_none());
        assert!(resolve_chain_workers(&ctx, &[slot(0, "Cut", at(9, 0), 30)], None, &observer).is_none());
        assert_eq!(reasons.into_inner(), vec![ReasonCode::NoEligible, ReasonCode::NoAvailable]);
    }

    #[test]
    fn summarize_needs_all_breaks() {
        assert_eq!(summarize(&[Unavailability::Break, Unavailability::Break]), ReasonCode::Break);
        assert_eq!(summarize(&[Unavailability::Break, Unavailability::Conflict]), ReasonCode::NoAvailable);
        assert_eq!(summarize(&[]), ReasonCode::NoAvailable);
    }
}
