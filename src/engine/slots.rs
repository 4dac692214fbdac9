use crate::limits::{MAX_CANDIDATES, MAX_CHAIN_LEN};
use crate::model::*;
use crate::observability::{CANDIDATES_EVALUATED_TOTAL, CANDIDATES_OFFERED_TOTAL};

use super::assignment::resolve_chain_workers;
use super::availability::{overlaps_breaks, worker_breaks};
use super::no_preference::validate_no_preference_slot;
use super::timing::compute_chain_slots;
use super::trace::{TraceEvent, TraceObserver};
use super::{DayContext, EngineError, service_segments};

fn validate_chain(chain: &[ChainServiceInput]) -> Result<(), EngineError> {
    if chain.is_empty() {
        return Err(EngineError::EmptyChain);
    }
    // One extra slot for an appended finishing service.
    if chain.len() > MAX_CHAIN_LEN + 1 {
        return Err(EngineError::LimitExceeded("too many services in chain"));
    }
    Ok(())
}

fn parse_candidate(raw: &str) -> Result<Min, EngineError> {
    parse_hhmm(raw).ok_or_else(|| EngineError::MalformedTime(raw.to_string()))
}

/// Second look at a resolved chain: no service span may touch a business
/// break or the assigned worker's own breaks.
fn resolved_clear_of_breaks(ctx: &DayContext<'_>, resolved: &[ChainSlot]) -> bool {
    let assignees = resolved.iter().flat_map(|slot| {
        std::iter::once(slot.worker_id.as_deref()).chain(slot.follow_up.as_ref().map(|f| f.worker_id.as_deref()))
    });
    service_segments(ctx, resolved).iter().zip(assignees).all(|(segment, worker_id)| {
        if overlaps_breaks(&segment.span, ctx.business_breaks()) {
            return false;
        }
        let own = worker_id
            .and_then(|id| ctx.worker(id))
            .map(|w| worker_breaks(ctx, w))
            .unwrap_or_default();
        !overlaps_breaks(&segment.span, &own)
    })
}

/// Resolve one start time into a fully staffed chain, ready to persist.
/// `Ok(None)` means the time is not bookable.
pub fn resolve_slot(
    ctx: &DayContext<'_>,
    chain: &[ChainServiceInput],
    time: &str,
    preferred: Option<&str>,
    observer: &dyn TraceObserver,
) -> Result<Option<Vec<ChainSlot>>, EngineError> {
    validate_chain(chain)?;
    let start = parse_candidate(time)?;
    let slots = compute_chain_slots(chain, at_minute(ctx.date(), start));
    let resolved = resolve_chain_workers(ctx, &slots, preferred, observer);
    Ok(resolved.filter(|r| resolved_clear_of_breaks(ctx, r)))
}

fn offerable(
    ctx: &DayContext<'_>,
    chain: &[ChainServiceInput],
    start: Min,
    preferred: Option<&str>,
    observer: &dyn TraceObserver,
) -> bool {
    metrics::counter!(CANDIDATES_EVALUATED_TOTAL).increment(1);
    let slots = compute_chain_slots(chain, at_minute(ctx.date(), start));
    let verdict = match preferred {
        None => validate_no_preference_slot(ctx, &slots).map_err(|r| r.reason.as_str()),
        Some(_) => match resolve_chain_workers(ctx, &slots, preferred, observer) {
            Some(resolved) if resolved_clear_of_breaks(ctx, &resolved) => Ok(()),
            Some(_) => Err("break"),
            None => Err("unassignable"),
        },
    };
    let time = format_hhmm(start);
    match verdict {
        Ok(()) => {
            observer.observe(&TraceEvent::SlotOffered { time: &time });
            true
        }
        Err(reason) => {
            observer.observe(&TraceEvent::SlotRejected { time: &time, reason });
            false
        }
    }
}

/// Keep the candidate start times at which the chain can be booked,
/// preserving input order and spelling. With a preferred worker the full assignment
/// must succeed; without one each segment just needs some qualified,
/// free worker.
pub fn enumerate_slots<S: AsRef<str>>(
    ctx: &DayContext<'_>,
    chain: &[ChainServiceInput],
    candidates: &[S],
    preferred: Option<&str>,
    observer: &dyn TraceObserver,
) -> Result<Vec<String>, EngineError> {
    validate_chain(chain)?;
    if candidates.len() > MAX_CANDIDATES {
        return Err(EngineError::LimitExceeded("too many candidate times"));
    }
    let parsed = candidates
        .iter()
        .map(|c| parse_candidate(c.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    let offered: Vec<String> = parsed
        .into_iter()
        .zip(candidates)
        .filter(|&(start, _)| offerable(ctx, chain, start, preferred, observer))
        .map(|(_, raw)| raw.as_ref().to_string())
        .collect();

    metrics::counter!(CANDIDATES_OFFERED_TOTAL).increment(offered.len() as u64);
    Ok(offered)
}
