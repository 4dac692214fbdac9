use std::collections::HashSet;

use chrono::{Duration, NaiveDateTime};

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::limits::MAX_SEGMENT_MIN;
use crate::model::*;

fn minutes(m: Min) -> Duration {
    Duration::minutes(i64::from(m.max(0)))
}

/// Follow-ups a multi-service chain must place, paired with the index of
/// the first primary that asked for each. Identical follow-ups collapse to
/// one; follow-ups naming a service already in the chain are dropped.
pub fn dedup_follow_ups(chain: &[ChainServiceInput]) -> Vec<(usize, &FollowUp)> {
    let mut seen = HashSet::new();
    chain
        .iter()
        .enumerate()
        .filter_map(|(i, input)| input.follow_up().map(|f| (i, f)))
        .filter(|(_, f)| !chain.iter().any(|c| f.matches_service(&c.service)))
        .filter(|(_, f)| seen.insert(f.dedup_key()))
        .collect()
}

/// Lay a chain out in absolute time starting at `start_at`. Workers are
/// left unassigned.
pub fn compute_chain_slots(chain: &[ChainServiceInput], start_at: NaiveDateTime) -> Vec<ChainSlot> {
    match chain {
        [] => Vec::new(),
        [single] => vec![single_service_slot(single, start_at)],
        _ => multi_service_slots(chain, start_at),
    }
}

fn primary_slot(order: usize, input: &ChainServiceInput, start_at: NaiveDateTime) -> ChainSlot {
    let duration_min = input.duration_min();
    ChainSlot {
        order,
        service_name: input.service.name.clone(),
        service_id: input.service.id.clone(),
        service_type: input.pricing.kind.clone(),
        duration_min,
        start_at,
        end_at: start_at + minutes(duration_min),
        worker_id: None,
        worker_name: None,
        follow_up: None,
    }
}

fn follow_up_slot(follow_up: &FollowUp, after: NaiveDateTime) -> FollowUpSlot {
    let start_at = after + minutes(follow_up.wait_minutes);
    FollowUpSlot {
        name: follow_up.name.clone(),
        service_id: follow_up.service_id.clone(),
        duration_min: follow_up.duration_minutes,
        wait_min: follow_up.wait_minutes,
        start_at,
        end_at: start_at + minutes(follow_up.duration_minutes),
        worker_id: None,
        worker_name: None,
    }
}

fn single_service_slot(input: &ChainServiceInput, start_at: NaiveDateTime) -> ChainSlot {
    let mut slot = primary_slot(0, input, start_at);
    slot.follow_up = input.follow_up().map(|f| follow_up_slot(f, slot.end_at));
    slot
}

fn multi_service_slots(chain: &[ChainServiceInput], start_at: NaiveDateTime) -> Vec<ChainSlot> {
    let (mut slots, primaries_end) = chain.iter().enumerate().fold(
        (Vec::with_capacity(chain.len()), start_at),
        |(mut slots, cursor), (order, input)| {
            let begin = cursor + minutes(input.finish_gap_before.unwrap_or(0));
            let slot = primary_slot(order, input, begin);
            let next = slot.end_at;
            slots.push(slot);
            (slots, next)
        },
    );

    let placed: Vec<(usize, FollowUpSlot)> = dedup_follow_ups(chain)
        .into_iter()
        .scan(primaries_end, |cursor, (owner, follow_up)| {
            let slot = follow_up_slot(follow_up, *cursor);
            *cursor = slot.end_at;
            Some((owner, slot))
        })
        .collect();

    for (owner, slot) in placed {
        slots[owner].follow_up = Some(slot);
    }
    slots
}

/// Chain length in minutes. A chain carrying an appended finishing service
/// does not add follow-up time on top of its primaries.
pub fn chain_total_duration(chain: &[ChainServiceInput]) -> Min {
    let primaries = chain
        .iter()
        .map(ChainServiceInput::duration_min)
        .fold(0, Min::saturating_add);
    if chain.iter().any(ChainServiceInput::is_finishing) {
        return primaries;
    }
    dedup_follow_ups(chain)
        .iter()
        .map(|(_, f)| f.wait_minutes.max(0).saturating_add(f.duration_minutes.max(0)))
        .fold(primaries, Min::saturating_add)
}

/// Append the configured finishing service once when any chain member
/// requires it. No-op without a configured or catalogued finishing service.
pub fn build_chain_with_finishing_service(
    chain: &[ChainServiceInput],
    catalog: &Catalog,
    config: &EngineConfig,
) -> Vec<ChainServiceInput> {
    let mut out = chain.to_vec();
    if !chain.iter().any(|c| c.service.requires_finish) {
        return out;
    }
    let Some(finishing) = config.finishing_service.as_deref().and_then(|f| catalog.find_service(f)) else {
        tracing::debug!("finishing service required but not in catalog, skipping");
        return out;
    };
    if chain.iter().any(|c| c.service.id == finishing.id) {
        return out;
    }

    let explicit_gap = chain
        .iter()
        .filter(|c| c.service.requires_finish)
        .find_map(|c| c.service.finish_gap_minutes);
    let last_wait = chain.last().and_then(|c| c.follow_up()).map(|f| f.wait_minutes);
    let gap = explicit_gap.or(last_wait).unwrap_or(0).clamp(0, MAX_SEGMENT_MIN);

    let mut input = catalog.chain_input(finishing, None, config.default_duration_min);
    input.finish_gap_before = Some(gap);
    out.push(input);
    out
}
