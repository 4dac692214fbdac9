//! JSON request envelope: one business day of data plus a single query.
//!
//! This is the surface the `salonchain` binary speaks. Bookings arrive in
//! their stored layouts and are normalized here before the engine runs.

use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{Catalog, ChainRequestItem};
use crate::config::EngineConfig;
use crate::engine::{
    DayContext, EngineError, Snapshot, TracingObserver, chain_total_duration, enumerate_slots,
    repair_invalid_assignments, resolve_slot, validate_chain_assignments, worker_free_spans,
};
use crate::ingest::{RawBooking, normalize_bookings};
use crate::model::*;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("invalid utc offset: {0} minutes")]
    InvalidOffset(i32),
    #[error("business hours {open}-{close} are empty")]
    EmptyBusinessHours { open: String, close: String },
    #[error("unknown worker: {0}")]
    UnknownWorker(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hours {
    pub open: String,
    pub close: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub date: NaiveDate,
    #[serde(default)]
    pub catalog: Catalog,
    #[serde(default)]
    pub workers: Vec<Worker>,
    #[serde(default)]
    pub bookings: Vec<RawBooking>,
    #[serde(default)]
    pub business_hours: Option<Hours>,
    #[serde(default)]
    pub business_breaks: Vec<BreakRange>,
    #[serde(default)]
    pub excluded_booking_ids: Vec<String>,
    /// Offset of the business's wall clock from UTC, for instant-typed
    /// booking fields.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    pub query: Query,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Query {
    /// Offerable start times among `candidates`.
    Slots {
        chain: Vec<ChainRequestItem>,
        candidates: Vec<String>,
        #[serde(default)]
        preferred_worker: Option<String>,
    },
    /// Fully staffed chain for one start time.
    Resolve {
        chain: Vec<ChainRequestItem>,
        time: String,
        #[serde(default)]
        preferred_worker: Option<String>,
    },
    Validate { assignments: Vec<ChainSlot> },
    Repair { assignments: Vec<ChainSlot> },
    /// Free time per worker; all active workers when `worker_ids` is empty.
    Free {
        #[serde(default)]
        worker_ids: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeTime {
    pub worker_id: String,
    pub spans: Vec<Hours>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Outcome {
    Slots { total_duration_min: Min, times: Vec<String> },
    Resolve { total_duration_min: Min, slots: Option<Vec<ChainSlot>> },
    Validate { valid: bool, errors: Vec<String> },
    Repair { slots: Option<Vec<ChainSlot>> },
    Free { workers: Vec<FreeTime> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Stored bookings that could not be normalized and were left out.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_bookings: Vec<String>,
}

fn business_window(hours: Option<&Hours>) -> Result<Option<TimeWindow>, RequestError> {
    let Some(hours) = hours else {
        return Ok(None);
    };
    let parse = |s: &str| parse_hhmm(s).ok_or_else(|| EngineError::MalformedTime(s.to_string()));
    let (open, close) = (parse(&hours.open)?, parse(&hours.close)?);
    if open >= close {
        return Err(RequestError::EmptyBusinessHours { open: hours.open.clone(), close: hours.close.clone() });
    }
    Ok(Some(Span::new(open, close)))
}

fn free_time(ctx: &DayContext<'_>, worker_ids: &[String]) -> Result<Vec<FreeTime>, RequestError> {
    let workers: Vec<&Worker> = if worker_ids.is_empty() {
        ctx.workers().iter().filter(|w| w.active).collect()
    } else {
        worker_ids
            .iter()
            .map(|id| ctx.worker(id).ok_or_else(|| RequestError::UnknownWorker(id.clone())))
            .collect::<Result<_, _>>()?
    };
    Ok(workers
        .into_iter()
        .map(|w| FreeTime {
            worker_id: w.id.clone(),
            spans: worker_free_spans(ctx, w)
                .into_iter()
                .map(|s| Hours { open: format_hhmm(s.start), close: format_hhmm(s.end) })
                .collect(),
        })
        .collect())
}

/// Normalize the day's data and answer the query.
pub fn execute(request: Request, config: &EngineConfig) -> Result<Response, RequestError> {
    let offset = request
        .utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or(RequestError::InvalidOffset(request.utc_offset_minutes))?;
    let (bookings, rejected) = normalize_bookings(&request.bookings, offset);

    let snapshot = Snapshot {
        date: request.date,
        workers: request.workers,
        bookings,
        business_hours: business_window(request.business_hours.as_ref())?,
        business_breaks: request.business_breaks,
        excluded_booking_ids: request.excluded_booking_ids,
    };
    let ctx = DayContext::new(&snapshot);
    let observer = TracingObserver;

    let outcome = match request.query {
        Query::Slots { chain, candidates, preferred_worker } => {
            let chain = request.catalog.assemble_chain(&chain, config)?;
            let times = enumerate_slots(&ctx, &chain, &candidates, preferred_worker.as_deref(), &observer)?;
            tracing::debug!(offered = times.len(), of = candidates.len(), "enumerated slots");
            Outcome::Slots { total_duration_min: chain_total_duration(&chain), times }
        }
        Query::Resolve { chain, time, preferred_worker } => {
            let chain = request.catalog.assemble_chain(&chain, config)?;
            let slots = resolve_slot(&ctx, &chain, &time, preferred_worker.as_deref(), &observer)?;
            Outcome::Resolve { total_duration_min: chain_total_duration(&chain), slots }
        }
        Query::Validate { assignments } => {
            let report = validate_chain_assignments(ctx.workers(), &assignments);
            Outcome::Validate {
                valid: report.valid,
                errors: report.errors.iter().map(ToString::to_string).collect(),
            }
        }
        Query::Repair { assignments } => Outcome::Repair {
            slots: repair_invalid_assignments(&ctx, &assignments, &observer),
        },
        Query::Free { worker_ids } => Outcome::Free { workers: free_time(&ctx, &worker_ids)? },
    };

    Ok(Response {
        outcome,
        skipped_bookings: rejected.iter().map(ToString::to_string).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(query: &str) -> Request {
        let json = format!(
            r#"{{
                "date": "2026-03-02",
                "catalog": {{
                    "services": [{{"id": "svc-cut", "name": "Cut", "duration": 30}}],
                    "pricing": []
                }},
                "workers": [{{"id": "w1", "name": "Ana", "services": ["Cut"]}}],
                "bookings": [
                    {{"id": "b1", "workerId": "w1", "date": "2026-03-02", "time": "10:00", "durationMin": 30}},
                    {{"id": "b2", "workerId": "w1"}}
                ],
                "businessHours": {{"open": "09:00", "close": "18:00"}},
                "query": {query}
            }}"#
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn slots_query() {
        let req = request(r#"{"action": "slots", "chain": [{"serviceId": "svc-cut"}], "candidates": ["09:30", "10:00", "17:45"]}"#);
        let resp = execute(req, &EngineConfig::default()).unwrap();
        assert_eq!(
            resp.outcome,
            Outcome::Slots { total_duration_min: 30, times: vec!["09:30".into()] }
        );
        assert_eq!(resp.skipped_bookings, vec!["booking b2: no date".to_string()]);
    }

    #[test]
    fn free_query_lists_active_workers() {
        let resp = execute(request(r#"{"action": "free"}"#), &EngineConfig::default()).unwrap();
        let Outcome::Free { workers } = resp.outcome else {
            panic!("expected free outcome");
        };
        assert_eq!(workers.len(), 1);
        assert_eq!(
            workers[0].spans,
            vec![
                Hours { open: "09:00".into(), close: "10:00".into() },
                Hours { open: "10:30".into(), close: "18:00".into() },
            ]
        );
    }

    #[test]
    fn unknown_worker_in_free_query() {
        let err = execute(request(r#"{"action": "free", "workerIds": ["nobody"]}"#), &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, RequestError::UnknownWorker(id) if id == "nobody"));
    }

    #[test]
    fn unknown_service_is_an_error() {
        let req = request(r#"{"action": "resolve", "chain": [{"serviceId": "svc-perm"}], "time": "10:00"}"#);
        let err = execute(req, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, RequestError::Engine(EngineError::UnknownService(_))));
    }

    #[test]
    fn inverted_business_hours_rejected() {
        let mut req = request(r#"{"action": "free"}"#);
        req.business_hours = Some(Hours { open: "18:00".into(), close: "09:00".into() });
        assert!(matches!(
            execute(req, &EngineConfig::default()),
            Err(RequestError::EmptyBusinessHours { .. })
        ));
    }

    #[test]
    fn outcome_serializes_with_action_tag() {
        let resp = Response {
            outcome: Outcome::Repair { slots: None },
            skipped_bookings: vec![],
        };
        assert_eq!(serde_json::to_value(&resp).unwrap(), serde_json::json!({"action": "repair", "slots": null}));
    }
}
