//! Booking ingestion.
//!
//! Stored bookings come in several generations of field layout: split
//! `date`/`time` strings, `dateISO`/`timeHHmm`, a single `startAt` instant
//! (RFC 3339 text, epoch millis, or a `{seconds, nanoseconds}` timestamp
//! object), and a second segment kept either in `secondary*` fields or a
//! nested `followUp` object. Everything is folded into [`BookingRecord`]
//! here so the engine only ever sees the canonical form.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;

use crate::limits::{DEFAULT_DURATION_MIN, MAX_SEGMENT_MIN};
use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("booking {0}: no worker")]
    MissingWorker(String),
    #[error("booking {0}: no date")]
    MissingDate(String),
    #[error("booking {0}: no start time")]
    MissingTime(String),
    #[error("booking {id}: malformed {field} {value:?}")]
    Malformed {
        id: String,
        field: &'static str,
        value: String,
    },
    #[error("booking {id}: invalid phase {phase}, expected 1 or 2")]
    InvalidPhase { id: String, phase: u8 },
    #[error("booking {id}: {field} of {minutes} minutes is longer than a day")]
    DurationTooLong {
        id: String,
        field: &'static str,
        minutes: Min,
    },
}

/// Any of the instant encodings found in stored bookings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawInstant {
    Timestamp {
        #[serde(alias = "_seconds")]
        seconds: i64,
        #[serde(default, alias = "_nanoseconds")]
        nanoseconds: u32,
    },
    Millis(i64),
    Text(String),
}

impl RawInstant {
    /// Wall-clock time at the business's UTC offset. Zone-less text is
    /// taken as already local.
    pub fn to_local(&self, offset: FixedOffset) -> Option<NaiveDateTime> {
        let utc = match self {
            RawInstant::Timestamp { seconds, nanoseconds } => DateTime::from_timestamp(*seconds, *nanoseconds)?,
            RawInstant::Millis(ms) => DateTime::from_timestamp_millis(*ms)?,
            RawInstant::Text(s) => {
                let s = s.trim();
                if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                    return Some(dt.with_timezone(&offset).naive_local());
                }
                return ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok());
            }
        };
        Some(utc.with_timezone(&offset).naive_local())
    }

    fn describe(&self) -> String {
        match self {
            RawInstant::Timestamp { seconds, nanoseconds } => format!("{{seconds: {seconds}, nanoseconds: {nanoseconds}}}"),
            RawInstant::Millis(ms) => ms.to_string(),
            RawInstant::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFollowUp {
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub start_at: Option<RawInstant>,
    #[serde(default)]
    pub duration_min: Option<Min>,
}

/// A booking as stored, in any of its historical layouts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBooking {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, rename = "dateISO")]
    pub date_iso: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default, rename = "timeHHmm")]
    pub time_hhmm: Option<String>,
    #[serde(default)]
    pub start_at: Option<RawInstant>,
    #[serde(default)]
    pub duration_min: Option<Min>,
    #[serde(default)]
    pub duration: Option<Min>,
    #[serde(default)]
    pub phase: Option<u8>,
    #[serde(default)]
    pub parent_booking_id: Option<String>,
    #[serde(default)]
    pub status: Option<BookingStatus>,
    #[serde(default)]
    pub secondary_worker_id: Option<String>,
    #[serde(default)]
    pub secondary_time: Option<String>,
    #[serde(default)]
    pub secondary_start_at: Option<RawInstant>,
    #[serde(default)]
    pub secondary_duration_min: Option<Min>,
    #[serde(default)]
    pub follow_up: Option<RawFollowUp>,
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn malformed(id: &str, field: &'static str, value: impl Into<String>) -> IngestError {
    IngestError::Malformed { id: id.to_string(), field, value: value.into() }
}

/// Accepts `YYYY-MM-DD` or any longer ISO string starting with one.
fn parse_date(id: &str, raw: &str) -> Result<NaiveDate, IngestError> {
    raw.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .ok_or_else(|| malformed(id, "date", raw))
}

fn parse_time(id: &str, field: &'static str, raw: &str) -> Result<Min, IngestError> {
    parse_hhmm(raw).ok_or_else(|| malformed(id, field, raw))
}

fn parse_instant(id: &str, field: &'static str, raw: &RawInstant, offset: FixedOffset) -> Result<NaiveDateTime, IngestError> {
    raw.to_local(offset).ok_or_else(|| malformed(id, field, raw.describe()))
}

/// Date and start minute of the primary segment.
fn primary_timing(raw: &RawBooking, offset: FixedOffset) -> Result<(NaiveDate, Min), IngestError> {
    let id = raw.id.as_str();
    let date = non_blank(&raw.date)
        .or(non_blank(&raw.date_iso))
        .map(|d| parse_date(id, d))
        .transpose()?;
    let time = non_blank(&raw.time)
        .or(non_blank(&raw.time_hhmm))
        .map(|t| parse_time(id, "time", t))
        .transpose()?;

    match (date, time, &raw.start_at) {
        (Some(date), Some(start), _) => Ok((date, start)),
        (date, None, Some(instant)) => {
            let local = parse_instant(id, "startAt", instant, offset)?;
            let date = date.unwrap_or(local.date());
            Ok((date, minute_of_day(date, local)))
        }
        (None, Some(_), None) | (None, None, None) => Err(IngestError::MissingDate(raw.id.clone())),
        (None, Some(start), Some(instant)) => {
            let local = parse_instant(id, "startAt", instant, offset)?;
            Ok((local.date(), start))
        }
        (Some(_), None, None) => Err(IngestError::MissingTime(raw.id.clone())),
    }
}

fn bounded(id: &str, field: &'static str, minutes: Min) -> Result<Min, IngestError> {
    if minutes > MAX_SEGMENT_MIN {
        return Err(IngestError::DurationTooLong { id: id.to_string(), field, minutes });
    }
    Ok(minutes)
}

/// Second segment from the flat `secondary*` fields, else from `followUp`.
fn secondary_timing(
    raw: &RawBooking,
    date: NaiveDate,
    offset: FixedOffset,
) -> Result<Option<SecondaryTiming>, IngestError> {
    let id = raw.id.as_str();
    let nested = raw.follow_up.as_ref();

    let worker_id = non_blank(&raw.secondary_worker_id)
        .or_else(|| nested.and_then(|f| non_blank(&f.worker_id)))
        .map(str::to_string);
    let duration_min = raw
        .secondary_duration_min
        .or_else(|| nested.and_then(|f| f.duration_min))
        .filter(|d| *d > 0)
        .map(|d| bounded(id, "secondaryDurationMin", d))
        .transpose()?;

    let time = non_blank(&raw.secondary_time).or_else(|| nested.and_then(|f| non_blank(&f.time)));
    let instant = raw
        .secondary_start_at
        .as_ref()
        .or_else(|| nested.and_then(|f| f.start_at.as_ref()));
    let start = match (time, instant) {
        (Some(t), _) => Some(parse_time(id, "secondaryTime", t)?),
        (None, Some(i)) => Some(minute_of_day(date, parse_instant(id, "secondaryStartAt", i, offset)?)),
        (None, None) => None,
    };

    Ok(start
        .zip(duration_min)
        .map(|(start, duration_min)| SecondaryTiming { worker_id, start, duration_min }))
}

/// Fold one stored booking into the canonical record. Instants are placed
/// on the wall clock at `offset`.
pub fn normalize_booking(raw: &RawBooking, offset: FixedOffset) -> Result<BookingRecord, IngestError> {
    let worker_id = non_blank(&raw.worker_id)
        .ok_or_else(|| IngestError::MissingWorker(raw.id.clone()))?
        .to_string();
    let (date, start) = primary_timing(raw, offset)?;

    let phase = match raw.phase {
        None => BookingPhase::Primary,
        Some(p) => BookingPhase::try_from(p).map_err(|_| IngestError::InvalidPhase { id: raw.id.clone(), phase: p })?,
    };

    let duration_min = match raw.duration_min.or(raw.duration) {
        Some(d) if d > 0 => bounded(&raw.id, "durationMin", d)?,
        _ => {
            tracing::debug!(booking = %raw.id, "booking has no duration, assuming {DEFAULT_DURATION_MIN} minutes");
            DEFAULT_DURATION_MIN
        }
    };

    Ok(BookingRecord {
        id: raw.id.clone(),
        worker_id,
        date,
        start,
        duration_min,
        phase,
        parent_booking_id: non_blank(&raw.parent_booking_id).map(str::to_string),
        status: raw.status.unwrap_or_default(),
        secondary: secondary_timing(raw, date, offset)?,
    })
}

/// Normalize a batch. Bad records are logged and returned separately so one
/// broken row never hides the rest of the day.
pub fn normalize_bookings(raws: &[RawBooking], offset: FixedOffset) -> (Vec<BookingRecord>, Vec<IngestError>) {
    let mut records = Vec::with_capacity(raws.len());
    let mut rejected = Vec::new();
    for raw in raws {
        match normalize_booking(raw, offset) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("skipping booking: {e}");
                rejected.push(e);
            }
        }
    }
    (records, rejected)
}
