use crate::model::ChainSlot;

use super::availability::{Claims, Unavailability, check_worker_in_span, overlaps_breaks};
use super::eligibility::segment_eligible_workers;
use super::{DayContext, service_segments};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A service segment runs into a business-wide break.
    BusinessBreak,
    /// Nobody on the roster performs this service.
    NoEligible,
    /// Every eligible worker is booked or off shift.
    NoAvailable,
    /// Eligible workers are free except for their own breaks.
    WorkerBreak,
}

impl RejectReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RejectReason::BusinessBreak => "business_break",
            RejectReason::NoEligible => "no_eligible",
            RejectReason::NoAvailable => "no_available",
            RejectReason::WorkerBreak => "worker_break",
        }
    }
}

/// First failing segment (index into the flattened primary/follow-up
/// sequence) and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoPreferenceRejection {
    pub segment_index: usize,
    pub reason: RejectReason,
}

/// "Any qualified worker" check: a start time is offerable when no work
/// segment touches a business break and each segment, on its own, has at
/// least one eligible worker free for it. Segments may end up with
/// different staff; no single combination is committed here.
pub fn validate_no_preference_slot(ctx: &DayContext<'_>, slots: &[ChainSlot]) -> Result<(), NoPreferenceRejection> {
    let segments = service_segments(ctx, slots);

    if let Some(segment_index) = segments
        .iter()
        .position(|s| overlaps_breaks(&s.span, ctx.business_breaks()))
    {
        return Err(NoPreferenceRejection { segment_index, reason: RejectReason::BusinessBreak });
    }

    let none = Claims::new();
    for (segment_index, segment) in segments.iter().enumerate() {
        let eligible = segment_eligible_workers(ctx.workers(), segment.service_name, segment.service_id);
        if eligible.is_empty() {
            return Err(NoPreferenceRejection { segment_index, reason: RejectReason::NoEligible });
        }
        let outcomes: Vec<Result<(), Unavailability>> = eligible
            .iter()
            .map(|w| check_worker_in_span(ctx, w, &segment.span, &none))
            .collect();
        if outcomes.iter().any(Result::is_ok) {
            continue;
        }
        let reason = if outcomes.contains(&Err(Unavailability::Break)) {
            RejectReason::WorkerBreak
        } else {
            RejectReason::NoAvailable
        };
        return Err(NoPreferenceRejection { segment_index, reason });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime, Weekday};

    use super::*;
    use crate::engine::Snapshot;
    use crate::model::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        date().and_hms_opt(h, m, 0).unwrap()
    }

    fn worker(id: &str, services: &[&str], breaks: &[(&str, &str)]) -> Worker {
        Worker {
            id: id.into(),
            name: id.into(),
            active: true,
            services: services.iter().map(|s| (*s).to_string()).collect(),
            all_services_allowed: false,
            availability: vec![DayAvailability {
                day: Weekday::Mon,
                open: Some("08:00".into()),
                close: Some("20:00".into()),
                off: false,
                breaks: breaks
                    .iter()
                    .map(|(s, e)| BreakRange { start: (*s).into(), end: (*e).into() })
                    .collect(),
            }],
        }
    }

    fn booking(worker_id: &str, start: Min, duration_min: Min) -> BookingRecord {
        BookingRecord {
            id: format!("{worker_id}-{start}"),
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

    fn color_with_wash(start: NaiveDateTime) -> Vec<ChainSlot> {
        let end = start + chrono::Duration::minutes(60);
        let wash_start = end + chrono::Duration::minutes(10);
        vec![ChainSlot {
            order: 0,
            service_name: "Color".into(),
            service_id: "svc-color".into(),
            service_type: None,
            duration_min: 60,
            start_at: start,
            end_at: end,
            worker_id: None,
            worker_name: None,
            follow_up: Some(FollowUpSlot {
                name: "Wash".into(),
                service_id: None,
                duration_min: 20,
                wait_min: 10,
                start_at: wash_start,
                end_at: wash_start + chrono::Duration::minutes(20),
                worker_id: None,
                worker_name: None,
            }),
        }]
    }

    #[test]
    fn each_segment_needs_its_own_worker() {
        let snap = Snapshot::new(date(), vec![worker("w1", &["Color"], &[]), worker("w2", &["Wash"], &[])], vec![]);
        let ctx = DayContext::new(&snap);
        assert_eq!(validate_no_preference_slot(&ctx, &color_with_wash(at(10, 0))), Ok(()));
    }

    #[test]
    fn follow_up_conflict_reports_segment_one() {
        let snap = Snapshot::new(
            date(),
            vec![worker("w1", &["Color"], &[]), worker("w2", &["Wash"], &[])],
            vec![booking("w2", 670, 10)],
        );
        let ctx = DayContext::new(&snap);
        assert_eq!(
            validate_no_preference_slot(&ctx, &color_with_wash(at(10, 0))),
            Err(NoPreferenceRejection { segment_index: 1, reason: RejectReason::NoAvailable })
        );
    }

    #[test]
    fn business_break_checked_on_work_segments_only() {
        let mut snap =
            Snapshot::new(date(), vec![worker("w1", &["Color"], &[]), worker("w2", &["Wash"], &[])], vec![]);
        // The 10-minute wait [11:00, 11:10) sits entirely inside the break.
        snap.business_breaks = vec![BreakRange { start: "11:00".into(), end: "11:10".into() }];
        let ctx = DayContext::new(&snap);
        assert_eq!(validate_no_preference_slot(&ctx, &color_with_wash(at(10, 0))), Ok(()));

        snap.business_breaks = vec![BreakRange { start: "11:20".into(), end: "11:40".into() }];
        let ctx = DayContext::new(&snap);
        assert_eq!(
            validate_no_preference_slot(&ctx, &color_with_wash(at(10, 0))),
            Err(NoPreferenceRejection { segment_index: 1, reason: RejectReason::BusinessBreak })
        );
    }

    #[test]
    fn worker_break_is_its_own_category() {
        let snap = Snapshot::new(date(), vec![worker("w1", &["Color"], &[("10:30", "11:00")])], vec![]);
        let ctx = DayContext::new(&snap);
        let rejection = validate_no_preference_slot(&ctx, &color_with_wash(at(10, 0))).unwrap_err();
        assert_eq!(rejection, NoPreferenceRejection { segment_index: 0, reason: RejectReason::WorkerBreak });
        assert_eq!(rejection.reason.as_str(), "worker_break");
    }

    #[test]
    fn missing_qualification_is_no_eligible() {
        let snap = Snapshot::new(date(), vec![worker("w1", &["Color"], &[])], vec![]);
        let ctx = DayContext::new(&snap);
        assert_eq!(
            validate_no_preference_slot(&ctx, &color_with_wash(at(10, 0))),
            Err(NoPreferenceRejection { segment_index: 1, reason: RejectReason::NoEligible })
        );
    }
}
