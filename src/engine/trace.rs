//! Diagnostic hooks for the resolvers.
//!
//! Observers see every assignment decision but never feed back into it:
//! the same inputs produce the same schedule with or without one attached.

/// Diagnostic reason codes for an unassignable segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonCode {
    NoEligible,
    NoAvailable,
    Break,
}

impl ReasonCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::NoEligible => "no_eligible",
            ReasonCode::NoAvailable => "no_available",
            ReasonCode::Break => "break",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent<'a> {
    SegmentAssigned {
        order: usize,
        follow_up: bool,
        worker_id: &'a str,
    },
    SegmentUnassignable {
        order: usize,
        follow_up: bool,
        reason: ReasonCode,
    },
    /// The customer's chosen worker cannot take the first segment.
    PreferredRejected {
        worker_id: &'a str,
    },
    SlotOffered {
        time: &'a str,
    },
    SlotRejected {
        time: &'a str,
        reason: &'a str,
    },
    AssignmentReplaced {
        order: usize,
        follow_up: bool,
        from: Option<&'a str>,
        to: &'a str,
    },
}

pub trait TraceObserver {
    fn observe(&self, event: &TraceEvent<'_>);
}

impl<F> TraceObserver for F
where
    F: Fn(&TraceEvent<'_>),
{
    fn observe(&self, event: &TraceEvent<'_>) {
        self(event)
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TraceObserver for NoopObserver {
    fn observe(&self, _event: &TraceEvent<'_>) {}
}

/// Forwards events to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TraceObserver for TracingObserver {
    fn observe(&self, event: &TraceEvent<'_>) {
        match event {
            TraceEvent::SegmentAssigned { order, follow_up, worker_id } => {
                tracing::debug!(order, follow_up, worker_id, "segment assigned");
            }
            TraceEvent::SegmentUnassignable { order, follow_up, reason } => {
                tracing::debug!(order, follow_up, reason = reason.as_str(), "segment unassignable");
            }
            TraceEvent::PreferredRejected { worker_id } => {
                tracing::debug!(worker_id, "preferred worker cannot take first segment");
            }
            TraceEvent::SlotOffered { time } => tracing::debug!(time, "slot offered"),
            TraceEvent::SlotRejected { time, reason } => tracing::debug!(time, reason, "slot rejected"),
            TraceEvent::AssignmentReplaced { order, follow_up, from, to } => {
                tracing::info!(order, follow_up, from = from.unwrap_or("-"), to, "assignment replaced");
            }
        }
    }
}
