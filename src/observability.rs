use tracing_subscriber::EnvFilter;

// ── Resolver metrics ────────────────────────────────────────────
//
// Emitted through the `metrics` facade; they are no-ops until the
// embedding service installs a recorder.

/// Counter: candidate start times evaluated by the enumerator.
pub const CANDIDATES_EVALUATED_TOTAL: &str = "salonchain_candidates_evaluated_total";

/// Counter: candidate start times offered to the customer.
pub const CANDIDATES_OFFERED_TOTAL: &str = "salonchain_candidates_offered_total";

/// Counter: chain worker resolutions. Labels: status (assigned, unassignable).
pub const CHAIN_RESOLUTIONS_TOTAL: &str = "salonchain_chain_resolutions_total";

/// Counter: unassignable segments. Labels: reason (no_eligible, no_available, break).
pub const ASSIGNMENT_FAILURES_TOTAL: &str = "salonchain_assignment_failures_total";

/// Counter: repair passes. Labels: status (unchanged, repaired, failed).
pub const REPAIRS_TOTAL: &str = "salonchain_repairs_total";

/// Install the fmt subscriber on stderr, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
