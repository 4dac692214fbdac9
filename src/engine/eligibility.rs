use crate::model::Worker;

/// Roster-level qualification. An empty `services` list grants nothing;
/// only `all_services_allowed` opens the whole catalog.
pub fn can_worker_perform_service(worker: &Worker, identifier: &str) -> bool {
    let identifier = identifier.trim();
    if !worker.active || identifier.is_empty() {
        return false;
    }
    if worker.all_services_allowed {
        return true;
    }
    worker.services.iter().any(|s| s == identifier)
}

pub fn workers_who_can_perform_service<'a>(workers: &'a [Worker], identifier: &str) -> Vec<&'a Worker> {
    workers
        .iter()
        .filter(|w| can_worker_perform_service(w, identifier))
        .collect()
}

/// Segment matching: by service name first, falling back to the service id.
pub fn can_worker_perform_segment(worker: &Worker, service_name: &str, service_id: Option<&str>) -> bool {
    can_worker_perform_service(worker, service_name)
        || service_id.is_some_and(|id| can_worker_perform_service(worker, id))
}

/// Eligible workers for a segment, in roster order.
pub fn segment_eligible_workers<'a>(
    workers: &'a [Worker],
    service_name: &str,
    service_id: Option<&str>,
) -> Vec<&'a Worker> {
    workers
        .iter()
        .filter(|w| can_worker_perform_segment(w, service_name, service_id))
        .collect()
}
