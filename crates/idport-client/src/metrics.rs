//! Metrics recording
//!
//! Counters emitted through the `metrics` facade:
//!
//! - `auth_refresh_total` (counter): label `outcome` = renewed | rejected | failed
//! - `api_requests_total` (counter): label `outcome` = success | failed |
//!   transport_error | retry_limit
//! - `pending_queue_total` (counter): requests parked awaiting a refresh
//!
//! No recorder is installed here: the embedding application decides whether
//! and where the counters are exported.

/// Record the outcome of one credential refresh cycle.
pub fn record_refresh(outcome: &str) {
    metrics::counter!("auth_refresh_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record the terminal outcome of one orchestrated API call.
pub fn record_api_result(outcome: &str) {
    metrics::counter!("api_requests_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a request parked on the pending queue.
pub fn record_parked() {
    metrics::counter!("pending_queue_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        // When no recorder is installed, metrics calls are no-ops.
        record_refresh("renewed");
        record_api_result("success");
        record_parked();
    }
}
