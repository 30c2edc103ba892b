//! Prometheus metric name and label constants (C9).
//!
//! Every module that records a metric uses these constants rather than
//! spelling out string literals, so the names on `/metrics` stay in sync
//! with the contract in `spec.md` §6.
//!
//! # Naming convention
//!
//! - Prefix: `syslog_`
//! - Suffix: `_total` for counters, `_seconds` for histograms, no suffix
//!   for gauges.

// ─── label keys ──────────────────────────────────────────────────────

pub const LABEL_PROTOCOL: &str = "protocol";
pub const LABEL_FACILITY: &str = "facility";
pub const LABEL_SEVERITY: &str = "severity";
pub const LABEL_DESTINATION: &str = "destination";
pub const LABEL_REASON: &str = "reason";
pub const LABEL_INPUT: &str = "input";
pub const LABEL_FILTER: &str = "filter";

// ─── metric names ─────────────────────────────────────────────────────

/// Messages accepted off the wire and successfully parsed.
/// Labels: protocol, facility, severity.
pub const MESSAGES_RECEIVED_TOTAL: &str = "syslog_messages_received_total";

/// Messages successfully handed to a destination sender.
/// Labels: destination.
pub const MESSAGES_FORWARDED_TOTAL: &str = "syslog_messages_forwarded_total";

/// Messages dropped for any terminal reason.
/// Labels: reason ∈ {filter, no_match, parse_error, send_failed}.
pub const MESSAGES_DROPPED_TOTAL: &str = "syslog_messages_dropped_total";

/// Messages that failed to parse into a record.
/// Labels: protocol.
pub const MESSAGES_PARSE_ERRORS_TOTAL: &str = "syslog_messages_parse_errors_total";

/// 1 while a TCP destination is connected, 0 otherwise. Labels: destination.
pub const DESTINATION_UP: &str = "syslog_destination_up";

/// Current accepted-connection count for a TCP input. Labels: input.
pub const ACTIVE_CONNECTIONS: &str = "syslog_active_connections";

/// Router evaluation time per record, seconds. Labels: filter.
pub const PROCESSING_LATENCY_SECONDS: &str = "syslog_processing_latency_seconds";

/// Histogram buckets for router evaluation latency, seconds.
pub const PROCESSING_DURATION_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1,
];

/// Registers descriptions for every metric so `/metrics` carries HELP text
/// even before the first sample is recorded.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        MESSAGES_RECEIVED_TOTAL,
        "Syslog messages accepted and parsed off the wire"
    );
    describe_counter!(
        MESSAGES_FORWARDED_TOTAL,
        "Syslog messages successfully forwarded to a destination"
    );
    describe_counter!(
        MESSAGES_DROPPED_TOTAL,
        "Syslog messages dropped, by reason"
    );
    describe_counter!(
        MESSAGES_PARSE_ERRORS_TOTAL,
        "Syslog messages that failed to parse"
    );
    describe_gauge!(
        DESTINATION_UP,
        "Whether a TCP destination is currently connected"
    );
    describe_gauge!(
        ACTIVE_CONNECTIONS,
        "Current accepted TCP connection count for an input"
    );
    describe_histogram!(
        PROCESSING_LATENCY_SECONDS,
        "Router evaluation time per record, in seconds"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_carry_the_syslog_prefix() {
        for name in [
            MESSAGES_RECEIVED_TOTAL,
            MESSAGES_FORWARDED_TOTAL,
            MESSAGES_DROPPED_TOTAL,
            MESSAGES_PARSE_ERRORS_TOTAL,
            DESTINATION_UP,
            ACTIVE_CONNECTIONS,
            PROCESSING_LATENCY_SECONDS,
        ] {
            assert!(name.starts_with("syslog_"), "{name} missing prefix");
        }
    }

    #[test]
    fn counter_names_end_in_total() {
        for name in [
            MESSAGES_RECEIVED_TOTAL,
            MESSAGES_FORWARDED_TOTAL,
            MESSAGES_DROPPED_TOTAL,
            MESSAGES_PARSE_ERRORS_TOTAL,
        ] {
            assert!(name.ends_with("_total"));
        }
    }

    #[test]
    fn duration_buckets_are_sorted() {
        let mut sorted = PROCESSING_DURATION_BUCKETS.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(sorted, PROCESSING_DURATION_BUCKETS);
    }

    #[test]
    fn describe_all_does_not_panic_without_a_recorder() {
        describe_all();
    }
}
