//! Prometheus metrics for the SQS input

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, CounterVec, Encoder,
    Histogram, IntCounter, TextEncoder,
};

lazy_static! {
    /// Total messages returned by receive calls
    pub static ref MESSAGES_RECEIVED_TOTAL: IntCounter = register_int_counter!(
        "sqs_input_messages_received_total",
        "Total messages received from the queue"
    )
    .unwrap();

    /// Total messages deleted after transform
    pub static ref MESSAGES_DELETED_TOTAL: IntCounter = register_int_counter!(
        "sqs_input_messages_deleted_total",
        "Total messages deleted from the queue"
    )
    .unwrap();

    /// Total records emitted, by label source (fixed, derived)
    pub static ref RECORDS_EMITTED_TOTAL: CounterVec = register_counter_vec!(
        "sqs_input_records_emitted_total",
        "Total records emitted to the router",
        &["source"]
    )
    .unwrap();

    /// Poll cycles by outcome (success, empty, error)
    pub static ref POLL_CYCLES_TOTAL: CounterVec = register_counter_vec!(
        "sqs_input_poll_cycles_total",
        "Total poll cycles by outcome",
        &["status"]
    )
    .unwrap();

    /// Poll cycle duration
    pub static ref POLL_CYCLE_DURATION: Histogram = register_histogram!(
        "sqs_input_poll_cycle_duration_seconds",
        "Poll cycle duration in seconds"
    )
    .unwrap();
}

/// Render all registered metrics in the Prometheus text format
pub fn gather() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
