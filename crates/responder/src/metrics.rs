use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    pub static ref ALERTS_RECEIVED_TOTAL: IntCounter = register_int_counter!(
        "alertresponder_alerts_received_total",
        "Total number of alerts received across all webhook batches."
    )
    .unwrap();
    pub static ref ALERTS_SKIPPED_TOTAL: IntCounter = register_int_counter!(
        "alertresponder_alerts_skipped_total",
        "Alerts ignored because they were not firing."
    )
    .unwrap();
    pub static ref UNRESOLVED_ACTIONS_TOTAL: IntCounter = register_int_counter!(
        "alertresponder_unresolved_actions_total",
        "Firing alerts without a registered recovery action."
    )
    .unwrap();
    pub static ref PLAYBOOK_RUNS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "alertresponder_playbook_runs_total",
        "Recovery playbook runs by outcome.",
        &["outcome"]
    )
    .unwrap();
    pub static ref PLAYBOOK_DURATION_SECONDS: Histogram = register_histogram!(
        "alertresponder_playbook_duration_seconds",
        "Wall-clock duration of recovery playbook runs.",
        vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]
    )
    .unwrap();
}

/// Forces registration so every series shows up on the first scrape.
pub fn register_metrics() {
    lazy_static::initialize(&ALERTS_RECEIVED_TOTAL);
    lazy_static::initialize(&ALERTS_SKIPPED_TOTAL);
    lazy_static::initialize(&UNRESOLVED_ACTIONS_TOTAL);
    lazy_static::initialize(&PLAYBOOK_RUNS_TOTAL);
    lazy_static::initialize(&PLAYBOOK_DURATION_SECONDS);
}

pub fn record_playbook_run(outcome: &str, elapsed: std::time::Duration) {
    PLAYBOOK_RUNS_TOTAL.with_label_values(&[outcome]).inc();
    PLAYBOOK_DURATION_SECONDS.observe(elapsed.as_secs_f64());
}

// Function to gather metrics for exposition
pub fn gather_metrics() -> crate::Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| crate::Error::Internal(format!("Failed to encode metrics: {e}")))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::Error::Internal(format!("Metrics are not valid UTF-8: {e}")))
}
