//! Prometheus metrics for thread deletion

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, Histogram,
    HistogramVec, IntCounterVec,
};
use std::time::Duration;

/// Thread deletions by outcome (success/not_found/storage_error/cancelled)
static THREAD_DELETIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "strand_thread_deletions_total",
        "Total thread deletion attempts segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register strand_thread_deletions_total")
});

static THREAD_DELETION_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "strand_thread_deletion_duration_seconds",
        "Duration of thread deletions segmented by outcome",
        &["outcome"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .expect("failed to register strand_thread_deletion_duration_seconds")
});

/// Strands removed per successful deletion (target plus descendants)
static THREAD_DELETION_SIZE: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "strand_thread_deletion_size",
        "Number of strands removed per thread deletion",
        vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 500.0]
    )
    .expect("failed to register strand_thread_deletion_size")
});

pub fn record_deletion(outcome: &str, duration: Duration) {
    THREAD_DELETIONS_TOTAL.with_label_values(&[outcome]).inc();
    THREAD_DELETION_DURATION_SECONDS
        .with_label_values(&[outcome])
        .observe(duration.as_secs_f64());
}

pub fn record_thread_size(strands: usize) {
    THREAD_DELETION_SIZE.observe(strands as f64);
}
