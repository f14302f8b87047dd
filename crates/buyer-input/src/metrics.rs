use crate::{Payload, Strategy};

#[derive(prometheus_metric_storage::MetricStorage)]
#[metric(subsystem = "buyer_input")]
struct Metrics {
    /// Packing runs by strategy and outcome.
    #[metric(labels("strategy", "status"))]
    packing_runs: prometheus::IntCounterVec,

    /// Candidates offered to the packer.
    #[metric(labels("strategy"))]
    candidates_offered: prometheus::IntCounterVec,

    /// Candidates that made it into a payload.
    #[metric(labels("strategy"))]
    candidates_included: prometheus::IntCounterVec,

    /// Candidates removed again after the exact payload size was known.
    #[metric(labels("strategy"))]
    candidates_truncated: prometheus::IntCounterVec,

    /// Exact size recalculations per seller max packing run.
    #[metric(buckets(0, 1, 2, 3, 4, 5, 10, 20, 50))]
    recalculations: prometheus::Histogram,

    /// Compressed payload size in bytes.
    #[metric(
        labels("strategy"),
        buckets(1024, 2048, 5120, 10240, 20480, 51200, 102400)
    )]
    payload_size_bytes: prometheus::HistogramVec,
}

fn get() -> &'static Metrics {
    Metrics::instance(observe::metrics::get_storage_registry())
        .expect("unexpected error getting metrics instance")
}

pub(crate) fn packed(strategy: &Strategy, offered: usize, payload: &Payload) {
    let strategy: &'static str = strategy.into();
    let metrics = get();
    metrics
        .packing_runs
        .with_label_values(&[strategy, payload.status.into()])
        .inc();
    metrics
        .candidates_offered
        .with_label_values(&[strategy])
        .inc_by(offered as u64);
    metrics
        .candidates_included
        .with_label_values(&[strategy])
        .inc_by(payload.candidates() as u64);
    metrics
        .payload_size_bytes
        .with_label_values(&[strategy])
        .observe(payload.total_size() as f64);
}

pub(crate) fn seller_max(recalculations: usize, truncated: usize) {
    let metrics = get();
    metrics.recalculations.observe(recalculations as f64);
    metrics
        .candidates_truncated
        .with_label_values(&["seller_max"])
        .inc_by(truncated as u64);
}

pub(crate) fn per_buyer_limits(truncated: usize) {
    get()
        .candidates_truncated
        .with_label_values(&["per_buyer_limits"])
        .inc_by(truncated as u64);
}
