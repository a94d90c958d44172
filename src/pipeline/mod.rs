// src/pipeline/mod.rs
pub mod fetch;
pub mod refresh;
pub mod types;

pub use fetch::Fetcher;
pub use refresh::Refresher;

use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_records_total", "Records fetched by the fetch pipeline.");
        describe_counter!("fetch_failures_total", "Fetch runs that ended with an error.");
        describe_histogram!("fetch_duration_ms", "Fetch run time in milliseconds.");
        describe_counter!(
            "refresh_records_enriched_total",
            "Records enriched by refresh workers."
        );
        describe_counter!("refresh_lookups_total", "Secondary lookups issued by refresh.");
        describe_counter!(
            "refresh_batches_saved_total",
            "Batches persisted by the refresh pipeline."
        );
        describe_counter!(
            "refresh_failures_total",
            "Refresh runs that ended with an error."
        );
        describe_histogram!("refresh_duration_ms", "Refresh run time in milliseconds.");
        describe_gauge!(
            "pipeline_last_run_ts",
            "Unix ts when a pipeline run last finished."
        );
    });
}

pub(crate) fn mark_run_finished() {
    let now = chrono::Utc::now().timestamp().max(0);
    gauge!("pipeline_last_run_ts").set(now as f64);
}
