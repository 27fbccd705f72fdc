//! Prometheus metrics for ingestion runs.
//!
//! Without [`init_metrics`] no recorder is installed and every call below is a no-op.

use crate::error::ErrorKind;
use ::metrics::{counter, histogram};
use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

pub const RUNS_TOTAL: &str = "abn_ingest_runs_total";
pub const RECORDS_TOTAL: &str = "abn_ingest_records_total";
pub const RECORDS_NORMALIZED_TOTAL: &str = "abn_ingest_records_normalized_total";
pub const RECORDS_SKIPPED_TOTAL: &str = "abn_ingest_records_skipped_total";
pub const BATCHES_UPLOADED_TOTAL: &str = "abn_ingest_batches_uploaded_total";
pub const BATCH_UPLOAD_DURATION_SECONDS: &str = "abn_ingest_batch_upload_duration_seconds";
pub const RUN_DURATION_SECONDS: &str = "abn_ingest_run_duration_seconds";

static INIT: Once = Once::new();

/// Installs the Prometheus exporter on `0.0.0.0:<port>`. Idempotent.
pub fn init_metrics(port: u16) {
    INIT.call_once(|| {
        let addr: SocketAddr = ([0, 0, 0, 0], port).into();
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
        match builder.install() {
            Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
            Err(e) => warn!("Prometheus exporter install failed: {}", e),
        }
    });
}

/// Metric recording for the batch pipeline controller
pub struct PipelineMetrics;

impl PipelineMetrics {
    pub fn record_run_started() {
        counter!(RUNS_TOTAL).increment(1);
    }

    pub fn record_skip(kind: ErrorKind) {
        counter!(RECORDS_SKIPPED_TOTAL, "kind" => kind.as_str()).increment(1);
    }

    pub fn record_batch_uploaded(duration_secs: f64) {
        counter!(BATCHES_UPLOADED_TOTAL).increment(1);
        histogram!(BATCH_UPLOAD_DURATION_SECONDS).record(duration_secs);
    }

    pub fn record_run_finished(total_records: usize, normalized: usize, duration_secs: f64) {
        counter!(RECORDS_TOTAL).increment(total_records as u64);
        counter!(RECORDS_NORMALIZED_TOTAL).increment(normalized as u64);
        histogram!(RUN_DURATION_SECONDS).record(duration_secs);
    }
}
