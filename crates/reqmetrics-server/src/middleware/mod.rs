//! Request instrumentation middleware.
//!
//! Three independent layers, each an `axum::middleware::from_fn_with_state`
//! function over the shared `Instrumentation` handle:
//! - `track_qps`: counts requests per endpoint on entry.
//! - `track_latency`: observes handler wall-clock time per endpoint.
//! - `track_errcode`: captures the response body and counts result messages.
//!
//! Accounting is best-effort telemetry: failures are logged and never reach
//! the client.

pub mod errcode;
pub mod latency;
pub mod path;
pub mod qps;

use std::sync::Arc;

use reqmetrics_core::LabelSource;

use crate::config::{InstrumentationSection, MetricsSection};
use crate::obs::RequestMetrics;

pub use errcode::track_errcode;
pub use latency::{elapsed_millis, track_latency};
pub use path::normalize_path;
pub use qps::track_qps;

/// State shared by the instrumentation layers.
#[derive(Debug, Clone)]
pub struct Instrumentation {
    metrics: Arc<RequestMetrics>,
    label_source: LabelSource,
    capture_limit: usize,
    normalize_paths: bool,
}

impl Instrumentation {
    pub fn new(
        metrics: Arc<RequestMetrics>,
        metrics_cfg: &MetricsSection,
        cfg: &InstrumentationSection,
    ) -> Self {
        Self {
            metrics,
            label_source: cfg.errcode_label,
            capture_limit: cfg.capture_limit_bytes,
            normalize_paths: metrics_cfg.normalize_paths,
        }
    }

    pub fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }

    pub fn label_source(&self) -> LabelSource {
        self.label_source
    }

    pub fn capture_limit(&self) -> usize {
        self.capture_limit
    }

    /// Endpoint label value for a request path.
    pub fn endpoint(&self, path: &str) -> String {
        if self.normalize_paths {
            normalize_path(path)
        } else {
            path.to_string()
        }
    }
}
