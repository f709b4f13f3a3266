//! In-process metric sinks.
//!
//! Sinks are plain atomics and per-cell locks inside sharded maps; the
//! registry hands out `Arc` handles at startup and produces owned snapshots
//! for the `/metrics` handler and the push reporter.

pub mod metrics;
pub mod registry;
pub mod snapshot;

pub use metrics::{
    CounterVec, GaugeVec, HistogramVec, Opts, RequestMetrics, CODE_LABEL, ENDPOINT_LABEL,
};
pub use registry::{MetricRegistry, Sink};
pub use snapshot::{render_text, CellValue, FamilySnapshot, HistogramSnapshot, MetricKind};
