//! Metrics reporting: exporter seam plus the periodic push task.

pub mod exporter;
pub mod reporter;

pub use exporter::{MetricsExporter, PushGatewayExporter};
pub use reporter::{PeriodicReporter, ReporterHandle, ReporterStats};
