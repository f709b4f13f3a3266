use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::obs::ENDPOINT_LABEL;

use super::Instrumentation;

/// Milliseconds with microsecond resolution.
pub fn elapsed_millis(elapsed: Duration) -> f64 {
    elapsed.as_micros() as f64 / 1000.0
}

/// Observe handler wall-clock time against the endpoint histogram.
///
/// The observation lives in a drop guard, so a handler that panics or a
/// request future that is cancelled still records its elapsed time.
pub async fn track_latency(
    State(inst): State<Instrumentation>,
    request: Request,
    next: Next,
) -> Response {
    let _guard = LatencyGuard {
        endpoint: inst.endpoint(request.uri().path()),
        inst,
        started: Instant::now(),
    };

    next.run(request).await
}

struct LatencyGuard {
    inst: Instrumentation,
    endpoint: String,
    started: Instant,
}

impl Drop for LatencyGuard {
    fn drop(&mut self) {
        let ms = elapsed_millis(self.started.elapsed());
        let labels = [(ENDPOINT_LABEL, self.endpoint.as_str())];

        if let Err(e) = self.inst.metrics().latency.observe(&labels, ms) {
            tracing::warn!(
                endpoint = %self.endpoint,
                kind = e.kind().as_str(),
                error = %e,
                "latency observation skipped"
            );
        }
    }
}
