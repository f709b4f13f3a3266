use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::obs::ENDPOINT_LABEL;

use super::Instrumentation;

/// Count the request against its endpoint, then run the handler.
pub async fn track_qps(
    State(inst): State<Instrumentation>,
    request: Request,
    next: Next,
) -> Response {
    let endpoint = inst.endpoint(request.uri().path());

    if let Err(e) = inst.metrics().qps.inc(&[(ENDPOINT_LABEL, &endpoint)]) {
        tracing::warn!(%endpoint, kind = e.kind().as_str(), error = %e, "qps observation skipped");
    }

    next.run(request).await
}
