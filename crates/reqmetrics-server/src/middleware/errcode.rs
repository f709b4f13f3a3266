use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use reqmetrics_core::{extract_label, MetricsError, Result};

use crate::obs::{CODE_LABEL, ENDPOINT_LABEL};
use crate::transport::{CaptureBody, CapturedResponse, Outcome};

use super::Instrumentation;

/// Capture the response body and count its result label.
///
/// The client receives the handler's bytes unchanged. Extraction runs once the
/// body has been fully handed to the transport; a body that is not a result
/// envelope is logged and leaves the gauge untouched.
pub async fn track_errcode(
    State(inst): State<Instrumentation>,
    request: Request,
    next: Next,
) -> Response {
    let endpoint = inst.endpoint(request.uri().path());
    let mut recorder = ErrcodeRecorder {
        inst: inst.clone(),
        endpoint,
        status: None,
        done: false,
    };

    let (parts, body) = next.run(request).await.into_parts();
    recorder.status = Some(parts.status);
    let body = CaptureBody::wrap(
        body,
        inst.capture_limit(),
        Box::new(move |captured| recorder.record(captured)),
    );

    Response::from_parts(parts, body)
}

struct ErrcodeRecorder {
    inst: Instrumentation,
    endpoint: String,
    status: Option<StatusCode>,
    done: bool,
}

impl ErrcodeRecorder {
    fn record(mut self, captured: CapturedResponse) {
        self.done = true;

        let outcome = self.label(&captured).and_then(|label| {
            self.inst.metrics().errcode.inc(&[
                (ENDPOINT_LABEL, self.endpoint.as_str()),
                (CODE_LABEL, label.as_str()),
            ])
        });

        if let Err(e) = outcome {
            tracing::warn!(
                endpoint = %self.endpoint,
                status = self.status.map(|s| s.as_u16()),
                kind = e.kind().as_str(),
                error = %e,
                "errcode observation skipped"
            );
        }
    }

    fn label(&self, captured: &CapturedResponse) -> Result<String> {
        if captured.outcome != Outcome::Completed {
            return Err(MetricsError::ExtractionFailed(format!(
                "response {}",
                captured.outcome.as_str()
            )));
        }
        if captured.truncated {
            return Err(MetricsError::ExtractionFailed(format!(
                "response exceeds capture limit of {} bytes",
                self.inst.capture_limit()
            )));
        }
        extract_label(&captured.body, self.inst.label_source())
    }
}

impl Drop for ErrcodeRecorder {
    fn drop(&mut self) {
        if !self.done {
            tracing::warn!(
                endpoint = %self.endpoint,
                "handler produced no response, errcode skipped"
            );
        }
    }
}
