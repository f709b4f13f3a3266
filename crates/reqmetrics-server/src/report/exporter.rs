use std::error::Error as StdError;

use async_trait::async_trait;
use reqmetrics_core::error::{MetricsError, Result};

use crate::config::PushSection;
use crate::obs::{render_text, FamilySnapshot};

const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Destination for periodic snapshot pushes.
#[async_trait]
pub trait MetricsExporter: Send + Sync {
    fn name(&self) -> &str;
    async fn push(&self, families: &[FamilySnapshot]) -> Result<()>;
}

/// Pushgateway "add" semantics: `POST {url}/metrics/job/{job}` with the text
/// exposition body. Same-named groups are replaced, others are kept.
#[derive(Debug, Clone)]
pub struct PushGatewayExporter {
    client: reqwest::Client,
    endpoint: String,
}

impl PushGatewayExporter {
    pub fn new(cfg: &PushSection) -> Result<Self> {
        // Gateways are addressed directly; env proxies are ignored.
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(cfg.timeout())
            .build()
            .map_err(|e| MetricsError::Internal(format!("push client build failed: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/metrics/job/{}", cfg.url.trim_end_matches('/'), cfg.job),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl MetricsExporter for PushGatewayExporter {
    fn name(&self) -> &str {
        "pushgateway"
    }

    async fn push(&self, families: &[FamilySnapshot]) -> Result<()> {
        let body = render_text(families);

        let resp = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, TEXT_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                MetricsError::ExportFailed(format!(
                    "push to {} failed: {}",
                    self.endpoint,
                    error_chain(&e)
                ))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(MetricsError::ExportFailed(format!(
                "push to {} rejected with {status}: {}",
                self.endpoint,
                detail.trim()
            )));
        }

        Ok(())
    }
}

/// `top: cause: root cause`, following `source()` to the end.
fn error_chain(e: &dyn StdError) -> String {
    let mut out = e.to_string();
    let mut cause = e.source();
    while let Some(c) = cause {
        out.push_str(": ");
        out.push_str(&c.to_string());
        cause = c.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;

    #[derive(Debug)]
    struct Wrapped(std::io::Error);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("error sending request")
        }
    }

    impl StdError for Wrapped {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn error_chain_keeps_every_cause() {
        let e = Wrapped(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert_eq!(error_chain(&e), "error sending request: connection refused");
    }

    #[test]
    fn endpoint_joins_url_and_job() {
        let cfg = PushSection {
            url: "http://gateway:9091/".into(),
            job: "api".into(),
            ..PushSection::default()
        };
        let exporter = PushGatewayExporter::new(&cfg).unwrap();
        assert_eq!(exporter.endpoint(), "http://gateway:9091/metrics/job/api");
    }
}
