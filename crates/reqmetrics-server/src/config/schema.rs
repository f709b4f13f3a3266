use std::net::SocketAddr;
use std::time::Duration;

use reqmetrics_core::error::{MetricsError, Result};
use reqmetrics_core::LabelSource;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReqMetricsConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub metrics: MetricsSection,

    #[serde(default)]
    pub instrumentation: InstrumentationSection,

    #[serde(default)]
    pub push: PushSection,
}

impl ReqMetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MetricsError::UnsupportedVersion);
        }

        self.server.validate()?;
        self.metrics.validate()?;
        self.instrumentation.validate()?;
        self.push.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            MetricsError::InvalidConfig(format!("server.listen must be a valid SocketAddr: {e}"))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_subsystem")]
    pub subsystem: String,

    #[serde(default = "default_latency_buckets_ms")]
    pub latency_buckets_ms: Vec<f64>,

    /// Collapse numeric/UUID path segments into `:id`.
    #[serde(default)]
    pub normalize_paths: bool,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            subsystem: default_subsystem(),
            latency_buckets_ms: default_latency_buckets_ms(),
            normalize_paths: false,
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if self.latency_buckets_ms.is_empty() {
            return Err(MetricsError::InvalidConfig(
                "metrics.latency_buckets_ms must not be empty".into(),
            ));
        }
        if self.latency_buckets_ms.iter().any(|b| !b.is_finite() || *b < 0.0) {
            return Err(MetricsError::InvalidConfig(
                "metrics.latency_buckets_ms must be finite and non-negative".into(),
            ));
        }
        if self.latency_buckets_ms.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MetricsError::InvalidConfig(
                "metrics.latency_buckets_ms must be strictly increasing".into(),
            ));
        }
        Ok(())
    }
}

fn default_namespace() -> String {
    "reqmetrics".into()
}
fn default_subsystem() -> String {
    "endpoints".into()
}
fn default_latency_buckets_ms() -> Vec<f64> {
    vec![1.0, 5.0, 10.0, 20.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentationSection {
    #[serde(default = "default_true")]
    pub qps: bool,

    #[serde(default = "default_true")]
    pub latency: bool,

    #[serde(default = "default_true")]
    pub errcode: bool,

    #[serde(default)]
    pub errcode_label: LabelSource,

    #[serde(default = "default_capture_limit_bytes")]
    pub capture_limit_bytes: usize,
}

impl Default for InstrumentationSection {
    fn default() -> Self {
        Self {
            qps: true,
            latency: true,
            errcode: true,
            errcode_label: LabelSource::default(),
            capture_limit_bytes: default_capture_limit_bytes(),
        }
    }
}

impl InstrumentationSection {
    pub fn validate(&self) -> Result<()> {
        if !(1024..=64 * 1024 * 1024).contains(&self.capture_limit_bytes) {
            return Err(MetricsError::InvalidConfig(
                "instrumentation.capture_limit_bytes must be between 1024 and 67108864".into(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
fn default_capture_limit_bytes() -> usize {
    1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_push_url")]
    pub url: String,

    #[serde(default = "default_push_job")]
    pub job: String,

    #[serde(default = "default_push_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_push_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PushSection {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_push_url(),
            job: default_push_job(),
            interval_ms: default_push_interval_ms(),
            timeout_ms: default_push_timeout_ms(),
        }
    }
}

impl PushSection {
    pub fn validate(&self) -> Result<()> {
        // The push client is built without a TLS backend.
        if !self.url.starts_with("http://") {
            return Err(MetricsError::InvalidConfig(
                "push.url must start with http:// (https is not supported)".into(),
            ));
        }
        if self.job.is_empty()
            || !self
                .job
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(MetricsError::InvalidConfig(
                "push.job must be non-empty and contain only [A-Za-z0-9_.-]".into(),
            ));
        }
        if !(1000..=3_600_000).contains(&self.interval_ms) {
            return Err(MetricsError::InvalidConfig(
                "push.interval_ms must be between 1000 and 3600000".into(),
            ));
        }
        if !(100..=60_000).contains(&self.timeout_ms) {
            return Err(MetricsError::InvalidConfig(
                "push.timeout_ms must be between 100 and 60000".into(),
            ));
        }
        if self.timeout_ms >= self.interval_ms {
            return Err(MetricsError::InvalidConfig(
                "push.timeout_ms must be less than push.interval_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_listen() -> String {
    "0.0.0.0:8082".into()
}
fn default_push_url() -> String {
    "http://127.0.0.1:9091".into()
}
fn default_push_job() -> String {
    "reqmetrics".into()
}
fn default_push_interval_ms() -> u64 {
    15000
}
fn default_push_timeout_ms() -> u64 {
    5000
}
