//! Server config loader (strict parsing).

pub mod schema;

use std::fs;

use reqmetrics_core::error::{MetricsError, Result};

pub use schema::{
    InstrumentationSection, MetricsSection, PushSection, ReqMetricsConfig, ServerSection,
};

pub fn load_from_file(path: &str) -> Result<ReqMetricsConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| MetricsError::Internal(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ReqMetricsConfig> {
    let cfg: ReqMetricsConfig = serde_yaml::from_str(s)
        .map_err(|e| MetricsError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
