//! Shared application state.
//!
//! Owns the metric registry and the instrumentation handle derived from it.
//! Sink registration happens here, once, so a conflicting configuration fails
//! startup instead of surfacing per request.

use std::sync::Arc;

use reqmetrics_core::error::Result;

use crate::config::ReqMetricsConfig;
use crate::middleware::Instrumentation;
use crate::obs::{MetricRegistry, RequestMetrics};
use crate::report::PeriodicReporter;
use crate::services::{DelayProfile, HelloService};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ReqMetricsConfig,
    registry: Arc<MetricRegistry>,
    instrumentation: Instrumentation,
    hello: HelloService,
}

impl AppState {
    /// Build application state with the demo delay profile.
    pub fn new(cfg: ReqMetricsConfig) -> Result<Self> {
        Self::with_delay(cfg, DelayProfile::default())
    }

    pub fn with_delay(cfg: ReqMetricsConfig, delay: DelayProfile) -> Result<Self> {
        let registry = Arc::new(MetricRegistry::new());
        let metrics = RequestMetrics::register(&registry, &cfg.metrics)?;
        let instrumentation =
            Instrumentation::new(Arc::new(metrics), &cfg.metrics, &cfg.instrumentation);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                instrumentation,
                hello: HelloService::new(delay),
            }),
        })
    }

    pub fn cfg(&self) -> &ReqMetricsConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> Arc<MetricRegistry> {
        Arc::clone(&self.inner.registry)
    }

    pub fn instrumentation(&self) -> Instrumentation {
        self.inner.instrumentation.clone()
    }

    pub fn request_metrics(&self) -> &RequestMetrics {
        self.inner.instrumentation.metrics()
    }

    pub fn hello(&self) -> &HelloService {
        &self.inner.hello
    }

    /// Push reporter for this state, or `None` when pushing is disabled.
    pub fn reporter(&self) -> Result<Option<PeriodicReporter>> {
        let push = &self.inner.cfg.push;
        if !push.enabled {
            return Ok(None);
        }
        PeriodicReporter::from_config(self.registry(), push).map(Some)
    }
}
