//! Sink registry.
//!
//! Built once at startup and shared by `Arc` with the middleware and the
//! reporter. Registering the same fully-qualified name twice hands back the
//! existing sink when the kind, label schema and buckets agree, and fails with
//! `SinkRegistrationConflict` otherwise.

use std::sync::Arc;

use dashmap::DashMap;
use reqmetrics_core::error::{MetricsError, Result};

use super::metrics::{CounterVec, GaugeVec, HistogramVec, Opts};
use super::snapshot::{FamilySnapshot, MetricKind};

/// A registered sink.
#[derive(Debug, Clone)]
pub enum Sink {
    Counter(Arc<CounterVec>),
    Gauge(Arc<GaugeVec>),
    Histogram(Arc<HistogramVec>),
}

impl Sink {
    pub fn kind(&self) -> MetricKind {
        match self {
            Sink::Counter(_) => MetricKind::Counter,
            Sink::Gauge(_) => MetricKind::Gauge,
            Sink::Histogram(_) => MetricKind::Histogram,
        }
    }

    pub fn label_names(&self) -> &[String] {
        match self {
            Sink::Counter(c) => c.label_names(),
            Sink::Gauge(g) => g.label_names(),
            Sink::Histogram(h) => h.label_names(),
        }
    }

    fn buckets(&self) -> Option<&[f64]> {
        match self {
            Sink::Histogram(h) => Some(h.buckets()),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> FamilySnapshot {
        match self {
            Sink::Counter(c) => c.snapshot(),
            Sink::Gauge(g) => g.snapshot(),
            Sink::Histogram(h) => h.snapshot(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MetricRegistry {
    sinks: DashMap<String, Sink>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            sinks: DashMap::new(),
        }
    }

    pub fn register_counter(&self, opts: Opts, label_names: &[&str]) -> Result<Arc<CounterVec>> {
        let name = opts.fq_name();
        validate_names(&name, label_names, false)?;
        match self.register(name, Sink::Counter(Arc::new(CounterVec::new(opts, label_names))))? {
            Sink::Counter(c) => Ok(c),
            _ => Err(MetricsError::Internal("registry returned a non-counter sink".into())),
        }
    }

    pub fn register_gauge(&self, opts: Opts, label_names: &[&str]) -> Result<Arc<GaugeVec>> {
        let name = opts.fq_name();
        validate_names(&name, label_names, false)?;
        match self.register(name, Sink::Gauge(Arc::new(GaugeVec::new(opts, label_names))))? {
            Sink::Gauge(g) => Ok(g),
            _ => Err(MetricsError::Internal("registry returned a non-gauge sink".into())),
        }
    }

    pub fn register_histogram(
        &self,
        opts: Opts,
        label_names: &[&str],
        buckets: &[f64],
    ) -> Result<Arc<HistogramVec>> {
        let name = opts.fq_name();
        validate_names(&name, label_names, true)?;
        let sink = Sink::Histogram(Arc::new(HistogramVec::new(opts, label_names, buckets)?));
        match self.register(name, sink)? {
            Sink::Histogram(h) => Ok(h),
            _ => Err(MetricsError::Internal("registry returned a non-histogram sink".into())),
        }
    }

    fn register(&self, name: String, sink: Sink) -> Result<Sink> {
        let entry = self.sinks.entry(name.clone()).or_insert_with(|| sink.clone());
        let existing = entry.value();

        if existing.kind() != sink.kind()
            || existing.label_names() != sink.label_names()
            || existing.buckets() != sink.buckets()
        {
            return Err(MetricsError::SinkRegistrationConflict(format!(
                "{name}: registered as {} {:?}, requested {} {:?}",
                existing.kind().as_str(),
                existing.label_names(),
                sink.kind().as_str(),
                sink.label_names(),
            )));
        }
        Ok(existing.clone())
    }

    pub fn get(&self, name: &str) -> Option<Sink> {
        self.sinks.get(name).map(|s| s.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Snapshot every sink, ordered by name.
    ///
    /// Sink handles are collected first, so the registry map is not locked
    /// while cells are copied.
    pub fn export(&self) -> Vec<FamilySnapshot> {
        let mut sinks: Vec<(String, Sink)> = self
            .sinks
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        sinks.sort_by(|a, b| a.0.cmp(&b.0));
        sinks.iter().map(|(_, s)| s.snapshot()).collect()
    }
}

fn valid_ident(s: &str, allow_colon: bool) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let ok = |c: char| c.is_ascii_alphanumeric() || c == '_' || (allow_colon && c == ':');
    (first.is_ascii_alphabetic() || first == '_' || (allow_colon && first == ':')) && chars.all(ok)
}

fn validate_names(name: &str, label_names: &[&str], histogram: bool) -> Result<()> {
    if !valid_ident(name, true) {
        return Err(MetricsError::InvalidConfig(format!("invalid metric name: {name:?}")));
    }
    for l in label_names {
        if !valid_ident(l, false) || l.starts_with("__") {
            return Err(MetricsError::InvalidConfig(format!("invalid label name {l:?} on {name}")));
        }
        if histogram && *l == "le" {
            return Err(MetricsError::InvalidConfig(format!(
                "label \"le\" is reserved on histogram {name}"
            )));
        }
    }
    let mut sorted = label_names.to_vec();
    sorted.sort_unstable();
    if sorted.windows(2).any(|w| w[0] == w[1]) {
        return Err(MetricsError::InvalidConfig(format!("duplicate label name on {name}")));
    }
    Ok(())
}
