//! Labeled metric sinks: counters, gauges and histograms.
//!
//! Cells live in a `DashMap` keyed by label values in schema order, so a cell
//! lookup only touches one shard. Counter and gauge cells are lock-free `f64`
//! accumulators (compare-and-swap on the bit pattern). Histogram cells take a
//! short per-cell mutex so a snapshot never sees buckets disagree with
//! count and sum.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use reqmetrics_core::error::{MetricsError, Result};

use super::registry::MetricRegistry;
use super::snapshot::{CellSnapshot, CellValue, FamilySnapshot, HistogramSnapshot, MetricKind};
use crate::config::MetricsSection;

/// Label carrying the request path.
pub const ENDPOINT_LABEL: &str = "endpoint";
/// Label carrying the extracted result message/code.
pub const CODE_LABEL: &str = "code";

/// Sink identity: `namespace_subsystem_name` plus help text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    pub namespace: String,
    pub subsystem: String,
    pub name: String,
    pub help: String,
}

impl Opts {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            namespace: String::new(),
            subsystem: String::new(),
            name: name.into(),
            help: help.into(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = subsystem.into();
        self
    }

    /// Fully-qualified name; empty parts are skipped.
    pub fn fq_name(&self) -> String {
        [&self.namespace, &self.subsystem, &self.name]
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Resolve `(name, value)` pairs into values ordered by the sink's schema.
fn label_key(schema: &[String], labels: &[(&str, &str)]) -> Result<Vec<String>> {
    if labels.len() != schema.len() {
        return Err(MetricsError::LabelMismatch(format!(
            "expected {} labels {:?}, got {}",
            schema.len(),
            schema,
            labels.len()
        )));
    }
    schema
        .iter()
        .map(|name| {
            labels
                .iter()
                .find(|(k, _)| *k == name.as_str())
                .map(|(_, v)| v.to_string())
                .ok_or_else(|| MetricsError::LabelMismatch(format!("missing label {name}")))
        })
        .collect()
}

fn owned_names(label_names: &[&str]) -> Vec<String> {
    label_names.iter().map(|s| s.to_string()).collect()
}

/// `f64` accumulator over `AtomicU64` bits.
#[derive(Debug, Default)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }

    fn add(&self, delta: f64) {
        let mut cur = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(cur) + delta).to_bits();
            match self
                .0
                .compare_exchange_weak(cur, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => cur = actual,
            }
        }
    }
}

/// Snapshot scalar cells sorted by label values.
fn scalar_cells(map: &DashMap<Vec<String>, AtomicF64>) -> Vec<CellSnapshot> {
    let mut cells: Vec<CellSnapshot> = map
        .iter()
        .map(|r| CellSnapshot {
            label_values: r.key().clone(),
            value: CellValue::Scalar(r.value().load()),
        })
        .collect();
    cells.sort_by(|a, b| a.label_values.cmp(&b.label_values));
    cells
}

/// Monotonic counter family.
#[derive(Debug)]
pub struct CounterVec {
    opts: Opts,
    label_names: Vec<String>,
    map: DashMap<Vec<String>, AtomicF64>,
}

impl CounterVec {
    pub fn new(opts: Opts, label_names: &[&str]) -> Self {
        Self {
            opts,
            label_names: owned_names(label_names),
            map: DashMap::new(),
        }
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) -> Result<()> {
        self.add(labels, 1.0)
    }

    /// Increment by an arbitrary non-negative value.
    pub fn add(&self, labels: &[(&str, &str)], v: f64) -> Result<()> {
        if !(v >= 0.0) || !v.is_finite() {
            return Err(MetricsError::InvalidObservation(format!(
                "counter {} cannot add {v}",
                self.opts.fq_name()
            )));
        }
        let key = label_key(&self.label_names, labels)?;
        if let Some(cell) = self.map.get(&key) {
            cell.add(v);
            return Ok(());
        }
        self.map.entry(key).or_default().add(v);
        Ok(())
    }

    /// Current value of one cell, if it exists.
    pub fn get(&self, labels: &[(&str, &str)]) -> Option<f64> {
        let key = label_key(&self.label_names, labels).ok()?;
        self.map.get(&key).map(|c| c.load())
    }

    pub fn snapshot(&self) -> FamilySnapshot {
        FamilySnapshot {
            name: self.opts.fq_name(),
            help: self.opts.help.clone(),
            kind: MetricKind::Counter,
            label_names: self.label_names.clone(),
            cells: scalar_cells(&self.map),
        }
    }
}

/// Point-value gauge family.
#[derive(Debug)]
pub struct GaugeVec {
    opts: Opts,
    label_names: Vec<String>,
    map: DashMap<Vec<String>, AtomicF64>,
}

impl GaugeVec {
    pub fn new(opts: Opts, label_names: &[&str]) -> Self {
        Self {
            opts,
            label_names: owned_names(label_names),
            map: DashMap::new(),
        }
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) -> Result<()> { self.add(labels, 1.0) }
    /// Decrement by 1.
    pub fn dec(&self, labels: &[(&str, &str)]) -> Result<()> { self.add(labels, -1.0) }

    /// Add an arbitrary signed delta.
    pub fn add(&self, labels: &[(&str, &str)], v: f64) -> Result<()> {
        if !v.is_finite() {
            return Err(MetricsError::InvalidObservation(format!(
                "gauge {} cannot add {v}",
                self.opts.fq_name()
            )));
        }
        let key = label_key(&self.label_names, labels)?;
        if let Some(cell) = self.map.get(&key) {
            cell.add(v);
            return Ok(());
        }
        self.map.entry(key).or_default().add(v);
        Ok(())
    }

    /// Overwrite the cell value.
    pub fn set(&self, labels: &[(&str, &str)], v: f64) -> Result<()> {
        if v.is_nan() {
            return Err(MetricsError::InvalidObservation(format!(
                "gauge {} cannot be set to NaN",
                self.opts.fq_name()
            )));
        }
        let key = label_key(&self.label_names, labels)?;
        self.map.entry(key).or_default().store(v);
        Ok(())
    }

    /// Current value of one cell, if it exists.
    pub fn get(&self, labels: &[(&str, &str)]) -> Option<f64> {
        let key = label_key(&self.label_names, labels).ok()?;
        self.map.get(&key).map(|c| c.load())
    }

    pub fn snapshot(&self) -> FamilySnapshot {
        FamilySnapshot {
            name: self.opts.fq_name(),
            help: self.opts.help.clone(),
            kind: MetricKind::Gauge,
            label_names: self.label_names.clone(),
            cells: scalar_cells(&self.map),
        }
    }
}

#[derive(Debug)]
struct HistogramCell {
    // One slot per boundary plus the trailing +Inf bucket. Not cumulative.
    counts: Vec<u64>,
    sum: f64,
    count: u64,
}

impl HistogramCell {
    fn new(buckets: usize) -> Self {
        Self {
            counts: vec![0; buckets + 1],
            sum: 0.0,
            count: 0,
        }
    }
}

/// Fixed-bucket histogram family.
#[derive(Debug)]
pub struct HistogramVec {
    opts: Opts,
    label_names: Vec<String>,
    buckets: Vec<f64>,
    map: DashMap<Vec<String>, Mutex<HistogramCell>>,
}

impl HistogramVec {
    /// Bucket boundaries must be finite and strictly increasing.
    pub fn new(opts: Opts, label_names: &[&str], buckets: &[f64]) -> Result<Self> {
        validate_buckets(buckets)?;
        Ok(Self {
            opts,
            label_names: owned_names(label_names),
            buckets: buckets.to_vec(),
            map: DashMap::new(),
        })
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    pub fn buckets(&self) -> &[f64] {
        &self.buckets
    }

    /// Count `v` in the smallest bucket whose boundary is `>= v`.
    pub fn observe(&self, labels: &[(&str, &str)], v: f64) -> Result<()> {
        if v.is_nan() {
            return Err(MetricsError::InvalidObservation(format!(
                "histogram {} cannot observe NaN",
                self.opts.fq_name()
            )));
        }
        let key = label_key(&self.label_names, labels)?;
        let idx = self.buckets.partition_point(|b| *b < v);

        let record = |cell: &Mutex<HistogramCell>| {
            let mut h = cell.lock().unwrap_or_else(PoisonError::into_inner);
            h.counts[idx] += 1;
            h.sum += v;
            h.count += 1;
        };

        if let Some(cell) = self.map.get(&key) {
            record(cell.value());
            return Ok(());
        }
        let cell = self
            .map
            .entry(key)
            .or_insert_with(|| Mutex::new(HistogramCell::new(self.buckets.len())));
        record(cell.value());
        Ok(())
    }

    /// Snapshot of one cell, if it exists.
    pub fn get(&self, labels: &[(&str, &str)]) -> Option<HistogramSnapshot> {
        let key = label_key(&self.label_names, labels).ok()?;
        self.map.get(&key).map(|c| self.cell_snapshot(c.value()))
    }

    fn cell_snapshot(&self, cell: &Mutex<HistogramCell>) -> HistogramSnapshot {
        let h = cell.lock().unwrap_or_else(PoisonError::into_inner);
        HistogramSnapshot {
            bounds: self.buckets.clone(),
            counts: h.counts.clone(),
            sum: h.sum,
            count: h.count,
        }
    }

    pub fn snapshot(&self) -> FamilySnapshot {
        let mut cells: Vec<CellSnapshot> = self
            .map
            .iter()
            .map(|r| CellSnapshot {
                label_values: r.key().clone(),
                value: CellValue::Histogram(self.cell_snapshot(r.value())),
            })
            .collect();
        cells.sort_by(|a, b| a.label_values.cmp(&b.label_values));

        FamilySnapshot {
            name: self.opts.fq_name(),
            help: self.opts.help.clone(),
            kind: MetricKind::Histogram,
            label_names: self.label_names.clone(),
            cells,
        }
    }
}

fn validate_buckets(buckets: &[f64]) -> Result<()> {
    if buckets.iter().any(|b| !b.is_finite()) {
        return Err(MetricsError::InvalidConfig(
            "histogram buckets must be finite (+Inf is implicit)".into(),
        ));
    }
    if buckets.windows(2).any(|w| w[0] >= w[1]) {
        return Err(MetricsError::InvalidConfig(
            "histogram buckets must be strictly increasing".into(),
        ));
    }
    Ok(())
}

/// The three request sinks fed by the instrumentation middleware.
#[derive(Debug, Clone)]
pub struct RequestMetrics {
    /// Requests per endpoint.
    pub qps: Arc<CounterVec>,
    /// Handler latency per endpoint, in milliseconds.
    pub latency: Arc<HistogramVec>,
    /// Result envelope classification per endpoint.
    pub errcode: Arc<GaugeVec>,
}

impl RequestMetrics {
    /// Register the request sinks. Registration conflicts are fatal at startup.
    pub fn register(registry: &MetricRegistry, cfg: &MetricsSection) -> Result<Self> {
        let opts = |name: &str, help: &str| {
            Opts::new(name, help)
                .namespace(&cfg.namespace)
                .subsystem(&cfg.subsystem)
        };

        let qps = registry.register_counter(
            opts("qps_statistic", "Requests received per endpoint."),
            &[ENDPOINT_LABEL],
        )?;
        let latency = registry.register_histogram(
            opts("latency_statistic", "Handler latency per endpoint in milliseconds."),
            &[ENDPOINT_LABEL],
            &cfg.latency_buckets_ms,
        )?;
        let errcode = registry.register_gauge(
            opts("errcode_statistic", "Responses per endpoint by result message."),
            &[ENDPOINT_LABEL, CODE_LABEL],
        )?;

        Ok(Self { qps, latency, errcode })
    }
}
