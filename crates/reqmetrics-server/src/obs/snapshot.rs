//! Point-in-time copies of sink state and their text exposition.
//!
//! A snapshot owns its data: once taken, no sink lock is held, so it can be
//! rendered or shipped over the network at leisure.

use std::fmt::Write;

/// Sink kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

/// Histogram cell state. `counts` is per bucket (not cumulative) and carries
/// one extra trailing slot for the implicit +Inf bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    pub bounds: Vec<f64>,
    pub counts: Vec<u64>,
    pub sum: f64,
    pub count: u64,
}

impl HistogramSnapshot {
    /// Count of the bucket whose upper bound is exactly `upper`
    /// (`f64::INFINITY` selects the overflow bucket).
    pub fn bucket_count(&self, upper: f64) -> Option<u64> {
        if upper == f64::INFINITY {
            return self.counts.last().copied();
        }
        let idx = self.bounds.iter().position(|b| *b == upper)?;
        self.counts.get(idx).copied()
    }

    /// Cumulative `(le, count)` pairs ending with `(+Inf, count)`.
    pub fn cumulative(&self) -> Vec<(f64, u64)> {
        let mut acc = 0;
        self.bounds
            .iter()
            .copied()
            .chain(std::iter::once(f64::INFINITY))
            .zip(self.counts.iter())
            .map(|(le, c)| {
                acc += c;
                (le, acc)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Scalar(f64),
    Histogram(HistogramSnapshot),
}

/// One label-value combination.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSnapshot {
    /// Values in the family's `label_names` order.
    pub label_values: Vec<String>,
    pub value: CellValue,
}

/// All cells of one sink.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilySnapshot {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub label_names: Vec<String>,
    pub cells: Vec<CellSnapshot>,
}

impl FamilySnapshot {
    /// Look up a cell by label values in schema order.
    pub fn cell(&self, label_values: &[&str]) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|c| c.label_values.iter().map(String::as_str).eq(label_values.iter().copied()))
            .map(|c| &c.value)
    }

    /// Scalar value of a counter/gauge cell.
    pub fn scalar(&self, label_values: &[&str]) -> Option<f64> {
        match self.cell(label_values)? {
            CellValue::Scalar(v) => Some(*v),
            CellValue::Histogram(_) => None,
        }
    }
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

fn fmt_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v == f64::INFINITY {
        "+Inf".into()
    } else if v == f64::NEG_INFINITY {
        "-Inf".into()
    } else {
        v.to_string()
    }
}

fn label_pairs(names: &[String], values: &[String]) -> Vec<String> {
    names
        .iter()
        .zip(values)
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect()
}

fn braced(pairs: &[String]) -> String {
    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", pairs.join(","))
    }
}

/// Render families in the Prometheus text exposition format (0.0.4).
pub fn render_text(families: &[FamilySnapshot]) -> String {
    let mut out = String::new();
    for fam in families {
        let name = &fam.name;
        if !fam.help.is_empty() {
            let _ = writeln!(out, "# HELP {} {}", name, escape_help(&fam.help));
        }
        let _ = writeln!(out, "# TYPE {} {}", name, fam.kind.as_str());

        for cell in &fam.cells {
            let pairs = label_pairs(&fam.label_names, &cell.label_values);
            match &cell.value {
                CellValue::Scalar(v) => {
                    let _ = writeln!(out, "{}{} {}", name, braced(&pairs), fmt_value(*v));
                }
                CellValue::Histogram(h) => {
                    for (le, count) in h.cumulative() {
                        let mut with_le = pairs.clone();
                        with_le.push(format!("le=\"{}\"", fmt_value(le)));
                        let _ = writeln!(out, "{}_bucket{} {}", name, braced(&with_le), count);
                    }
                    let _ = writeln!(out, "{}_sum{} {}", name, braced(&pairs), fmt_value(h.sum));
                    let _ = writeln!(out, "{}_count{} {}", name, braced(&pairs), h.count);
                }
            }
        }
    }
    out
}
