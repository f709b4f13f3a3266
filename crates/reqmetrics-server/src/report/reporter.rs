//! Periodic snapshot push.
//!
//! One background task per process. Every interval it exports the registry and
//! hands the snapshot to the exporter under a bounded timeout. A failed or
//! stalled push is logged and the schedule continues; state is cumulative, so
//! the next tick carries everything the failed one would have.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqmetrics_core::error::{MetricsError, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::PushSection;
use crate::obs::MetricRegistry;

use super::exporter::{MetricsExporter, PushGatewayExporter};

/// Tick accounting, readable while the reporter runs.
#[derive(Debug, Default)]
pub struct ReporterStats {
    ticks: AtomicU64,
    pushed: AtomicU64,
    failed: AtomicU64,
}

impl ReporterStats {
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

pub struct PeriodicReporter {
    registry: Arc<MetricRegistry>,
    exporter: Arc<dyn MetricsExporter>,
    interval: Duration,
    push_timeout: Duration,
    stats: Arc<ReporterStats>,
}

impl PeriodicReporter {
    pub fn new(
        registry: Arc<MetricRegistry>,
        exporter: Arc<dyn MetricsExporter>,
        interval: Duration,
        push_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            exporter,
            interval,
            push_timeout,
            stats: Arc::new(ReporterStats::default()),
        }
    }

    /// Reporter pushing to the configured gateway.
    pub fn from_config(registry: Arc<MetricRegistry>, cfg: &PushSection) -> Result<Self> {
        let exporter = PushGatewayExporter::new(cfg)?;
        Ok(Self::new(registry, Arc::new(exporter), cfg.interval(), cfg.timeout()))
    }

    pub fn stats(&self) -> Arc<ReporterStats> {
        Arc::clone(&self.stats)
    }

    /// One export + push. No retry; the caller decides what a failure means.
    pub async fn tick(&self) -> Result<()> {
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);

        let families = self.registry.export();
        let pushed = tokio::time::timeout(self.push_timeout, self.exporter.push(&families))
            .await
            .unwrap_or_else(|_| {
                Err(MetricsError::ExportFailed(format!(
                    "push timed out after {}ms",
                    self.push_timeout.as_millis()
                )))
            });

        match &pushed {
            Ok(()) => {
                self.stats.pushed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    exporter = self.exporter.name(),
                    families = families.len(),
                    "metrics pushed"
                );
            }
            Err(_) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        pushed
    }

    /// Tick every interval until `shutdown` flips to true or its sender is
    /// dropped, then push once more.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            exporter = self.exporter.name(),
            interval_ms = self.interval.as_millis() as u64,
            "reporter started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::warn!(
                            exporter = self.exporter.name(),
                            kind = e.kind().as_str(),
                            error = %e,
                            "metrics push failed"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Err(e) = self.tick().await {
            tracing::error!(
                exporter = self.exporter.name(),
                kind = e.kind().as_str(),
                error = %e,
                "final metrics push failed"
            );
        }
        tracing::info!("reporter stopped");
    }

    pub fn spawn(self) -> ReporterHandle {
        let (tx, rx) = watch::channel(false);
        let stats = self.stats();
        let task = tokio::spawn(self.run(rx));
        ReporterHandle {
            shutdown: tx,
            task,
            stats,
        }
    }
}

/// Running reporter.
pub struct ReporterHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    stats: Arc<ReporterStats>,
}

impl ReporterHandle {
    pub fn stats(&self) -> &ReporterStats {
        &self.stats
    }

    /// Signal shutdown and wait for the final flush.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| MetricsError::Internal(format!("reporter task failed: {e}")))
    }
}
