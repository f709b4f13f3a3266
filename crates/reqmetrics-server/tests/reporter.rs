#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::post, Router};

use reqmetrics_core::error::{MetricsError, Result};
use reqmetrics_core::ErrorKind;
use reqmetrics_server::config::PushSection;
use reqmetrics_server::obs::{FamilySnapshot, MetricRegistry, Opts};
use reqmetrics_server::report::{MetricsExporter, PeriodicReporter, PushGatewayExporter};

/// Records every pushed snapshot; fails the calls listed in `fail_on` (1-based).
#[derive(Default)]
struct RecordingExporter {
    calls: AtomicU64,
    fail_on: Vec<u64>,
    pushed: Mutex<Vec<Vec<FamilySnapshot>>>,
}

#[async_trait]
impl MetricsExporter for RecordingExporter {
    fn name(&self) -> &str {
        "recording"
    }

    async fn push(&self, families: &[FamilySnapshot]) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on.contains(&call) {
            return Err(MetricsError::ExportFailed(format!("call {call} refused")));
        }
        self.pushed.lock().unwrap().push(families.to_vec());
        Ok(())
    }
}

/// Never answers.
struct StalledExporter;

#[async_trait]
impl MetricsExporter for StalledExporter {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn push(&self, _families: &[FamilySnapshot]) -> Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

fn registry_with_counter() -> (Arc<MetricRegistry>, Arc<reqmetrics_server::obs::CounterVec>) {
    let registry = Arc::new(MetricRegistry::new());
    let qps = registry
        .register_counter(Opts::new("qps", "Requests.").namespace("t"), &["endpoint"])
        .unwrap();
    (registry, qps)
}

#[tokio::test]
async fn failed_tick_does_not_block_the_next() {
    let (registry, qps) = registry_with_counter();
    let exporter = Arc::new(RecordingExporter {
        fail_on: vec![1],
        ..Default::default()
    });
    let reporter = PeriodicReporter::new(
        registry,
        exporter.clone(),
        Duration::from_secs(60),
        Duration::from_secs(1),
    );

    qps.inc(&[("endpoint", "/a")]).unwrap();
    let err = reporter.tick().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExportFailed);

    qps.inc(&[("endpoint", "/a")]).unwrap();
    reporter.tick().await.unwrap();

    let pushed = exporter.pushed.lock().unwrap();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0][0].scalar(&["/a"]), Some(2.0));

    let stats = reporter.stats();
    assert_eq!((stats.ticks(), stats.pushed(), stats.failed()), (2, 1, 1));
}

#[tokio::test]
async fn stalled_push_times_out() {
    let (registry, _) = registry_with_counter();
    let reporter = PeriodicReporter::new(
        registry,
        Arc::new(StalledExporter),
        Duration::from_secs(60),
        Duration::from_millis(20),
    );

    let err = reporter.tick().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExportFailed);
    assert_eq!(reporter.stats().failed(), 1);
}

#[tokio::test(start_paused = true)]
async fn run_loop_ticks_and_flushes_on_shutdown() {
    let (registry, qps) = registry_with_counter();
    let exporter = Arc::new(RecordingExporter {
        fail_on: vec![2],
        ..Default::default()
    });
    let reporter = PeriodicReporter::new(
        registry,
        exporter.clone(),
        Duration::from_secs(15),
        Duration::from_secs(5),
    );

    let handle = reporter.spawn();
    qps.inc(&[("endpoint", "/a")]).unwrap();

    tokio::time::sleep(Duration::from_secs(46)).await;
    assert_eq!(handle.stats().ticks(), 3);
    assert_eq!(handle.stats().failed(), 1);

    qps.inc(&[("endpoint", "/a")]).unwrap();
    handle.shutdown().await.unwrap();

    assert_eq!(exporter.calls.load(Ordering::SeqCst), 4);
    let pushed = exporter.pushed.lock().unwrap();
    assert_eq!(pushed.len(), 3);
    assert_eq!(pushed.last().unwrap()[0].scalar(&["/a"]), Some(2.0));
}

#[derive(Clone, Default)]
struct Gateway {
    bodies: Arc<Mutex<Vec<String>>>,
}

async fn accept(State(gw): State<Gateway>, body: String) -> StatusCode {
    gw.bodies.lock().unwrap().push(body);
    StatusCode::OK
}

async fn reject() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "storage full")
}

async fn spawn_gateway() -> (String, Gateway) {
    let gw = Gateway::default();
    let app = Router::new()
        .route("/metrics/job/ok", post(accept))
        .route("/metrics/job/broken", post(reject))
        .with_state(gw.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), gw)
}

fn push_cfg(url: &str, job: &str) -> PushSection {
    PushSection {
        url: url.to_string(),
        job: job.to_string(),
        timeout_ms: 2000,
        ..PushSection::default()
    }
}

#[tokio::test]
async fn pushgateway_receives_text_exposition() {
    let (url, gw) = spawn_gateway().await;
    let (registry, qps) = registry_with_counter();
    qps.inc(&[("endpoint", "/hello")]).unwrap();

    let exporter = PushGatewayExporter::new(&push_cfg(&url, "ok")).unwrap();
    exporter.push(&registry.export()).await.unwrap();

    let bodies = gw.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("# TYPE t_qps counter"));
    assert!(bodies[0].contains("t_qps{endpoint=\"/hello\"} 1"));
}

#[tokio::test]
async fn pushgateway_error_status_is_export_failed() {
    let (url, _) = spawn_gateway().await;
    let (registry, _) = registry_with_counter();

    let exporter = PushGatewayExporter::new(&push_cfg(&url, "broken")).unwrap();
    let err = exporter.push(&registry.export()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExportFailed);
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn unreachable_gateway_is_export_failed() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (registry, _) = registry_with_counter();
    let exporter = PushGatewayExporter::new(&push_cfg(&format!("http://{addr}"), "ok")).unwrap();
    let err = exporter.push(&registry.export()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExportFailed);

    // The transport cause is carried past reqwest's top-level message.
    let msg = err.to_string();
    let top = msg.find("error sending request").expect("top-level message");
    assert!(msg[top..].contains("): "), "no cause in {msg}");
}
