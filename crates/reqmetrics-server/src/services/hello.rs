//! Demo endpoints that exercise every instrumentation path.
//!
//! `/hello` rotates through result codes by request count and sleeps a short
//! random delay, with a long one every `spike_every` requests. Some counts
//! produce an empty body, which the errcode layer must skip without failing
//! the request. `/world` always answers a success envelope.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reqmetrics_core::ResponseCode;
use serde_json::json;

use crate::app_state::AppState;

pub const SUCCESS: ResponseCode = ResponseCode::new(1000, "Success");
pub const ERROR_MYSQL: ResponseCode = ResponseCode::new(2000, "MySQL error");
pub const ERROR_REDIS: ResponseCode = ResponseCode::new(2001, "Redis error");
pub const ERROR_INTERNAL: ResponseCode = ResponseCode::new(2002, "Internal error");

/// What `/hello` answers for the n-th request (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelloReply {
    Envelope(ResponseCode),
    Empty,
}

pub fn reply_for(n: u64) -> HelloReply {
    if n % 10 == 0 {
        HelloReply::Envelope(ERROR_MYSQL)
    } else if n % 2 == 1 {
        HelloReply::Envelope(SUCCESS)
    } else if n % 3 == 1 {
        HelloReply::Envelope(ERROR_INTERNAL)
    } else if n % 3 == 2 {
        HelloReply::Envelope(ERROR_REDIS)
    } else {
        HelloReply::Empty
    }
}

/// Artificial handler delay.
#[derive(Debug, Clone, Copy)]
pub struct DelayProfile {
    pub normal_max: Duration,
    pub spike_max: Duration,
    /// Every n-th request draws from `spike_max`. Zero disables spikes.
    pub spike_every: u64,
}

impl DelayProfile {
    pub const NONE: DelayProfile = DelayProfile {
        normal_max: Duration::ZERO,
        spike_max: Duration::ZERO,
        spike_every: 0,
    };

    pub fn for_request(&self, n: u64) -> Duration {
        let spike = self.spike_every != 0 && n % self.spike_every == 0;
        let max = if spike { self.spike_max } else { self.normal_max };
        jitter(max)
    }
}

impl Default for DelayProfile {
    fn default() -> Self {
        Self {
            normal_max: Duration::from_millis(100),
            spike_max: Duration::from_secs(10),
            spike_every: 100,
        }
    }
}

/// Uniform-ish duration in `[0, max)` seeded from the clock.
fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    Duration::from_millis(nanos % max_ms)
}

#[derive(Debug, Default)]
pub struct HelloService {
    counter: AtomicU64,
    delay: DelayProfile,
}

impl HelloService {
    pub fn new(delay: DelayProfile) -> Self {
        Self {
            counter: AtomicU64::new(0),
            delay,
        }
    }

    pub fn served(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    pub async fn respond(&self) -> Response {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;

        let delay = self.delay.for_request(n);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match reply_for(n) {
            HelloReply::Envelope(code) => Json(code.with_data("123")).into_response(),
            HelloReply::Empty => StatusCode::OK.into_response(),
        }
    }
}

pub async fn hello(State(state): State<AppState>) -> Response {
    state.hello().respond().await
}

pub async fn world() -> Response {
    Json(SUCCESS.with_data(json!({ "World": "Hello" }))).into_response()
}
