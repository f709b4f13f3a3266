//! reqmetrics server library entry.
//!
//! This crate wires the metric sinks, the response capture decorators, the
//! instrumentation middleware and the periodic reporter into an axum stack.
//! It is consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod middleware;
pub mod obs;
pub mod ops;
pub mod report;
pub mod router;
pub mod services;
pub mod transport;
