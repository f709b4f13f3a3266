//! reqmetrics core: transport-agnostic error types and response wire shapes.
//!
//! This crate defines the result envelope that instrumented handlers answer
//! with and the error surface shared by the server, the sinks and the
//! reporter. It carries no runtime dependencies so it can be reused by other
//! HTTP stacks.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Every fallible path
//! surfaces as `MetricsError`/`Result` so accounting never crashes a request.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, MetricsError, Result};
pub use protocol::envelope::{extract_label, LabelSource, ResponseCode, ResultCode, ResultEnvelope};
