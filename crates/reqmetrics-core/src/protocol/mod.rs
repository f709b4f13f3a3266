//! Wire shapes consumed by the instrumentation layer.
//!
//! All parsers are panic-free: malformed bodies are reported as
//! `MetricsError::ExtractionFailed` instead of panicking, so a misbehaving
//! handler can never take the accounting path down with it.

pub mod envelope;
