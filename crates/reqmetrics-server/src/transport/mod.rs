//! Response transport decorators.
//!
//! Exposes the capture wrappers the error-code middleware installs in front of
//! the real response stream.

pub mod capture;

pub use capture::{
    CaptureBody, CaptureBuffer, CaptureHook, CaptureWriter, CapturedResponse, Outcome,
};
