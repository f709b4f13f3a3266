//! Top-level facade crate for reqmetrics.
//!
//! Re-exports the core types and the server library so users can depend on a single crate.

pub mod core {
    pub use reqmetrics_core::*;
}

pub mod server {
    pub use reqmetrics_server::*;
}
