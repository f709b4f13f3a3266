pub mod hello;

pub use hello::{DelayProfile, HelloService};
