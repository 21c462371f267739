//! Node-side driver pieces for the Weft session layer.
//!
//! The protocol crate is sans-IO; this crate supplies what a node binary
//! wires around it: TOML configuration, tracing setup, a tokio-backed
//! rearmable timer for the tick scheduler, and an in-memory loopback
//! platform for tests and examples.

pub mod config;
pub mod error;
pub mod logging;
pub mod loopback;
pub mod timer;

pub use config::NodeConfig;
pub use error::NodeError;
pub use loopback::LoopbackPlatform;
pub use timer::TickTimer;
