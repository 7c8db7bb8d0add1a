//! # Observability
//!
//! Structured logging via `tracing`. The engine itself only emits events;
//! installing a subscriber is left to the application (see
//! [`init_logging`]).

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
