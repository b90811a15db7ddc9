//! Observability: tracing/logging setup.

pub mod tracing_init;

pub use tracing_init::{TracingError, init_tracing};
