//! # Observability
//!
//! - `metrics`: Prometheus metrics collection
//! - `logging`: tracing subscriber setup

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{register_metrics, render_metrics};
