//! # Configuration
//!
//! Engine configuration, loaded once at construction time and threaded
//! through every operation.

pub mod engine;

pub use engine::EngineConfig;
