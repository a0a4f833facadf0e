//! Configuration management for lakesync services.
//!
//! Provides environment detection, hierarchical configuration loading from
//! YAML files with environment variable overrides, secret handling, and the
//! shared configuration sections consumed by the worker.

mod environment;
mod load;
mod secret;
pub mod shared;

pub use environment::*;
pub use load::*;
pub use secret::*;
