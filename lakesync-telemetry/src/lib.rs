//! Tracing initialization for lakesync services.
//!
//! Production environments log structured JSON to rotating daily files;
//! development logs pretty-printed output to the terminal.

mod tracing;

pub use crate::tracing::*;
