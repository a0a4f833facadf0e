//! Workflow-engine boundary for the worker.
//!
//! The worker drives the engine through the traits in [`base`]: a connector
//! opens a client at the configured address, the client creates a worker
//! bound to one task queue, and the worker registers workflows and
//! activities before entering its blocking run loop. Consumers should depend
//! on the traits and avoid relying on a specific transport; keeping the
//! abstraction here lets us swap implementations in tests.
//!
//! The default client, [`http::HttpEngineConnector`], speaks a long-poll
//! HTTP protocol to the engine frontend.

mod base;
pub mod http;

pub use base::*;
