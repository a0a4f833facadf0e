//! lakesync worker library.
//!
//! Routes durable data-pipeline jobs (catalog discovery, connection testing,
//! data synchronization) onto a Kubernetes cluster through a durable workflow
//! engine. The worker connects to the engine, registers the three job
//! workflows and their activities on a single task queue, and schedules the
//! resulting workloads onto nodes selected by a validated per-job node-label
//! routing table.

pub mod activities;
pub mod config;
pub mod core;
pub mod engine;
pub mod health;
pub mod pods;
pub mod scheduling;
pub mod store;
#[cfg(test)]
mod testing;
pub mod timeouts;
pub mod worker;
