//! Cluster scheduler models
//!
//! Serde types for the task definitions, services, deployments and tasks the
//! cluster scheduler reports. Field names follow the scheduler's JSON output.

pub mod models;

pub use models::*;
