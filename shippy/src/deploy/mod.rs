//! Deployment module

pub mod branch;
pub mod clock;
pub mod orchestrator;
pub mod service;
pub mod task_spec;
pub mod watcher;
