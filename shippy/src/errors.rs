//! Error types for shippy

use ecs_model::DeploymentStatus;
use thiserror::Error;

/// Main error type for a deploy run
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Branch parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Registry authentication error: {0}")]
    RegistryAuthError(String),

    #[error("Image build error: {0}")]
    BuildError(String),

    #[error("Image push error: {0}")]
    PushError(String),

    #[error("Orchestrator error: {0}")]
    OrchestratorError(String),

    #[error("Deployment not found: {0}")]
    DeploymentNotFound(String),

    #[error("Deployment task {task} failed: {reason}")]
    TaskFailure { task: String, reason: String },

    #[error("Deployment failed with status {0}")]
    DeploymentStatus(DeploymentStatus),

    #[error("Notification error: {0}")]
    NotificationError(String),
}
