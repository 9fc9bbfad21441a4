//! Cluster scheduler capability

use async_trait::async_trait;
use ecs_model::{Service, Task, TaskDefinition};

use crate::errors::DeployError;

/// What a service update rolls onto
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateTarget {
    /// Switch the service to a registered task definition
    TaskDefinition(String),

    /// Redeploy the current task definition with a fixed desired count
    ForceRedeploy { desired_count: u32 },
}

/// Operations shippy needs from the cluster scheduler.
///
/// Deployment lists in returned services are newest first. Every failure is
/// reported as [`DeployError::OrchestratorError`].
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Latest registered task definition of a family
    async fn latest_task_definition(&self, family: &str) -> Result<TaskDefinition, DeployError>;

    /// Register a new task definition revision
    async fn register_task_definition(
        &self,
        definition: &TaskDefinition,
    ) -> Result<TaskDefinition, DeployError>;

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        target: &UpdateTarget,
    ) -> Result<Service, DeployError>;

    async fn describe_service(&self, cluster: &str, service: &str) -> Result<Service, DeployError>;

    /// ARNs of stopped tasks launched by the given deployment
    async fn list_stopped_tasks(
        &self,
        cluster: &str,
        started_by: &str,
    ) -> Result<Vec<String>, DeployError>;

    async fn describe_tasks(
        &self,
        cluster: &str,
        task_arns: &[String],
    ) -> Result<Vec<Task>, DeployError>;

    async fn deregister_task_definition(&self, arn: &str) -> Result<(), DeployError>;
}
