//! ECS orchestrator backed by the `aws ecs` commands

use async_trait::async_trait;
use ecs_model::{Service, Task, TaskDefinition};
use serde::Deserialize;
use tracing::{debug, info};

use crate::aws::cli::AwsCli;
use crate::deploy::orchestrator::{Orchestrator, UpdateTarget};
use crate::errors::DeployError;

const DESCRIBE_TASKS_LIMIT: usize = 100;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskDefinitionResponse {
    task_definition: TaskDefinition,
}

#[derive(Deserialize)]
struct ServiceResponse {
    service: Service,
}

#[derive(Deserialize)]
struct DescribeServicesResponse {
    #[serde(default)]
    services: Vec<Service>,
    #[serde(default)]
    failures: Vec<Failure>,
}

#[derive(Deserialize)]
struct Failure {
    #[serde(default)]
    arn: String,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTasksResponse {
    #[serde(default)]
    task_arns: Vec<String>,
}

#[derive(Deserialize)]
struct DescribeTasksResponse {
    #[serde(default)]
    tasks: Vec<Task>,
}

/// Orchestrator talking to ECS through the cloud CLI
#[derive(Debug, Clone)]
pub struct EcsCli {
    cli: AwsCli,
}

impl EcsCli {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl Orchestrator for EcsCli {
    async fn latest_task_definition(&self, family: &str) -> Result<TaskDefinition, DeployError> {
        let response: TaskDefinitionResponse = self
            .cli
            .json(&["ecs", "describe-task-definition", "--task-definition", family])
            .await?;
        Ok(response.task_definition)
    }

    async fn register_task_definition(
        &self,
        definition: &TaskDefinition,
    ) -> Result<TaskDefinition, DeployError> {
        // Registration rejects the scheduler-assigned fields
        let input = TaskDefinition {
            task_definition_arn: None,
            revision: None,
            ..definition.clone()
        };
        let input = serde_json::to_string(&input)?;

        let response: TaskDefinitionResponse = self
            .cli
            .json(&["ecs", "register-task-definition", "--cli-input-json", &input])
            .await?;

        info!(
            "Registered task definition {}",
            response
                .task_definition
                .task_definition_arn
                .as_deref()
                .unwrap_or(&response.task_definition.family)
        );
        Ok(response.task_definition)
    }

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        target: &UpdateTarget,
    ) -> Result<Service, DeployError> {
        let desired_count = match target {
            UpdateTarget::ForceRedeploy { desired_count } => desired_count.to_string(),
            UpdateTarget::TaskDefinition(_) => String::new(),
        };

        let mut args = vec!["ecs", "update-service", "--cluster", cluster, "--service", service];
        match target {
            UpdateTarget::TaskDefinition(arn) => {
                args.extend(["--task-definition", arn.as_str()]);
            }
            UpdateTarget::ForceRedeploy { .. } => {
                args.extend(["--force-new-deployment", "--desired-count", desired_count.as_str()]);
            }
        }

        let response: ServiceResponse = self.cli.json(&args).await?;
        Ok(response.service)
    }

    async fn describe_service(&self, cluster: &str, service: &str) -> Result<Service, DeployError> {
        let response: DescribeServicesResponse = self
            .cli
            .json(&["ecs", "describe-services", "--cluster", cluster, "--services", service])
            .await?;

        if let Some(failure) = response.failures.first() {
            return Err(DeployError::OrchestratorError(format!(
                "Could not describe {}: {}",
                failure.arn, failure.reason
            )));
        }

        response.services.into_iter().next().ok_or_else(|| {
            DeployError::OrchestratorError(format!("Service {} not found in {}", service, cluster))
        })
    }

    async fn list_stopped_tasks(
        &self,
        cluster: &str,
        started_by: &str,
    ) -> Result<Vec<String>, DeployError> {
        let response: ListTasksResponse = self
            .cli
            .json(&[
                "ecs",
                "list-tasks",
                "--cluster",
                cluster,
                "--started-by",
                started_by,
                "--desired-status",
                "STOPPED",
            ])
            .await?;
        Ok(response.task_arns)
    }

    async fn describe_tasks(
        &self,
        cluster: &str,
        task_arns: &[String],
    ) -> Result<Vec<Task>, DeployError> {
        let mut tasks = Vec::with_capacity(task_arns.len());

        // describe-tasks accepts at most 100 ARNs per call
        for chunk in task_arns.chunks(DESCRIBE_TASKS_LIMIT) {
            let mut args = vec!["ecs", "describe-tasks", "--cluster", cluster, "--tasks"];
            args.extend(chunk.iter().map(String::as_str));

            let response: DescribeTasksResponse = self.cli.json(&args).await?;
            tasks.extend(response.tasks);
        }

        Ok(tasks)
    }

    async fn deregister_task_definition(&self, arn: &str) -> Result<(), DeployError> {
        debug!("Deregistering task definition {}", arn);
        self.cli
            .run(&["ecs", "deregister-task-definition", "--task-definition", arn])
            .await?;
        Ok(())
    }
}
