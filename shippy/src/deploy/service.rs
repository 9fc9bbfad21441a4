//! Service updates

use ecs_model::{DeploymentStatus, Service};
use tracing::{info, warn};

use crate::config::settings::ClusterSettings;
use crate::deploy::branch::Environment;
use crate::deploy::orchestrator::{Orchestrator, UpdateTarget};
use crate::deploy::task_spec::register_next_spec;
use crate::errors::DeployError;

/// A service right after an update, with the deployment the update started
#[derive(Debug, Clone)]
pub struct ServiceUpdate {
    pub service: Service,
    pub deployment_id: String,
}

/// Result of rolling a service onto a new image
#[derive(Debug, Clone)]
pub struct Rollout {
    pub update: ServiceUpdate,

    pub new_task_definition_arn: String,

    /// Task definition to go back to if the rollout fails: the one the
    /// service was last running, or the one the new revision was derived from.
    pub previous_task_definition_arn: Option<String>,
}

/// Task definition family of a service: `<cluster>-<service>`
pub fn task_family(cluster: &str, service_name: &str) -> String {
    format!("{}-{}", cluster, service_name)
}

fn newest_deployment(service: Service) -> Result<ServiceUpdate, DeployError> {
    let deployment_id = service
        .deployments
        .first()
        .map(|d| d.id.clone())
        .ok_or_else(|| {
            DeployError::DeploymentNotFound(format!(
                "Could not find the new deployment of {}",
                service.service_name
            ))
        })?;

    Ok(ServiceUpdate {
        service,
        deployment_id,
    })
}

/// Point a service at a registered task definition
pub async fn update_service<O>(
    orchestrator: &O,
    clusters: &ClusterSettings,
    environment: Environment,
    service_name: &str,
    task_definition_arn: &str,
) -> Result<ServiceUpdate, DeployError>
where
    O: Orchestrator + ?Sized,
{
    let cluster = clusters.cluster_for(environment);
    info!("Updating {}/{} to {}", cluster, service_name, task_definition_arn);

    let service = orchestrator
        .update_service(
            cluster,
            service_name,
            &UpdateTarget::TaskDefinition(task_definition_arn.to_string()),
        )
        .await?;

    newest_deployment(service)
}

/// Redeploy a service's current task definition with a single task
pub async fn force_restart<O>(
    orchestrator: &O,
    clusters: &ClusterSettings,
    environment: Environment,
    service_name: &str,
) -> Result<ServiceUpdate, DeployError>
where
    O: Orchestrator + ?Sized,
{
    let cluster = clusters.cluster_for(environment);
    info!("Restarting {}/{}", cluster, service_name);

    let service = orchestrator
        .update_service(cluster, service_name, &UpdateTarget::ForceRedeploy { desired_count: 1 })
        .await?;

    newest_deployment(service)
}

/// Register a task definition running `image` and roll the service onto it
pub async fn roll_out_image<O>(
    orchestrator: &O,
    clusters: &ClusterSettings,
    environment: Environment,
    service_name: &str,
    image: &str,
) -> Result<Rollout, DeployError>
where
    O: Orchestrator + ?Sized,
{
    let family = task_family(clusters.cluster_for(environment), service_name);
    let latest = orchestrator.latest_task_definition(&family).await?;
    let registered = register_next_spec(orchestrator, &latest, image).await?;

    let new_task_definition_arn = registered.task_definition_arn.clone().ok_or_else(|| {
        DeployError::OrchestratorError(format!("Registered {} has no ARN", registered.family))
    })?;

    let update = update_service(
        orchestrator,
        clusters,
        environment,
        service_name,
        &new_task_definition_arn,
    )
    .await?;

    // The latest registered revision may never have run successfully, so
    // prefer whatever the service is still draining.
    let previous_task_definition_arn = update
        .service
        .deployments
        .iter()
        .rev()
        .find(|d| d.status == DeploymentStatus::Active)
        .map(|d| d.task_definition.clone())
        .or_else(|| latest.task_definition_arn.clone());

    Ok(Rollout {
        update,
        new_task_definition_arn,
        previous_task_definition_arn,
    })
}

/// Deregister a task definition revision. Used when backing out a bad
/// rollout by hand.
pub async fn deregister<O>(orchestrator: &O, task_definition_arn: &str) -> Result<(), DeployError>
where
    O: Orchestrator + ?Sized,
{
    warn!("Deregistering task definition {}", task_definition_arn);
    orchestrator.deregister_task_definition(task_definition_arn).await
}
