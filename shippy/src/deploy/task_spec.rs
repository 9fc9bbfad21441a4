//! Task definition updates

use ecs_model::TaskDefinition;
use tracing::{debug, info};

use crate::deploy::orchestrator::Orchestrator;
use crate::errors::DeployError;
use crate::image::reference::repository_of;

/// Derive the next revision of a task definition running `new_image`.
///
/// Containers whose image shares the new image's repository are switched to
/// the new image. Other containers (e.g. a database sidecar) keep theirs. The
/// scheduler-assigned ARN and revision are cleared; every other field is
/// copied as is.
pub fn derive_next_spec(current: &TaskDefinition, new_image: &str) -> TaskDefinition {
    let repository = repository_of(new_image);

    let container_definitions = current
        .container_definitions
        .iter()
        .map(|container| {
            let mut container = container.clone();
            if container.image.starts_with(repository) {
                debug!("Container {}: {} -> {}", container.name, container.image, new_image);
                container.image = new_image.to_string();
            }
            container
        })
        .collect();

    TaskDefinition {
        task_definition_arn: None,
        revision: None,
        container_definitions,
        ..current.clone()
    }
}

/// Derive the next revision from `current` and register it. Returns the
/// registered definition, including its new ARN.
pub async fn register_next_spec<O>(
    orchestrator: &O,
    current: &TaskDefinition,
    new_image: &str,
) -> Result<TaskDefinition, DeployError>
where
    O: Orchestrator + ?Sized,
{
    let next = derive_next_spec(current, new_image);
    let registered = orchestrator.register_task_definition(&next).await?;

    info!(
        "Registered {} revision {} for {}",
        registered.family,
        registered
            .revision
            .map(|r| r.to_string())
            .unwrap_or_else(|| "?".to_string()),
        new_image
    );

    Ok(registered)
}
