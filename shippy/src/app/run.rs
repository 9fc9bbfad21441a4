//! Deploy pipeline
//!
//! One run owns one branch: build → push → register → update → watch, with
//! notifications at the start and at the terminal state.

use ecs_model::DeploymentEvent;
use tracing::{error, info, warn};

use crate::app::options::BuildRequest;
use crate::config::settings::ClusterSettings;
use crate::config::CiContext;
use crate::deploy::branch::BranchDescriptor;
use crate::deploy::clock::Clock;
use crate::deploy::orchestrator::Orchestrator;
use crate::deploy::service::{deregister, force_restart, roll_out_image};
use crate::deploy::watcher::{WatchOptions, Watcher};
use crate::errors::DeployError;
use crate::image::builder::ImageBuilder;
use crate::image::reference::tagged;
use crate::image::registry::{login, ImageRegistry};
use crate::notify::{Delivery, NotifyContext, Notifier, Stage};

/// Summary of a finished rollout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub service_name: String,
    pub deployment_id: String,

    /// Image the service now runs; `None` for restarts
    pub image: Option<String>,

    pub task_definition_arn: Option<String>,

    pub previous_task_definition_arn: Option<String>,
}

/// Everything a deploy run talks to
pub struct Pipeline<'a> {
    pub ci: CiContext,
    pub script_name: String,
    pub clusters: ClusterSettings,
    pub watch: WatchOptions,
    pub orchestrator: &'a dyn Orchestrator,
    pub registry: &'a dyn ImageRegistry,
    pub builder: &'a dyn ImageBuilder,
    pub clock: &'a dyn Clock,
    pub notifier: &'a Notifier,
}

impl Pipeline<'_> {
    /// Branch descriptor of the CI build
    pub fn branch(&self) -> Result<BranchDescriptor, DeployError> {
        let branch = self
            .ci
            .branch
            .as_deref()
            .ok_or_else(|| DeployError::ParseError("No branch to deploy".to_string()))?;
        BranchDescriptor::parse(branch)
    }

    /// Send a notification about this run
    pub async fn notify(&self, stage: Stage, error: Option<&str>) -> Delivery {
        let context = NotifyContext {
            ci: &self.ci,
            script_name: &self.script_name,
            error,
        };
        self.notifier.notify(stage, &context).await
    }

    /// Build the branch's image and roll its service onto it
    pub async fn deploy<F>(&self, request: &BuildRequest, on_event: F) -> Result<DeployReport, DeployError>
    where
        F: FnMut(&DeploymentEvent),
    {
        let result = match self.branch() {
            Ok(branch) => {
                self.notify(Stage::Start, None).await;
                self.deploy_impl(&branch, request, on_event).await
            }
            Err(e) => Err(e),
        };
        self.finish(result).await
    }

    /// Redeploy the branch's service without building
    pub async fn restart<F>(&self, on_event: F) -> Result<DeployReport, DeployError>
    where
        F: FnMut(&DeploymentEvent),
    {
        let result = match self.branch() {
            Ok(branch) => {
                self.notify(Stage::Start, None).await;
                self.restart_impl(&branch, on_event).await
            }
            Err(e) => Err(e),
        };
        self.finish(result).await
    }

    /// Deregister a task definition revision
    pub async fn deregister(&self, task_definition_arn: &str) -> Result<(), DeployError> {
        deregister(self.orchestrator, task_definition_arn).await
    }

    async fn finish(&self, result: Result<DeployReport, DeployError>) -> Result<DeployReport, DeployError> {
        match result {
            Ok(report) => {
                info!("Deployed {} ({})", report.service_name, report.deployment_id);
                self.notify(Stage::Complete, None).await;
                Ok(report)
            }
            Err(e) => {
                error!("Deploy failed: {}", e);
                self.notify(Stage::Error, Some(&e.to_string())).await;
                Err(e)
            }
        }
    }

    async fn deploy_impl<F>(
        &self,
        branch: &BranchDescriptor,
        request: &BuildRequest,
        on_event: F,
    ) -> Result<DeployReport, DeployError>
    where
        F: FnMut(&DeploymentEvent),
    {
        let repository = self
            .registry
            .repository(branch.environment, &branch.service_name)
            .await?;
        login(self.registry, self.builder).await?;

        // Last build of this tag seeds the layer cache
        let cache_image = tagged(&repository, branch.image_tag());
        let cache_from = if self.builder.pull(&cache_image).await {
            Some(cache_image.as_str())
        } else {
            info!("No cached image at {}, building from scratch", cache_image);
            None
        };

        let mut tags = vec![cache_image.clone()];
        let image = match self.ci.commit.as_deref() {
            Some(commit) => {
                let image = tagged(&repository, commit);
                tags.push(image.clone());
                image
            }
            None => cache_image.clone(),
        };

        self.builder
            .build(&request.context_dir, &request.dockerfile, cache_from, &tags)
            .await?;
        for tag in &tags {
            self.builder.push(tag).await?;
        }

        let service_name = branch.ecs_service_name();
        let rollout = roll_out_image(
            self.orchestrator,
            &self.clusters,
            branch.environment,
            &service_name,
            &image,
        )
        .await?;

        let watcher = Watcher::new(self.orchestrator, self.clock, self.watch.clone());
        if let Err(e) = watcher
            .wait_for_deployment(&rollout.update.service, &rollout.update.deployment_id, on_event)
            .await
        {
            match &rollout.previous_task_definition_arn {
                Some(previous) => warn!(
                    "Rollout of {} failed; previous task definition is {}",
                    rollout.new_task_definition_arn, previous
                ),
                None => warn!(
                    "Rollout of {} failed; no previous task definition",
                    rollout.new_task_definition_arn
                ),
            }
            return Err(e);
        }

        Ok(DeployReport {
            service_name,
            deployment_id: rollout.update.deployment_id,
            image: Some(image),
            task_definition_arn: Some(rollout.new_task_definition_arn),
            previous_task_definition_arn: rollout.previous_task_definition_arn,
        })
    }

    async fn restart_impl<F>(&self, branch: &BranchDescriptor, on_event: F) -> Result<DeployReport, DeployError>
    where
        F: FnMut(&DeploymentEvent),
    {
        let service_name = branch.ecs_service_name();
        let update = force_restart(self.orchestrator, &self.clusters, branch.environment, &service_name).await?;

        let watcher = Watcher::new(self.orchestrator, self.clock, self.watch.clone());
        watcher
            .wait_for_deployment(&update.service, &update.deployment_id, on_event)
            .await?;

        Ok(DeployReport {
            service_name,
            deployment_id: update.deployment_id,
            image: None,
            task_definition_arn: update.service.task_definition.clone(),
            previous_task_definition_arn: None,
        })
    }
}
