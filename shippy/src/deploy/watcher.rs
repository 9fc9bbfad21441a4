//! Deployment watcher
//!
//! Polls a service after an update until the new deployment is the only one
//! left, failing fast when one of its tasks stops or the deployment is
//! superseded. Each poll is a pure [`step`] over a [`WatchState`], so the
//! rollout logic runs without a clock or a scheduler.
//!
//! "No ACTIVE deployments left" is the completion test. A brand-new service
//! has nothing to drain, so its first deployment reports success on the
//! first poll, before any task is confirmed healthy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use ecs_model::{DeploymentEvent, DeploymentStatus, Service, Task, TaskStatus};
use tracing::{debug, info};

use crate::config::settings::WatchSettings;
use crate::deploy::clock::{elapsed, Clock};
use crate::deploy::orchestrator::Orchestrator;
use crate::errors::DeployError;

/// Message of the synthesized keep-alive event
pub const STILL_WAITING: &str = "Still waiting…";

/// Watcher timings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// How long a missing deployment record is tolerated
    pub grace_period: Duration,

    /// Delay between polls while the deployment record is missing
    pub grace_retry: Duration,

    /// Delay between polls while older deployments drain
    pub poll_interval: Duration,

    /// Quiet time after which a "still waiting" event is emitted
    pub heartbeat: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(10),
            grace_retry: Duration::from_secs(2),
            poll_interval: Duration::from_secs(3),
            heartbeat: Duration::from_secs(60),
        }
    }
}

impl From<&WatchSettings> for WatchOptions {
    fn from(settings: &WatchSettings) -> Self {
        Self {
            grace_period: settings.grace_period(),
            grace_retry: settings.grace_retry(),
            poll_interval: settings.poll_interval(),
            heartbeat: settings.heartbeat(),
        }
    }
}

/// Why a watch failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchFailure {
    /// A task launched by the deployment stopped
    TaskStopped { task: String, reason: String },

    /// The deployment never showed up within the grace period
    DeploymentNotFound(String),

    /// The deployment is no longer the service's primary
    NotPrimary(DeploymentStatus),
}

impl From<WatchFailure> for DeployError {
    fn from(failure: WatchFailure) -> Self {
        match failure {
            WatchFailure::TaskStopped { task, reason } => DeployError::TaskFailure { task, reason },
            WatchFailure::DeploymentNotFound(id) => DeployError::DeploymentNotFound(format!(
                "Could not find deployment {} in the service",
                id
            )),
            WatchFailure::NotPrimary(status) => DeployError::DeploymentStatus(status),
        }
    }
}

/// Watch status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchStatus {
    Polling,
    Succeeded,
    Failed(WatchFailure),
}

impl WatchStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WatchStatus::Polling)
    }
}

/// State carried from one poll to the next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchState {
    pub started_at: DateTime<Utc>,

    /// Newest service event already reported
    pub last_event_id: Option<String>,

    /// When an event was last reported, real or synthesized
    pub last_event_at: DateTime<Utc>,

    pub status: WatchStatus,
}

impl WatchState {
    /// Start watching from the service snapshot returned by the update.
    /// Events already in the snapshot are not reported.
    pub fn new(initial: &Service, now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            last_event_id: initial.events.first().and_then(|e| e.id.clone()),
            last_event_at: now,
            status: WatchStatus::Polling,
        }
    }
}

/// What one poll saw
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub service: &'a Service,

    /// Stopped tasks started by the watched deployment
    pub stopped_tasks: &'a [Task],

    pub now: DateTime<Utc>,
}

/// Result of one poll
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: WatchState,

    /// Events to report, oldest first
    pub events: Vec<DeploymentEvent>,

    /// How long to wait before the next poll. `None` once terminal.
    pub wait: Option<Duration>,
}

impl Transition {
    fn terminal(mut state: WatchState, status: WatchStatus, events: Vec<DeploymentEvent>) -> Self {
        state.status = status;
        Self {
            state,
            events,
            wait: None,
        }
    }
}

/// Advance the watch by one observation
pub fn step(
    state: WatchState,
    deployment_id: &str,
    observation: &Observation<'_>,
    options: &WatchOptions,
) -> Transition {
    let mut state = state;
    let now = observation.now;

    // A single stopped task is enough to call the rollout broken
    if let Some(task) = observation.stopped_tasks.first() {
        let failure = WatchFailure::TaskStopped {
            task: task.task_arn.clone(),
            reason: task
                .stopped_reason
                .clone()
                .unwrap_or_else(|| "unknown reason".to_string()),
        };
        return Transition::terminal(state, WatchStatus::Failed(failure), Vec::new());
    }

    let Some(deployment) = observation.service.deployment(deployment_id) else {
        // The scheduler API does not always list a new deployment right away
        if elapsed(state.started_at, now) < options.grace_period {
            return Transition {
                state,
                events: Vec::new(),
                wait: Some(options.grace_retry),
            };
        }
        let failure = WatchFailure::DeploymentNotFound(deployment_id.to_string());
        return Transition::terminal(state, WatchStatus::Failed(failure), Vec::new());
    };

    let mut events: Vec<DeploymentEvent> = observation
        .service
        .events
        .iter()
        .take_while(|e| state.last_event_id.is_none() || e.id != state.last_event_id)
        .cloned()
        .collect();

    if let Some(newest) = events.first() {
        if newest.id.is_some() {
            state.last_event_id = newest.id.clone();
        }
        state.last_event_at = now;
    } else if elapsed(state.last_event_at, now) > options.heartbeat {
        events.push(DeploymentEvent {
            id: None,
            created_at: Some(now),
            message: STILL_WAITING.to_string(),
        });
        state.last_event_at = now;
    }

    events.reverse();

    if deployment.status != DeploymentStatus::Primary {
        let failure = WatchFailure::NotPrimary(deployment.status.clone());
        return Transition::terminal(state, WatchStatus::Failed(failure), events);
    }

    if observation.service.active_deployments() == 0 {
        return Transition::terminal(state, WatchStatus::Succeeded, events);
    }

    Transition {
        state,
        events,
        wait: Some(options.poll_interval),
    }
}

/// Drives [`step`] against a live orchestrator
pub struct Watcher<'a, O: ?Sized, C: ?Sized> {
    orchestrator: &'a O,
    clock: &'a C,
    options: WatchOptions,
}

impl<'a, O, C> Watcher<'a, O, C>
where
    O: Orchestrator + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(orchestrator: &'a O, clock: &'a C, options: WatchOptions) -> Self {
        Self {
            orchestrator,
            clock,
            options,
        }
    }

    /// Poll `service` until `deployment_id` has fully rolled out. Each new
    /// service event is passed to `on_event` in chronological order.
    pub async fn wait_for_deployment<F>(
        &self,
        service: &Service,
        deployment_id: &str,
        mut on_event: F,
    ) -> Result<(), DeployError>
    where
        F: FnMut(&DeploymentEvent),
    {
        let cluster = service.cluster_arn.as_str();
        let service_name = service.service_name.as_str();
        info!("Waiting for deployment {} of {}", deployment_id, service_name);

        let mut state = WatchState::new(service, self.clock.now());

        loop {
            let current = self.orchestrator.describe_service(cluster, service_name).await?;
            let stopped_tasks = self.stopped_tasks(cluster, deployment_id).await?;

            let observation = Observation {
                service: &current,
                stopped_tasks: &stopped_tasks,
                now: self.clock.now(),
            };
            let transition = step(state, deployment_id, &observation, &self.options);

            for event in &transition.events {
                on_event(event);
            }

            match (&transition.state.status, transition.wait) {
                (WatchStatus::Succeeded, _) => {
                    info!("Deployment {} of {} is live", deployment_id, service_name);
                    return Ok(());
                }
                (WatchStatus::Failed(failure), _) => {
                    return Err(failure.clone().into());
                }
                (WatchStatus::Polling, wait) => {
                    let wait = wait.unwrap_or(self.options.poll_interval);
                    debug!("Deployment {} still rolling out, next poll in {:?}", deployment_id, wait);
                    self.clock.sleep(wait).await;
                }
            }

            state = transition.state;
        }
    }

    async fn stopped_tasks(&self, cluster: &str, deployment_id: &str) -> Result<Vec<Task>, DeployError> {
        let mut arns = self.orchestrator.list_stopped_tasks(cluster, deployment_id).await?;
        if arns.is_empty() {
            return Ok(Vec::new());
        }

        // One stopped task decides the outcome; a crash loop can list hundreds
        arns.truncate(1);
        let tasks = self.orchestrator.describe_tasks(cluster, &arns).await?;
        if !tasks.is_empty() {
            return Ok(tasks);
        }

        // Listed but already gone from describe: still a stopped task
        Ok(arns
            .into_iter()
            .map(|task_arn| Task {
                task_arn,
                started_by: Some(deployment_id.to_string()),
                last_status: TaskStatus::Stopped,
                stopped_reason: None,
            })
            .collect())
    }
}
