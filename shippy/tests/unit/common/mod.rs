//! Fakes shared by the integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use ecs_model::{
    ContainerDefinition, Deployment, DeploymentEvent, DeploymentStatus, Service, Task,
    TaskDefinition, TaskStatus,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use secrecy::SecretString;

use shippy::config::settings::{ClusterSettings, SiteSettings};
use shippy::deploy::branch::Environment;
use shippy::deploy::clock::Clock;
use shippy::deploy::orchestrator::{Orchestrator, UpdateTarget};
use shippy::errors::DeployError;
use shippy::image::builder::ImageBuilder;
use shippy::image::registry::{ImageRegistry, RegistryCredentials};
use shippy::notify::{NotificationChannel, NotifyLinks, Notifier, SlackMessage};

pub const REPOSITORY: &str = "123456789012.dkr.ecr.us-east-1.amazonaws.com/cob-digital-apps-staging/permits";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn deployment(id: &str, status: DeploymentStatus) -> Deployment {
    Deployment {
        id: id.to_string(),
        status,
        task_definition: format!("arn:aws:ecs:us-east-1:1:task-definition/{}", id),
        desired_count: 1,
        pending_count: 0,
        running_count: 1,
        rollout_state: None,
    }
}

pub fn event(id: &str, message: &str) -> DeploymentEvent {
    DeploymentEvent {
        id: Some(id.to_string()),
        created_at: Some(t0()),
        message: message.to_string(),
    }
}

pub fn service(deployments: Vec<Deployment>, events: Vec<DeploymentEvent>) -> Service {
    Service {
        service_name: "permits".to_string(),
        cluster_arn: "AppsStaging".to_string(),
        deployments,
        events,
        ..Default::default()
    }
}

pub fn stopped_task(arn: &str, started_by: &str, reason: &str) -> Task {
    Task {
        task_arn: arn.to_string(),
        started_by: Some(started_by.to_string()),
        last_status: TaskStatus::Stopped,
        stopped_reason: Some(reason.to_string()),
    }
}

/// A task definition with the app container and an unrelated sidecar
pub fn task_definition(family: &str, revision: u32, image: &str) -> TaskDefinition {
    let mut app = ContainerDefinition::new("app", image);
    app.settings.insert(
        "portMappings".to_string(),
        serde_json::json!([{ "containerPort": 3000 }]),
    );

    TaskDefinition {
        task_definition_arn: Some(format!(
            "arn:aws:ecs:us-east-1:1:task-definition/{}:{}",
            family, revision
        )),
        family: family.to_string(),
        revision: Some(revision),
        task_role_arn: Some("arn:aws:iam::1:role/permits".to_string()),
        execution_role_arn: None,
        network_mode: Some("bridge".to_string()),
        container_definitions: vec![app, ContainerDefinition::new("db", "postgres:10")],
        volumes: vec![serde_json::json!({ "name": "scratch" })],
        placement_constraints: Vec::new(),
        requires_compatibilities: vec!["EC2".to_string()],
        cpu: None,
        memory: Some("512".to_string()),
    }
}

/// A clock that only moves when slept on or advanced. Sleeps return
/// immediately.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let delta = chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }

    /// Every duration slept so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
        self.advance(duration);
    }
}

/// Scripted orchestrator. `describe_service` walks through `polls` and
/// repeats the last entry once they run out.
#[derive(Default)]
pub struct FakeOrchestrator {
    pub latest: Mutex<Option<TaskDefinition>>,
    pub updated: Mutex<Option<Service>>,
    pub polls: Mutex<VecDeque<Service>>,
    pub stopped: Mutex<Vec<Task>>,
    pub registered: Mutex<Vec<TaskDefinition>>,
    pub updates: Mutex<Vec<(String, String, UpdateTarget)>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latest(self, definition: TaskDefinition) -> Self {
        *self.latest.lock().unwrap() = Some(definition);
        self
    }

    pub fn with_update(self, service: Service) -> Self {
        *self.updated.lock().unwrap() = Some(service);
        self
    }

    pub fn with_polls(self, polls: Vec<Service>) -> Self {
        *self.polls.lock().unwrap() = polls.into();
        self
    }

    pub fn with_stopped(self, tasks: Vec<Task>) -> Self {
        *self.stopped.lock().unwrap() = tasks;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn describe_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with("describe_service"))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn latest_task_definition(&self, family: &str) -> Result<TaskDefinition, DeployError> {
        self.record(format!("latest_task_definition {}", family));
        self.latest
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DeployError::OrchestratorError(format!("No task definition {}", family)))
    }

    async fn register_task_definition(
        &self,
        definition: &TaskDefinition,
    ) -> Result<TaskDefinition, DeployError> {
        self.record(format!("register_task_definition {}", definition.family));
        let mut registered = self.registered.lock().unwrap();
        let revision = 10 + registered.len() as u32;

        let mut definition = definition.clone();
        definition.revision = Some(revision);
        definition.task_definition_arn = Some(format!(
            "arn:aws:ecs:us-east-1:1:task-definition/{}:{}",
            definition.family, revision
        ));
        registered.push(definition.clone());
        Ok(definition)
    }

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        target: &UpdateTarget,
    ) -> Result<Service, DeployError> {
        self.record(format!("update_service {}/{}", cluster, service));
        self.updates
            .lock()
            .unwrap()
            .push((cluster.to_string(), service.to_string(), target.clone()));
        self.updated
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DeployError::OrchestratorError(format!("No service {}", service)))
    }

    async fn describe_service(&self, cluster: &str, service: &str) -> Result<Service, DeployError> {
        self.record(format!("describe_service {}/{}", cluster, service));
        let mut polls = self.polls.lock().unwrap();
        let current = if polls.len() > 1 {
            polls.pop_front()
        } else {
            polls.front().cloned()
        };
        current.ok_or_else(|| DeployError::OrchestratorError(format!("No service {}", service)))
    }

    async fn list_stopped_tasks(
        &self,
        _cluster: &str,
        started_by: &str,
    ) -> Result<Vec<String>, DeployError> {
        Ok(self
            .stopped
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.started_by.as_deref() == Some(started_by))
            .map(|t| t.task_arn.clone())
            .collect())
    }

    async fn describe_tasks(
        &self,
        _cluster: &str,
        task_arns: &[String],
    ) -> Result<Vec<Task>, DeployError> {
        self.record(format!("describe_tasks {}", task_arns.len()));
        Ok(self
            .stopped
            .lock()
            .unwrap()
            .iter()
            .filter(|t| task_arns.contains(&t.task_arn))
            .cloned()
            .collect())
    }

    async fn deregister_task_definition(&self, arn: &str) -> Result<(), DeployError> {
        self.record(format!("deregister_task_definition {}", arn));
        Ok(())
    }
}

/// Records builder calls. `fail_build` makes every build fail.
#[derive(Default)]
pub struct FakeBuilder {
    pub fail_build: bool,
    pub cache_hit: bool,
    pub calls: Mutex<Vec<String>>,
    pub cache_from: Mutex<Option<String>>,
}

impl FakeBuilder {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageBuilder for FakeBuilder {
    async fn login(
        &self,
        endpoint: &str,
        username: &str,
        _password: &SecretString,
    ) -> Result<(), DeployError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("login {} {}", username, endpoint));
        Ok(())
    }

    async fn build(
        &self,
        _dir: &Path,
        _dockerfile: &Path,
        cache_from: Option<&str>,
        tags: &[String],
    ) -> Result<(), DeployError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("build {}", tags.join(",")));
        *self.cache_from.lock().unwrap() = cache_from.map(str::to_string);
        if self.fail_build {
            return Err(DeployError::BuildError("Error building container".to_string()));
        }
        Ok(())
    }

    async fn push(&self, image: &str) -> Result<(), DeployError> {
        self.calls.lock().unwrap().push(format!("push {}", image));
        Ok(())
    }

    async fn pull(&self, image: &str) -> bool {
        self.calls.lock().unwrap().push(format!("pull {}", image));
        self.cache_hit
    }
}

/// Registry with a fixed repository and a single endpoint
pub struct FakeRegistry;

#[async_trait]
impl ImageRegistry for FakeRegistry {
    async fn repository(
        &self,
        _environment: Environment,
        _service_name: &str,
    ) -> Result<String, DeployError> {
        Ok(REPOSITORY.to_string())
    }

    async fn credentials(&self) -> Result<Vec<RegistryCredentials>, DeployError> {
        let token = BASE64.encode("AWS:hunter2");
        Ok(vec![RegistryCredentials::decode(
            "https://123456789012.dkr.ecr.us-east-1.amazonaws.com",
            &token,
        )?])
    }
}

/// Keeps every message it is sent
#[derive(Default)]
pub struct RecordingChannel {
    pub messages: Mutex<Vec<SlackMessage>>,
}

impl RecordingChannel {
    pub fn titles(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .flat_map(|m| m.attachments.iter().map(|a| a.title.clone()))
            .collect()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, message: &SlackMessage) -> Result<(), DeployError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// A channel that is always down
pub struct FailingChannel;

#[async_trait]
impl NotificationChannel for FailingChannel {
    async fn send(&self, _message: &SlackMessage) -> Result<(), DeployError> {
        Err(DeployError::NotificationError("503 Service Unavailable".to_string()))
    }
}

pub fn links() -> NotifyLinks {
    NotifyLinks {
        region: "us-east-1".to_string(),
        clusters: ClusterSettings::default(),
        sites: SiteSettings::default(),
        footer_icon: "https://example.org/icon.png".to_string(),
    }
}

pub fn notifier(channel: Option<Arc<dyn NotificationChannel>>) -> Notifier {
    Notifier::new(channel, links(), StdRng::seed_from_u64(7))
}
