//! Scheduler models

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A versioned task definition. Registered definitions are immutable; a new
/// revision supersedes the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    /// Assigned by the scheduler on registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_definition_arn: Option<String>,

    pub family: String,

    /// Assigned by the scheduler on registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_role_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_role_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,

    #[serde(default)]
    pub container_definitions: Vec<ContainerDefinition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub placement_constraints: Vec<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires_compatibilities: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

/// One container entry of a task definition.
///
/// Only `name` and `image` are interpreted; port mappings, environment, log
/// configuration and the rest are carried through untouched in `settings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDefinition {
    pub name: String,

    pub image: String,

    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl ContainerDefinition {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            settings: Map::new(),
        }
    }
}

/// Current state of a running service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default)]
    pub service_name: String,

    #[serde(default)]
    pub cluster_arn: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_definition: Option<String>,

    #[serde(default)]
    pub desired_count: u32,

    #[serde(default)]
    pub running_count: u32,

    /// Newest first
    #[serde(default)]
    pub deployments: Vec<Deployment>,

    /// Newest first
    #[serde(default)]
    pub events: Vec<DeploymentEvent>,
}

impl Service {
    /// Find a deployment by id
    pub fn deployment(&self, id: &str) -> Option<&Deployment> {
        self.deployments.iter().find(|d| d.id == id)
    }

    /// Number of deployments still draining older task definitions
    pub fn active_deployments(&self) -> usize {
        self.deployments
            .iter()
            .filter(|d| d.status == DeploymentStatus::Active)
            .count()
    }
}

/// Rollout record for one task definition within a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,

    pub status: DeploymentStatus,

    #[serde(default)]
    pub task_definition: String,

    #[serde(default)]
    pub desired_count: u32,

    #[serde(default)]
    pub pending_count: u32,

    #[serde(default)]
    pub running_count: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_state: Option<String>,
}

/// Deployment status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeploymentStatus {
    /// The target state of the service
    Primary,

    /// An older deployment that is still draining
    Active,

    /// Superseded or rolled back
    Inactive,
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentStatus::Primary => "PRIMARY",
            DeploymentStatus::Active => "ACTIVE",
            DeploymentStatus::Inactive => "INACTIVE",
        };
        f.write_str(s)
    }
}

/// A service event message. Reported newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentEvent {
    /// Absent on events synthesized locally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub message: String,
}

/// Accepts RFC 3339 text or epoch seconds. The v1 cloud CLI prints the
/// latter unless `cli_timestamp_format` is set.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timestamp {
        Text(DateTime<Utc>),
        Epoch(f64),
    }

    match Option::<Timestamp>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Timestamp::Text(at)) => Ok(Some(at)),
        Some(Timestamp::Epoch(secs)) => {
            DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", secs)))
        }
    }
}

/// A unit of execution launched by a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_arn: String,

    /// Deployment id for tasks launched by a service rollout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_by: Option<String>,

    #[serde(default)]
    pub last_status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_reason: Option<String>,
}

/// Task status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Running,
    Stopped,
    /// Provisioning, pending and the other transitional states
    #[default]
    #[serde(other)]
    Other,
}
