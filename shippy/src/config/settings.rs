//! Deploy settings

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::deploy::branch::Environment;
use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Environment variable holding the webhook URL for deploy notifications
pub const WEBHOOK_URL_ENV: &str = "SLACK_DEPLOY_WEBHOOK_URL";

/// Settings for a deploy run. Built once at process start and passed to the
/// adapters that need them.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,

    /// Cloud account settings
    #[serde(default)]
    pub aws: AwsSettings,

    /// Cluster names per environment
    #[serde(default)]
    pub clusters: ClusterSettings,

    /// Image registry names per environment
    #[serde(default)]
    pub registries: RegistrySettings,

    /// Static site hosts per environment
    #[serde(default)]
    pub sites: SiteSettings,

    /// Notification channel
    #[serde(default)]
    pub slack: SlackSettings,

    /// Deployment watcher timings
    #[serde(default)]
    pub watch: WatchSettings,
}

impl Settings {
    /// Load settings from an optional JSON file, then apply overrides from
    /// the process environment.
    pub async fn load(file: Option<&File>) -> Result<Self, DeployError> {
        let mut settings = match file {
            Some(file) if file.exists().await => {
                debug!("Reading settings from {}", file.path().display());
                file.read_json::<Settings>().await?
            }
            Some(file) => {
                return Err(DeployError::ConfigError(format!(
                    "Settings file {} does not exist",
                    file.path().display()
                )));
            }
            None => Settings::default(),
        };

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Apply environment overrides using the given lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(region) = lookup("AWS_REGION").or_else(|| lookup("AWS_DEFAULT_REGION")) {
            self.aws.region = region;
        }

        if let Some(url) = lookup(WEBHOOK_URL_ENV).filter(|u| !u.is_empty()) {
            self.slack.webhook_url = Some(SecretString::from(url));
        }

        if let Some(level) = lookup("SHIPPY_LOG_LEVEL") {
            match level.parse() {
                Ok(level) => self.log_level = level,
                Err(e) => warn!("Ignoring SHIPPY_LOG_LEVEL: {}", e),
            }
        }
    }
}

/// Cloud account settings
#[derive(Debug, Clone, Deserialize)]
pub struct AwsSettings {
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            region: default_region(),
        }
    }
}

/// Cluster names per environment
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterSettings {
    #[serde(default = "default_staging_cluster")]
    pub staging: String,

    #[serde(default = "default_production_cluster")]
    pub production: String,
}

fn default_staging_cluster() -> String {
    "AppsStaging".to_string()
}

fn default_production_cluster() -> String {
    "AppsProd".to_string()
}

impl ClusterSettings {
    pub fn cluster_for(&self, environment: Environment) -> &str {
        match environment {
            Environment::Staging => &self.staging,
            Environment::Production => &self.production,
        }
    }
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            staging: default_staging_cluster(),
            production: default_production_cluster(),
        }
    }
}

/// Image registry names per environment
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySettings {
    #[serde(default = "default_staging_registry")]
    pub staging: String,

    #[serde(default = "default_production_registry")]
    pub production: String,
}

fn default_staging_registry() -> String {
    "cob-digital-apps-staging".to_string()
}

fn default_production_registry() -> String {
    "cob-digital-apps-prod".to_string()
}

impl RegistrySettings {
    pub fn registry_for(&self, environment: Environment) -> &str {
        match environment {
            Environment::Staging => &self.staging,
            Environment::Production => &self.production,
        }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            staging: default_staging_registry(),
            production: default_production_registry(),
        }
    }
}

/// Static site hosts per environment
#[derive(Debug, Clone, Deserialize)]
pub struct SiteSettings {
    #[serde(default = "default_staging_site")]
    pub staging: String,

    #[serde(default = "default_production_site")]
    pub production: String,
}

fn default_staging_site() -> String {
    "apps.digital-staging.boston.gov".to_string()
}

fn default_production_site() -> String {
    "apps.boston.gov".to_string()
}

impl SiteSettings {
    /// Public URL of a service's static site
    pub fn site_url(&self, environment: Environment, service_name: &str) -> String {
        let host = match environment {
            Environment::Staging => &self.staging,
            Environment::Production => &self.production,
        };
        format!("https://{}/{}/", host, service_name)
    }
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            staging: default_staging_site(),
            production: default_production_site(),
        }
    }
}

/// Notification channel settings
#[derive(Debug, Deserialize)]
pub struct SlackSettings {
    /// Incoming webhook URL. Notifications are skipped when unset.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub webhook_url: Option<SecretString>,

    #[serde(default = "default_footer_icon")]
    pub footer_icon: String,
}

fn default_footer_icon() -> String {
    "https://twemoji.maxcdn.com/2/72x72/1f380.png".to_string()
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()).map(SecretString::from))
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            footer_icon: default_footer_icon(),
        }
    }
}

/// Deployment watcher timings
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSettings {
    /// How long a missing deployment record is tolerated
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Delay between polls while the deployment record is missing
    #[serde(default = "default_grace_retry_secs")]
    pub grace_retry_secs: u64,

    /// Delay between polls while the rollout is in progress
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Quiet time after which a "still waiting" event is emitted
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

fn default_grace_period_secs() -> u64 {
    10
}

fn default_grace_retry_secs() -> u64 {
    2
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_heartbeat_secs() -> u64 {
    60
}

impl WatchSettings {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn grace_retry(&self) -> Duration {
        Duration::from_secs(self.grace_retry_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period_secs(),
            grace_retry_secs: default_grace_retry_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}
