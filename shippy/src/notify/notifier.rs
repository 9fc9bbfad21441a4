//! Lifecycle notifications
//!
//! Notifications are best effort: a missing or broken channel is logged and
//! never fails the deploy.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, warn};

use crate::config::settings::{ClusterSettings, SiteSettings};
use crate::config::CiContext;
use crate::deploy::branch::BranchDescriptor;
use crate::errors::DeployError;
use crate::notify::slack::{Attachment, Color, SlackMessage};

const START_ICONS: &[&str] = &["🤖", "🕊", "🍵", "🏹", "🚀", "📡", "⏳", "🆕", "🔜", "🎁"];
const ERROR_ICONS: &[&str] = &["😡", "💀", "🙀", "👎🏼", "🙍🏻", "💔", "⚰"];
const COMPLETE_ICONS: &[&str] = &["👍🏿", "💃🏻", "💅", "🎂", "🏅", "🎯", "🎉", "🆒", "🔛", "💯"];

/// Destination for notification messages
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, message: &SlackMessage) -> Result<(), DeployError>;
}

/// Deploy lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    /// Container rollout finished
    Complete,
    /// Static site upload finished
    S3Complete,
    Error,
}

impl Stage {
    /// Icons a notification for this stage picks from
    pub fn icons(&self) -> &'static [&'static str] {
        match self {
            Stage::Start => START_ICONS,
            Stage::Complete | Stage::S3Complete => COMPLETE_ICONS,
            Stage::Error => ERROR_ICONS,
        }
    }
}

impl FromStr for Stage {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Stage::Start),
            "complete" => Ok(Stage::Complete),
            "s3-complete" => Ok(Stage::S3Complete),
            "error" => Ok(Stage::Error),
            _ => Err(DeployError::ConfigError(format!("Unknown notification stage: {}", s))),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Start => "start",
            Stage::Complete => "complete",
            Stage::S3Complete => "s3-complete",
            Stage::Error => "error",
        };
        f.write_str(s)
    }
}

/// What a notification is about
#[derive(Debug, Clone, Copy)]
pub struct NotifyContext<'a> {
    pub ci: &'a CiContext,

    /// Name of the invoking script, shown in the footer
    pub script_name: &'a str,

    /// Error description for [`Stage::Error`]
    pub error: Option<&'a str>,
}

/// Outcome of a notification attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Skipped(String),
    Failed(String),
}

/// Link targets used in message bodies
#[derive(Debug, Clone)]
pub struct NotifyLinks {
    pub region: String,
    pub clusters: ClusterSettings,
    pub sites: SiteSettings,
    pub footer_icon: String,
}

/// Formats lifecycle messages and sends them to a channel
pub struct Notifier {
    channel: Option<Arc<dyn NotificationChannel>>,
    links: NotifyLinks,
    rng: Mutex<StdRng>,
}

impl Notifier {
    pub fn new(
        channel: Option<Arc<dyn NotificationChannel>>,
        links: NotifyLinks,
        rng: StdRng,
    ) -> Self {
        Self {
            channel,
            links,
            rng: Mutex::new(rng),
        }
    }

    /// Notifier seeded from the OS
    pub fn from_os_rng(channel: Option<Arc<dyn NotificationChannel>>, links: NotifyLinks) -> Self {
        Self::new(channel, links, StdRng::from_os_rng())
    }

    /// Send a notification for `stage`. Never fails; problems are logged and
    /// reported in the returned [`Delivery`].
    pub async fn notify(&self, stage: Stage, context: &NotifyContext<'_>) -> Delivery {
        if context.ci.branch.is_none() {
            warn!("No $TRAVIS_BRANCH defined");
        }

        let Some(channel) = self.channel.as_ref() else {
            warn!("No webhook URL configured, skipping {} notification", stage);
            return Delivery::Skipped("no webhook configured".to_string());
        };

        let result = match self.message(stage, context) {
            Ok(message) => channel.send(&message).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                error!("Error sending {} notification: {}", stage, e);
                Delivery::Failed(e.to_string())
            }
        }
    }

    /// Build the message for `stage`
    pub fn message(&self, stage: Stage, context: &NotifyContext<'_>) -> Result<SlackMessage, DeployError> {
        let branch_name = context.ci.branch.as_deref().unwrap_or_default();
        let branch = BranchDescriptor::parse(branch_name)?;

        let cluster = self.links.clusters.cluster_for(branch.environment);
        let ecs_service = branch.ecs_service_name();
        let ecs_url = format!(
            "https://console.aws.amazon.com/ecs/home?region={}#/clusters/{}/services/{}/details",
            self.links.region, cluster, ecs_service
        );
        let site_url = self.links.sites.site_url(branch.environment, &branch.service_name);

        let (color, title, text) = match stage {
            Stage::Start => (
                Color::Warning,
                "Deploying…",
                format!(
                    "Follow along on Travis CI: <{}|{}>",
                    context.ci.build_url(),
                    context.ci.build_label()
                ),
            ),
            Stage::Complete => (
                Color::Good,
                "Success!",
                format!("For more info, check ECS: <{}|{}/{}>", ecs_url, cluster, ecs_service),
            ),
            Stage::S3Complete => (
                Color::Good,
                "Success!",
                format!("View now: <{}|{}>", site_url, site_url),
            ),
            Stage::Error => (
                Color::Danger,
                "Errored",
                context.error.unwrap_or_default().to_string(),
            ),
        };

        let icon = self.pick_icon(stage);

        Ok(SlackMessage {
            attachments: vec![Attachment {
                title: format!(
                    "{} <{}|{}>: {}",
                    icon,
                    context.ci.branch_url(),
                    branch_name,
                    title
                ),
                color,
                text,
                footer: context.script_name.to_string(),
                footer_icon: self.links.footer_icon.clone(),
            }],
        })
    }

    fn pick_icon(&self, stage: Stage) -> &'static str {
        let icons = stage.icons();
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        icons[rng.random_range(0..icons.len())]
    }
}
