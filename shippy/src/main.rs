//! Shippy - Entry Point
//!
//! Deploys the service named by the CI branch: builds and pushes its image,
//! registers a new task definition, updates the service and waits for the
//! rollout to finish.

use std::env;
use std::process::exit;
use std::sync::Arc;

use colored::Colorize;
use ecs_model::DeploymentEvent;
use tracing::{error, info, warn};

use shippy::app::options::{parse_args, Command};
use shippy::app::run::Pipeline;
use shippy::aws::{AwsCli, EcrRegistry, EcsCli};
use shippy::config::{CiContext, Settings};
use shippy::deploy::clock::SystemClock;
use shippy::deploy::watcher::WatchOptions;
use shippy::filesys::file::File;
use shippy::image::docker::DockerCli;
use shippy::logs::{init_logging, LogOptions};
use shippy::notify::{NotificationChannel, NotifyLinks, Notifier, SlackWebhook};
use shippy::utils::{script_name, version_info};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    let cli_args = parse_args(args.iter().skip(1).cloned());

    let command = match Command::from_args(&cli_args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", e);
            exit(2);
        }
    };

    // Print version and exit
    if command == Command::Version {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to format version: {e}"),
        }
        return;
    }

    // Retrieve the settings file
    let settings_file = cli_args.get("config").map(File::new);
    let mut settings = match Settings::load(settings_file.as_ref()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings: {e}");
            exit(2);
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.json_logs,
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let ci = CiContext::from_env();

    let channel: Option<Arc<dyn NotificationChannel>> = match settings.slack.webhook_url.take() {
        Some(url) => match SlackWebhook::new(url) {
            Ok(webhook) => Some(Arc::new(webhook)),
            Err(e) => {
                warn!("Notifications disabled: {}", e);
                None
            }
        },
        None => None,
    };
    let notifier = Notifier::from_os_rng(
        channel,
        NotifyLinks {
            region: settings.aws.region.clone(),
            clusters: settings.clusters.clone(),
            sites: settings.sites.clone(),
            footer_icon: settings.slack.footer_icon.clone(),
        },
    );

    let aws = AwsCli::new(settings.aws.region.clone());
    let orchestrator = EcsCli::new(aws.clone());
    let registry = EcrRegistry::new(aws, settings.registries.clone());
    let builder = DockerCli::new();
    let clock = SystemClock;

    let pipeline = Pipeline {
        ci,
        script_name: script_name(args.first().map(String::as_str)),
        clusters: settings.clusters.clone(),
        watch: WatchOptions::from(&settings.watch),
        orchestrator: &orchestrator,
        registry: &registry,
        builder: &builder,
        clock: &clock,
        notifier: &notifier,
    };

    let result = match command {
        Command::Deploy(request) => {
            info!("Deploying with {:?}", request);
            pipeline.deploy(&request, print_event).await.map(|report| {
                println!(
                    "{} {} is running {}",
                    "Deployed:".green().bold(),
                    report.service_name,
                    report.image.unwrap_or_default()
                );
            })
        }
        Command::Restart => pipeline.restart(print_event).await.map(|report| {
            println!("{} {}", "Restarted:".green().bold(), report.service_name);
        }),
        Command::Notify { stage, error } => {
            pipeline.notify(stage, error.as_deref()).await;
            Ok(())
        }
        Command::Deregister { task_definition_arn } => {
            pipeline.deregister(&task_definition_arn).await
        }
        Command::Version => Ok(()),
    };

    if let Err(e) = result {
        error!("{e}");
        eprintln!("{} {}", "Failed:".red().bold(), e);
        exit(1);
    }
}

fn print_event(event: &DeploymentEvent) {
    let timestamp = event
        .created_at
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_default();

    if event.id.is_none() {
        println!("{} {}", timestamp.dimmed(), event.message.yellow());
    } else {
        println!("{} {}", timestamp.dimmed(), event.message);
    }
}
