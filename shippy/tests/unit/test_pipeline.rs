//! End-to-end deploy pipeline tests with fake adapters

mod common;

use std::sync::Arc;

use ecs_model::DeploymentStatus;
use tokio_test::{assert_err, assert_ok};

use shippy::app::options::BuildRequest;
use shippy::app::run::Pipeline;
use shippy::config::settings::ClusterSettings;
use shippy::config::CiContext;
use shippy::deploy::branch::Environment;
use shippy::deploy::orchestrator::UpdateTarget;
use shippy::deploy::service::roll_out_image;
use shippy::deploy::watcher::WatchOptions;
use shippy::errors::DeployError;
use shippy::notify::{NotificationChannel, Notifier};

use common::{
    deployment, event, notifier, service, stopped_task, t0, task_definition, FailingChannel,
    FakeBuilder, FakeOrchestrator, FakeRegistry, ManualClock, RecordingChannel, REPOSITORY,
};

fn ci(branch: Option<&str>) -> CiContext {
    CiContext {
        branch: branch.map(str::to_string),
        build_number: Some("42".to_string()),
        build_id: Some("990011".to_string()),
        repo_slug: Some("CityOfBoston/digital".to_string()),
        commit: Some("abc123".to_string()),
    }
}

fn orchestrator() -> FakeOrchestrator {
    let updated = service(
        vec![
            deployment("ecs-svc/2", DeploymentStatus::Primary),
            deployment("ecs-svc/1", DeploymentStatus::Active),
        ],
        vec![event("e1", "has reached a steady state.")],
    );
    let done = service(
        vec![deployment("ecs-svc/2", DeploymentStatus::Primary)],
        vec![
            event("e2", "has started 1 tasks."),
            event("e1", "has reached a steady state."),
        ],
    );

    FakeOrchestrator::new()
        .with_latest(task_definition(
            "AppsStaging-permits",
            4,
            &format!("{}:latest", REPOSITORY),
        ))
        .with_update(updated)
        .with_polls(vec![done])
}

fn pipeline<'a>(
    ci: CiContext,
    orchestrator: &'a FakeOrchestrator,
    builder: &'a FakeBuilder,
    clock: &'a ManualClock,
    notifier: &'a Notifier,
) -> Pipeline<'a> {
    Pipeline {
        ci,
        script_name: "deploy-container".to_string(),
        clusters: ClusterSettings::default(),
        watch: WatchOptions::default(),
        orchestrator,
        registry: &FakeRegistry,
        builder,
        clock,
        notifier,
    }
}

#[tokio::test]
async fn test_deploy_rolls_out_commit_image() {
    let orchestrator = orchestrator();
    let builder = FakeBuilder {
        cache_hit: true,
        ..Default::default()
    };
    let clock = ManualClock::new(t0());
    let channel = Arc::new(RecordingChannel::default());
    let notifier = notifier(Some(channel.clone() as Arc<dyn NotificationChannel>));
    let pipeline = pipeline(ci(Some("staging/permits")), &orchestrator, &builder, &clock, &notifier);

    let mut messages = Vec::new();
    let report = assert_ok!(
        pipeline
            .deploy(&BuildRequest::default(), |e| messages.push(e.message.clone()))
            .await
    );

    let image = format!("{}:abc123", REPOSITORY);
    assert_eq!(report.service_name, "permits");
    assert_eq!(report.deployment_id, "ecs-svc/2");
    assert_eq!(report.image.as_deref(), Some(image.as_str()));
    assert_eq!(
        report.task_definition_arn.as_deref(),
        Some("arn:aws:ecs:us-east-1:1:task-definition/AppsStaging-permits:10")
    );
    assert_eq!(
        report.previous_task_definition_arn.as_deref(),
        Some("arn:aws:ecs:us-east-1:1:task-definition/ecs-svc/1")
    );
    assert_eq!(messages, vec!["has started 1 tasks."]);

    // Cache tag is pulled, both tags are built and pushed
    let latest = format!("{}:latest", REPOSITORY);
    assert_eq!(
        builder.calls(),
        vec![
            "login AWS https://123456789012.dkr.ecr.us-east-1.amazonaws.com".to_string(),
            format!("pull {}", latest),
            format!("build {},{}", latest, image),
            format!("push {}", latest),
            format!("push {}", image),
        ]
    );
    assert_eq!(builder.cache_from.lock().unwrap().as_deref(), Some(latest.as_str()));

    let registered = orchestrator.registered.lock().unwrap();
    assert_eq!(registered[0].container_definitions[0].image, image);
    assert_eq!(registered[0].container_definitions[1].image, "postgres:10");

    let updates = orchestrator.updates.lock().unwrap();
    assert_eq!(
        updates[0],
        (
            "AppsStaging".to_string(),
            "permits".to_string(),
            UpdateTarget::TaskDefinition(
                "arn:aws:ecs:us-east-1:1:task-definition/AppsStaging-permits:10".to_string()
            )
        )
    );

    let titles = channel.titles();
    assert_eq!(titles.len(), 2);
    assert!(titles[0].ends_with("Deploying…"));
    assert!(titles[1].ends_with("Success!"));
}

#[tokio::test]
async fn test_cache_miss_builds_without_cache() {
    let orchestrator = orchestrator();
    let builder = FakeBuilder::default();
    let clock = ManualClock::new(t0());
    let notifier = notifier(None);
    let pipeline = pipeline(ci(Some("staging/permits")), &orchestrator, &builder, &clock, &notifier);

    assert_ok!(pipeline.deploy(&BuildRequest::default(), |_| {}).await);
    assert!(builder.cache_from.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_build_failure_stops_before_orchestrator() {
    let orchestrator = orchestrator();
    let builder = FakeBuilder {
        fail_build: true,
        ..Default::default()
    };
    let clock = ManualClock::new(t0());
    let channel = Arc::new(RecordingChannel::default());
    let notifier = notifier(Some(channel.clone() as Arc<dyn NotificationChannel>));
    let pipeline = pipeline(ci(Some("staging/permits")), &orchestrator, &builder, &clock, &notifier);

    let result = pipeline.deploy(&BuildRequest::default(), |_| {}).await;

    assert!(matches!(assert_err!(result), DeployError::BuildError(_)));
    assert!(orchestrator.calls().is_empty());
    assert!(!builder.calls().iter().any(|c| c.starts_with("push")));

    let messages = channel.messages.lock().unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].attachments[0].title.ends_with("Errored"));
    assert!(messages[1].attachments[0].text.contains("Error building container"));
}

#[tokio::test]
async fn test_task_failure_is_reported() {
    let orchestrator = orchestrator().with_stopped(vec![stopped_task(
        "arn:task/abc",
        "ecs-svc/2",
        "Essential container in task exited",
    )]);
    let builder = FakeBuilder::default();
    let clock = ManualClock::new(t0());
    let channel = Arc::new(RecordingChannel::default());
    let notifier = notifier(Some(channel.clone() as Arc<dyn NotificationChannel>));
    let pipeline = pipeline(ci(Some("staging/permits")), &orchestrator, &builder, &clock, &notifier);

    let result = pipeline.deploy(&BuildRequest::default(), |_| {}).await;

    assert!(matches!(assert_err!(result), DeployError::TaskFailure { .. }));
    let titles = channel.titles();
    assert!(titles[1].ends_with("Errored"));
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_deploy() {
    let orchestrator = orchestrator();
    let builder = FakeBuilder::default();
    let clock = ManualClock::new(t0());
    let notifier = notifier(Some(Arc::new(FailingChannel) as Arc<dyn NotificationChannel>));
    let pipeline = pipeline(ci(Some("staging/permits")), &orchestrator, &builder, &clock, &notifier);

    assert_ok!(pipeline.deploy(&BuildRequest::default(), |_| {}).await);
}

#[tokio::test]
async fn test_missing_branch_is_an_error() {
    let orchestrator = orchestrator();
    let builder = FakeBuilder::default();
    let clock = ManualClock::new(t0());
    let notifier = notifier(None);
    let pipeline = pipeline(ci(None), &orchestrator, &builder, &clock, &notifier);

    let result = pipeline.deploy(&BuildRequest::default(), |_| {}).await;

    assert!(matches!(assert_err!(result), DeployError::ParseError(_)));
    assert!(builder.calls().is_empty());
    assert!(orchestrator.calls().is_empty());
}

#[tokio::test]
async fn test_restart_forces_redeploy() {
    let orchestrator = orchestrator();
    let builder = FakeBuilder::default();
    let clock = ManualClock::new(t0());
    let notifier = notifier(None);
    let pipeline = pipeline(
        ci(Some("production/permits@canary")),
        &orchestrator,
        &builder,
        &clock,
        &notifier,
    );

    let report = assert_ok!(pipeline.restart(|_| {}).await);

    assert_eq!(report.service_name, "permits-canary");
    assert!(report.image.is_none());
    assert!(builder.calls().is_empty());
    assert_eq!(
        orchestrator.updates.lock().unwrap()[0],
        (
            "AppsProd".to_string(),
            "permits-canary".to_string(),
            UpdateTarget::ForceRedeploy { desired_count: 1 }
        )
    );
}

#[tokio::test]
async fn test_deregister() {
    let orchestrator = orchestrator();
    let builder = FakeBuilder::default();
    let clock = ManualClock::new(t0());
    let notifier = notifier(None);
    let pipeline = pipeline(ci(None), &orchestrator, &builder, &clock, &notifier);

    assert_ok!(pipeline.deregister("arn:td:9").await);
    assert_eq!(orchestrator.calls(), vec!["deregister_task_definition arn:td:9"]);
}

#[tokio::test]
async fn test_rollback_falls_back_to_base_revision() {
    let first_deploy = service(
        vec![deployment("ecs-svc/2", DeploymentStatus::Primary)],
        Vec::new(),
    );
    let orchestrator = orchestrator().with_update(first_deploy);
    let clusters = ClusterSettings::default();

    let rollout = assert_ok!(
        roll_out_image(
            &orchestrator,
            &clusters,
            Environment::Staging,
            "permits",
            &format!("{}:abc123", REPOSITORY),
        )
        .await
    );

    assert_eq!(
        rollout.previous_task_definition_arn.as_deref(),
        Some("arn:aws:ecs:us-east-1:1:task-definition/AppsStaging-permits:4")
    );
}

#[tokio::test]
async fn test_rollback_unknown_without_history() {
    let mut base = task_definition("AppsStaging-permits", 4, &format!("{}:latest", REPOSITORY));
    base.task_definition_arn = None;
    let orchestrator = orchestrator()
        .with_latest(base)
        .with_update(service(
            vec![deployment("ecs-svc/2", DeploymentStatus::Primary)],
            Vec::new(),
        ));
    let clusters = ClusterSettings::default();

    let rollout = assert_ok!(
        roll_out_image(
            &orchestrator,
            &clusters,
            Environment::Staging,
            "permits",
            &format!("{}:abc123", REPOSITORY),
        )
        .await
    );

    assert!(rollout.previous_task_definition_arn.is_none());
}
