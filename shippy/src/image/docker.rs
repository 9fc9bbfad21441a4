//! Docker image builder

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::DeployError;
use crate::image::builder::ImageBuilder;

/// Image builder running the `docker` binary. Build, push and pull output
/// goes to stderr so it shows up in the CI log without mixing into the
/// deployment event stream on stdout.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self {
            program: "docker".to_string(),
        }
    }

    /// A docker invocation whose stdout is sent to stderr
    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut command = Command::new(&self.program);
        command.args(args).stdout(Stdio::from(std::io::stderr()));
        command
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Arguments for `docker build`
pub fn build_args(
    dir: &Path,
    dockerfile: &Path,
    cache_from: Option<&str>,
    tags: &[String],
) -> Vec<String> {
    let mut args = vec![
        "build".to_string(),
        "--pull".to_string(),
        "-f".to_string(),
        dockerfile.display().to_string(),
    ];

    if let Some(cache_from) = cache_from {
        args.push("--cache-from".to_string());
        args.push(cache_from.to_string());
    }

    for tag in tags {
        args.push("-t".to_string());
        args.push(tag.clone());
    }

    args.push(dir.display().to_string());
    args
}

#[async_trait]
impl ImageBuilder for DockerCli {
    async fn login(
        &self,
        endpoint: &str,
        username: &str,
        password: &SecretString,
    ) -> Result<(), DeployError> {
        debug!("Logging in to {}", endpoint);

        let login_result: Result<bool, std::io::Error> = async {
            let mut child = Command::new(&self.program)
                .args(["login", "-u", username, "--password-stdin", endpoint])
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()?;
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(password.expose_secret().as_bytes()).await?;
            }
            let output = child.wait_with_output().await?;
            Ok(output.status.success())
        }
        .await;

        match login_result {
            Ok(true) => Ok(()),
            Ok(false) => Err(DeployError::RegistryAuthError(format!(
                "Unable to run docker login for {}",
                endpoint
            ))),
            Err(e) => Err(DeployError::RegistryAuthError(format!(
                "Failed to run docker login for {}: {}",
                endpoint, e
            ))),
        }
    }

    async fn build(
        &self,
        dir: &Path,
        dockerfile: &Path,
        cache_from: Option<&str>,
        tags: &[String],
    ) -> Result<(), DeployError> {
        info!("Building image {}", tags.join(", "));

        let status = self
            .command(build_args(dir, dockerfile, cache_from, tags))
            .status()
            .await
            .map_err(|e| DeployError::BuildError(format!("Failed to run docker build: {}", e)))?;

        if !status.success() {
            return Err(DeployError::BuildError("Error building container".to_string()));
        }

        Ok(())
    }

    async fn push(&self, image: &str) -> Result<(), DeployError> {
        info!("Pushing image {}", image);

        let status = self
            .command(["push", image])
            .status()
            .await
            .map_err(|e| DeployError::PushError(format!("Failed to run docker push: {}", e)))?;

        if !status.success() {
            return Err(DeployError::PushError(format!("Error pushing container {}", image)));
        }

        Ok(())
    }

    async fn pull(&self, image: &str) -> bool {
        debug!("Pulling image {}", image);

        match self.command(["pull", image]).status().await {
            Ok(status) => status.success(),
            Err(e) => {
                warn!("Failed to run docker pull: {}", e);
                false
            }
        }
    }
}
