//! Runner for the `aws` command line tool

use serde::de::DeserializeOwned;
use tokio::process::Command;
use tracing::{debug, error};

use crate::errors::DeployError;

/// Invokes the `aws` binary with a fixed region and JSON output
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    region: String,
}

impl AwsCli {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            program: "aws".to_string(),
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Run a command and parse its JSON output
    pub async fn json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, DeployError> {
        let stdout = self.run(args).await?;
        serde_json::from_slice(&stdout).map_err(|e| {
            DeployError::OrchestratorError(format!(
                "Unexpected output from aws {}: {}",
                args.first().copied().unwrap_or_default(),
                e
            ))
        })
    }

    /// Run a command, returning its stdout
    pub async fn run(&self, args: &[&str]) -> Result<Vec<u8>, DeployError> {
        let command_name = args.iter().take(2).copied().collect::<Vec<_>>().join(" ");
        debug!("aws {}", command_name);

        let output = Command::new(&self.program)
            .args(args)
            .args(["--region", &self.region, "--output", "json"])
            .output()
            .await
            .map_err(|e| {
                DeployError::OrchestratorError(format!("Failed to run aws {}: {}", command_name, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("aws {} failed: {}", command_name, stderr.trim());
            return Err(DeployError::OrchestratorError(format!(
                "aws {} exited with {}: {}",
                command_name,
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}
