//! Command line options

use std::collections::HashMap;
use std::path::PathBuf;

use crate::errors::DeployError;
use crate::notify::Stage;

/// Inputs for building a service image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Docker build context
    pub context_dir: PathBuf,

    /// Dockerfile, relative to the working directory
    pub dockerfile: PathBuf,
}

impl Default for BuildRequest {
    fn default() -> Self {
        Self {
            context_dir: PathBuf::from("."),
            dockerfile: PathBuf::from("Dockerfile"),
        }
    }
}

/// What the process was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Build, push and roll out the branch's service
    Deploy(BuildRequest),

    /// Redeploy the branch's service on its current task definition
    Restart,

    /// Send a single notification
    Notify { stage: Stage, error: Option<String> },

    /// Deregister a task definition revision
    Deregister { task_definition_arn: String },

    Version,
}

impl Command {
    /// Pick the command from parsed `--key=value` flags. Deploy is the
    /// default.
    pub fn from_args(args: &HashMap<String, String>) -> Result<Self, DeployError> {
        if args.contains_key("version") {
            return Ok(Command::Version);
        }

        if let Some(stage) = args.get("notify") {
            return Ok(Command::Notify {
                stage: stage.parse()?,
                error: args.get("error").cloned(),
            });
        }

        if let Some(arn) = args.get("deregister") {
            if arn.is_empty() || arn == "true" {
                return Err(DeployError::ConfigError(
                    "--deregister needs a task definition ARN".to_string(),
                ));
            }
            return Ok(Command::Deregister {
                task_definition_arn: arn.clone(),
            });
        }

        if args.contains_key("restart") {
            return Ok(Command::Restart);
        }

        let defaults = BuildRequest::default();
        Ok(Command::Deploy(BuildRequest {
            context_dir: args
                .get("dir")
                .map(PathBuf::from)
                .unwrap_or(defaults.context_dir),
            dockerfile: args
                .get("dockerfile")
                .map(PathBuf::from)
                .unwrap_or(defaults.dockerfile),
        }))
    }
}

/// Parse `--key=value` and `--flag` arguments
pub fn parse_args<I>(args: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = String>,
{
    let mut cli_args = HashMap::new();

    for arg in args {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    cli_args
}
