//! Deploy branch descriptors
//!
//! CI deploys are triggered by pushing to a branch named
//! `<environment>/<service>` or `<environment>/<service>@<variant>`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// Target environment of a deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Staging,
    Production,
}

impl Environment {
    /// `staging` selects staging; every other name deploys to production.
    pub fn from_name(name: &str) -> Self {
        match name {
            "staging" => Environment::Staging,
            _ => Environment::Production,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environment, service and variant parsed from a deploy branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchDescriptor {
    pub environment: Environment,
    pub service_name: String,
    /// Empty when the branch has no `@variant` suffix
    pub variant: String,
}

impl BranchDescriptor {
    /// Parse a branch name of the form `environment/service(@variant)?`
    pub fn parse(branch: &str) -> Result<Self, DeployError> {
        let mismatch = || {
            DeployError::ParseError(format!(
                "Branch {} did not match environment/service@variant pattern",
                branch
            ))
        };

        let (environment, rest) = branch.split_once('/').ok_or_else(mismatch)?;
        let (service_name, variant) = match rest.split_once('@') {
            Some((service, variant)) => (service, variant),
            None => (rest, ""),
        };

        if environment.is_empty() || service_name.is_empty() {
            return Err(mismatch());
        }

        Ok(Self {
            environment: Environment::from_name(environment),
            service_name: service_name.to_string(),
            variant: variant.to_string(),
        })
    }

    /// Name of the scheduler service for this branch: `service` or
    /// `service-variant`.
    pub fn ecs_service_name(&self) -> String {
        if self.variant.is_empty() {
            self.service_name.clone()
        } else {
            format!("{}-{}", self.service_name, self.variant)
        }
    }

    /// Image tag the branch builds into. Variants get their own tag so their
    /// layer cache does not churn the main image's.
    pub fn image_tag(&self) -> &str {
        if self.variant.is_empty() {
            "latest"
        } else {
            &self.variant
        }
    }
}
