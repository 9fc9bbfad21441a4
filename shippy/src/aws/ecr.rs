//! Container registry access

use async_trait::async_trait;
use serde::Deserialize;

use crate::aws::cli::AwsCli;
use crate::config::settings::RegistrySettings;
use crate::deploy::branch::Environment;
use crate::errors::DeployError;
use crate::image::reference::repository_uri;
use crate::image::registry::{ImageRegistry, RegistryCredentials};

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentity {
    account: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationTokenResponse {
    #[serde(default)]
    authorization_data: Vec<AuthorizationData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationData {
    authorization_token: String,
    proxy_endpoint: String,
}

/// The account's ECR registry, reached through the cloud CLI
#[derive(Debug, Clone)]
pub struct EcrRegistry {
    cli: AwsCli,
    registries: RegistrySettings,
}

impl EcrRegistry {
    pub fn new(cli: AwsCli, registries: RegistrySettings) -> Self {
        Self { cli, registries }
    }

    /// Account id of the calling credentials
    pub async fn account_id(&self) -> Result<String, DeployError> {
        let identity: CallerIdentity = self.cli.json(&["sts", "get-caller-identity"]).await?;
        Ok(identity.account)
    }
}

#[async_trait]
impl ImageRegistry for EcrRegistry {
    async fn repository(
        &self,
        environment: Environment,
        service_name: &str,
    ) -> Result<String, DeployError> {
        let account_id = self.account_id().await?;
        Ok(repository_uri(
            &account_id,
            self.cli.region(),
            self.registries.registry_for(environment),
            service_name,
        ))
    }

    async fn credentials(&self) -> Result<Vec<RegistryCredentials>, DeployError> {
        let response: AuthorizationTokenResponse = self
            .cli
            .json(&["ecr", "get-authorization-token"])
            .await
            .map_err(|e| DeployError::RegistryAuthError(e.to_string()))?;

        response
            .authorization_data
            .iter()
            .map(|data| RegistryCredentials::decode(&data.proxy_endpoint, &data.authorization_token))
            .collect()
    }
}
