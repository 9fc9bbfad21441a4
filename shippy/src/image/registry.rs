//! Image registry capability

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use secrecy::SecretString;
use tracing::info;

use crate::deploy::branch::Environment;
use crate::errors::DeployError;
use crate::image::builder::ImageBuilder;

/// Registry credentials for one proxy endpoint
#[derive(Debug)]
pub struct RegistryCredentials {
    pub endpoint: String,
    pub username: String,
    pub password: SecretString,
}

impl RegistryCredentials {
    /// Decode a base64 `user:password` authorization token
    pub fn decode(endpoint: &str, token: &str) -> Result<Self, DeployError> {
        let decoded = BASE64
            .decode(token)
            .map_err(|e| DeployError::RegistryAuthError(format!("Invalid authorization token: {e}")))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|e| DeployError::RegistryAuthError(format!("Invalid authorization token: {e}")))?;

        let (username, password) = decoded.split_once(':').ok_or_else(|| {
            DeployError::RegistryAuthError("Authorization token is not user:password".to_string())
        })?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            username: username.to_string(),
            password: SecretString::from(password.to_string()),
        })
    }
}

/// Where a service's images live and how to log in there
#[async_trait]
pub trait ImageRegistry: Send + Sync {
    /// Repository URI for a service's images
    async fn repository(
        &self,
        environment: Environment,
        service_name: &str,
    ) -> Result<String, DeployError>;

    async fn credentials(&self) -> Result<Vec<RegistryCredentials>, DeployError>;
}

/// Log the image builder in to every endpoint of the registry
pub async fn login<R, B>(registry: &R, builder: &B) -> Result<(), DeployError>
where
    R: ImageRegistry + ?Sized,
    B: ImageBuilder + ?Sized,
{
    for credentials in registry.credentials().await? {
        builder
            .login(&credentials.endpoint, &credentials.username, &credentials.password)
            .await?;
        info!("Logged in to {}", credentials.endpoint);
    }
    Ok(())
}
