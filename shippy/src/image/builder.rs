//! Image builder capability

use std::path::Path;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::errors::DeployError;

/// Builds, pulls and pushes container images
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Authenticate against a registry endpoint
    async fn login(
        &self,
        endpoint: &str,
        username: &str,
        password: &SecretString,
    ) -> Result<(), DeployError>;

    /// Build an image from `dir` and tag it with every entry of `tags`.
    /// Fails with [`DeployError::BuildError`].
    async fn build(
        &self,
        dir: &Path,
        dockerfile: &Path,
        cache_from: Option<&str>,
        tags: &[String],
    ) -> Result<(), DeployError>;

    /// Fails with [`DeployError::PushError`]
    async fn push(&self, image: &str) -> Result<(), DeployError>;

    /// Returns whether the image could be pulled. A miss is not an error.
    async fn pull(&self, image: &str) -> bool;
}
