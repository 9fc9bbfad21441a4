//! CI build context

/// Facts about the CI build that triggered the deploy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiContext {
    /// Branch being deployed, e.g. `production/permits@canary`
    pub branch: Option<String>,

    pub build_number: Option<String>,

    pub build_id: Option<String>,

    /// `owner/repo` on GitHub
    pub repo_slug: Option<String>,

    /// Commit SHA being built
    pub commit: Option<String>,
}

impl CiContext {
    /// Read the context from Travis CI's environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            branch: get("TRAVIS_BRANCH"),
            build_number: get("TRAVIS_BUILD_NUMBER"),
            build_id: get("TRAVIS_BUILD_ID"),
            repo_slug: get("TRAVIS_REPO_SLUG"),
            commit: get("TRAVIS_COMMIT"),
        }
    }

    /// Link to the CI build page
    pub fn build_url(&self) -> String {
        format!(
            "https://travis-ci.org/{}/builds/{}",
            self.repo_slug.as_deref().unwrap_or_default(),
            self.build_id.as_deref().unwrap_or_default()
        )
    }

    /// Short label for the CI build, e.g. `#1234`
    pub fn build_label(&self) -> String {
        format!("#{}", self.build_number.as_deref().unwrap_or_default())
    }

    /// Link to the branch on GitHub
    pub fn branch_url(&self) -> String {
        format!(
            "https://github.com/{}/tree/{}",
            self.repo_slug.as_deref().unwrap_or_default(),
            self.branch.as_deref().unwrap_or_default()
        )
    }
}
