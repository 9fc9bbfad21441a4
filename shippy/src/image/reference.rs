//! Image reference helpers

/// Repository portion of an image reference: everything before the first
/// `:`. A reference without a tag is all repository.
pub fn repository_of(image: &str) -> &str {
    image.split(':').next().unwrap_or(image)
}

/// `repository:tag`
pub fn tagged(repository: &str, tag: &str) -> String {
    format!("{}:{}", repository, tag)
}

/// Registry repository URI for a service
pub fn repository_uri(account_id: &str, region: &str, registry: &str, service_name: &str) -> String {
    format!(
        "{}.dkr.ecr.{}.amazonaws.com/{}/{}",
        account_id, region, registry, service_name
    )
}
