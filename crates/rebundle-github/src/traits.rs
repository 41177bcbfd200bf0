use async_trait::async_trait;

use crate::error::GitHubError;
use crate::types::{Asset, NewRelease, Release, RepoRef};

#[derive(Debug, Clone)]
pub struct AssetUpload {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Request/response view of the release host.
///
/// Every call is attempted exactly once; callers decide whether a failure is
/// fatal or degrades to a default.
#[async_trait]
pub trait ReleaseProvider: Send + Sync {
    async fn latest_release(&self, repo: &RepoRef) -> Result<Release, GitHubError>;

    /// Fetch the binary content of a release asset.
    async fn download_asset(&self, repo: &RepoRef, asset: &Asset) -> Result<Vec<u8>, GitHubError>;

    async fn create_release(
        &self,
        repo: &RepoRef,
        release: &NewRelease,
    ) -> Result<Release, GitHubError>;

    async fn upload_asset(
        &self,
        repo: &RepoRef,
        release: &Release,
        upload: AssetUpload,
    ) -> Result<Asset, GitHubError>;
}
