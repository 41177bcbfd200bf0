use std::path::PathBuf;

use rebundle_core::{AuxiliaryError, MetadataError};
use rebundle_github::{GitHubError, RepoRef};
use thiserror::Error;

use crate::git::GitError;
use crate::settings::SettingsError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("GITHUB_PERSONAL_ACCESS_TOKEN is not set")]
    MissingCredential,

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("failed to create GitHub client: {0}")]
    Client(#[source] GitHubError),

    #[error("could not retrieve latest release of /{repo}: {source}")]
    UpstreamUnavailable {
        repo: RepoRef,
        #[source]
        source: GitHubError,
    },

    #[error("invalid payload version: {0}")]
    PayloadVersion(String),

    #[error("upstream release tag {tag:?} does not resolve to a version")]
    UnresolvableUpstreamVersion { tag: String },

    #[error("failed to build release version: {0}")]
    CompoundVersion(#[source] semver::Error),

    #[error(transparent)]
    AuxiliaryUnavailable(#[from] AuxiliaryError),

    #[error("{count} variant(s) failed while handling assets from /{repo}")]
    AssetFailures { repo: RepoRef, count: usize },

    #[error("no valid assets were found in repo /{repo}")]
    AllVariantsAbsent { repo: RepoRef },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("metadata file {} was not changed by this run", path.display())]
    MetadataUnchanged { path: PathBuf },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("failed to {operation}: {source}")]
    Publish {
        operation: &'static str,
        #[source]
        source: GitHubError,
    },

    #[error("failed to read {}: {source}", path.display())]
    ReadUpload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
