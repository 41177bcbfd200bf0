use std::path::Path;
use std::sync::Arc;

use rebundle_github::GitHubError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Zip {
        context: &'static str,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("{context}: {source}")]
    Walk {
        context: &'static str,
        #[source]
        source: walkdir::Error,
    },
    #[error("{context}: {source}")]
    Download {
        context: &'static str,
        #[source]
        source: GitHubError,
    },
    #[error("{context}: {details}")]
    Task {
        context: &'static str,
        details: String,
    },
    #[error("{0}")]
    Invalid(String),
    /// A payload scan failure shared by every variant job.
    #[error(transparent)]
    Payload(Arc<PackageError>),
}

impl PackageError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn zip(context: &'static str, source: zip::result::ZipError) -> Self {
        Self::Zip { context, source }
    }

    pub(crate) fn walk(context: &'static str, source: walkdir::Error) -> Self {
        Self::Walk { context, source }
    }

    pub(crate) fn download(context: &'static str, source: GitHubError) -> Self {
        Self::Download { context, source }
    }

    pub(crate) fn io_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::io(
            context,
            std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        )
    }
}
