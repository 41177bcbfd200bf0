use std::fs::Permissions;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use rebundle_github::Release;
use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::resolve_version;

/// Version recorded when no metadata has ever been written.
const BASELINE_VERSION: &str = "0";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_version: Option<String>,
}

impl Metadata {
    #[must_use]
    pub fn baseline() -> Self {
        Self {
            version: Some(BASELINE_VERSION.to_string()),
            ..Self::default()
        }
    }

    /// Record describing a run that repackaged `release` with the given
    /// payload build.
    #[must_use]
    pub fn for_release(release: &Release, payload_version: &Version) -> Self {
        Self {
            version: resolve_version(&release.tag_name).map(|version| version.to_string()),
            source: Some(release.html_url.clone()),
            payload_version: Some(payload_version.to_string()),
        }
    }

    /// The recorded upstream version, resolved for comparison.
    #[must_use]
    pub fn upstream_version(&self) -> Option<Version> {
        self.version.as_deref().and_then(resolve_version)
    }
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to serialize metadata: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("{context} {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MetadataError {
    fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted record, falling back to [`Metadata::baseline`] when
    /// the file is missing or unreadable.
    #[must_use]
    pub fn read(&self) -> Metadata {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) => {
                debug!(
                    "No metadata at {} ({error}), using baseline",
                    self.path.display()
                );
                return Metadata::baseline();
            }
        };

        match serde_json::from_str(&content) {
            Ok(metadata) => metadata,
            Err(error) => {
                debug!(
                    "Unreadable metadata at {} ({error}), using baseline",
                    self.path.display()
                );
                Metadata::baseline()
            }
        }
    }

    /// Replace the persisted record.
    ///
    /// The record is written to a sibling temp file and renamed over the
    /// target, so readers see either the old or the new record.
    ///
    /// # Errors
    /// Returns an error if the record cannot be serialized, the temp file
    /// cannot be written, or the rename fails.
    pub fn write(&self, metadata: &Metadata) -> Result<(), MetadataError> {
        let mut content = serde_json::to_vec_pretty(metadata).map_err(MetadataError::Serialize)?;
        content.push(b'\n');

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|error| MetadataError::io("failed to create temp file in", parent, error))?;
        temp.write_all(&content)
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|error| MetadataError::io("failed to write temp file for", &self.path, error))?;
        if let Some(permissions) = self.target_permissions() {
            temp.as_file()
                .set_permissions(permissions)
                .map_err(|error| MetadataError::io("failed to set permissions for", &self.path, error))?;
        }
        temp.persist(&self.path).map_err(|error| {
            MetadataError::io("failed to replace", &self.path, error.error)
        })?;

        info!("Metadata written to {}", self.path.display());
        Ok(())
    }

    /// Permissions of the record being replaced, or the usual file mode for
    /// a new record. Temp files are created owner-only.
    fn target_permissions(&self) -> Option<Permissions> {
        match std::fs::metadata(&self.path) {
            Ok(existing) => Some(existing.permissions()),
            Err(_) => new_file_permissions(),
        }
    }
}

#[cfg(unix)]
fn new_file_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<Permissions> {
    None
}
