use std::path::{Path, PathBuf};

use rebundle_core::Variant;
use rebundle_core::package::PackageOptions;
use rebundle_github::RepoRef;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SETTINGS_FILE: &str = "rebundle.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Repository the repackaged releases are published to.
    #[serde(default = "default_repository")]
    pub repository: RepoRef,

    #[serde(default = "default_upstream_repository")]
    pub upstream_repository: RepoRef,

    /// Used in release names when the upstream release has none.
    #[serde(default = "default_upstream_display_name")]
    pub upstream_display_name: String,

    #[serde(default = "default_payload_dir")]
    pub payload_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_metadata_file")]
    pub metadata_file: PathBuf,

    #[serde(default = "default_variants")]
    pub variants: Vec<Variant>,

    #[serde(default = "default_asset_marker")]
    pub asset_marker: String,

    /// `None` skips the auxiliary merge entirely.
    #[serde(default = "default_auxiliary_url")]
    pub auxiliary_url: Option<String>,

    #[serde(default = "default_auxiliary_entry")]
    pub auxiliary_entry: String,

    #[serde(default = "default_auxiliary_dir")]
    pub auxiliary_dir: String,

    #[serde(default = "default_content_type")]
    pub default_content_type: String,

    #[serde(default)]
    pub payload_version: Option<String>,

    #[serde(default = "default_payload_manifest")]
    pub payload_manifest: PathBuf,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// 0 disables the timeout.
    #[serde(default)]
    pub http_timeout_secs: u64,
}

fn default_repository() -> RepoRef {
    RepoRef::new("toebeann", "bepinex.chainedechoes")
}

fn default_upstream_repository() -> RepoRef {
    RepoRef::new("BepInEx", "BepInEx")
}

fn default_upstream_display_name() -> String {
    "BepInEx".to_string()
}

fn default_payload_dir() -> PathBuf {
    PathBuf::from("payload")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_metadata_file() -> PathBuf {
    PathBuf::from(".metadata.json")
}

fn default_variants() -> Vec<Variant> {
    vec![Variant::X64, Variant::Unix]
}

fn default_asset_marker() -> String {
    "unitymono".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_auxiliary_url() -> Option<String> {
    Some("https://unity.bepinex.dev/corlibs/2020.3.36.zip".to_string())
}

fn default_auxiliary_entry() -> String {
    "mscorlib.dll".to_string()
}

fn default_auxiliary_dir() -> String {
    "corlibs".to_string()
}

fn default_content_type() -> String {
    "application/x-zip-compressed".to_string()
}

fn default_payload_manifest() -> PathBuf {
    PathBuf::from("package.json")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            upstream_repository: default_upstream_repository(),
            upstream_display_name: default_upstream_display_name(),
            payload_dir: default_payload_dir(),
            output_dir: default_output_dir(),
            metadata_file: default_metadata_file(),
            variants: default_variants(),
            asset_marker: default_asset_marker(),
            auxiliary_url: default_auxiliary_url(),
            auxiliary_entry: default_auxiliary_entry(),
            auxiliary_dir: default_auxiliary_dir(),
            default_content_type: default_content_type(),
            payload_version: None,
            payload_manifest: default_payload_manifest(),
            debug_logging: false,
            log_file: None,
            http_timeout_secs: 0,
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn package_options(&self) -> PackageOptions {
        PackageOptions {
            upstream: self.upstream_repository.clone(),
            payload_dir: self.payload_dir.clone(),
            output_dir: self.output_dir.clone(),
            asset_marker: self.asset_marker.clone(),
            auxiliary_entry: self.auxiliary_entry.clone(),
            auxiliary_dir: self.auxiliary_dir.clone(),
        }
    }
}
