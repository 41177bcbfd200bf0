use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};
use rebundle_core::package::{PackagedArchive, Packager, PackagingFailure, summarize};
use rebundle_core::{
    GateDecision, Metadata, MetadataStore, VersionSignals, compound_version, decide,
    download_auxiliary, resolve_version,
};
use rebundle_github::{GitHubError, Release, ReleaseProvider, RepoRef};
use semver::Version;
use serde::Deserialize;

use crate::environment::{RunEnvironment, RunMode};
use crate::error::PipelineError;
use crate::git::Git;
use crate::publish::{Publisher, new_release, release_uploads};
use crate::settings::Settings;

#[derive(Debug)]
pub enum RunOutcome {
    /// Nothing newer upstream or locally; no side effects.
    UpToDate,
    /// Archives built and metadata recorded, publishing skipped.
    Packaged { archives: Vec<PackagedArchive> },
    Published { tag: String, url: String },
}

pub struct Pipeline<'a> {
    settings: &'a Settings,
    environment: &'a RunEnvironment,
    provider: &'a dyn ReleaseProvider,
    http: &'a reqwest::Client,
    git_dir: PathBuf,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        environment: &'a RunEnvironment,
        provider: &'a dyn ReleaseProvider,
        http: &'a reqwest::Client,
    ) -> Self {
        Self {
            settings,
            environment,
            provider,
            http,
            git_dir: PathBuf::from("."),
        }
    }

    /// Run one update cycle: gate, package every variant, record metadata,
    /// then publish unless running in dev mode.
    ///
    /// # Errors
    /// Returns the first fatal condition encountered; see [`PipelineError`].
    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        let payload_version = resolve_payload_version(
            self.environment.payload_version.as_deref(),
            self.settings.payload_version.as_deref(),
            &self.settings.payload_manifest,
        )?;
        let store = MetadataStore::new(self.settings.metadata_file.clone());
        let previous = store.read();

        info!("Getting latest release...");
        let own_latest = self.own_latest_version().await;
        let upstream = self.upstream_release().await?;
        let upstream_version = resolve_version(&upstream.tag_name);
        let compound = upstream_version
            .as_ref()
            .map(|version| compound_version(version, &payload_version))
            .transpose()
            .map_err(PipelineError::CompoundVersion)?;

        let decision = decide(&VersionSignals {
            previous_stored: previous.upstream_version(),
            upstream: upstream_version.clone(),
            compound_local: compound.clone(),
            previous_compound: own_latest,
        });
        if decision == GateDecision::Skip {
            info!(
                "No update required, {} {} is already published",
                self.settings.upstream_repository, upstream.tag_name
            );
            return Ok(RunOutcome::UpToDate);
        }

        let (Some(upstream_version), Some(compound)) = (upstream_version, compound) else {
            return Err(PipelineError::UnresolvableUpstreamVersion {
                tag: upstream.tag_name.clone(),
            });
        };
        info!("Update required, packaging {compound}");

        let auxiliary = match &self.settings.auxiliary_url {
            Some(url) => Some(Arc::<[u8]>::from(download_auxiliary(self.http, url).await?)),
            None => None,
        };

        let options = self.settings.package_options();
        let mut packager = Packager::new(self.provider, &upstream, &options);
        if let Some(auxiliary) = auxiliary {
            packager = packager.with_auxiliary(auxiliary);
        }
        let outcomes = packager.package_all(&self.settings.variants).await;
        let archives = summarize(outcomes).map_err(|failure| self.packaging_error(failure))?;

        store.write(&Metadata::for_release(&upstream, &payload_version))?;

        if self.environment.mode == RunMode::Dev {
            info!("Dev mode, skipping release of {compound}");
            return Ok(RunOutcome::Packaged { archives });
        }

        let git = Git::locate(self.git_dir.clone())?;
        let publisher = Publisher::new(self.provider, git, &self.settings.repository);
        let sha = publisher
            .commit_metadata(
                &self.settings.metadata_file,
                &self.environment.author,
                self.environment.workspace.as_deref(),
            )
            .await?;

        let release = publisher
            .create_release(&new_release(
                &upstream,
                &upstream_version,
                &compound,
                Some(sha),
                &self.settings.upstream_display_name,
            ))
            .await?;
        let uploads = release_uploads(&archives, &upstream, &self.settings.default_content_type);
        publisher.upload_all(&release, uploads).await?;

        info!("Published {}", release.html_url);
        Ok(RunOutcome::Published {
            tag: release.tag_name,
            url: release.html_url,
        })
    }

    /// Version of this project's latest release. A failed lookup counts as
    /// `0.0.0` so the gate can still run.
    async fn own_latest_version(&self) -> Option<Version> {
        let repo = &self.settings.repository;
        match self.provider.latest_release(repo).await {
            Ok(release) => {
                let version = resolve_version(&release.tag_name);
                if version.is_none() {
                    warn!("Latest release tag {} of /{repo} is not a version", release.tag_name);
                }
                version
            }
            Err(error) => {
                log_release_error(&error, repo);
                Some(Version::new(0, 0, 0))
            }
        }
    }

    async fn upstream_release(&self) -> Result<Release, PipelineError> {
        let repo = &self.settings.upstream_repository;
        self.provider.latest_release(repo).await.map_err(|source| {
            log_release_error(&source, repo);
            PipelineError::UpstreamUnavailable {
                repo: repo.clone(),
                source,
            }
        })
    }

    fn packaging_error(&self, failure: PackagingFailure) -> PipelineError {
        let repo = self.settings.upstream_repository.clone();
        match failure {
            PackagingFailure::Failed(failed) => {
                for failure in &failed {
                    error!(
                        "Failed to package {} asset {}: {}",
                        failure.variant, failure.asset.name, failure.error
                    );
                }
                error!("Encountered errors handling assets from repo /{repo}");
                PipelineError::AssetFailures {
                    repo,
                    count: failed.len(),
                }
            }
            PackagingFailure::AllAbsent => PipelineError::AllVariantsAbsent { repo },
        }
    }
}

fn log_release_error(error: &GitHubError, repo: &RepoRef) {
    if error.is_not_found() {
        error!("No releases were found for repo: /{repo}");
    } else {
        error!("Could not retrieve releases for repo: /{repo}: {error}");
    }
}

#[derive(Debug, Deserialize)]
struct PayloadManifest {
    #[serde(default)]
    version: Option<String>,
}

/// The payload build identifier: explicit value, then configured value,
/// then the `version` field of the manifest.
fn resolve_payload_version(
    explicit: Option<&str>,
    configured: Option<&str>,
    manifest: &Path,
) -> Result<Version, PipelineError> {
    let raw = match explicit.or(configured) {
        Some(raw) => raw.to_string(),
        None => read_manifest_version(manifest)?,
    };

    Version::parse(raw.trim().trim_start_matches('v'))
        .map_err(|error| PipelineError::PayloadVersion(format!("{raw:?}: {error}")))
}

fn read_manifest_version(path: &Path) -> Result<String, PipelineError> {
    let content = std::fs::read_to_string(path).map_err(|error| {
        PipelineError::PayloadVersion(format!("cannot read {}: {error}", path.display()))
    })?;
    let manifest: PayloadManifest = serde_json::from_str(&content).map_err(|error| {
        PipelineError::PayloadVersion(format!("cannot parse {}: {error}", path.display()))
    })?;
    manifest.version.ok_or_else(|| {
        PipelineError::PayloadVersion(format!("{} has no version field", path.display()))
    })
}
