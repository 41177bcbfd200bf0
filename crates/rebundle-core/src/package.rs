//! Per-variant repackaging of upstream release assets.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::join_all;
use log::{debug, error, info, warn};
use rebundle_github::{Asset, GitHubError, Release, ReleaseProvider, RepoRef};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::archive::{ArchiveBuilder, extract_entry};
use crate::error::PackageError;
use crate::payload::Payload;
use crate::variant::{Variant, select_asset};

#[derive(Debug, Clone)]
pub struct PackageOptions {
    /// Repository the release assets are downloaded from.
    pub upstream: RepoRef,
    pub payload_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Preferred extra substring in asset names, e.g. `unitymono`.
    pub asset_marker: String,
    /// Entry copied out of the auxiliary archive.
    pub auxiliary_entry: String,
    /// Directory the auxiliary entry is placed under.
    pub auxiliary_dir: String,
}

#[derive(Debug, Clone)]
pub struct PackagedArchive {
    pub variant: Variant,
    pub asset: Asset,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct FailedVariant {
    pub variant: Variant,
    pub asset: Asset,
    pub error: PackageError,
}

#[derive(Debug)]
pub enum VariantOutcome {
    Packaged(PackagedArchive),
    /// The release has no asset for this variant. Not a failure.
    Absent { variant: Variant },
    Failed(FailedVariant),
}

impl VariantOutcome {
    #[must_use]
    pub fn variant(&self) -> Variant {
        match self {
            VariantOutcome::Packaged(packaged) => packaged.variant,
            VariantOutcome::Absent { variant } => *variant,
            VariantOutcome::Failed(failed) => failed.variant,
        }
    }
}

#[derive(Debug, Error)]
pub enum PackagingFailure {
    #[error("{} variant(s) failed to package", .0.len())]
    Failed(Vec<FailedVariant>),
    #[error("no variant had a matching asset")]
    AllAbsent,
}

/// Fold per-variant outcomes into the archives to publish.
///
/// Any failed variant fails the whole batch, even if others were written.
/// Absent variants are ignored unless every variant was absent.
///
/// # Errors
/// Returns [`PackagingFailure::Failed`] with every failed variant, or
/// [`PackagingFailure::AllAbsent`] when nothing was packaged.
pub fn summarize(outcomes: Vec<VariantOutcome>) -> Result<Vec<PackagedArchive>, PackagingFailure> {
    let mut packaged = Vec::new();
    let mut failed = Vec::new();

    for outcome in outcomes {
        match outcome {
            VariantOutcome::Packaged(archive) => packaged.push(archive),
            VariantOutcome::Absent { .. } => {}
            VariantOutcome::Failed(failure) => failed.push(failure),
        }
    }

    if !failed.is_empty() {
        Err(PackagingFailure::Failed(failed))
    } else if packaged.is_empty() {
        Err(PackagingFailure::AllAbsent)
    } else {
        Ok(packaged)
    }
}

type ScannedPayload = Result<Payload, Arc<PackageError>>;

struct AuxiliaryMerge {
    bytes: Arc<[u8]>,
    entry: String,
    dir: String,
}

pub struct Packager<'a> {
    provider: &'a dyn ReleaseProvider,
    release: &'a Release,
    options: &'a PackageOptions,
    auxiliary: Option<Arc<[u8]>>,
}

impl<'a> Packager<'a> {
    pub fn new(
        provider: &'a dyn ReleaseProvider,
        release: &'a Release,
        options: &'a PackageOptions,
    ) -> Self {
        Self {
            provider,
            release,
            options,
            auxiliary: None,
        }
    }

    /// Share a downloaded auxiliary archive with every job.
    #[must_use]
    pub fn with_auxiliary(mut self, auxiliary: Arc<[u8]>) -> Self {
        self.auxiliary = Some(auxiliary);
        self
    }

    /// Package every variant concurrently and wait for all of them.
    ///
    /// The payload directory is scanned once and shared by every job.
    pub async fn package_all(&self, variants: &[Variant]) -> Vec<VariantOutcome> {
        let payload = self.scan_payload().await;
        join_all(
            variants
                .iter()
                .map(|&variant| self.package_with(variant, &payload)),
        )
        .await
    }

    /// Package a single variant. Errors are captured in the outcome.
    pub async fn package(&self, variant: Variant) -> VariantOutcome {
        let payload = self.scan_payload().await;
        self.package_with(variant, &payload).await
    }

    async fn scan_payload(&self) -> ScannedPayload {
        let root = self.options.payload_dir.clone();
        tokio::task::spawn_blocking(move || Payload::scan(&root))
            .await
            .map_err(|error| PackageError::Task {
                context: "payload scan task failed",
                details: error.to_string(),
            })
            .and_then(|scanned| scanned)
            .map_err(Arc::new)
    }

    async fn package_with(&self, variant: Variant, payload: &ScannedPayload) -> VariantOutcome {
        let Some(asset) = select_asset(&self.release.assets, variant, &self.options.asset_marker)
        else {
            warn!(
                "No {variant} asset in release {} of /{}",
                self.release.tag_name, self.options.upstream
            );
            return VariantOutcome::Absent { variant };
        };

        match self.build(variant, asset, payload).await {
            Ok(path) => VariantOutcome::Packaged(PackagedArchive {
                variant,
                asset: asset.clone(),
                path,
            }),
            Err(error) => VariantOutcome::Failed(FailedVariant {
                variant,
                asset: asset.clone(),
                error,
            }),
        }
    }

    async fn build(
        &self,
        variant: Variant,
        asset: &Asset,
        payload: &ScannedPayload,
    ) -> Result<PathBuf, PackageError> {
        let file_name = output_file_name(&asset.name)?;

        info!("Downloading {variant} archive...");
        let data = self
            .provider
            .download_asset(&self.options.upstream, asset)
            .await
            .map_err(|error| {
                log_download_error(&error, variant, &self.options.upstream);
                PackageError::download("failed to download asset", error)
            })?;
        verify_digest(asset, &data)?;

        info!("Embedding payload in {variant} archive...");
        let payload = payload
            .as_ref()
            .map_err(|error| PackageError::Payload(Arc::clone(error)))?;
        let mut files = Vec::new();
        for file in payload.files_for(variant) {
            let contents = tokio::fs::read(&file.source).await.map_err(|error| {
                PackageError::io_with_path("failed to read payload file", &file.source, &error)
            })?;
            files.push((file.archive_name(), contents));
        }

        let auxiliary = self.auxiliary.clone().map(|bytes| AuxiliaryMerge {
            bytes,
            entry: self.options.auxiliary_entry.clone(),
            dir: self.options.auxiliary_dir.clone(),
        });
        let archive = tokio::task::spawn_blocking(move || {
            merge_archive(&data, files, auxiliary.as_ref(), variant)
        })
        .await
        .map_err(|error| PackageError::Task {
            context: "archive merge task failed",
            details: error.to_string(),
        })??;

        info!("Writing {variant} archive to disk...");
        tokio::fs::create_dir_all(&self.options.output_dir)
            .await
            .map_err(|error| {
                PackageError::io_with_path(
                    "failed to create output directory",
                    &self.options.output_dir,
                    &error,
                )
            })?;
        let path = self.options.output_dir.join(file_name);
        tokio::fs::write(&path, archive)
            .await
            .map_err(|error| PackageError::io_with_path("failed to write archive", &path, &error))?;

        debug!("Wrote {}", path.display());
        Ok(path)
    }
}

fn merge_archive(
    asset: &[u8],
    payload: Vec<(String, Vec<u8>)>,
    auxiliary: Option<&AuxiliaryMerge>,
    variant: Variant,
) -> Result<Vec<u8>, PackageError> {
    let mut archive = ArchiveBuilder::from_zip(asset)?;

    for (name, contents) in payload {
        archive.insert_file(&name, contents);
    }

    if let Some(auxiliary) = auxiliary {
        info!("Embedding auxiliary libraries in {variant} archive...");
        let contents = extract_entry(&auxiliary.bytes, &auxiliary.entry)?;
        let name = format!(
            "{}/{}",
            auxiliary.dir.trim_matches('/'),
            auxiliary.entry
        );
        archive.insert_file(&name, contents);
    }

    archive.finish()
}

fn output_file_name(asset_name: &str) -> Result<&str, PackageError> {
    Path::new(asset_name)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| *name == asset_name)
        .ok_or_else(|| PackageError::Invalid(format!("unsafe asset name {asset_name:?}")))
}

fn log_download_error(error: &GitHubError, variant: Variant, repo: &RepoRef) {
    if error.is_not_found() {
        error!("{variant} asset not found for repo: /{repo}: {error}");
    } else {
        error!("Could not retrieve {variant} asset for repo: /{repo}: {error}");
    }
}

fn verify_digest(asset: &Asset, data: &[u8]) -> Result<(), PackageError> {
    let Some(expected) = asset.digest.as_deref().and_then(parse_sha256_digest) else {
        debug!("No usable digest for {}, skipping verification", asset.name);
        return Ok(());
    };

    let actual = format!("{:x}", Sha256::digest(data));
    if actual == expected {
        debug!("Checksum verified for {}", asset.name);
        Ok(())
    } else {
        Err(PackageError::Invalid(format!(
            "checksum mismatch for {}: expected {expected}, got {actual}",
            asset.name
        )))
    }
}

fn parse_sha256_digest(digest: &str) -> Option<String> {
    let (algorithm, hash) = digest.split_once(':')?;
    if !algorithm.eq_ignore_ascii_case("sha256") {
        return None;
    }
    if hash.len() != 64 || !hash.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    Some(hash.to_ascii_lowercase())
}
