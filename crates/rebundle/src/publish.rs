use std::path::{Path, PathBuf};

use futures_util::future::try_join_all;
use log::{error, info};
use rebundle_core::package::PackagedArchive;
use rebundle_github::{Asset, AssetUpload, NewRelease, Release, ReleaseProvider, RepoRef};
use semver::Version;

use crate::environment::CommitAuthor;
use crate::error::PipelineError;
use crate::git::Git;

const COMMIT_MESSAGE: &str = "Updating metadata";

/// A produced archive as it will appear on the new release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseUpload {
    pub path: PathBuf,
    pub name: String,
    pub content_type: String,
}

/// Pair each produced archive with the content type of the upstream asset
/// it was built from.
pub fn release_uploads(
    packaged: &[PackagedArchive],
    upstream: &Release,
    default_content_type: &str,
) -> Vec<ReleaseUpload> {
    packaged
        .iter()
        .map(|archive| {
            let name = archive.asset.name.clone();
            let content_type = upstream
                .asset_named(&name)
                .map(|asset| asset.content_type.as_str())
                .filter(|content_type| !content_type.is_empty())
                .unwrap_or(default_content_type)
                .to_string();
            ReleaseUpload {
                path: archive.path.clone(),
                name,
                content_type,
            }
        })
        .collect()
}

pub fn new_release(
    upstream: &Release,
    upstream_version: &Version,
    compound: &Version,
    commit: Option<String>,
    display_name: &str,
) -> NewRelease {
    NewRelease {
        tag_name: format!("v{compound}"),
        target_commitish: commit,
        name: upstream
            .name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("{display_name} {upstream_version}")),
        body: upstream.body.clone(),
        generate_release_notes: true,
    }
}

pub struct Publisher<'a> {
    provider: &'a dyn ReleaseProvider,
    git: Git,
    repository: &'a RepoRef,
}

impl<'a> Publisher<'a> {
    pub fn new(provider: &'a dyn ReleaseProvider, git: Git, repository: &'a RepoRef) -> Self {
        Self {
            provider,
            git,
            repository,
        }
    }

    /// Commit and push the metadata file, returning the commit SHA.
    ///
    /// # Errors
    /// Returns [`PipelineError::MetadataUnchanged`] if git sees no change to
    /// the file, or a git error from any step.
    pub async fn commit_metadata(
        &self,
        metadata_file: &Path,
        author: &CommitAuthor,
        workspace: Option<&Path>,
    ) -> Result<String, PipelineError> {
        let tracked = metadata_file.to_string_lossy();
        if !self.git.has_changes(&tracked).await? {
            error!("Metadata was not updated");
            return Err(PipelineError::MetadataUnchanged {
                path: metadata_file.to_path_buf(),
            });
        }

        if let Some(workspace) = workspace {
            self.git.add_safe_directory(workspace).await?;
        }
        self.git.set_config("user.name", &author.name).await?;
        self.git.set_config("user.email", &author.email).await?;
        self.git.set_config("core.ignorecase", "false").await?;

        info!("Committing metadata as {} <{}>", author.name, author.email);
        self.git.add(&tracked).await?;
        let sha = self.git.commit(COMMIT_MESSAGE, &tracked).await?;
        self.git.push().await?;
        info!("Pushed metadata commit {sha}");

        Ok(sha)
    }

    /// # Errors
    /// Returns [`PipelineError::Publish`] if the release cannot be created.
    pub async fn create_release(&self, release: &NewRelease) -> Result<Release, PipelineError> {
        info!("Creating release {}...", release.tag_name);
        self.provider
            .create_release(self.repository, release)
            .await
            .map_err(|source| {
                error!("Could not create release {}: {source}", release.tag_name);
                PipelineError::Publish {
                    operation: "create release",
                    source,
                }
            })
    }

    /// Upload every archive to `release`, concurrently.
    ///
    /// # Errors
    /// Returns the first read or upload failure.
    pub async fn upload_all(
        &self,
        release: &Release,
        uploads: Vec<ReleaseUpload>,
    ) -> Result<Vec<Asset>, PipelineError> {
        try_join_all(
            uploads
                .into_iter()
                .map(|upload| self.upload(release, upload)),
        )
        .await
    }

    async fn upload(&self, release: &Release, upload: ReleaseUpload) -> Result<Asset, PipelineError> {
        let data = tokio::fs::read(&upload.path)
            .await
            .map_err(|source| PipelineError::ReadUpload {
                path: upload.path.clone(),
                source,
            })?;

        info!("Uploading {}...", upload.name);
        let name = upload.name.clone();
        self.provider
            .upload_asset(
                self.repository,
                release,
                AssetUpload {
                    name: upload.name,
                    content_type: upload.content_type,
                    data,
                },
            )
            .await
            .map_err(|source| {
                error!("Could not upload {name}: {source}");
                PipelineError::Publish {
                    operation: "upload release asset",
                    source,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rebundle_core::Variant;
    use rebundle_core::package::PackagedArchive;
    use rebundle_github::{
        Asset, AssetUpload, GitHubError, NewRelease, Release, ReleaseProvider, RepoRef,
    };
    use semver::Version;

    use super::{Publisher, ReleaseUpload, new_release, release_uploads};
    use crate::environment::CommitAuthor;
    use crate::error::PipelineError;
    use crate::git::Git;

    #[derive(Default)]
    struct RecordingProvider {
        fail_create: bool,
        uploads: Mutex<Vec<(String, String, usize)>>,
    }

    #[async_trait]
    impl ReleaseProvider for RecordingProvider {
        async fn latest_release(&self, _repo: &RepoRef) -> Result<Release, GitHubError> {
            unreachable!("publisher never looks up releases")
        }

        async fn download_asset(
            &self,
            _repo: &RepoRef,
            _asset: &Asset,
        ) -> Result<Vec<u8>, GitHubError> {
            unreachable!("publisher never downloads assets")
        }

        async fn create_release(
            &self,
            _repo: &RepoRef,
            release: &NewRelease,
        ) -> Result<Release, GitHubError> {
            if self.fail_create {
                return Err(GitHubError::Status {
                    operation: "create release",
                    status: reqwest::StatusCode::UNPROCESSABLE_ENTITY,
                    body_snippet: "already_exists".to_string(),
                });
            }
            Ok(release_with(&release.tag_name, Vec::new()))
        }

        async fn upload_asset(
            &self,
            _repo: &RepoRef,
            _release: &Release,
            upload: AssetUpload,
        ) -> Result<Asset, GitHubError> {
            let size = upload.data.len();
            self.uploads
                .lock()
                .expect("upload log should not be poisoned")
                .push((upload.name.clone(), upload.content_type.clone(), size));
            Ok(asset(7, &upload.name, &upload.content_type))
        }
    }

    fn asset(id: u64, name: &str, content_type: &str) -> Asset {
        Asset {
            id,
            name: name.to_string(),
            content_type: content_type.to_string(),
            size: 0,
            digest: None,
        }
    }

    fn release_with(tag: &str, assets: Vec<Asset>) -> Release {
        Release {
            id: 3,
            tag_name: tag.to_string(),
            name: None,
            body: Some("Upstream notes".to_string()),
            html_url: format!("https://github.com/BepInEx/BepInEx/releases/tag/{tag}"),
            published_at: None,
            assets,
        }
    }

    fn packaged(name: &str, path: PathBuf) -> PackagedArchive {
        PackagedArchive {
            variant: Variant::X64,
            asset: asset(1, name, ""),
            path,
        }
    }

    #[test]
    fn uploads_copy_upstream_content_type_or_default() {
        let upstream = release_with(
            "v5.4.23.2",
            vec![asset(1, "BepInEx_x64.zip", "application/zip")],
        );
        let uploads = release_uploads(
            &[
                packaged("BepInEx_x64.zip", PathBuf::from("dist/BepInEx_x64.zip")),
                packaged("BepInEx_unix.zip", PathBuf::from("dist/BepInEx_unix.zip")),
            ],
            &upstream,
            "application/x-zip-compressed",
        );

        assert_eq!(
            uploads,
            vec![
                ReleaseUpload {
                    path: PathBuf::from("dist/BepInEx_x64.zip"),
                    name: "BepInEx_x64.zip".to_string(),
                    content_type: "application/zip".to_string(),
                },
                ReleaseUpload {
                    path: PathBuf::from("dist/BepInEx_unix.zip"),
                    name: "BepInEx_unix.zip".to_string(),
                    content_type: "application/x-zip-compressed".to_string(),
                },
            ]
        );
    }

    #[test]
    fn new_release_is_tagged_with_compound_version() {
        let upstream = release_with("v5.4.23.2", Vec::new());
        let release = new_release(
            &upstream,
            &Version::new(5, 4, 23),
            &Version::parse("5.4.23-payload.1.0.0").expect("version should parse"),
            Some("abc123".to_string()),
            "BepInEx",
        );

        assert_eq!(release.tag_name, "v5.4.23-payload.1.0.0");
        assert_eq!(release.target_commitish.as_deref(), Some("abc123"));
        assert_eq!(release.name, "BepInEx 5.4.23");
        assert_eq!(release.body.as_deref(), Some("Upstream notes"));
        assert!(release.generate_release_notes);
    }

    #[test]
    fn new_release_prefers_upstream_name() {
        let mut upstream = release_with("v5.4.23.2", Vec::new());
        upstream.name = Some("BepInEx 5.4.23.2".to_string());

        let release = new_release(
            &upstream,
            &Version::new(5, 4, 23),
            &Version::parse("5.4.23-payload.1.0.0").expect("version should parse"),
            None,
            "BepInEx",
        );

        assert_eq!(release.name, "BepInEx 5.4.23.2");
    }

    #[tokio::test]
    async fn uploads_every_archive_with_its_bytes() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let git = Git::locate(temp.path()).expect("git should be on PATH");
        let x64 = temp.path().join("BepInEx_x64.zip");
        let unix = temp.path().join("BepInEx_unix.zip");
        std::fs::write(&x64, b"12345").expect("archive should be written");
        std::fs::write(&unix, b"123").expect("archive should be written");

        let provider = RecordingProvider::default();
        let repository = RepoRef::new("toebeann", "bepinex.chainedechoes");
        let publisher = Publisher::new(&provider, git, &repository);
        let release = release_with("v5.4.23-payload.1.0.0", Vec::new());

        let assets = publisher
            .upload_all(
                &release,
                vec![
                    ReleaseUpload {
                        path: x64,
                        name: "BepInEx_x64.zip".to_string(),
                        content_type: "application/zip".to_string(),
                    },
                    ReleaseUpload {
                        path: unix,
                        name: "BepInEx_unix.zip".to_string(),
                        content_type: "application/x-zip-compressed".to_string(),
                    },
                ],
            )
            .await
            .expect("uploads should succeed");

        assert_eq!(assets.len(), 2);
        let mut uploads = provider
            .uploads
            .lock()
            .expect("upload log should not be poisoned")
            .clone();
        uploads.sort();
        assert_eq!(
            uploads,
            vec![
                (
                    "BepInEx_unix.zip".to_string(),
                    "application/x-zip-compressed".to_string(),
                    3
                ),
                ("BepInEx_x64.zip".to_string(), "application/zip".to_string(), 5),
            ]
        );
    }

    #[tokio::test]
    async fn release_creation_failure_is_a_publish_error() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let git = Git::locate(temp.path()).expect("git should be on PATH");
        let provider = RecordingProvider {
            fail_create: true,
            ..RecordingProvider::default()
        };
        let repository = RepoRef::new("toebeann", "bepinex.chainedechoes");
        let publisher = Publisher::new(&provider, git, &repository);
        let release = new_release(
            &release_with("v5.4.23.2", Vec::new()),
            &Version::new(5, 4, 23),
            &Version::parse("5.4.23-payload.1.0.0").expect("version should parse"),
            None,
            "BepInEx",
        );

        let error = publisher
            .create_release(&release)
            .await
            .expect_err("creation should fail");

        assert!(matches!(
            error,
            PipelineError::Publish {
                operation: "create release",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn unchanged_metadata_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let git = Git::locate(temp.path()).expect("git should be on PATH");
        run_git(temp.path(), &["init", "--quiet"]);

        let provider = RecordingProvider::default();
        let repository = RepoRef::new("toebeann", "bepinex.chainedechoes");
        let publisher = Publisher::new(&provider, git, &repository);
        let author = CommitAuthor {
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
        };

        let error = publisher
            .commit_metadata(Path::new(".metadata.json"), &author, None)
            .await
            .expect_err("unchanged metadata should fail");

        assert!(matches!(error, PipelineError::MetadataUnchanged { .. }));
    }

    #[tokio::test]
    async fn commits_metadata_from_a_subdirectory_of_the_checkout() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let remote = temp.path().join("remote.git");
        let checkout = temp.path().join("checkout");
        let project = checkout.join("project");
        std::fs::create_dir_all(&project).expect("project dir should be created");

        let remote_path = remote.to_str().expect("temp path should be utf-8");
        run_git(temp.path(), &["init", "--quiet", "--bare", remote_path]);
        run_git(&checkout, &["init", "--quiet"]);
        run_git(&checkout, &["config", "user.name", "Test"]);
        run_git(&checkout, &["config", "user.email", "test@example.com"]);
        run_git(&checkout, &["config", "commit.gpgsign", "false"]);
        std::fs::write(project.join("keep.txt"), "x").expect("file should be written");
        run_git(&checkout, &["add", "--", "project/keep.txt"]);
        run_git(&checkout, &["commit", "--quiet", "-m", "Initial"]);
        run_git(&checkout, &["remote", "add", "origin", remote_path]);
        run_git(&checkout, &["push", "--quiet", "-u", "origin", "HEAD"]);

        std::fs::write(project.join(".metadata.json"), "{\"version\":\"5.4.23\"}\n")
            .expect("metadata should be written");

        let git = Git::locate(&project).expect("git should be on PATH");
        let provider = RecordingProvider::default();
        let repository = RepoRef::new("toebeann", "bepinex.chainedechoes");
        let publisher = Publisher::new(&provider, git.clone(), &repository);
        let author = CommitAuthor {
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
        };

        let sha = publisher
            .commit_metadata(Path::new(".metadata.json"), &author, None)
            .await
            .expect("metadata in a subdirectory should be committed");

        assert!(matches!(sha.len(), 40 | 64));
        assert!(
            !git.has_changes(".metadata.json")
                .await
                .expect("status should succeed")
        );
    }

    fn run_git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .expect("git should run");
        assert!(status.success(), "git {} should succeed", args.join(" "));
    }
}
