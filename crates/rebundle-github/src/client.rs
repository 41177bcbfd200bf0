use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use crate::error::GitHubError;
use crate::traits::{AssetUpload, ReleaseProvider};
use crate::types::{Asset, NewRelease, Release, RepoRef};

const API_BASE: &str = "https://api.github.com";
const UPLOADS_BASE: &str = "https://uploads.github.com";
const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const BINARY_MEDIA_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    token: String,
    api_base: String,
    uploads_base: String,
}

impl GitHubClient {
    /// Build an authenticated client.
    ///
    /// `timeout` of `None` leaves requests unbounded.
    ///
    /// # Errors
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn new(token: impl Into<String>, timeout: Option<Duration>) -> Result<Self, GitHubError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(format!("rebundle/{}", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(GitHubError::ClientBuild)?;

        Ok(Self {
            http,
            token: token.into(),
            api_base: API_BASE.to_string(),
            uploads_base: UPLOADS_BASE.to_string(),
        })
    }

    /// Point the client at different API and upload hosts (GitHub Enterprise,
    /// local mocks).
    #[must_use]
    pub fn with_base_urls(mut self, api_base: &str, uploads_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.uploads_base = uploads_base.trim_end_matches('/').to_string();
        self
    }

    /// The plain HTTP client, for unauthenticated downloads from other hosts.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn api_request(
        &self,
        method: reqwest::Method,
        url: &str,
        accept: &'static str,
    ) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, accept)
            .header(API_VERSION_HEADER, API_VERSION)
    }

    fn repo_url(&self, repo: &RepoRef, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{path}",
            self.api_base, repo.owner, repo.repo
        )
    }
}

async fn ensure_success(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, GitHubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body_snippet = response
        .text()
        .await
        .ok()
        .map(|body| response_snippet(&body, 160))
        .unwrap_or_default();

    if status == reqwest::StatusCode::NOT_FOUND {
        Err(GitHubError::NotFound {
            operation,
            body_snippet,
        })
    } else {
        Err(GitHubError::Status {
            operation,
            status,
            body_snippet,
        })
    }
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

#[async_trait]
impl ReleaseProvider for GitHubClient {
    async fn latest_release(&self, repo: &RepoRef) -> Result<Release, GitHubError> {
        const OPERATION: &str = "get latest release";

        let url = self.repo_url(repo, "releases/latest");
        debug!("GET {url}");
        let response = self
            .api_request(reqwest::Method::GET, &url, JSON_MEDIA_TYPE)
            .send()
            .await
            .map_err(|error| GitHubError::request(OPERATION, error))?;

        ensure_success(OPERATION, response)
            .await?
            .json()
            .await
            .map_err(|error| GitHubError::parse(OPERATION, error))
    }

    async fn download_asset(&self, repo: &RepoRef, asset: &Asset) -> Result<Vec<u8>, GitHubError> {
        const OPERATION: &str = "download release asset";

        let url = self.repo_url(repo, &format!("releases/assets/{}", asset.id));
        debug!("GET {url} ({})", asset.name);
        let response = self
            .api_request(reqwest::Method::GET, &url, BINARY_MEDIA_TYPE)
            .send()
            .await
            .map_err(|error| GitHubError::request(OPERATION, error))?;
        let response = ensure_success(OPERATION, response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if content_type.contains("json") || content_type.starts_with("text/") {
            return Err(GitHubError::unexpected(
                OPERATION,
                format!("expected binary data for {}, got {content_type}", asset.name),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| GitHubError::request(OPERATION, error))?;
        if bytes.is_empty() {
            return Err(GitHubError::unexpected(
                OPERATION,
                format!("empty body for {}", asset.name),
            ));
        }

        Ok(bytes.to_vec())
    }

    async fn create_release(
        &self,
        repo: &RepoRef,
        release: &NewRelease,
    ) -> Result<Release, GitHubError> {
        const OPERATION: &str = "create release";

        let url = self.repo_url(repo, "releases");
        debug!("POST {url} ({})", release.tag_name);
        let response = self
            .api_request(reqwest::Method::POST, &url, JSON_MEDIA_TYPE)
            .json(release)
            .send()
            .await
            .map_err(|error| GitHubError::request(OPERATION, error))?;

        ensure_success(OPERATION, response)
            .await?
            .json()
            .await
            .map_err(|error| GitHubError::parse(OPERATION, error))
    }

    async fn upload_asset(
        &self,
        repo: &RepoRef,
        release: &Release,
        upload: AssetUpload,
    ) -> Result<Asset, GitHubError> {
        const OPERATION: &str = "upload release asset";

        let base = format!(
            "{}/repos/{}/{}/releases/{}/assets",
            self.uploads_base, repo.owner, repo.repo, release.id
        );
        let url = reqwest::Url::parse_with_params(&base, &[("name", upload.name.as_str())])
            .map_err(|error| GitHubError::unexpected(OPERATION, error.to_string()))?;
        debug!("POST {url} ({} bytes)", upload.data.len());

        let response = self
            .api_request(reqwest::Method::POST, url.as_str(), JSON_MEDIA_TYPE)
            .header(CONTENT_TYPE, upload.content_type)
            .body(upload.data)
            .send()
            .await
            .map_err(|error| GitHubError::request(OPERATION, error))?;

        ensure_success(OPERATION, response)
            .await?
            .json()
            .await
            .map_err(|error| GitHubError::parse(OPERATION, error))
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::{GitHubClient, response_snippet};
    use crate::{AssetUpload, NewRelease, ReleaseProvider, RepoRef};

    fn client_for(server: &Server) -> GitHubClient {
        GitHubClient::new("test-token", None)
            .expect("client should build")
            .with_base_urls(&server.url(), &server.url())
    }

    fn release_json(id: u64, tag: &str) -> String {
        serde_json::json!({
            "id": id,
            "tag_name": tag,
            "name": format!("BepInEx {tag}"),
            "body": "changelog",
            "html_url": format!("https://github.com/BepInEx/BepInEx/releases/tag/{tag}"),
            "assets": [
                {
                    "id": 11,
                    "name": "BepInEx_unix_5.4.23.zip",
                    "content_type": "application/zip",
                    "size": 3
                }
            ]
        })
        .to_string()
    }

    #[test]
    fn response_snippet_truncates_and_prefixes() {
        assert_eq!(response_snippet("", 10), "");
        assert_eq!(response_snippet("abcdef", 3), ": abc");
    }

    #[tokio::test]
    async fn latest_release_parses_response_and_sends_token() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/BepInEx/BepInEx/releases/latest")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(release_json(1, "v5.4.23"))
            .create_async()
            .await;

        let release = client_for(&server)
            .latest_release(&RepoRef::new("BepInEx", "BepInEx"))
            .await
            .expect("latest release should be fetched");

        assert_eq!(release.tag_name, "v5.4.23");
        assert_eq!(release.assets.len(), 1);
        assert_eq!(release.assets[0].content_type, "application/zip");
    }

    #[tokio::test]
    async fn latest_release_maps_404_to_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/toebeann/fresh/releases/latest")
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create_async()
            .await;

        let error = client_for(&server)
            .latest_release(&RepoRef::new("toebeann", "fresh"))
            .await
            .expect_err("missing release should fail");

        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn latest_release_reports_other_statuses() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/BepInEx/BepInEx/releases/latest")
            .with_status(502)
            .create_async()
            .await;

        let error = client_for(&server)
            .latest_release(&RepoRef::new("BepInEx", "BepInEx"))
            .await
            .expect_err("bad gateway should fail");

        assert!(!error.is_not_found());
        assert_eq!(error.status(), Some(reqwest::StatusCode::BAD_GATEWAY));
    }

    #[tokio::test]
    async fn download_asset_requests_binary_content() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/BepInEx/BepInEx/releases/assets/11")
            .match_header("accept", "application/octet-stream")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body([1_u8, 2, 3])
            .create_async()
            .await;
        let release: crate::Release =
            serde_json::from_str(&release_json(1, "v5.4.23")).expect("fixture should parse");

        let data = client_for(&server)
            .download_asset(&RepoRef::new("BepInEx", "BepInEx"), &release.assets[0])
            .await
            .expect("asset should download");

        assert_eq!(data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn download_asset_rejects_json_payloads() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/BepInEx/BepInEx/releases/assets/11")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":11}"#)
            .create_async()
            .await;
        let release: crate::Release =
            serde_json::from_str(&release_json(1, "v5.4.23")).expect("fixture should parse");

        let error = client_for(&server)
            .download_asset(&RepoRef::new("BepInEx", "BepInEx"), &release.assets[0])
            .await
            .expect_err("json body is not an asset");

        assert!(matches!(error, crate::GitHubError::UnexpectedContent { .. }));
    }

    #[tokio::test]
    async fn create_release_posts_tag_and_notes_flag() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/repos/toebeann/bepinex.chainedechoes/releases")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "tag_name": "v5.4.23-payload.1.0.0",
                "target_commitish": "abc123",
                "generate_release_notes": true
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(release_json(99, "v5.4.23-payload.1.0.0"))
            .create_async()
            .await;

        let created = client_for(&server)
            .create_release(
                &RepoRef::new("toebeann", "bepinex.chainedechoes"),
                &NewRelease {
                    tag_name: "v5.4.23-payload.1.0.0".to_string(),
                    target_commitish: Some("abc123".to_string()),
                    name: "BepInEx 5.4.23".to_string(),
                    body: None,
                    generate_release_notes: true,
                },
            )
            .await
            .expect("release should be created");

        assert_eq!(created.id, 99);
    }

    #[tokio::test]
    async fn upload_asset_sends_name_and_content_type() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/repos/toebeann/bepinex.chainedechoes/releases/99/assets")
            .match_query(Matcher::UrlEncoded(
                "name".to_string(),
                "BepInEx unix.zip".to_string(),
            ))
            .match_header("content-type", "application/zip")
            .match_body(vec![9_u8, 8, 7])
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":5,"name":"BepInEx unix.zip","content_type":"application/zip","size":3}"#)
            .create_async()
            .await;
        let release: crate::Release = serde_json::from_str(&release_json(99, "v1.0.0"))
            .expect("fixture should parse");

        let uploaded = client_for(&server)
            .upload_asset(
                &RepoRef::new("toebeann", "bepinex.chainedechoes"),
                &release,
                AssetUpload {
                    name: "BepInEx unix.zip".to_string(),
                    content_type: "application/zip".to_string(),
                    data: vec![9, 8, 7],
                },
            )
            .await
            .expect("upload should succeed");

        assert_eq!(uploaded.id, 5);
        assert_eq!(uploaded.size, 3);
    }
}
