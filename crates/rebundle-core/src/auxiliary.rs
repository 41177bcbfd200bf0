use log::info;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuxiliaryError {
    #[error("failed to download auxiliary libraries from {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("auxiliary library download failed with HTTP {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Download the auxiliary library archive shared by every variant.
///
/// The request is attempted once.
///
/// # Errors
/// Returns an error if the request fails, the server responds with a
/// non-success status, or the body cannot be read.
pub async fn download_auxiliary(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<u8>, AuxiliaryError> {
    info!("Downloading auxiliary libraries from {url}...");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| AuxiliaryError::Request {
            url: url.to_string(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(AuxiliaryError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    response
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|source| AuxiliaryError::Request {
            url: url.to_string(),
            source,
        })
}
