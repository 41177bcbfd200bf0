use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("failed to build GitHub client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("{operation} request failed: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} returned HTTP 404 Not Found{body_snippet}")]
    NotFound {
        operation: &'static str,
        body_snippet: String,
    },

    #[error("{operation} failed with HTTP {status}{body_snippet}")]
    Status {
        operation: &'static str,
        status: reqwest::StatusCode,
        body_snippet: String,
    },

    #[error("failed to parse {operation} response: {source}")]
    Parse {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected {operation} response: {details}")]
    UnexpectedContent {
        operation: &'static str,
        details: String,
    },
}

impl GitHubError {
    pub(crate) fn request(operation: &'static str, source: reqwest::Error) -> Self {
        Self::Request { operation, source }
    }

    pub(crate) fn parse(operation: &'static str, source: reqwest::Error) -> Self {
        Self::Parse { operation, source }
    }

    pub(crate) fn unexpected(operation: &'static str, details: impl Into<String>) -> Self {
        Self::UnexpectedContent {
            operation,
            details: details.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The HTTP status that caused this error, when one was received.
    #[must_use]
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::NotFound { .. } => Some(reqwest::StatusCode::NOT_FOUND),
            Self::Status { status, .. } => Some(*status),
            Self::Request { source, .. } | Self::Parse { source, .. } => source.status(),
            Self::ClientBuild(_) | Self::UnexpectedContent { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::GitHubError;

    #[test]
    fn not_found_is_distinguished_from_other_statuses() {
        let missing = GitHubError::NotFound {
            operation: "get latest release",
            body_snippet: String::new(),
        };
        assert!(missing.is_not_found());
        assert_eq!(missing.status(), Some(reqwest::StatusCode::NOT_FOUND));

        let forbidden = GitHubError::Status {
            operation: "get latest release",
            status: reqwest::StatusCode::FORBIDDEN,
            body_snippet: ": rate limited".to_string(),
        };
        assert!(!forbidden.is_not_found());
        assert_eq!(forbidden.status(), Some(reqwest::StatusCode::FORBIDDEN));
    }

    #[test]
    fn status_display_includes_operation_and_snippet() {
        let error = GitHubError::Status {
            operation: "create release",
            status: reqwest::StatusCode::UNPROCESSABLE_ENTITY,
            body_snippet: ": already_exists".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "create release failed with HTTP 422 Unprocessable Entity: already_exists"
        );
    }

    #[test]
    fn unexpected_content_has_no_status() {
        let error = GitHubError::unexpected("download release asset", "received JSON");
        assert!(error.status().is_none());
        assert_eq!(
            error.to_string(),
            "unexpected download release asset response: received JSON"
        );
    }
}
