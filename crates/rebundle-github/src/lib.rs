//! GitHub release plumbing for rebundle.
//!
//! The rest of the workspace talks to the release host only through the
//! [`ReleaseProvider`] trait; [`GitHubClient`] is the `reqwest`-backed
//! implementation used in production.

mod client;
mod error;
mod traits;
mod types;

pub use client::GitHubClient;
pub use error::GitHubError;
pub use traits::{AssetUpload, ReleaseProvider};
pub use types::{Asset, NewRelease, Release, RepoParseError, RepoRef};
