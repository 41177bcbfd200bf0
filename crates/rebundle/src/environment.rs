use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::error::PipelineError;

pub const TOKEN_VAR: &str = "GITHUB_PERSONAL_ACCESS_TOKEN";

const DEFAULT_AUTHOR_NAME: &str = "GitHub Workflow Update and Release";
const DEFAULT_AUTHOR_EMAIL: &str = "github-workflow-update-and-release@users.noreply.github.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Publish,
    /// Package and record metadata, but never touch git or create releases.
    Dev,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct RunEnvironment {
    pub token: String,
    pub mode: RunMode,
    pub author: CommitAuthor,
    /// Checkout registered as a git `safe.directory` before committing.
    pub workspace: Option<PathBuf>,
    pub payload_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EventPayload {
    #[serde(default)]
    pusher: Option<Pusher>,
}

#[derive(Debug, Default, Deserialize)]
struct Pusher {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl RunEnvironment {
    /// Read the run environment from process variables.
    ///
    /// # Errors
    /// Returns [`PipelineError::MissingCredential`] when no token is set.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the run environment through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    /// Returns [`PipelineError::MissingCredential`] when no token is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PipelineError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let token = get(TOKEN_VAR).ok_or(PipelineError::MissingCredential)?;
        let mode = match get("MODE") {
            Some(mode) if mode.eq_ignore_ascii_case("dev") => RunMode::Dev,
            _ => RunMode::Publish,
        };

        let pusher = get("GITHUB_EVENT_PATH")
            .map(|path| read_pusher(Path::new(&path)))
            .unwrap_or_default();
        let actor = get("GITHUB_ACTOR");

        let name = get("INPUT_GIT-CONFIG-NAME")
            .or(pusher.name)
            .or_else(|| actor.clone())
            .unwrap_or_else(|| DEFAULT_AUTHOR_NAME.to_string());
        let email = get("INPUT_GIT-CONFIG-EMAIL")
            .or(pusher.email)
            .or_else(|| actor.map(|actor| format!("{actor}@users.noreply.github.com")))
            .unwrap_or_else(|| DEFAULT_AUTHOR_EMAIL.to_string());

        Ok(Self {
            token,
            mode,
            author: CommitAuthor { name, email },
            workspace: get("GITHUB_WORKSPACE").map(PathBuf::from),
            payload_version: get("PAYLOAD_VERSION"),
        })
    }
}

/// Whether debug logging was requested through `REBUNDLE_DEBUG`.
pub fn debug_requested(lookup: impl Fn(&str) -> Option<String>) -> bool {
    lookup("REBUNDLE_DEBUG").is_some_and(|value| {
        matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
    })
}

fn read_pusher(path: &Path) -> Pusher {
    let payload = std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str::<EventPayload>(&content).ok());

    if payload.is_none() {
        debug!("No readable event payload at {}", path.display());
    }

    let pusher = payload.and_then(|payload| payload.pusher).unwrap_or_default();
    Pusher {
        name: pusher.name.filter(|name| !name.is_empty()),
        email: pusher.email.filter(|email| !email.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{RunEnvironment, RunMode, debug_requested};
    use crate::error::PipelineError;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn missing_or_empty_token_is_fatal() {
        assert!(matches!(
            RunEnvironment::from_lookup(lookup(&[])),
            Err(PipelineError::MissingCredential)
        ));
        assert!(matches!(
            RunEnvironment::from_lookup(lookup(&[("GITHUB_PERSONAL_ACCESS_TOKEN", " ")])),
            Err(PipelineError::MissingCredential)
        ));
    }

    #[test]
    fn dev_mode_disables_publishing() {
        let env = RunEnvironment::from_lookup(lookup(&[
            ("GITHUB_PERSONAL_ACCESS_TOKEN", "token"),
            ("MODE", "dev"),
        ]))
        .expect("environment should load");
        assert_eq!(env.mode, RunMode::Dev);

        let env = RunEnvironment::from_lookup(lookup(&[
            ("GITHUB_PERSONAL_ACCESS_TOKEN", "token"),
            ("MODE", "production"),
        ]))
        .expect("environment should load");
        assert_eq!(env.mode, RunMode::Publish);
    }

    #[test]
    fn author_defaults_to_literal() {
        let env = RunEnvironment::from_lookup(lookup(&[("GITHUB_PERSONAL_ACCESS_TOKEN", "t")]))
            .expect("environment should load");

        assert_eq!(env.author.name, "GitHub Workflow Update and Release");
        assert_eq!(
            env.author.email,
            "github-workflow-update-and-release@users.noreply.github.com"
        );
    }

    #[test]
    fn author_falls_back_to_actor() {
        let env = RunEnvironment::from_lookup(lookup(&[
            ("GITHUB_PERSONAL_ACCESS_TOKEN", "t"),
            ("GITHUB_ACTOR", "octocat"),
        ]))
        .expect("environment should load");

        assert_eq!(env.author.name, "octocat");
        assert_eq!(env.author.email, "octocat@users.noreply.github.com");
    }

    #[test]
    fn pusher_outranks_actor_and_input_outranks_pusher() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let event = temp.path().join("event.json");
        std::fs::write(
            &event,
            r#"{"pusher": {"name": "pusher", "email": "pusher@example.com"}}"#,
        )
        .expect("event should be written");
        let event = event.to_string_lossy().into_owned();

        let env = RunEnvironment::from_lookup(lookup(&[
            ("GITHUB_PERSONAL_ACCESS_TOKEN", "t"),
            ("GITHUB_ACTOR", "octocat"),
            ("GITHUB_EVENT_PATH", event.as_str()),
            ("INPUT_GIT-CONFIG-NAME", "Explicit Name"),
        ]))
        .expect("environment should load");

        assert_eq!(env.author.name, "Explicit Name");
        assert_eq!(env.author.email, "pusher@example.com");
    }

    #[test]
    fn unreadable_event_payload_is_ignored() {
        let env = RunEnvironment::from_lookup(lookup(&[
            ("GITHUB_PERSONAL_ACCESS_TOKEN", "t"),
            ("GITHUB_EVENT_PATH", "/nonexistent/event.json"),
            ("GITHUB_ACTOR", "octocat"),
        ]))
        .expect("environment should load");

        assert_eq!(env.author.name, "octocat");
    }

    #[test]
    fn debug_flag_accepts_common_truthy_values() {
        assert!(debug_requested(lookup(&[("REBUNDLE_DEBUG", "1")])));
        assert!(debug_requested(lookup(&[("REBUNDLE_DEBUG", "TRUE")])));
        assert!(!debug_requested(lookup(&[("REBUNDLE_DEBUG", "0")])));
        assert!(!debug_requested(lookup(&[])));
    }
}
