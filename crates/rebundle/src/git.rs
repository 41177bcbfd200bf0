use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;
use tokio::process::Command;
use which::which;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git executable not found: {0}")]
    NotFound(#[source] which::Error),

    #[error("failed to run git {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
}

/// Thin wrapper over the `git` executable, run inside one working tree.
#[derive(Debug, Clone)]
pub struct Git {
    program: PathBuf,
    dir: PathBuf,
}

impl Git {
    /// Find `git` on `PATH`.
    ///
    /// # Errors
    /// Returns an error if no git executable is found.
    pub fn locate(dir: impl Into<PathBuf>) -> Result<Self, GitError> {
        let program = which("git").map_err(GitError::NotFound)?;
        Ok(Self {
            program,
            dir: dir.into(),
        })
    }

    async fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let command = args.join(" ");
        debug!("Running git {command}");

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(&self.dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .map_err(|source| GitError::Spawn {
                command: command.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(GitError::CommandFailed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Whether `path` has staged, unstaged or untracked changes.
    ///
    /// `path` is a pathspec relative to the working directory, so the
    /// check holds from any subdirectory of the checkout.
    ///
    /// # Errors
    /// Returns an error if `git status` fails.
    pub async fn has_changes(&self, path: &str) -> Result<bool, GitError> {
        let output = self
            .run(&["status", "--porcelain", "--untracked-files=all", "--", path])
            .await?;
        Ok(output.lines().any(|line| !line.trim().is_empty()))
    }

    /// Set a repository-local config value.
    ///
    /// # Errors
    /// Returns an error if `git config` fails.
    pub async fn set_config(&self, key: &str, value: &str) -> Result<(), GitError> {
        self.run(&["config", key, value]).await.map(|_| ())
    }

    /// Mark `path` as a safe directory in the global config.
    ///
    /// # Errors
    /// Returns an error if `git config` fails.
    pub async fn add_safe_directory(&self, path: &Path) -> Result<(), GitError> {
        let path = path.to_string_lossy();
        self.run(&["config", "--global", "--add", "safe.directory", &path])
            .await
            .map(|_| ())
    }

    /// Stage a single path.
    ///
    /// # Errors
    /// Returns an error if `git add` fails.
    pub async fn add(&self, path: &str) -> Result<(), GitError> {
        self.run(&["add", "--", path]).await.map(|_| ())
    }

    /// Commit only `path` and return the new commit's SHA.
    ///
    /// # Errors
    /// Returns an error if the commit or the `HEAD` lookup fails.
    pub async fn commit(&self, message: &str, path: &str) -> Result<String, GitError> {
        self.run(&["commit", "-m", message, "--", path]).await?;
        let sha = self.run(&["rev-parse", "HEAD"]).await?;
        Ok(sha.trim().to_string())
    }

    /// # Errors
    /// Returns an error if `git push` fails.
    pub async fn push(&self) -> Result<(), GitError> {
        self.run(&["push"]).await.map(|_| ())
    }
}
