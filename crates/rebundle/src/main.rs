mod environment;
mod error;
mod git;
mod logging;
mod pipeline;
mod publish;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use log::{error, info};
use rebundle_github::GitHubClient;

use crate::environment::RunEnvironment;
use crate::error::PipelineError;
use crate::pipeline::{Pipeline, RunOutcome};
use crate::settings::{SETTINGS_FILE, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let settings_path = std::env::var_os("REBUNDLE_SETTINGS")
        .map_or_else(|| PathBuf::from(SETTINGS_FILE), PathBuf::from);
    let settings = Settings::load(&settings_path);
    let debug = settings.as_ref().is_ok_and(|settings| settings.debug_logging)
        || environment::debug_requested(|key| std::env::var(key).ok());
    logging::init_logging(
        debug,
        settings
            .as_ref()
            .ok()
            .and_then(|settings| settings.log_file.as_deref()),
    );

    let result = match settings {
        Ok(settings) => run(&settings).await,
        Err(error) => Err(PipelineError::from(error)),
    };

    match result {
        Ok(RunOutcome::UpToDate) => ExitCode::SUCCESS,
        Ok(RunOutcome::Packaged { archives }) => {
            info!("Packaged {} archive(s)", archives.len());
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Published { tag, url }) => {
            info!("Released {tag}: {url}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!("{error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: &Settings) -> Result<RunOutcome, PipelineError> {
    let environment = RunEnvironment::from_env()?;
    let timeout =
        (settings.http_timeout_secs > 0).then(|| Duration::from_secs(settings.http_timeout_secs));
    let client =
        GitHubClient::new(environment.token.clone(), timeout).map_err(PipelineError::Client)?;

    Pipeline::new(settings, &environment, &client, client.http())
        .run()
        .await
}
