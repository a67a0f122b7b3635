#![deny(unsafe_code)]

mod app;
mod config;
mod console;
mod error;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use crate::app::ChatApp;
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so the transcript on stdout stays readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = AppConfig::config_path_from_env();
    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(error) => {
            tracing::warn!(error = %error, "failed to load config, using defaults");
            AppConfig::default()
        }
    };

    let app = match ChatApp::build(&config) {
        Ok(app) => app,
        Err(error) => {
            tracing::error!(error = %error, "failed to start learnovate chat");
            return ExitCode::FAILURE;
        }
    };

    match app.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "learnovate chat stopped");
            ExitCode::FAILURE
        }
    }
}
