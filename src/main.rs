// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! CGM client command line
//!
//! Thin shell front end over [`cgm_client::ApiClient`]. Results are printed
//! as JSON on stdout; logs go to stderr.

use cgm_client::{
    config::Config,
    error::{AppError, Result},
    models::{token_preview, LoginRequest},
    ApiClient,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line client for the CGM backend.
#[derive(Parser, Debug)]
#[command(name = "cgm-client", about = "CGM backend client", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Check backend availability.
    Health,
    /// Start a session.
    Login { email: String, password: String },
    /// Show local session state.
    Status,
    /// Show the logged-in profile.
    Whoami,
    /// List uploaded datasets.
    Datasets,
    /// Upload a CGM CSV export.
    Upload { name: String, file: PathBuf },
    /// Fetch the analysis of a dataset.
    Analysis { dataset_id: String },
    /// End the session.
    Logout,
    /// Delete the account and end the session.
    DeleteAccount,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            if e.is_session_expired() {
                eprintln!("Session expired. Run `cgm-client login` again.");
            } else {
                eprintln!("{e}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<()> {
    let config = Config::from_env()?;
    tracing::debug!(base_url = %config.api_base_url, "Configuration loaded");
    let client = ApiClient::from_config(&config)?;

    match command {
        Command::Health => print_json(&client.health().await?),
        Command::Login { email, password } => {
            let tokens = client.login(&LoginRequest { email, password }).await?;
            print_json(&serde_json::json!({
                "status": "logged_in",
                "token_type": tokens.token_type,
            }))
        }
        Command::Status => {
            let tokens = client.tokens().current();
            print_json(&serde_json::json!({
                "authenticated": client.tokens().is_authenticated(),
                "access_token": tokens.as_ref().map(|t| token_preview(&t.access_token)),
                "token_type": tokens.as_ref().map(|t| t.token_type.clone()),
            }))
        }
        Command::Whoami => print_json(&client.me().await?),
        Command::Datasets => print_json(&client.list_datasets().await?),
        Command::Upload { name, file } => {
            let csv = tokio::fs::read(&file).await.map_err(|e| {
                AppError::Storage(format!("Failed to read {}: {}", file.display(), e))
            })?;
            print_json(&client.upload_dataset(&name, csv).await?)
        }
        Command::Analysis { dataset_id } => print_json(&client.analysis(&dataset_id).await?),
        Command::Logout => {
            client.logout().await?;
            print_json(&serde_json::json!({ "status": "logged_out" }))
        }
        Command::DeleteAccount => {
            client.delete_account().await?;
            print_json(&serde_json::json!({ "status": "deleted" }))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to render output: {}", e)))?;
    println!("{rendered}");
    Ok(())
}

/// Initialize structured JSON logging on stderr.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cgm_client=info,warn")),
        )
        .with(format)
        .init();
}
