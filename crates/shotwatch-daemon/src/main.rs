//! Shotwatch - screenshot backup agent
//!
//! Runs in the foreground and mirrors new screenshots from one directory
//! into a dated folder tree on Google Drive:
//! - Resolves the watched directory and operator email (flags, config, prompt)
//! - Opens the SQLite record index
//! - Ensures the root Drive folder exists and is shared with the operator
//! - Reconciles filesystem events until SIGINT/SIGTERM
//!
//! `shotwatch login` must have stored Google credentials in the keyring
//! before the agent can start.

mod cli;
mod logging;
mod prompt;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use shotwatch_core::{
    config::Config,
    domain::{Email, WatchedDirectory},
};
use shotwatch_drive::{
    auth::{DriveAuthAdapter, KeyringTokenStorage, OAuth2Config, TokenManager},
    client::DriveClient,
    retry::RetryPolicy,
    DriveRemoteStore,
};
use shotwatch_index::{DatabasePool, SqliteRecordIndex};
use shotwatch_sync::{bootstrap, dispatch, EngineSettings, FileWatcher, ReconciliationEngine};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cli::{Cli, Command, LogFormat};

// ============================================================================
// AgentService
// ============================================================================

/// Wires the adapters together and runs the reconciliation loop
struct AgentService {
    config: Config,
    watched: WatchedDirectory,
    operator: Email,
    shutdown: CancellationToken,
}

impl AgentService {
    fn new(
        config: Config,
        watched: WatchedDirectory,
        operator: Email,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            watched,
            operator,
            shutdown,
        }
    }

    /// Runs until shutdown; any error before the loop starts is fatal
    async fn run(self) -> Result<()> {
        let db_path = &self.config.index.database_path;
        let db_pool = DatabasePool::new(db_path)
            .await
            .with_context(|| format!("Failed to open record index at {}", db_path.display()))?;
        let index = Arc::new(SqliteRecordIndex::new(db_pool.pool().clone()));
        info!(path = %db_path.display(), "Record index ready");

        let remote = Arc::new(build_remote_store(&self.config)?);

        let report = bootstrap(
            remote.as_ref(),
            index.as_ref(),
            &self.config.drive.root_folder_name,
            &self.operator,
        )
        .await
        .context("Bootstrap reconciliation failed")?;
        info!(
            root = %report.root_id,
            created = report.created_container,
            granted = report.granted,
            "Bootstrap complete"
        );

        let (watcher, stream) = FileWatcher::new(&self.watched, self.config.sync.event_buffer)
            .context("Failed to start file watcher")?;

        let engine = ReconciliationEngine::new(
            remote,
            index,
            self.watched,
            report.root_id,
            EngineSettings::from_config(&self.config.drive),
        );

        let summary = dispatch::run(
            &engine,
            stream,
            self.shutdown.clone(),
            Duration::from_secs(self.config.sync.handler_timeout_secs),
        )
        .await;

        drop(watcher);
        db_pool.close().await;

        info!(
            events = summary.events(),
            uploaded = summary.uploaded,
            deleted = summary.deleted,
            failed = summary.failed,
            watch_errors = summary.watch_errors,
            "Agent stopped"
        );
        Ok(())
    }
}

/// Drive store authorized with the tokens saved by `shotwatch login`
fn build_remote_store(config: &Config) -> Result<DriveRemoteStore> {
    let oauth = OAuth2Config::from_config(&config.auth)
        .context("Set auth.client_id in config.yaml, then run `shotwatch login`")?;
    let tokens = Arc::new(TokenManager::from_keyring(&oauth)?);

    let client = DriveClient::with_base_url("", &config.drive.api_base_url)
        .with_retry_policy(RetryPolicy::default().with_max_retries(config.drive.max_retries));

    Ok(DriveRemoteStore::new(client).with_token_manager(tokens))
}

// ============================================================================
// login / logout
// ============================================================================

async fn login(config: &Config) -> Result<()> {
    let oauth = OAuth2Config::from_config(&config.auth)
        .context("Set auth.client_id (and auth.client_secret) in config.yaml first")?;
    let account = oauth.keyring_account().to_string();

    let tokens = DriveAuthAdapter::new(oauth)
        .login(|url| {
            eprintln!("Open this URL to authorize Shotwatch:\n\n  {url}\n");
        })
        .await
        .context("OAuth2 login failed")?;

    KeyringTokenStorage::store(&account, &tokens)?;
    info!("Login complete");
    println!("Signed in. Credentials stored in the system keyring.");
    Ok(())
}

fn logout(config: &Config) -> Result<()> {
    let oauth = OAuth2Config::from_config(&config.auth)?;
    KeyringTokenStorage::clear(oauth.keyring_account())?;
    println!("Signed out.");
    Ok(())
}

// ============================================================================
// Preconditions
// ============================================================================

/// Resolves directory and email, prompting on stdin off the async runtime
async fn resolve_preconditions(
    dir: Option<PathBuf>,
    email: Option<String>,
    config: &Config,
) -> Result<(WatchedDirectory, Email)> {
    let config_dir = config.watch.directory.clone();
    let config_email = config.watch.operator_email.clone();

    tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stderr();

        let watched = prompt::resolve_directory(dir, config_dir, &mut input, &mut output)?;
        let operator = prompt::resolve_email(email, config_email, &mut input, &mut output)?;
        Ok::<_, anyhow::Error>((watched, operator))
    })
    .await
    .context("Prompt task failed")?
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and cancels `token`
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    let format = cli
        .log_format
        .unwrap_or_else(|| LogFormat::from_config(&config.logging.format));
    logging::init(cli.verbose, format, &config.logging.level)?;
    info!(config_path = %config_path.display(), "Loaded configuration");

    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            error!(%problem, "Invalid configuration");
        }
        anyhow::bail!("Configuration has {} error(s)", problems.len());
    }

    match cli.command {
        Some(Command::Login) => return login(&config).await,
        Some(Command::Logout) => return logout(&config),
        None => {}
    }

    let (watched, operator) = resolve_preconditions(cli.dir, cli.email, &config).await?;
    info!(directory = %watched, operator = %operator, "Shotwatch starting");

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let result = AgentService::new(config, watched, operator, shutdown_token)
        .run()
        .await;

    match &result {
        Ok(()) => info!("Shotwatch shut down gracefully"),
        Err(e) => error!(error = %format!("{e:#}"), "Shotwatch exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
