//! Sentry watcher CLI: a thin shell around the `sentry_watch` library that
//! parses arguments, loads configuration, and dispatches to the requested
//! action.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info};

use sentry_watch::config::Config;
use sentry_watch::error::SentryError;
use sentry_watch::{hosting, poller};

#[derive(Parser)]
#[command(name = "sentry")]
#[command(about = "Watches repositories for new commits and deploys a QA recipe on change")]
#[command(version)]
struct Cli {
    /// Action to perform: watch the poll/deploy loop, trigger it once, or
    /// validate the config and every probe without deploying
    #[arg(long, short, value_enum)]
    action: Action,

    /// Path to the config file
    #[arg(long, short, default_value = "sentry.yaml")]
    config: PathBuf,

    /// Enable verbose (debug-level) logging
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Action {
    /// Run the long-lived poll/deploy loop
    Watch,
    /// Treat every configured repository as changed and dispatch once
    Trigger,
    /// Load the config, probe every monitored and QA branch, then exit
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    match cli.action {
        Action::Validate => {
            let http = build_http_client(&config)?;
            let failures = validate_probes(&config, &http).await;
            if failures == 0 {
                println!(
                    "{} repositories configured, all probes succeeded",
                    config.repositories.len()
                );
                Ok(())
            } else {
                Err(SentryError::ValidationFailed(failures).into())
            }
        }
        Action::Trigger => {
            let config = Arc::new(config);
            let plan = poller::plan_all(&config);
            let success = poller::dispatch(&config, &plan).await;
            if success {
                Ok(())
            } else {
                Err(SentryError::DeploymentFailed.into())
            }
        }
        Action::Watch => {
            let config = Arc::new(config);
            let http = build_http_client(&config)?;
            poller::watch(config, http).await
        }
    }
}

/// Probe every configured `(repo, branch)` plus each repository's QA
/// branch, per the `validate` action's contract. Returns the number of
/// probes that failed.
async fn validate_probes(config: &Config, http: &reqwest::Client) -> usize {
    let mut failures = 0;

    for repo in &config.repositories {
        let client = match hosting::client_for(http.clone(), repo.monitor.repo.platform) {
            Ok(client) => client,
            Err(err) => {
                error!(repo = %repo.name, error = %err, "unsupported monitor platform");
                failures += 1;
                continue;
            }
        };
        for branch in &repo.monitor.branches {
            if let Err(err) = client.latest_commit(&repo.monitor.repo, branch).await {
                error!(repo = %repo.name, branch, error = %err, "monitor probe failed");
                failures += 1;
            } else {
                info!(repo = %repo.name, branch, "monitor probe ok");
            }
        }

        let qa_client = match hosting::client_for(http.clone(), repo.deploy.repo.platform) {
            Ok(client) => client,
            Err(err) => {
                error!(repo = %repo.name, error = %err, "unsupported QA platform");
                failures += 1;
                continue;
            }
        };
        if let Err(err) = qa_client
            .latest_commit(&repo.deploy.repo, &repo.deploy.branch)
            .await
        {
            error!(repo = %repo.name, branch = %repo.deploy.branch, error = %err, "QA probe failed");
            failures += 1;
        } else {
            info!(repo = %repo.name, branch = %repo.deploy.branch, "QA probe ok");
        }
    }

    failures
}

fn build_http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.global.http_timeout))
        .build()
        .context("building HTTP client")
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "sentry_watch=debug" } else { "sentry_watch=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .init();
}
