//! Shared fixtures for the end-to-end scenario tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use sentry_watch::config::Config;
use sentry_watch::error::HostingError;
use sentry_watch::hosting::HostingClient;
use sentry_watch::model::{
    Auth, DeploySpec, ExecutionStrategy, GlobalSettings, GroupPolicy, MonitorSpec, Platform,
    RepoIdentity, Repository,
};

/// A hosting client whose response per `(repo, branch)` is a fixed,
/// pre-programmed sequence. Each call advances to the next entry; calls past
/// the end of a sequence repeat its last entry, matching "stub returns X on
/// every call" scenarios without needing a separate no-more-data case.
#[derive(Clone)]
pub struct StubClient {
    inner: Arc<StubInner>,
}

struct StubInner {
    sequences: HashMap<String, Vec<String>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl StubClient {
    #[must_use]
    pub fn new(sequences: HashMap<String, Vec<String>>) -> Self {
        Self {
            inner: Arc::new(StubInner {
                sequences,
                calls: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Convenience constructor: every configured `(repo, branch)` returns
    /// the same fingerprint on every call.
    #[must_use]
    pub fn constant(pairs: &[(&str, &str)], fingerprint: &str) -> Self {
        let sequences = pairs
            .iter()
            .map(|(repo, branch)| (key(repo, branch), vec![fingerprint.to_string()]))
            .collect();
        Self::new(sequences)
    }

    fn boxed(&self) -> Box<dyn HostingClient> {
        Box::new(self.clone())
    }
}

fn key(repo: &str, branch: &str) -> String {
    format!("{repo}:{branch}")
}

#[async_trait]
impl HostingClient for StubClient {
    async fn latest_commit(
        &self,
        identity: &RepoIdentity,
        branch: &str,
    ) -> Result<sentry_watch::model::CommitObservation, HostingError> {
        let k = key(&identity.name, branch);
        let Some(sequence) = self.inner.sequences.get(&k) else {
            return Err(HostingError::Malformed {
                platform: "stub".to_string(),
                source: anyhow::anyhow!("no stubbed sequence for {k}"),
            });
        };

        let mut calls = self.inner.calls.lock().unwrap();
        let index = calls.entry(k).or_insert(0);
        let fingerprint = sequence[(*index).min(sequence.len() - 1)].clone();
        *index += 1;

        Ok(sentry_watch::model::CommitObservation {
            fingerprint: fingerprint.clone(),
            message: format!("commit {fingerprint}"),
            author: "tester".to_string(),
            timestamp: Utc::now(),
            url: format!("https://example.invalid/{fingerprint}"),
        })
    }
}

/// Drive one scan + plan cycle against `stub`, returning the resulting plan.
pub async fn tick(config: &Config, seen: &sentry_watch::detector::SeenMap, stub: &StubClient) -> sentry_watch::model::TriggerPlan {
    let events = seen.scan(config, |_platform| stub.boxed()).await;
    sentry_watch::poller::plan_from_events(config, &events)
}

pub fn repo_identity(name: &str) -> RepoIdentity {
    RepoIdentity {
        name: name.to_string(),
        platform: Platform::Github,
        url: format!("https://github.com/acme/{name}"),
        auth: Auth {
            username: "bot".to_string(),
            token: "token".to_string(),
        },
    }
}

pub fn repository(name: &str, group: Option<&str>, branch: &str) -> Repository {
    let identity = repo_identity(name);
    Repository {
        name: name.to_string(),
        group: group.map(str::to_string),
        monitor: MonitorSpec {
            repo: identity.clone(),
            branches: vec![branch.to_string()],
        },
        deploy: DeploySpec {
            repo: identity,
            branch: "main".to_string(),
            project_name: "demo".to_string(),
            commands: vec!["true".to_string()],
        },
    }
}

pub fn config_with(
    repositories: Vec<Repository>,
    groups: HashMap<String, GroupPolicy>,
) -> Config {
    Config {
        polling_interval: 60,
        groups,
        repositories,
        global: GlobalSettings::default(),
    }
}

#[must_use]
pub fn parallel_policy(max_parallel: usize, continue_on_error: bool, global_timeout: u64) -> GroupPolicy {
    GroupPolicy {
        execution_strategy: ExecutionStrategy::Parallel,
        max_parallel,
        continue_on_error,
        global_timeout,
    }
}

#[must_use]
pub fn sequential_policy(continue_on_error: bool, global_timeout: u64) -> GroupPolicy {
    GroupPolicy {
        execution_strategy: ExecutionStrategy::Sequential,
        max_parallel: 1,
        continue_on_error,
        global_timeout,
    }
}

/// Initializes `dir` as a local git repository on branch `main` with one
/// empty commit, so deploy tests can `git clone` it without any network
/// access.
pub fn init_local_git_repo(dir: &std::path::Path) {
    let run = |args: &[&str]| {
        let status = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .expect("git must be on PATH for this test");
        assert!(status.success(), "git {args:?} failed");
    };
    run(&["init", "-q"]);
    run(&["checkout", "-q", "-B", "main"]);
    run(&[
        "-c",
        "user.email=test@example.invalid",
        "-c",
        "user.name=test",
        "commit",
        "-q",
        "--allow-empty",
        "-m",
        "initial",
    ]);
}
