//! Core data model: repository identity, monitor/deploy specs, group policy,
//! and the records produced by a deployment.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hosting platform a repository lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Github,
    Gitlab,
    Gitea,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Github => write!(f, "github"),
            Platform::Gitlab => write!(f, "gitlab"),
            Platform::Gitea => write!(f, "gitea"),
        }
    }
}

/// Credentials used to authenticate against a hosting platform.
///
/// `Debug` never prints the token; logging this value is always safe.
#[derive(Clone, Serialize, Deserialize)]
pub struct Auth {
    pub username: String,
    pub token: String,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// A uniquely-named repository on a hosting platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoIdentity {
    /// Unique across the whole configuration
    pub name: String,
    /// Which hosting platform `url` lives on
    pub platform: Platform,
    /// Repository URL as configured (used both for API derivation and clone)
    pub url: String,
    /// Credentials for API calls and clone
    pub auth: Auth,
}

/// The branches a repository is watched on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSpec {
    /// The repository being polled
    pub repo: RepoIdentity,
    /// Branch names to poll, exact match only (no regex)
    pub branches: Vec<String>,
}

/// The QA repository and recipe to run when a change is detected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySpec {
    /// The QA repository to clone, distinct from the monitored repository
    pub repo: RepoIdentity,
    /// Branch of the QA repository to clone
    pub branch: String,
    /// DNS-1123 label injected as `SENTRY_PROJECT`
    pub project_name: String,
    /// Shell command strings run in order; at least one
    pub commands: Vec<String>,
}

/// A configured, watched repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    /// Unique across the whole configuration
    pub name: String,
    /// Group this repository belongs to, if any; must resolve to a defined
    /// `GroupPolicy`
    #[serde(default)]
    pub group: Option<String>,
    /// What to poll
    pub monitor: MonitorSpec,
    /// What to run when a change is detected
    pub deploy: DeploySpec,
}

/// Execution strategy for a group of repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    /// Up to `max_parallel` members deployed concurrently
    Parallel,
    /// Members deployed one at a time, in declaration order
    Sequential,
}

/// Policy controlling how a group's members are deployed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupPolicy {
    /// Parallel or sequential
    pub execution_strategy: ExecutionStrategy,
    /// Concurrency cap; ignored under `Sequential`
    pub max_parallel: usize,
    /// Whether a member failure stops further admission of siblings
    pub continue_on_error: bool,
    /// Seconds before the whole group dispatch is abandoned
    pub global_timeout: u64,
}

/// Process-wide settings outside any single repository or group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Workspace root; default `/tmp/sentry`
    pub tmp_dir: String,
    /// Whether to remove a deployment's workspace on exit
    pub cleanup: bool,
    /// Log level for `tracing`
    pub log_level: String,
    /// Seconds before a manual-trigger or tick dispatch is abandoned;
    /// unset means effectively unbounded
    pub timeout: Option<u64>,
    /// Seconds before a single hosting-platform HTTP request gives up
    pub http_timeout: u64,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            tmp_dir: "/tmp/sentry".to_string(),
            cleanup: true,
            log_level: "info".to_string(),
            timeout: None,
            http_timeout: 30,
        }
    }
}

/// Opaque commit identifier returned by a hosting platform.
pub type CommitFingerprint = String;

/// A single commit as reported by a hosting platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitObservation {
    pub fingerprint: CommitFingerprint,
    pub message: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub url: String,
}

impl CommitObservation {
    /// First 8 characters of the fingerprint, safe for terse log lines.
    #[must_use]
    pub fn short_fingerprint(&self) -> String {
        self.fingerprint.chars().take(8).collect()
    }
}

/// A repository that changed on a given branch during one scan.
#[derive(Debug, Clone)]
pub struct RepoChangeEvent {
    pub repo_name: String,
    pub branch: String,
    pub old_fingerprint: Option<CommitFingerprint>,
    pub new_fingerprint: CommitFingerprint,
}

/// A group-scoped deployment decision for one tick.
#[derive(Debug, Clone)]
pub struct GroupTrigger {
    pub group_name: String,
    pub members: Vec<String>,
    pub triggering_repo: String,
    pub triggered_at: DateTime<Utc>,
}

/// The full set of deployments to dispatch for one tick.
#[derive(Debug, Clone, Default)]
pub struct TriggerPlan {
    pub groups: std::collections::HashMap<String, GroupTrigger>,
    pub individuals: std::collections::HashSet<String>,
}

impl TriggerPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.individuals.is_empty()
    }
}

/// A single attempted command, recorded before it runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptedCommand {
    pub step: usize,
    pub command: String,
}

/// The outcome of deploying a single repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployReport {
    pub repo_name: String,
    pub workspace: Option<String>,
    pub commands_run: Vec<AttemptedCommand>,
    pub success: bool,
    pub error: String,
    pub duration: std::time::Duration,
}

impl DeployReport {
    #[must_use]
    pub fn failed(repo_name: &str, error: impl Into<String>, duration: std::time::Duration) -> Self {
        Self {
            repo_name: repo_name.to_string(),
            workspace: None,
            commands_run: Vec::new(),
            success: false,
            error: error.into(),
            duration,
        }
    }
}

/// The outcome of deploying every member of a group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub group_name: String,
    pub strategy: ExecutionStrategy,
    pub members: std::collections::HashMap<String, DeployReport>,
    pub success: bool,
    pub elapsed: std::time::Duration,
    pub error: String,
}
