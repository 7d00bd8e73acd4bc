//! Error taxonomy. Each variant corresponds to one of the failure kinds in
//! the design's error handling section: probe-level errors stay local to
//! the caller that produced them, deployment-level errors are captured in a
//! `DeployReport` rather than propagated as a `Result`.

use thiserror::Error;

/// Errors from a single hosting-platform probe (`latest_commit`).
#[derive(Debug, Error)]
pub enum HostingError {
    #[error("auth or not-found error from {platform}: {status}")]
    AuthOrNotFound { platform: String, status: u16 },

    #[error("transient failure probing {platform} after {attempts} attempt(s): {source}")]
    Transient {
        platform: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("malformed response from {platform}: {0}", platform = .platform)]
    Malformed {
        platform: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

impl HostingError {
    /// Whether retrying this error would be pointless (spec: 4xx never self-heals).
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, HostingError::AuthOrNotFound { .. })
    }
}

/// Errors from a single deployment step (clone or command execution).
///
/// Display strings lead with the spec's kind name (`clone-failed`,
/// `command-failed`, `unknown-repo`, `timeout`) so a `DeployReport.error`
/// built from one of these is greppable by kind.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("unknown-repo: {0}")]
    UnknownRepo(String),

    #[error("clone-failed: {0}")]
    CloneFailed(String),

    #[error("command-failed at step {step} (`{command}`): {detail}")]
    CommandFailed {
        step: usize,
        command: String,
        detail: String,
    },

    #[error("timeout: {0}")]
    Timeout(&'static str),
}

/// Errors raised while loading or validating `sentry.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("polling_interval must be >= 60 seconds, got {0}")]
    PollingIntervalTooLow(u64),

    #[error("repositories list must not be empty")]
    NoRepositories,

    #[error("duplicate repository name: {0}")]
    DuplicateRepoName(String),

    #[error("repository {repo} references undefined group {group}")]
    UnknownGroup { repo: String, group: String },

    #[error("repository {0}: monitor.branches must not be empty")]
    NoBranches(String),

    #[error("repository {0}: deploy.commands must not be empty")]
    NoCommands(String),

    #[error("repository {repo}: project_name {name:?} is not a valid DNS-1123 label")]
    InvalidProjectName { repo: String, name: String },

    #[error("repository {repo}: auth token must not be empty")]
    EmptyToken { repo: String },
}

/// Top-level error composing the per-component taxonomies above, used at
/// the CLI boundary in `main` so every failure path shares one `Result`
/// type regardless of which component raised it.
#[derive(Debug, Error)]
pub enum SentryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0} probe(s) failed during validation")]
    ValidationFailed(usize),

    #[error("one or more deployments failed")]
    DeploymentFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_error_messages_lead_with_the_spec_kind_name() {
        assert!(DeployError::UnknownRepo("r1".to_string()).to_string().starts_with("unknown-repo"));
        assert!(DeployError::CloneFailed("exit 128".to_string()).to_string().starts_with("clone-failed"));
        assert!(DeployError::Timeout("group deadline elapsed").to_string().starts_with("timeout"));

        let command_failed = DeployError::CommandFailed {
            step: 1,
            command: "exit 1".to_string(),
            detail: "nonzero exit".to_string(),
        };
        assert!(command_failed.to_string().starts_with("command-failed"));
        assert!(command_failed.to_string().contains("step 1"));
    }
}
