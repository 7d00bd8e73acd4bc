//! Configuration loading: read `sentry.yaml`, expand environment variables
//! in the raw text, parse, then validate into the in-memory [`Config`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{
    Auth, DeploySpec, ExecutionStrategy, GlobalSettings, GroupPolicy, MonitorSpec, Platform,
    RepoIdentity, Repository,
};

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap());

static DNS_1123_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([a-z0-9\-]*[a-z0-9])?$").unwrap());

/// Replace `${NAME}` and `$NAME` with the current environment value of
/// `NAME`, or the empty string when unset. Runs on the raw file text before
/// it is handed to the YAML parser.
#[must_use]
pub fn expand_env(raw: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            let name = caps.get(1).or_else(|| caps.get(2)).unwrap().as_str();
            std::env::var(name).unwrap_or_default()
        })
        .into_owned()
}

/// The YAML document as it appears on disk, before validation.
#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct RawConfig {
    pub polling_interval: u64,
    #[serde(default)]
    pub groups: HashMap<String, RawGroupPolicy>,
    pub repositories: Vec<RawRepository>,
    #[serde(default)]
    pub global: RawGlobalSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawGroupPolicy {
    pub execution_strategy: ExecutionStrategy,
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    #[serde(default)]
    pub continue_on_error: bool,
    pub global_timeout: u64,
}

fn default_max_parallel() -> usize {
    1
}

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct RawRepository {
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    pub monitor: RawMonitorSpec,
    pub deploy: RawDeploySpec,
}

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct RawMonitorSpec {
    pub platform: Platform,
    pub url: String,
    pub username: String,
    pub token: String,
    pub branches: Vec<String>,
}

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct RawDeploySpec {
    pub platform: Platform,
    pub url: String,
    pub username: String,
    pub token: String,
    pub branch: String,
    pub project_name: String,
    pub commands: Vec<String>,
}

#[derive(Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RawGlobalSettings {
    pub tmp_dir: Option<String>,
    pub cleanup: Option<bool>,
    pub log_level: Option<String>,
    pub timeout: Option<u64>,
    pub http_timeout: Option<u64>,
}

/// Validated, ready-to-use configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub polling_interval: u64,
    pub groups: HashMap<String, GroupPolicy>,
    pub repositories: Vec<Repository>,
    pub global: GlobalSettings,
}

impl Config {
    /// Load, env-expand, parse, and validate a config file from disk.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read, the YAML is
    /// invalid, or validation fails.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw_text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let expanded = expand_env(&raw_text);
        let raw: RawConfig = serde_yaml::from_str(&expanded)?;
        Self::from_raw(raw)
    }

    /// Validate a parsed [`RawConfig`] into a [`Config`].
    ///
    /// # Errors
    /// Returns a [`ConfigError`] describing the first validation failure.
    pub fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        if raw.polling_interval < 60 {
            return Err(ConfigError::PollingIntervalTooLow(raw.polling_interval));
        }
        if raw.repositories.is_empty() {
            return Err(ConfigError::NoRepositories);
        }

        let groups: HashMap<String, GroupPolicy> = raw
            .groups
            .into_iter()
            .map(|(name, g)| {
                (
                    name,
                    GroupPolicy {
                        execution_strategy: g.execution_strategy,
                        max_parallel: g.max_parallel.max(1),
                        continue_on_error: g.continue_on_error,
                        global_timeout: g.global_timeout,
                    },
                )
            })
            .collect();

        let mut seen_names = std::collections::HashSet::new();
        let mut repositories = Vec::with_capacity(raw.repositories.len());

        for repo in raw.repositories {
            if !seen_names.insert(repo.name.clone()) {
                return Err(ConfigError::DuplicateRepoName(repo.name));
            }
            if let Some(group) = &repo.group {
                if !groups.contains_key(group) {
                    return Err(ConfigError::UnknownGroup {
                        repo: repo.name,
                        group: group.clone(),
                    });
                }
            }
            if repo.monitor.branches.is_empty() {
                return Err(ConfigError::NoBranches(repo.name));
            }
            if repo.deploy.commands.is_empty() {
                return Err(ConfigError::NoCommands(repo.name));
            }
            if !DNS_1123_LABEL.is_match(&repo.deploy.project_name) || repo.deploy.project_name.len() > 253 {
                return Err(ConfigError::InvalidProjectName {
                    repo: repo.name,
                    name: repo.deploy.project_name,
                });
            }
            if repo.monitor.token.is_empty() {
                return Err(ConfigError::EmptyToken { repo: repo.name });
            }
            if repo.deploy.token.is_empty() {
                return Err(ConfigError::EmptyToken { repo: repo.name });
            }

            repositories.push(Repository {
                name: repo.name,
                group: repo.group,
                monitor: MonitorSpec {
                    repo: RepoIdentity {
                        name: String::new(),
                        platform: repo.monitor.platform,
                        url: repo.monitor.url,
                        auth: Auth {
                            username: repo.monitor.username,
                            token: repo.monitor.token,
                        },
                    },
                    branches: repo.monitor.branches,
                },
                deploy: DeploySpec {
                    repo: RepoIdentity {
                        name: String::new(),
                        platform: repo.deploy.platform,
                        url: repo.deploy.url,
                        auth: Auth {
                            username: repo.deploy.username,
                            token: repo.deploy.token,
                        },
                    },
                    branch: repo.deploy.branch,
                    project_name: repo.deploy.project_name,
                    commands: repo.deploy.commands,
                },
            });
        }

        // fill in the owning repo's name on each identity, now that it's final
        let mut repositories = repositories;
        for repo in &mut repositories {
            repo.monitor.repo.name = repo.name.clone();
            repo.deploy.repo.name = repo.name.clone();
        }

        Ok(Config {
            polling_interval: raw.polling_interval,
            groups,
            repositories,
            global: GlobalSettings {
                tmp_dir: raw.global.tmp_dir.unwrap_or_else(|| "/tmp/sentry".to_string()),
                cleanup: raw.global.cleanup.unwrap_or(true),
                log_level: raw.global.log_level.unwrap_or_else(|| "info".to_string()),
                timeout: raw.global.timeout,
                http_timeout: raw.global.http_timeout.unwrap_or(30),
            },
        })
    }

    /// Members of `group_name` in declaration order.
    #[must_use]
    pub fn group_members(&self, group_name: &str) -> Vec<String> {
        self.repositories
            .iter()
            .filter(|r| r.group.as_deref() == Some(group_name))
            .map(|r| r.name.clone())
            .collect()
    }

    #[must_use]
    pub fn repository(&self, name: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.name == name)
    }
}
