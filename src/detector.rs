//! Change Detector: tracks the last-seen commit fingerprint of every
//! watched (repo, branch) pair and emits an event exactly once per change.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use crate::config::Config;
use crate::hosting::HostingClient;
use crate::model::{CommitFingerprint, RepoChangeEvent};

/// Last-observed commit fingerprint per `(repo name, branch)`, guarded by a
/// reader-writer lock so concurrent branch probes never race each other.
#[derive(Clone, Default)]
pub struct SeenMap {
    inner: Arc<RwLock<HashMap<(String, String), CommitFingerprint>>>,
}

impl SeenMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every configured `(repo, branch)` pair, fanning the hosting
    /// probes out concurrently, and return one [`RepoChangeEvent`] per pair
    /// whose fingerprint changed since the last scan.
    ///
    /// Probe failures are logged and skipped; they never evict an existing
    /// baseline and never produce an event.
    pub async fn scan(&self, config: &Config, client_for: impl Fn(&crate::model::Platform) -> Box<dyn HostingClient>) -> Vec<RepoChangeEvent> {
        let mut tasks = tokio::task::JoinSet::new();

        for repo in &config.repositories {
            for branch in &repo.monitor.branches {
                let seen = self.clone();
                let identity = repo.monitor.repo.clone();
                let branch = branch.clone();
                let repo_name = repo.name.clone();
                let client = client_for(&identity.platform);

                tasks.spawn(async move {
                    match client.latest_commit(&identity, &branch).await {
                        Ok(observation) => seen.record(&repo_name, &branch, observation.fingerprint).await,
                        Err(err) => {
                            warn!(repo = %repo_name, branch, error = %err, "probe failed, baseline preserved");
                            None
                        }
                    }
                });
            }
        }

        let mut events = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            if let Ok(Some(event)) = joined {
                events.push(event);
            }
        }
        events
    }

    /// Apply one probe result to the map per the first-observation /
    /// unchanged / changed rules, returning an event only on a real change.
    async fn record(&self, repo_name: &str, branch: &str, new_fingerprint: CommitFingerprint) -> Option<RepoChangeEvent> {
        let key = (repo_name.to_string(), branch.to_string());

        {
            let read_guard = self.inner.read().await;
            if let Some(existing) = read_guard.get(&key) {
                if *existing == new_fingerprint {
                    return None;
                }
            }
        }

        let mut write_guard = self.inner.write().await;
        let previous = write_guard.insert(key, new_fingerprint.clone());

        match previous {
            None => None,
            Some(old) if old == new_fingerprint => None,
            Some(old) => Some(RepoChangeEvent {
                repo_name: repo_name.to_string(),
                branch: branch.to_string(),
                old_fingerprint: Some(old),
                new_fingerprint,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_observation_installs_baseline_with_no_event() {
        let seen = SeenMap::new();
        let event = seen.record("r1", "main", "sha1".to_string()).await;
        assert!(event.is_none());
    }

    #[tokio::test]
    async fn unchanged_fingerprint_emits_no_event() {
        let seen = SeenMap::new();
        seen.record("r1", "main", "sha1".to_string()).await;
        let event = seen.record("r1", "main", "sha1".to_string()).await;
        assert!(event.is_none());
    }

    #[tokio::test]
    async fn changed_fingerprint_emits_exactly_one_event() {
        let seen = SeenMap::new();
        seen.record("r1", "main", "sha1".to_string()).await;
        let event = seen.record("r1", "main", "sha2".to_string()).await.unwrap();
        assert_eq!(event.old_fingerprint, Some("sha1".to_string()));
        assert_eq!(event.new_fingerprint, "sha2".to_string());

        let second = seen.record("r1", "main", "sha2".to_string()).await;
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn distinct_branches_track_independently() {
        let seen = SeenMap::new();
        seen.record("r1", "main", "sha1".to_string()).await;
        seen.record("r1", "dev", "sha-a".to_string()).await;

        let main_changed = seen.record("r1", "main", "sha2".to_string()).await;
        let dev_unchanged = seen.record("r1", "dev", "sha-a".to_string()).await;
        assert!(main_changed.is_some());
        assert!(dev_unchanged.is_none());
    }
}
