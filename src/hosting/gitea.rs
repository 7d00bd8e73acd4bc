//! Gitea commit probe: `GET {host}/api/v1/repos/{owner}/{repo}/commits/{branch}`.
//!
//! Response shape mirrors GitHub's (spec §4.A), so the payload type and
//! conversion are shared with [`super::github`] field-for-field.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use super::{bounded_json, status_error, with_retry, HostingClient};
use crate::error::HostingError;
use crate::model::{CommitObservation, RepoIdentity};

pub struct GiteaClient {
    client: reqwest::Client,
}

impl GiteaClient {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn host_owner_repo(url: &str) -> Result<(String, String, String), HostingError> {
        let parsed = Url::parse(url).map_err(|source| HostingError::Malformed {
            platform: "gitea".to_string(),
            source: source.into(),
        })?;
        let host = format!(
            "{}://{}",
            parsed.scheme(),
            parsed.host_str().unwrap_or_default()
        );
        let mut segments = parsed
            .path_segments()
            .map(|s| s.collect::<Vec<_>>())
            .unwrap_or_default();
        let repo = segments
            .pop()
            .map(|s| s.trim_end_matches(".git").to_string())
            .ok_or_else(|| HostingError::Malformed {
                platform: "gitea".to_string(),
                source: anyhow::anyhow!("url {url} has no repo path segment"),
            })?;
        let owner = segments.pop().ok_or_else(|| HostingError::Malformed {
            platform: "gitea".to_string(),
            source: anyhow::anyhow!("url {url} has no owner path segment"),
        })?;
        Ok((host, owner.to_string(), repo))
    }
}

#[async_trait]
impl HostingClient for GiteaClient {
    async fn latest_commit(
        &self,
        identity: &RepoIdentity,
        branch: &str,
    ) -> Result<CommitObservation, HostingError> {
        let (host, owner, repo) = Self::host_owner_repo(&identity.url)?;
        let url = format!("{host}/api/v1/repos/{owner}/{repo}/commits/{branch}");
        let token = identity.auth.token.clone();

        with_retry("gitea", || {
            let client = self.client.clone();
            let url = url.clone();
            let token = token.clone();
            async move {
                let response = client
                    .get(&url)
                    .header("Authorization", format!("token {token}"))
                    .send()
                    .await
                    .map_err(|source| HostingError::Transient {
                        platform: "gitea".to_string(),
                        attempts: 1,
                        source: source.into(),
                    })?;

                if !response.status().is_success() {
                    return Err(status_error("gitea", response.status()));
                }

                let body: GiteaCommitResponse = bounded_json("gitea", response).await?;
                Ok(body.into())
            }
        })
        .await
    }
}

#[derive(Debug, Deserialize)]
struct GiteaCommitResponse {
    sha: String,
    commit: GiteaCommitDetail,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct GiteaCommitDetail {
    message: String,
    author: GiteaCommitAuthor,
}

#[derive(Debug, Deserialize)]
struct GiteaCommitAuthor {
    name: String,
    date: DateTime<Utc>,
}

impl From<GiteaCommitResponse> for CommitObservation {
    fn from(value: GiteaCommitResponse) -> Self {
        CommitObservation {
            fingerprint: value.sha,
            message: value.commit.message,
            author: value.commit.author.name,
            timestamp: value.commit.author.date,
            url: value.html_url,
        }
    }
}
