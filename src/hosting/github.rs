//! GitHub commit probe: `GET /repos/{owner}/{repo}/commits/{branch}`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{bounded_json, status_error, with_retry, HostingClient};
use crate::error::HostingError;
use crate::model::{CommitObservation, RepoIdentity};

pub struct GithubClient {
    client: reqwest::Client,
}

impl GithubClient {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn owner_repo(url: &str) -> Result<(String, String), HostingError> {
        owner_repo_from_url(url).ok_or_else(|| HostingError::Malformed {
            platform: "github".to_string(),
            source: anyhow::anyhow!("could not parse owner/repo from url {url}"),
        })
    }
}

#[async_trait]
impl HostingClient for GithubClient {
    async fn latest_commit(
        &self,
        identity: &RepoIdentity,
        branch: &str,
    ) -> Result<CommitObservation, HostingError> {
        let (owner, repo) = Self::owner_repo(&identity.url)?;
        let url = format!("https://api.github.com/repos/{owner}/{repo}/commits/{branch}");
        let token = identity.auth.token.clone();

        with_retry("github", || {
            let client = self.client.clone();
            let url = url.clone();
            let token = token.clone();
            async move {
                let response = client
                    .get(&url)
                    .header("Authorization", format!("token {token}"))
                    .header("Accept", "application/vnd.github.v3+json")
                    .header("User-Agent", "sentry-watch")
                    .send()
                    .await
                    .map_err(|source| HostingError::Transient {
                        platform: "github".to_string(),
                        attempts: 1,
                        source: source.into(),
                    })?;

                if !response.status().is_success() {
                    return Err(status_error("github", response.status()));
                }

                let body: GithubCommitResponse = bounded_json("github", response).await?;
                body.try_into()
            }
        })
        .await
    }
}

/// Extract `(owner, repo)` from a GitHub repository URL.
fn owner_repo_from_url(url: &str) -> Option<(String, String)> {
    let trimmed = url.trim_end_matches('/').trim_end_matches(".git");
    let path = trimmed
        .rsplit_once("github.com")
        .map(|(_, rest)| rest.trim_start_matches(['/', ':']))?;
    let mut parts = path.rsplitn(2, '/');
    let repo = parts.next()?;
    let owner = parts.next()?;
    Some((owner.to_string(), repo.to_string()))
}

#[derive(Debug, Deserialize)]
struct GithubCommitResponse {
    sha: String,
    commit: GithubCommitDetail,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct GithubCommitDetail {
    message: String,
    author: GithubCommitAuthor,
}

#[derive(Debug, Deserialize)]
struct GithubCommitAuthor {
    name: String,
    date: DateTime<Utc>,
}

impl TryFrom<GithubCommitResponse> for CommitObservation {
    type Error = HostingError;

    fn try_from(value: GithubCommitResponse) -> Result<Self, Self::Error> {
        Ok(CommitObservation {
            fingerprint: value.sha,
            message: value.commit.message,
            author: value.commit.author.name,
            timestamp: value.commit.author.date,
            url: value.html_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_repo_from_https_url() {
        assert_eq!(
            owner_repo_from_url("https://github.com/acme/widgets"),
            Some(("acme".to_string(), "widgets".to_string()))
        );
        assert_eq!(
            owner_repo_from_url("https://github.com/acme/widgets.git"),
            Some(("acme".to_string(), "widgets".to_string()))
        );
    }
}
