//! GitLab commit probe: `GET {host}/api/v4/projects/{url-encoded path}/repository/commits/{branch}`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use super::{bounded_json, status_error, with_retry, HostingClient};
use crate::error::HostingError;
use crate::model::{CommitObservation, RepoIdentity};

pub struct GitlabClient {
    client: reqwest::Client,
}

impl GitlabClient {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn base_and_path(url: &str) -> Result<(String, String), HostingError> {
        let parsed = Url::parse(url).map_err(|source| HostingError::Malformed {
            platform: "gitlab".to_string(),
            source: source.into(),
        })?;
        let base = format!(
            "{}://{}",
            parsed.scheme(),
            parsed.host_str().unwrap_or_default()
        );
        let project_path = parsed.path().trim_start_matches('/').trim_end_matches('/');
        Ok((base, project_path.to_string()))
    }
}

#[async_trait]
impl HostingClient for GitlabClient {
    async fn latest_commit(
        &self,
        identity: &RepoIdentity,
        branch: &str,
    ) -> Result<CommitObservation, HostingError> {
        let (base, project_path) = Self::base_and_path(&identity.url)?;
        let encoded_project = urlencoding::encode(&project_path).into_owned();
        let url = format!("{base}/api/v4/projects/{encoded_project}/repository/commits/{branch}");
        let token = identity.auth.token.clone();

        with_retry("gitlab", || {
            let client = self.client.clone();
            let url = url.clone();
            let token = token.clone();
            async move {
                let response = client
                    .get(&url)
                    .header("Authorization", format!("Bearer {token}"))
                    .send()
                    .await
                    .map_err(|source| HostingError::Transient {
                        platform: "gitlab".to_string(),
                        attempts: 1,
                        source: source.into(),
                    })?;

                if !response.status().is_success() {
                    return Err(status_error("gitlab", response.status()));
                }

                let body: GitlabCommitResponse = bounded_json("gitlab", response).await?;
                Ok(body.into())
            }
        })
        .await
    }
}

#[derive(Debug, Deserialize)]
struct GitlabCommitResponse {
    id: String,
    title: String,
    author_name: String,
    created_at: DateTime<Utc>,
    web_url: String,
}

impl From<GitlabCommitResponse> for CommitObservation {
    fn from(value: GitlabCommitResponse) -> Self {
        CommitObservation {
            fingerprint: value.id,
            message: value.title,
            author: value.author_name,
            timestamp: value.created_at,
            url: value.web_url,
        }
    }
}
