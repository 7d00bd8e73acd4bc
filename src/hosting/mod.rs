//! Source Hosting Client: fetches the latest commit of a (repo, branch) from
//! a named hosting platform. One implementation per platform; selection by
//! [`Platform`](crate::model::Platform).

mod gitea;
mod github;
mod gitlab;

pub use gitea::GiteaClient;
pub use github::GithubClient;
pub use gitlab::GitlabClient;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::HostingError;
use crate::model::{CommitObservation, Platform, RepoIdentity};

/// Response bodies larger than this are treated as a decode failure rather
/// than silently truncated.
pub const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// A hosting-platform client capable of reporting the latest commit on a
/// branch. Implemented once per platform so callers can hold a
/// `Box<dyn HostingClient>` without caring which platform it talks to.
#[async_trait]
pub trait HostingClient: Send + Sync {
    /// Fetch the single most recent commit of `identity` on `branch`.
    ///
    /// # Errors
    /// Returns [`HostingError::AuthOrNotFound`] for any 4xx response (never
    /// retried), [`HostingError::Transient`] once the retry budget for a
    /// 5xx/transport/decode failure is exhausted, or
    /// [`HostingError::Malformed`] if a 2xx body cannot be decoded.
    async fn latest_commit(
        &self,
        identity: &RepoIdentity,
        branch: &str,
    ) -> Result<CommitObservation, HostingError>;
}

/// Construct the client implementation matching `identity.platform`.
///
/// # Errors
/// Returns [`HostingError::UnsupportedPlatform`] for any platform value that
/// slipped past config validation.
pub fn client_for(
    client: reqwest::Client,
    platform: Platform,
) -> Result<Box<dyn HostingClient>, HostingError> {
    match platform {
        Platform::Github => Ok(Box::new(GithubClient::new(client))),
        Platform::Gitlab => Ok(Box::new(GitlabClient::new(client))),
        Platform::Gitea => Ok(Box::new(GiteaClient::new(client))),
    }
}

/// Shared retry envelope: call `probe` up to [`RETRY_ATTEMPTS`] times,
/// waiting [`RETRY_DELAY`] between attempts, but only when `probe`'s error
/// is retryable (anything other than [`HostingError::AuthOrNotFound`]).
pub(crate) async fn with_retry<F, Fut>(platform: &str, mut probe: F) -> Result<CommitObservation, HostingError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<CommitObservation, HostingError>>,
{
    let mut last_err = None;
    for attempt in 1..=RETRY_ATTEMPTS {
        match probe().await {
            Ok(observation) => return Ok(observation),
            Err(err) if err.is_permanent() => {
                debug!(platform, attempt, "non-retryable hosting error");
                return Err(err);
            }
            Err(err) => {
                warn!(platform, attempt, error = %err, "retryable hosting error");
                last_err = Some(err);
                if attempt < RETRY_ATTEMPTS {
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }
    // unwrap: the loop only exits via `return` or after setting last_err on
    // every non-final iteration including the last
    Err(last_err.unwrap())
}

/// Read a response body, failing rather than truncating if it exceeds
/// [`MAX_RESPONSE_BYTES`].
///
/// The cap is enforced while streaming chunks off the wire, not after
/// buffering the whole body: a server lying about (or omitting)
/// `Content-Length` cannot force a full in-memory download before this
/// rejects it.
pub(crate) async fn bounded_json<T: serde::de::DeserializeOwned>(
    platform: &str,
    response: reqwest::Response,
) -> Result<T, HostingError> {
    use futures::StreamExt;

    let mut stream = response.bytes_stream();
    let mut buf = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| HostingError::Transient {
            platform: platform.to_string(),
            attempts: 1,
            source: source.into(),
        })?;

        buf.extend_from_slice(&chunk);
        if buf.len() as u64 > MAX_RESPONSE_BYTES {
            return Err(HostingError::Malformed {
                platform: platform.to_string(),
                source: anyhow::anyhow!(
                    "response body exceeds {MAX_RESPONSE_BYTES} byte cap"
                ),
            });
        }
    }

    serde_json::from_slice(&buf).map_err(|source| HostingError::Malformed {
        platform: platform.to_string(),
        source: source.into(),
    })
}

/// Classify a non-2xx HTTP status into the hosting error taxonomy.
pub(crate) fn status_error(platform: &str, status: reqwest::StatusCode) -> HostingError {
    if status.is_client_error() {
        HostingError::AuthOrNotFound {
            platform: platform.to_string(),
            status: status.as_u16(),
        }
    } else {
        HostingError::Transient {
            platform: platform.to_string(),
            attempts: 1,
            source: anyhow::anyhow!("server returned {status}"),
        }
    }
}
