//! Outbound connectors to GitLab and Jenkins
//!
//! The relay only talks to the two services through the `SourceHost` and
//! `JobServer` traits; the reqwest-backed clients live in the submodules.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode, redirect};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::HttpConfig;
use crate::error::{RelayError, Result};

pub mod gitlab;
pub mod jenkins;

pub use gitlab::GitLabClient;
pub use jenkins::JenkinsClient;

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
}

/// Operations the relay consumes from the source-control host.
#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Check that the configured token is accepted.
    async fn verify_token(&self) -> Result<()>;

    /// Email address of a user, looked up by id.
    async fn user_email(&self, user_id: u64) -> Result<String>;

    /// Body of a raw file url. A missing file is `RelayError::NotFound`.
    async fn fetch_raw(&self, url: &str) -> Result<String>;

    async fn project(&self, project_id: u64) -> Result<Project>;

    /// One page of projects; an empty page means there are no more.
    async fn list_projects(&self, page: u32, per_page: u32) -> Result<Vec<Project>>;

    async fn project_hook_urls(&self, project_id: u64) -> Result<Vec<String>>;

    async fn add_project_hook(&self, project_id: u64, url: &str) -> Result<()>;
}

/// Operations the relay consumes from the CI server.
#[async_trait]
pub trait JobServer: Send + Sync {
    /// Stored configuration of a job, `None` when the job does not exist.
    async fn job_config(&self, job_name: &str) -> Result<Option<String>>;

    async fn create_job(&self, job_name: &str, config: &str) -> Result<()>;

    async fn update_job(&self, job_name: &str, config: &str) -> Result<()>;

    /// Delete a job. Deleting a job that does not exist succeeds.
    async fn delete_job(&self, job_name: &str) -> Result<()>;

    async fn trigger_build(&self, job_name: &str) -> Result<()>;
}

fn client_builder(http: &HttpConfig) -> ClientBuilder {
    Client::builder()
        .timeout(http.get_timeout())
        .user_agent(concat!("gitlab-jenkins-relay/", env!("CARGO_PKG_VERSION")))
}

/// Build the shared reqwest client with the configured per-call timeout.
pub fn build_http_client(http: &HttpConfig) -> Result<Client> {
    Ok(client_builder(http).build()?)
}

/// Client for raw repository files. Redirects are not followed: GitLab sends
/// requests for files it will not serve to the sign-in page.
pub fn build_raw_client(http: &HttpConfig) -> Result<Client> {
    Ok(client_builder(http).redirect(redirect::Policy::none()).build()?)
}

/// Send an idempotent request, retrying transport failures up to `retries` times.
///
/// Only timeouts and connection errors are retried. HTTP error statuses are
/// returned to the caller untouched.
pub(crate) async fn send_idempotent<F>(build: F, retries: u32) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        match build().send().await {
            Ok(response) => return Ok(response),
            Err(e) if attempt < retries && (e.is_timeout() || e.is_connect()) => {
                attempt += 1;
                warn!("Retrying request (attempt {}/{}): {}", attempt, retries, e);
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Map a non-success status to `RelayError`, 404 becoming `NotFound`.
pub(crate) fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(status_error(url, status))
}

pub(crate) fn status_error(url: &str, status: StatusCode) -> RelayError {
    match status {
        StatusCode::NOT_FOUND => RelayError::NotFound(url.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RelayError::AuthenticationFailed(url.to_string())
        }
        _ => RelayError::UpstreamStatus {
            url: url.to_string(),
            status: status.as_u16(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JenkinsConfig;
    use rstest::rstest;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const OK_RESPONSE: &[u8] =
        b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok";

    /// Plain TCP server that never answers the first `silent` connections and
    /// answers `200 ok` on the rest. Returns its base url and a connection count.
    async fn counting_server(silent: usize) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                if counter.fetch_add(1, Ordering::SeqCst) < silent {
                    held.push(stream);
                    continue;
                }
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = stream.read(&mut buf).await;
                    let _ = stream.write_all(OK_RESPONSE).await;
                });
            }
        });
        (base, connections)
    }

    fn short_timeout() -> HttpConfig {
        HttpConfig {
            timeout_secs: Some(1),
            retries: None,
        }
    }

    #[tokio::test]
    async fn connect_errors_are_retried_then_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);
        let client = build_http_client(&HttpConfig::default()).unwrap();
        let attempts = AtomicU32::new(0);

        let err = send_idempotent(
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                client.get(&url)
            },
            2,
        )
        .await
        .unwrap_err();

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(matches!(err, RelayError::Transport(_)));
    }

    #[tokio::test]
    async fn timed_out_get_is_retried_with_configured_timeout() {
        let (base, connections) = counting_server(1).await;
        let client = build_http_client(&short_timeout()).unwrap();
        let url = format!("{}/api/v4/user", base);
        let started = Instant::now();

        let response = send_idempotent(|| client.get(&url), 1).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "ok");
        assert_eq!(connections.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn error_status_is_not_retried() {
        let app = axum::Router::new().route(
            "/flaky",
            axum::routing::get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base = crate::test_utils::spawn_server(app).await;
        let client = Client::new();
        let url = format!("{}/flaky", base);
        let attempts = AtomicU32::new(0);

        let response = send_idempotent(
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                client.get(&url)
            },
            3,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timed_out_post_is_sent_once() {
        let (base, connections) = counting_server(usize::MAX).await;
        let client = build_http_client(&short_timeout()).unwrap();
        let jenkins = JenkinsClient::new(client, &JenkinsConfig { server: base }, 3).unwrap();

        let err = jenkins.create_job("teamA-svc", "<project/>").await.unwrap_err();

        assert!(matches!(err, RelayError::Transport(ref e) if e.is_timeout()));
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[case(StatusCode::NOT_FOUND, "not_found")]
    #[case(StatusCode::UNAUTHORIZED, "auth")]
    #[case(StatusCode::FORBIDDEN, "auth")]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, "upstream")]
    #[case(StatusCode::BAD_REQUEST, "upstream")]
    fn maps_statuses(#[case] status: StatusCode, #[case] expected: &str) {
        let err = status_error("http://x/y", status);
        match expected {
            "not_found" => assert!(err.is_not_found()),
            "auth" => assert!(matches!(err, RelayError::AuthenticationFailed(_))),
            "upstream" => assert!(matches!(
                err,
                RelayError::UpstreamStatus { status: code, .. } if code == status.as_u16()
            )),
            _ => panic!("unsupported expectation: {expected}"),
        }
    }
}
