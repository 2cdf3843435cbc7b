//! GitLab API v4 connector

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Project, SourceHost, check_status, send_idempotent};
use crate::GitLabConfig;
use crate::error::{RelayError, Result};

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

#[derive(Debug, Deserialize)]
struct UserDto {
    email: Option<String>,
    public_email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HookDto {
    url: String,
}

#[derive(Debug, Serialize)]
struct NewHookDto<'a> {
    url: &'a str,
    push_events: bool,
}

pub struct GitLabClient {
    client: Client,
    raw_client: Client,
    server: String,
    token: String,
    retries: u32,
}

impl GitLabClient {
    /// `raw_client` fetches repository files and should not follow redirects,
    /// see `build_raw_client`.
    pub fn new(client: Client, raw_client: Client, config: &GitLabConfig, retries: u32) -> Self {
        Self {
            client,
            raw_client,
            server: config.server.trim_end_matches('/').to_string(),
            token: config.private_token.clone(),
            retries,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v4/{}", self.server, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);
        let response = send_idempotent(
            || self.client.get(url).header(TOKEN_HEADER, &self.token),
            self.retries,
        )
        .await?;
        let response = check_status(url, response)?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl SourceHost for GitLabClient {
    async fn verify_token(&self) -> Result<()> {
        let url = self.api_url("user");
        let response = send_idempotent(
            || self.client.get(&url).header(TOKEN_HEADER, &self.token),
            self.retries,
        )
        .await?;
        check_status(&url, response)?;
        Ok(())
    }

    async fn user_email(&self, user_id: u64) -> Result<String> {
        let url = self.api_url(&format!("users/{}", user_id));
        let user: UserDto = self.get_json(&url).await?;
        user.email
            .filter(|e| !e.is_empty())
            .or(user.public_email.filter(|e| !e.is_empty()))
            .ok_or_else(|| RelayError::NotFound(format!("email of user {}", user_id)))
    }

    async fn fetch_raw(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        let response = send_idempotent(|| self.raw_client.get(url), self.retries).await?;
        if response.status().is_redirection() {
            debug!("{} redirected, treating as missing", url);
            return Err(RelayError::NotFound(url.to_string()));
        }
        let response = check_status(url, response)?;
        Ok(response.text().await?)
    }

    async fn project(&self, project_id: u64) -> Result<Project> {
        let url = self.api_url(&format!("projects/{}", project_id));
        self.get_json(&url).await
    }

    async fn list_projects(&self, page: u32, per_page: u32) -> Result<Vec<Project>> {
        let url = self.api_url(&format!("projects?page={}&per_page={}", page, per_page));
        self.get_json(&url).await
    }

    async fn project_hook_urls(&self, project_id: u64) -> Result<Vec<String>> {
        let url = self.api_url(&format!("projects/{}/hooks", project_id));
        let hooks: Vec<HookDto> = self.get_json(&url).await?;
        Ok(hooks.into_iter().map(|h| h.url).collect())
    }

    async fn add_project_hook(&self, project_id: u64, hook_url: &str) -> Result<()> {
        let url = self.api_url(&format!("projects/{}/hooks", project_id));
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .header(TOKEN_HEADER, &self.token)
            .json(&NewHookDto {
                url: hook_url,
                push_events: true,
            })
            .send()
            .await?;
        check_status(&url, response)?;
        Ok(())
    }
}
