//! Jenkins remote API connector

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url, header::CONTENT_TYPE};
use tracing::{debug, info};

use super::{JobServer, check_status, send_idempotent, status_error};
use crate::JenkinsConfig;
use crate::error::{RelayError, Result};

const XML_CONTENT_TYPE: &str = "text/xml";

pub struct JenkinsClient {
    client: Client,
    server: Url,
    retries: u32,
}

impl JenkinsClient {
    pub fn new(client: Client, config: &JenkinsConfig, retries: u32) -> Result<Self> {
        let server = Url::parse(config.server.trim_end_matches('/'))?;
        if server.cannot_be_a_base() {
            return Err(RelayError::ConfigError(format!(
                "jenkins server '{}' is not a base url",
                config.server
            )));
        }
        Ok(Self {
            client,
            server,
            retries,
        })
    }

    /// `{server}/job/{name}/{action}` with the job name escaped as one path segment.
    fn job_url(&self, job_name: &str, action: &str) -> Url {
        let mut url = self.server.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["job", job_name, action]);
        }
        url
    }

    fn create_url(&self, job_name: &str) -> Url {
        let mut url = self.server.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("createItem");
        }
        url.query_pairs_mut().append_pair("name", job_name);
        url
    }

    async fn post(&self, url: Url, body: String) -> Result<reqwest::Response> {
        debug!("Posting to {}", url);
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;
        debug!("Post to {} completed with {}", url, response.status());
        Ok(response)
    }
}

#[async_trait]
impl JobServer for JenkinsClient {
    async fn job_config(&self, job_name: &str) -> Result<Option<String>> {
        let url = self.job_url(job_name, "config.xml");
        let response = send_idempotent(|| self.client.get(url.clone()), self.retries).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(url.as_str(), response)?;
        Ok(Some(response.text().await?))
    }

    async fn create_job(&self, job_name: &str, config: &str) -> Result<()> {
        let url = self.create_url(job_name);
        let response = self.post(url.clone(), config.to_string()).await?;
        check_status(url.as_str(), response)?;
        Ok(())
    }

    async fn update_job(&self, job_name: &str, config: &str) -> Result<()> {
        let url = self.job_url(job_name, "config.xml");
        let response = self.post(url.clone(), config.to_string()).await?;
        check_status(url.as_str(), response)?;
        Ok(())
    }

    async fn delete_job(&self, job_name: &str) -> Result<()> {
        let url = self.job_url(job_name, "doDelete");
        info!("Deleting job {}", job_name);
        let response = self.post(url.clone(), String::new()).await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("Job {} did not exist, nothing to delete", job_name);
                Ok(())
            }
            // doDelete answers with a redirect to the parent view
            status if status.is_success() || status.is_redirection() => Ok(()),
            status => Err(status_error(url.as_str(), status)),
        }
    }

    async fn trigger_build(&self, job_name: &str) -> Result<()> {
        let url = self.job_url(job_name, "build");
        let response = self.post(url.clone(), String::new()).await?;
        check_status(url.as_str(), response)?;
        Ok(())
    }
}
