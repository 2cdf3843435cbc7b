pub mod api;
pub mod clients;
pub mod error;
pub mod job;
pub mod logging;
pub mod pipeline;
pub mod reconcile;
pub mod registrar;
pub mod render;
pub mod routing;
pub mod template;
pub mod webhook;

#[cfg(test)]
pub(crate) mod test_utils;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clients::{JobServer, SourceHost};
use crate::error::RelayError;
use crate::routing::FallbackPolicy;

const DEFAULT_TRIGGER_FILE: &str = "jenkins.xml";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_HTTP_RETRIES: u32 = 2;
const DEFAULT_PROJECT_PAGE_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    pub gitlab: GitLabConfig,
    pub jenkins: JenkinsConfig,
    pub relay: RelayServerConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub triggers: TriggerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitLabConfig {
    pub server: String,
    pub private_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JenkinsConfig {
    pub server: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayServerConfig {
    /// Externally reachable address of this service, without the port.
    pub server_url: String,
    pub server_port: u16,
    pub bind_address: Option<String>,
    pub register_existing_projects: Option<bool>,
    pub project_page_limit: Option<u32>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RoutingConfig {
    #[serde(default)]
    pub fallback: FallbackPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TriggerConfig {
    /// Candidate template filenames, tried in order.
    pub files: Vec<String>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            files: vec![DEFAULT_TRIGGER_FILE.to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HttpConfig {
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
}

impl HttpConfig {
    pub fn get_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS))
    }

    pub fn get_retries(&self) -> u32 {
        self.retries.unwrap_or(DEFAULT_HTTP_RETRIES)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    pub directory: Option<String>,
    pub max_files: Option<usize>,
    pub rotation: Option<String>,
}

impl RelayServerConfig {
    /// Returns true if webhooks should be ensured on every existing project at startup.
    pub fn should_register_existing_projects(&self) -> bool {
        self.register_existing_projects.unwrap_or(false)
    }

    pub fn get_project_page_limit(&self) -> u32 {
        self.project_page_limit.unwrap_or(DEFAULT_PROJECT_PAGE_LIMIT)
    }
}

impl RelayConfig {
    /// URL of this service's push endpoint, as registered on projects.
    pub fn webhook_url(&self) -> String {
        format!("{}:{}/webhook", self.relay.server_url, self.relay.server_port)
    }

    /// Strips trailing slashes from server addresses and checks required settings.
    pub fn normalize(mut self) -> Result<Self, RelayError> {
        self.gitlab.server = self.gitlab.server.trim_end_matches('/').to_string();
        self.jenkins.server = self.jenkins.server.trim_end_matches('/').to_string();
        self.relay.server_url = self.relay.server_url.trim_end_matches('/').to_string();

        let mut missing = Vec::new();
        if self.gitlab.server.is_empty() {
            missing.push("gitlab.server");
        }
        if self.gitlab.private_token.is_empty() {
            missing.push("gitlab.private_token");
        }
        if self.jenkins.server.is_empty() {
            missing.push("jenkins.server");
        }
        if self.relay.server_url.is_empty() {
            missing.push("relay.server_url");
        }
        if self.relay.server_port == 0 {
            missing.push("relay.server_port");
        }
        if !missing.is_empty() {
            return Err(RelayError::ConfigError(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        if self.triggers.files.is_empty() {
            return Err(RelayError::ConfigError(
                "triggers.files must name at least one template file".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Parse configuration from TOML text and validate it
pub fn parse_config(text: &str) -> Result<RelayConfig, RelayError> {
    let config: RelayConfig = toml::from_str(text)?;
    config.normalize()
}

/// Load, parse and validate the configuration file
pub fn load_config(path: impl AsRef<Path>) -> Result<RelayConfig, RelayError> {
    let path = path.as_ref();
    let config_str = std::fs::read_to_string(path).map_err(|e| {
        RelayError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&config_str).map_err(|e| match e {
        RelayError::ConfigError(msg) => {
            RelayError::ConfigError(format!("{} ({})", msg, path.display()))
        }
        other => RelayError::ConfigError(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            other
        )),
    })
}

pub struct AppState {
    pub config: RelayConfig,
    pub source_host: Arc<dyn SourceHost>,
    pub job_server: Arc<dyn JobServer>,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: RelayConfig,
        source_host: Arc<dyn SourceHost>,
        job_server: Arc<dyn JobServer>,
    ) -> Self {
        Self {
            config,
            source_host,
            job_server,
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;
