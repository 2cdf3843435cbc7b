//! In-memory stand-ins for GitLab and Jenkins used across the unit tests.

use async_trait::async_trait;
use axum::Router;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::clients::{JobServer, Project, SourceHost};
use crate::error::{RelayError, Result};
use crate::{AppState, RelayConfig, SharedState, parse_config};

pub const TEST_CONFIG: &str = r#"
    [gitlab]
    server = "http://gitlab.test"
    private_token = "token"

    [jenkins]
    server = "http://jenkins.test"

    [relay]
    server_url = "http://relay.test"
    server_port = 8888
"#;

pub fn test_config() -> RelayConfig {
    parse_config(TEST_CONFIG).unwrap()
}

/// Serve `app` on an ephemeral local port and return its base url.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    UserEmail(u64),
    FetchRaw(String),
    Project(u64),
    ListProjects(u32),
    HookUrls(u64),
    AddHook(u64, String),
}

#[derive(Default)]
pub struct FakeSourceHost {
    pub emails: HashMap<u64, String>,
    /// Raw url -> body; a url mapped to `Err(status)` answers with that status.
    pub files: HashMap<String, std::result::Result<String, u16>>,
    pub projects: Vec<Project>,
    pub hooks: Mutex<HashMap<u64, Vec<String>>>,
    pub calls: Mutex<Vec<HostCall>>,
}

impl FakeSourceHost {
    pub fn with_email(mut self, user_id: u64, email: &str) -> Self {
        self.emails.insert(user_id, email.to_string());
        self
    }

    pub fn with_file(mut self, url: &str, body: &str) -> Self {
        self.files.insert(url.to_string(), Ok(body.to_string()));
        self
    }

    pub fn with_failing_file(mut self, url: &str, status: u16) -> Self {
        self.files.insert(url.to_string(), Err(status));
        self
    }

    pub fn with_project(mut self, id: u64, name: &str) -> Self {
        self.projects.push(Project {
            id,
            name: name.to_string(),
        });
        self
    }

    pub fn with_hooks(self, project_id: u64, urls: &[&str]) -> Self {
        self.hooks
            .lock()
            .unwrap()
            .insert(project_id, urls.iter().map(|u| u.to_string()).collect());
        self
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn hooks_of(&self, project_id: u64) -> Vec<String> {
        self.hooks
            .lock()
            .unwrap()
            .get(&project_id)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SourceHost for FakeSourceHost {
    async fn verify_token(&self) -> Result<()> {
        Ok(())
    }

    async fn user_email(&self, user_id: u64) -> Result<String> {
        self.record(HostCall::UserEmail(user_id));
        self.emails
            .get(&user_id)
            .cloned()
            .ok_or_else(|| RelayError::NotFound(format!("user {}", user_id)))
    }

    async fn fetch_raw(&self, url: &str) -> Result<String> {
        self.record(HostCall::FetchRaw(url.to_string()));
        match self.files.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(RelayError::UpstreamStatus {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(RelayError::NotFound(url.to_string())),
        }
    }

    async fn project(&self, project_id: u64) -> Result<Project> {
        self.record(HostCall::Project(project_id));
        self.projects
            .iter()
            .find(|p| p.id == project_id)
            .cloned()
            .ok_or_else(|| RelayError::NotFound(format!("project {}", project_id)))
    }

    async fn list_projects(&self, page: u32, per_page: u32) -> Result<Vec<Project>> {
        self.record(HostCall::ListProjects(page));
        let start = (page.saturating_sub(1) * per_page) as usize;
        Ok(self
            .projects
            .iter()
            .skip(start)
            .take(per_page as usize)
            .cloned()
            .collect())
    }

    async fn project_hook_urls(&self, project_id: u64) -> Result<Vec<String>> {
        self.record(HostCall::HookUrls(project_id));
        Ok(self.hooks_of(project_id))
    }

    async fn add_project_hook(&self, project_id: u64, url: &str) -> Result<()> {
        self.record(HostCall::AddHook(project_id, url.to_string()));
        self.hooks
            .lock()
            .unwrap()
            .entry(project_id)
            .or_default()
            .push(url.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobCall {
    Fetch(String),
    Create(String),
    Update(String),
    Delete(String),
    Trigger(String),
}

/// Jenkins stand-in keeping jobs in memory.
#[derive(Default)]
pub struct FakeJobServer {
    pub jobs: Mutex<HashMap<String, String>>,
    pub calls: Mutex<Vec<JobCall>>,
    /// Applied to configs on store, like a server that reformats XML.
    pub normalize: Option<fn(&str) -> String>,
    pub fail_fetch: bool,
    pub fail_create: bool,
    pub fail_update: bool,
}

impl FakeJobServer {
    pub fn with_job(self, name: &str, config: &str) -> Self {
        self.jobs
            .lock()
            .unwrap()
            .insert(name.to_string(), config.to_string());
        self
    }

    pub fn calls(&self) -> Vec<JobCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than config fetches.
    pub fn writes(&self) -> Vec<JobCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, JobCall::Fetch(_)))
            .collect()
    }

    pub fn stored(&self, name: &str) -> Option<String> {
        self.jobs.lock().unwrap().get(name).cloned()
    }

    fn record(&self, call: JobCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn store(&self, name: &str, config: &str) {
        let config = match self.normalize {
            Some(normalize) => normalize(config),
            None => config.to_string(),
        };
        self.jobs.lock().unwrap().insert(name.to_string(), config);
    }
}

#[async_trait]
impl JobServer for FakeJobServer {
    async fn job_config(&self, job_name: &str) -> Result<Option<String>> {
        self.record(JobCall::Fetch(job_name.to_string()));
        if self.fail_fetch {
            return Err(RelayError::UpstreamStatus {
                url: job_name.to_string(),
                status: 500,
            });
        }
        Ok(self.stored(job_name))
    }

    async fn create_job(&self, job_name: &str, config: &str) -> Result<()> {
        self.record(JobCall::Create(job_name.to_string()));
        if self.fail_create {
            return Err(RelayError::UpstreamStatus {
                url: job_name.to_string(),
                status: 500,
            });
        }
        self.store(job_name, config);
        Ok(())
    }

    async fn update_job(&self, job_name: &str, config: &str) -> Result<()> {
        self.record(JobCall::Update(job_name.to_string()));
        if self.fail_update {
            return Err(RelayError::UpstreamStatus {
                url: job_name.to_string(),
                status: 500,
            });
        }
        if self.stored(job_name).is_none() {
            return Err(RelayError::NotFound(job_name.to_string()));
        }
        self.store(job_name, config);
        Ok(())
    }

    async fn delete_job(&self, job_name: &str) -> Result<()> {
        self.record(JobCall::Delete(job_name.to_string()));
        self.jobs.lock().unwrap().remove(job_name);
        Ok(())
    }

    async fn trigger_build(&self, job_name: &str) -> Result<()> {
        self.record(JobCall::Trigger(job_name.to_string()));
        if self.stored(job_name).is_none() {
            return Err(RelayError::NotFound(job_name.to_string()));
        }
        Ok(())
    }
}

/// Shared state wired to the given fakes, with the default test config.
pub fn test_state(host: Arc<FakeSourceHost>, jobs: Arc<FakeJobServer>) -> SharedState {
    test_state_with(test_config(), host, jobs)
}

pub fn test_state_with(
    config: RelayConfig,
    host: Arc<FakeSourceHost>,
    jobs: Arc<FakeJobServer>,
) -> SharedState {
    Arc::new(AppState::new(config, host, jobs))
}
