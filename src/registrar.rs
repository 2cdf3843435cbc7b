//! Keeps the relay's push webhook registered on GitLab projects

use tracing::{error, info};

use crate::clients::SourceHost;

const PROJECTS_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    AlreadyPresent,
    Added,
    Failed,
}

pub struct WebhookRegistrar<'a> {
    host: &'a dyn SourceHost,
    hook_url: &'a str,
}

impl<'a> WebhookRegistrar<'a> {
    pub fn new(host: &'a dyn SourceHost, hook_url: &'a str) -> Self {
        Self { host, hook_url }
    }

    /// Add the hook to a project unless one with the exact same url exists.
    pub async fn ensure_webhook(&self, project_id: u64) -> Registration {
        let project = match self.host.project(project_id).await {
            Ok(project) => project,
            Err(e) => {
                error!("Invalid project id ({}): {}", project_id, e);
                return Registration::Failed;
            }
        };

        info!("Ensuring webhook on {}", project.name);
        let configured = match self.host.project_hook_urls(project.id).await {
            Ok(urls) => urls,
            Err(e) => {
                error!("Could not list hooks of {}: {}", project.name, e);
                return Registration::Failed;
            }
        };
        if configured.iter().any(|url| url == self.hook_url) {
            return Registration::AlreadyPresent;
        }

        info!("Adding webhook to {}", project.name);
        match self.host.add_project_hook(project.id, self.hook_url).await {
            Ok(()) => Registration::Added,
            Err(e) => {
                error!("Could not add webhook to {}: {}", project.name, e);
                Registration::Failed
            }
        }
    }

    /// Walk every project page by page and ensure the hook on each.
    /// Returns the number of hooks added.
    pub async fn register_existing_projects(&self, page_limit: u32) -> usize {
        info!("Registering webhook on existing repositories");
        let mut added = 0;
        for page in 1..=page_limit {
            let projects = match self.host.list_projects(page, PROJECTS_PER_PAGE).await {
                Ok(projects) => projects,
                Err(e) => {
                    error!("Could not list projects (page {}): {}", page, e);
                    break;
                }
            };
            if projects.is_empty() {
                break;
            }
            for project in projects {
                if self.ensure_webhook(project.id).await == Registration::Added {
                    added += 1;
                }
            }
        }
        info!("Done, {} webhooks added", added);
        added
    }
}
