//! Bringing Jenkins jobs in line with rendered configurations
//!
//! Jenkins is the only source of truth: every decision re-reads the stored
//! configuration, and failures are logged here rather than returned, since
//! GitLab does nothing useful with hook responses.

use tracing::{error, info};

use crate::clients::JobServer;

/// What `create_or_update` did to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Created,
    /// Created, then overwritten because the server stored a different text.
    CreatedThenUpdated,
    Updated,
    Unchanged,
    /// The job exists but the new config could not be stored.
    UpdateFailed,
    Failed,
}

impl Reconciliation {
    /// Whether the job is expected to exist afterwards.
    pub fn job_present(&self) -> bool {
        !matches!(self, Reconciliation::Failed)
    }
}

pub struct Reconciler<'a> {
    server: &'a dyn JobServer,
}

impl<'a> Reconciler<'a> {
    pub fn new(server: &'a dyn JobServer) -> Self {
        Self { server }
    }

    /// Create the job when absent, then update it when the stored config
    /// differs byte for byte from `config`.
    ///
    /// The update check also runs right after a create, against a fresh read,
    /// so a server that rewrites configs on store (whitespace, XML prolog)
    /// gets an extra update call.
    pub async fn create_or_update(&self, job_name: &str, config: &str) -> Reconciliation {
        let mut stored = match self.server.job_config(job_name).await {
            Ok(stored) => stored,
            Err(e) => {
                error!("Could not read config of {}: {}", job_name, e);
                return Reconciliation::Failed;
            }
        };

        let mut created = false;
        if stored.is_none() {
            info!("Creating {}", job_name);
            if let Err(e) = self.server.create_job(job_name, config).await {
                error!("Failed to create {}: {}", job_name, e);
                return Reconciliation::Failed;
            }
            created = true;
            stored = match self.server.job_config(job_name).await {
                Ok(stored) => stored,
                Err(e) => {
                    error!("Could not re-read config of {}: {}", job_name, e);
                    return Reconciliation::Created;
                }
            };
        }

        match stored {
            Some(current) if current != config => {
                info!("Updating {}", job_name);
                match self.server.update_job(job_name, config).await {
                    Ok(()) if created => Reconciliation::CreatedThenUpdated,
                    Ok(()) => Reconciliation::Updated,
                    Err(e) => {
                        error!("Failed to update {}: {}", job_name, e);
                        if created {
                            Reconciliation::Created
                        } else {
                            Reconciliation::UpdateFailed
                        }
                    }
                }
            }
            _ if created => Reconciliation::Created,
            _ => Reconciliation::Unchanged,
        }
    }

    /// Ask for a build. Returns whether the request was accepted.
    pub async fn trigger_build(&self, job_name: &str) -> bool {
        info!("Triggering a build of {}", job_name);
        match self.server.trigger_build(job_name).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to trigger {}: {}", job_name, e);
                false
            }
        }
    }

    /// Delete a job without checking it exists first.
    pub async fn delete_job(&self, job_name: &str) -> bool {
        info!("Deleting job {}", job_name);
        match self.server.delete_job(job_name).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to delete {}: {}", job_name, e);
                false
            }
        }
    }
}
