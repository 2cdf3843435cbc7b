//! Hook payload structures sent by GitLab

use serde::Deserialize;

/// Commit id GitLab sends in `after` when a branch or tag was removed.
pub const DELETED_REF_SHA: &str = "0000000000000000000000000000000000000000";

/// Push event delivered to `/webhook`.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub after: String,
    pub repository: Repository,
    pub user_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    /// SSH clone url, `git@host:group/project.git`
    pub url: String,
    pub homepage: String,
}

impl PushEvent {
    /// True when the push removed the ref rather than adding commits to it.
    pub fn is_ref_deletion(&self) -> bool {
        self.after == DELETED_REF_SHA
    }

    /// Branch (or tag) name with the `refs/heads/` / `refs/tags/` prefix removed.
    pub fn branch(&self) -> &str {
        self.git_ref
            .strip_prefix("refs/heads/")
            .or_else(|| self.git_ref.strip_prefix("refs/tags/"))
            .unwrap_or(&self.git_ref)
    }
}

/// System event delivered to `/systemhook`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SystemEvent {
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub project_id: Option<u64>,
}
