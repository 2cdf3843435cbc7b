//! Lookup of the job template committed in the pushed repository

use tracing::{error, info};

use crate::clients::SourceHost;

/// Raw job template text, opaque until rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTemplate {
    pub filename: String,
    pub text: String,
}

/// Fetches `<homepage>/raw/<commit>/<file>` for each candidate file in order.
pub struct TemplateFetcher<'a> {
    candidates: &'a [String],
}

impl<'a> TemplateFetcher<'a> {
    pub fn new(candidates: &'a [String]) -> Self {
        Self { candidates }
    }

    /// Base url under which files of `commit_id` are served raw.
    pub fn raw_base(homepage: &str, commit_id: &str) -> String {
        format!("{}/raw/{}/", homepage, commit_id)
    }

    /// Return the first candidate that can be fetched, or `None` when the
    /// commit carries no template. Failures only advance to the next candidate.
    pub async fn fetch(
        &self,
        host: &dyn SourceHost,
        homepage: &str,
        commit_id: &str,
    ) -> Option<JobTemplate> {
        let base = Self::raw_base(homepage, commit_id);
        for filename in self.candidates {
            let url = format!("{}{}", base, filename);
            match host.fetch_raw(&url).await {
                Ok(text) => {
                    info!("Found trigger file {}", url);
                    return Some(JobTemplate {
                        filename: filename.clone(),
                        text,
                    });
                }
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    error!("Error fetching {}: {}", url, e);
                    continue;
                }
            }
        }
        info!("No trigger files found under {}", base);
        None
    }
}
