//! Push event flow: ref deletion, or template -> render -> reconcile -> build.
//!
//! Steps of one push run strictly one after another. Nothing here returns an
//! error to the HTTP layer; every failure ends in a logged `PushOutcome`.

use tracing::{error, info};

use crate::AppState;
use crate::job::JobIdentity;
use crate::reconcile::{Reconciler, Reconciliation};
use crate::render::render_job;
use crate::template::TemplateFetcher;
use crate::webhook::PushEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Ref was removed; the job delete was requested.
    Deleted(String),
    /// The pushed commit carries no job template.
    NoTemplate,
    Reconciled {
        job_name: String,
        reconciliation: Reconciliation,
        triggered: bool,
    },
    Aborted(String),
}

pub async fn process_push(state: &AppState, event: &PushEvent) -> PushOutcome {
    let reconciler = Reconciler::new(state.job_server.as_ref());

    if event.is_ref_deletion() {
        let identity = match JobIdentity::resolve(&event.repository.url, &event.git_ref) {
            Ok(identity) => identity,
            Err(e) => {
                error!("Cannot name job for deleted ref {}: {}", event.git_ref, e);
                return PushOutcome::Aborted(e.to_string());
            }
        };
        let job_name = identity.job_name();
        reconciler.delete_job(&job_name).await;
        return PushOutcome::Deleted(job_name);
    }

    let fetcher = TemplateFetcher::new(&state.config.triggers.files);
    let template = match fetcher
        .fetch(
            state.source_host.as_ref(),
            &event.repository.homepage,
            &event.after,
        )
        .await
    {
        Some(template) => template,
        None => return PushOutcome::NoTemplate,
    };

    let rendered = match render_job(state.source_host.as_ref(), event, &template.text).await {
        Ok(rendered) => rendered,
        Err(e) => {
            error!("Could not render {}: {}", template.filename, e);
            return PushOutcome::Aborted(e.to_string());
        }
    };

    let reconciliation = reconciler
        .create_or_update(&rendered.job_name, &rendered.config)
        .await;
    if !reconciliation.job_present() {
        info!("Not triggering {}, reconciliation failed", rendered.job_name);
        return PushOutcome::Reconciled {
            job_name: rendered.job_name,
            reconciliation,
            triggered: false,
        };
    }

    let triggered = reconciler.trigger_build(&rendered.job_name).await;
    PushOutcome::Reconciled {
        job_name: rendered.job_name,
        reconciliation,
        triggered,
    }
}
