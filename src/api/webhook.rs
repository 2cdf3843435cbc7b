//! Push hook handler

use axum::{
    body::Bytes,
    http::{Method, StatusCode, Uri},
};
use tracing::{debug, info, warn};

use crate::AppState;
use crate::pipeline::{PushOutcome, process_push};
use crate::routing::{Dispatch, Verb, WebhookAction, classify, resolve};
use crate::webhook::PushEvent;

/// Resource name of the push endpoint.
pub const RESOURCE: &str = "/webhook";

/// Entry point for everything under `/webhook`.
pub async fn dispatch(state: &AppState, method: &Method, uri: &Uri, body: Bytes) -> StatusCode {
    let path = uri.path();
    if *method == Method::POST && path == RESOURCE {
        return handle_push(state, &body).await;
    }

    let route = classify(Verb::from(method), path);
    debug!("{} {} classified as {:?}", method, path, route);
    match resolve(route, state.config.routing.fallback) {
        Dispatch::Handle(WebhookAction::Push) => handle_push(state, &body).await,
        Dispatch::Index => index(method, path),
        Dispatch::Reject(status) => {
            warn!("Rejecting {} {} with {}", method, path, status);
            status
        }
    }
}

/// No-op answer for requests that route nowhere in particular.
fn index(method: &Method, path: &str) -> StatusCode {
    debug!("{} {} answered by index", method, path);
    StatusCode::OK
}

async fn handle_push(state: &AppState, body: &[u8]) -> StatusCode {
    let event: PushEvent = match serde_json::from_slice(body) {
        Ok(event) => event,
        Err(e) => {
            warn!("Could not parse push event: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    info!(
        "Push to {} of {} ({})",
        event.git_ref, event.repository.url, event.after
    );
    match process_push(state, &event).await {
        PushOutcome::Deleted(job_name) => info!("Removed job {}", job_name),
        PushOutcome::NoTemplate => debug!("Nothing to do for {}", event.repository.url),
        PushOutcome::Reconciled {
            job_name,
            reconciliation,
            triggered,
        } => info!(
            "Job {}: {:?}, build triggered: {}",
            job_name, reconciliation, triggered
        ),
        PushOutcome::Aborted(reason) => warn!("Push handling aborted: {}", reason),
    }
    StatusCode::OK
}
