//! System hook handler

use axum::{
    body::Bytes,
    http::{Method, StatusCode},
};
use tracing::{debug, error, info};

use crate::AppState;
use crate::registrar::WebhookRegistrar;
use crate::routing::SystemEventKind;
use crate::webhook::SystemEvent;

/// Entry point for everything under `/systemhook`. Only POST bodies are
/// dispatched, on their `event_name`; any other verb gets the index no-op.
pub async fn dispatch(state: &AppState, method: &Method, body: Bytes) -> StatusCode {
    if *method != Method::POST {
        debug!("{} on system hook answered by index", method);
        return StatusCode::OK;
    }

    let event: SystemEvent = serde_json::from_slice(&body).unwrap_or_default();
    let name = event.event_name.as_deref().unwrap_or_default();
    let kind = match SystemEventKind::from_event_name(name) {
        Some(kind) => kind,
        None => {
            error!("Undefined event {:?}", name);
            return StatusCode::NOT_FOUND;
        }
    };

    if !kind.requires_action() {
        debug!("Ignoring system event {}", name);
        return StatusCode::OK;
    }

    match event.project_id {
        Some(project_id) => {
            info!("Project {} created", project_id);
            let hook_url = state.config.webhook_url();
            WebhookRegistrar::new(state.source_host.as_ref(), &hook_url)
                .ensure_webhook(project_id)
                .await;
        }
        None => error!("project_create event without project_id"),
    }
    StatusCode::OK
}
