//! HTTP surface of the relay
//!
//! `/` and `/status` are ordinary routes. Hook requests go through the router
//! fallback, which picks the hook resource from the first path segment and
//! leaves the rest of the path to the resource's own dispatch.

pub mod status;
pub mod systemhook;
pub mod webhook;

use axum::{
    Router,
    body::Bytes,
    extract::State as AxumState,
    http::{Method, StatusCode, Uri},
    routing,
};
use tracing::{Instrument, info_span, warn};
use uuid::Uuid;

use crate::SharedState;

pub use status::{root, status};

/// Build the application router.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(root))
        .route("/status", routing::get(status))
        .fallback(dispatch_hook)
        .with_state(state)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resource {
    Webhook,
    SystemHook,
}

fn resource_of(path: &str) -> Option<Resource> {
    match path.split('/').nth(1) {
        Some("webhook") => Some(Resource::Webhook),
        Some("systemhook") => Some(Resource::SystemHook),
        _ => None,
    }
}

/// Fallback handler routing hook requests to their resource.
async fn dispatch_hook(
    AxumState(state): AxumState<SharedState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> StatusCode {
    let resource = match resource_of(uri.path()) {
        Some(resource) => resource,
        None => {
            warn!("No handler for {} {}", method, uri.path());
            return StatusCode::NOT_FOUND;
        }
    };

    let span = info_span!("hook", request_id = %Uuid::now_v7(), ?resource);
    async {
        match resource {
            Resource::Webhook => webhook::dispatch(&state, &method, &uri, body).await,
            Resource::SystemHook => systemhook::dispatch(&state, &method, body).await,
        }
    }
    .instrument(span)
    .await
}
