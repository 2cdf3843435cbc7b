//! Classification of inbound hook requests
//!
//! Path based dispatch for `/webhook...` and event based dispatch for
//! `/systemhook`. Both are plain tables; nothing is looked up by name at
//! runtime.

use axum::http::{Method, StatusCode};
use serde::Deserialize;

/// Index of the method segment in `/<resource>/<method>`.
pub const METHOD_INDEX: usize = 2;

/// Prefix reserved for internal handlers; never routable.
const INTERNAL_MARKER: char = '_';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Other,
}

impl From<&Method> for Verb {
    fn from(method: &Method) -> Self {
        if *method == Method::GET {
            Verb::Get
        } else if *method == Method::POST {
            Verb::Post
        } else {
            Verb::Other
        }
    }
}

/// Handlers reachable under `/webhook/<method>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAction {
    Push,
}

const WEBHOOK_ROUTES: &[(Verb, &str, WebhookAction)] =
    &[(Verb::Post, "push", WebhookAction::Push)];

/// Result of classifying one request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Path ends in `/`.
    Index,
    Routed(WebhookAction),
    /// Well formed, but no handler for this verb and method.
    NotFound(String),
    /// No method segment could be extracted.
    Malformed,
}

/// What to do with routes that did not resolve to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Answer unroutable requests with the index no-op, hiding the failure
    /// from the sender. Long standing behaviour that hook senders rely on.
    #[default]
    Index,
    /// Answer 404 for unknown methods and 400 for malformed paths.
    Strict,
}

/// Final decision for a webhook request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Index,
    Handle(WebhookAction),
    Reject(StatusCode),
}

/// Classify a `/webhook` request path (query already removed).
pub fn classify(verb: Verb, path: &str) -> Route {
    if path.ends_with('/') {
        return Route::Index;
    }

    let method = match path.split('/').nth(METHOD_INDEX) {
        Some(segment) => segment.split('.').next().unwrap_or_default(),
        None => return Route::Malformed,
    };
    if method.is_empty() {
        return Route::Malformed;
    }
    if method.starts_with(INTERNAL_MARKER) {
        return Route::NotFound(method.to_string());
    }

    WEBHOOK_ROUTES
        .iter()
        .find(|(v, name, _)| *v == verb && *name == method)
        .map(|(_, _, action)| Route::Routed(*action))
        .unwrap_or_else(|| Route::NotFound(method.to_string()))
}

/// Apply the fallback policy to a classified route.
pub fn resolve(route: Route, policy: FallbackPolicy) -> Dispatch {
    match (route, policy) {
        (Route::Index, _) => Dispatch::Index,
        (Route::Routed(action), _) => Dispatch::Handle(action),
        (Route::NotFound(_) | Route::Malformed, FallbackPolicy::Index) => Dispatch::Index,
        (Route::NotFound(_), FallbackPolicy::Strict) => Dispatch::Reject(StatusCode::NOT_FOUND),
        (Route::Malformed, FallbackPolicy::Strict) => Dispatch::Reject(StatusCode::BAD_REQUEST),
    }
}

/// System events GitLab is known to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventKind {
    ProjectCreate,
    ProjectDestroy,
    UserAddToTeam,
    UserRemoveFromTeam,
}

const SYSTEM_EVENTS: &[(&str, SystemEventKind)] = &[
    ("project_create", SystemEventKind::ProjectCreate),
    ("project_destroy", SystemEventKind::ProjectDestroy),
    ("user_add_to_team", SystemEventKind::UserAddToTeam),
    ("user_remove_from_team", SystemEventKind::UserRemoveFromTeam),
];

impl SystemEventKind {
    pub fn from_event_name(name: &str) -> Option<Self> {
        SYSTEM_EVENTS
            .iter()
            .find(|(event, _)| *event == name)
            .map(|(_, kind)| *kind)
    }

    /// Only project creation leads to any work.
    pub fn requires_action(&self) -> bool {
        matches!(self, SystemEventKind::ProjectCreate)
    }
}
