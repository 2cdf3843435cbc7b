//! Status endpoints

use axum::{Json, extract::State as AxumState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::SharedState;

/// Server information
#[derive(Debug, Serialize)]
pub struct ServerStatus {
    pub name: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
}

pub async fn root() -> &'static str {
    "gitlab-jenkins relay"
}

/// GET /status - server, upstream and trigger information
pub async fn status(AxumState(state): AxumState<SharedState>) -> Json<serde_json::Value> {
    let server = ServerStatus {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: state.started_at,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    };

    Json(json!({
        "server": server,
        "upstreams": {
            "gitlab_server": state.config.gitlab.server,
            "jenkins_server": state.config.jenkins.server,
        },
        "triggers": {
            "files": state.config.triggers.files,
        },
        "hooks": {
            "webhook_url": state.config.webhook_url(),
        }
    }))
}
