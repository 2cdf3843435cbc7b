use gitlab_jenkins_relay::api::build_router;
use gitlab_jenkins_relay::clients::{
    GitLabClient, JenkinsClient, SourceHost, build_http_client, build_raw_client,
};
use gitlab_jenkins_relay::error::RelayError;
use gitlab_jenkins_relay::logging::{FileLogger, setup_logging};
use gitlab_jenkins_relay::registrar::WebhookRegistrar;
use gitlab_jenkins_relay::{AppState, RelayConfig, load_config};
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "relay_config.toml";

fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

async fn build_state(config: RelayConfig) -> Result<AppState, RelayError> {
    let http = build_http_client(&config.http)?;
    let retries = config.http.get_retries();
    let raw = build_raw_client(&config.http)?;
    let gitlab = Arc::new(GitLabClient::new(http.clone(), raw, &config.gitlab, retries));
    let jenkins = Arc::new(JenkinsClient::new(http, &config.jenkins, retries)?);

    gitlab.verify_token().await.map_err(|e| match e {
        RelayError::AuthenticationFailed(_) => {
            RelayError::AuthenticationFailed("Invalid authentication token".to_string())
        }
        other => other,
    })?;

    Ok(AppState::new(config, gitlab, jenkins))
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config_path =
        std::env::var("RELAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let config = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => exit_with(e),
    };

    let file_logger = match FileLogger::from_config(&config.logging) {
        Ok(logger) => logger,
        Err(e) => exit_with(e),
    };
    let _log_guard = match setup_logging(&file_logger) {
        Ok(guard) => guard,
        Err(e) => exit_with(e),
    };

    info!("Starting gitlab-jenkins relay");
    info!("Using config at {:?}", config_path);

    let bind_address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| {
        config
            .relay
            .bind_address
            .clone()
            .unwrap_or_else(|| format!("0.0.0.0:{}", config.relay.server_port))
    });

    let state = match build_state(config).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("{}", e);
            exit_with(e);
        }
    };

    if state.config.relay.should_register_existing_projects() {
        let hook_url = state.config.webhook_url();
        WebhookRegistrar::new(state.source_host.as_ref(), &hook_url)
            .register_existing_projects(state.config.relay.get_project_page_limit())
            .await;
    }

    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => exit_with(format!("Failed to bind {}: {}", bind_address, e)),
    };
    info!("Listening on {}", bind_address);
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        exit_with(e);
    }
}
