use std::path::PathBuf;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::LoggingConfig;
use crate::error::RelayError;

const DEFAULT_LOG_DIRECTORY: &str = "logs";
const DEFAULT_MAX_LOG_FILES: usize = 5;
const LOG_FILE_PREFIX: &str = "gitlab_jenkins_relay";
// reqwest and hyper are chatty at info
const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=error";

pub struct FileLogger {
    log_directory: PathBuf,
    max_files: usize,
    rotation: Rotation,
}

impl FileLogger {
    pub fn new(log_directory: PathBuf) -> Self {
        Self {
            log_directory,
            max_files: DEFAULT_MAX_LOG_FILES,
            rotation: Rotation::DAILY,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Result<Self, RelayError> {
        let directory = config
            .directory
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_DIRECTORY.to_string());
        let mut logger = Self::new(PathBuf::from(directory));
        if let Some(max_files) = config.max_files {
            logger = logger.with_max_files(max_files);
        }
        if let Some(rotation) = &config.rotation {
            logger = logger.with_rotation(parse_rotation(rotation)?);
        }
        Ok(logger)
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files.max(1);
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn setup_file_logging(&self) -> Result<(NonBlocking, WorkerGuard), RelayError> {
        std::fs::create_dir_all(&self.log_directory)?;

        let file_appender = RollingFileAppender::builder()
            .rotation(self.rotation.clone())
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix("log")
            .max_log_files(self.max_files)
            .build(&self.log_directory)
            .map_err(|e| RelayError::ConfigError(format!("Failed to open log file: {}", e)))?;

        Ok(tracing_appender::non_blocking(file_appender))
    }
}

pub fn parse_rotation(value: &str) -> Result<Rotation, RelayError> {
    match value.to_lowercase().as_str() {
        "minutely" => Ok(Rotation::MINUTELY),
        "hourly" => Ok(Rotation::HOURLY),
        "daily" => Ok(Rotation::DAILY),
        "never" => Ok(Rotation::NEVER),
        other => Err(RelayError::ConfigError(format!(
            "Unknown log rotation '{}'",
            other
        ))),
    }
}

/// Console plus rolling file output. Keep the guard alive for as long as
/// logs should be flushed to disk.
pub fn setup_logging(file_logger: &FileLogger) -> Result<WorkerGuard, RelayError> {
    let (file_writer, guard) = file_logger.setup_file_logging()?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    Ok(guard)
}
