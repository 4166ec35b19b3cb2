//! Error types for the editor E2E harness

use pypyjs_common::ConsoleMismatch;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("WebDriver server failed to start: {0}")]
    ServerStartup(String),

    #[error("WebDriver server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("WebDriver binary not found: {0}")]
    DriverNotFound(String),

    #[error("WebDriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Editor page did not initialize: {0}")]
    PageInit(String),

    #[error("Console mismatch:{0}")]
    ConsoleMismatch(#[from] ConsoleMismatch),

    #[error(
        "Timeout reached while execution of:\n\
         -----------------------------------\n\
         {code}\n\
         -----------------------------------\n\
         Console output:\n\
         -----------------------------------\n\
         {console}\n\
         -----------------------------------\n"
    )]
    ExecutionTimeout {
        code: String,
        /// Last `#run_info` text seen while polling
        run_info: String,
        console: String,
    },

    #[error("Unexpected run info {run_info:?}: {reason}")]
    RunInfo { run_info: String, reason: String },

    #[error("Alert mismatch: {0}")]
    Alert(String),

    #[error("Script result mismatch: expected {expected}, got {actual}")]
    Evaluate { expected: String, actual: String },

    #[error("Module import failed: {0}")]
    Import(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Whether this is a test failure (the page misbehaved) rather than an
    /// error in the harness or the browser driver
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            E2eError::ConsoleMismatch(_)
                | E2eError::ExecutionTimeout { .. }
                | E2eError::RunInfo { .. }
                | E2eError::Alert(_)
                | E2eError::Evaluate { .. }
                | E2eError::Import(_)
                | E2eError::Timeout(_)
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
