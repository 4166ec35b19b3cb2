//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use pypyjs_common::wait::{DEFAULT_MARKER, DEFAULT_POLL_INTERVAL};
use pypyjs_common::{CompletionWaiter, Pacing};

use crate::error::{E2eError, E2eResult};

/// Harness configuration, usually read from `pypyjs-e2e.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// WebDriver endpoint
    pub webdriver: WebDriverConfig,

    /// Browser and window settings
    pub browser: BrowserConfig,

    /// Editor page settings
    pub page: PageConfig,

    /// Run completion settings
    pub execution: ExecutionConfig,

    /// Input and output locations
    pub paths: PathsConfig,
}

/// WebDriver server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    /// URL of an already running server; ignored when `spawn` is set
    pub url: String,

    /// Spawn the driver binary instead of connecting to `url`
    pub spawn: bool,

    /// Driver binary (defaults to geckodriver/chromedriver for the browser)
    pub binary: Option<PathBuf>,

    /// Port for a spawned driver (None = find a free port)
    pub port: Option<u16>,

    /// Seconds to wait for a spawned driver to answer `/status`
    pub startup_timeout_secs: u64,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:4444".to_string(),
            spawn: false,
            binary: None,
            port: None,
            startup_timeout_secs: 30,
        }
    }
}

impl WebDriverConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Firefox,
    Chrome,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Firefox => "firefox",
            BrowserKind::Chrome => "chrome",
        }
    }

    /// WebDriver binary conventionally used for this browser
    pub fn driver_binary(&self) -> &'static str {
        match self {
            BrowserKind::Firefox => "geckodriver",
            BrowserKind::Chrome => "chromedriver",
        }
    }
}

/// Browser window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub kind: BrowserKind,
    pub headless: bool,
    pub window: WindowRect,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            kind: BrowserKind::Firefox,
            headless: false,
            window: WindowRect::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowRect {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 800,
            height: 900,
        }
    }
}

/// Editor page configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// Directory holding `editor.html` and its assets
    pub website_dir: PathBuf,

    /// Editor page, relative to `website_dir`
    pub editor_page: String,

    /// Expected document title
    pub title: String,

    /// Console text shown once the VM is ready
    pub welcome_text: String,

    /// Seconds to wait for the welcome text
    pub init_timeout_secs: u64,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            website_dir: PathBuf::from("website"),
            editor_page: "editor.html".to_string(),
            title: "PyPy.js".to_string(),
            welcome_text: "Welcome to PyPy.js!".to_string(),
            init_timeout_secs: 10,
        }
    }
}

impl PageConfig {
    /// Absolute path of a file below the website directory.
    ///
    /// Fails when the file does not exist.
    pub fn website_path(&self, sub_path: &str) -> E2eResult<PathBuf> {
        let path = self.website_dir.join(sub_path);
        let path = std::fs::canonicalize(&path).map_err(|e| {
            E2eError::Config(format!("path {} doesn't exist: {}", path.display(), e))
        })?;
        Ok(path)
    }

    /// `file://` URL of the editor page
    pub fn editor_url(&self) -> E2eResult<String> {
        let path = self.website_path(&self.editor_page)?;
        Ok(format!("file://{}", path.display()))
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }
}

/// Run completion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Text in `#run_info` that marks a finished run
    pub marker: String,

    /// Seconds to wait for a run to finish
    pub timeout_secs: u64,

    /// Milliseconds between two reads of `#run_info`
    pub poll_interval_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            timeout_secs: 10,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl ExecutionConfig {
    pub fn pacing(&self) -> Pacing {
        Pacing::Fixed(Duration::from_millis(self.poll_interval_ms))
    }

    /// Completion waiter for a run, with an optional per-step timeout.
    ///
    /// A zero timeout is rejected.
    pub fn waiter(&self, timeout_secs: Option<u64>) -> E2eResult<CompletionWaiter> {
        let secs = timeout_secs.unwrap_or(self.timeout_secs);
        if secs == 0 {
            return Err(E2eError::Config("run timeout must be positive".to_string()));
        }
        let timeout = Duration::from_secs(secs);
        Ok(CompletionWaiter::new(self.marker.clone(), timeout).with_pacing(self.pacing()))
    }
}

/// Input and output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory with YAML editor suites
    pub specs_dir: PathBuf,

    /// Directory for results and failure page dumps
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            specs_dir: PathBuf::from("crates/e2e/specs"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file; a missing file yields the defaults
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject timeouts and intervals of zero
    pub fn validate(&self) -> E2eResult<()> {
        let checks = [
            ("execution.timeout_secs", self.execution.timeout_secs),
            ("execution.poll_interval_ms", self.execution.poll_interval_ms),
            ("page.init_timeout_secs", self.page.init_timeout_secs),
            ("webdriver.startup_timeout_secs", self.webdriver.startup_timeout_secs),
        ];
        for (key, value) in checks {
            if value == 0 {
                return Err(E2eError::Config(format!("{} must be positive", key)));
            }
        }
        if self.execution.marker.is_empty() {
            return Err(E2eError::Config("execution.marker must not be empty".to_string()));
        }
        Ok(())
    }
}
