//! WebDriver server management - spawning and health checking
//! geckodriver/chromedriver

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use pypyjs_common::{poll_until, Pacing, TokioClock, WaitOutcome};
use tracing::{debug, info, warn};

use crate::config::{BrowserKind, HarnessConfig};
use crate::error::{E2eError, E2eResult};

const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to a running WebDriver server process
pub struct DriverServer {
    child: Child,
    pub url: String,
    pub port: u16,
}

impl DriverServer {
    /// Spawn the WebDriver binary and wait until it reports ready
    pub async fn spawn(config: DriverServerConfig) -> E2eResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let url = format!("http://127.0.0.1:{}", port);

        info!("Spawning {} on port {}", config.binary.display(), port);

        let mut cmd = Command::new(&config.binary);
        match config.kind {
            BrowserKind::Firefox => cmd.arg("--port").arg(port.to_string()),
            BrowserKind::Chrome => cmd.arg(format!("--port={}", port)),
        };
        cmd.stdout(Stdio::null()).stderr(Stdio::null());

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                E2eError::DriverNotFound(config.binary.display().to_string())
            } else {
                E2eError::ServerStartup(format!(
                    "Failed to spawn {}: {}",
                    config.binary.display(),
                    e
                ))
            }
        })?;

        let handle = DriverServer {
            child,
            url: url.clone(),
            port,
        };

        handle.wait_for_ready(config.startup_timeout).await?;

        info!("WebDriver server is ready at {}", url);
        Ok(handle)
    }

    /// Poll `GET /status` until the server answers successfully
    async fn wait_for_ready(&self, timeout_duration: Duration) -> E2eResult<()> {
        let status_url = format!("{}/status", self.url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        info!("Waiting for WebDriver server to start...");
        let outcome = poll_until(
            &TokioClock,
            &Pacing::Fixed(STATUS_POLL_INTERVAL),
            timeout_duration,
            || status_ok(&client, &status_url),
            |ready| *ready,
        )
        .await?;

        match outcome {
            WaitOutcome::Completed { attempts, .. } => {
                debug!("WebDriver answered /status after {} attempts", attempts);
                Ok(())
            }
            WaitOutcome::TimedOut { attempts, .. } => {
                Err(E2eError::ServerHealthCheck(attempts as usize))
            }
        }
    }

    /// Base URL of the server
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stop the server
    pub fn stop(&mut self) -> E2eResult<()> {
        debug!("Stopping WebDriver server (pid: {})", self.child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(200));
            }
        }

        // Force kill if still running
        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for DriverServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for spawning a WebDriver server
#[derive(Debug, Clone)]
pub struct DriverServerConfig {
    /// Browser the driver serves
    pub kind: BrowserKind,

    /// Path or name of the driver binary
    pub binary: PathBuf,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    /// Timeout for server startup
    pub startup_timeout: Duration,
}

impl Default for DriverServerConfig {
    fn default() -> Self {
        Self {
            kind: BrowserKind::Firefox,
            binary: PathBuf::from(BrowserKind::Firefox.driver_binary()),
            port: None,
            startup_timeout: Duration::from_secs(30),
        }
    }
}

impl DriverServerConfig {
    pub fn from_harness(config: &HarnessConfig) -> Self {
        let kind = config.browser.kind;
        Self {
            kind,
            binary: config
                .webdriver
                .binary
                .clone()
                .unwrap_or_else(|| PathBuf::from(kind.driver_binary())),
            port: config.webdriver.port,
            startup_timeout: config.webdriver.startup_timeout(),
        }
    }
}

/// One `/status` probe. Connection refused is expected while the driver
/// is starting and counts as not ready.
async fn status_ok(client: &reqwest::Client, url: &str) -> E2eResult<bool> {
    match client.get(url).send().await {
        Ok(resp) if resp.status().is_success() => Ok(true),
        Ok(resp) => {
            warn!("WebDriver status returned {}", resp.status());
            Ok(false)
        }
        Err(e) => {
            if !e.is_connect() {
                warn!("WebDriver status error: {}", e);
            }
            Ok(false)
        }
    }
}

/// Find a free port to use
fn find_free_port() -> E2eResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
