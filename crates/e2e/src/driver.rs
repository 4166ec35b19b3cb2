//! Browser automation seam
//!
//! The harness talks to the page only through [`Browser`]. The real
//! implementation wraps a `thirtyfour` WebDriver session; tests can supply a
//! scripted page instead. Every call may fail with a driver-level error,
//! which callers propagate unchanged.

use async_trait::async_trait;
use serde_json::Value;
use thirtyfour::error::WebDriverError;
use thirtyfour::prelude::*;
use tracing::{debug, info};

use crate::config::{BrowserConfig, BrowserKind, WindowRect};
use crate::error::E2eResult;

/// Operations the harness needs from a browser session
#[async_trait]
pub trait Browser: Send + Sync {
    /// Navigate to a URL
    async fn goto(&self, url: &str) -> E2eResult<()>;

    /// Document title
    async fn title(&self) -> E2eResult<String>;

    /// Visible text of the element with the given id
    async fn text_by_id(&self, id: &str) -> E2eResult<String>;

    /// Click the element with the given id
    async fn click_by_id(&self, id: &str) -> E2eResult<()>;

    /// Run a script in the page and return its result
    async fn execute(&self, script: &str) -> E2eResult<Value>;

    async fn set_window_rect(&self, rect: WindowRect) -> E2eResult<()>;

    /// Text of the open alert, `None` when no alert is open
    async fn alert_text(&self) -> E2eResult<Option<String>>;

    /// Accept the open alert. Returns whether there was one.
    async fn accept_alert(&self) -> E2eResult<bool>;

    async fn page_source(&self) -> E2eResult<String>;

    /// End the session
    async fn quit(&self) -> E2eResult<()>;
}

/// [`Browser`] backed by a WebDriver session
pub struct WebDriverBrowser {
    driver: WebDriver,
}

impl WebDriverBrowser {
    /// Open a new session on the WebDriver server at `server_url`
    pub async fn connect(server_url: &str, config: &BrowserConfig) -> E2eResult<Self> {
        info!(
            "Opening {} session on {} (headless: {})",
            config.kind.as_str(),
            server_url,
            config.headless
        );

        let driver = match config.kind {
            BrowserKind::Firefox => {
                let mut caps = DesiredCapabilities::firefox();
                if config.headless {
                    caps.set_headless()?;
                }
                WebDriver::new(server_url, caps).await?
            }
            BrowserKind::Chrome => {
                let mut caps = DesiredCapabilities::chrome();
                if config.headless {
                    caps.set_headless()?;
                }
                WebDriver::new(server_url, caps).await?
            }
        };

        Ok(Self { driver })
    }

    /// The underlying WebDriver handle
    pub fn driver(&self) -> &WebDriver {
        &self.driver
    }
}

fn is_no_alert(err: &WebDriverError) -> bool {
    matches!(err, WebDriverError::NoSuchAlert(..))
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        debug!("goto {}", url);
        self.driver.goto(url).await?;
        Ok(())
    }

    async fn title(&self) -> E2eResult<String> {
        Ok(self.driver.title().await?)
    }

    async fn text_by_id(&self, id: &str) -> E2eResult<String> {
        let element = self.driver.find(By::Id(id)).await?;
        Ok(element.text().await?)
    }

    async fn click_by_id(&self, id: &str) -> E2eResult<()> {
        let element = self.driver.find(By::Id(id)).await?;
        element.click().await?;
        Ok(())
    }

    async fn execute(&self, script: &str) -> E2eResult<Value> {
        debug!("execute script: {}", script);
        let ret = self.driver.execute(script, Vec::new()).await?;
        Ok(ret.json().clone())
    }

    async fn set_window_rect(&self, rect: WindowRect) -> E2eResult<()> {
        self.driver
            .set_window_rect(
                rect.x.into(),
                rect.y.into(),
                rect.width.into(),
                rect.height.into(),
            )
            .await?;
        Ok(())
    }

    async fn alert_text(&self) -> E2eResult<Option<String>> {
        match self.driver.get_alert_text().await {
            Ok(text) => Ok(Some(text)),
            Err(e) if is_no_alert(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn accept_alert(&self) -> E2eResult<bool> {
        match self.driver.accept_alert().await {
            Ok(()) => Ok(true),
            Err(e) if is_no_alert(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn page_source(&self) -> E2eResult<String> {
        Ok(self.driver.source().await?)
    }

    async fn quit(&self) -> E2eResult<()> {
        self.driver.clone().quit().await?;
        Ok(())
    }
}
