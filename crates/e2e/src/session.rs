//! Session-scoped fixture around one browser session on the editor page
//!
//! A session is opened once per suite and handed by reference to each of
//! its tests. Tests of one suite therefore see the page state earlier tests
//! left behind (no reload in between).

use std::sync::Arc;

use pypyjs_common::{poll_until, Clock, TokioClock, WaitOutcome};
use tracing::{debug, info};

use crate::cleanup::best_effort;
use crate::config::HarnessConfig;
use crate::driver::Browser;
use crate::editor::{Editor, CONSOLE_ID};
use crate::error::{E2eError, E2eResult};

pub struct EditorSession<B: Browser> {
    browser: B,
    config: HarnessConfig,
    clock: Arc<dyn Clock>,
}

impl<B: Browser> EditorSession<B> {
    /// Load the editor page and wait until the VM is ready
    pub async fn open(browser: B, config: HarnessConfig) -> E2eResult<Self> {
        Self::open_with_clock(browser, config, Arc::new(TokioClock)).await
    }

    /// Like [`EditorSession::open`], polling on the given clock
    pub async fn open_with_clock(
        browser: B,
        config: HarnessConfig,
        clock: Arc<dyn Clock>,
    ) -> E2eResult<Self> {
        let session = Self {
            browser,
            config,
            clock,
        };

        if let Err(e) = session.setup().await {
            session.close().await;
            return Err(e);
        }
        Ok(session)
    }

    async fn setup(&self) -> E2eResult<()> {
        let page = &self.config.page;
        let url = page.editor_url()?;

        self.browser
            .set_window_rect(self.config.browser.window)
            .await?;
        self.browser.goto(&url).await?;

        info!("Wait for init...");
        let title = self.browser.title().await?;
        if title != page.title {
            return Err(E2eError::PageInit(format!(
                "expected title {:?}, got {:?}",
                page.title, title
            )));
        }

        let outcome = poll_until(
            self.clock.as_ref(),
            &self.config.execution.pacing(),
            page.init_timeout(),
            || self.browser.text_by_id(CONSOLE_ID),
            |console| console.contains(&page.welcome_text),
        )
        .await?;

        match outcome {
            WaitOutcome::Completed { elapsed, .. } => {
                debug!("Editor ready after {:?}", elapsed);
                Ok(())
            }
            WaitOutcome::TimedOut { last, .. } => Err(E2eError::PageInit(format!(
                "console never showed {:?} within {:?}; last text: {:?}",
                page.welcome_text,
                page.init_timeout(),
                last.unwrap_or_default()
            ))),
        }
    }

    /// Page object for the editor
    pub fn editor(&self) -> Editor<'_> {
        Editor::new(&self.browser, &self.config, self.clock.as_ref())
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Per-test teardown: accept an alert a test left open, so that the
    /// next test doesn't trip over it. A missing alert is fine.
    pub async fn after_test(&self) {
        if let Some(true) = best_effort("dismiss alert", self.browser.accept_alert()).await {
            debug!("Dismissed an alert left open by the test");
        }
    }

    /// Page source with blank lines removed, for failure reports
    pub async fn page_dump(&self) -> E2eResult<String> {
        let source = self.browser.page_source().await?;
        if source.trim().is_empty() {
            return Ok("[page source is empty!]".to_string());
        }
        Ok(source
            .lines()
            .filter(|line| !line.trim_end().is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// End the browser session. Never fails.
    pub async fn close(self) {
        best_effort("quit browser session", self.browser.quit()).await;
    }
}
