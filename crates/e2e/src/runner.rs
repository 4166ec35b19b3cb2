//! Main test runner that discovers editor suites and runs them on
//! per-suite browser sessions

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pypyjs_common::{Clock, TokioClock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::cleanup::best_effort;
use crate::config::{BrowserConfig, HarnessConfig};
use crate::driver::{Browser, WebDriverBrowser};
use crate::editor::Editor;
use crate::error::{E2eError, E2eResult};
use crate::session::EditorSession;
use crate::spec::{EditorStep, EditorSuite, EditorTest};

/// Largest exit status a process can report
const MAX_EXIT_CODE: usize = 255;

/// How a test ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    /// The page did not behave as expected
    Failed,
    /// The harness or the browser driver broke
    Errored,
}

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub suite: String,
    pub name: String,
    pub outcome: TestOutcome,
    pub duration_ms: u64,
    pub steps_run: usize,
    pub failed_step: Option<String>,
    pub message: Option<String>,
    pub page_dump: Option<PathBuf>,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.outcome == TestOutcome::Passed
    }
}

/// Result of running one suite on one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub name: String,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub suites: Vec<SuiteResult>,
}

impl RunSummary {
    fn from_suites(suites: Vec<SuiteResult>, started_at: DateTime<Utc>, duration: Duration) -> Self {
        let results = suites.iter().flat_map(|s| s.results.iter());
        let (mut passed, mut failed, mut errors) = (0, 0, 0);
        for result in results {
            match result.outcome {
                TestOutcome::Passed => passed += 1,
                TestOutcome::Failed => failed += 1,
                TestOutcome::Errored => errors += 1,
            }
        }

        Self {
            total: passed + failed + errors,
            passed,
            failed,
            errors,
            started_at,
            duration_ms: duration.as_millis() as u64,
            suites,
        }
    }

    /// Process exit status: number of failures plus errors, capped at 255
    /// so that a non-passing run never wraps around to 0
    pub fn exit_code(&self) -> i32 {
        match self.failed + self.errors {
            0 => 0,
            n => n.min(MAX_EXIT_CODE) as i32,
        }
    }
}

/// Opens a fresh browser session for each suite
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Browser: Browser;

    async fn launch(&self) -> E2eResult<Self::Browser>;
}

/// Launches sessions on a WebDriver server
pub struct WebDriverLauncher {
    pub server_url: String,
    pub browser: BrowserConfig,
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    type Browser = WebDriverBrowser;

    async fn launch(&self) -> E2eResult<WebDriverBrowser> {
        WebDriverBrowser::connect(&self.server_url, &self.browser).await
    }
}

/// Main E2E test runner
pub struct TestRunner<L: BrowserLauncher> {
    launcher: L,
    config: HarnessConfig,
    clock: Arc<dyn Clock>,
}

impl<L: BrowserLauncher> TestRunner<L> {
    pub fn new(launcher: L, config: HarnessConfig) -> Self {
        Self::with_clock(launcher, config, Arc::new(TokioClock))
    }

    pub fn with_clock(launcher: L, config: HarnessConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            launcher,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Load suites from the specs directory, narrowed by tag and by
    /// `suite` or `suite::test` name
    pub fn discover(&self, tag: Option<&str>, name: Option<&str>) -> E2eResult<Vec<EditorSuite>> {
        let mut suites = EditorSuite::load_all(&self.config.paths.specs_dir)?;

        if let Some(tag) = tag {
            suites = EditorSuite::filter_by_tag(&suites, tag)
                .into_iter()
                .cloned()
                .collect();
        }

        if let Some(name) = name {
            suites = suites.iter().filter_map(|s| s.select(name)).collect();
            if suites.is_empty() {
                return Err(E2eError::SpecParse(format!("Test not found: {}", name)));
            }
        }

        Ok(suites)
    }

    /// Run suites one after the other
    pub async fn run_suites(&self, suites: &[EditorSuite]) -> RunSummary {
        let started_at = Utc::now();
        let start = Instant::now();

        let total: usize = suites.iter().map(|s| s.tests.len()).sum();
        info!("Running {} test(s) in {} suite(s)...", total, suites.len());

        let mut results = Vec::new();
        for suite in suites {
            results.push(self.run_suite(suite).await);
        }

        let summary = RunSummary::from_suites(results, started_at, start.elapsed());

        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} errors ({} ms)",
            summary.passed, summary.failed, summary.errors, summary.duration_ms
        );
        summary
    }

    /// Run one suite on a fresh session; the session is closed whatever
    /// happened
    pub async fn run_suite(&self, suite: &EditorSuite) -> SuiteResult {
        let start = Instant::now();
        info!("Suite {}: {}", suite.name, suite.description.trim());

        let session = match self.open_session().await {
            Ok(session) => session,
            Err(e) => {
                error!("✗ {} - session setup failed: {}", suite.name, e);
                let message = format!("session setup failed: {}", e);
                return SuiteResult {
                    name: suite.name.clone(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    results: suite
                        .tests
                        .iter()
                        .map(|test| TestResult {
                            suite: suite.name.clone(),
                            name: test.name.clone(),
                            outcome: TestOutcome::Errored,
                            duration_ms: 0,
                            steps_run: 0,
                            failed_step: None,
                            message: Some(message.clone()),
                            page_dump: None,
                        })
                        .collect(),
                };
            }
        };

        let mut results = Vec::new();
        for test in &suite.tests {
            let mut result = self.run_test(&session, suite, test).await;
            session.after_test().await;

            if result.passed() {
                info!("✓ {}::{} ({} ms)", suite.name, test.name, result.duration_ms);
            } else {
                error!(
                    "✗ {}::{} - {}",
                    suite.name,
                    test.name,
                    result.message.as_deref().unwrap_or("unknown error")
                );
                result.page_dump = best_effort(
                    "dump page source",
                    self.dump_page(&session, &suite.name, &test.name),
                )
                .await;
            }
            results.push(result);
        }

        session.close().await;

        SuiteResult {
            name: suite.name.clone(),
            duration_ms: start.elapsed().as_millis() as u64,
            results,
        }
    }

    async fn open_session(&self) -> E2eResult<EditorSession<L::Browser>> {
        let browser = self.launcher.launch().await?;
        EditorSession::open_with_clock(browser, self.config.clone(), self.clock.clone()).await
    }

    /// Run a single test; stops at the first failing step
    pub async fn run_test(
        &self,
        session: &EditorSession<L::Browser>,
        suite: &EditorSuite,
        test: &EditorTest,
    ) -> TestResult {
        let start = Instant::now();
        debug!("Running test: {}::{}", suite.name, test.name);

        let editor = session.editor();
        let mut steps_run = 0;
        let mut failure = None;

        for step in &test.steps {
            steps_run += 1;
            debug!("Executing step: {}", step.label());
            if let Err(e) = execute_step(&editor, step).await {
                failure = Some((step.label(), e));
                break;
            }
        }

        let (outcome, failed_step, message) = match failure {
            None => (TestOutcome::Passed, None, None),
            Some((label, e)) => {
                let outcome = if e.is_failure() {
                    TestOutcome::Failed
                } else {
                    TestOutcome::Errored
                };
                (outcome, Some(label), Some(e.to_string()))
            }
        };

        TestResult {
            suite: suite.name.clone(),
            name: test.name.clone(),
            outcome,
            duration_ms: start.elapsed().as_millis() as u64,
            steps_run,
            failed_step,
            message,
            page_dump: None,
        }
    }

    async fn dump_page(
        &self,
        session: &EditorSession<L::Browser>,
        suite: &str,
        test: &str,
    ) -> E2eResult<PathBuf> {
        let source = session.page_dump().await?;
        debug!("Page source after failure:\n{}", source);

        let dir = self.config.paths.output_dir.join("pages");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}--{}.html", suite, test));
        std::fs::write(&path, source)?;
        Ok(path)
    }

    /// Write the run summary to `test-results.json`
    pub fn write_results(&self, summary: &RunSummary) -> E2eResult<PathBuf> {
        write_results(&self.config.paths.output_dir, summary)
    }
}

/// Write a run summary as pretty JSON into `output_dir`
pub fn write_results(output_dir: &Path, summary: &RunSummary) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join("test-results.json");
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

/// Execute a single step against the editor
pub async fn execute_step(editor: &Editor<'_>, step: &EditorStep) -> E2eResult<()> {
    match step {
        EditorStep::AssertEditor {
            code,
            output,
            timeout_secs,
        } => {
            editor.assert_editor(code, output, *timeout_secs).await?;
        }
        EditorStep::Execute { code, timeout_secs } => {
            editor.execute(code, *timeout_secs).await?;
        }
        EditorStep::ExpectTimeout { code, timeout_secs } => {
            editor.expect_timeout(code, *timeout_secs).await?;
        }
        EditorStep::RunCode { code } => {
            editor.run_code(code).await?;
        }
        EditorStep::AssertConsole { text } => {
            editor.assert_console(text).await?;
        }
        EditorStep::AssertRunInfo {
            contains,
            not_contains,
        } => {
            editor
                .assert_run_info(contains.as_deref(), not_contains.as_deref())
                .await?;
        }
        EditorStep::ExpectAlert { text, timeout_ms } => {
            editor
                .expect_alert(text, Duration::from_millis(*timeout_ms))
                .await?;
        }
        EditorStep::Evaluate { script, expected } => {
            editor.evaluate(script, expected.as_ref()).await?;
        }
        EditorStep::ImportModules {
            modules_dir,
            max_failures,
        } => {
            let report = editor.import_all_modules(modules_dir, *max_failures).await?;
            info!("Imported {} modules", report.good);
        }
        EditorStep::Log { message } => {
            info!("[TEST LOG] {}", message);
        }
    }
    Ok(())
}
