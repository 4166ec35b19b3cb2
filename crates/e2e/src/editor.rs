//! Page object for the PyPy.js editor
//!
//! The page has a CodeMirror editor (`CodeMirrorEditor` global), a `#run`
//! button, a `#run_info` status line and a `#console` output surface.

use std::collections::BTreeSet;
use std::time::Duration;

use pypyjs_common::{
    assert_console, encode_for_script, poll_until, Clock, TextBlock, WaitOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::driver::Browser;
use crate::error::{E2eError, E2eResult};
use crate::run_info::RunInfo;

pub const CONSOLE_ID: &str = "console";
pub const RUN_INFO_ID: &str = "run_info";
pub const RUN_BUTTON_ID: &str = "run";

/// Clears the completion signal before a run
const CLEAR_RUN_INFO_SCRIPT: &str = r##"$("#run_info").text("");"##;

/// Outcome of importing every bundled module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub total: usize,
    pub good: usize,
    pub failed: usize,
}

pub struct Editor<'a> {
    browser: &'a dyn Browser,
    config: &'a HarnessConfig,
    clock: &'a dyn Clock,
}

impl<'a> Editor<'a> {
    pub fn new(browser: &'a dyn Browser, config: &'a HarnessConfig, clock: &'a dyn Clock) -> Self {
        Self {
            browser,
            config,
            clock,
        }
    }

    /// Put `code` into the editor and click run, without waiting.
    ///
    /// `#run_info` is cleared first so a marker from the previous run
    /// can't be mistaken for this one finishing.
    pub async fn run_code(&self, code: &str) -> E2eResult<()> {
        self.browser.execute(CLEAR_RUN_INFO_SCRIPT).await?;

        let script = format!("CodeMirrorEditor.setValue('{}');", encode_for_script(code));
        self.browser.execute(&script).await?;

        self.browser.click_by_id(RUN_BUTTON_ID).await
    }

    /// Run `code` and wait for `#run_info` to report the run finished.
    ///
    /// Returns the `#run_info` text.
    pub async fn execute(&self, code: &str, timeout_secs: Option<u64>) -> E2eResult<String> {
        let waiter = self.config.execution.waiter(timeout_secs)?;
        self.run_code(code).await?;

        let outcome = waiter
            .wait(self.clock, || self.browser.text_by_id(RUN_INFO_ID))
            .await?;

        match outcome {
            WaitOutcome::Completed {
                value,
                attempts,
                elapsed,
            } => {
                debug!("Run finished after {:?} ({} polls): {}", elapsed, attempts, value);
                Ok(value)
            }
            WaitOutcome::TimedOut { last, .. } => {
                let console = self.console_text().await?;
                Err(E2eError::ExecutionTimeout {
                    code: TextBlock::reference(code).to_string(),
                    run_info: last.unwrap_or_default(),
                    console,
                })
            }
        }
    }

    /// Run `code` that must not finish in time. Returns the timeout
    /// report.
    pub async fn expect_timeout(&self, code: &str, timeout_secs: Option<u64>) -> E2eResult<String> {
        match self.execute(code, timeout_secs).await {
            Ok(run_info) => Err(E2eError::RunInfo {
                run_info,
                reason: "run finished, expected a timeout".to_string(),
            }),
            Err(e @ E2eError::ExecutionTimeout { .. }) => {
                let report = e.to_string();
                debug!("Timed out as expected:\n{}", report);
                Ok(report)
            }
            Err(e) => Err(e),
        }
    }

    /// Console text, trimmed
    pub async fn console_text(&self) -> E2eResult<String> {
        let text = self.browser.text_by_id(CONSOLE_ID).await?;
        Ok(text.trim().to_string())
    }

    pub async fn run_info_text(&self) -> E2eResult<String> {
        self.browser.text_by_id(RUN_INFO_ID).await
    }

    /// Compare the console with a reference block
    pub async fn assert_console(&self, expected: &str) -> E2eResult<()> {
        let console = self.console_text().await?;
        assert_console(&console, expected)?;
        Ok(())
    }

    /// Run `code`, compare the console with `output` and require a clean
    /// run (`OK` and no `Error` in `#run_info`)
    pub async fn assert_editor(
        &self,
        code: &str,
        output: &str,
        timeout_secs: Option<u64>,
    ) -> E2eResult<RunInfo> {
        let run_info = self.execute(code, timeout_secs).await?;
        self.assert_console(output).await?;

        let info = RunInfo::parse(&run_info);
        info.check_ok()
            .map_err(|reason| E2eError::RunInfo { run_info, reason })?;
        Ok(info)
    }

    /// Check the current `#run_info` text
    pub async fn assert_run_info(
        &self,
        contains: Option<&str>,
        not_contains: Option<&str>,
    ) -> E2eResult<()> {
        let run_info = self.run_info_text().await?;
        if let Some(needle) = contains {
            if !run_info.contains(needle) {
                return Err(E2eError::RunInfo {
                    run_info,
                    reason: format!("doesn't contain {:?}", needle),
                });
            }
        }
        if let Some(needle) = not_contains {
            if run_info.contains(needle) {
                return Err(E2eError::RunInfo {
                    run_info,
                    reason: format!("contains {:?}", needle),
                });
            }
        }
        Ok(())
    }

    /// Wait for an alert to open and check its text
    pub async fn expect_alert(&self, text: &str, timeout: Duration) -> E2eResult<()> {
        let outcome = poll_until(
            self.clock,
            &self.config.execution.pacing(),
            timeout,
            || self.browser.alert_text(),
            |alert| alert.is_some(),
        )
        .await?;

        match outcome.completed().flatten() {
            Some(actual) if actual == text => Ok(()),
            Some(actual) => Err(E2eError::Alert(format!(
                "expected {:?}, got {:?}",
                text, actual
            ))),
            None => Err(E2eError::Timeout(format!("alert {:?} after {:?}", text, timeout))),
        }
    }

    /// Run a page script. String results are trimmed before comparing
    /// with `expected`.
    pub async fn evaluate(&self, script: &str, expected: Option<&Value>) -> E2eResult<Value> {
        let result = self.browser.execute(script).await?;
        let actual = match result {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other,
        };

        if let Some(expected) = expected {
            if &actual != expected {
                return Err(E2eError::Evaluate {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
        }
        Ok(actual)
    }

    /// Import every bundled module, one run per module.
    ///
    /// Module names come from the `*.py` files (not starting with `_`) in
    /// `modules_dir` below the website directory; each must be known to
    /// the VM (`vm._allModules`). The test aborts once `max_failures`
    /// imports failed, and fails at the end if any did.
    pub async fn import_all_modules(
        &self,
        modules_dir: &str,
        max_failures: usize,
    ) -> E2eResult<ImportReport> {
        // Starting a VM makes the page fetch the module index
        self.execute("print 'init done'", None).await?;
        let console = self.console_text().await?;
        if console != "init done" {
            return Err(E2eError::Import(format!(
                "VM start printed {:?} instead of \"init done\"",
                console
            )));
        }

        let vm_modules = module_names(&self.browser.execute("return vm._allModules").await?);

        let bundled = self.bundled_modules(modules_dir)?;
        let total = bundled.len();

        for name in &bundled {
            if !vm_modules.contains(name) {
                return Err(E2eError::Import(format!(
                    "{} not found in vm._allModules",
                    name
                )));
            }
        }
        info!("All {} modules found in vm._allModules", total);

        let mut good = 0;
        let mut failed = 0;
        info!("Try to import modules:");
        for (no, name) in bundled.iter().enumerate() {
            debug!(" *** {} ***", name);
            self.execute(&format!("import {};print 'OK'", name), None)
                .await?;
            let mut response = self.console_text().await?;

            if name == "this"
                && response.starts_with("The Zen of Python")
                && response.ends_with("OK")
            {
                response = "OK".to_string();
            }

            if response == "OK" {
                good += 1;
            } else if response.contains("Error") {
                failed += 1;
                warn!("import {} failed: {}", name, response);
            } else {
                return Err(E2eError::Import(response));
            }
            info!("\t{}/{}: {}", no, total, response);

            if failed >= max_failures {
                return Err(E2eError::Import(format!(
                    "import test failed more than {} times. Abort the test.",
                    max_failures
                )));
            }
        }

        if failed > 0 {
            return Err(E2eError::Import(format!(
                "Import {} modules: {} ok - {} failed",
                total, good, failed
            )));
        }
        Ok(ImportReport {
            total,
            good,
            failed,
        })
    }

    fn bundled_modules(&self, modules_dir: &str) -> E2eResult<Vec<String>> {
        let libpath = self.config.page.website_path(modules_dir)?;
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&libpath)? {
            let file_name = entry?.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with('_') {
                continue;
            }
            if let Some(stem) = file_name.strip_suffix(".py") {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Module names from `vm._allModules`, which is an object keyed by name
/// (arrays of names are accepted too)
fn module_names(value: &Value) -> BTreeSet<String> {
    match value {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => BTreeSet::new(),
    }
}
