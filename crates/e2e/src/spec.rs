//! Declarative YAML editor suites
//!
//! One file is one suite: its tests share a browser session and run in
//! file order.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{E2eError, E2eResult};

/// A suite of editor tests parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorSuite {
    /// Unique name for this suite
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering suites
    #[serde(default)]
    pub tags: Vec<String>,

    /// Tests to run, in order, on one session
    pub tests: Vec<EditorTest>,
}

/// A single test of a suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorTest {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub steps: Vec<EditorStep>,
}

/// A single step in a test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EditorStep {
    /// Run code, then check the console and a clean `#run_info`
    AssertEditor {
        code: String,
        output: String,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },

    /// Run code and wait for it to finish
    Execute {
        code: String,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },

    /// Run code that must not finish before the timeout
    ExpectTimeout {
        code: String,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },

    /// Put code in the editor and click run, without waiting
    RunCode {
        code: String,
    },

    /// Compare the console with a reference block
    AssertConsole {
        text: String,
    },

    /// Check the `#run_info` text
    AssertRunInfo {
        #[serde(default)]
        contains: Option<String>,
        #[serde(default)]
        not_contains: Option<String>,
    },

    /// Wait for an alert and check its text
    ExpectAlert {
        text: String,
        #[serde(default = "default_alert_timeout")]
        timeout_ms: u64,
    },

    /// Run a page script, optionally checking its result
    Evaluate {
        script: String,
        #[serde(default)]
        expected: Option<serde_json::Value>,
    },

    /// Import every bundled module
    ImportModules {
        /// Module directory, relative to the website directory
        modules_dir: String,
        #[serde(default = "default_max_failures")]
        max_failures: usize,
    },

    /// Log a message (for debugging)
    Log {
        message: String,
    },
}

fn default_alert_timeout() -> u64 {
    5000
}

fn default_max_failures() -> usize {
    10
}

impl EditorStep {
    /// Short label for logs and results
    pub fn label(&self) -> String {
        match self {
            EditorStep::AssertEditor { code, .. } => format!("assert_editor:{}", first_line(code)),
            EditorStep::Execute { code, .. } => format!("execute:{}", first_line(code)),
            EditorStep::ExpectTimeout { code, .. } => format!("expect_timeout:{}", first_line(code)),
            EditorStep::RunCode { code } => format!("run_code:{}", first_line(code)),
            EditorStep::AssertConsole { .. } => "assert_console".to_string(),
            EditorStep::AssertRunInfo { .. } => "assert_run_info".to_string(),
            EditorStep::ExpectAlert { text, .. } => format!("expect_alert:{}", text),
            EditorStep::Evaluate { .. } => "evaluate".to_string(),
            EditorStep::ImportModules { modules_dir, .. } => format!("import_modules:{}", modules_dir),
            EditorStep::Log { message } => format!("log:{}", first_line(message)),
        }
    }

    /// Per-step run timeout, for steps that wait for a run
    pub fn timeout_secs(&self) -> Option<u64> {
        match self {
            EditorStep::AssertEditor { timeout_secs, .. }
            | EditorStep::Execute { timeout_secs, .. }
            | EditorStep::ExpectTimeout { timeout_secs, .. } => *timeout_secs,
            _ => None,
        }
    }
}

fn first_line(text: &str) -> &str {
    let line = text.trim().lines().next().unwrap_or("");
    match line.char_indices().nth(40) {
        Some((end, _)) => &line[..end],
        None => line,
    }
}

impl EditorSuite {
    /// Parse a suite from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let suite: Self = serde_yaml::from_str(yaml)?;
        suite.validate()?;
        Ok(suite)
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all suites from a directory, ordered by path.
    ///
    /// A missing directory or an unreadable entry is an error.
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(E2eError::Config(format!(
                "specs directory {} doesn't exist",
                dir.display()
            )));
        }

        let mut specs = Vec::new();
        for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                E2eError::SpecParse(format!("reading {}: {}", dir.display(), e))
            })?;
            let is_yaml = entry
                .path()
                .extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false);
            if is_yaml && entry.file_type().is_file() {
                specs.push(Self::from_file(entry.path())?);
            }
        }

        Ok(specs)
    }

    /// Filter suites by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Narrow to `suite` or `suite::test`. Returns `None` if nothing matches.
    pub fn select(&self, selector: &str) -> Option<Self> {
        match selector.split_once("::") {
            None if selector == self.name => Some(self.clone()),
            Some((suite, test)) if suite == self.name => {
                let tests: Vec<_> = self
                    .tests
                    .iter()
                    .filter(|t| t.name == test)
                    .cloned()
                    .collect();
                if tests.is_empty() {
                    None
                } else {
                    Some(Self {
                        tests,
                        ..self.clone()
                    })
                }
            }
            _ => None,
        }
    }

    fn validate(&self) -> E2eResult<()> {
        let mut seen = std::collections::HashSet::new();
        for test in &self.tests {
            if !seen.insert(test.name.as_str()) {
                return Err(E2eError::SpecParse(format!(
                    "suite {} has two tests named {}",
                    self.name, test.name
                )));
            }
            if test.steps.is_empty() {
                return Err(E2eError::SpecParse(format!(
                    "test {}::{} has no steps",
                    self.name, test.name
                )));
            }
            for step in &test.steps {
                if step.timeout_secs() == Some(0) {
                    return Err(E2eError::SpecParse(format!(
                        "test {}::{}: step {} has a zero timeout",
                        self.name,
                        test.name,
                        step.label()
                    )));
                }
            }
        }
        Ok(())
    }
}
