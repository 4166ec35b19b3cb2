//! PyPy.js editor E2E test framework
//!
//! This crate drives the PyPy.js web editor in a real browser over
//! WebDriver:
//! - Optionally spawns geckodriver/chromedriver as a subprocess
//! - Loads the editor page once per suite and waits for the VM
//! - Parses declarative YAML editor suites
//! - Runs Python code, waits for `#run_info` and diffs the console
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   E2E Test Runner (Rust)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── DriverServer::spawn() (optional)                     │
//! │    ├── discover(tag, name) -> [EditorSuite]                 │
//! │    ├── run_suite(suite) -> SuiteResult                      │
//! │    │     └── EditorSession (one per suite)                  │
//! │    │           └── Editor: execute / assert_console / ...   │
//! │    └── write_results(summary)                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  EditorSuite (YAML)                                         │
//! │    ├── name, description, tags                              │
//! │    └── tests: [{ name, steps: [EditorStep] }]               │
//! │          ├── assert_editor { code, output }                 │
//! │          ├── execute / run_code { code }                    │
//! │          ├── assert_console { text }                        │
//! │          ├── assert_run_info { contains?, not_contains? }   │
//! │          ├── expect_alert { text }                          │
//! │          ├── evaluate { script, expected? }                 │
//! │          └── import_modules { modules_dir }                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod cleanup;
pub mod config;
pub mod driver;
pub mod editor;
pub mod error;
pub mod run_info;
pub mod runner;
pub mod server;
pub mod session;
pub mod spec;

pub use config::HarnessConfig;
pub use driver::{Browser, WebDriverBrowser};
pub use editor::Editor;
pub use error::{E2eError, E2eResult};
pub use runner::{BrowserLauncher, RunSummary, TestOutcome, TestRunner, WebDriverLauncher};
pub use session::EditorSession;
pub use spec::{EditorStep, EditorSuite, EditorTest};
