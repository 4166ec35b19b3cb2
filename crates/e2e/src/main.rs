//! E2E test runner entry point
//!
//! Run with: cargo run --package pypyjs-e2e -- --headless

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use pypyjs_e2e::config::BrowserKind;
use pypyjs_e2e::server::{DriverServer, DriverServerConfig};
use pypyjs_e2e::{HarnessConfig, RunSummary, TestRunner, WebDriverLauncher};

#[derive(Parser, Debug)]
#[command(name = "pypyjs-e2e")]
#[command(about = "E2E test runner for the PyPy.js editor")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "pypyjs-e2e.toml")]
    config: PathBuf,

    /// Path to test specs directory
    #[arg(short, long)]
    specs: Option<PathBuf>,

    /// Run only suites with this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only `suite` or `suite::test`
    #[arg(short, long)]
    name: Option<String>,

    /// Directory with editor.html
    #[arg(long)]
    website_dir: Option<PathBuf>,

    /// URL of a running WebDriver server
    #[arg(long, env = "PYPYJS_WEBDRIVER_URL")]
    webdriver_url: Option<String>,

    /// Spawn the WebDriver binary instead of connecting to a running one
    #[arg(long)]
    spawn_driver: bool,

    /// WebDriver binary to spawn
    #[arg(long)]
    driver_binary: Option<PathBuf>,

    /// Browser to use
    #[arg(long, value_enum)]
    browser: Option<BrowserKind>,

    /// Run in headless mode
    #[arg(long)]
    headless: bool,

    /// Seconds to wait for a run to finish
    #[arg(long)]
    timeout: Option<u64>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn apply(&self, config: &mut HarnessConfig) {
        if let Some(specs) = &self.specs {
            config.paths.specs_dir = specs.clone();
        }
        if let Some(output) = &self.output {
            config.paths.output_dir = output.clone();
        }
        if let Some(dir) = &self.website_dir {
            config.page.website_dir = dir.clone();
        }
        if let Some(url) = &self.webdriver_url {
            config.webdriver.url = url.clone();
        }
        if self.spawn_driver {
            config.webdriver.spawn = true;
        }
        if let Some(binary) = &self.driver_binary {
            config.webdriver.binary = Some(binary.clone());
        }
        if let Some(kind) = self.browser {
            config.browser.kind = kind;
        }
        if self.headless {
            config.browser.headless = true;
        }
        if let Some(timeout) = self.timeout {
            config.execution.timeout_secs = timeout;
        }
    }
}

fn main() {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")
        .and_then(|rt| rt.block_on(async_main(args)));

    match result {
        Ok(summary) => std::process::exit(summary.exit_code()),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> anyhow::Result<RunSummary> {
    let mut config = HarnessConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    args.apply(&mut config);
    config.validate()?;

    // Kept alive for the whole run; dropping it stops the driver
    let server = if config.webdriver.spawn {
        Some(DriverServer::spawn(DriverServerConfig::from_harness(&config)).await?)
    } else {
        None
    };
    let server_url = server
        .as_ref()
        .map(|s| s.url().to_string())
        .unwrap_or_else(|| config.webdriver.url.clone());

    let launcher = WebDriverLauncher {
        server_url,
        browser: config.browser.clone(),
    };
    let runner = TestRunner::new(launcher, config);

    let suites = runner.discover(args.tag.as_deref(), args.name.as_deref())?;
    let summary = runner.run_suites(&suites).await;
    runner.write_results(&summary)?;

    drop(server);
    Ok(summary)
}
