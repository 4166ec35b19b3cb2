//! Scripted stand-in for the editor page

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use pypyjs_e2e::config::WindowRect;
use pypyjs_e2e::{Browser, BrowserLauncher, E2eError, E2eResult, HarnessConfig};

/// What the page does when the submitted code contains `needle`
#[derive(Debug, Clone)]
pub struct Program {
    pub needle: &'static str,
    pub console: &'static str,
    /// `None` keeps the run busy forever
    pub run_info: Option<&'static str>,
    pub alert: Option<&'static str>,
}

impl Program {
    pub fn prints(needle: &'static str, console: &'static str) -> Self {
        Self {
            needle,
            console,
            run_info: Some("Run in 3ms (OK)"),
            alert: None,
        }
    }

    pub fn hangs(needle: &'static str, console: &'static str) -> Self {
        Self {
            needle,
            console,
            run_info: None,
            alert: None,
        }
    }

    pub fn alerts(needle: &'static str, text: &'static str) -> Self {
        Self {
            needle,
            console: "OK",
            run_info: Some("Run in 2ms (OK)"),
            alert: Some(text),
        }
    }
}

#[derive(Debug, Default)]
pub struct PageState {
    pub url: Option<String>,
    pub window: Option<WindowRect>,
    pub console: String,
    pub run_info: String,
    pub editor_value: String,
    pub alert: Option<String>,
    pub scripts: Vec<String>,
    pub launches: usize,
    pub quit: bool,
}

#[derive(Clone)]
pub struct FakePage {
    pub state: Arc<Mutex<PageState>>,
    pub programs: Vec<Program>,
    pub title: String,
}

impl FakePage {
    pub fn new(programs: Vec<Program>) -> Self {
        Self {
            state: Arc::new(Mutex::new(PageState::default())),
            programs,
            title: "PyPy.js".to_string(),
        }
    }
}

#[async_trait]
impl Browser for FakePage {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.url = Some(url.to_string());
        state.console = "Welcome to PyPy.js!\n".to_string();
        state.run_info = "PyPy.js init in 1.2 sec.".to_string();
        Ok(())
    }

    async fn title(&self) -> E2eResult<String> {
        Ok(self.title.clone())
    }

    async fn text_by_id(&self, id: &str) -> E2eResult<String> {
        let state = self.state.lock();
        match id {
            "console" => Ok(state.console.clone()),
            "run_info" => Ok(state.run_info.clone()),
            other => Err(E2eError::Browser(format!("no element #{}", other))),
        }
    }

    async fn click_by_id(&self, id: &str) -> E2eResult<()> {
        if id != "run" {
            return Err(E2eError::Browser(format!("no element #{}", id)));
        }
        let mut state = self.state.lock();
        let program = self
            .programs
            .iter()
            .find(|p| state.editor_value.contains(p.needle))
            .cloned()
            .unwrap_or_else(|| Program::prints("", ""));

        state.console = program.console.to_string();
        state.run_info = program.run_info.unwrap_or("start vm...").to_string();
        state.alert = program.alert.map(str::to_string);
        Ok(())
    }

    async fn execute(&self, script: &str) -> E2eResult<Value> {
        let mut state = self.state.lock();
        state.scripts.push(script.to_string());

        if script.contains("#run_info") {
            state.run_info.clear();
        } else if let Some(value) = script.strip_prefix("CodeMirrorEditor.setValue(") {
            state.editor_value = value.to_string();
        } else if script.contains("vm._allModules") {
            return Ok(serde_json::json!({"os": {}, "random": {}, "this": {}}));
        } else if script.contains("#console") {
            return Ok(Value::String(state.console.clone()));
        }
        Ok(Value::Null)
    }

    async fn set_window_rect(&self, rect: WindowRect) -> E2eResult<()> {
        self.state.lock().window = Some(rect);
        Ok(())
    }

    async fn alert_text(&self) -> E2eResult<Option<String>> {
        Ok(self.state.lock().alert.clone())
    }

    async fn accept_alert(&self) -> E2eResult<bool> {
        Ok(self.state.lock().alert.take().is_some())
    }

    async fn page_source(&self) -> E2eResult<String> {
        let state = self.state.lock();
        Ok(format!(
            "<html>\n\n<body>\n  <pre id=\"console\">{}</pre>\n\n</body>\n</html>",
            state.console
        ))
    }

    async fn quit(&self) -> E2eResult<()> {
        self.state.lock().quit = true;
        Ok(())
    }
}

/// Hands out the same scripted page for every suite
pub struct FakeLauncher {
    pub page: FakePage,
    pub fail: bool,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    type Browser = FakePage;

    async fn launch(&self) -> E2eResult<FakePage> {
        if self.fail {
            return Err(E2eError::Browser("session not created".to_string()));
        }
        let mut state = self.page.state.lock();
        state.launches += 1;
        state.quit = false;
        drop(state);
        Ok(self.page.clone())
    }
}

/// Harness config pointing at a website directory with an editor page
pub fn config_for(website: &Path, output: &Path) -> HarnessConfig {
    std::fs::write(website.join("editor.html"), "<html></html>").unwrap();

    let mut config = HarnessConfig::default();
    config.page.website_dir = website.to_path_buf();
    config.paths.output_dir = output.to_path_buf();
    config
}
