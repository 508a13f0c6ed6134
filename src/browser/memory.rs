// src/browser/memory.rs
//! In-memory session serving fixture pages by URL.

use crate::browser::{snapshot_text, snapshot_title, BrowserSession, LoadState, PageRequest, Viewport};
use crate::utils::error::BrowserError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

#[derive(Default)]
pub struct MemorySession {
    pages: HashMap<String, String>,
    current: Option<String>,
    pub navigations: Vec<PageRequest>,
    pub unhealthy_signals: u32,
    pub extra_headers: BTreeMap<String, String>,
    pub viewport: Option<Viewport>,
    pub init_scripts: Vec<String>,
    /// Load states that report a timeout instead of completing.
    pub stalled_states: Vec<LoadState>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    fn body(&self) -> Result<&str, BrowserError> {
        self.current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .map(String::as_str)
            .ok_or_else(|| BrowserError::Navigation("no page loaded".to_string()))
    }
}

#[async_trait]
impl BrowserSession for MemorySession {
    async fn navigate(&mut self, request: &PageRequest) -> Result<(), BrowserError> {
        self.navigations.push(request.clone());
        if !self.pages.contains_key(&request.url) {
            return Err(BrowserError::Navigation(format!("no fixture for {}", request.url)));
        }
        self.current = Some(request.url.clone());
        Ok(())
    }

    async fn wait_for_load_state(&mut self, state: LoadState, timeout: Duration) -> Result<(), BrowserError> {
        if self.stalled_states.contains(&state) {
            return Err(BrowserError::Timeout { operation: state.to_string(), after: timeout });
        }
        Ok(())
    }

    async fn wait_for_selector(&mut self, _selector: &str, _timeout: Duration) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, BrowserError> {
        if script.contains("outerHTML") {
            return Ok(serde_json::Value::String(self.body()?.to_string()));
        }
        if script.contains("innerText") {
            return Ok(serde_json::Value::String(snapshot_text(self.body()?)));
        }
        Err(BrowserError::Unsupported("script not understood by the fixture session"))
    }

    async fn title(&mut self) -> Result<String, BrowserError> {
        Ok(snapshot_title(self.body()?))
    }

    async fn url(&mut self) -> Result<String, BrowserError> {
        self.current
            .clone()
            .ok_or_else(|| BrowserError::Navigation("no page loaded".to_string()))
    }

    async fn set_extra_headers(&mut self, headers: &BTreeMap<String, String>) -> Result<(), BrowserError> {
        self.extra_headers.extend(headers.clone());
        Ok(())
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> Result<(), BrowserError> {
        self.viewport = Some(viewport);
        Ok(())
    }

    async fn add_init_script(&mut self, script: &str) -> Result<(), BrowserError> {
        self.init_scripts.push(script.to_string());
        Ok(())
    }

    async fn mark_session_unhealthy(&mut self) {
        self.unhealthy_signals += 1;
    }
}
