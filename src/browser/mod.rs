// src/browser/mod.rs
//! Contract of the browser automation runtime the traversal drives.
//!
//! The runtime owns rendering, stealth profiles and proxies. Selector queries do not cross
//! this boundary one element at a time: the page is evaluated once into a serialized DOM
//! snapshot, and all field resolution runs on that snapshot.

pub mod http;
#[cfg(test)]
pub mod memory;

use crate::utils::error::BrowserError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::node::Node;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub use http::HttpSession;

const OUTER_HTML_SCRIPT: &str = "() => document.documentElement.outerHTML";
const INNER_TEXT_SCRIPT: &str = "() => document.body ? document.body.innerText : ''";

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("body").expect("Failed to compile BODY_SELECTOR")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    DomContentLoaded,
    NetworkIdle,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::DomContentLoaded => f.write_str("domcontentloaded"),
            LoadState::NetworkIdle => f.write_str("networkidle"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// What a queued request is for; the label routes it back into the page loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestLabel {
    SearchPage { page: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub label: RequestLabel,
}

impl PageRequest {
    pub fn search_page(url: impl Into<String>, page: u32) -> Self {
        Self { url: url.into(), label: RequestLabel::SearchPage { page } }
    }
}

/// One live browsing session. Every call completes or fails before the caller moves on.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, request: &PageRequest) -> Result<(), BrowserError>;

    async fn wait_for_load_state(&mut self, state: LoadState, timeout: Duration) -> Result<(), BrowserError>;

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Runs a function against the live DOM and returns its JSON-serializable result.
    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// Serialized snapshot of the rendered DOM.
    async fn content(&mut self) -> Result<String, BrowserError> {
        match self.evaluate(OUTER_HTML_SCRIPT).await? {
            serde_json::Value::String(html) => Ok(html),
            other => Err(BrowserError::Evaluation(format!("expected outerHTML string, got {}", other))),
        }
    }

    async fn visible_text(&mut self) -> Result<String, BrowserError> {
        match self.evaluate(INNER_TEXT_SCRIPT).await? {
            serde_json::Value::String(text) => Ok(text),
            other => Err(BrowserError::Evaluation(format!("expected innerText string, got {}", other))),
        }
    }

    async fn title(&mut self) -> Result<String, BrowserError>;

    async fn url(&mut self) -> Result<String, BrowserError>;

    async fn set_extra_headers(&mut self, headers: &BTreeMap<String, String>) -> Result<(), BrowserError>;

    async fn set_viewport(&mut self, viewport: Viewport) -> Result<(), BrowserError>;

    async fn add_init_script(&mut self, script: &str) -> Result<(), BrowserError>;

    /// Tells the runtime this session is burned and should be retired.
    async fn mark_session_unhealthy(&mut self);
}

/// Human-visible text of an HTML snapshot: body text without script/style contents.
pub fn snapshot_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Some(body) = document.select(&BODY_SELECTOR).next() else {
        return String::new();
    };

    let mut parts = Vec::new();
    for node in body.descendants() {
        if let Node::Text(text) = node.value() {
            let hidden = node.ancestors().any(|a| {
                matches!(a.value(), Node::Element(el) if matches!(el.name(), "script" | "style" | "noscript" | "template"))
            });
            let trimmed = text.trim();
            if !hidden && !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        }
    }
    parts.join("\n")
}

/// Text of the `<title>` element of an HTML snapshot.
pub fn snapshot_title(html: &str) -> String {
    let document = Html::parse_document(html);
    Selector::parse("title")
        .ok()
        .and_then(|selector| document.select(&selector).next().map(|t| t.text().collect::<String>()))
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_text_skips_scripts() {
        let html = r#"<html><head><title> Results </title><style>p{}</style></head>
            <body><p>Hello</p><script>var captcha = 1;</script><div> world </div></body></html>"#;
        assert_eq!(snapshot_text(html), "Hello\nworld");
        assert_eq!(snapshot_title(html), "Results");
    }
}
