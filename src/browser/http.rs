// src/browser/http.rs
//! Static-fetch session over reqwest, for runs without a headless browser.
//! Pages are not rendered: load waits resolve at once and scripts never run.

use crate::browser::{snapshot_text, snapshot_title, BrowserSession, LoadState, PageRequest, Viewport};
use crate::utils::error::BrowserError;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::time::Duration;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
];
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

fn pick_user_agent() -> &'static str {
    USER_AGENTS.choose(&mut rand::thread_rng()).copied().unwrap_or(USER_AGENTS[0])
}

/// Creates a reqwest client with its own cookie jar and the given user agent.
fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .cookie_store(true)
        .timeout(timeout)
        .build()
}

pub struct HttpSession {
    client: reqwest::Client,
    user_agent: &'static str,
    timeout: Duration,
    extra_headers: HeaderMap,
    current_url: Option<String>,
    body: String,
    retired: u32,
}

impl HttpSession {
    pub fn new() -> Result<Self, BrowserError> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    /// Session whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, BrowserError> {
        let user_agent = pick_user_agent();
        Ok(Self {
            client: build_client(user_agent, timeout)?,
            user_agent,
            timeout,
            extra_headers: HeaderMap::new(),
            current_url: None,
            body: String::new(),
            retired: 0,
        })
    }
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn navigate(&mut self, request: &PageRequest) -> Result<(), BrowserError> {
        tracing::info!("Fetching {:?}: {}", request.label, request.url);
        tracing::debug!("Using User-Agent: {}", self.user_agent);

        // Forget the previous page so a failed fetch can never be read as this one
        self.current_url = None;
        self.body.clear();

        let response = self
            .client
            .get(&request.url)
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .headers(self.extra_headers.clone())
            .send()
            .await
            .map_err(|e| {
                // A static fetch that timed out has no partial page to fall back on
                if e.is_timeout() {
                    BrowserError::Navigation(format!("GET {} timed out after {:?}", request.url, self.timeout))
                } else {
                    BrowserError::Network(e)
                }
            })?;

        let status = response.status();
        self.current_url = Some(response.url().to_string());
        // Block pages often come back as 403/429 with a challenge body; keep it for block detection.
        if !status.is_success() && status != reqwest::StatusCode::FORBIDDEN && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::error!("HTTP error status: {} for URL: {}", status, request.url);
            return Err(BrowserError::Http(status));
        }

        self.body = response.text().await?;
        tracing::debug!("Fetched {} bytes (status {}) from {}", self.body.len(), status, request.url);
        Ok(())
    }

    async fn wait_for_load_state(&mut self, state: LoadState, _timeout: Duration) -> Result<(), BrowserError> {
        tracing::trace!("Static document is already at {}", state);
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let parsed = Selector::parse(selector)
            .map_err(|e| BrowserError::Evaluation(format!("invalid selector '{}': {}", selector, e)))?;
        let present = Html::parse_document(&self.body).select(&parsed).next().is_some();
        if present {
            Ok(())
        } else {
            Err(BrowserError::Timeout { operation: format!("wait for '{}'", selector), after: timeout })
        }
    }

    async fn evaluate(&mut self, _script: &str) -> Result<serde_json::Value, BrowserError> {
        Err(BrowserError::Unsupported("evaluate on a static HTTP session"))
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        Ok(self.body.clone())
    }

    async fn visible_text(&mut self) -> Result<String, BrowserError> {
        Ok(snapshot_text(&self.body))
    }

    async fn title(&mut self) -> Result<String, BrowserError> {
        Ok(snapshot_title(&self.body))
    }

    async fn url(&mut self) -> Result<String, BrowserError> {
        self.current_url
            .clone()
            .ok_or_else(|| BrowserError::Navigation("no page loaded yet".to_string()))
    }

    async fn set_extra_headers(&mut self, headers: &BTreeMap<String, String>) -> Result<(), BrowserError> {
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| BrowserError::Navigation(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| BrowserError::Navigation(format!("invalid header value for '{}': {}", name, e)))?;
            self.extra_headers.insert(name, value);
        }
        Ok(())
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> Result<(), BrowserError> {
        tracing::trace!("Viewport {}x{} has no effect on a static session", viewport.width, viewport.height);
        Ok(())
    }

    async fn add_init_script(&mut self, _script: &str) -> Result<(), BrowserError> {
        Err(BrowserError::Unsupported("init scripts on a static HTTP session"))
    }

    /// Retires the client: fresh cookie jar and a different user agent.
    async fn mark_session_unhealthy(&mut self) {
        self.retired += 1;
        let next = USER_AGENTS
            .iter()
            .copied()
            .find(|ua| *ua != self.user_agent)
            .unwrap_or(self.user_agent);
        match build_client(next, self.timeout) {
            Ok(client) => {
                self.client = client;
                self.user_agent = next;
                tracing::warn!("Session retired ({} so far); rotated client and user agent", self.retired);
            }
            Err(e) => tracing::error!("Failed to rebuild HTTP client after retiring session: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const PAGE_ONE: &str = "<html><head><title>Results</title></head><body><p class=\"gig\">PAGE ONE</p></body></html>";

    /// Serves PAGE_ONE for every path except `/slow`, which never answers.
    async fn spawn_site() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    if String::from_utf8_lossy(&buf[..n]).starts_with("GET /slow") {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        return;
                    }
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        PAGE_ONE.len(),
                        PAGE_ONE
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_serves_snapshot() {
        let site = spawn_site().await;
        let mut session = HttpSession::with_timeout(Duration::from_millis(500)).unwrap();

        session.navigate(&PageRequest::search_page(format!("{}/p1", site), 1)).await.unwrap();

        assert_eq!(session.url().await.unwrap(), format!("{}/p1", site));
        assert!(session.content().await.unwrap().contains("PAGE ONE"));
        assert_eq!(session.visible_text().await.unwrap(), "PAGE ONE");
        assert_eq!(session.title().await.unwrap(), "Results");
        assert!(session.wait_for_selector("p.gig", Duration::from_millis(10)).await.is_ok());
        let missing = session.wait_for_selector("div.card", Duration::from_millis(10)).await.unwrap_err();
        assert!(missing.is_timeout());
    }

    #[tokio::test]
    async fn test_timed_out_fetch_does_not_keep_previous_page() {
        let site = spawn_site().await;
        let mut session = HttpSession::with_timeout(Duration::from_millis(300)).unwrap();
        session.navigate(&PageRequest::search_page(format!("{}/p1", site), 1)).await.unwrap();

        let err = session
            .navigate(&PageRequest::search_page(format!("{}/slow", site), 2))
            .await
            .unwrap_err();

        assert!(!err.is_timeout());
        assert!(matches!(err, BrowserError::Navigation(_)));
        assert!(session.url().await.is_err());
        assert_eq!(session.content().await.unwrap(), "");
    }
}
