// src/traversal/mod.rs
//! Page-by-page traversal of search results.
//!
//! Each page moves through `AwaitingLoad -> BlockCheck -> Extracting -> DecidingContinuation`,
//! which either ends the run or queues the next page. Nothing here runs concurrently: every
//! browser call is awaited before the next transition.

pub mod block;
pub mod pagination;
pub mod stealth;

use crate::browser::{BrowserSession, LoadState, PageRequest};
use crate::config::{RunConfig, TraversalSettings};
use crate::extractors::{PageExtractor, WorkingSelector};
use crate::storage::RecordSink;
use crate::utils::error::{BrowserError, TraversalError};
use crate::utils::html_debug::{create_debug_html, SNAPSHOT_PATTERNS};
use rand::Rng;
use serde::Serialize;
use std::time::Duration;

/// Pages visited so far against the configured limit. Page numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalState {
    current_page: u32,
    page_limit: u32,
}

impl TraversalState {
    pub fn new(page_limit: u32) -> Self {
        Self { current_page: 1, page_limit: page_limit.max(1) }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn limit_reached(&self) -> bool {
        self.current_page >= self.page_limit
    }

    /// Moves to the next page and returns its number.
    pub fn advance(&mut self) -> u32 {
        self.current_page += 1;
        self.current_page
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    PageLimit,
    NoNextPage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Navigating(PageRequest),
    AwaitingLoad,
    BlockCheck,
    Extracting,
    DecidingContinuation,
    Terminated(Termination),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub pages_visited: u32,
    pub records_pushed: usize,
    pub push_failures: usize,
    pub candidates_rejected: usize,
    pub termination: Termination,
}

pub struct TraversalController<'a, B: ?Sized, K: ?Sized> {
    session: &'a mut B,
    sink: &'a mut K,
    extractor: PageExtractor,
    settings: TraversalSettings,
}

impl<'a, B, K> TraversalController<'a, B, K>
where
    B: BrowserSession + ?Sized,
    K: RecordSink + ?Sized,
{
    pub fn new(session: &'a mut B, sink: &'a mut K, extractor: PageExtractor, settings: TraversalSettings) -> Self {
        Self { session, sink, extractor, settings }
    }

    pub async fn run(&mut self, config: &RunConfig) -> Result<RunSummary, TraversalError> {
        // Best-effort, a session that refuses hardening still runs
        stealth::harden_session(&mut *self.session).await;

        let mut state = TraversalState::new(config.pages);
        let mut pages_visited = 0;
        let mut records_pushed = 0;
        let mut push_failures = 0;
        let mut candidates_rejected = 0;

        // The first page is always the search URL itself
        let mut phase = Phase::Navigating(PageRequest::search_page(config.search_url(1), 1));
        let termination = loop {
            phase = match phase {
                Phase::Navigating(request) => {
                    self.navigate(&request).await?;
                    Phase::AwaitingLoad
                }
                Phase::AwaitingLoad => {
                    self.await_load().await?;
                    Phase::BlockCheck
                }
                Phase::BlockCheck => {
                    self.check_block(state.current_page()).await?;
                    Phase::Extracting
                }
                Phase::Extracting => {
                    // Page counters move only after every record went to the sink
                    let outcome = self.extract_current(state.current_page(), &config.keyword).await?;
                    pages_visited += 1;
                    records_pushed += outcome.pushed;
                    push_failures += outcome.failed;
                    candidates_rejected += outcome.rejected;
                    Phase::DecidingContinuation
                }
                Phase::DecidingContinuation => self.decide_continuation(&mut state, config).await?,
                Phase::Terminated(termination) => break termination,
            };
        };

        tracing::info!(
            "Traversal finished ({:?}): {} pages, {} records pushed, {} push failures",
            termination,
            pages_visited,
            records_pushed,
            push_failures
        );
        Ok(RunSummary { pages_visited, records_pushed, push_failures, candidates_rejected, termination })
    }

    async fn navigate(&mut self, request: &PageRequest) -> Result<(), TraversalError> {
        tracing::info!("Navigating to {} ({:?})", request.url, request.label);
        match self.session.navigate(request).await {
            Err(e) if e.is_timeout() => {
                tracing::warn!("Navigation did not settle, continuing: {}", e);
                Ok(())
            }
            other => other.map_err(TraversalError::from),
        }
    }

    async fn await_load(&mut self) -> Result<(), TraversalError> {
        let timeout = self.settings.load_timeout;
        for state in [LoadState::DomContentLoaded, LoadState::NetworkIdle] {
            let waited = self.session.wait_for_load_state(state, timeout).await;
            tolerate_timeout(waited, "load state")?;
        }

        let containers = self.extractor.container_selector_group();
        let waited = self.session.wait_for_selector(&containers, timeout).await;
        tolerate_timeout(waited, "container selector")?;

        if !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }
        Ok(())
    }

    async fn check_block(&mut self, page: u32) -> Result<(), TraversalError> {
        let text = self.session.visible_text().await?;
        if let Some(indicator) = block::detect_block(&text) {
            let title = self.session.title().await.unwrap_or_default();
            tracing::error!(
                "Block page detected on page {} ('{}', title: '{}'); retiring session",
                page,
                indicator,
                title
            );
            self.session.mark_session_unhealthy().await;
            return Err(TraversalError::Blocked { page, indicator: indicator.to_string() });
        }
        Ok(())
    }

    async fn extract_current(&mut self, page: u32, keyword: &str) -> Result<PageOutcome, TraversalError> {
        // One snapshot per page; the parsed document is dropped before the next await
        let html = self.session.content().await?;
        let extraction = self.extractor.extract_page(&html, keyword);

        // Per-field rejection counts are only observable through logs
        let stats = &extraction.stats;
        tracing::info!(
            "Page {}: {} candidates, {} accepted, {} rejected ({:?})",
            page,
            stats.candidates,
            stats.accepted,
            stats.rejected(),
            extraction.working_selector
        );
        for (field, count) in &stats.rejections {
            tracing::debug!("Page {}: {} candidates rejected on {}", page, count, field);
        }
        if extraction.working_selector == WorkingSelector::Nothing {
            tracing::warn!("Page {} had no recognizable listings", page);
        }
        if extraction.records.is_empty() {
            self.save_snapshot(page, &html);
        }

        // Push one record at a time; a failed push is counted, not fatal
        let mut outcome = PageOutcome { rejected: stats.rejected(), ..PageOutcome::default() };
        for record in &extraction.records {
            match self.sink.push(record).await {
                Ok(()) => outcome.pushed += 1,
                Err(e) => {
                    tracing::error!("Failed to push record {}: {}", record.id, e);
                    outcome.failed += 1;
                }
            }
        }
        Ok(outcome)
    }

    async fn decide_continuation(&mut self, state: &mut TraversalState, config: &RunConfig) -> Result<Phase, TraversalError> {
        if state.limit_reached() {
            tracing::info!("Reached page limit ({})", config.pages);
            return Ok(Phase::Terminated(Termination::PageLimit));
        }

        let html = self.session.content().await?;
        let current_url = self.session.url().await?;
        let Some(next) = pagination::find_next(&html, &current_url) else {
            tracing::info!("No next-page control after page {}", state.current_page());
            return Ok(Phase::Terminated(Termination::NoNextPage));
        };

        // Script-driven controls have no href, so build the next search URL instead
        let page = state.advance();
        let url = next.href.unwrap_or_else(|| config.search_url(page));

        let delay = pacing_delay(self.settings.pace_min, self.settings.pace_max);
        if !delay.is_zero() {
            tracing::debug!("Pausing {:?} before page {}", delay, page);
            tokio::time::sleep(delay).await;
        }
        Ok(Phase::Navigating(PageRequest::search_page(url, page)))
    }

    fn save_snapshot(&self, page: u32, html: &str) {
        let Some(dir) = &self.settings.debug_dir else {
            return;
        };
        let path = dir.join(format!("page-{}.html", page));
        match create_debug_html(html, &path, SNAPSHOT_PATTERNS) {
            Ok(()) => tracing::info!("Saved annotated snapshot to {}", path.display()),
            Err(e) => tracing::warn!("Failed to save snapshot for page {}: {}", page, e),
        }
    }
}

#[derive(Debug, Default)]
struct PageOutcome {
    pushed: usize,
    failed: usize,
    rejected: usize,
}

fn tolerate_timeout(result: Result<(), BrowserError>, what: &str) -> Result<(), TraversalError> {
    match result {
        Err(e) if e.is_timeout() => {
            tracing::warn!("Waiting for {} timed out, continuing: {}", what, e);
            Ok(())
        }
        other => other.map_err(TraversalError::from),
    }
}

/// Uniform random delay in `[min, max]`.
fn pacing_delay(min: Duration, max: Duration) -> Duration {
    let (low, high) = (min.as_millis() as u64, max.as_millis() as u64);
    if high <= low {
        return min;
    }
    Duration::from_millis(rand::thread_rng().gen_range(low..=high))
}
