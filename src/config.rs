// src/config.rs
use crate::utils::AppError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::form_urlencoded;

/// Fixed origin every relative listing link and thumbnail is resolved against.
pub const SITE_ORIGIN: &str = "https://www.fiverr.com";
const SEARCH_PATH: &str = "/search/gigs";

/// Sort orders the search page understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Relevance,
    BestSelling,
    #[serde(alias = "new")]
    Newest,
}

impl SortBy {
    /// Value of the `sort_by` query parameter.
    pub fn as_query(self) -> &'static str {
        match self {
            SortBy::Relevance => "relevance",
            SortBy::BestSelling => "best_selling",
            SortBy::Newest => "new",
        }
    }
}

fn default_pages() -> u32 {
    1
}

/// Parameters supplied at run start, either from CLI flags or a JSON input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub keyword: String,
    #[serde(default)]
    pub min_reviews: u32,
    #[serde(default)]
    pub max_reviews: Option<u32>,
    #[serde(default = "default_pages")]
    pub pages: u32,
    #[serde(default)]
    pub sort_by: SortBy,
}

impl RunConfig {
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let config: RunConfig = serde_json::from_str(raw)
            .map_err(|e| AppError::Config(format!("Invalid run configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.keyword.trim().is_empty() {
            return Err(AppError::Config("keyword must not be empty".to_string()));
        }
        if self.pages == 0 {
            return Err(AppError::Config("pages must be at least 1".to_string()));
        }
        if let Some(max) = self.max_reviews {
            if max < self.min_reviews {
                return Err(AppError::Config(format!(
                    "maxReviews ({}) is below minReviews ({})",
                    max, self.min_reviews
                )));
            }
        }
        Ok(())
    }

    /// Search results URL for a 1-based page number.
    pub fn search_url(&self, page: u32) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("query", self.keyword.trim());
        query.append_pair("source", "top-bar");
        query.append_pair("search_in", "everywhere");
        if self.sort_by != SortBy::Relevance {
            query.append_pair("sort_by", self.sort_by.as_query());
        }
        if page > 1 {
            query.append_pair("page", &page.to_string());
        }
        format!("{}{}?{}", SITE_ORIGIN, SEARCH_PATH, query.finish())
    }
}

/// Whether every field must resolve for a candidate to count as a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Title, link, rating, review count, price and thumbnail are all required.
    #[default]
    Strict,
    /// Only title and link are required; other fields are kept when valid.
    Permissive,
}

#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub strictness: Strictness,
    pub min_title_len: usize,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            strictness: Strictness::Strict,
            min_title_len: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TraversalSettings {
    /// Timeout for each load-state wait and for the container selector wait.
    pub load_timeout: Duration,
    /// Fixed delay after load so deferred rendering can finish.
    pub settle_delay: Duration,
    /// Randomized pause before following the next-page affordance.
    pub pace_min: Duration,
    pub pace_max: Duration,
    /// Where to save annotated snapshots of pages that produced no records.
    pub debug_dir: Option<PathBuf>,
}

impl Default for TraversalSettings {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_millis(2_000),
            pace_min: Duration::from_millis(2_000),
            pace_max: Duration::from_millis(5_000),
            debug_dir: None,
        }
    }
}
