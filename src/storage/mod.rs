// src/storage/mod.rs
use crate::config::RunConfig;
use crate::extractors::Record;
use crate::traversal::RunSummary;
use crate::utils::error::StorageError;
use async_trait::async_trait;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Durable destination for accepted records.
#[async_trait]
pub trait RecordSink: Send {
    async fn push(&mut self, record: &Record) -> Result<(), StorageError>;
}

/// Lowercase, dash-separated directory name for a search keyword.
pub fn keyword_slug(keyword: &str) -> String {
    let mut slug = String::with_capacity(keyword.len());
    for c in keyword.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "search".to_string()
    } else {
        slug
    }
}

/// Appends records as JSON lines to `<base>/<keyword-slug>/gigs-<timestamp>.jsonl`.
pub struct JsonlStorage {
    run_dir: PathBuf,
    file_path: PathBuf,
    file: fs::File,
    written: usize,
}

impl JsonlStorage {
    pub fn create<P: AsRef<Path>>(base_dir: P, keyword: &str) -> Result<Self, StorageError> {
        // Create a directory structure like: /base_dir/keyword-slug/
        let run_dir = base_dir.as_ref().join(keyword_slug(keyword));
        if !run_dir.exists() {
            fs::create_dir_all(&run_dir).map_err(StorageError::IoError)?;
        }

        // One records file per run, appended to as pages are extracted
        let filename = format!("gigs-{}.jsonl", chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ"));
        let file_path = run_dir.join(filename);
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .map_err(StorageError::IoError)?;

        tracing::info!("Writing records to {}", file_path.display());
        Ok(Self { run_dir, file_path, file, written: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Writes `run.json` next to the records file describing how the run went.
    pub fn save_run_metadata(
        &self,
        config: &RunConfig,
        summary: Option<&RunSummary>,
        error: Option<&str>,
    ) -> Result<PathBuf, StorageError> {
        let file_path = self.run_dir.join("run.json");

        // Create metadata structure
        let metadata = serde_json::json!({
            "keyword": config.keyword,
            "min_reviews": config.min_reviews,
            "max_reviews": config.max_reviews,
            "pages": config.pages,
            "sort_by": config.sort_by.as_query(),
            "status": if error.is_none() { "completed" } else { "failed" },
            "error": error,
            "summary": summary,
            "records_file": self.file_path.file_name().map(|n| n.to_string_lossy().into_owned()),
            "records_written": self.written,
            "finished_at": chrono::Utc::now().to_rfc3339(),
        });

        // Write the metadata to the file
        let metadata_str = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(&file_path, metadata_str).map_err(StorageError::IoError)?;

        tracing::info!("Saved run metadata to {}", file_path.display());
        Ok(file_path)
    }
}

#[async_trait]
impl RecordSink for JsonlStorage {
    async fn push(&mut self, record: &Record) -> Result<(), StorageError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        line.push('\n');
        // Flush per record so a failed run keeps what it already pushed
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.written += 1;
        Ok(())
    }
}

/// Passes through only records whose review count lies in `[min, max]`.
///
/// A record without a review count passes only when no minimum is set.
pub struct ReviewFilter<S> {
    inner: S,
    min: u32,
    max: Option<u32>,
    filtered: usize,
}

impl<S: RecordSink> ReviewFilter<S> {
    pub fn new(inner: S, min: u32, max: Option<u32>) -> Self {
        Self { inner, min, max, filtered: 0 }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn filtered(&self) -> usize {
        self.filtered
    }

    fn admits(&self, record: &Record) -> bool {
        match record.review_count {
            Some(count) => count >= self.min && self.max.map_or(true, |max| count <= max),
            None => self.min == 0,
        }
    }
}

#[async_trait]
impl<S: RecordSink> RecordSink for ReviewFilter<S> {
    async fn push(&mut self, record: &Record) -> Result<(), StorageError> {
        if !self.admits(record) {
            tracing::debug!("Filtered '{}' (reviews: {:?})", record.title, record.review_count);
            self.filtered += 1;
            return Ok(());
        }
        self.inner.push(record).await
    }
}

/// Collects records in memory; fails every push after `fail_after` successes when set.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    pub records: Vec<Record>,
    pub fail_after: Option<usize>,
}

#[cfg(test)]
#[async_trait]
impl RecordSink for MemorySink {
    async fn push(&mut self, record: &Record) -> Result<(), StorageError> {
        if self.fail_after.is_some_and(|n| self.records.len() >= n) {
            return Err(StorageError::SerializationError("sink unavailable".to_string()));
        }
        self.records.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SortBy;
    use tokio_test::assert_ok;

    fn record(title: &str, reviews: Option<u32>) -> Record {
        Record {
            id: format!("id-{}", title.len()),
            title: title.to_string(),
            link: "https://www.fiverr.com/artist/design-a-logo".to_string(),
            rating: Some(4.9),
            review_count: reviews,
            price: Some("From $25".to_string()),
            seller: Some("artist".to_string()),
            seller_level: "Level 2 Seller".to_string(),
            thumbnail: None,
            tags: vec!["logo".to_string()],
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gig_scout_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_keyword_slug() {
        assert_eq!(keyword_slug("  Logo Design!  "), "logo-design");
        assert_eq!(keyword_slug("wordpress / seo"), "wordpress-seo");
        assert_eq!(keyword_slug("***"), "search");
    }

    #[tokio::test]
    async fn test_review_filter_bounds() {
        let mut filter = ReviewFilter::new(MemorySink::default(), 10, Some(100));
        for (title, reviews) in [("few", Some(3)), ("ok", Some(10)), ("many", Some(101)), ("top", Some(100)), ("none", None)] {
            assert_ok!(filter.push(&record(title, reviews)).await);
        }
        let kept: Vec<&str> = filter.inner().records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(kept, vec!["ok", "top"]);
        assert_eq!(filter.filtered(), 3);
    }

    #[tokio::test]
    async fn test_review_filter_without_minimum_keeps_unknown_counts() {
        let mut filter = ReviewFilter::new(MemorySink::default(), 0, None);
        assert_ok!(filter.push(&record("none", None)).await);
        assert_ok!(filter.push(&record("lots", Some(40_000))).await);
        assert_eq!(filter.inner().records.len(), 2);
    }

    #[tokio::test]
    async fn test_jsonl_storage_appends_lines_and_metadata() {
        let base = scratch_dir("jsonl");
        let mut storage = JsonlStorage::create(&base, "Logo Design").unwrap();
        assert!(storage.path().starts_with(base.join("logo-design")));

        assert_ok!(storage.push(&record("first gig title", Some(12))).await);
        assert_ok!(storage.push(&record("second gig", None)).await);
        assert_eq!(storage.written(), 2);

        let contents = fs::read_to_string(storage.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["title"], "first gig title");
        assert_eq!(first["reviewCount"], 12);
        assert_eq!(first["sellerLevel"], "Level 2 Seller");

        let config = RunConfig {
            keyword: "Logo Design".to_string(),
            min_reviews: 0,
            max_reviews: None,
            pages: 2,
            sort_by: SortBy::BestSelling,
        };
        let meta_path = storage.save_run_metadata(&config, None, Some("blocked")).unwrap();
        let meta: serde_json::Value = serde_json::from_str(&fs::read_to_string(meta_path).unwrap()).unwrap();
        assert_eq!(meta["status"], "failed");
        assert_eq!(meta["records_written"], 2);
        assert_eq!(meta["sort_by"], "best_selling");

        let _ = fs::remove_dir_all(&base);
    }
}
