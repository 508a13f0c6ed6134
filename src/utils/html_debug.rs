// src/utils/html_debug.rs
use regex::Regex;
use std::fs;
use std::path::Path;
use crate::utils::error::AppError;

/// Patterns highlighted in saved page snapshots: (regex, highlight kind).
pub const SNAPSHOT_PATTERNS: &[(&str, &str)] = &[
    (r#"(?i)<[a-z]+[^>]*data-gig-id=[^>]*>"#, "container"),
    (r#"(?i)<[a-z]+[^>]*class="[^"]*gig-(?:card|wrapper)[^"]*"[^>]*>"#, "container"),
    (r#"(?i)<a[^>]*rel="?next"?[^>]*>"#, "next"),
    (r#"(?i)<[a-z]+[^>]*class="[^"]*pagination[^"]*"[^>]*>"#, "next"),
    (r"(?i)captcha|access denied|security check|bot detected", "block"),
];

/// Writes `html` to `path` wrapped in a page that colors the given highlight spans.
/// Spans are (start, end, kind) byte offsets into `html`; overlapping spans are dropped.
pub fn save_debug_html(html: &str, path: &Path, highlights: &[(usize, usize, &str)]) -> Result<(), AppError> {
    let mut debug_html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<style>\n");
    debug_html.push_str(".highlight-container { outline: 2px solid #90EE90; background-color: #F0FFF0; }\n");
    debug_html.push_str(".highlight-next { background-color: #ADD8E6; }\n");
    debug_html.push_str(".highlight-block { background-color: #FF6347; }\n");
    debug_html.push_str(".highlight-custom { background-color: #FFC0CB; }\n");
    debug_html.push_str("</style>\n</head>\n<body>\n");

    let mut sorted = highlights.to_vec();
    sorted.sort_by_key(|h| h.0);

    let mut last_pos = 0;
    for (start, end, kind) in sorted {
        if start < last_pos || end > html.len() {
            continue;
        }
        debug_html.push_str(&html[last_pos..start]);

        let css_class = match kind {
            "container" => "highlight-container",
            "next" => "highlight-next",
            "block" => "highlight-block",
            _ => "highlight-custom",
        };
        debug_html.push_str(&format!(
            "<span class=\"{}\" title=\"Position: {}-{}, Type: {}\">",
            css_class, start, end, kind
        ));
        debug_html.push_str(&html[start..end]);
        debug_html.push_str("</span>");
        last_pos = end;
    }
    debug_html.push_str(&html[last_pos..]);
    debug_html.push_str("\n</body>\n</html>");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, debug_html)?;

    tracing::info!("Saved debug HTML to {}", path.display());
    Ok(())
}

/// Saves an annotated copy of a page snapshot with every match of `patterns` highlighted.
pub fn create_debug_html(html: &str, path: &Path, patterns: &[(&str, &str)]) -> Result<(), AppError> {
    let mut highlights = Vec::new();

    for (pattern, kind) in patterns {
        let re = Regex::new(pattern).map_err(|e| {
            AppError::Config(format!("Invalid regex pattern '{}': {}", pattern, e))
        })?;

        for mat in re.find_iter(html) {
            highlights.push((mat.start(), mat.end(), *kind));
        }
    }

    save_debug_html(html, path, &highlights)
}
