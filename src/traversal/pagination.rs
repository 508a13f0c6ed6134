// src/traversal/pagination.rs
use crate::extractors::normalize::absolutize_url;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

// "Next page" controls, most specific first.
const NEXT_CASCADE: &[&str] = &[
    "a[rel='next']",
    "li.pagination-arrows a[aria-label='Next']",
    "[data-testid='pagination-next']",
    "a[aria-label='Next page']",
    "button[aria-label='Next page']",
    "a[aria-label='Next']",
    "button[aria-label='Next']",
    ".pagination li.next a",
    ".pagination a.next",
    "a.pagination-next",
];

static NEXT_SELECTORS: Lazy<Vec<(&'static str, Selector)>> = Lazy::new(|| {
    NEXT_CASCADE
        .iter()
        .filter_map(|raw| Selector::parse(raw).ok().map(|s| (*raw, s)))
        .collect()
});

/// A usable "next page" control found on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextAffordance {
    pub selector: &'static str,
    /// Absolute target when the control is a link; `None` for script-driven buttons.
    pub href: Option<String>,
}

fn has_disabled_class(element: ElementRef<'_>) -> bool {
    element.value().classes().any(|c| c.to_ascii_lowercase().contains("disabled"))
}

/// Disabled through the `disabled` attribute, `aria-disabled`, or a disabled-style class on
/// the control or its list item.
fn is_disabled(element: ElementRef<'_>) -> bool {
    let attrs = element.value();
    if attrs.attr("disabled").is_some() || attrs.attr("aria-disabled") == Some("true") {
        return true;
    }
    if has_disabled_class(element) {
        return true;
    }
    element
        .parent()
        .and_then(ElementRef::wrap)
        .map(|parent| parent.value().name() == "li" && has_disabled_class(parent))
        .unwrap_or(false)
}

fn resolve_href(href: &str, current_url: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }
    match Url::parse(current_url) {
        Ok(base) => base.join(href).ok().map(String::from),
        Err(_) => absolutize_url(href),
    }
}

/// Probes the page snapshot for an enabled next-page control.
pub fn find_next(html: &str, current_url: &str) -> Option<NextAffordance> {
    let document = Html::parse_document(html);
    for (raw, selector) in NEXT_SELECTORS.iter() {
        let candidate = document.select(selector).find(|el| !is_disabled(*el));
        if let Some(element) = candidate {
            let href = element.value().attr("href").and_then(|h| resolve_href(h, current_url));
            tracing::debug!("Next-page control found via '{}' (href: {:?})", raw, href);
            return Some(NextAffordance { selector: raw, href });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURRENT: &str = "https://www.fiverr.com/search/gigs?query=logo";

    #[test]
    fn test_next_link_is_resolved_against_current_url() {
        let html = r#"<nav class="pagination"><a rel="next" href="/search/gigs?query=logo&amp;page=2">Next</a></nav>"#;
        let next = find_next(html, CURRENT).unwrap();
        assert_eq!(next.selector, "a[rel='next']");
        assert_eq!(next.href.as_deref(), Some("https://www.fiverr.com/search/gigs?query=logo&page=2"));
    }

    #[test]
    fn test_disabled_controls_are_ignored() {
        let html = r#"<ul class="pagination">
            <li class="next disabled"><a href="/search/gigs?page=4">Next</a></li>
          </ul>
          <button aria-label="Next page" disabled>Next</button>
          <a aria-label="Next" aria-disabled="true" href="/x">Next</a>
          <a class="pagination-next is-disabled" href="/y">Next</a>"#;
        assert_eq!(find_next(html, CURRENT), None);
    }

    #[test]
    fn test_button_without_href_still_counts() {
        let html = r#"<button aria-label="Next page">›</button>"#;
        let next = find_next(html, CURRENT).unwrap();
        assert_eq!(next.href, None);
        assert_eq!(next.selector, "button[aria-label='Next page']");
    }

    #[test]
    fn test_no_control_means_no_next() {
        assert_eq!(find_next("<p>Page 3 of 3</p>", CURRENT), None);
    }
}
