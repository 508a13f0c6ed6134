// src/extractors/normalize.rs
//! Text and URL normalization shared by the validator and the record builder.
//! Every function here is a fixed point: applying it to its own output changes nothing.

use crate::config::SITE_ORIGIN;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});")
        .expect("Failed to compile ENTITY_RE")
});

// Path of a single listing: /<seller>/<listing-slug>
static LISTING_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/[A-Za-z0-9_.\-]+/[A-Za-z0-9_\-]+/?$").expect("Failed to compile LISTING_PATH_RE")
});

// First path segments that are site sections, never sellers.
const RESERVED_SEGMENTS: &[&str] = &[
    "search", "categories", "support", "pages", "cp", "login", "join", "resources",
    "levels", "inbox", "start_selling", "hc", "stores", "gig_page_perseus", "users",
];

fn decode_entity(entity: &str) -> Option<String> {
    if let Some(num) = entity.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let decoded = match entity {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "rsquo" => "\u{2019}",
        "lsquo" => "\u{2018}",
        "rdquo" => "\u{201d}",
        "ldquo" => "\u{201c}",
        "euro" => "\u{20ac}",
        "pound" => "\u{a3}",
        "yen" => "\u{a5}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        _ => return None,
    };
    Some(decoded.to_string())
}

/// Decodes HTML entities until none are left, so double-escaped text (`&amp;amp;`) ends up plain.
pub fn decode_entities(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = ENTITY_RE
            .replace_all(&current, |caps: &regex::Captures| {
                decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}

pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Entity-decoded, whitespace-collapsed free text.
pub fn clean_text(input: &str) -> String {
    collapse_whitespace(&decode_entities(input))
}

fn is_unusable_href(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("data:")
}

/// Rewrites protocol-relative and relative references against the site origin.
fn absolutize(raw: &str) -> Option<Url> {
    let href = decode_entities(raw.trim());
    if is_unusable_href(&href) {
        return None;
    }
    let absolute = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else if href.starts_with("http://") || href.starts_with("https://") {
        href
    } else if href.starts_with('/') {
        format!("{}{}", SITE_ORIGIN, href)
    } else {
        format!("{}/{}", SITE_ORIGIN, href)
    };
    let url = Url::parse(&absolute).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Absolute http(s) form of a link or image reference; inline `data:` placeholders are refused.
pub fn absolutize_url(raw: &str) -> Option<String> {
    absolutize(raw).map(String::from)
}

fn site_host() -> Option<String> {
    Url::parse(SITE_ORIGIN).ok()?.host_str().map(|h| h.trim_start_matches("www.").to_string())
}

/// True when `href` points at a single listing on the target site.
pub fn is_listing_url(href: &str) -> bool {
    let Some(url) = absolutize(href) else {
        return false;
    };
    let Some(site) = site_host() else {
        return false;
    };
    let on_site = url
        .host_str()
        .map(|host| host == site || host.ends_with(&format!(".{}", site)))
        .unwrap_or(false);
    if !on_site || !LISTING_PATH_RE.is_match(url.path()) {
        return false;
    }
    let first_segment = url.path().trim_start_matches('/').split('/').next().unwrap_or("");
    !RESERVED_SEGMENTS.contains(&first_segment)
}
