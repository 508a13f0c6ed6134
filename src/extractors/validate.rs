// src/extractors/validate.rs
//! Per-field acceptance rules. A rejected required field discards the whole candidate.

use crate::extractors::normalize::{absolutize_url, clean_text, is_listing_url};
use crate::extractors::record::Field;
use crate::utils::error::Rejection;
use once_cell::sync::Lazy;
use regex::Regex;

pub const RATING_MIN: f64 = 1.0;
pub const RATING_MAX: f64 = 5.0;
pub const REVIEW_COUNT_MAX: u32 = 50_000;
pub const PRICE_MAX: f64 = 10_000.0;
pub const SELLER_MAX_LEN: usize = 50;
pub const BASELINE_SELLER_LEVEL: &str = "New Seller";

static FIRST_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+(?:[.,]\d+)?").expect("Failed to compile FIRST_NUMBER_RE")
});

// "1.2k", "3k+"
static THOUSANDS_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*k\b").expect("Failed to compile THOUSANDS_SUFFIX_RE")
});

// Digit groups joined by separators ("1,234", "12.500", "1 234") or a plain run of digits.
static GROUPED_COUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{1,3}(?:[,.\u{a0}\u{202f}]\d{3})+|\d+").expect("Failed to compile GROUPED_COUNT_RE")
});

static PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<pre>[$€£¥₹])\s?(?P<amount>\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|\d+(?:[.,]\d{1,2})?)|(?P<amount2>\d{1,3}(?:[.,]\d{3})*(?:,\d{1,2})?)\s?(?P<post>[€£])")
        .expect("Failed to compile PRICE_RE")
});

/// A value that passed its field's acceptance rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Accepted {
    Text(String),
    Rating(f64),
    Count(u32),
}

/// First numeric substring in the text, accepting `,` as a decimal mark.
fn first_number(text: &str) -> Option<f64> {
    let found = FIRST_NUMBER_RE.find(text)?;
    found.as_str().replace(',', ".").parse::<f64>().ok()
}

/// Rating in [1.0, 5.0], rounded to one decimal. Zero counts as missing, not as a rating.
pub fn parse_rating(text: &str) -> Result<f64, Rejection> {
    let value = first_number(text).ok_or_else(|| Rejection::Malformed(text.to_string()))?;
    if value == 0.0 {
        return Err(Rejection::Missing);
    }
    if !(RATING_MIN..=RATING_MAX).contains(&value) {
        return Err(Rejection::OutOfRange(value.to_string()));
    }
    Ok((value * 10.0).round() / 10.0)
}

/// Review count in (0, 50000]. Thousands separators are stripped, so "(1,234)" is 1234,
/// and a `k` suffix multiplies by one thousand.
pub fn parse_review_count(text: &str) -> Result<u32, Rejection> {
    let count = if let Some(caps) = THOUSANDS_SUFFIX_RE.captures(text) {
        let base = caps[1].replace(',', ".").parse::<f64>()
            .map_err(|_| Rejection::Malformed(text.to_string()))?;
        (base * 1000.0).round() as u64
    } else {
        let digits: String = GROUPED_COUNT_RE
            .find(text)
            .ok_or_else(|| Rejection::Malformed(text.to_string()))?
            .as_str()
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        digits.parse::<u64>().map_err(|_| Rejection::Malformed(text.to_string()))?
    };
    if count == 0 {
        return Err(Rejection::Missing);
    }
    if count > u64::from(REVIEW_COUNT_MAX) {
        return Err(Rejection::OutOfRange(count.to_string()));
    }
    Ok(count as u32)
}

// "1,200" groups thousands; "12,50" is a decimal comma.
fn prefixed_amount_value(amount: &str) -> String {
    match amount.rsplit_once(',') {
        Some((whole, cents)) if cents.len() <= 2 => format!("{}.{}", whole.replace(',', ""), cents),
        _ => amount.replace(',', ""),
    }
}

/// Price with a currency glyph and an amount in (0, 10000), normalized to `From <glyph><amount>`.
pub fn parse_price(text: &str) -> Result<String, Rejection> {
    let text = clean_text(text);
    let caps = PRICE_RE.captures(&text).ok_or_else(|| Rejection::Malformed(text.clone()))?;

    let (glyph, amount_text, amount) = if let (Some(glyph), Some(amount)) = (caps.name("pre"), caps.name("amount")) {
        (glyph.as_str(), amount.as_str().to_string(), prefixed_amount_value(amount.as_str()))
    } else if let (Some(glyph), Some(amount)) = (caps.name("post"), caps.name("amount2")) {
        // Euro-style "1.200,50 €": dots group thousands, comma is the decimal mark.
        let value = amount.as_str().replace('.', "").replace(',', ".");
        (glyph.as_str(), amount.as_str().to_string(), value)
    } else {
        return Err(Rejection::Malformed(text));
    };

    let amount = amount.parse::<f64>().map_err(|_| Rejection::Malformed(text.clone()))?;
    if amount <= 0.0 || amount >= PRICE_MAX {
        return Err(Rejection::OutOfRange(amount.to_string()));
    }
    Ok(format!("From {}{}", glyph, amount_text))
}

/// Maps free-form level text to a known label, falling back to the baseline level.
pub fn normalize_seller_level(text: &str) -> String {
    let lower = clean_text(text).to_lowercase();
    let label = if lower.contains("top rated") {
        "Top Rated Seller"
    } else if lower.contains("level 2") || lower.contains("level two") {
        "Level 2 Seller"
    } else if lower.contains("level 1") || lower.contains("level one") {
        "Level 1 Seller"
    } else if lower.split(|c: char| !c.is_alphanumeric()).any(|w| w == "pro") {
        "Pro Seller"
    } else {
        BASELINE_SELLER_LEVEL
    };
    label.to_string()
}

#[derive(Debug, Clone)]
pub struct Validator {
    min_title_len: usize,
}

impl Validator {
    pub fn new(min_title_len: usize) -> Self {
        Self { min_title_len }
    }

    pub fn validate(&self, field: Field, raw: &str) -> Result<Accepted, Rejection> {
        match field {
            Field::Id => {
                let id = raw.trim();
                if id.is_empty() {
                    return Err(Rejection::Missing);
                }
                Ok(Accepted::Text(id.to_string()))
            }
            Field::Title => {
                let title = clean_text(raw);
                let len = title.chars().count();
                if len < self.min_title_len {
                    return Err(Rejection::TooShort { len, min: self.min_title_len });
                }
                Ok(Accepted::Text(title))
            }
            Field::Link => {
                if !is_listing_url(raw) {
                    return Err(Rejection::Malformed(raw.to_string()));
                }
                absolutize_url(raw)
                    .map(Accepted::Text)
                    .ok_or_else(|| Rejection::Malformed(raw.to_string()))
            }
            Field::Rating => parse_rating(raw).map(Accepted::Rating),
            Field::ReviewCount => parse_review_count(raw).map(Accepted::Count),
            Field::Price => parse_price(raw).map(Accepted::Text),
            Field::Seller => {
                let seller = clean_text(raw);
                let seller = seller.strip_prefix("by ").unwrap_or(&seller).to_string();
                let len = seller.chars().count();
                if len <= 1 {
                    return Err(Rejection::TooShort { len, min: 2 });
                }
                if len >= SELLER_MAX_LEN {
                    return Err(Rejection::OutOfRange(format!("length {}", len)));
                }
                Ok(Accepted::Text(seller))
            }
            Field::SellerLevel => Ok(Accepted::Text(normalize_seller_level(raw))),
            Field::Thumbnail => absolutize_url(raw)
                .map(Accepted::Text)
                .ok_or_else(|| Rejection::Malformed(raw.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_parsing() {
        assert_eq!(parse_rating("4.7 out of 5"), Ok(4.7));
        assert_eq!(parse_rating("Rated 4,96"), Ok(5.0));
        assert_eq!(parse_rating("5"), Ok(5.0));
        assert_eq!(parse_rating("0 stars"), Err(Rejection::Missing));
        assert!(matches!(parse_rating("0.5"), Err(Rejection::OutOfRange(_))));
        assert!(matches!(parse_rating("7.1"), Err(Rejection::OutOfRange(_))));
        assert!(matches!(parse_rating("New"), Err(Rejection::Malformed(_))));
    }

    #[test]
    fn test_review_count_strips_thousands_separators() {
        assert_eq!(parse_review_count("(1,234)"), Ok(1234));
        assert_eq!(parse_review_count("(87)"), Ok(87));
        assert_eq!(parse_review_count("12.500 reviews"), Ok(12500));
        assert_eq!(parse_review_count("(1k+)"), Ok(1000));
        assert_eq!(parse_review_count("2.5k"), Ok(2500));
        assert_eq!(parse_review_count("(0)"), Err(Rejection::Missing));
        assert!(matches!(parse_review_count("(60,000)"), Err(Rejection::OutOfRange(_))));
        assert!(matches!(parse_review_count("()"), Err(Rejection::Malformed(_))));
    }

    #[test]
    fn test_price_rules() {
        assert_eq!(parse_price("$45"), Ok("From $45".to_string()));
        assert_eq!(parse_price("From $45"), Ok("From $45".to_string()));
        assert_eq!(parse_price("Starting at  US$1,200"), Ok("From $1,200".to_string()));
        assert_eq!(parse_price("From €12.50"), Ok("From €12.50".to_string()));
        assert_eq!(parse_price("25 €"), Ok("From €25".to_string()));
        assert_eq!(parse_price("€12,50"), Ok("From €12,50".to_string()));
        assert_eq!(parse_price("£0,99"), Ok("From £0,99".to_string()));
        assert!(matches!(parse_price("€0,00"), Err(Rejection::OutOfRange(_))));
        assert!(matches!(parse_price("$0"), Err(Rejection::OutOfRange(_))));
        assert!(matches!(parse_price("$10,000"), Err(Rejection::OutOfRange(_))));
        assert!(matches!(parse_price("45"), Err(Rejection::Malformed(_))));
    }

    #[test]
    fn test_seller_level_defaults_to_baseline() {
        assert_eq!(normalize_seller_level("Top Rated"), "Top Rated Seller");
        assert_eq!(normalize_seller_level("Level 2 seller"), "Level 2 Seller");
        assert_eq!(normalize_seller_level("Pro"), "Pro Seller");
        assert_eq!(normalize_seller_level("Programming"), BASELINE_SELLER_LEVEL);
        assert_eq!(normalize_seller_level(""), BASELINE_SELLER_LEVEL);
    }

    #[test]
    fn test_validator_text_fields() {
        let validator = Validator::new(10);
        assert_eq!(
            validator.validate(Field::Title, "I will design a &amp; logo"),
            Ok(Accepted::Text("I will design a & logo".to_string()))
        );
        assert_eq!(
            validator.validate(Field::Title, "Logo"),
            Err(Rejection::TooShort { len: 4, min: 10 })
        );
        assert_eq!(
            validator.validate(Field::Link, "/jane_doe/design-a-logo"),
            Ok(Accepted::Text("https://www.fiverr.com/jane_doe/design-a-logo".to_string()))
        );
        assert!(validator.validate(Field::Link, "/categories/logo-design").is_err());
        assert_eq!(validator.validate(Field::Seller, "by jane_doe"), Ok(Accepted::Text("jane_doe".to_string())));
        assert!(validator.validate(Field::Seller, "j").is_err());
        assert!(validator.validate(Field::Seller, &"x".repeat(50)).is_err());
        assert_eq!(
            validator.validate(Field::Thumbnail, "//cdn.example.net/t.jpg"),
            Ok(Accepted::Text("https://cdn.example.net/t.jpg".to_string()))
        );
    }
}
