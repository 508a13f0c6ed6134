// src/extractors/builder.rs
use crate::extractors::normalize::{absolutize_url, clean_text};
use crate::extractors::record::{Field, Record};
use crate::extractors::validate::{normalize_seller_level, Accepted, BASELINE_SELLER_LEVEL};
use rand::distributions::Alphanumeric;
use rand::Rng;

pub const MAX_TAGS: usize = 4;

// Topical labels matched against listing titles.
const TOPIC_VOCABULARY: &[&str] = &[
    "Logo", "Branding", "Illustration", "Website", "WordPress", "Shopify", "SEO",
    "Marketing", "Social Media", "Video", "Animation", "Voice Over", "Writing",
    "Translation", "Mobile App", "Python", "Data", "AI", "Podcast", "Music",
];

/// Identifiers a container carries, plus its position on the page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerId {
    pub primary: Option<String>,
    pub alternate: Option<String>,
    pub index: usize,
}

/// Validated field values for one candidate, before normalization into a [`Record`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues {
    pub title: String,
    pub link: String,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub price: Option<String>,
    pub seller: Option<String>,
    pub seller_level: Option<String>,
    pub thumbnail: Option<String>,
}

impl FieldValues {
    pub fn set(&mut self, field: Field, value: Accepted) {
        match (field, value) {
            (Field::Title, Accepted::Text(v)) => self.title = v,
            (Field::Link, Accepted::Text(v)) => self.link = v,
            (Field::Rating, Accepted::Rating(v)) => self.rating = Some(v),
            (Field::ReviewCount, Accepted::Count(v)) => self.review_count = Some(v),
            (Field::Price, Accepted::Text(v)) => self.price = Some(v),
            (Field::Seller, Accepted::Text(v)) => self.seller = Some(v),
            (Field::SellerLevel, Accepted::Text(v)) => self.seller_level = Some(v),
            (Field::Thumbnail, Accepted::Text(v)) => self.thumbnail = Some(v),
            (field, value) => tracing::warn!("Ignoring {:?} for field {}", value, field),
        }
    }
}

impl From<&Record> for FieldValues {
    fn from(record: &Record) -> Self {
        Self {
            title: record.title.clone(),
            link: record.link.clone(),
            rating: record.rating,
            review_count: record.review_count,
            price: record.price.clone(),
            seller: record.seller.clone(),
            seller_level: Some(record.seller_level.clone()),
            thumbnail: record.thumbnail.clone(),
        }
    }
}

/// Capitalized words of the search keyword: "logo design" -> ["Logo", "Design"].
pub fn keyword_tags(keyword: &str) -> Vec<String> {
    keyword
        .split(|c: char| c.is_whitespace() || c == ',' || c == '+')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect()
}

fn title_mentions(title_words: &[String], label: &str) -> bool {
    let label_words: Vec<String> = label.split(' ').map(str::to_lowercase).collect();
    title_words
        .windows(label_words.len())
        .any(|window| window == label_words.as_slice())
}

/// Keyword words first, then vocabulary labels found in the title; no duplicates, at most four.
pub fn derive_tags(keyword: &str, title: &str) -> Vec<String> {
    let title_words: Vec<String> = title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    let vocabulary_hits = TOPIC_VOCABULARY
        .iter()
        .filter(|label| title_mentions(&title_words, label))
        .map(|label| label.to_string());

    let mut tags: Vec<String> = Vec::with_capacity(MAX_TAGS);
    for tag in keyword_tags(keyword).into_iter().chain(vocabulary_hits) {
        if tags.len() == MAX_TAGS {
            break;
        }
        if !tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            tags.push(tag);
        }
    }
    tags
}

/// `gig-<millis>-<index>-<random>`, for containers without a usable source id.
pub fn synthesize_id(index: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("gig-{}-{}-{}", chrono::Utc::now().timestamp_millis(), index, suffix)
}

fn pick_id(ids: &ContainerId) -> String {
    [ids.primary.as_deref(), ids.alternate.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| synthesize_id(ids.index))
}

/// Normalizes accepted field values into the canonical record shape.
pub fn build(ids: &ContainerId, values: FieldValues, keyword: &str) -> Record {
    let title = clean_text(&values.title);
    let tags = derive_tags(keyword, &title);
    Record {
        id: pick_id(ids),
        link: absolutize_url(&values.link).unwrap_or(values.link),
        rating: values.rating.map(|r| (r * 10.0).round() / 10.0),
        review_count: values.review_count,
        price: values.price.map(|p| clean_text(&p)),
        seller: values.seller.map(|s| clean_text(&s)),
        seller_level: values
            .seller_level
            .map(|level| normalize_seller_level(&level))
            .unwrap_or_else(|| BASELINE_SELLER_LEVEL.to_string()),
        thumbnail: values.thumbnail.map(|t| absolutize_url(&t).unwrap_or(t)),
        title,
        tags,
    }
}
