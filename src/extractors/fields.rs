// src/extractors/fields.rs
//! Field resolution: each field is a declarative, ordered list of lookup strategies.
//! Strategies are tried in order and the first conforming value wins; values are never
//! merged across strategies.

use crate::config::Strictness;
use crate::extractors::normalize::{absolutize_url, collapse_whitespace, is_listing_url};
use crate::extractors::record::Field;
use crate::utils::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};

static CURRENCY_AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[$€£¥₹]\s?\d|\d\s?[€£]").expect("Failed to compile CURRENCY_AMOUNT_RE")
});

/// Where a strategy looks, relative to the candidate container.
#[derive(Debug, Clone)]
pub enum Target {
    /// First descendant matching the selector.
    Descendant(Selector),
    /// The container element itself.
    Container,
    /// The container itself, only when it is a bare listing anchor.
    Anchor,
}

/// What a strategy reads from the element it found.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Text,
    Attr(String),
    /// First candidate URL of a `srcset` attribute, without its width or density descriptor.
    SrcsetFirst,
}

/// Value-shape filter. A match that does not conform sends resolution on to the next strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Any,
    Digit,
    Currency,
    ListingLink,
    ImageUrl,
}

impl Shape {
    pub fn accepts(self, value: &str) -> bool {
        match self {
            Shape::Any => true,
            Shape::Digit => value.chars().any(|c| c.is_ascii_digit()),
            Shape::Currency => CURRENCY_AMOUNT_RE.is_match(value),
            Shape::ListingLink => is_listing_url(value),
            Shape::ImageUrl => absolutize_url(value).is_some(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Strategy {
    label: String,
    target: Target,
    source: Source,
}

fn compile(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

impl Strategy {
    /// Trimmed text of the first descendant matching `selector`.
    pub fn text(selector: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            label: selector.to_string(),
            target: Target::Descendant(compile(selector)?),
            source: Source::Text,
        })
    }

    /// Attribute `attr` of the first descendant matching `selector`.
    pub fn attr(selector: &str, attr: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            label: format!("{}@{}", selector, attr),
            target: Target::Descendant(compile(selector)?),
            source: Source::Attr(attr.to_string()),
        })
    }

    /// First URL listed in the `srcset` of the first descendant matching `selector`.
    pub fn srcset(selector: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            label: format!("{}@srcset", selector),
            target: Target::Descendant(compile(selector)?),
            source: Source::SrcsetFirst,
        })
    }

    /// Text of the container, for anchor containers only. A card's full text is never a title.
    pub fn anchor_text() -> Self {
        Self {
            label: ":anchor".to_string(),
            target: Target::Anchor,
            source: Source::Text,
        }
    }

    pub fn own_attr(attr: &str) -> Self {
        Self {
            label: format!(":container@{}", attr),
            target: Target::Container,
            source: Source::Attr(attr.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn read(&self, container: ElementRef<'_>) -> Option<String> {
        let element = match &self.target {
            Target::Descendant(selector) => container.select(selector).next()?,
            Target::Container => container,
            Target::Anchor if container.value().name() == "a" => container,
            Target::Anchor => return None,
        };
        let raw = match &self.source {
            Source::Text => collapse_whitespace(&element.text().collect::<String>()),
            Source::Attr(name) => element.value().attr(name)?.trim().to_string(),
            Source::SrcsetFirst => first_srcset_url(element.value().attr("srcset")?),
        };
        (!raw.is_empty()).then_some(raw)
    }
}

// "a.jpg 1x, b.jpg 2x" -> "a.jpg"
fn first_srcset_url(srcset: &str) -> String {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Container-level attribute consulted before any strategy, when long enough.
#[derive(Debug, Clone)]
pub struct PriorityAttr {
    pub name: String,
    pub min_len: usize,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub field: Field,
    pub priority_attr: Option<PriorityAttr>,
    pub strategies: Vec<Strategy>,
    pub shape: Shape,
    pub required: bool,
}

impl FieldSpec {
    pub fn new(field: Field, shape: Shape, strategies: Vec<Strategy>) -> Self {
        Self {
            field,
            priority_attr: None,
            strategies,
            shape,
            required: false,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_priority_attr(mut self, name: &str, min_len: usize) -> Self {
        self.priority_attr = Some(PriorityAttr { name: name.to_string(), min_len });
        self
    }
}

/// Returns the first conforming value for `spec` inside `container`, or `None` when every
/// strategy is exhausted.
pub fn resolve(container: ElementRef<'_>, spec: &FieldSpec) -> Option<String> {
    if let Some(priority) = &spec.priority_attr {
        if let Some(value) = container.value().attr(&priority.name) {
            let value = collapse_whitespace(value);
            if value.chars().count() >= priority.min_len && spec.shape.accepts(&value) {
                return Some(value);
            }
        }
    }

    for strategy in &spec.strategies {
        match strategy.read(container) {
            Some(value) if spec.shape.accepts(&value) => {
                tracing::trace!("{} resolved via '{}'", spec.field, strategy.label());
                return Some(value);
            }
            Some(value) => {
                tracing::trace!("{} via '{}' rejected by shape filter: '{}'", spec.field, strategy.label(), value);
            }
            None => {}
        }
    }
    None
}

/// The full, ordered set of field specs used for one extraction pass.
#[derive(Debug, Clone)]
pub struct FieldTable {
    specs: Vec<FieldSpec>,
}

impl FieldTable {
    pub fn new(specs: Vec<FieldSpec>) -> Self {
        Self { specs }
    }

    pub fn specs(&self) -> &[FieldSpec] {
        &self.specs
    }

    pub fn spec(&self, field: Field) -> Option<&FieldSpec> {
        self.specs.iter().find(|s| s.field == field)
    }

    /// Fields that must resolve and validate for a candidate to become a record.
    pub fn required_fields(strictness: Strictness) -> &'static [Field] {
        match strictness {
            Strictness::Strict => &[
                Field::Title,
                Field::Link,
                Field::Rating,
                Field::ReviewCount,
                Field::Price,
                Field::Thumbnail,
            ],
            Strictness::Permissive => &[Field::Title, Field::Link],
        }
    }

    /// Built-in strategies for search-result listing cards, newest layouts first.
    pub fn listing_defaults(strictness: Strictness, min_title_len: usize) -> Result<Self, ExtractError> {
        let required = Self::required_fields(strictness);
        let is_required = |field: Field| required.contains(&field);

        let specs = vec![
            FieldSpec::new(Field::Id, Shape::Any, vec![
                Strategy::own_attr("data-gig-id"),
                Strategy::own_attr("data-id"),
                Strategy::attr("[data-gig-id]", "data-gig-id")?,
            ]),
            FieldSpec::new(Field::Title, Shape::Any, vec![
                Strategy::text("[data-testid='gig-title']")?,
                Strategy::text("h3")?,
                Strategy::text("p[role='heading']")?,
                Strategy::attr("a[title]", "title")?,
                Strategy::attr("img[alt]", "alt")?,
                Strategy::own_attr("title"),
                Strategy::own_attr("aria-label"),
                Strategy::anchor_text(),
            ])
            .with_priority_attr("data-gig-title", min_title_len)
            .required(is_required(Field::Title)),
            FieldSpec::new(Field::Link, Shape::ListingLink, vec![
                Strategy::attr("a[data-testid='gig-link']", "href")?,
                Strategy::attr("h3 a[href]", "href")?,
                Strategy::attr("a[href*='context_referrer']", "href")?,
                Strategy::attr("a.media[href]", "href")?,
                Strategy::attr("a[href]", "href")?,
                Strategy::own_attr("href"),
            ])
            .required(is_required(Field::Link)),
            FieldSpec::new(Field::Rating, Shape::Digit, vec![
                Strategy::text("[data-testid='rating-score']")?,
                Strategy::text(".rating-score")?,
                Strategy::text("strong[class*='rating']")?,
                Strategy::attr("[aria-label*='out of 5']", "aria-label")?,
                Strategy::attr("[aria-label*='ating']", "aria-label")?,
            ])
            .required(is_required(Field::Rating)),
            FieldSpec::new(Field::ReviewCount, Shape::Digit, vec![
                Strategy::text("[data-testid='rating-count']")?,
                Strategy::text(".rating-count-number")?,
                Strategy::text(".ratings-count")?,
                Strategy::text("span[class*='rating-count']")?,
            ])
            .required(is_required(Field::ReviewCount)),
            FieldSpec::new(Field::Price, Shape::Currency, vec![
                Strategy::text("[data-testid='price']")?,
                Strategy::text(".price-wrapper")?,
                Strategy::text("[class*='price']")?,
                Strategy::text("footer a")?,
                Strategy::text("footer")?,
            ])
            .required(is_required(Field::Price)),
            FieldSpec::new(Field::Seller, Shape::Any, vec![
                Strategy::text("[data-testid='seller-name']")?,
                Strategy::text(".seller-name a")?,
                Strategy::text(".seller-name")?,
                Strategy::text("[class*='seller-identifiers'] a")?,
            ])
            .required(is_required(Field::Seller)),
            FieldSpec::new(Field::SellerLevel, Shape::Any, vec![
                Strategy::text("[data-testid='seller-level']")?,
                Strategy::text(".level-badge")?,
                Strategy::text(".seller-level")?,
                Strategy::attr("[aria-label*='evel']", "aria-label")?,
                Strategy::text("[class*='level']")?,
            ]),
            FieldSpec::new(Field::Thumbnail, Shape::ImageUrl, vec![
                Strategy::attr("img[data-testid='gig-image']", "src")?,
                Strategy::attr("img[src]", "src")?,
                Strategy::attr("img[data-src]", "data-src")?,
                Strategy::srcset("source[srcset]")?,
                Strategy::srcset("img[srcset]")?,
            ])
            .required(is_required(Field::Thumbnail)),
        ];
        Ok(Self::new(specs))
    }
}
