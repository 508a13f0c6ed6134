// src/extractors/page.rs
use crate::config::ExtractionSettings;
use crate::extractors::builder::{self, ContainerId, FieldValues};
use crate::extractors::fields::{resolve, FieldTable};
use crate::extractors::normalize::{absolutize_url, is_listing_url};
use crate::extractors::record::{Field, Record};
use crate::extractors::validate::{Accepted, Validator};
use crate::utils::error::{ExtractError, Rejection};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashSet};

// Container selectors, most specific/modern layouts first, generic fallbacks last.
pub const CONTAINER_CASCADE: &[&str] = &[
    "[data-testid='gig-card']",
    "div[data-gig-id]",
    "div.gig-card-layout",
    "div.gig-wrapper-impressions",
    "div.gig-wrapper",
    "article[class*='gig']",
    "div[class*='gig-card']",
    "li[class*='gig']",
];

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[href]").expect("Failed to compile ANCHOR_SELECTOR")
});

/// How the candidate containers of a page were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkingSelector {
    /// A container selector from the cascade matched at least one element.
    Container(String),
    /// No container selector matched; listing anchors were used as minimal containers.
    AnchorFallback,
    /// Nothing on the page looked like a listing.
    Nothing,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageStats {
    pub candidates: usize,
    pub accepted: usize,
    /// Rejected candidates, keyed by the first required field that failed.
    pub rejections: BTreeMap<Field, usize>,
}

impl PageStats {
    pub fn rejected(&self) -> usize {
        self.rejections.values().sum()
    }
}

#[derive(Debug, Clone)]
pub struct PageExtraction {
    pub records: Vec<Record>,
    pub working_selector: WorkingSelector,
    pub stats: PageStats,
}

/// Runs field resolution, validation and building over every candidate container of a page.
#[derive(Debug, Clone)]
pub struct PageExtractor {
    fields: FieldTable,
    containers: Vec<(String, Selector)>,
    validator: Validator,
}

impl PageExtractor {
    pub fn new(settings: &ExtractionSettings) -> Result<Self, ExtractError> {
        let fields = FieldTable::listing_defaults(settings.strictness, settings.min_title_len)?;
        Self::with_tables(fields, CONTAINER_CASCADE, Validator::new(settings.min_title_len))
    }

    /// Builds an extractor from a custom field table and container cascade.
    pub fn with_tables(fields: FieldTable, containers: &[&str], validator: Validator) -> Result<Self, ExtractError> {
        for field in [Field::Title, Field::Link] {
            if fields.spec(field).is_none() {
                return Err(ExtractError::MissingField(field.name()));
            }
        }
        let containers = containers
            .iter()
            .map(|raw| {
                Selector::parse(raw)
                    .map(|selector| (raw.to_string(), selector))
                    .map_err(|e| ExtractError::InvalidSelector {
                        selector: raw.to_string(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { fields, containers, validator })
    }

    /// Container selector strings joined into one selector group, for readiness waits.
    pub fn container_selector_group(&self) -> String {
        self.containers.iter().map(|(raw, _)| raw.as_str()).collect::<Vec<_>>().join(", ")
    }

    pub fn extract_page(&self, html: &str, keyword: &str) -> PageExtraction {
        let document = Html::parse_document(html);
        self.extract_document(&document, keyword)
    }

    pub fn extract_document(&self, document: &Html, keyword: &str) -> PageExtraction {
        let (working_selector, candidates) = self.find_candidates(document);
        tracing::debug!("{} candidate containers via {:?}", candidates.len(), working_selector);

        let mut stats = PageStats { candidates: candidates.len(), ..PageStats::default() };
        let mut records = Vec::with_capacity(candidates.len());

        for (index, container) in candidates.into_iter().enumerate() {
            match self.extract_candidate(container, index, keyword) {
                Ok(record) => records.push(record),
                Err((field, rejection)) => {
                    tracing::debug!("Skipping candidate {}: {} {}", index, field, rejection);
                    *stats.rejections.entry(field).or_insert(0) += 1;
                }
            }
        }
        stats.accepted = records.len();

        PageExtraction { records, working_selector, stats }
    }

    /// Container cascade: the first selector with at least one match is used for the whole page.
    fn find_candidates<'a>(&self, document: &'a Html) -> (WorkingSelector, Vec<ElementRef<'a>>) {
        for (raw, selector) in &self.containers {
            let found: Vec<ElementRef> = document.select(selector).collect();
            if !found.is_empty() {
                return (WorkingSelector::Container(raw.clone()), found);
            }
            tracing::trace!("Container selector '{}' matched nothing", raw);
        }

        let mut seen = HashSet::new();
        let anchors: Vec<ElementRef> = document
            .select(&ANCHOR_SELECTOR)
            .filter(|a| {
                a.value()
                    .attr("href")
                    .filter(|href| is_listing_url(href))
                    .and_then(absolutize_url)
                    .map(|url| seen.insert(url))
                    .unwrap_or(false)
            })
            .collect();

        if anchors.is_empty() {
            (WorkingSelector::Nothing, anchors)
        } else {
            tracing::warn!("No container selector matched; falling back to {} listing anchors", anchors.len());
            (WorkingSelector::AnchorFallback, anchors)
        }
    }

    /// All required fields or nothing: the first required rejection discards the candidate.
    fn extract_candidate(&self, container: ElementRef<'_>, index: usize, keyword: &str) -> Result<Record, (Field, Rejection)> {
        let mut values = FieldValues::default();
        let mut ids = ContainerId { index, ..ContainerId::default() };

        for spec in self.fields.specs() {
            let outcome = match resolve(container, spec) {
                Some(raw) => self.validator.validate(spec.field, &raw),
                None => Err(Rejection::Missing),
            };
            match outcome {
                Ok(Accepted::Text(id)) if spec.field == Field::Id => ids.primary = Some(id),
                Ok(accepted) => values.set(spec.field, accepted),
                Err(rejection) if spec.required => return Err((spec.field, rejection)),
                Err(rejection) => {
                    tracing::trace!("Optional field {} left empty on candidate {}: {}", spec.field, index, rejection);
                }
            }
        }

        if ids.primary.is_none() {
            ids.alternate = container.value().attr("data-impression-id").map(str::to_string);
        }
        Ok(builder::build(&ids, values, keyword))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Strictness;

    fn card(id: &str, title: &str, rating: &str, reviews: &str, price: &str) -> String {
        format!(
            r#"<div class="gig-wrapper" data-gig-id="{id}">
                 <a class="media" href="/seller_{id}/gig-{id}"><img src="//fiverr-res.cloudinary.com/{id}.jpg" alt="thumb"></a>
                 <div class="seller-name"><a href="/seller_{id}">seller_{id}</a></div>
                 <span class="level-badge">Level 1</span>
                 <h3><a href="/seller_{id}/gig-{id}">{title}</a></h3>
                 <div class="rating-wrapper"><strong class="rating-score">{rating}</strong><span class="ratings-count">{reviews}</span></div>
                 <footer><a href="/seller_{id}/gig-{id}"><span>{price}</span></a></footer>
               </div>"#
        )
    }

    fn page(cards: &[String]) -> String {
        format!("<html><body><main>{}</main></body></html>", cards.join("\n"))
    }

    fn extractor(strictness: Strictness) -> PageExtractor {
        PageExtractor::new(&ExtractionSettings { strictness, min_title_len: 10 }).unwrap()
    }

    #[test]
    fn test_one_record_per_conforming_container() {
        let html = page(&[
            card("101", "I will design a modern logo", "4.9", "(1,234)", "From $45"),
            card("102", "I will write SEO blog posts", "5.0", "(87)", "$20"),
        ]);
        let result = extractor(Strictness::Strict).extract_page(&html, "logo design");

        assert_eq!(result.working_selector, WorkingSelector::Container("div[data-gig-id]".to_string()));
        assert_eq!(result.records.len(), 2);
        let first = &result.records[0];
        assert_eq!(first.id, "101");
        assert_eq!(first.title, "I will design a modern logo");
        assert_eq!(first.link, "https://www.fiverr.com/seller_101/gig-101");
        assert_eq!(first.rating, Some(4.9));
        assert_eq!(first.review_count, Some(1234));
        assert_eq!(first.price.as_deref(), Some("From $45"));
        assert_eq!(first.seller.as_deref(), Some("seller_101"));
        assert_eq!(first.seller_level, "Level 1 Seller");
        assert_eq!(first.thumbnail.as_deref(), Some("https://fiverr-res.cloudinary.com/101.jpg"));
        assert_eq!(result.records[1].price.as_deref(), Some("From $20"));
    }

    #[test]
    fn test_candidates_with_bad_required_fields_are_dropped_whole() {
        let html = page(&[
            card("201", "I will design a modern logo", "0", "(10)", "$45"),
            card("202", "I will design a modern logo", "4.8", "(0)", "$45"),
            card("203", "I will design a modern logo", "4.8", "(12)", "$0"),
            card("204", "Logo", "4.8", "(12)", "$45"),
            card("205", "I will edit your podcast audio", "4.6", "(40)", "$30"),
        ]);
        let result = extractor(Strictness::Strict).extract_page(&html, "podcast");

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].id, "205");
        assert_eq!(result.stats.candidates, 5);
        assert_eq!(result.stats.rejected(), 4);
        assert_eq!(result.stats.rejections.get(&Field::Rating), Some(&1));
        assert_eq!(result.stats.rejections.get(&Field::ReviewCount), Some(&1));
        assert_eq!(result.stats.rejections.get(&Field::Price), Some(&1));
        assert_eq!(result.stats.rejections.get(&Field::Title), Some(&1));
    }

    #[test]
    fn test_permissive_mode_keeps_records_without_optional_fields() {
        let html = page(&[card("301", "I will design a modern logo", "0", "()", "free")]);

        assert!(extractor(Strictness::Strict).extract_page(&html, "logo").records.is_empty());

        let result = extractor(Strictness::Permissive).extract_page(&html, "logo");
        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert_eq!(record.rating, None);
        assert_eq!(record.review_count, None);
        assert_eq!(record.price, None);
        assert_eq!(record.link, "https://www.fiverr.com/seller_301/gig-301");
    }

    #[test]
    fn test_anchor_fallback_when_no_container_matches() {
        let html = r#"<html><body>
            <section>
              <a href="/categories/graphics-design">Graphics &amp; Design</a>
              <a href="/ana_b/illustrate-a-childrens-book" title="I will illustrate a children's book">img</a>
              <a href="/ana_b/illustrate-a-childrens-book">I will illustrate a children's book</a>
              <a href="/kim_c/draw-your-pet-portrait">I will draw your pet portrait</a>
            </section></body></html>"#;
        let result = extractor(Strictness::Permissive).extract_page(html, "illustration");

        assert_eq!(result.working_selector, WorkingSelector::AnchorFallback);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].title, "I will illustrate a children's book");
        assert_eq!(result.records[1].link, "https://www.fiverr.com/kim_c/draw-your-pet-portrait");
        assert!(result.records[1].id.starts_with("gig-"));
    }

    #[test]
    fn test_empty_page_finds_nothing() {
        let result = extractor(Strictness::Strict).extract_page("<html><body><p>No results</p></body></html>", "logo");
        assert_eq!(result.working_selector, WorkingSelector::Nothing);
        assert!(result.records.is_empty());
    }

    #[test]
    fn test_custom_cascade_requires_title_and_link_specs() {
        let table = FieldTable::new(Vec::new());
        let err = PageExtractor::with_tables(table, CONTAINER_CASCADE, Validator::new(10)).unwrap_err();
        assert!(matches!(err, ExtractError::MissingField("title")));
    }
}
