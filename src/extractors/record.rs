// src/extractors/record.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Data fields of a listing, in the order they are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Id,
    Title,
    Link,
    Rating,
    ReviewCount,
    Price,
    Seller,
    SellerLevel,
    Thumbnail,
}

impl Field {
    #[cfg(test)]
    pub const ALL: [Field; 9] = [
        Field::Id,
        Field::Title,
        Field::Link,
        Field::Rating,
        Field::ReviewCount,
        Field::Price,
        Field::Seller,
        Field::SellerLevel,
        Field::Thumbnail,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Title => "title",
            Field::Link => "link",
            Field::Rating => "rating",
            Field::ReviewCount => "reviewCount",
            Field::Price => "price",
            Field::Seller => "seller",
            Field::SellerLevel => "sellerLevel",
            Field::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One extracted listing, as pushed to the record sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub title: String,
    pub link: String,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub price: Option<String>,
    pub seller: Option<String>,
    pub seller_level: String,
    pub thumbnail: Option<String>,
    pub tags: Vec<String>,
}
