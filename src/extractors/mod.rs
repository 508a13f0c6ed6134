// src/extractors/mod.rs
pub mod builder;
pub mod fields;
pub mod normalize;
pub mod page;
pub mod record;
pub mod validate;

// Re-export key extraction types for convenience
pub use page::{PageExtractor, WorkingSelector};
pub use record::Record;
