pub mod builder;
pub mod document;
pub mod extractor;
pub mod images;
pub mod pipeline;
pub mod stats;
pub mod text;

pub use builder::{Candidate, EntityBuilder};
pub use extractor::{FieldExtractor, GenderStrategy, Signal};
pub use pipeline::{ScrapeOptions, Scout};
pub use stats::RunStats;
