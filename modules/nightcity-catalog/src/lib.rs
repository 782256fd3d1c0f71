pub mod aggregate;
pub mod editor;
pub mod error;

pub use aggregate::Aggregator;
pub use editor::{CatalogEditor, PROTECTED_FIELDS};
pub use error::{CatalogError, Result};
