use nightcity_core::{Category, StoreError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown catalog category: {0}")]
    UnknownCategory(String),

    #[error("no {category} entry with id {id}")]
    NotFound { category: Category, id: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}
