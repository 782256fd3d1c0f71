//! Read and patch operations over the generated catalogs, keyed by `id`.
//!
//! Edits also land in the entity's override record, so they survive the next
//! regeneration instead of being overwritten by it.

use std::path::{Path, PathBuf};

use nightcity_core::reconcile::DERIVED_FIELDS;
use nightcity_core::store::{read_override, write_json_atomic, write_override};
use nightcity_core::{Category, EntityStore, FileConfig, Record, StoreError};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{CatalogError, Result};

/// Fields a patch can never change.
pub const PROTECTED_FIELDS: &[&str] = &["id", "images", "directory"];

pub struct CatalogEditor {
    store: EntityStore,
    output_dir: PathBuf,
}

impl CatalogEditor {
    pub fn new(data_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: EntityStore::new(data_dir),
            output_dir: output_dir.into(),
        }
    }

    pub fn from_config(config: &FileConfig) -> Self {
        Self::new(&config.paths.data_dir, &config.paths.output_dir)
    }

    pub fn categories(&self) -> Vec<&'static str> {
        Category::TOP_LEVEL.iter().map(|c| c.as_str()).collect()
    }

    pub fn read_all(&self, category: &str) -> Result<Vec<Record>> {
        let category = parse_category(category)?;
        read_catalog(&self.output_dir.join(category.catalog_file()))
    }

    pub fn read_one(&self, category: &str, id: u64) -> Result<Record> {
        let parsed = parse_category(category)?;
        self.read_all(category)?
            .into_iter()
            .find(|record| record_id(record) == Some(id))
            .ok_or(CatalogError::NotFound {
                category: parsed,
                id,
            })
    }

    /// Apply `patch` to the record with `id` and return the updated record.
    /// Protected fields in the patch are ignored.
    pub fn update(&self, category: &str, id: u64, patch: &Record) -> Result<Record> {
        let parsed = parse_category(category)?;
        let path = self.output_dir.join(parsed.catalog_file());
        let mut records = read_catalog(&path)?;

        let record = records
            .iter_mut()
            .find(|record| record_id(record) == Some(id))
            .ok_or(CatalogError::NotFound {
                category: parsed,
                id,
            })?;

        let mut applied = Record::new();
        for (field, value) in patch.fields() {
            if PROTECTED_FIELDS.contains(&field.as_str()) {
                warn!(field = %field, "Ignoring protected field in patch");
                continue;
            }
            record.insert(field.clone(), value.clone());
            applied.insert(field.clone(), value.clone());
        }
        let updated = record.clone();

        write_json_atomic(&path, &records)?;
        self.write_through(parsed, &updated, &applied)?;

        info!(category = %parsed, id, fields = applied.len(), "Catalog entry updated");
        Ok(updated)
    }

    fn write_through(&self, category: Category, record: &Record, applied: &Record) -> Result<()> {
        let Some(directory) = record.get_str("directory") else {
            warn!(category = %category, "Catalog entry has no directory, override not updated");
            return Ok(());
        };
        let Some(dir) = self
            .store
            .list(category, None)
            .into_iter()
            .find(|dir| dir.directory == directory)
        else {
            warn!(category = %category, directory, "Entity directory not found, override not updated");
            return Ok(());
        };

        let mut current = read_override(&dir.path).unwrap_or_default();
        for (field, value) in applied.fields() {
            if !DERIVED_FIELDS.contains(&field.as_str()) {
                current.insert(field.clone(), value.clone());
            }
        }
        write_override(&dir.path, &current)?;
        Ok(())
    }
}

fn parse_category(name: &str) -> Result<Category> {
    match name.parse::<Category>() {
        Ok(category) if Category::TOP_LEVEL.contains(&category) => Ok(category),
        _ => Err(CatalogError::UnknownCategory(name.to_string())),
    }
}

fn record_id(record: &Record) -> Option<u64> {
    record.get("id").and_then(Value::as_u64)
}

/// A catalog that was never generated reads as empty.
fn read_catalog(path: &Path) -> Result<Vec<Record>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = serde_json::from_str(&content).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_catalog_categories_are_editable() {
        assert_eq!(parse_category("Gangs").unwrap(), Category::Gangs);
        assert!(matches!(
            parse_category("subdistricts"),
            Err(CatalogError::UnknownCategory(_))
        ));
        assert!(matches!(
            parse_category("vehicles"),
            Err(CatalogError::UnknownCategory(name)) if name == "vehicles"
        ));
    }
}
