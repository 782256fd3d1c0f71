//! Catalog Aggregator: rebuilds each category's catalog from the entity tree.
//!
//! Ordering is the store's walk order and ids are assigned 1..N in that order,
//! so ids are only stable for an unchanged population. Images always come from
//! a fresh directory scan.

use std::path::{Path, PathBuf};

use nightcity_core::record::is_empty_value;
use nightcity_core::store::{read_override, scan_images, write_json_atomic};
use nightcity_core::{
    display_name_from_dir, reconcile, Category, EntityDir, EntityStore, FileConfig,
    LegacyCatalog, MergeInputs, Placement, Record,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;

pub struct Aggregator {
    store: EntityStore,
    output_dir: PathBuf,
    image_base_url: Option<String>,
}

impl Aggregator {
    pub fn new(data_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: EntityStore::new(data_dir),
            output_dir: output_dir.into(),
            image_base_url: None,
        }
    }

    pub fn from_config(config: &FileConfig) -> Self {
        Self::new(&config.paths.data_dir, &config.paths.output_dir)
            .with_image_base_url(config.catalog.image_base_url.clone())
    }

    /// Publish images as `{base}/{entity path}/{file}` instead of bare file names.
    pub fn with_image_base_url(mut self, base: Option<String>) -> Self {
        self.image_base_url = base
            .map(|b| b.trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty());
        self
    }

    pub fn output_path(&self, category: Category) -> PathBuf {
        self.output_dir.join(category.catalog_file())
    }

    /// Build the numbered catalog for one category. Nothing is written.
    pub fn aggregate(&self, category: Category) -> Vec<Record> {
        let legacy = LegacyCatalog::load_for(&self.output_dir, category);
        let nested_legacy = match category {
            Category::Districts => LegacyCatalog::load_for(&self.output_dir, Category::Subdistricts),
            _ => LegacyCatalog::empty(),
        };

        self.store
            .list(category, None)
            .iter()
            .enumerate()
            .map(|(i, dir)| {
                let merged = self.merge(category, dir, &legacy);
                let subdistricts = (category == Category::Districts)
                    .then(|| self.nested_subdistricts(dir, &nested_legacy));
                compose(Some(i as u64 + 1), merged, Some(&dir.directory), subdistricts)
            })
            .collect()
    }

    /// Aggregate one category and write its catalog file.
    ///
    /// An empty result leaves the previous file in place. Returns the number of
    /// records written.
    pub fn generate(&self, category: Category) -> Result<usize> {
        let records = self.aggregate(category);
        let path = self.output_path(category);
        if records.is_empty() {
            warn!(
                category = %category,
                path = %path.display(),
                "No entities found, keeping the existing catalog"
            );
            return Ok(0);
        }

        write_json_atomic(&path, &records)?;
        info!(category = %category, records = records.len(), path = %path.display(), "Catalog written");
        Ok(records.len())
    }

    pub fn generate_all(&self) -> Result<Vec<(Category, usize)>> {
        let mut written = Vec::with_capacity(Category::TOP_LEVEL.len());
        for category in Category::TOP_LEVEL {
            written.push((category, self.generate(category)?));
        }
        Ok(written)
    }

    fn merge(&self, category: Category, dir: &EntityDir, legacy: &LegacyCatalog) -> Record {
        let existing = read_override(&dir.path);
        let display_name = display_name_from_dir(&dir.directory);
        let legacy_entry = match existing {
            Some(_) => None,
            None => legacy.lookup(&[display_name.as_str()]),
        };
        let inputs = MergeInputs {
            candidate: None,
            existing: existing.as_ref(),
            legacy: legacy_entry,
        };
        reconcile(category, &inputs, &Placement::from(dir), self.published_images(&dir.path))
    }

    fn nested_subdistricts(&self, district: &EntityDir, legacy: &LegacyCatalog) -> Vec<Value> {
        self.store
            .list(Category::Subdistricts, Some(&district.path))
            .iter()
            .map(|dir| {
                let merged = self.merge(Category::Subdistricts, dir, legacy);
                Value::Object(compose(None, merged, None, None).into_map())
            })
            .collect()
    }

    fn published_images(&self, dir: &Path) -> Vec<String> {
        let files = scan_images(dir);
        let Some(base) = &self.image_base_url else {
            return files;
        };
        match self.store.relative(dir) {
            Some(rel) => files
                .into_iter()
                .map(|file| format!("{base}/{rel}/{file}"))
                .collect(),
            None => files,
        }
    }
}

/// Lay out a catalog record: `id`, the merged fields, `directory`, then the
/// derived image fields. Empty values are dropped; a district's `subdistricts`
/// list is always present.
fn compose(
    id: Option<u64>,
    merged: Record,
    directory: Option<&str>,
    subdistricts: Option<Vec<Value>>,
) -> Record {
    let mut out = Record::new();
    if let Some(id) = id {
        out.insert("id", id);
    }

    let mut has_images = None;
    let mut images = None;
    let mut subdistricts = subdistricts;
    for (field, value) in merged.into_map() {
        match field.as_str() {
            "has_images" => has_images = Some(value),
            "images" => images = Some(value),
            "subdistricts" if subdistricts.is_some() => {
                out.insert(field, subdistricts.take().unwrap_or_default());
            }
            _ if is_empty_value(&value) => {}
            _ => out.insert(field, value),
        }
    }

    if let Some(directory) = directory {
        out.insert("directory", directory);
    }
    for (field, value) in [("has_images", has_images), ("images", images)] {
        if let Some(value) = value.filter(|v| !is_empty_value(v)) {
            out.insert(field, value);
        }
    }
    out
}
