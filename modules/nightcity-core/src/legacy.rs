//! Previously generated aggregate catalog, read back as a first-time migration source.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::record::Record;
use crate::types::Category;

/// Records of one category from an earlier catalog, keyed by lowercased name.
#[derive(Debug, Clone, Default)]
pub struct LegacyCatalog {
    by_name: HashMap<String, Record>,
}

impl LegacyCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the legacy entries for `category` from a catalog output directory.
    ///
    /// Subdistricts have no artifact of their own; they are collected from the
    /// nested lists inside `districts.json`.
    pub fn load_for(output_dir: &Path, category: Category) -> Self {
        match category {
            Category::Subdistricts => {
                let districts = read_array(&output_dir.join(Category::Districts.catalog_file()));
                let nested = districts.iter().filter_map(|district| {
                    district.get("subdistricts").and_then(Value::as_array)
                });
                Self::from_values(nested.flatten())
            }
            _ => Self::load(&output_dir.join(category.catalog_file())),
        }
    }

    /// Load a catalog array. A missing file is empty; a corrupt one is logged and empty.
    pub fn load(path: &Path) -> Self {
        Self::from_values(read_array(path).iter())
    }

    fn from_values<'a>(values: impl Iterator<Item = &'a Value>) -> Self {
        let mut by_name = HashMap::new();
        for value in values {
            let Value::Object(map) = value else { continue };
            let record = Record::from(map.clone());
            if let Some(name) = record.get_str("name") {
                by_name.entry(name.to_lowercase()).or_insert(record);
            }
        }
        Self { by_name }
    }

    /// First entry matching any of `names`, compared case-insensitively.
    pub fn lookup(&self, names: &[&str]) -> Option<&Record> {
        names
            .iter()
            .find_map(|name| self.by_name.get(&name.to_lowercase()))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

fn read_array(path: &Path) -> Vec<Value> {
    if !path.exists() {
        debug!(path = %path.display(), "No legacy catalog");
        return Vec::new();
    }
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str::<Value>(&content).map_err(|e| e.to_string()));
    match parsed {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            warn!(path = %path.display(), "Legacy catalog is not a JSON array, ignoring");
            Vec::new()
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "Unreadable legacy catalog, ignoring");
            Vec::new()
        }
    }
}
