//! On-disk entity tree: one directory per entity holding `info.json` plus images.
//!
//! ```text
//! {root}/characters/sex/{male|female|unknown}/{directory}/
//! {root}/gangs/{directory}/
//! {root}/districts/{directory}/subdistricts/{directory}/
//! ```

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::record::Record;
use crate::types::{Category, Gender};

/// File name of the per-entity override record.
pub const OVERRIDE_FILE: &str = "info.json";

/// Extensions recognised as images by the directory scan.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

const SUBDISTRICTS_DIR: &str = "subdistricts";

/// One entity's directory on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDir {
    pub path: PathBuf,
    /// Stable identity slug (the directory name).
    pub directory: String,
    /// Gender bucket the directory lives in (characters only).
    pub gender: Option<Gender>,
}

/// Ways a freshly scraped subject may match an entity already on disk.
#[derive(Debug, Clone, Default)]
pub struct LookupKeys {
    pub slugs: Vec<String>,
    pub names: Vec<String>,
    pub wiki_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EntityStore {
    root: PathBuf,
}

impl EntityStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root of a category's tree. Subdistricts have none; they live under a district.
    pub fn category_root(&self, category: Category) -> Option<PathBuf> {
        match category {
            Category::Characters => Some(self.root.join("characters").join("sex")),
            Category::Gangs => Some(self.root.join("gangs")),
            Category::Districts => Some(self.root.join("districts")),
            Category::Subdistricts => None,
        }
    }

    /// Entity directories of a category in walk order: gender buckets first
    /// (characters), then sorted directory names.
    ///
    /// `parent` is the district directory when listing subdistricts.
    pub fn list(&self, category: Category, parent: Option<&Path>) -> Vec<EntityDir> {
        match category {
            Category::Characters => {
                let Some(base) = self.category_root(category) else {
                    return Vec::new();
                };
                Gender::BUCKETS
                    .iter()
                    .flat_map(|gender| {
                        sorted_subdirs(&base.join(gender.bucket()))
                            .into_iter()
                            .map(move |(directory, path)| EntityDir {
                                path,
                                directory,
                                gender: Some(*gender),
                            })
                    })
                    .collect()
            }
            Category::Subdistricts => match parent {
                Some(parent) => plain_dirs(&parent.join(SUBDISTRICTS_DIR)),
                None => Vec::new(),
            },
            Category::Gangs | Category::Districts => match self.category_root(category) {
                Some(base) => plain_dirs(&base),
                None => Vec::new(),
            },
        }
    }

    /// Where a brand-new entity directory goes.
    pub fn placement(
        &self,
        category: Category,
        directory: &str,
        gender: Gender,
        parent: Option<&Path>,
    ) -> EntityDir {
        let (path, gender) = match category {
            Category::Characters => (
                self.root
                    .join("characters")
                    .join("sex")
                    .join(gender.bucket())
                    .join(directory),
                Some(gender),
            ),
            Category::Gangs => (self.root.join("gangs").join(directory), None),
            Category::Districts => (self.root.join("districts").join(directory), None),
            Category::Subdistricts => {
                let base = parent
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.root.join("districts"));
                (base.join(SUBDISTRICTS_DIR).join(directory), None)
            }
        };
        EntityDir {
            path,
            directory: directory.to_string(),
            gender,
        }
    }

    /// Find an existing directory for a subject: by slug first, then by the
    /// name or wiki URL recorded in its override file.
    pub fn locate(
        &self,
        category: Category,
        parent: Option<&Path>,
        keys: &LookupKeys,
    ) -> Option<EntityDir> {
        let dirs = self.list(category, parent);

        if let Some(found) = dirs.iter().find(|d| keys.slugs.contains(&d.directory)) {
            return Some(found.clone());
        }

        let names: Vec<String> = keys.names.iter().map(|n| n.to_lowercase()).collect();
        dirs.into_iter().find(|dir| {
            let Some(record) = read_override(&dir.path) else {
                return false;
            };
            let name_match = record
                .get_str("name")
                .is_some_and(|n| names.contains(&n.to_lowercase()));
            let url_match = match (&keys.wiki_url, record.get_str("wiki_url")) {
                (Some(wanted), Some(recorded)) => wanted == recorded,
                _ => false,
            };
            name_match || url_match
        })
    }

    /// Lowercased slugs and recorded names of every entity in a category.
    pub fn existing_names(&self, category: Category) -> HashSet<String> {
        let mut names = HashSet::new();
        for dir in self.list(category, None) {
            names.insert(dir.directory.to_lowercase());
            if let Some(name) = read_override(&dir.path).as_ref().and_then(|r| r.get_str("name")) {
                names.insert(name.to_lowercase());
            }
        }
        names
    }

    /// Path of `path` relative to the store root, `/`-separated.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

/// Read an entity's override record.
///
/// Missing files are simply absent; unreadable or malformed ones are logged
/// and treated as absent so one bad file cannot stall a run.
pub fn read_override(dir: &Path) -> Option<Record> {
    let path = dir.join(OVERRIDE_FILE);
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable override record, ignoring");
            return None;
        }
    };
    match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(serde_json::Value::Object(map)) => Some(Record::from(map)),
        Ok(_) => {
            warn!(path = %path.display(), "Override record is not a JSON object, ignoring");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Corrupt override record, ignoring");
            None
        }
    }
}

pub fn write_override(dir: &Path, record: &Record) -> StoreResult<()> {
    write_json_atomic(&dir.join(OVERRIDE_FILE), record)
}

/// Serialize to a temp file beside `path`, then rename over it, so readers
/// never observe a partial file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| StoreError::io(&parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(|e| StoreError::io(&parent, e))?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(|e| StoreError::json(path, e))?;
    tmp.flush().map_err(|e| StoreError::io(path, e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

/// Image files in `dir`, sorted by file name. A missing directory has none.
pub fn scan_images(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut images: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| has_image_extension(name))
        .collect();
    images.sort();
    images
}

pub fn has_image_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

fn plain_dirs(base: &Path) -> Vec<EntityDir> {
    sorted_subdirs(base)
        .into_iter()
        .map(|(directory, path)| EntityDir {
            path,
            directory,
            gender: None,
        })
        .collect()
}

/// Immediate subdirectories of `base`, sorted by name. A missing base has none.
fn sorted_subdirs(base: &Path) -> Vec<(String, PathBuf)> {
    let Ok(entries) = std::fs::read_dir(base) else {
        return Vec::new();
    };
    let mut dirs: Vec<(String, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            Some((name, entry.path()))
        })
        .collect();
    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn scan_images_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.png"));
        touch(&dir.path().join("a.JPG"));
        touch(&dir.path().join("info.json"));
        touch(&dir.path().join("notes.txt"));
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        assert_eq!(scan_images(dir.path()), vec!["a.JPG", "b.png"]);
        assert!(scan_images(&dir.path().join("missing")).is_empty());
    }

    #[test]
    fn lists_characters_bucket_by_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntityStore::new(dir.path());
        for (bucket, name) in [("unknown", "adam"), ("female", "judy"), ("male", "zed"), ("male", "jackie")] {
            std::fs::create_dir_all(dir.path().join("characters/sex").join(bucket).join(name)).unwrap();
        }

        let dirs = store.list(Category::Characters, None);
        let names: Vec<&str> = dirs.iter().map(|d| d.directory.as_str()).collect();
        assert_eq!(names, vec!["jackie", "zed", "judy", "adam"]);
        assert_eq!(dirs[2].gender, Some(Gender::Female));
    }

    #[test]
    fn missing_category_root_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntityStore::new(dir.path().join("absent"));
        assert!(store.list(Category::Gangs, None).is_empty());
        assert!(store.list(Category::Characters, None).is_empty());
        assert!(store.list(Category::Subdistricts, None).is_empty());
    }

    #[test]
    fn corrupt_override_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(OVERRIDE_FILE), "{ not json").unwrap();
        assert!(read_override(dir.path()).is_none());

        std::fs::write(dir.path().join(OVERRIDE_FILE), "[1, 2]").unwrap();
        assert!(read_override(dir.path()).is_none());
    }

    #[test]
    fn atomic_write_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("gangs.json");
        write_json_atomic(&path, &json!([{"id": 1}])).unwrap();
        write_json_atomic(&path, &json!([])).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn locate_matches_slug_then_recorded_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntityStore::new(dir.path());
        let gang = store.placement(Category::Gangs, "the_mox", Gender::Unknown, None);
        let mut record = Record::new();
        record.insert("name", "Moxes");
        record.insert("wiki_url", "https://cyberpunk.fandom.com/wiki/Moxes");
        write_override(&gang.path, &record).unwrap();

        let by_slug = LookupKeys {
            slugs: vec!["the_mox".into()],
            ..Default::default()
        };
        assert_eq!(store.locate(Category::Gangs, None, &by_slug), Some(gang.clone()));

        let by_name = LookupKeys {
            slugs: vec!["moxes".into()],
            names: vec!["MOXES".into()],
            wiki_url: None,
        };
        assert_eq!(store.locate(Category::Gangs, None, &by_name), Some(gang.clone()));

        let by_url = LookupKeys {
            wiki_url: Some("https://cyberpunk.fandom.com/wiki/Moxes".into()),
            ..Default::default()
        };
        assert_eq!(store.locate(Category::Gangs, None, &by_url), Some(gang));

        assert!(store.locate(Category::Gangs, None, &LookupKeys::default()).is_none());
    }

    #[test]
    fn subdistricts_live_under_their_district() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntityStore::new(dir.path());
        let district = store.placement(Category::Districts, "watson", Gender::Unknown, None);
        let sub = store.placement(Category::Subdistricts, "kabuki", Gender::Unknown, Some(&district.path));
        assert_eq!(sub.path, dir.path().join("districts/watson/subdistricts/kabuki"));
        assert_eq!(store.relative(&sub.path).as_deref(), Some("districts/watson/subdistricts/kabuki"));
    }
}
