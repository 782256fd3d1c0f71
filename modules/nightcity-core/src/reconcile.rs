//! Field-level merge of a scraped candidate against durable state.
//!
//! Every schema field carries a [`FieldRule`]: an ordered list of sources to
//! try (via its [`Policy`]) and a computed default. The first source holding a
//! non-empty value wins; a stored copy of a rule's placeholder text counts as
//! empty. The legacy catalog is only consulted while no
//! override record exists. `images`/`has_images` never merge; they always come
//! from the live directory scan.

use serde_json::Value;
use tracing::debug;

use crate::error::StoreResult;
use crate::legacy::LegacyCatalog;
use crate::record::Record;
use crate::store::{self, EntityDir};
use crate::types::{display_name_from_dir, Category, Gender};

/// Placeholder description for entities nothing could describe.
pub const NO_DESCRIPTION: &str = "Sem descrição disponível.";

/// Fields owned by the pipeline and never taken from any merge input.
pub const DERIVED_FIELDS: &[&str] = &["id", "directory", "has_images", "images"];

/// Where a merged value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Candidate,
    Override,
    Legacy,
    /// The gender bucket the directory lives in.
    Placement,
    Default,
}

/// Source precedence for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// The fresh scrape wins; durable state fills gaps.
    Fresh,
    /// Manual curation wins once an override record exists.
    Curated,
    /// Set once, never replaced by a later scrape.
    Immutable,
}

impl Policy {
    pub fn order(self, has_override: bool) -> &'static [Source] {
        const FRESH: &[Source] = &[Source::Candidate, Source::Override, Source::Legacy];
        const DURABLE: &[Source] = &[Source::Override, Source::Candidate, Source::Legacy];
        match (self, has_override) {
            (Policy::Fresh, _) | (Policy::Curated, false) => FRESH,
            (Policy::Curated, true) | (Policy::Immutable, _) => DURABLE,
        }
    }
}

/// Value used when no source has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Nothing,
    Text(&'static str),
    /// Title-cased directory name.
    DisplayName,
    /// Gender of the bucket the directory lives in.
    DirectoryGender,
    EmptyList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub policy: Policy,
    pub fallback: Fallback,
}

impl FieldRule {
    fn is_placeholder(&self, value: &Value) -> bool {
        matches!(self.fallback, Fallback::Text(text) if value.as_str() == Some(text))
    }

    /// The record's value for this field, unless it is empty or the placeholder.
    fn stored<'r>(&self, record: Option<&'r Record>) -> Option<&'r Value> {
        record
            .and_then(|r| r.present(self.name))
            .filter(|value| !self.is_placeholder(value))
    }
}

const fn rule(name: &'static str, policy: Policy, fallback: Fallback) -> FieldRule {
    FieldRule {
        name,
        policy,
        fallback,
    }
}

const CHARACTER_SCHEMA: &[FieldRule] = &[
    rule("name", Policy::Fresh, Fallback::DisplayName),
    rule("gender", Policy::Immutable, Fallback::DirectoryGender),
    rule("affiliation", Policy::Curated, Fallback::Text("Unknown")),
    rule("description", Policy::Curated, Fallback::Text(NO_DESCRIPTION)),
    rule("occupation", Policy::Fresh, Fallback::Nothing),
    rule("status", Policy::Fresh, Fallback::Nothing),
    rule("wiki_url", Policy::Fresh, Fallback::Nothing),
];

const GANG_SCHEMA: &[FieldRule] = &[
    rule("name", Policy::Fresh, Fallback::DisplayName),
    rule("description", Policy::Curated, Fallback::Text(NO_DESCRIPTION)),
    rule("founder", Policy::Fresh, Fallback::Nothing),
    rule("leader", Policy::Fresh, Fallback::Nothing),
    rule("hq", Policy::Fresh, Fallback::Nothing),
    rule("territory", Policy::Fresh, Fallback::Nothing),
    rule("members_count", Policy::Fresh, Fallback::Nothing),
    rule("affiliations", Policy::Curated, Fallback::Nothing),
    rule("wiki_url", Policy::Fresh, Fallback::Nothing),
];

const DISTRICT_SCHEMA: &[FieldRule] = &[
    rule("name", Policy::Fresh, Fallback::DisplayName),
    rule("description", Policy::Curated, Fallback::Text(NO_DESCRIPTION)),
    rule("danger_level", Policy::Fresh, Fallback::Nothing),
    rule("subdistricts", Policy::Fresh, Fallback::EmptyList),
    rule("wiki_url", Policy::Fresh, Fallback::Nothing),
];

const SUBDISTRICT_SCHEMA: &[FieldRule] = &[
    rule("name", Policy::Fresh, Fallback::DisplayName),
    rule("description", Policy::Curated, Fallback::Text(NO_DESCRIPTION)),
    rule("wiki_url", Policy::Fresh, Fallback::Nothing),
];

/// Merge rules for a category, in output field order.
pub fn schema(category: Category) -> &'static [FieldRule] {
    match category {
        Category::Characters => CHARACTER_SCHEMA,
        Category::Gangs => GANG_SCHEMA,
        Category::Districts => DISTRICT_SCHEMA,
        Category::Subdistricts => SUBDISTRICT_SCHEMA,
    }
}

/// Everything a merge reads besides the directory scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeInputs<'a> {
    pub candidate: Option<&'a Record>,
    pub existing: Option<&'a Record>,
    pub legacy: Option<&'a Record>,
}

/// Facts about the entity's placement on disk.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    pub directory: &'a str,
    pub gender: Option<Gender>,
}

impl<'a> From<&'a EntityDir> for Placement<'a> {
    fn from(dir: &'a EntityDir) -> Self {
        Self {
            directory: &dir.directory,
            gender: dir.gender,
        }
    }
}

/// Resolve one field. `None` means no source and no default produced a value.
///
/// Inside a gender bucket, a field that falls back to the bucket takes a stored
/// value first, then the bucket, and never the scrape.
pub fn resolve_field(
    rule: &FieldRule,
    inputs: &MergeInputs<'_>,
    placement: &Placement<'_>,
) -> Option<(Value, Source)> {
    if let (Fallback::DirectoryGender, Some(gender)) = (rule.fallback, placement.gender) {
        return match rule.stored(inputs.existing) {
            Some(value) => Some((value.clone(), Source::Override)),
            None => Some((Value::from(gender.as_str()), Source::Placement)),
        };
    }

    let has_override = inputs.existing.is_some();
    for source in rule.policy.order(has_override) {
        let record = match source {
            Source::Candidate => inputs.candidate,
            Source::Override => inputs.existing,
            Source::Legacy if !has_override => inputs.legacy,
            Source::Legacy | Source::Placement | Source::Default => None,
        };
        if let Some(value) = rule.stored(record) {
            return Some((value.clone(), *source));
        }
    }

    let default = match rule.fallback {
        Fallback::Nothing => None,
        Fallback::Text(text) => Some(Value::from(text)),
        Fallback::DisplayName => Some(Value::from(display_name_from_dir(placement.directory))),
        Fallback::DirectoryGender => placement.gender.map(|g| Value::from(g.as_str())),
        Fallback::EmptyList => Some(Value::Array(Vec::new())),
    };
    default.map(|value| (value, Source::Default))
}

/// Merge the inputs into the record persisted as the entity's override file.
///
/// Schema fields come first, then extra fields an operator added to the
/// override (or the candidate carried), then the scanned images.
pub fn reconcile(
    category: Category,
    inputs: &MergeInputs<'_>,
    placement: &Placement<'_>,
    images: Vec<String>,
) -> Record {
    reconcile_traced(category, inputs, placement, images).0
}

/// [`reconcile`], also reporting which source supplied each schema field.
pub fn reconcile_traced(
    category: Category,
    inputs: &MergeInputs<'_>,
    placement: &Placement<'_>,
    images: Vec<String>,
) -> (Record, Vec<(&'static str, Source)>) {
    let rules = schema(category);
    let mut merged = Record::new();
    let mut origins = Vec::with_capacity(rules.len());

    for rule in rules {
        if let Some((value, source)) = resolve_field(rule, inputs, placement) {
            merged.insert(rule.name, value);
            origins.push((rule.name, source));
        }
    }

    let is_schema = |field: &str| rules.iter().any(|r| r.name == field);
    for extras in [inputs.existing, inputs.candidate].into_iter().flatten() {
        for (field, value) in extras.fields() {
            if is_schema(field) || DERIVED_FIELDS.contains(&field.as_str()) || merged.contains(field) {
                continue;
            }
            merged.insert(field.clone(), value.clone());
        }
    }

    if category == Category::Characters {
        merged.insert("has_images", !images.is_empty());
    }
    merged.insert("images", images);

    (merged, origins)
}

/// Applies [`reconcile`] to entity directories and persists the result.
#[derive(Debug, Default)]
pub struct Reconciler {
    legacy: Vec<(Category, LegacyCatalog)>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_legacy(mut self, category: Category, catalog: LegacyCatalog) -> Self {
        self.legacy.retain(|(c, _)| *c != category);
        self.legacy.push((category, catalog));
        self
    }

    fn legacy_for(&self, category: Category) -> Option<&LegacyCatalog> {
        self.legacy
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, catalog)| catalog)
    }

    /// Read-modify-write one entity's override record.
    pub fn reconcile_entity(
        &self,
        category: Category,
        dir: &EntityDir,
        candidate: Option<&Record>,
    ) -> StoreResult<Record> {
        let existing = store::read_override(&dir.path);
        let display_name = display_name_from_dir(&dir.directory);

        let legacy = if existing.is_none() {
            let mut names: Vec<&str> = Vec::new();
            if let Some(name) = candidate.and_then(|c| c.get_str("name")) {
                names.push(name);
            }
            names.push(&display_name);
            self.legacy_for(category).and_then(|catalog| catalog.lookup(&names))
        } else {
            None
        };

        let inputs = MergeInputs {
            candidate,
            existing: existing.as_ref(),
            legacy,
        };
        let images = store::scan_images(&dir.path);
        let (merged, origins) = reconcile_traced(category, &inputs, &Placement::from(dir), images);

        debug!(
            category = %category,
            directory = %dir.directory,
            sources = ?origins,
            "Reconciled entity"
        );

        store::write_override(&dir.path, &merged)?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => Record::from(map),
            _ => panic!("fixture must be an object"),
        }
    }

    fn placement(directory: &str) -> Placement<'_> {
        Placement {
            directory,
            gender: Some(Gender::Female),
        }
    }

    #[test]
    fn curated_fields_prefer_existing_override() {
        let candidate = record(json!({"name": "Judy", "description": "Scraped text"}));
        let existing = record(json!({"description": "Hand-written text"}));
        let inputs = MergeInputs {
            candidate: Some(&candidate),
            existing: Some(&existing),
            legacy: None,
        };

        let merged = reconcile(Category::Characters, &inputs, &placement("judy"), vec![]);
        assert_eq!(merged.get_str("description"), Some("Hand-written text"));
    }

    #[test]
    fn empty_override_value_yields_to_scrape() {
        let candidate = record(json!({"description": "Scraped text"}));
        let existing = record(json!({"description": ""}));
        let inputs = MergeInputs {
            candidate: Some(&candidate),
            existing: Some(&existing),
            legacy: None,
        };

        let merged = reconcile(Category::Characters, &inputs, &placement("judy"), vec![]);
        assert_eq!(merged.get_str("description"), Some("Scraped text"));
    }

    #[test]
    fn fresh_fields_prefer_scrape() {
        let candidate = record(json!({"name": "Judy Álvarez", "status": "Alive"}));
        let existing = record(json!({"name": "Judy Alvarez", "status": "Unknown"}));
        let inputs = MergeInputs {
            candidate: Some(&candidate),
            existing: Some(&existing),
            legacy: None,
        };

        let (merged, origins) =
            reconcile_traced(Category::Characters, &inputs, &placement("judy_alvarez"), vec![]);
        assert_eq!(merged.get_str("name"), Some("Judy Álvarez"));
        assert_eq!(merged.get_str("status"), Some("Alive"));
        assert!(origins.contains(&("name", Source::Candidate)));
    }

    #[test]
    fn gender_never_changes_once_recorded() {
        let candidate = record(json!({"gender": "Male"}));
        let existing = record(json!({"gender": "Female"}));
        let inputs = MergeInputs {
            candidate: Some(&candidate),
            existing: Some(&existing),
            legacy: None,
        };

        let merged = reconcile(Category::Characters, &inputs, &placement("judy"), vec![]);
        assert_eq!(merged.get_str("gender"), Some("Female"));
    }

    #[test]
    fn placement_gender_beats_scraped_gender() {
        let candidate = record(json!({"name": "Judy Alvarez", "gender": "Male"}));
        let inputs = MergeInputs {
            candidate: Some(&candidate),
            existing: None,
            legacy: None,
        };

        let (merged, origins) =
            reconcile_traced(Category::Characters, &inputs, &placement("judy_alvarez"), vec![]);
        assert_eq!(merged.get_str("gender"), Some("Female"));
        assert!(origins.contains(&("gender", Source::Placement)));
    }

    #[test]
    fn scraped_gender_applies_without_a_bucket() {
        let candidate = record(json!({"gender": "Male"}));
        let inputs = MergeInputs {
            candidate: Some(&candidate),
            existing: None,
            legacy: None,
        };
        let unplaced = Placement {
            directory: "jackie_welles",
            gender: None,
        };

        let merged = reconcile(Category::Characters, &inputs, &unplaced, vec![]);
        assert_eq!(merged.get_str("gender"), Some("Male"));
    }

    #[test]
    fn stored_placeholder_yields_to_scrape() {
        let candidate = record(json!({"affiliation": "Valentinos", "description": "Scraped text"}));
        let existing = record(json!({"affiliation": "Unknown", "description": NO_DESCRIPTION}));
        let inputs = MergeInputs {
            candidate: Some(&candidate),
            existing: Some(&existing),
            legacy: None,
        };

        let merged = reconcile(Category::Characters, &inputs, &placement("jackie_welles"), vec![]);
        assert_eq!(merged.get_str("affiliation"), Some("Valentinos"));
        assert_eq!(merged.get_str("description"), Some("Scraped text"));
    }

    #[test]
    fn legacy_only_fills_first_capture() {
        let legacy = record(json!({"affiliation": "Mox", "occupation": "Braindance technician"}));
        let first = MergeInputs {
            candidate: None,
            existing: None,
            legacy: Some(&legacy),
        };
        let merged = reconcile(Category::Characters, &first, &placement("judy"), vec![]);
        assert_eq!(merged.get_str("affiliation"), Some("Mox"));

        let existing = record(json!({"name": "Judy"}));
        let later = MergeInputs {
            candidate: None,
            existing: Some(&existing),
            legacy: Some(&legacy),
        };
        let merged = reconcile(Category::Characters, &later, &placement("judy"), vec![]);
        assert_eq!(merged.get_str("affiliation"), Some("Unknown"));
        assert!(merged.get("occupation").is_none());
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let merged = reconcile(
            Category::Characters,
            &MergeInputs::default(),
            &placement("river_ward"),
            vec![],
        );
        assert_eq!(merged.get_str("name"), Some("River Ward"));
        assert_eq!(merged.get_str("gender"), Some("Female"));
        assert_eq!(merged.get_str("affiliation"), Some("Unknown"));
        assert_eq!(merged.get_str("description"), Some(NO_DESCRIPTION));
        assert_eq!(merged.get("has_images"), Some(&json!(false)));
    }

    #[test]
    fn images_come_only_from_scan() {
        let existing = record(json!({"images": ["old.png"], "has_images": true, "id": 4}));
        let inputs = MergeInputs {
            candidate: None,
            existing: Some(&existing),
            legacy: None,
        };
        let merged = reconcile(
            Category::Gangs,
            &inputs,
            &placement("maelstrom"),
            vec!["a.png".into(), "b.png".into()],
        );
        assert_eq!(merged.get("images"), Some(&json!(["a.png", "b.png"])));
        assert!(!merged.contains("has_images"));
        assert!(!merged.contains("id"));
    }

    #[test]
    fn operator_extras_survive_after_schema_fields() {
        let existing = record(json!({"nickname": "Royce's crew", "name": "Maelstrom"}));
        let inputs = MergeInputs {
            candidate: None,
            existing: Some(&existing),
            legacy: None,
        };
        let merged = reconcile(Category::Gangs, &inputs, &placement("maelstrom"), vec![]);
        let keys: Vec<&str> = merged.fields().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["name", "description", "nickname", "images"]);
    }

    #[test]
    fn districts_always_carry_a_subdistrict_list() {
        let merged = reconcile(
            Category::Districts,
            &MergeInputs::default(),
            &Placement {
                directory: "dogtown",
                gender: None,
            },
            vec![],
        );
        assert_eq!(merged.get("subdistricts"), Some(&json!([])));
        assert!(!merged.contains("gender"));
    }

    #[test]
    fn reconcile_entity_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let entity = EntityDir {
            path: dir.path().join("characters/sex/female/judy_alvarez"),
            directory: "judy_alvarez".into(),
            gender: Some(Gender::Female),
        };
        std::fs::create_dir_all(&entity.path).unwrap();
        std::fs::write(entity.path.join("judy_alvarez_01.png"), b"png").unwrap();

        let reconciler = Reconciler::new();
        let candidate = record(json!({"name": "Judy Alvarez", "description": "Scraped text"}));
        reconciler
            .reconcile_entity(Category::Characters, &entity, Some(&candidate))
            .unwrap();

        let mut edited = store::read_override(&entity.path).unwrap();
        edited.insert("description", "Hand-written text");
        store::write_override(&entity.path, &edited).unwrap();

        let merged = reconciler
            .reconcile_entity(Category::Characters, &entity, Some(&candidate))
            .unwrap();
        assert_eq!(merged.get_str("description"), Some("Hand-written text"));
        assert_eq!(merged.get("images"), Some(&json!(["judy_alvarez_01.png"])));
        assert_eq!(merged.get("has_images"), Some(&json!(true)));
    }

    #[test]
    fn placeholders_written_on_first_capture_do_not_stick() {
        let dir = tempfile::tempdir().unwrap();
        let entity = EntityDir {
            path: dir.path().join("characters/sex/male/jackie_welles"),
            directory: "jackie_welles".into(),
            gender: Some(Gender::Male),
        };
        std::fs::create_dir_all(&entity.path).unwrap();
        let reconciler = Reconciler::new();

        let sparse = record(json!({"name": "Jackie Welles"}));
        let first = reconciler
            .reconcile_entity(Category::Characters, &entity, Some(&sparse))
            .unwrap();
        assert_eq!(first.get_str("affiliation"), Some("Unknown"));
        assert_eq!(first.get_str("description"), Some(NO_DESCRIPTION));

        let full = record(json!({
            "name": "Jackie Welles",
            "affiliation": "Valentinos",
            "description": "Jackie is a merc from Heywood and V's partner.",
        }));
        let second = reconciler
            .reconcile_entity(Category::Characters, &entity, Some(&full))
            .unwrap();
        assert_eq!(second.get_str("affiliation"), Some("Valentinos"));
        assert_eq!(
            second.get_str("description"),
            Some("Jackie is a merc from Heywood and V's partner.")
        );
    }

    #[test]
    fn rescrape_without_override_keeps_bucket_gender() {
        let dir = tempfile::tempdir().unwrap();
        let entity = EntityDir {
            path: dir.path().join("characters/sex/female/judy_alvarez"),
            directory: "judy_alvarez".into(),
            gender: Some(Gender::Female),
        };
        std::fs::create_dir_all(&entity.path).unwrap();
        std::fs::write(entity.path.join("info.json"), b"{not json").unwrap();

        let candidate = record(json!({"name": "Judy Alvarez", "gender": "Male"}));
        let merged = Reconciler::new()
            .reconcile_entity(Category::Characters, &entity, Some(&candidate))
            .unwrap();
        assert_eq!(merged.get_str("gender"), Some("Female"));
        let on_disk = store::read_override(&entity.path).unwrap();
        assert_eq!(on_disk.get_str("gender"), Some("Female"));
    }
}
