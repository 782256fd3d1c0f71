pub mod config;
pub mod error;
pub mod file_config;
pub mod heuristics;
pub mod legacy;
pub mod reconcile;
pub mod record;
pub mod store;
pub mod types;

pub use config::AppConfig;
pub use error::{StoreError, StoreResult};
pub use file_config::FileConfig;
pub use heuristics::HeuristicTables;
pub use legacy::LegacyCatalog;
pub use reconcile::{reconcile, FieldRule, MergeInputs, Placement, Policy, Reconciler, Source};
pub use record::Record;
pub use store::{EntityDir, EntityStore, LookupKeys};
pub use types::{display_name_from_dir, slugify, Category, Gender};
