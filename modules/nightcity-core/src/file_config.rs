use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::heuristics::HeuristicTables;

/// TOML-backed configuration loaded from disk.
/// Every section falls back to built-in defaults, so an absent file is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub wiki: WikiConfig,
    pub paths: PathsConfig,
    pub catalog: CatalogConfig,
    pub characters: CharactersConfig,
    pub gangs: GangsConfig,
    pub districts: DistrictsConfig,
    pub browser: BrowserConfig,
    pub heuristics: HeuristicTables,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WikiConfig {
    pub api_url: String,
    /// Article prefix; page titles are appended with spaces as underscores.
    pub wiki_url: String,
    pub user_agent: String,
    /// Pause before every uncached request.
    pub request_delay_ms: u64,
    /// Pause before every image download.
    pub download_delay_ms: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// When set, catalog images are published as absolute URLs under this base.
    pub image_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CharactersConfig {
    pub categories: Vec<String>,
    pub skip_patterns: Vec<String>,
    pub image_cap: usize,
    /// How many file titles from the parse payload get an imageinfo lookup.
    pub api_image_lookups: usize,
    /// How many gallery thumbnails are considered.
    pub gallery_scan: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GangsConfig {
    pub pages: Vec<String>,
    pub image_cap: usize,
    /// Non-decorative images kept before decorative ones backfill.
    pub primary_image_cap: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DistrictsConfig {
    pub pages: Vec<DistrictPage>,
    pub image_cap: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistrictPage {
    pub wiki_name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub enabled: bool,
    pub binary: String,
    pub timeout_secs: u64,
    pub image_cap: usize,
    /// Only image URLs on this host are kept from the rendered DOM.
    pub host_filter: String,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://cyberpunk.fandom.com/api.php".to_string(),
            wiki_url: "https://cyberpunk.fandom.com/wiki/".to_string(),
            user_agent: "NightCityBot/1.0 (Educational Project)".to_string(),
            request_delay_ms: 500,
            download_delay_ms: 300,
            timeout_secs: 30,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("images"),
            cache_dir: PathBuf::from("scraper/cache"),
            output_dir: PathBuf::from("docs/api/v1"),
        }
    }
}

impl Default for CharactersConfig {
    fn default() -> Self {
        Self {
            categories: vec![
                "Cyberpunk 2077 Characters".to_string(),
                "Cyberpunk 2077 - Phantom Liberty Characters".to_string(),
                "Cyberpunk: Edgerunners Characters".to_string(),
            ],
            skip_patterns: [
                "members",
                "list of",
                "category:",
                "template:",
                "file:",
                "user:",
                "talk:",
                "minor characters",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            image_cap: 5,
            api_image_lookups: 8,
            gallery_scan: 5,
        }
    }
}

impl Default for GangsConfig {
    fn default() -> Self {
        Self {
            pages: [
                "6th Street",
                "Animals",
                "Barghest",
                "Maelstrom",
                "Moxes",
                "Scavengers",
                "Tyger Claws",
                "Valentinos",
                "Voodoo Boys",
                "Wraiths",
                "Aldecaldos",
                "Raffens",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            image_cap: 8,
            primary_image_cap: 6,
        }
    }
}

impl Default for DistrictsConfig {
    fn default() -> Self {
        let pages = [
            ("Watson (2077)", "Watson"),
            ("Westbrook (2077)", "Westbrook"),
            ("City Center (2077)", "City Center"),
            ("Heywood (2077)", "Heywood"),
            ("Pacifica (2077)", "Pacifica"),
            ("Santo Domingo (2077)", "Santo Domingo"),
            ("Badlands", "Badlands"),
            ("Dogtown", "Dogtown"),
        ]
        .iter()
        .map(|(wiki_name, display_name)| DistrictPage {
            wiki_name: wiki_name.to_string(),
            display_name: display_name.to_string(),
        })
        .collect();

        Self {
            pages,
            image_cap: 10,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            binary: "chromium".to_string(),
            timeout_secs: 30,
            image_cap: 8,
            host_filter: "static.wikia.nocookie.net".to_string(),
        }
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}
