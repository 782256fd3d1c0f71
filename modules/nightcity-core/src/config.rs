use anyhow::Result;
use std::path::PathBuf;

use crate::file_config::{load_config, FileConfig};

const DEFAULT_CONFIG_PATH: &str = "nightcity.toml";

/// Effective configuration: the TOML file (if any) with environment overrides applied.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub file: FileConfig,
    /// Config file actually loaded, if one was found.
    pub config_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        // An explicitly named file must exist; the default one is optional.
        let (file, config_path) = match std::env::var("NIGHTCITY_CONFIG").ok() {
            Some(path) => {
                let path = PathBuf::from(path);
                (load_config(&path)?, Some(path))
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    (load_config(&path)?, Some(path))
                } else {
                    (FileConfig::default(), None)
                }
            }
        };

        let mut config = Self { file, config_path };
        config.apply_env();
        config.log_paths();
        Ok(config)
    }

    fn apply_env(&mut self) {
        let paths = &mut self.file.paths;
        if let Ok(dir) = std::env::var("NIGHTCITY_DATA_DIR") {
            paths.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("NIGHTCITY_CACHE_DIR") {
            paths.cache_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("NIGHTCITY_OUTPUT_DIR") {
            paths.output_dir = PathBuf::from(dir);
        }
        if let Ok(base) = std::env::var("NIGHTCITY_IMAGE_BASE_URL") {
            self.file.catalog.image_base_url = Some(base).filter(|b| !b.is_empty());
        }
        if let Ok(bin) = std::env::var("CHROME_BIN") {
            self.file.browser.binary = bin;
        }
    }

    fn log_paths(&self) {
        let paths = &self.file.paths;
        tracing::info!("Config loaded:");
        tracing::info!(
            "  config file: {}",
            self.config_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<defaults>".to_string())
        );
        tracing::info!("  data dir:    {}", paths.data_dir.display());
        tracing::info!("  cache dir:   {}", paths.cache_dir.display());
        tracing::info!("  output dir:  {}", paths.output_dir.display());
        tracing::info!("  wiki api:    {}", self.file.wiki.api_url);
    }
}
