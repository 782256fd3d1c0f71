//! Sequential scrape driver: one entity is fetched, extracted, downloaded and
//! reconciled before the next one starts. A failure costs only that entity.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nightcity_archive::{ImageEnricher, WikiFetcher};
use nightcity_core::store::LookupKeys;
use nightcity_core::{
    slugify, Category, EntityDir, EntityStore, FileConfig, LegacyCatalog, Reconciler, StoreError,
    StoreResult,
};
use tracing::{debug, info, warn};

use crate::builder::{Candidate, EntityBuilder};
use crate::extractor::FieldExtractor;
use crate::images::file_extension;
use crate::stats::RunStats;

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// Cap on subjects per category.
    pub limit: Option<usize>,
    /// Leave characters already in the tree alone.
    pub skip_existing: bool,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            limit: None,
            skip_existing: true,
        }
    }
}

pub struct Scout {
    builder: EntityBuilder,
    fetcher: Arc<dyn WikiFetcher>,
    store: EntityStore,
    reconciler: Reconciler,
    config: Arc<FileConfig>,
    stats: RunStats,
}

impl Scout {
    pub fn new(
        fetcher: Arc<dyn WikiFetcher>,
        enricher: Arc<dyn ImageEnricher>,
        config: Arc<FileConfig>,
    ) -> Self {
        let extractor = Arc::new(FieldExtractor::new(config.heuristics.clone()));
        let builder = EntityBuilder::new(fetcher.clone(), enricher, extractor, config.clone());

        let output_dir = &config.paths.output_dir;
        let reconciler = [
            Category::Characters,
            Category::Gangs,
            Category::Districts,
            Category::Subdistricts,
        ]
        .into_iter()
        .fold(Reconciler::new(), |reconciler, category| {
            reconciler.with_legacy(category, LegacyCatalog::load_for(output_dir, category))
        });

        Self {
            builder,
            fetcher,
            store: EntityStore::new(&config.paths.data_dir),
            reconciler,
            config,
            stats: RunStats::default(),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Scrape the given categories in order and hand back the run's counters.
    pub async fn run(&mut self, categories: &[Category], options: &ScrapeOptions) -> RunStats {
        for category in categories {
            match category {
                Category::Characters => self.scrape_characters(options).await,
                Category::Gangs => self.scrape_gangs(options).await,
                Category::Districts => self.scrape_districts(options).await,
                Category::Subdistricts => {
                    warn!("Subdistricts are scraped together with their districts");
                }
            }
        }
        std::mem::take(&mut self.stats)
    }

    pub async fn scrape_characters(&mut self, options: &ScrapeOptions) {
        let captured = if options.skip_existing {
            self.store.existing_names(Category::Characters)
        } else {
            HashSet::new()
        };

        let titles = self.builder.character_titles(options.limit).await;
        let total = titles.len();
        let pending: Vec<String> = titles
            .into_iter()
            .filter(|title| !is_captured(&captured, title))
            .collect();
        let already = (total - pending.len()) as u32;
        self.stats.skipped += already;
        info!(total, new = pending.len(), existing = already, "Characters to scrape");

        for (i, title) in pending.iter().enumerate() {
            info!(progress = %format!("{}/{}", i + 1, pending.len()), title = %title, "Scraping character");
            self.stats.processed += 1;

            let Some(candidate) = self.builder.character(title).await else {
                warn!(title = %title, "No data, skipping");
                self.stats.failed += 1;
                continue;
            };
            if !candidate.is_acceptable() {
                info!(title = %title, "Nothing worth keeping, skipping");
                self.stats.skipped += 1;
                continue;
            }
            self.store_candidate(Category::Characters, &candidate, None).await;
        }
    }

    pub async fn scrape_gangs(&mut self, options: &ScrapeOptions) {
        let config = self.config.clone();
        let pages = config.gangs.pages.iter().take(options.limit.unwrap_or(usize::MAX));

        for name in pages {
            info!(gang = %name, "Scraping gang");
            self.stats.processed += 1;
            match self.builder.gang(name).await {
                Some(candidate) => {
                    self.store_candidate(Category::Gangs, &candidate, None).await;
                }
                None => {
                    warn!(gang = %name, "No data, skipping");
                    self.stats.failed += 1;
                }
            }
        }
    }

    pub async fn scrape_districts(&mut self, options: &ScrapeOptions) {
        let config = self.config.clone();
        let pages = config.districts.pages.iter().take(options.limit.unwrap_or(usize::MAX));

        for page in pages {
            info!(district = %page.display_name, "Scraping district");
            self.stats.processed += 1;
            let Some(candidate) = self.builder.district(page).await else {
                warn!(district = %page.display_name, "No data, skipping");
                self.stats.failed += 1;
                continue;
            };
            let Some(district_dir) = self.store_candidate(Category::Districts, &candidate, None).await
            else {
                continue;
            };

            for link in &candidate.subdistricts {
                debug!(district = %page.display_name, subdistrict = %link.name, "Scraping subdistrict");
                self.stats.processed += 1;
                match self.builder.subdistrict(link).await {
                    Some(sub) => {
                        self.store_candidate(Category::Subdistricts, &sub, Some(&district_dir.path))
                            .await;
                    }
                    None => {
                        warn!(subdistrict = %link.name, "No data, skipping");
                        self.stats.failed += 1;
                    }
                }
            }
        }
    }

    /// Persist a candidate and record the outcome in the run counters.
    async fn store_candidate(
        &mut self,
        category: Category,
        candidate: &Candidate,
        parent: Option<&Path>,
    ) -> Option<EntityDir> {
        let Some(dir) = self.resolve_dir(category, candidate, parent) else {
            warn!(key = %candidate.key, "Cannot derive a directory name, skipping");
            self.stats.skipped += 1;
            return None;
        };

        match self.persist(category, candidate, &dir).await {
            Ok(record) => {
                let images = record.get("images").and_then(|v| v.as_array()).map_or(0, Vec::len);
                self.stats.success += 1;
                if images == 0 {
                    self.stats.no_images += 1;
                }
                info!(
                    category = %category,
                    name = record.get_str("name").unwrap_or_default(),
                    directory = %dir.directory,
                    images,
                    "Saved"
                );
                Some(dir)
            }
            Err(e) => {
                warn!(key = %candidate.key, error = %e, "Failed to save entity");
                self.stats.failed += 1;
                None
            }
        }
    }

    async fn persist(
        &mut self,
        category: Category,
        candidate: &Candidate,
        dir: &EntityDir,
    ) -> StoreResult<nightcity_core::Record> {
        tokio::fs::create_dir_all(&dir.path)
            .await
            .map_err(|source| StoreError::Io {
                path: dir.path.clone(),
                source,
            })?;
        self.download_images(dir, &candidate.image_urls).await;
        self.reconciler
            .reconcile_entity(category, dir, Some(&candidate.record))
    }

    /// Reuse the directory of an entity already on disk, else place a new one.
    fn resolve_dir(
        &self,
        category: Category,
        candidate: &Candidate,
        parent: Option<&Path>,
    ) -> Option<EntityDir> {
        let name = candidate.name().unwrap_or(&candidate.key);
        let mut slugs = vec![slugify(name)];
        let key_slug = slugify(&candidate.key);
        if !slugs.contains(&key_slug) {
            slugs.push(key_slug);
        }
        slugs.retain(|s| !s.is_empty());

        let keys = LookupKeys {
            slugs: slugs.clone(),
            names: vec![name.to_string(), candidate.key.clone()],
            wiki_url: candidate.wiki_url().map(str::to_string),
        };
        if let Some(existing) = self.store.locate(category, parent, &keys) {
            debug!(directory = %existing.directory, "Reusing existing directory");
            return Some(existing);
        }

        let directory = slugs.first()?;
        Some(
            self.store
                .placement(category, directory, candidate.gender, parent),
        )
    }

    /// Download missing images as `{directory}_{NN}{ext}`. Existing files are kept.
    async fn download_images(&mut self, dir: &EntityDir, urls: &[String]) {
        for (i, url) in urls.iter().enumerate() {
            let filename = format!("{}_{:02}{}", dir.directory, i + 1, file_extension(url));
            let path: PathBuf = dir.path.join(&filename);
            if path.exists() {
                debug!(file = %filename, "Image already on disk");
                continue;
            }
            let Some(bytes) = self.fetcher.download(url).await else {
                continue;
            };
            match tokio::fs::write(&path, &bytes).await {
                Ok(()) => {
                    debug!(file = %filename, bytes = bytes.len(), "Image saved");
                    self.stats.images += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to write image"),
            }
        }
    }
}

fn is_captured(captured: &HashSet<String>, title: &str) -> bool {
    captured.contains(&slugify(title)) || captured.contains(&title.to_lowercase())
}
