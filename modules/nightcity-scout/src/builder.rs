//! Composes extractor and image-discovery output into one candidate per wiki subject.

use std::collections::HashSet;
use std::sync::Arc;

use nightcity_archive::{ImageEnricher, WikiFetcher};
use nightcity_core::file_config::{DistrictPage, FileConfig};
use nightcity_core::{Gender, Record};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::document::{SectionLink, WikiDocument};
use crate::extractor::{FieldExtractor, GenderEvidence};
use crate::images::{collect_canonical, lookup_titles, page_images, rank_gallery};

const CATEGORY_PAGE_SIZE: &str = "50";

/// A freshly scraped subject, ready for reconciliation.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Page key the subject was scraped under (title or configured name).
    pub key: String,
    pub record: Record,
    /// Canonical image URLs, best first.
    pub image_urls: Vec<String>,
    /// Characters only: decides the bucket of a new directory.
    pub gender: Gender,
    /// Districts only: subdistricts listed on the page.
    pub subdistricts: Vec<SectionLink>,
}

impl Candidate {
    pub fn name(&self) -> Option<&str> {
        self.record.get_str("name")
    }

    pub fn wiki_url(&self) -> Option<&str> {
        self.record.get_str("wiki_url")
    }

    /// Worth keeping: a name plus a description or at least one image.
    pub fn is_acceptable(&self) -> bool {
        self.name().is_some() && (self.record.present("description").is_some() || !self.image_urls.is_empty())
    }
}

#[derive(Debug, Serialize)]
struct CharacterFields {
    name: String,
    gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    affiliation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    occupation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    wiki_url: String,
}

#[derive(Debug, Serialize)]
struct GangFields {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    founder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    leader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    territory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    members_count: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    affiliations: Vec<String>,
    wiki_url: String,
}

#[derive(Debug, Serialize)]
struct DistrictFields {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    danger_level: Option<String>,
    subdistricts: Vec<String>,
    wiki_url: String,
}

#[derive(Debug, Serialize)]
struct SubdistrictFields {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    wiki_url: String,
}

/// Article URL for a page title: spaces become underscores, the rest is percent-encoded.
pub fn article_url(base: &str, title: &str) -> String {
    let page = title.trim().replace(' ', "_");
    match url::Url::parse(base) {
        Ok(mut url) if !url.cannot_be_a_base() => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().push(&page);
            }
            url.to_string()
        }
        _ => format!("{base}{page}"),
    }
}

pub struct EntityBuilder {
    fetcher: Arc<dyn WikiFetcher>,
    enricher: Arc<dyn ImageEnricher>,
    extractor: Arc<FieldExtractor>,
    config: Arc<FileConfig>,
}

impl EntityBuilder {
    pub fn new(
        fetcher: Arc<dyn WikiFetcher>,
        enricher: Arc<dyn ImageEnricher>,
        extractor: Arc<FieldExtractor>,
        config: Arc<FileConfig>,
    ) -> Self {
        Self {
            fetcher,
            enricher,
            extractor,
            config,
        }
    }

    fn skipped_title(&self, title: &str) -> bool {
        let lower = title.to_lowercase();
        self.config
            .characters
            .skip_patterns
            .iter()
            .any(|p| lower.contains(&p.to_lowercase()))
    }

    /// Page titles in one wiki category, following continuation tokens.
    pub async fn category_members(&self, category: &str, limit: Option<usize>) -> Vec<String> {
        let cmtitle = format!("Category:{category}");
        let mut titles = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![
                ("action", "query"),
                ("list", "categorymembers"),
                ("cmtitle", cmtitle.as_str()),
                ("cmlimit", CATEGORY_PAGE_SIZE),
                ("cmtype", "page"),
            ];
            if let Some(token) = cursor.as_deref() {
                params.push(("cmcontinue", token));
            }

            let Some(payload) = self.fetcher.api(&params).await else {
                break;
            };
            let Some(members) = payload
                .pointer("/query/categorymembers")
                .and_then(Value::as_array)
            else {
                break;
            };

            titles.extend(
                members
                    .iter()
                    .filter_map(|m| m.get("title").and_then(Value::as_str))
                    .filter(|t| !self.skipped_title(t))
                    .map(str::to_string),
            );

            if limit.is_some_and(|l| titles.len() >= l) {
                break;
            }
            match payload.pointer("/continue/cmcontinue").and_then(Value::as_str) {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }

        info!(category, pages = titles.len(), "Enumerated category");
        titles
    }

    /// Character titles across every configured category, deduplicated.
    pub async fn character_titles(&self, limit: Option<usize>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut titles = Vec::new();
        for category in &self.config.characters.categories {
            for title in self.category_members(category, limit).await {
                if seen.insert(title.clone()) {
                    titles.push(title);
                    if limit.is_some_and(|l| titles.len() >= l) {
                        return titles;
                    }
                }
            }
        }
        titles
    }

    async fn image_info_url(&self, file_title: &str) -> Option<String> {
        let titles = format!("File:{file_title}");
        let payload = self
            .fetcher
            .api(&[
                ("action", "query"),
                ("titles", titles.as_str()),
                ("prop", "imageinfo"),
                ("iiprop", "url"),
            ])
            .await?;
        let pages = payload.pointer("/query/pages")?.as_object()?;
        pages
            .iter()
            .filter(|(id, _)| id.as_str() != "-1")
            .find_map(|(_, page)| page.pointer("/imageinfo/0/url").and_then(Value::as_str))
            .map(str::to_string)
    }

    async fn browser_images(&self, page_url: &str) -> Vec<String> {
        let browser = &self.config.browser;
        if !browser.enabled {
            return Vec::new();
        }
        let found = self.enricher.images(page_url).await;
        collect_canonical(found, browser.image_cap)
    }

    /// Scrape one character through the parse API.
    pub async fn character(&self, title: &str) -> Option<Candidate> {
        let payload = self
            .fetcher
            .api(&[
                ("action", "parse"),
                ("page", title),
                ("prop", "text|images"),
                ("disablelimitreport", "1"),
            ])
            .await?;
        let Some(parse) = payload.get("parse") else {
            warn!(title, "Parse payload without content");
            return None;
        };
        let html = parse.pointer("/text/*").and_then(Value::as_str).unwrap_or_default();
        let file_titles: Vec<String> = parse
            .get("images")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        let settings = &self.config.characters;
        let tables = self.extractor.tables();
        let wiki_url = article_url(&self.config.wiki.wiki_url, title);

        let (fields, gender_source, hero, gallery) = {
            let doc = WikiDocument::parse(html);
            let description = self.extractor.description(&doc, tables.description.page);
            let outcome = self.extractor.gender(&GenderEvidence {
                document: &doc,
                name: title,
                description: description.as_deref(),
            });
            let fields = CharacterFields {
                name: title.to_string(),
                gender: outcome.gender,
                affiliation: self.extractor.affiliation(&doc),
                description,
                occupation: doc.infobox_value_any(&tables.fields.occupation),
                status: doc.infobox_value_any(&tables.fields.status),
                wiki_url: wiki_url.clone(),
            };
            (
                fields,
                outcome.decided_by,
                doc.hero_image(true),
                doc.gallery_images(settings.gallery_scan),
            )
        };

        let mut candidates: Vec<String> = hero.into_iter().collect();
        for file_title in lookup_titles(&file_titles, &tables.images.lookup_skip, settings.api_image_lookups) {
            if let Some(url) = self.image_info_url(file_title).await {
                candidates.push(url);
            }
        }
        candidates.extend(gallery);
        candidates.extend(self.browser_images(&wiki_url).await);
        let image_urls = collect_canonical(candidates, settings.image_cap);

        debug!(
            title,
            gender = %fields.gender,
            gender_source = gender_source.unwrap_or("default"),
            images = image_urls.len(),
            "Built character candidate"
        );

        Some(Candidate {
            key: title.to_string(),
            gender: fields.gender,
            record: Record::from_serialize(&fields),
            image_urls,
            subdistricts: Vec::new(),
        })
    }

    /// Scrape one gang page plus its `/Gallery` subpage.
    pub async fn gang(&self, name: &str) -> Option<Candidate> {
        let page_url = article_url(&self.config.wiki.wiki_url, name);
        let html = self.fetcher.page(&page_url).await?;
        let tables = self.extractor.tables();
        let settings = &self.config.gangs;

        let (fields, hero) = {
            let doc = WikiDocument::parse(&html);
            let fields = GangFields {
                name: name.to_string(),
                description: self.extractor.description(&doc, tables.description.page),
                founder: doc.infobox_value_any(&tables.fields.founder),
                leader: doc.infobox_value_any(&tables.fields.leader),
                hq: doc.infobox_value_any(&tables.fields.hq),
                territory: doc.infobox_value_any(&tables.fields.territory),
                members_count: self.extractor.members_count(&doc),
                affiliations: self.extractor.affiliations(&doc),
                wiki_url: page_url.clone(),
            };
            (fields, doc.hero_image(false))
        };

        let gallery_url = format!("{page_url}/Gallery");
        let mut image_urls = match self.fetcher.page(&gallery_url).await {
            Some(gallery_html) => {
                let keyed = WikiDocument::parse(&gallery_html).keyed_images();
                rank_gallery(
                    &keyed,
                    &tables.images.decorative,
                    settings.primary_image_cap,
                    settings.image_cap,
                )
            }
            None => Vec::new(),
        };
        if image_urls.is_empty() {
            image_urls = collect_canonical(hero, settings.image_cap);
        }

        Some(Candidate {
            key: name.to_string(),
            record: Record::from_serialize(&fields),
            image_urls,
            gender: Gender::Unknown,
            subdistricts: Vec::new(),
        })
    }

    /// Scrape one district page, including its subdistrict listing.
    pub async fn district(&self, page: &DistrictPage) -> Option<Candidate> {
        let page_url = article_url(&self.config.wiki.wiki_url, &page.wiki_name);
        let html = self.fetcher.page(&page_url).await?;
        let tables = self.extractor.tables();

        let doc = WikiDocument::parse(&html);
        let subdistricts = doc.subdistrict_links();
        let fields = DistrictFields {
            name: page.display_name.clone(),
            description: self.extractor.description(&doc, tables.description.page),
            danger_level: doc.infobox_value_any(&tables.fields.danger_level),
            subdistricts: subdistricts.iter().map(|s| s.name.clone()).collect(),
            wiki_url: page_url,
        };
        let image_urls = page_images(
            &doc.keyed_images(),
            &tables.images.page_skip,
            self.config.districts.image_cap,
        );

        Some(Candidate {
            key: page.wiki_name.clone(),
            record: Record::from_serialize(&fields),
            image_urls,
            gender: Gender::Unknown,
            subdistricts,
        })
    }

    /// Scrape one subdistrict linked from a district page.
    pub async fn subdistrict(&self, link: &SectionLink) -> Option<Candidate> {
        let page_url = format!("{}{}", self.config.wiki.wiki_url, link.page);
        let html = self.fetcher.page(&page_url).await?;
        let tables = self.extractor.tables();

        let doc = WikiDocument::parse(&html);
        let fields = SubdistrictFields {
            name: link.name.clone(),
            description: self.extractor.description(&doc, tables.description.subdistrict),
            wiki_url: page_url,
        };
        let image_urls = page_images(
            &doc.keyed_images(),
            &tables.images.page_skip,
            self.config.districts.image_cap,
        );

        Some(Candidate {
            key: link.page.clone(),
            record: Record::from_serialize(&fields),
            image_urls,
            gender: Gender::Unknown,
            subdistricts: Vec::new(),
        })
    }
}
