//! Read-only view over a Fandom article (full page or parse-API fragment).
//!
//! `WikiDocument` wraps a `scraper::Html`, which is not `Send`: parse, pull
//! out owned values, and drop it before the next `.await`.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};

use crate::text::{clean_opt, clean_text};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static INFOBOX: LazyLock<Selector> = LazyLock::new(|| selector(".portable-infobox"));
static DATA_SOURCE: LazyLock<Selector> = LazyLock::new(|| selector("[data-source]"));
static PI_VALUE: LazyLock<Selector> = LazyLock::new(|| selector(".pi-data-value"));
static PI_LABEL: LazyLock<Selector> = LazyLock::new(|| selector(".pi-data-label"));
static PI_ROW: LazyLock<Selector> = LazyLock::new(|| selector(".pi-data"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a"));
static LINK_HREF: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static OG_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[property="og:description"]"#));
static CONTENT: LazyLock<Selector> = LazyLock::new(|| selector(".mw-parser-output"));
static KEYED_IMG: LazyLock<Selector> = LazyLock::new(|| selector("img[data-image-key]"));
static HERO_IMG: LazyLock<Selector> =
    LazyLock::new(|| selector(".pi-image-thumbnail, .pi-image img"));
static HERO_IMG_LOOSE: LazyLock<Selector> =
    LazyLock::new(|| selector(".pi-image-thumbnail, .pi-image img, .image img"));
static GALLERY_IMG: LazyLock<Selector> =
    LazyLock::new(|| selector(".wikia-gallery-item img, .gallery img, .thumbimage"));

/// Classes whose text never counts as article prose.
const HIDDEN_CLASSES: &[&str] = &["reference", "mw-editsection"];
const HIDDEN_TAGS: &[&str] = &["script", "style"];

/// A link found under a section heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLink {
    /// Link text.
    pub name: String,
    /// Article path after `/wiki/`, as written in the href.
    pub page: String,
}

/// An `img[data-image-key]` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedImage {
    pub key: String,
    pub alt: String,
    pub src: String,
}

pub struct WikiDocument {
    html: Html,
}

impl WikiDocument {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    fn infobox(&self) -> Option<ElementRef<'_>> {
        self.html.select(&INFOBOX).next()
    }

    fn content(&self) -> Option<ElementRef<'_>> {
        self.html.select(&CONTENT).next()
    }

    /// The `.pi-data-value` element of the info-box row with `data-source == source`.
    fn infobox_value_element(&self, source: &str) -> Option<ElementRef<'_>> {
        let infobox = self.infobox()?;
        infobox
            .select(&DATA_SOURCE)
            .filter(|el| el.value().attr("data-source") == Some(source))
            .find_map(|el| el.select(&PI_VALUE).next())
    }

    /// Cleaned text of one info-box row.
    pub fn infobox_value(&self, source: &str) -> Option<String> {
        self.infobox_value_element(source)
            .and_then(|el| clean_opt(&visible_text(el)))
    }

    /// First non-empty info-box value among `sources`, tried in order.
    pub fn infobox_value_any(&self, sources: &[String]) -> Option<String> {
        sources.iter().find_map(|source| self.infobox_value(source))
    }

    /// Link texts of the first info-box row among `sources` that exists.
    pub fn infobox_links(&self, sources: &[String]) -> Vec<String> {
        let Some(value) = sources.iter().find_map(|s| self.infobox_value_element(s)) else {
            return Vec::new();
        };
        value
            .select(&LINK)
            .filter_map(|a| clean_opt(&a.text().collect::<String>()))
            .collect()
    }

    /// `(label, value)` text of every labelled info-box row.
    pub fn infobox_pairs(&self) -> Vec<(String, String)> {
        let Some(infobox) = self.infobox() else {
            return Vec::new();
        };
        infobox
            .select(&PI_ROW)
            .filter_map(|row| {
                let label = row.select(&PI_LABEL).next()?;
                let value = row.select(&PI_VALUE).next()?;
                Some((clean_text(&visible_text(label)), clean_text(&visible_text(value))))
            })
            .collect()
    }

    /// `og:description` content, when the page carries one.
    pub fn meta_description(&self) -> Option<String> {
        self.html
            .select(&OG_DESCRIPTION)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .and_then(clean_opt)
    }

    /// Cleaned text of each top-level paragraph of the article body.
    pub fn content_paragraphs(&self) -> Vec<String> {
        let Some(content) = self.content() else {
            return Vec::new();
        };
        content
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "p")
            .map(|p| clean_text(&visible_text(p)))
            .filter(|text| !text.is_empty())
            .collect()
    }

    /// Links listed under the first heading mentioning sub-districts, up to
    /// the next heading of the same or higher level. Deduplicated by name.
    pub fn subdistrict_links(&self) -> Vec<SectionLink> {
        let Some(content) = self.content() else {
            return Vec::new();
        };

        let mut blocks = content.children().filter_map(ElementRef::wrap);
        let Some(level) = blocks.by_ref().find_map(|el| {
            let level = heading_level(&el)?;
            let title = visible_text(el).to_lowercase();
            (level <= 3 && (title.contains("sub-district") || title.contains("subdistrict")))
                .then_some(level)
        }) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for block in blocks {
            if heading_level(&block).is_some_and(|l| l <= level) {
                break;
            }
            for a in block.select(&LINK_HREF) {
                let Some(href) = a.value().attr("href") else {
                    continue;
                };
                let Some((_, page)) = href.rsplit_once("/wiki/") else {
                    continue;
                };
                let Some(name) = clean_opt(&a.text().collect::<String>()) else {
                    continue;
                };
                if page.is_empty() || name.eq_ignore_ascii_case("edit") {
                    continue;
                }
                if seen.insert(name.clone()) {
                    links.push(SectionLink {
                        name,
                        page: page.to_string(),
                    });
                }
            }
        }
        links
    }

    /// Every `img[data-image-key]`, in document order.
    pub fn keyed_images(&self) -> Vec<KeyedImage> {
        self.html
            .select(&KEYED_IMG)
            .filter_map(|img| {
                let src = image_src(img)?;
                Some(KeyedImage {
                    key: img.value().attr("data-image-key").unwrap_or_default().to_string(),
                    alt: img.value().attr("alt").unwrap_or_default().to_string(),
                    src,
                })
            })
            .collect()
    }

    /// Primary info-box image. `loose` also accepts any inline `.image img`.
    pub fn hero_image(&self, loose: bool) -> Option<String> {
        let css = if loose { &*HERO_IMG_LOOSE } else { &*HERO_IMG };
        self.html.select(css).next().and_then(image_src)
    }

    /// Sources of the first `limit` gallery/thumbnail images.
    pub fn gallery_images(&self, limit: usize) -> Vec<String> {
        self.html
            .select(&GALLERY_IMG)
            .take(limit)
            .filter_map(image_src)
            .collect()
    }
}

/// Text of an element, skipping reference markers, edit links, scripts and styles.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_visible_text(element, &mut out);
    out
}

fn push_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    if !is_hidden(&el) {
                        push_visible_text(el, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn is_hidden(el: &ElementRef<'_>) -> bool {
    let value = el.value();
    HIDDEN_TAGS.contains(&value.name()) || value.classes().any(|c| HIDDEN_CLASSES.contains(&c))
}

fn heading_level(el: &ElementRef<'_>) -> Option<u8> {
    match el.value().name() {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// `src`, unless it is an inline placeholder, else `data-src`.
fn image_src(img: ElementRef<'_>) -> Option<String> {
    let value = img.value();
    let src = value.attr("src").filter(|s| !s.is_empty() && !s.starts_with("data:"));
    src.or_else(|| value.attr("data-src"))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
