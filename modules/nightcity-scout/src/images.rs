//! Image URL canonicalization and per-category candidate ranking.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::document::KeyedImage;

/// Fandom serves resized variants as path suffixes after `/revision/latest`.
static RESIZE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/revision/latest/[^?#]*").expect("valid regex"));

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp"];

/// Normalize an image URL to one stable form, or reject it.
///
/// Protocol-relative URLs get `https:`, resize/crop suffixes collapse to
/// `/revision/latest`, the `cb` cache-buster is dropped (other query
/// parameters stay), and some path segment must name an image file.
/// Applying it twice gives the same result as applying it once.
pub fn canonicalize_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") {
        return None;
    }
    let absolute = match raw.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => raw.to_string(),
    };

    let mut url = Url::parse(&absolute).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    let path = RESIZE_SUFFIX_RE
        .replace(url.path(), "/revision/latest")
        .into_owned();
    url.set_path(&path);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "cb")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.set_fragment(None);

    let names_image = url
        .path_segments()
        .map(|mut segments| segments.any(is_image_name))
        .unwrap_or(false);
    names_image.then(|| url.to_string())
}

fn is_image_name(segment: &str) -> bool {
    let lower = segment.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Canonicalize, drop rejects and duplicates, keep discovery order, cap.
pub fn collect_canonical<I, S>(candidates: I, cap: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter_map(|raw| canonicalize_url(raw.as_ref()))
        .filter(|url| seen.insert(url.clone()))
        .take(cap)
        .collect()
}

fn mentions_any(image: &KeyedImage, keywords: &[String]) -> bool {
    let key = image.key.to_lowercase();
    let alt = image.alt.to_lowercase();
    keywords
        .iter()
        .any(|k| key.contains(k.as_str()) || alt.contains(k.as_str()))
}

/// Gallery ranking: up to `primary_cap` non-decorative images, then
/// decorative ones backfill until `cap`.
pub fn rank_gallery(
    images: &[KeyedImage],
    decorative: &[String],
    primary_cap: usize,
    cap: usize,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut primary = Vec::new();
    let mut backfill = Vec::new();

    for image in images {
        let Some(url) = canonicalize_url(&image.src) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }
        if mentions_any(image, decorative) {
            backfill.push(url);
        } else {
            primary.push(url);
        }
    }

    primary.truncate(primary_cap.min(cap));
    let room = cap.saturating_sub(primary.len());
    primary.extend(backfill.into_iter().take(room));
    primary
}

/// Page images minus navigation chrome, capped.
pub fn page_images(images: &[KeyedImage], skip: &[String], cap: usize) -> Vec<String> {
    let kept = images.iter().filter(|image| {
        let key = image.key.to_lowercase();
        !skip.iter().any(|k| key.contains(k.as_str()))
    });
    collect_canonical(kept.map(|image| image.src.as_str()), cap)
}

/// File titles worth an imageinfo lookup: the first `limit` titles, minus
/// those naming interface assets.
pub fn lookup_titles<'a>(titles: &'a [String], skip: &[String], limit: usize) -> Vec<&'a str> {
    titles
        .iter()
        .take(limit)
        .filter(|title| {
            let lower = title.to_lowercase();
            !skip.iter().any(|k| lower.contains(k.as_str()))
        })
        .map(String::as_str)
        .collect()
}

/// Local file extension for a downloaded image.
pub fn file_extension(url: &str) -> &'static str {
    let lower = url.to_lowercase();
    let name = lower.split("/revision/").next().unwrap_or(&lower);
    if name.contains(".jpg") || name.contains(".jpeg") {
        ".jpg"
    } else if name.contains(".webp") {
        ".webp"
    } else if name.contains(".gif") {
        ".gif"
    } else {
        ".png"
    }
}
