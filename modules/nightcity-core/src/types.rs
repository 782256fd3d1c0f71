use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static NON_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));

/// The kinds of wiki subject the pipeline tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Characters,
    Gangs,
    Districts,
    Subdistricts,
}

impl Category {
    /// Categories that own a catalog file. Subdistricts only exist nested under districts.
    pub const TOP_LEVEL: [Category; 3] = [Category::Characters, Category::Gangs, Category::Districts];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Characters => "characters",
            Category::Gangs => "gangs",
            Category::Districts => "districts",
            Category::Subdistricts => "subdistricts",
        }
    }

    /// File name of the aggregate catalog for this category.
    pub fn catalog_file(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "characters" => Ok(Category::Characters),
            "gangs" => Ok(Category::Gangs),
            "districts" => Ok(Category::Districts),
            "subdistricts" => Ok(Category::Subdistricts),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Gender {
    /// Bucket order used when walking the character tree.
    pub const BUCKETS: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Unknown => "Unknown",
        }
    }

    /// Directory name of the on-disk bucket for this gender.
    pub fn bucket(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unknown => "unknown",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "unknown" => Some(Gender::Unknown),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Gender::Unknown)
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the on-disk directory slug from a display name.
///
/// Drops everything except word characters, whitespace and `-`, trims,
/// lowercases and turns spaces into underscores.
pub fn slugify(name: &str) -> String {
    NON_SLUG_RE
        .replace_all(name, "")
        .trim()
        .to_lowercase()
        .replace(' ', "_")
}

/// Readable name for a directory that has no recorded name.
pub fn display_name_from_dir(directory: &str) -> String {
    directory
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_strips_punctuation_and_joins_words() {
        assert_eq!(slugify("Jackie Welles"), "jackie_welles");
        assert_eq!(slugify("  Rogue Amendiares "), "rogue_amendiares");
        assert_eq!(slugify("T-Bug"), "t-bug");
        assert_eq!(slugify("Adam Smasher (2077)"), "adam_smasher_2077");
        assert_eq!(slugify("Kerry Eurodyne!"), "kerry_eurodyne");
    }

    #[test]
    fn slug_keeps_unicode_word_characters() {
        assert_eq!(slugify("Nômade São"), "nômade_são");
    }

    #[test]
    fn slug_is_stable() {
        let once = slugify("Goro Takemura");
        assert_eq!(slugify(&once), once);
    }

    #[test]
    fn display_name_title_cases_words() {
        assert_eq!(display_name_from_dir("jackie_welles"), "Jackie Welles");
        assert_eq!(display_name_from_dir("6th_street"), "6th Street");
        assert_eq!(display_name_from_dir("watson"), "Watson");
    }

    #[test]
    fn category_round_trips_through_str() {
        for category in Category::TOP_LEVEL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        assert!("corporations".parse::<Category>().is_err());
    }

    #[test]
    fn gender_labels() {
        assert_eq!(Gender::from_label("Female"), Some(Gender::Female));
        assert_eq!(Gender::from_label(" male "), Some(Gender::Male));
        assert_eq!(Gender::from_label("robot"), None);
        assert_eq!(Gender::Unknown.bucket(), "unknown");
    }
}
