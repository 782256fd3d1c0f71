//! Lookup tables driving the field-extraction heuristics.
//!
//! Everything here is plain data, deserialized from the `[heuristics]` section
//! of the config file and handed to the extractor at construction. The
//! defaults reproduce the tables tuned against the Cyberpunk wiki.

use serde::{Deserialize, Serialize};

use crate::types::Gender;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicTables {
    pub fields: FieldSynonyms,
    /// Ordered: the first keyword contained in the raw text wins.
    pub affiliation_keywords: Vec<KeywordMapping>,
    pub known_subjects: Vec<KnownSubject>,
    pub gender: GenderLexicon,
    pub description: DescriptionRules,
    pub images: ImageKeywords,
}

/// Info-box `data-source` names tried, in order, for each field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSynonyms {
    pub gender: Vec<String>,
    pub affiliation: Vec<String>,
    pub occupation: Vec<String>,
    pub status: Vec<String>,
    pub founder: Vec<String>,
    pub leader: Vec<String>,
    pub hq: Vec<String>,
    pub territory: Vec<String>,
    pub members_count: Vec<String>,
    pub affiliations: Vec<String>,
    pub danger_level: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordMapping {
    pub keyword: String,
    pub canonical: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownSubject {
    pub name: String,
    pub gender: Gender,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenderLexicon {
    /// Info-box `data-source` names scanned by the looser second pass.
    pub loose_sources: Vec<String>,
    /// Info-box label fragments that mark a gender row.
    pub label_keywords: Vec<String>,
    pub female_keywords: Vec<String>,
    pub male_keywords: Vec<String>,
    pub female_pronouns: Vec<String>,
    pub male_pronouns: Vec<String>,
    pub female_phrases: Vec<String>,
    pub male_phrases: Vec<String>,
    /// Minimum pronoun count before the frequency heuristic may decide.
    pub min_pronoun_evidence: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptionRules {
    pub boilerplate_prefixes: Vec<String>,
    /// Shortest summary (og:description) accepted before falling back to paragraphs.
    pub min_summary_len: usize,
    pub page: DescriptionBudget,
    pub subdistrict: DescriptionBudget,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DescriptionBudget {
    pub min_paragraph_len: usize,
    pub max_paragraphs: usize,
    pub max_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageKeywords {
    /// File titles containing any of these are never looked up.
    pub lookup_skip: Vec<String>,
    /// Page images whose key contains any of these are dropped.
    pub page_skip: Vec<String>,
    /// Gallery images whose key contains any of these rank last.
    pub decorative: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for HeuristicTables {
    fn default() -> Self {
        let affiliation_keywords = [
            ("arasaka", "Arasaka"),
            ("militech", "Militech"),
            ("kang tao", "Kang Tao"),
            ("biotechnica", "Biotechnica"),
            ("trauma team", "Trauma Team"),
            ("netwatch", "NetWatch"),
            ("maelstrom", "Maelstrom"),
            ("tyger claws", "Tyger Claws"),
            ("valentinos", "Valentinos"),
            ("6th street", "6th Street"),
            ("animals", "Animals"),
            ("voodoo boys", "Voodoo Boys"),
            ("the mox", "The Mox"),
            ("moxes", "The Mox"),
            ("scavengers", "Scavengers"),
            ("wraiths", "Wraiths"),
            ("aldecaldos", "Aldecaldos"),
            ("barghest", "Barghest"),
            ("ncpd", "NCPD"),
            ("max-tac", "MaxTac"),
            ("maxtac", "MaxTac"),
            ("afterlife", "Afterlife"),
            ("netrunner", "Netrunner"),
            ("fixer", "Fixer"),
            ("mercenary", "Mercenário"),
            ("mercenário", "Mercenário"),
            ("solo", "Solo"),
            ("nomad", "Nômade"),
            ("nômade", "Nômade"),
            ("rockerboy", "Rockerboy"),
            ("media", "Mídia"),
            ("corpo", "Corporação"),
        ]
        .into_iter()
        .map(|(keyword, canonical)| KeywordMapping {
            keyword: keyword.to_string(),
            canonical: canonical.to_string(),
        })
        .collect();

        let known_subjects = [
            "judy alvarez",
            "panam palmer",
            "alt cunningham",
            "rogue amendiares",
            "evelyn parker",
            "misty olszewski",
            "claire russell",
            "hanako arasaka",
            "regina jones",
            "meredith stout",
            "blue moon",
            "lizzy wizzy",
            "songbird",
            "alena xenakis",
            "ana friedman",
            "rita wheeler",
            "sandra dorsett",
            "michiko arasaka",
            "t-bug",
        ]
        .into_iter()
        .map(|name| KnownSubject {
            name: name.to_string(),
            gender: Gender::Female,
        })
        .collect();

        Self {
            fields: FieldSynonyms::default(),
            affiliation_keywords,
            known_subjects,
            gender: GenderLexicon::default(),
            description: DescriptionRules::default(),
            images: ImageKeywords::default(),
        }
    }
}

impl Default for FieldSynonyms {
    fn default() -> Self {
        Self {
            gender: strings(&["gender", "sex", "Gender", "Sex"]),
            affiliation: strings(&["affiliation", "faction", "gang", "employer", "group", "Affiliation"]),
            occupation: strings(&["role", "occupation", "profession", "job", "class", "Role"]),
            status: strings(&["status", "state", "Status"]),
            founder: strings(&["founder", "founders"]),
            leader: strings(&["leadership", "leader"]),
            hq: strings(&["hq", "headquarters"]),
            territory: strings(&["location", "locations", "territory"]),
            members_count: strings(&["members", "number"]),
            affiliations: strings(&["affiliation", "affiliations"]),
            danger_level: strings(&["danger", "threat"]),
        }
    }
}

impl Default for GenderLexicon {
    fn default() -> Self {
        Self {
            loose_sources: strings(&["gender", "sex", "Gender", "Sex", "GENDER", "SEX"]),
            label_keywords: strings(&["gender", "sex", "gênero", "sexo"]),
            female_keywords: strings(&["female", "woman", "feminino", "mulher"]),
            male_keywords: strings(&["male", "man", "masculino", "homem"]),
            female_pronouns: strings(&["she", "her", "hers", "herself"]),
            male_pronouns: strings(&["he", "him", "his", "himself"]),
            female_phrases: strings(&["grandmother", "mother of", "wife of", "daughter of", "sister of"]),
            male_phrases: strings(&["grandfather", "father of", "husband of", "son of", "brother of"]),
            min_pronoun_evidence: 2,
        }
    }
}

impl Default for DescriptionRules {
    fn default() -> Self {
        Self {
            boilerplate_prefixes: strings(&["This article", "See also", "For more"]),
            min_summary_len: 30,
            page: DescriptionBudget {
                min_paragraph_len: 80,
                max_paragraphs: 3,
                max_chars: 600,
            },
            subdistrict: DescriptionBudget {
                min_paragraph_len: 50,
                max_paragraphs: 3,
                max_chars: 500,
            },
        }
    }
}

impl Default for ImageKeywords {
    fn default() -> Self {
        Self {
            lookup_skip: strings(&["icon", "logo", "button", "arrow", "wiki", "transparent"]),
            page_skip: strings(&["icon", "logo", "button", "nav", "footer", "header"]),
            decorative: strings(&["logo", "decal"]),
        }
    }
}
