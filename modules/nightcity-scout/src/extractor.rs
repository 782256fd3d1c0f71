//! Field extraction: info-box lookups, text heuristics and the gender cascade.
//!
//! Every heuristic reads its vocabulary from [`HeuristicTables`], injected at
//! construction, so tests can substitute their own tables.

use std::sync::LazyLock;

use nightcity_core::heuristics::{DescriptionBudget, GenderLexicon, HeuristicTables};
use nightcity_core::Gender;
use regex::Regex;

use crate::document::WikiDocument;
use crate::text::{clean_opt, contains_word, count_word, truncate_words};

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d.]+").expect("valid regex"));

/// Result of one extraction strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal<T> {
    Matched(T),
    NoSignal,
}

/// What the gender strategies get to look at.
pub struct GenderEvidence<'a> {
    pub document: &'a WikiDocument,
    /// Display name of the subject.
    pub name: &'a str,
    /// Already-extracted description text.
    pub description: Option<&'a str>,
}

pub trait GenderStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn detect(&self, evidence: &GenderEvidence<'_>, tables: &HeuristicTables) -> Signal<Gender>;
}

/// Final gender with the strategy that decided it (`None` for the default).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenderOutcome {
    pub gender: Gender,
    pub decided_by: Option<&'static str>,
}

/// Classify free text by gender keywords; female terms are checked first.
fn gender_from_text(text: &str, lexicon: &GenderLexicon) -> Option<Gender> {
    let lower = text.to_lowercase();
    if lexicon.female_keywords.iter().any(|k| contains_word(&lower, k)) {
        Some(Gender::Female)
    } else if lexicon.male_keywords.iter().any(|k| contains_word(&lower, k)) {
        Some(Gender::Male)
    } else {
        None
    }
}

/// Exact info-box field (`gender`, `sex`, ...), if it reads unambiguously.
pub struct InfoboxField;

impl GenderStrategy for InfoboxField {
    fn name(&self) -> &'static str {
        "infobox_field"
    }

    fn detect(&self, evidence: &GenderEvidence<'_>, tables: &HeuristicTables) -> Signal<Gender> {
        let Some(raw) = evidence.document.infobox_value_any(&tables.fields.gender) else {
            return Signal::NoSignal;
        };
        if let Some(gender) = Gender::from_label(&raw).filter(Gender::is_known) {
            return Signal::Matched(gender);
        }
        match gender_from_text(&raw, &tables.gender) {
            Some(gender) => Signal::Matched(gender),
            None => Signal::NoSignal,
        }
    }
}

/// Curated list of subjects whose gender the other signals get wrong.
pub struct KnownSubjects;

impl GenderStrategy for KnownSubjects {
    fn name(&self) -> &'static str {
        "known_subjects"
    }

    fn detect(&self, evidence: &GenderEvidence<'_>, tables: &HeuristicTables) -> Signal<Gender> {
        let name = evidence.name.trim().to_lowercase();
        if name.is_empty() {
            return Signal::NoSignal;
        }
        tables
            .known_subjects
            .iter()
            .find(|known| {
                let known_name = known.name.to_lowercase();
                known_name == name
                    || contains_word(&name, &known_name)
                    || contains_word(&known_name, &name)
            })
            .map_or(Signal::NoSignal, |known| Signal::Matched(known.gender))
    }
}

/// Looser info-box pass: more field spellings, then any row labelled like gender.
pub struct InfoboxScan;

impl GenderStrategy for InfoboxScan {
    fn name(&self) -> &'static str {
        "infobox_scan"
    }

    fn detect(&self, evidence: &GenderEvidence<'_>, tables: &HeuristicTables) -> Signal<Gender> {
        let lexicon = &tables.gender;
        for source in &lexicon.loose_sources {
            if let Some(gender) = evidence
                .document
                .infobox_value(source)
                .and_then(|value| gender_from_text(&value, lexicon))
            {
                return Signal::Matched(gender);
            }
        }

        for (label, value) in evidence.document.infobox_pairs() {
            let label = label.to_lowercase();
            if !lexicon.label_keywords.iter().any(|k| label.contains(k.as_str())) {
                continue;
            }
            if let Some(gender) = gender_from_text(&value, lexicon) {
                return Signal::Matched(gender);
            }
        }
        Signal::NoSignal
    }
}

/// Pronoun counts over the description; needs a minimum count and a strict majority.
pub struct PronounFrequency;

impl GenderStrategy for PronounFrequency {
    fn name(&self) -> &'static str {
        "pronoun_frequency"
    }

    fn detect(&self, evidence: &GenderEvidence<'_>, tables: &HeuristicTables) -> Signal<Gender> {
        let Some(description) = evidence.description else {
            return Signal::NoSignal;
        };
        let lexicon = &tables.gender;
        let text = description.to_lowercase();
        let count = |pronouns: &[String]| -> usize {
            pronouns.iter().map(|p| count_word(&text, p)).sum()
        };
        let female = count(&lexicon.female_pronouns);
        let male = count(&lexicon.male_pronouns);
        let min = lexicon.min_pronoun_evidence;

        if female >= min && female > male {
            Signal::Matched(Gender::Female)
        } else if male >= min && male > female {
            Signal::Matched(Gender::Male)
        } else {
            Signal::NoSignal
        }
    }
}

/// Kinship phrases such as "mother of" / "father of".
pub struct FixedPhrases;

impl GenderStrategy for FixedPhrases {
    fn name(&self) -> &'static str {
        "fixed_phrases"
    }

    fn detect(&self, evidence: &GenderEvidence<'_>, tables: &HeuristicTables) -> Signal<Gender> {
        let Some(description) = evidence.description else {
            return Signal::NoSignal;
        };
        let text = description.to_lowercase();
        let lexicon = &tables.gender;
        if lexicon.female_phrases.iter().any(|p| text.contains(p.as_str())) {
            Signal::Matched(Gender::Female)
        } else if lexicon.male_phrases.iter().any(|p| text.contains(p.as_str())) {
            Signal::Matched(Gender::Male)
        } else {
            Signal::NoSignal
        }
    }
}

/// Default cascade, strongest evidence first.
pub fn default_gender_cascade() -> Vec<Box<dyn GenderStrategy>> {
    vec![
        Box::new(InfoboxField),
        Box::new(KnownSubjects),
        Box::new(InfoboxScan),
        Box::new(PronounFrequency),
        Box::new(FixedPhrases),
    ]
}

pub struct FieldExtractor {
    tables: HeuristicTables,
    gender_cascade: Vec<Box<dyn GenderStrategy>>,
}

impl FieldExtractor {
    pub fn new(tables: HeuristicTables) -> Self {
        Self {
            tables,
            gender_cascade: default_gender_cascade(),
        }
    }

    pub fn with_gender_cascade(mut self, cascade: Vec<Box<dyn GenderStrategy>>) -> Self {
        self.gender_cascade = cascade;
        self
    }

    pub fn tables(&self) -> &HeuristicTables {
        &self.tables
    }

    /// Run the gender cascade; the first strategy with a signal decides.
    pub fn gender(&self, evidence: &GenderEvidence<'_>) -> GenderOutcome {
        for strategy in &self.gender_cascade {
            if let Signal::Matched(gender) = strategy.detect(evidence, &self.tables) {
                return GenderOutcome {
                    gender,
                    decided_by: Some(strategy.name()),
                };
            }
        }
        GenderOutcome {
            gender: Gender::Unknown,
            decided_by: None,
        }
    }

    /// Raw affiliation mapped to a canonical name: keyword table first, then
    /// the first comma-separated segment, then the text as-is.
    pub fn normalize_affiliation(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let lower = raw.to_lowercase();
        if let Some(mapping) = self
            .tables
            .affiliation_keywords
            .iter()
            .find(|m| lower.contains(&m.keyword.to_lowercase()))
        {
            return Some(mapping.canonical.clone());
        }
        match raw.split_once(',') {
            Some((first, _)) => clean_opt(first),
            None => Some(raw.to_string()),
        }
    }

    pub fn affiliation(&self, document: &WikiDocument) -> Option<String> {
        document
            .infobox_value_any(&self.tables.fields.affiliation)
            .and_then(|raw| self.normalize_affiliation(&raw))
    }

    /// First run of digits in the member-count row, thousands separators removed.
    pub fn members_count(&self, document: &WikiDocument) -> Option<String> {
        let raw = document.infobox_value_any(&self.tables.fields.members_count)?;
        let digits = raw.replace(',', "");
        NUMBER_RE
            .find_iter(&digits)
            .map(|m| m.as_str())
            .find(|s| s.chars().any(|c| c.is_ascii_digit()))
            .map(str::to_string)
    }

    /// Linked entries of the affiliations row, single characters dropped.
    pub fn affiliations(&self, document: &WikiDocument) -> Vec<String> {
        document
            .infobox_links(&self.tables.fields.affiliations)
            .into_iter()
            .filter(|a| a.chars().count() > 1)
            .collect()
    }

    /// Summary meta field if long enough, else the leading qualifying paragraphs.
    pub fn description(&self, document: &WikiDocument, budget: DescriptionBudget) -> Option<String> {
        let rules = &self.tables.description;
        if let Some(summary) = document
            .meta_description()
            .filter(|s| s.chars().count() > rules.min_summary_len)
        {
            return Some(summary);
        }

        let paragraphs: Vec<String> = document
            .content_paragraphs()
            .into_iter()
            .filter(|p| p.chars().count() > budget.min_paragraph_len)
            .filter(|p| {
                !rules
                    .boilerplate_prefixes
                    .iter()
                    .any(|prefix| p.starts_with(prefix.as_str()))
            })
            .take(budget.max_paragraphs)
            .collect();

        if paragraphs.is_empty() {
            return None;
        }
        Some(truncate_words(&paragraphs.join(" "), budget.max_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightcity_core::heuristics::KnownSubject;

    fn page(infobox_rows: &str, paragraphs: &str) -> WikiDocument {
        WikiDocument::parse(&format!(
            r#"<div class="mw-parser-output">
                <aside class="portable-infobox">{infobox_rows}</aside>
                {paragraphs}
            </div>"#
        ))
    }

    fn row(source: &str, label: &str, value: &str) -> String {
        format!(
            r#"<div class="pi-item pi-data" data-source="{source}">
                <h3 class="pi-data-label">{label}</h3>
                <div class="pi-data-value">{value}</div>
            </div>"#
        )
    }

    fn extractor() -> FieldExtractor {
        FieldExtractor::new(HeuristicTables::default())
    }

    fn gender_of(extractor: &FieldExtractor, doc: &WikiDocument, name: &str, desc: Option<&str>) -> GenderOutcome {
        extractor.gender(&GenderEvidence {
            document: doc,
            name,
            description: desc,
        })
    }

    #[test]
    fn structured_field_beats_pronouns() {
        let doc = page(&row("sex", "Sex", "Female"), "");
        let outcome = gender_of(
            &extractor(),
            &doc,
            "Someone",
            Some("He said his piece. He left with him and his crew."),
        );
        assert_eq!(outcome.gender, Gender::Female);
        assert_eq!(outcome.decided_by, Some("infobox_field"));
    }

    #[test]
    fn single_pronoun_is_not_enough() {
        let doc = page("", "");
        let outcome = gender_of(&extractor(), &doc, "Someone", Some("Nobody knows where she went."));
        assert_eq!(outcome.gender, Gender::Unknown);
        assert_eq!(outcome.decided_by, None);
    }

    #[test]
    fn pronoun_majority_decides_with_enough_evidence() {
        let doc = page("", "");
        let outcome = gender_of(
            &extractor(),
            &doc,
            "Someone",
            Some("She runs the bar. Her regulars trust her, and he knows it."),
        );
        assert_eq!(outcome.gender, Gender::Female);
        assert_eq!(outcome.decided_by, Some("pronoun_frequency"));

        let tied = gender_of(&extractor(), &doc, "Someone", Some("She and he, her and him."));
        assert_eq!(tied.gender, Gender::Unknown);
    }

    #[test]
    fn known_subjects_match_on_word_boundaries() {
        let doc = page("", "");
        let ex = extractor();
        assert_eq!(gender_of(&ex, &doc, "Judy Alvarez", None).gender, Gender::Female);
        assert_eq!(gender_of(&ex, &doc, "Songbird", None).gender, Gender::Female);
        assert_eq!(gender_of(&ex, &doc, "Hanako Arasaka (2077)", None).gender, Gender::Female);
        // "alex" must not match inside "alexander"
        let custom = FieldExtractor::new(HeuristicTables {
            known_subjects: vec![KnownSubject {
                name: "alex".into(),
                gender: Gender::Female,
            }],
            ..HeuristicTables::default()
        });
        assert_eq!(gender_of(&custom, &doc, "Alexander Grimes", None).gender, Gender::Unknown);
    }

    #[test]
    fn ambiguous_structured_field_falls_through_to_label_scan() {
        let rows = format!(
            "{}{}",
            row("gender", "Gender", "Classified"),
            row("identity", "Gênero", "Masculino")
        );
        let doc = page(&rows, "");
        let outcome = gender_of(&extractor(), &doc, "V", None);
        assert_eq!(outcome.gender, Gender::Male);
        assert_eq!(outcome.decided_by, Some("infobox_scan"));
    }

    #[test]
    fn female_keyword_is_not_read_as_male() {
        let doc = page(&row("Sex", "Sex", "female (formerly)"), "");
        assert_eq!(gender_of(&extractor(), &doc, "V", None).gender, Gender::Female);
    }

    #[test]
    fn kinship_phrases_are_the_last_resort() {
        let doc = page("", "");
        let outcome = gender_of(&extractor(), &doc, "Someone", Some("The father of two runs a garage."));
        assert_eq!(outcome.gender, Gender::Male);
        assert_eq!(outcome.decided_by, Some("fixed_phrases"));
    }

    #[test]
    fn affiliation_maps_keywords_then_first_segment() {
        let ex = extractor();
        assert_eq!(ex.normalize_affiliation("Maelstrom (formerly)").as_deref(), Some("Maelstrom"));
        assert_eq!(ex.normalize_affiliation("Clouds, Dollhouse").as_deref(), Some("Clouds"));
        assert_eq!(ex.normalize_affiliation("Clouds").as_deref(), Some("Clouds"));
        assert!(ex.normalize_affiliation("  ").is_none());

        let doc = page(&row("employer", "Employer", "Arasaka Corporation"), "");
        assert_eq!(ex.affiliation(&doc).as_deref(), Some("Arasaka"));
    }

    #[test]
    fn members_count_strips_separators() {
        let doc = page(&row("members", "Members", "Approx. 1,200 active"), "");
        assert_eq!(extractor().members_count(&doc).as_deref(), Some("1200"));
    }

    #[test]
    fn affiliations_collect_link_texts() {
        let doc = page(
            &row(
                "affiliations",
                "Affiliations",
                r#"<a href="/wiki/Animals">Animals</a>, <a href="/wiki/X">X</a>, <a href="/wiki/Voodoo_Boys">Voodoo Boys</a>"#,
            ),
            "",
        );
        assert_eq!(extractor().affiliations(&doc), vec!["Animals", "Voodoo Boys"]);
    }

    #[test]
    fn description_skips_boilerplate_and_truncates() {
        let long = "Night City is a megalopolis in the Free State of Northern California, ruled by corporations and gangs alike.";
        let paragraphs = format!(
            "<p>This article is about the city in 2077 and covers a great many things that nobody reads.</p>
             <p>Too short.</p>
             <p>{long}</p><p>{long}</p><p>{long}</p><p>{long}</p>"
        );
        let doc = page("", &paragraphs);
        let budget = DescriptionBudget {
            min_paragraph_len: 80,
            max_paragraphs: 3,
            max_chars: 200,
        };
        let description = extractor().description(&doc, budget).unwrap();
        assert!(description.starts_with("Night City is a megalopolis"));
        assert!(description.ends_with("..."));
        assert!(description.chars().count() <= 203);
        assert!(!description.contains("This article"));
    }

    #[test]
    fn summary_wins_when_long_enough() {
        let doc = WikiDocument::parse(
            r#"<html><head><meta property="og:description" content="The Maelstrom are a gang of cyberpsychos in Watson."></head>
               <body><div class="mw-parser-output"><p>Ignored paragraph.</p></div></body></html>"#,
        );
        let budget = HeuristicTables::default().description.page;
        assert_eq!(
            extractor().description(&doc, budget).as_deref(),
            Some("The Maelstrom are a gang of cyberpsychos in Watson.")
        );

        let short = WikiDocument::parse(r#"<meta property="og:description" content="Too short.">"#);
        assert!(extractor().description(&short, budget).is_none());
    }
}
