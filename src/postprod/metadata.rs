//! Puzzle metadata and the database fixture generated from it.
//!
//! The fixture is a YAML list of Django-style records (`model`, `pk`, `fields`)
//! that the hunt server loads to register the puzzle, its canned hints and its
//! pseudo-answers.

use serde::{Deserialize, Serialize};

use crate::util::is_valid_slug;

const DEFAULT_ROUND: u64 = 1;
const UNKNOWN_ANSWER: &str = "???";

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("missing required metadata field '{0}'")]
    Missing(&'static str),

    #[error("invalid slug '{0}': use only letters, numbers, '-' and '_'")]
    InvalidSlug(String),
}

// =============================================================================
// Records
// =============================================================================

/// Everything the hunt site needs to know about one puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleMetadata {
    /// Primary key of the puzzle in the hunt database.
    pub id: u64,

    /// URL slug. Derived from the title when left empty.
    #[serde(default)]
    pub slug: String,

    pub title: String,

    /// Answers, comma separated when there is more than one.
    #[serde(default)]
    pub answer: Option<String>,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default)]
    pub round: Option<u64>,

    #[serde(default)]
    pub is_meta: bool,

    #[serde(default)]
    pub emoji: String,

    #[serde(default)]
    pub deep: i64,

    #[serde(default)]
    pub deep_key: Option<String>,

    #[serde(default)]
    pub canonical_puzzle_id: Option<u64>,

    #[serde(default)]
    pub hints: Vec<CannedHint>,

    #[serde(default)]
    pub pseudo_answers: Vec<PseudoAnswer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CannedHint {
    pub id: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub content: String,
}

/// A near-miss answer and the response solvers see when they submit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PseudoAnswer {
    pub id: u64,
    pub answer: String,
    pub response: String,
}

impl PuzzleMetadata {
    pub fn validate_slug(&self) -> Result<(), MetadataError> {
        if self.slug.is_empty() {
            return Err(MetadataError::Missing("slug"));
        }
        if !is_valid_slug(&self.slug) {
            return Err(MetadataError::InvalidSlug(self.slug.clone()));
        }
        Ok(())
    }

    /// The answer if one is set and not blank.
    pub fn answer(&self) -> Option<&str> {
        self.answer
            .as_deref()
            .map(str::trim)
            .filter(|answer| !answer.is_empty())
    }

    pub fn byline(&self) -> String {
        author_byline(&self.authors)
    }

    /// Credits line shown on the puzzle page, e.g. "by Alice and Bob".
    pub fn credits(&self) -> String {
        format!("by {}", self.byline())
    }

    /// Render the fixture records for this puzzle as YAML.
    pub fn fixture_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.fixture_records())
    }

    fn fixture_records(&self) -> Vec<FixtureRecord<'_>> {
        let mut records = vec![
            FixtureRecord::HuntPuzzle(Entry {
                model: "puzzles.puzzle",
                pk: self.id,
                fields: HuntPuzzleFields {
                    emoji: &self.emoji,
                    deep: self.deep,
                    icon_x: 0,
                    icon_y: 0,
                    icon_size: 0,
                    text_x: 0,
                    text_y: 0,
                    testsolve_url: None,
                    unsolved_icon: "",
                    solved_icon: "",
                    points: 1,
                    deep_key: self.deep_key.as_deref(),
                    canonical_puzzle_id: self.canonical_puzzle_id,
                },
            }),
            FixtureRecord::Puzzle(Entry {
                model: "spoilr_core.puzzle",
                pk: self.id,
                fields: PuzzleFields {
                    external_id: self.id,
                    round: self.round.unwrap_or(DEFAULT_ROUND),
                    answer: self.answer().unwrap_or(UNKNOWN_ANSWER),
                    name: &self.title,
                    credits: self.credits(),
                    order: self.id,
                    is_meta: self.is_meta,
                    slug: &self.slug,
                    metas: Vec::new(),
                },
            }),
        ];

        records.extend(self.hints.iter().map(|hint| {
            FixtureRecord::Hint(Entry {
                model: "spoilr_hints.cannedhint",
                pk: hint.id,
                fields: HintFields {
                    puzzle: self.id,
                    description: &hint.description,
                    order: hint.order,
                    keywords: hint.keywords.join(","),
                    content: &hint.content,
                },
            })
        }));

        records.extend(self.pseudo_answers.iter().map(|pseudo| {
            FixtureRecord::PseudoAnswer(Entry {
                model: "spoilr_core.pseudoanswer",
                pk: pseudo.id,
                fields: PseudoAnswerFields {
                    puzzle: self.id,
                    answer: &pseudo.answer,
                    response: &pseudo.response,
                },
            })
        }));

        records
    }
}

/// Join author names for a byline, sorted case-insensitively.
///
/// # Examples
/// ```ignore
/// author_byline(["Bob"]) => "Bob"
/// author_byline(["bob", "Alice"]) => "Alice and bob"
/// author_byline(["Cat", "alice", "Bob"]) => "alice, Bob, and Cat"
/// ```
pub fn author_byline(authors: &[String]) -> String {
    let mut names: Vec<&str> = authors
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .collect();
    names.sort_by_key(|name| name.to_uppercase());

    match names.as_slice() {
        [] => String::new(),
        [only] => only.to_string(),
        [first, second] => format!("{first} and {second}"),
        [rest @ .., last] => format!("{}, and {last}", rest.join(", ")),
    }
}

// =============================================================================
// Fixture serialization
// =============================================================================

#[derive(Serialize)]
#[serde(untagged)]
enum FixtureRecord<'a> {
    HuntPuzzle(Entry<HuntPuzzleFields<'a>>),
    Puzzle(Entry<PuzzleFields<'a>>),
    Hint(Entry<HintFields<'a>>),
    PseudoAnswer(Entry<PseudoAnswerFields<'a>>),
}

#[derive(Serialize)]
struct Entry<F> {
    model: &'static str,
    pk: u64,
    fields: F,
}

#[derive(Serialize)]
struct HuntPuzzleFields<'a> {
    emoji: &'a str,
    deep: i64,
    icon_x: i64,
    icon_y: i64,
    icon_size: i64,
    text_x: i64,
    text_y: i64,
    testsolve_url: Option<&'a str>,
    unsolved_icon: &'a str,
    solved_icon: &'a str,
    points: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    deep_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    canonical_puzzle_id: Option<u64>,
}

#[derive(Serialize)]
struct PuzzleFields<'a> {
    external_id: u64,
    round: u64,
    answer: &'a str,
    name: &'a str,
    credits: String,
    order: u64,
    is_meta: bool,
    slug: &'a str,
    metas: Vec<u64>,
}

#[derive(Serialize)]
struct HintFields<'a> {
    puzzle: u64,
    description: &'a str,
    order: i64,
    keywords: String,
    content: &'a str,
}

#[derive(Serialize)]
struct PseudoAnswerFields<'a> {
    puzzle: u64,
    answer: &'a str,
    response: &'a str,
}
