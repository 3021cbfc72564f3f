//! Binding transformed content into page templates.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tera::{Context, Tera};

use super::layout::PageKind;
use super::metadata::{MetadataError, PuzzleMetadata};
use crate::config::{RoundTemplates, TemplatesConfig};

const PUZZLE_TEMPLATE: &str = include_str!("../../templates/puzzle.tsx.tera");
const SOLUTION_TEMPLATE: &str = include_str!("../../templates/solution.tsx.tera");

#[derive(thiserror::Error, Debug)]
pub enum BindError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("failed to read template {path}: {source}")]
    ReadTemplate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("template error: {0}")]
    Template(#[from] tera::Error),
}

/// An image import at the top of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Import {
    pub var: String,
    pub path: String,
}

/// What a page is built from.
#[derive(Debug, Clone, Copy)]
pub struct PageInput<'a> {
    pub kind: PageKind,
    pub content: &'a str,
    pub imports: &'a [Import],
    /// False for placeholder pages written without a source document.
    pub has_document: bool,
}

/// The page template renderer, wrapping Tera.
#[derive(Debug)]
pub struct Binder {
    tera: Tera,
    /// Names of the registered per-round templates.
    round_templates: HashSet<String>,
}

impl Binder {
    /// Load page templates, falling back to the built-in ones.
    pub fn new(templates: &TemplatesConfig) -> Result<Self, BindError> {
        let mut tera = Tera::default();
        for kind in [PageKind::Puzzle, PageKind::Solution] {
            let path = match kind {
                PageKind::Puzzle => templates.puzzle.as_deref(),
                PageKind::Solution => templates.solution.as_deref(),
            };
            let source = match path {
                Some(path) => read_template(path)?,
                None => builtin_template(kind).to_string(),
            };
            tera.add_raw_template(kind.template_name(), &source)?;
        }

        let mut round_templates = HashSet::new();
        for (round, overrides) in &templates.rounds {
            for kind in [PageKind::Puzzle, PageKind::Solution] {
                if let Some(path) = round_path(overrides, kind) {
                    let name = round_template_name(round, kind);
                    tera.add_raw_template(&name, &read_template(path)?)?;
                    round_templates.insert(name);
                }
            }
        }

        Ok(Self {
            tera,
            round_templates,
        })
    }

    /// Render one page for `metadata`, using its round's template if one is set.
    pub fn bind(&self, page: PageInput<'_>, metadata: &PuzzleMetadata) -> Result<String, BindError> {
        require_fields(page, metadata)?;

        let mut context = Context::new();
        context.insert("slug", &metadata.slug);
        context.insert("title", &metadata.title);
        context.insert("answer", metadata.answer().unwrap_or_default());
        context.insert("authors", &metadata.byline());
        context.insert("images", page.imports);
        context.insert("content", page.content);

        let template = self.template_for(page.kind, metadata.round);
        Ok(self.tera.render(&template, &context)?)
    }

    fn template_for(&self, kind: PageKind, round: Option<u64>) -> String {
        round
            .map(|round| round_template_name(&round.to_string(), kind))
            .filter(|name| self.round_templates.contains(name))
            .unwrap_or_else(|| kind.template_name().to_string())
    }
}

fn builtin_template(kind: PageKind) -> &'static str {
    match kind {
        PageKind::Puzzle => PUZZLE_TEMPLATE,
        PageKind::Solution => SOLUTION_TEMPLATE,
    }
}

fn round_path(overrides: &RoundTemplates, kind: PageKind) -> Option<&Path> {
    match kind {
        PageKind::Puzzle => overrides.puzzle.as_deref(),
        PageKind::Solution => overrides.solution.as_deref(),
    }
}

// Keeps the `.tsx` extension so Tera does not autoescape
fn round_template_name(round: &str, kind: PageKind) -> String {
    format!("round-{round}/{}", kind.template_name())
}

fn read_template(path: &Path) -> Result<String, BindError> {
    std::fs::read_to_string(path).map_err(|source| BindError::ReadTemplate {
        path: path.to_path_buf(),
        source,
    })
}

fn require_fields(page: PageInput<'_>, metadata: &PuzzleMetadata) -> Result<(), BindError> {
    if metadata.slug.trim().is_empty() {
        return Err(MetadataError::Missing("slug").into());
    }
    if metadata.title.trim().is_empty() {
        return Err(MetadataError::Missing("title").into());
    }
    if page.kind == PageKind::Solution && page.has_document {
        if metadata.answer().is_none() {
            return Err(MetadataError::Missing("answer").into());
        }
        if metadata.byline().is_empty() {
            return Err(MetadataError::Missing("authors").into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn builtin() -> Binder {
        Binder::new(&TemplatesConfig::default()).unwrap()
    }

    fn metadata() -> PuzzleMetadata {
        serde_json::from_str(
            r#"{
                "id": 1,
                "slug": "cryptic-crossword",
                "title": "Cryptic \"Crossword\"",
                "answer": "PUZZLE",
                "authors": ["Bob", "alice"]
            }"#,
        )
        .unwrap()
    }

    fn page<'a>(kind: PageKind, content: &'a str, imports: &'a [Import]) -> PageInput<'a> {
        PageInput {
            kind,
            content,
            imports,
            has_document: true,
        }
    }

    #[test]
    fn test_bind_puzzle_page() {
        let binder = builtin();
        let imports = vec![Import {
            var: "image0".to_string(),
            path: "assets/puzzles/cryptic-crossword/0.png".to_string(),
        }];
        let out = binder
            .bind(
                page(PageKind::Puzzle, "<p>Clue</p><SheetableImage src={image0} />", &imports),
                &metadata(),
            )
            .unwrap();

        assert!(out.contains("import image0 from 'assets/puzzles/cryptic-crossword/0.png';\n"));
        assert!(out.contains(r#"slug="cryptic-crossword""#));
        assert!(out.contains(r#"title={ "Cryptic \"Crossword\"" }"#));
        assert!(out.contains("<p>Clue</p><SheetableImage src={image0} />"));
        assert!(!out.contains("&lt;"));
    }

    #[test]
    fn test_bind_solution_page() {
        let binder = builtin();
        let out = binder
            .bind(page(PageKind::Solution, "<p>Answer</p>", &[]), &metadata())
            .unwrap();

        assert!(out.contains(r#"answer={ "PUZZLE" }"#));
        assert!(out.contains(r#"authors={ "alice and Bob" }"#));
        assert!(!out.contains("import image"));
    }

    #[test]
    fn test_bind_requires_title() {
        let mut metadata = metadata();
        metadata.title = String::new();
        let err = builtin()
            .bind(page(PageKind::Puzzle, "", &[]), &metadata)
            .unwrap_err();
        assert!(matches!(err, BindError::Metadata(MetadataError::Missing("title"))));
    }

    #[test]
    fn test_bind_solution_requires_answer_and_authors() {
        let binder = builtin();

        let mut no_answer = metadata();
        no_answer.answer = None;
        let err = binder
            .bind(page(PageKind::Solution, "", &[]), &no_answer)
            .unwrap_err();
        assert!(matches!(err, BindError::Metadata(MetadataError::Missing("answer"))));

        let mut no_authors = metadata();
        no_authors.authors.clear();
        let err = binder
            .bind(page(PageKind::Solution, "", &[]), &no_authors)
            .unwrap_err();
        assert!(matches!(err, BindError::Metadata(MetadataError::Missing("authors"))));

        // Puzzle pages do not need either
        assert!(binder.bind(page(PageKind::Puzzle, "", &[]), &no_answer).is_ok());
    }

    #[test]
    fn test_bind_solution_placeholder_without_answer() {
        let mut metadata = metadata();
        metadata.answer = None;
        let placeholder = PageInput {
            kind: PageKind::Solution,
            content: "",
            imports: &[],
            has_document: false,
        };
        let out = builtin().bind(placeholder, &metadata).unwrap();
        assert!(out.contains(r#"answer={ "" }"#));
    }

    #[test]
    fn test_custom_template() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("puzzle.tsx");
        std::fs::write(&path, "// {{ slug }}\n{{ content }}\n").unwrap();

        let binder = Binder::new(&TemplatesConfig {
            puzzle: Some(path),
            ..Default::default()
        })
        .unwrap();
        let out = binder
            .bind(page(PageKind::Puzzle, "<p>Hi</p>", &[]), &metadata())
            .unwrap();
        assert_eq!(out, "// cryptic-crossword\n<p>Hi</p>\n");
    }

    #[test]
    fn test_missing_custom_template() {
        let err = Binder::new(&TemplatesConfig {
            puzzle: Some(PathBuf::from("/nonexistent/puzzle.tsx")),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, BindError::ReadTemplate { .. }));
    }

    #[test]
    fn test_round_template_overrides_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let meta_template = dir.path().join("meta.tsx");
        std::fs::write(&meta_template, "// meta {{ slug }}\n{{ content }}\n").unwrap();
        let binder = Binder::new(&TemplatesConfig {
            rounds: BTreeMap::from([(
                "3".to_string(),
                RoundTemplates {
                    puzzle: Some(meta_template),
                    solution: None,
                },
            )]),
            ..Default::default()
        })
        .unwrap();

        let mut in_round = metadata();
        in_round.round = Some(3);
        let out = binder
            .bind(page(PageKind::Puzzle, "<p>Hi</p>", &[]), &in_round)
            .unwrap();
        assert_eq!(out, "// meta cryptic-crossword\n<p>Hi</p>\n");

        // Kinds the round does not override keep the default template
        let out = binder
            .bind(page(PageKind::Solution, "<p>Answer</p>", &[]), &in_round)
            .unwrap();
        assert!(out.contains(r#"answer={ "PUZZLE" }"#));

        // Other rounds keep the default template
        let mut other_round = metadata();
        other_round.round = Some(4);
        let out = binder
            .bind(page(PageKind::Puzzle, "<p>Hi</p>", &[]), &other_round)
            .unwrap();
        assert!(!out.starts_with("// meta"));
        assert!(out.contains(r#"slug="cryptic-crossword""#));
    }
}
