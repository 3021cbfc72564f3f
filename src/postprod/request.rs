//! Postprod requests: which documents to publish, for which puzzle, and how.

use std::fmt;
use std::path::{Component, Path};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::metadata::{MetadataError, PuzzleMetadata};
use crate::util::slugify;

static DOC_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"docs\.google\.com/document/d/([A-Za-z0-9_-]+)").expect("valid document url regex")
});

static DOC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid document id regex"));

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("could not find a document id in '{0}'")]
    InvalidDocumentRef(String),

    #[error("image width must be between 0 and 100%, got {0}%")]
    InvalidPercent(u32),

    #[error("puzzle directory '{0}' must be a relative path inside the repository")]
    InvalidDirectory(String),

    #[error("'{0}' is not a valid branch name")]
    InvalidBranch(String),

    #[error("export needs at least one puzzle")]
    EmptyExport,

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

// =============================================================================
// Document references
// =============================================================================

/// Identifier of a document in the document service.
///
/// Accepts either a bare id or a full document URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentRef(String);

impl DocumentRef {
    pub fn parse(input: &str) -> Result<Self, RequestError> {
        let input = input.trim();
        if let Some(captures) = DOC_URL.captures(input) {
            return Ok(Self(captures[1].to_string()));
        }
        if DOC_ID.is_match(input) {
            return Ok(Self(input.to_string()));
        }
        Err(RequestError::InvalidDocumentRef(input.to_string()))
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentRef {
    type Error = RequestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocumentRef> for String {
    fn from(value: DocumentRef) -> Self {
        value.0
    }
}

// =============================================================================
// Image width
// =============================================================================

/// Maximum rendered width for images, in pixels or as a share of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageWidth {
    Pixels(u32),
    Percent(u32),
}

impl ImageWidth {
    /// Resolve to a pixel width against the page container width.
    ///
    /// Zero means "no limit" and resolves to `None`.
    pub fn resolve(self, container_width: u32) -> Result<Option<u32>, RequestError> {
        let pixels = match self {
            ImageWidth::Pixels(px) => px,
            ImageWidth::Percent(pct) if pct > 100 => return Err(RequestError::InvalidPercent(pct)),
            ImageWidth::Percent(pct) => {
                (u64::from(pct) * u64::from(container_width) / 100) as u32
            }
        };
        Ok((pixels > 0).then_some(pixels))
    }
}

// =============================================================================
// Request
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostprodRequest {
    pub puzzle_doc: DocumentRef,

    /// Without a solution document the existing solution page is kept,
    /// or a stub is written if there is none.
    #[serde(default)]
    pub solution_doc: Option<DocumentRef>,

    pub metadata: PuzzleMetadata,

    /// Overrides the configured puzzle page directory.
    #[serde(default)]
    pub puzzle_directory: Option<String>,

    #[serde(default)]
    pub max_image_width: Option<ImageWidth>,
}

impl PostprodRequest {
    /// Fill in derived fields and check the request is publishable.
    pub fn normalize(&mut self) -> Result<(), RequestError> {
        if self.metadata.slug.trim().is_empty() {
            self.metadata.slug = slugify(&self.metadata.title);
        }
        self.metadata.validate_slug()?;
        if self.metadata.title.trim().is_empty() {
            return Err(MetadataError::Missing("title").into());
        }
        if let Some(dir) = &self.puzzle_directory {
            validate_directory(dir)?;
        }
        Ok(())
    }
}

/// A repository-relative directory that stays inside the repository.
fn validate_directory(dir: &str) -> Result<(), RequestError> {
    let path = Path::new(dir);
    let inside = !dir.trim().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if inside {
        Ok(())
    } else {
        Err(RequestError::InvalidDirectory(dir.to_string()))
    }
}
