//! A postprod run as it moves through the pipeline.

use std::fmt;

use serde::Serialize;

use super::Cause;
use crate::config::Config;
use crate::git::{Workspace, is_valid_branch_name};
use crate::postprod::assets::Asset;
use crate::postprod::fetch::FetchedContent;
use crate::postprod::layout::PageKind;
use crate::postprod::metadata::PuzzleMetadata;
use crate::postprod::request::{DocumentRef, PostprodRequest, RequestError};
use crate::postprod::writer::Changes;

/// The stages a run passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Fetching,
    ProcessingAssets,
    Transforming,
    Binding,
    Writing,
    Formatting,
    Publishing,
}

impl RunStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStage::Fetching => "fetching",
            RunStage::ProcessingAssets => "processing_assets",
            RunStage::Transforming => "transforming",
            RunStage::Binding => "binding",
            RunStage::Writing => "writing",
            RunStage::Formatting => "formatting",
            RunStage::Publishing => "publishing",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running(RunStage),
    Done,
    Failed { stage: RunStage, cause: Cause },
}

/// One generated page and everything produced for it so far.
#[derive(Debug, Clone)]
pub struct PageJob {
    pub kind: PageKind,
    /// Source document. `None` writes a placeholder page unless one exists.
    pub document: Option<DocumentRef>,
    pub fetched: Option<FetchedContent>,
    pub assets: Vec<Asset>,
    pub content: String,
    pub output: Option<String>,
}

impl PageJob {
    pub fn new(kind: PageKind, document: Option<DocumentRef>) -> Self {
        Self {
            kind,
            document,
            fetched: None,
            assets: Vec::new(),
            content: String::new(),
            output: None,
        }
    }
}

/// State shared by all stages of one run.
#[derive(Debug)]
pub struct PostprodRun {
    pub branch: String,
    pub commit_message: String,
    pub puzzle_directory: Option<String>,
    pub max_image_width: Option<u32>,
    /// Puzzles to write fixtures for. Pages belong to the first.
    pub metadata: Vec<PuzzleMetadata>,
    pub pages: Vec<PageJob>,
    pub warnings: Vec<String>,
    pub state: RunState,
    pub workspace: Option<Workspace>,
    pub changes: Changes,
    pub commit: Option<String>,
    pub pushed: bool,
}

impl PostprodRun {
    /// Plan a run publishing the puzzle and solution pages of `request`.
    pub fn for_request(mut request: PostprodRequest, config: &Config) -> Result<Self, RequestError> {
        request.normalize()?;
        let slug = request.metadata.slug.clone();
        let branch = branch_name(&config.repository.branch, &slug)?;

        let max_image_width = match request.max_image_width {
            Some(width) => width.resolve(config.assets.container_width)?,
            None => config.assets.max_width.filter(|width| *width > 0),
        };

        Ok(Self {
            branch,
            commit_message: format!("Postprodding '{slug}'"),
            puzzle_directory: request.puzzle_directory,
            max_image_width,
            metadata: vec![request.metadata],
            pages: vec![
                PageJob::new(PageKind::Puzzle, Some(request.puzzle_doc)),
                PageJob::new(PageKind::Solution, request.solution_doc),
            ],
            warnings: Vec::new(),
            state: RunState::Pending,
            workspace: None,
            changes: Changes::default(),
            commit: None,
            pushed: false,
        })
    }

    /// Plan a run that only writes fixtures for `records` to `branch`.
    pub fn for_export(records: Vec<PuzzleMetadata>, branch: String) -> Result<Self, RequestError> {
        if records.is_empty() {
            return Err(RequestError::EmptyExport);
        }
        for record in &records {
            record.validate_slug()?;
        }
        if !is_valid_branch_name(&branch) {
            return Err(RequestError::InvalidBranch(branch));
        }

        Ok(Self {
            branch,
            commit_message: "Export puzzle fixtures".to_string(),
            puzzle_directory: None,
            max_image_width: None,
            metadata: records,
            pages: Vec::new(),
            warnings: Vec::new(),
            state: RunState::Pending,
            workspace: None,
            changes: Changes::default(),
            commit: None,
            pushed: false,
        })
    }

    /// The puzzle the pages of this run belong to.
    pub fn puzzle(&self) -> Option<&PuzzleMetadata> {
        self.metadata.first()
    }

    pub fn page(&self, kind: PageKind) -> Option<&PageJob> {
        self.pages.iter().find(|page| page.kind == kind)
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }
}

fn branch_name(template: &str, slug: &str) -> Result<String, RequestError> {
    let branch = template.replace("{slug}", slug);
    if is_valid_branch_name(&branch) {
        Ok(branch)
    } else {
        Err(RequestError::InvalidBranch(branch))
    }
}
