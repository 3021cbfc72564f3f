//! The outcome reported to whoever asked for a run.

use std::path::PathBuf;

use serde::Serialize;

use super::pipeline::{Cause, PipelineError, PostprodRun, RunStage, RunState};
use crate::config::RepositoryConfig;

/// Why a run was refused before it started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// The request itself is unusable.
    Invalid,
    /// Another run is publishing to the same branch.
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishResult {
    Published {
        branch: String,
        /// `None` when the run produced no changes.
        commit: Option<String>,
        pushed: bool,
        files: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        puzzle_url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        solution_url: Option<String>,
        warnings: Vec<String>,
    },
    Failed {
        stage: RunStage,
        cause: Cause,
        message: String,
        /// Files written before the failure. They were never pushed.
        left_in_working_copy: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        working_copy: Option<PathBuf>,
        warnings: Vec<String>,
    },
    Rejected {
        rejection: Rejection,
        reason: String,
    },
}

impl PublishResult {
    pub fn published(run: &PostprodRun, repository: &RepositoryConfig) -> Self {
        let has_pages = !run.pages.is_empty();
        let preview = |section: &str| -> Option<String> {
            let slug = run.puzzle().map(|puzzle| puzzle.slug.as_str())?;
            let base = repository.preview_url.as_deref()?;
            let base = base.replace("{slug}", slug).replace("{branch}", &run.branch);
            has_pages.then(|| format!("{}/{section}/{slug}", base.trim_end_matches('/')))
        };

        PublishResult::Published {
            branch: run.branch.clone(),
            commit: run.commit.clone(),
            pushed: run.pushed,
            files: run.changes.all(),
            puzzle_url: preview("puzzles"),
            solution_url: preview("solutions"),
            warnings: run.warnings.clone(),
        }
    }

    pub fn failed(run: &PostprodRun, error: &PipelineError, working_copy: Option<PathBuf>) -> Self {
        let (stage, cause) = match run.state {
            RunState::Failed { stage, cause } => (stage, cause),
            _ => (RunStage::Fetching, error.cause()),
        };
        PublishResult::Failed {
            stage,
            cause,
            message: error.to_string(),
            left_in_working_copy: run.changes.all(),
            working_copy,
            warnings: run.warnings.clone(),
        }
    }

    pub fn rejected(rejection: Rejection, reason: impl Into<String>) -> Self {
        PublishResult::Rejected {
            rejection,
            reason: reason.into(),
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, PublishResult::Published { .. })
    }
}
