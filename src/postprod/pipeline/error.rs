//! Pipeline error types.

use std::fmt;

use serde::Serialize;

use crate::git::PublishError;
use crate::postprod::assets::AssetError;
use crate::postprod::fetch::FetchError;
use crate::postprod::formatter::FormatError;
use crate::postprod::metadata::MetadataError;
use crate::postprod::template::BindError;
use crate::postprod::writer::WriteError;

/// Broad category of a failure, reported alongside the failing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    Network,
    Unauthorized,
    NotFound,
    Malformed,
    Invalid,
    Subprocess,
    Io,
    Rejected,
}

impl Cause {
    pub fn as_str(self) -> &'static str {
        match self {
            Cause::Network => "network",
            Cause::Unauthorized => "unauthorized",
            Cause::NotFound => "not_found",
            Cause::Malformed => "malformed",
            Cause::Invalid => "invalid",
            Cause::Subprocess => "subprocess",
            Cause::Io => "io",
            Cause::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during pipeline processing.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },
}

impl PipelineError {
    /// Create a stage-specific error.
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn cause(&self) -> Cause {
        match self {
            PipelineError::Fetch(e) => e.cause(),
            PipelineError::Asset(e) => e.cause(),
            PipelineError::Bind(BindError::Metadata(_)) => Cause::Invalid,
            PipelineError::Bind(BindError::ReadTemplate { .. }) => Cause::Io,
            PipelineError::Bind(BindError::Template(_)) => Cause::Malformed,
            PipelineError::Write(e) => e.cause(),
            PipelineError::Format(e) => e.cause(),
            PipelineError::Publish(e) => e.cause(),
            PipelineError::Stage { .. } => Cause::Io,
        }
    }
}

impl From<MetadataError> for PipelineError {
    fn from(e: MetadataError) -> Self {
        PipelineError::Bind(BindError::Metadata(e))
    }
}
