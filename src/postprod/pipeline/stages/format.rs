//! Formatting stage.

use crate::postprod::formatter::{FormatOutcome, run_formatter};
use crate::postprod::pipeline::{PipelineContext, PipelineError, PostprodRun, RunStage, Stage};

/// Stage that runs the configured formatter over written pages and fixtures.
pub struct FormatStage;

impl Stage for FormatStage {
    fn name(&self) -> &'static str {
        "format"
    }

    fn phase(&self) -> RunStage {
        RunStage::Formatting
    }

    fn process(&self, run: &mut PostprodRun, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let workspace = run
            .workspace
            .as_ref()
            .ok_or_else(|| PipelineError::stage("format", "no working copy to format"))?;

        match run_formatter(ctx.formatter, workspace.path(), &run.changes.formattable())? {
            FormatOutcome::Formatted { files } => {
                tracing::info!(files, "formatted generated files");
            }
            FormatOutcome::Skipped { reason } => {
                run.warnings.push(format!("formatting skipped: {reason}"));
            }
        }
        Ok(())
    }
}
