//! Publishing stage.

use crate::postprod::pipeline::{PipelineContext, PipelineError, PostprodRun, RunStage, Stage};

/// Stage that commits the working copy and pushes the branch.
///
/// A run that changed nothing creates no commit and pushes nothing.
pub struct PublishStage;

impl Stage for PublishStage {
    fn name(&self) -> &'static str {
        "publish"
    }

    fn phase(&self) -> RunStage {
        RunStage::Publishing
    }

    fn process(&self, run: &mut PostprodRun, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let workspace = run
            .workspace
            .as_ref()
            .ok_or_else(|| PipelineError::stage("publish", "no working copy to publish"))?;

        let author = ctx.repository.signature()?;
        let Some(commit) = workspace.commit_all(&run.commit_message, &author)? else {
            return Ok(());
        };
        run.commit = Some(commit.to_string());

        if ctx.repository.pushes() {
            workspace.push(ctx.repository)?;
            run.pushed = true;
        } else {
            tracing::info!(branch = %run.branch, "push disabled; commit left in working copy");
        }
        Ok(())
    }
}
