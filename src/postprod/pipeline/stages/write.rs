//! File writing stage.
//!
//! Checks out the run's working copy and writes pages, assets and fixtures.

use crate::postprod::pipeline::{PipelineContext, PipelineError, PostprodRun, RunStage, Stage};
use crate::postprod::writer::RepoWriter;

/// Stage that writes the run's output into a fresh working copy.
///
/// The working copy is attached to the run before anything is written, so a
/// failure here still reports what was already written.
pub struct WriteStage;

impl Stage for WriteStage {
    fn name(&self) -> &'static str {
        "write"
    }

    fn phase(&self) -> RunStage {
        RunStage::Writing
    }

    fn process(&self, run: &mut PostprodRun, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let workspace = ctx.repository.checkout(&run.branch)?;
        let root = workspace.path().to_path_buf();
        run.workspace = Some(workspace);

        let writer = RepoWriter::new(&root, ctx.layout);
        let puzzle_dir = run.puzzle_directory.as_deref();

        if let Some(metadata) = run.metadata.first() {
            for page in &run.pages {
                if page.document.is_none()
                    && writer.page_exists(page.kind, &metadata.slug, puzzle_dir)
                {
                    tracing::info!(page = %page.kind, "no source document; keeping existing page");
                    continue;
                }

                let output = page.output.as_ref().ok_or_else(|| {
                    PipelineError::stage(
                        "write",
                        format!("{} page has no output (was the bind stage run?)", page.kind),
                    )
                })?;
                writer.write_page(
                    &mut run.changes,
                    page.kind,
                    &metadata.slug,
                    puzzle_dir,
                    output,
                    &page.assets,
                )?;
            }
        }

        for metadata in &run.metadata {
            writer.write_fixture(&mut run.changes, metadata)?;
        }

        tracing::info!(files = run.changes.all().len(), "wrote generated files");
        Ok(())
    }
}
