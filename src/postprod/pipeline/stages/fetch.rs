//! Document fetching stage.

use crate::postprod::fetch::fetch_document;
use crate::postprod::pipeline::{PipelineContext, PipelineError, PostprodRun, RunStage, Stage};

/// Stage that exports every page's source document.
///
/// Pages without a document are left for the write stage to handle.
pub struct FetchStage;

impl Stage for FetchStage {
    fn name(&self) -> &'static str {
        "fetch"
    }

    fn phase(&self) -> RunStage {
        RunStage::Fetching
    }

    fn process(&self, run: &mut PostprodRun, ctx: &PipelineContext) -> Result<(), PipelineError> {
        for page in &mut run.pages {
            if let Some(doc) = &page.document {
                page.fetched = Some(fetch_document(ctx.documents, doc)?);
            }
        }
        Ok(())
    }
}
