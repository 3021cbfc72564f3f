//! Asset processing stage.

use crate::postprod::assets::process_all;
use crate::postprod::pipeline::{PipelineContext, PipelineError, PostprodRun, RunStage, Stage};

/// Stage that downloads and optimizes the images of every fetched page.
///
/// A single failed image fails the run.
pub struct AssetStage;

impl Stage for AssetStage {
    fn name(&self) -> &'static str {
        "assets"
    }

    fn phase(&self) -> RunStage {
        RunStage::ProcessingAssets
    }

    fn process(&self, run: &mut PostprodRun, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let mut warnings = Vec::new();
        for page in &mut run.pages {
            let Some(fetched) = &page.fetched else {
                continue;
            };
            let (assets, page_warnings) =
                process_all(ctx.assets, &fetched.image_urls, run.max_image_width)?;
            tracing::debug!(page = %page.kind, count = assets.len(), "processed assets");
            page.assets = assets;
            warnings.extend(page_warnings);
        }
        run.warnings.extend(warnings);
        Ok(())
    }
}
