//! Markup transformation stage.

use std::collections::HashMap;

use crate::postprod::pipeline::{PipelineContext, PipelineError, PostprodRun, RunStage, Stage};
use crate::postprod::transform::transform;

/// Stage that turns exported HTML into page content.
///
/// Image sources are rewritten to the identifiers their assets are imported as.
pub struct TransformStage;

impl Stage for TransformStage {
    fn name(&self) -> &'static str {
        "transform"
    }

    fn phase(&self) -> RunStage {
        RunStage::Transforming
    }

    fn process(&self, run: &mut PostprodRun, _ctx: &PipelineContext) -> Result<(), PipelineError> {
        let mut warnings = Vec::new();
        for page in &mut run.pages {
            let Some(fetched) = &page.fetched else {
                continue;
            };
            let image_vars: HashMap<String, String> = page
                .assets
                .iter()
                .map(|asset| (asset.source_url.clone(), asset.var_name()))
                .collect();

            let transformed = transform(&fetched.html, &image_vars);
            warnings.extend(
                transformed
                    .warnings
                    .into_iter()
                    .map(|warning| format!("{} page: {warning}", page.kind)),
            );
            page.content = transformed.markup;
        }
        for warning in warnings {
            run.warn(warning);
        }
        Ok(())
    }
}
