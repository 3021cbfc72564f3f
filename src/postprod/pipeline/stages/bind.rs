//! Template binding stage.

use crate::postprod::metadata::MetadataError;
use crate::postprod::pipeline::{PipelineContext, PipelineError, PostprodRun, RunStage, Stage};
use crate::postprod::template::{Import, PageInput};

/// Stage that renders every page through its template.
///
/// Sets `page.output` for each page.
pub struct BindStage;

impl Stage for BindStage {
    fn name(&self) -> &'static str {
        "bind"
    }

    fn phase(&self) -> RunStage {
        RunStage::Binding
    }

    fn process(&self, run: &mut PostprodRun, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let metadata = run
            .metadata
            .first()
            .ok_or(MetadataError::Missing("metadata"))?;

        for page in &mut run.pages {
            let imports: Vec<Import> = page
                .assets
                .iter()
                .map(|asset| Import {
                    var: asset.var_name(),
                    path: ctx
                        .layout
                        .asset_import(page.kind, &metadata.slug, &asset.file_name()),
                })
                .collect();

            let input = PageInput {
                kind: page.kind,
                content: &page.content,
                imports: &imports,
                has_document: page.document.is_some(),
            };
            page.output = Some(ctx.binder.bind(input, metadata)?);
        }
        Ok(())
    }
}
