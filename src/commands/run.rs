use std::path::Path;

use anyhow::Context;

use crate::{
    RunArgs,
    config::Config,
    postprod::{DocumentRef, ImageWidth, Postprod, PostprodRequest, PuzzleMetadata},
};

pub async fn run(args: &RunArgs) -> Result<(), anyhow::Error> {
    let config = Config::load_from_arg(args.config_file.as_deref())?;

    let request = PostprodRequest {
        puzzle_doc: DocumentRef::parse(&args.puzzle_doc)?,
        solution_doc: args
            .solution_doc
            .as_deref()
            .map(DocumentRef::parse)
            .transpose()?,
        metadata: read_metadata(&args.metadata)?,
        puzzle_directory: args.puzzle_directory.clone(),
        max_image_width: match (args.max_width, args.max_width_percent) {
            (Some(pixels), _) => Some(ImageWidth::Pixels(pixels)),
            (None, Some(percent)) => Some(ImageWidth::Percent(percent)),
            (None, None) => None,
        },
    };

    // git2, blocking HTTP and the formatter all block
    let result = tokio::task::spawn_blocking(move || {
        Postprod::from_config(config).map(|postprod| postprod.run(request))
    })
    .await??;

    super::report(&result, args.json)
}

/// Read a metadata record from a YAML or JSON file.
fn read_metadata(path: &Path) -> Result<PuzzleMetadata, anyhow::Error> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read metadata file {}", path.display()))?;
    serde_yaml::from_str(&text)
        .with_context(|| format!("invalid metadata in {}", path.display()))
}
