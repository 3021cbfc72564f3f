use anyhow::Context;

use crate::{
    ExportArgs,
    config::Config,
    postprod::{Postprod, PuzzleMetadata},
};

pub async fn run(args: &ExportArgs) -> Result<(), anyhow::Error> {
    let config = Config::load_from_arg(args.config_file.as_deref())?;

    let text = std::fs::read_to_string(&args.puzzles)
        .with_context(|| format!("failed to read {}", args.puzzles.display()))?;
    let records: Vec<PuzzleMetadata> = serde_yaml::from_str(&text)
        .with_context(|| format!("invalid puzzle list in {}", args.puzzles.display()))?;
    tracing::info!(puzzles = records.len(), "exporting fixtures");

    let result = tokio::task::spawn_blocking(move || {
        Postprod::from_config(config).map(|postprod| postprod.export(records))
    })
    .await??;

    super::report(&result, args.json)
}
