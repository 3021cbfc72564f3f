use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod git;
mod lock;
mod postprod;
mod util;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Log debug detail (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// The command to execute
    #[command(subcommand)]
    command: AutopostprodCommand,
}

#[derive(Parser)]
struct InitArgs {
    /// The directory to write the configuration file to
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Whether to create the directory if it doesn't exist
    #[arg(short, long, default_value = "false")]
    create: bool,

    /// URL of the hunt repository to publish to
    #[arg(short, long, default_value = "git@github.com:example/hunt-site.git")]
    repository: String,

    /// Overwrite an existing configuration file
    #[arg(long, default_value = "false")]
    force: bool,
}

#[derive(Parser)]
struct RunArgs {
    /// The path to the configuration file
    #[arg(short, long, default_value = "autopostprod.yaml")]
    config_file: Option<PathBuf>,

    /// The puzzle document (URL or id)
    #[arg(long)]
    puzzle_doc: String,

    /// The solution document (URL or id)
    #[arg(long)]
    solution_doc: Option<String>,

    /// YAML or JSON file with the puzzle's metadata
    #[arg(short, long)]
    metadata: PathBuf,

    /// Page directory to use instead of the slug
    #[arg(long)]
    puzzle_directory: Option<String>,

    /// Maximum image width in pixels (0 disables resizing)
    #[arg(long, conflicts_with = "max_width_percent")]
    max_width: Option<u32>,

    /// Maximum image width as a percentage of the page container
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
    max_width_percent: Option<u32>,

    /// Print the result as JSON
    #[arg(long, default_value = "false")]
    json: bool,
}

#[derive(Parser)]
struct ExportArgs {
    /// The path to the configuration file
    #[arg(short, long, default_value = "autopostprod.yaml")]
    config_file: Option<PathBuf>,

    /// YAML or JSON file with a list of puzzle metadata records
    puzzles: PathBuf,

    /// Print the result as JSON
    #[arg(long, default_value = "false")]
    json: bool,
}

#[derive(Parser)]
struct ServeArgs {
    /// The address to bind to
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: String,

    /// The port to bind to
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// The path to the configuration file
    #[arg(short, long, default_value = "autopostprod.yaml")]
    config_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum AutopostprodCommand {
    /// Write a default configuration file
    Init(InitArgs),

    /// Postprod one puzzle and push it to its branch
    Run(RunArgs),

    /// Write fixtures for many puzzles to a new branch
    ExportFixtures(ExportArgs),

    /// Accept postprod requests over HTTP
    Serve(ServeArgs),
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        AutopostprodCommand::Init(args) => {
            commands::init::run(&args).await?;
        }
        AutopostprodCommand::Run(args) => {
            commands::run::run(&args).await?;
        }
        AutopostprodCommand::ExportFixtures(args) => {
            commands::export::run(&args).await?;
        }
        AutopostprodCommand::Serve(args) => {
            commands::serve::run(&args).await?;
        }
    }

    Ok(())
}
