//! Depscope CLI entry point

use clap::{Parser, Subcommand};
use depscope_core::FileEvent;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "depscope", version)]
#[command(about = "Decide which Go build targets own a changed file", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Module root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Extra build tags, comma separated
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,

    /// Include _test.go files
    #[arg(long)]
    tests: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Does the handler rooted at ENTRY own a change to FILE?
    Owns {
        entry: PathBuf,
        file: PathBuf,
        #[arg(long, default_value = "write")]
        event: FileEvent,
    },
    /// Entry points whose artifact includes a file with this name
    Mains { file_name: String },
    /// Units under SOURCE that depend, transitively, on any TARGET
    ReverseDeps {
        source: String,
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// Ownership plus affected entry points, as JSON
    Impact {
        entry: PathBuf,
        file: PathBuf,
        #[arg(long, default_value = "write")]
        event: FileEvent,
    },
    /// Watch the tree and report which entry points own each change
    Watch {
        #[arg(required = true)]
        entries: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("depscope={}", log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Depscope v{}", env!("CARGO_PKG_VERSION"));
    let ctx = commands::Context::load(cli.root, &cli.tags, cli.tests)?;
    tracing::debug!("Module root: {}", ctx.root.display());

    match cli.command {
        Commands::Owns { entry, file, event } => commands::owns(&ctx, &entry, &file, event),
        Commands::Mains { file_name } => commands::mains(&ctx, &file_name),
        Commands::ReverseDeps { source, targets } => commands::reverse_deps(&ctx, &source, &targets),
        Commands::Impact { entry, file, event } => commands::impact(&ctx, &entry, &file, event),
        Commands::Watch { entries } => commands::watch(&ctx, entries).await,
    }
}
