//! Cascade CLI - Command-line interface for Cascade
//!
//! This is the main entry point for users interacting with Cascade.
//! It loads a unit tree into the sandbox runtime, then inspects the learned
//! dependency graph or reloads units and their ancestors.

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

mod commands;
mod console;

#[derive(Parser)]
#[command(name = "cascade")]
#[command(author = "Cascade Contributors")]
#[command(version)]
#[command(about = "Ancestor-ordered reloads for live unit trees", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also append log lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Cascade in the current directory
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Load the unit tree and print the dependency graph
    Graph {
        /// Unit tree root (defaults to current directory)
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Units to load first (defaults to every unit under the root)
        #[arg(short, long)]
        entry: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: GraphFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the order a reload of a unit would follow, without reloading
    Plan {
        /// The changed unit
        unit: String,

        /// Unit tree root (defaults to current directory)
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Units to load first (defaults to every unit under the root)
        #[arg(short, long)]
        entry: Vec<String>,

        /// Output as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Reload a unit and its ancestors once
    Reload {
        /// The unit to reload
        unit: String,

        /// Unit tree root (defaults to current directory)
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Units to load first (defaults to every unit under the root)
        #[arg(short, long)]
        entry: Vec<String>,

        /// Output as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Watch the unit tree and reload changed units with their ancestors
    Watch {
        /// Unit tree root (defaults to current directory)
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Units to load first (defaults to every unit under the root)
        #[arg(short, long)]
        entry: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum GraphFormat {
    Json,
    Dot,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };

    let file_layer = match &cli.log_file {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            ),
            Err(e) => {
                eprintln!(
                    "{} cannot open log file {}: {}",
                    "error:".red().bold(),
                    path.display(),
                    e
                );
                std::process::exit(1);
            }
        },
        None => None,
    };

    // Reload reports reach the terminal through the console sink.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter_fn(|meta| !console::is_report(meta.target()))),
        )
        .with(file_layer)
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let result = match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Graph {
            root,
            entry,
            format,
            output,
        } => commands::graph(&root, &entry, format, output.as_deref()),
        Commands::Plan {
            unit,
            root,
            entry,
            json,
        } => commands::plan(&unit, &root, &entry, json),
        Commands::Reload {
            unit,
            root,
            entry,
            json,
        } => commands::reload(&unit, &root, &entry, json),
        Commands::Watch { root, entry } => commands::watch(&root, &entry).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
