//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::{
    build::BuildArgs, completions::CompletionsArgs, init::InitArgs, pin::PinArgs, serve::ServeArgs,
};

#[derive(Parser)]
#[command(name = "partcat")]
#[command(author, version, about = "Parts Catalog Toolkit")]
#[command(
    long_about = "Compile hierarchical parts catalogs from plain-text YAML files into a cross-referenced snapshot, and serve them over HTTP."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Workspace root (default: auto-detect by finding partcat.yaml)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new catalog workspace
    Init(InitArgs),

    /// Collect and resolve the catalog, writing the snapshot
    Build(BuildArgs),

    /// Serve the catalog lookup API and static assets
    Serve(ServeArgs),

    /// Pin content-addressed files to the configured pinning service
    Pin(PinArgs),

    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}
