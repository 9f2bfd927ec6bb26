//! `partcat serve` command - serve the catalog over HTTP

use console::style;
use miette::{IntoDiagnostic, Result};
use std::sync::Arc;

use crate::cli::args::GlobalOpts;
use crate::cli::commands::build::{self, BuildArgs};
use crate::core::catalog::Snapshot;
use crate::core::config::Config;
use crate::core::resolver;
use crate::serve::{self, AppState, Pages};

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Bind address (default: from config)
    #[arg(long)]
    pub addr: Option<String>,

    /// Rebuild the snapshot before serving
    #[arg(long)]
    pub build: bool,
}

pub fn run(args: ServeArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = super::workspace(global)?;
    let config = Config::load(&workspace);
    let snapshot_path = workspace.snapshot_path(&config);

    if args.build || !snapshot_path.exists() {
        build::run(BuildArgs { check: false }, global)?;
    }

    let snapshot = Snapshot::load(&snapshot_path)?;
    let catalog = resolver::resolve(snapshot)?;
    let pages = Pages::new().map_err(|e| miette::miette!("{}", e))?;
    let state = Arc::new(AppState {
        catalog,
        pages,
        client: reqwest::Client::new(),
    });
    let router = serve::router(state, &workspace.public_dir(&config));

    let addr = args.addr.unwrap_or_else(|| config.addr.clone());
    if !global.quiet {
        println!(
            "{} Serving catalog on {}",
            style("→").blue(),
            style(&addr).cyan()
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    runtime.block_on(serve::serve(&addr, router)).into_diagnostic()
}
