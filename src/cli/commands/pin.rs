//! `partcat pin` command - pin content-addressed files
//!
//! Iterates every file with a content address and requests persistence
//! from the pinning service. A single failure is logged and flags a
//! non-zero exit, but never aborts the remaining pins.

use futures_util::future::join_all;
use miette::{IntoDiagnostic, Result};
use tracing::{error, info, warn};

use crate::cli::args::GlobalOpts;
use crate::core::catalog::Snapshot;
use crate::core::config::Config;
use crate::core::pin::{PinClient, PinOutcome};
use crate::core::resolver;

#[derive(clap::Args, Debug)]
pub struct PinArgs {
    /// Pinning service endpoint (default: from config)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Bearer token for the pinning service
    #[arg(long, env = "PINATA_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

pub fn run(args: PinArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = super::workspace(global)?;
    let config = Config::load(&workspace);

    let Some(token) = args.token else {
        return Err(miette::miette!(
            "missing pinning token: pass --token or set PINATA_TOKEN"
        ));
    };

    let snapshot = Snapshot::load(&workspace.snapshot_path(&config))?;
    let catalog = resolver::resolve(snapshot)?;

    let jobs: Vec<(String, Option<String>)> = catalog
        .part_list()
        .flat_map(|part| part.descriptor.files.iter())
        .filter_map(|file| {
            file.ipfs
                .clone()
                .map(|cid| (cid, file.filename.clone()))
        })
        .collect();

    if jobs.is_empty() {
        if !global.quiet {
            println!("Nothing to pin: no files carry a content address");
        }
        return Ok(());
    }

    let endpoint = args.endpoint.unwrap_or_else(|| config.pin_endpoint.clone());
    let client = PinClient::new(endpoint, token);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    let results = runtime.block_on(async {
        join_all(
            jobs.iter()
                .map(|(cid, name)| client.pin(cid, name.as_deref())),
        )
        .await
    });

    let mut failed = 0usize;
    for ((cid, _), result) in jobs.iter().zip(results) {
        match result {
            Ok(PinOutcome::Pinned) => info!(cid = %cid, "pinned"),
            Ok(PinOutcome::AlreadyPinned) => warn!(cid = %cid, "was already pinned"),
            Err(err) => {
                error!(cid = %cid, error = %err, "pin failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(miette::miette!(
            "{} of {} pin request(s) failed",
            failed,
            jobs.len()
        ));
    }
    if !global.quiet {
        println!("Pinned {} file(s)", jobs.len());
    }
    Ok(())
}
