//! `partcat build` command - compile the catalog snapshot
//!
//! Runs the collector and resolver over the workspace, writes the
//! snapshot, then self-checks that the freshly emitted artifact reloads
//! into an equivalent catalog. Any resolution failure aborts the build.

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::args::GlobalOpts;
use crate::core::catalog::{CatalogError, RawProject, Snapshot};
use crate::core::collector;
use crate::core::config::Config;
use crate::core::resolver;

#[derive(clap::Args, Debug)]
pub struct BuildArgs {
    /// Validate the catalog without writing the snapshot
    #[arg(long)]
    pub check: bool,
}

pub fn run(args: BuildArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = super::workspace(global)?;
    let config = Config::load(&workspace);

    let snapshot = collector::collect(&workspace, &config)?;
    let (project_count, part_count) = counts(&snapshot);
    if !global.quiet {
        println!(
            "{} Collected {} project(s), {} part(s), {} vendor(s)",
            style("→").blue(),
            project_count,
            part_count,
            snapshot.vendors.len()
        );
    }

    let catalog = resolver::resolve(snapshot.clone())?;

    if args.check {
        if !global.quiet {
            println!("{} Catalog is valid", style("✓").green());
        }
        return Ok(());
    }

    let dist_path = workspace.snapshot_path(&config);
    snapshot.write(&dist_path)?;
    snapshot.write(&workspace.public_snapshot_path(&config))?;

    let mut denormalized =
        serde_json::to_string_pretty(&catalog.to_json()?).map_err(CatalogError::from)?;
    denormalized.push('\n');
    std::fs::write(workspace.denormalized_path(&config), denormalized).into_diagnostic()?;

    // The emitted artifact must round-trip: reload it and compare the
    // flat indexes against the catalog we just resolved.
    let reloaded = Snapshot::load(&dist_path)
        .and_then(resolver::resolve)
        .map_err(|err| CatalogError::SelfCheck(err.to_string()))?;
    catalog
        .verify_equivalent(&reloaded)
        .map_err(CatalogError::SelfCheck)?;

    if !global.quiet {
        println!(
            "{} Wrote {}",
            style("✓").green(),
            style(dist_path.display()).cyan()
        );
    }
    Ok(())
}

fn counts(snapshot: &Snapshot) -> (usize, usize) {
    fn walk(project: &RawProject, projects: &mut usize, parts: &mut usize) {
        *projects += 1;
        *parts += project.parts.len();
        for sub in &project.projects {
            walk(sub, projects, parts);
        }
    }
    let (mut projects, mut parts) = (0, 0);
    for project in &snapshot.projects {
        walk(project, &mut projects, &mut parts);
    }
    (projects, parts)
}
