//! Command implementations

pub mod build;
pub mod completions;
pub mod init;
pub mod pin;
pub mod serve;

use miette::Result;

use crate::cli::args::GlobalOpts;
use crate::core::workspace::Workspace;

/// Locate the workspace, honoring the global `--root` flag.
pub(crate) fn workspace(global: &GlobalOpts) -> Result<Workspace> {
    let workspace = match &global.root {
        Some(root) => Workspace::at(root),
        None => Workspace::discover(),
    };
    workspace.map_err(|e| miette::miette!("{}", e))
}
