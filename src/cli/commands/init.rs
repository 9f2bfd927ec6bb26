//! `partcat init` command - scaffold a new catalog workspace

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::core::workspace::{Workspace, WorkspaceError};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,

    /// Force initialization even if partcat.yaml already exists
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
    }

    match Workspace::init(&path, args.force) {
        Ok(workspace) => {
            println!(
                "{} Initialized catalog workspace at {}",
                style("✓").green(),
                style(workspace.root().display()).cyan()
            );
            println!();
            println!("Next steps:");
            println!(
                "  {} Describe a part as projects/<project>/<name>.part.yml",
                style("→").blue()
            );
            println!(
                "  {} Compile the catalog snapshot",
                style("partcat build").yellow()
            );
            println!(
                "  {} Serve the catalog locally",
                style("partcat serve").yellow()
            );
            Ok(())
        }
        Err(WorkspaceError::AlreadyExists(path)) => {
            println!(
                "{} A catalog workspace already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!(
                "Use {} to reinitialize",
                style("partcat init --force").yellow()
            );
            Ok(())
        }
        Err(err) => Err(miette::miette!("{}", err)),
    }
}
