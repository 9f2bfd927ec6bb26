//! Workspace discovery and scaffolding
//!
//! A workspace is a directory carrying a `partcat.yaml` config next to the
//! content directories (`projects/`, `vendors/`, `public/`).

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::config::Config;

/// Name of the workspace marker/config file.
pub const CONFIG_FILE: &str = "partcat.yaml";

/// A located partcat workspace
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Find the workspace root by walking up from the current directory.
    pub fn discover() -> Result<Self, WorkspaceError> {
        let current =
            std::env::current_dir().map_err(|e| WorkspaceError::Io(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find the workspace root by walking up from the given directory.
    pub fn discover_from(start: &Path) -> Result<Self, WorkspaceError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| WorkspaceError::Io(e.to_string()))?;

        loop {
            if current.join(CONFIG_FILE).is_file() {
                return Ok(Self { root: current });
            }
            if !current.pop() {
                return Err(WorkspaceError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Use an explicitly given root (the `--root` flag).
    pub fn at(root: &Path) -> Result<Self, WorkspaceError> {
        let root = root
            .canonicalize()
            .map_err(|e| WorkspaceError::Io(e.to_string()))?;
        Ok(Self { root })
    }

    /// Scaffold a new workspace at the given path.
    pub fn init(path: &Path, force: bool) -> Result<Self, WorkspaceError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() && !force {
            return Err(WorkspaceError::AlreadyExists(root));
        }

        for dir in ["projects", "vendors", "public", "dist"] {
            std::fs::create_dir_all(root.join(dir))
                .map_err(|e| WorkspaceError::Io(e.to_string()))?;
        }
        std::fs::write(&config_path, Self::default_config())
            .map_err(|e| WorkspaceError::Io(e.to_string()))?;

        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# partcat workspace configuration

# Part number prefix: every part number is <prefix>.<project path>.<name>
# prefix: PARTS

# Content directories, relative to this file
# projects_dir: projects
# vendors_dir: vendors
# public_dir: public
# dist_dir: dist

# Gateway that file content addresses resolve against
# gateway: https://cf-ipfs.com/ipfs/

# Bind address for `partcat serve`
# addr: 127.0.0.1:8787
"#
    }

    /// Get the workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn projects_dir(&self, config: &Config) -> PathBuf {
        self.root.join(&config.projects_dir)
    }

    pub fn vendors_dir(&self, config: &Config) -> PathBuf {
        self.root.join(&config.vendors_dir)
    }

    pub fn public_dir(&self, config: &Config) -> PathBuf {
        self.root.join(&config.public_dir)
    }

    /// Path the snapshot is written to and reloaded from.
    pub fn snapshot_path(&self, config: &Config) -> PathBuf {
        self.root.join(&config.dist_dir).join("parts.json")
    }

    /// Static mirror of the snapshot under the public directory.
    pub fn public_snapshot_path(&self, config: &Config) -> PathBuf {
        self.public_dir(config).join("parts.json")
    }

    /// Path of the persisted denormalized view.
    pub fn denormalized_path(&self, config: &Config) -> PathBuf {
        self.root.join(&config.dist_dir).join("denormalized.json")
    }
}

/// Errors that can occur during workspace operations
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(
        "not a partcat workspace (no {CONFIG_FILE} found above {searched_from:?}). Run 'partcat init' to create one."
    )]
    NotFound { searched_from: PathBuf },

    #[error("a partcat workspace already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    Io(String),
}
