//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::PathBuf;

use crate::core::workspace::Workspace;

/// Catalog configuration, merged from defaults, the global user config,
/// the workspace `partcat.yaml` and environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Part number prefix, the first dot-delimited segment of every part
    /// number in the catalog.
    pub prefix: String,

    /// Directory of project trees, relative to the workspace root.
    pub projects_dir: String,

    /// Directory of vendor descriptors, relative to the workspace root.
    pub vendors_dir: String,

    /// Directory the snapshot is written to.
    pub dist_dir: String,

    /// Static assets directory served as the fallback route.
    pub public_dir: String,

    /// Gateway URL prefix that file content addresses resolve against.
    pub gateway: String,

    /// Bind address for `partcat serve`.
    pub addr: String,

    /// Pinning service endpoint for `partcat pin`.
    pub pin_endpoint: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: "PARTS".to_string(),
            projects_dir: "projects".to_string(),
            vendors_dir: "vendors".to_string(),
            dist_dir: "dist".to_string(),
            public_dir: "public".to_string(),
            gateway: "https://cf-ipfs.com/ipfs/".to_string(),
            addr: "127.0.0.1:8787".to_string(),
            pin_endpoint: "https://api.pinata.cloud/psa/pins".to_string(),
        }
    }
}

/// Partial configuration as read from a single file layer.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigOverlay {
    prefix: Option<String>,
    projects_dir: Option<String>,
    vendors_dir: Option<String>,
    dist_dir: Option<String>,
    public_dir: Option<String>,
    gateway: Option<String>,
    addr: Option<String>,
    pin_endpoint: Option<String>,
}

impl Config {
    /// Load configuration for a workspace, merging in priority order.
    pub fn load(workspace: &Workspace) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/partcat/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            config.apply_file(&global_path);
        }

        // 3. Workspace config (partcat.yaml)
        config.apply_file(&workspace.config_path());

        // 4. Environment variables
        if let Ok(prefix) = std::env::var("PARTCAT_PREFIX") {
            config.prefix = prefix;
        }
        if let Ok(addr) = std::env::var("PARTCAT_ADDR") {
            config.addr = addr;
        }
        if let Ok(gateway) = std::env::var("PARTCAT_GATEWAY") {
            config.gateway = gateway;
        }

        config
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "partcat")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    fn apply_file(&mut self, path: &std::path::Path) {
        if !path.exists() {
            return;
        }
        if let Ok(contents) = std::fs::read_to_string(path) {
            if let Ok(overlay) = serde_yml::from_str::<ConfigOverlay>(&contents) {
                self.apply(overlay);
            }
        }
    }

    fn apply(&mut self, overlay: ConfigOverlay) {
        if let Some(prefix) = overlay.prefix {
            self.prefix = prefix;
        }
        if let Some(projects_dir) = overlay.projects_dir {
            self.projects_dir = projects_dir;
        }
        if let Some(vendors_dir) = overlay.vendors_dir {
            self.vendors_dir = vendors_dir;
        }
        if let Some(dist_dir) = overlay.dist_dir {
            self.dist_dir = dist_dir;
        }
        if let Some(public_dir) = overlay.public_dir {
            self.public_dir = public_dir;
        }
        if let Some(gateway) = overlay.gateway {
            self.gateway = gateway;
        }
        if let Some(addr) = overlay.addr {
            self.addr = addr;
        }
        if let Some(pin_endpoint) = overlay.pin_endpoint {
            self.pin_endpoint = pin_endpoint;
        }
    }
}
