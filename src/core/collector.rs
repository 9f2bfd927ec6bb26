//! Directory tree collection
//!
//! Stage 1 of the build pipeline: fold the workspace's directory tree into
//! the raw, normalized [`Snapshot`]. One project record per directory
//! level; sibling entries are read with rayon fan-out and joined before
//! the parent record is assembled, since part-readme attachment needs
//! every descriptor in the directory already parsed. Each task owns a
//! disjoint subtree, so nothing is mutated concurrently.
//!
//! Directory entries are enumerated in sorted filename order. The order
//! drives no semantics but keeps the emitted snapshot reproducible.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::catalog::{CatalogError, Descriptor, File, RawPart, RawProject, Snapshot, Vendor};
use crate::core::config::Config;
use crate::core::identity::{PartNumber, ProjectId};
use crate::core::license::{self, LicenseAccumulator};
use crate::core::workspace::Workspace;
use crate::yaml::diagnostics::YamlSyntaxError;

/// Descriptor suffixes recognized inside a project directory.
const PART_SUFFIXES: [&str; 2] = [".part.yml", ".part.yaml"];
const PART_README_SUFFIX: &str = ".part.md";
const PROJECT_README: &str = "README.md";

/// Query-parameter encoding for derived file URLs.
const FILENAME_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Collect the whole workspace into a raw snapshot.
pub fn collect(workspace: &Workspace, config: &Config) -> Result<Snapshot, CatalogError> {
    let vendors = collect_vendors(&workspace.vendors_dir(config))?;
    let projects = collect_forest(&workspace.projects_dir(config), config)?;

    // Build-wide license dedup: one pass over the finished forest with an
    // explicit accumulator, after the parallel reads have joined.
    let mut accumulator = LicenseAccumulator::new();
    for project in &projects {
        record_licenses(project, &mut accumulator);
    }

    Ok(Snapshot {
        projects,
        vendors,
        licenses: accumulator.into_table(),
    })
}

/// Read every top-level project directory under `dir`.
fn collect_forest(dir: &Path, config: &Config) -> Result<Vec<RawProject>, CatalogError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    sorted_entries(dir)?
        .par_iter()
        .filter(|path| path.is_dir())
        .map(|path| collect_project(path, None, config))
        .collect()
}

/// Read one project directory (and, recursively, its subdirectories).
fn collect_project(
    path: &Path,
    parent: Option<&ProjectId>,
    config: &Config,
) -> Result<RawProject, CatalogError> {
    let name = file_name(path);
    let id = match parent {
        Some(parent) => parent.child(&name),
        None => ProjectId::root(&name),
    };

    let loaded: Vec<Loaded> = sorted_entries(path)?
        .par_iter()
        .map(|entry| load_entry(entry, &id, config))
        .collect::<Result<_, _>>()?;

    // All children of this directory have joined; assemble the record in
    // directory-entry order.
    let mut project = RawProject {
        id,
        projects: Vec::new(),
        parts: Vec::new(),
        readme: None,
    };
    let mut part_readmes: Vec<(String, String)> = Vec::new();

    for item in loaded {
        match item {
            Loaded::Project(sub) => project.projects.push(sub),
            Loaded::Part(part) => project.parts.push(part),
            Loaded::ProjectReadme(text) => project.readme = Some(text),
            Loaded::PartReadme { key, text } => part_readmes.push((key, text)),
            Loaded::Skipped => {}
        }
    }

    // Attachment is by computed part number, so it must run after every
    // descriptor in the directory has been read.
    for (key, text) in part_readmes {
        match project
            .parts
            .iter_mut()
            .find(|part| part.part_number.key() == key)
        {
            Some(part) => part.readme = Some(text),
            None => {
                // Orphaned readme: warn and skip, never invent a part.
                tracing::warn!(part = %key, "part readme without a matching descriptor, skipping");
            }
        }
    }

    Ok(project)
}

/// One classified directory entry, fully read.
enum Loaded {
    Project(RawProject),
    Part(RawPart),
    ProjectReadme(String),
    PartReadme { key: String, text: String },
    Skipped,
}

fn load_entry(path: &Path, project: &ProjectId, config: &Config) -> Result<Loaded, CatalogError> {
    let name = file_name(path);

    if path.is_dir() {
        return collect_project(path, Some(project), config).map(Loaded::Project);
    }
    if let Some(local) = strip_part_suffix(&name) {
        let part_number = PartNumber::new(&config.prefix, Some(project), local);
        return read_part(path, part_number, config).map(Loaded::Part);
    }
    if name == PROJECT_README {
        return Ok(Loaded::ProjectReadme(read_text(path)?));
    }
    if let Some(local) = name.strip_suffix(PART_README_SUFFIX) {
        let part_number = PartNumber::new(&config.prefix, Some(project), local);
        return Ok(Loaded::PartReadme {
            key: part_number.key(),
            text: read_text(path)?,
        });
    }
    Ok(Loaded::Skipped)
}

/// Parse one part descriptor file, deriving file URLs and license id sets.
fn read_part(
    path: &Path,
    part_number: PartNumber,
    config: &Config,
) -> Result<RawPart, CatalogError> {
    let contents = read_text(path)?;
    let mut descriptor: Descriptor = serde_yml::from_str(&contents)
        .map_err(|err| YamlSyntaxError::new(&err, &contents, &file_name(path)))?;

    // computed fields are authoritative, never the authored descriptor
    descriptor.extra.remove("part_number");
    descriptor.extra.remove("readme");

    for file in &mut descriptor.files {
        derive_url(file, &config.gateway);
        expand_license(file, path)?;
    }

    Ok(RawPart {
        part_number,
        readme: None,
        descriptor,
    })
}

/// Derive the retrieval URL from the content address, appending the
/// filename as a percent-encoded query parameter when present.
fn derive_url(file: &mut File, gateway: &str) {
    if let Some(cid) = &file.ipfs {
        let mut url = format!("{}{}", gateway, cid);
        if let Some(filename) = &file.filename {
            url.push_str("?filename=");
            url.push_str(&utf8_percent_encode(filename, FILENAME_SET).to_string());
        }
        file.url = Some(url);
    }
}

/// Parse the license expression and cache its distinct leaf ids.
fn expand_license(file: &mut File, path: &Path) -> Result<(), CatalogError> {
    if let Some(expr) = &file.license {
        file.license_ids =
            license::referenced_ids(expr).map_err(|source| CatalogError::License {
                expr: expr.clone(),
                path: path.to_path_buf(),
                source,
            })?;
    }
    Ok(())
}

fn record_licenses(project: &RawProject, accumulator: &mut LicenseAccumulator) {
    for part in &project.parts {
        for file in &part.descriptor.files {
            for id in &file.license_ids {
                accumulator.record(id);
            }
        }
    }
    for sub in &project.projects {
        record_licenses(sub, accumulator);
    }
}

/// Read every vendor descriptor; the vendor id is the file stem.
fn collect_vendors(dir: &Path) -> Result<Vec<Vendor>, CatalogError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    sorted_entries(dir)?
        .par_iter()
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == "yml" || ext == "yaml")
        })
        .map(|path| read_vendor(path))
        .collect()
}

fn read_vendor(path: &Path) -> Result<Vendor, CatalogError> {
    let contents = read_text(path)?;
    let mut fields: serde_json::Map<String, serde_json::Value> =
        serde_yml::from_str(&contents)
            .map_err(|err| YamlSyntaxError::new(&err, &contents, &file_name(path)))?;
    // the file stem is authoritative for the id
    fields.remove("id");
    let id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Vendor { id, fields })
}

fn strip_part_suffix(name: &str) -> Option<&str> {
    PART_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_text(path: &Path) -> Result<String, CatalogError> {
    fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    let entries = fs::read_dir(dir).map_err(|source| CatalogError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fixture() -> (tempfile::TempDir, Workspace, Config) {
        let tmp = tempdir().unwrap();
        let workspace = Workspace::init(tmp.path(), false).unwrap();
        let config = Config {
            prefix: "ACME".to_string(),
            ..Config::default()
        };
        (tmp, workspace, config)
    }

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_collects_nested_tree_with_numbering() {
        let (_tmp, workspace, config) = fixture();
        let root = workspace.root();
        write(root, "projects/gizmo/README.md", "# Gizmo\n");
        write(root, "projects/gizmo/motor.part.yml", "name: Motor\n");
        write(root, "projects/gizmo/motor.part.md", "# Motor notes\n");
        write(root, "projects/gizmo/drive/gearbox.part.yml", "name: Gearbox\n");
        write(root, "vendors/initech.yml", "name: Initech\n");

        let snapshot = collect(&workspace, &config).unwrap();

        assert_eq!(snapshot.projects.len(), 1);
        let gizmo = &snapshot.projects[0];
        assert_eq!(gizmo.id.as_str(), "gizmo");
        assert_eq!(gizmo.readme.as_deref(), Some("# Gizmo\n"));
        assert_eq!(gizmo.parts.len(), 1);
        assert_eq!(gizmo.parts[0].part_number.as_str(), "ACME.gizmo.motor");
        assert_eq!(gizmo.parts[0].readme.as_deref(), Some("# Motor notes\n"));

        assert_eq!(gizmo.projects.len(), 1);
        let drive = &gizmo.projects[0];
        assert_eq!(drive.id.as_str(), "gizmo.drive");
        assert_eq!(
            drive.parts[0].part_number.as_str(),
            "ACME.gizmo.drive.gearbox"
        );

        assert_eq!(snapshot.vendors.len(), 1);
        assert_eq!(snapshot.vendors[0].id, "initech");
        assert_eq!(
            snapshot.vendors[0].fields["name"],
            serde_json::json!("Initech")
        );
    }

    #[test]
    fn test_orphaned_part_readme_is_skipped() {
        let (_tmp, workspace, config) = fixture();
        let root = workspace.root();
        write(root, "projects/gizmo/motor.part.yml", "name: Motor\n");
        write(root, "projects/gizmo/stray.part.md", "# No such part\n");

        let snapshot = collect(&workspace, &config).unwrap();
        let gizmo = &snapshot.projects[0];
        assert_eq!(gizmo.parts.len(), 1);
        assert!(gizmo.parts[0].readme.is_none());
    }

    #[test]
    fn test_file_url_derivation_percent_encodes_filename() {
        let (_tmp, workspace, config) = fixture();
        let root = workspace.root();
        write(
            root,
            "projects/gizmo/bracket.part.yml",
            "files:\n  - filename: mount bracket.stl\n    ipfs: QmBracket\n  - filename: notes.txt\n",
        );

        let snapshot = collect(&workspace, &config).unwrap();
        let files = &snapshot.projects[0].parts[0].descriptor.files;
        assert_eq!(
            files[0].url.as_deref(),
            Some("https://cf-ipfs.com/ipfs/QmBracket?filename=mount%20bracket.stl")
        );
        // no content address, no derived URL
        assert!(files[1].url.is_none());
    }

    #[test]
    fn test_license_expansion_fills_table() {
        let (_tmp, workspace, config) = fixture();
        let root = workspace.root();
        write(
            root,
            "projects/gizmo/board.part.yml",
            "files:\n  - filename: board.kicad_pcb\n    license: MIT OR Apache-2.0\n",
        );

        let snapshot = collect(&workspace, &config).unwrap();
        let file = &snapshot.projects[0].parts[0].descriptor.files[0];
        assert_eq!(file.license_ids, vec!["MIT", "Apache-2.0"]);
        assert!(snapshot.licenses["MIT"].contains("Permission is hereby granted"));
        assert_eq!(
            snapshot.licenses["Apache-2.0"],
            "Couldn't find license text for Apache-2.0"
        );
    }

    #[test]
    fn test_malformed_descriptor_is_fatal() {
        let (_tmp, workspace, config) = fixture();
        let root = workspace.root();
        write(root, "projects/gizmo/bad.part.yml", "name: [unclosed\n");

        let err = collect(&workspace, &config).unwrap_err();
        assert!(matches!(err, CatalogError::Yaml(_)));
    }

    #[test]
    fn test_malformed_license_is_fatal() {
        let (_tmp, workspace, config) = fixture();
        let root = workspace.root();
        write(
            root,
            "projects/gizmo/board.part.yml",
            "files:\n  - license: MIT OR\n",
        );

        let err = collect(&workspace, &config).unwrap_err();
        assert!(matches!(err, CatalogError::License { .. }));
    }

    #[test]
    fn test_sibling_order_is_sorted_and_stable() {
        let (_tmp, workspace, config) = fixture();
        let root = workspace.root();
        write(root, "projects/gizmo/zeta.part.yml", "{}\n");
        write(root, "projects/gizmo/alpha.part.yml", "{}\n");
        write(root, "projects/gizmo/midway.part.yml", "{}\n");

        let snapshot = collect(&workspace, &config).unwrap();
        let numbers: Vec<&str> = snapshot.projects[0]
            .parts
            .iter()
            .map(|part| part.part_number.as_str())
            .collect();
        assert_eq!(
            numbers,
            vec!["ACME.gizmo.alpha", "ACME.gizmo.midway", "ACME.gizmo.zeta"]
        );
    }
}
