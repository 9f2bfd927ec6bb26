//! Catalog data model
//!
//! Two representations exist side by side:
//!
//! - the **raw** tree ([`RawProject`] / [`RawPart`] inside a [`Snapshot`]):
//!   what the collector folds out of the directory tree, with ids computed
//!   but cross-references still plain strings. This is the serializable
//!   build artifact.
//! - the **resolved** graph ([`Catalog`]): flat id-indexed tables produced
//!   by the resolver. Links between nodes are id lookups through the
//!   tables, never object cycles, so the graph stays serialization-safe
//!   and free of ownership ambiguity.
//!
//! The whole graph is built once per build cycle and treated as immutable
//! afterwards.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::identity::{PartNumber, ProjectId};
use crate::core::license::LicenseParseError;
use crate::yaml::diagnostics::YamlSyntaxError;

/// A flat supplier record referenced by id from part descriptors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vendor {
    /// Vendor id: the file stem under the vendors directory.
    pub id: String,

    /// Arbitrary descriptor fields (name, url, contact, ...).
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// A downloadable artifact attached to a part.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct File {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Content address on the IPFS network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipfs: Option<String>,

    /// Retrieval URL derived from the content address and filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// SPDX-style license expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Distinct license ids referenced by `license`, in leaf order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub license_ids: Vec<String>,
}

/// Manufacturing details on a part descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manufacturing {
    /// Part number of the stock material this part is made from.
    /// Canonicalized to the uppercased index key during resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The authored fields of a part descriptor file.
///
/// Only the fields the pipeline acts on are typed; everything else an
/// author writes is preserved verbatim in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Vendor id reference. Moved to [`Part::vendor_id`] during resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturing: Option<Manufacturing>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A part as collected: computed part number plus the descriptor fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPart {
    pub part_number: PartNumber,

    /// Readme attached from the sibling `<name>.part.md`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,

    #[serde(flatten)]
    pub descriptor: Descriptor,
}

/// A project directory as collected: one node of the raw forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawProject {
    pub id: ProjectId,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<RawProject>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<RawPart>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
}

/// The serializable build artifact: the raw forest, the flat vendor list
/// and the deduplicated license text table. Feeding a snapshot back
/// through the resolver reproduces the fully denormalized graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub projects: Vec<RawProject>,
    pub vendors: Vec<Vendor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub licenses: BTreeMap<String, String>,
}

impl Snapshot {
    /// Load a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write the snapshot as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn write(&self, path: &Path) -> Result<(), CatalogError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CatalogError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        fs::write(path, json).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Whether a project child id names a sub-project or a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Project,
    Part,
}

/// A resolved project node. Children are held as index keys, not owned
/// objects; the owning [`Catalog`] resolves them on demand.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: ProjectId,

    /// Child project ids, in collection order.
    pub projects: Vec<String>,

    /// Child part index keys, in collection order.
    pub parts: Vec<String>,

    /// Child id -> kind, for O(1) child lookup.
    #[serde(skip)]
    pub children: HashMap<String, ChildKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme_html: Option<String>,

    /// Deep structural copy of the pre-resolution state (whole subtree).
    pub raw: serde_json::Value,
}

/// A resolved part. The vendor reference has been validated and moved to
/// `vendor_id`; `manufacturing.material` holds the canonical index key of
/// the referenced part.
#[derive(Debug, Clone, Serialize)]
pub struct Part {
    pub part_number: PartNumber,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme_html: Option<String>,

    #[serde(flatten)]
    pub descriptor: Descriptor,

    /// Deep structural copy of the pre-resolution state.
    pub raw: serde_json::Value,
}

/// A resolved project child: either a sub-project or a part.
#[derive(Debug, Clone, Copy)]
pub enum CatalogRef<'a> {
    Project(&'a Project),
    Part(&'a Part),
}

/// The fully resolved, immutable catalog: flat id-indexed tables plus
/// ordered views preserving collection order.
#[derive(Debug)]
pub struct Catalog {
    pub(crate) projects: HashMap<String, Project>,
    pub(crate) parts: HashMap<String, Part>,
    pub(crate) vendors: HashMap<String, Vendor>,
    pub(crate) top_level: Vec<String>,
    pub(crate) project_order: Vec<String>,
    pub(crate) part_order: Vec<String>,
    pub(crate) vendor_order: Vec<String>,
    pub(crate) licenses: BTreeMap<String, String>,
}

impl Catalog {
    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.get(id)
    }

    /// Case-insensitive part lookup by part number.
    pub fn part(&self, number: &str) -> Option<&Part> {
        self.parts.get(&number.to_uppercase())
    }

    pub fn vendor(&self, id: &str) -> Option<&Vendor> {
        self.vendors.get(id)
    }

    /// All projects, in pass-1 registration order.
    pub fn project_list(&self) -> impl Iterator<Item = &Project> {
        self.project_order.iter().filter_map(|id| self.projects.get(id))
    }

    /// All parts, in pass-1 registration order.
    pub fn part_list(&self) -> impl Iterator<Item = &Part> {
        self.part_order.iter().filter_map(|key| self.parts.get(key))
    }

    /// All vendors, in declaration order.
    pub fn vendor_list(&self) -> impl Iterator<Item = &Vendor> {
        self.vendor_order.iter().filter_map(|id| self.vendors.get(id))
    }

    /// Root-level projects only.
    pub fn top_level_projects(&self) -> impl Iterator<Item = &Project> {
        self.top_level.iter().filter_map(|id| self.projects.get(id))
    }

    /// O(1) lookup of a project child (sub-project or part) by id.
    pub fn child_of<'a>(&'a self, project: &Project, id: &str) -> Option<CatalogRef<'a>> {
        match project.children.get(id)? {
            ChildKind::Project => self.projects.get(id).map(CatalogRef::Project),
            ChildKind::Part => self.parts.get(id).map(CatalogRef::Part),
        }
    }

    /// The vendor a part references, if any.
    pub fn vendor_for(&self, part: &Part) -> Option<&Vendor> {
        part.vendor_id.as_deref().and_then(|id| self.vendors.get(id))
    }

    /// The stock-material part a part references, if any.
    pub fn material_for(&self, part: &Part) -> Option<&Part> {
        part.descriptor
            .manufacturing
            .as_ref()
            .and_then(|m| m.material.as_deref())
            .and_then(|key| self.parts.get(key))
    }

    /// The deduplicated license text table.
    pub fn licenses(&self) -> &BTreeMap<String, String> {
        &self.licenses
    }

    /// Human-readable license text for a file, assembled from the cached
    /// table (the expression is never re-parsed here).
    pub fn license_text(&self, file: &File) -> Option<String> {
        file.license.as_ref()?;
        let mut text = String::from("LICENSES\n");
        for id in &file.license_ids {
            text.push_str("---\n");
            text.push_str(id);
            text.push('\n');
            match self.licenses.get(id) {
                Some(body) => text.push_str(body),
                None => {
                    text.push_str(&format!("Couldn't find license text for {}", id));
                }
            }
            if !text.ends_with('\n') {
                text.push('\n');
            }
        }
        Some(text)
    }

    /// Denormalized JSON view of a part: the resolved vendor object and
    /// the referenced material part are expanded inline (one level deep).
    pub fn part_json(&self, part: &Part) -> Result<serde_json::Value, CatalogError> {
        let mut value = serde_json::to_value(part)?;
        if let Some(vendor) = self.vendor_for(part) {
            value["vendor"] = serde_json::to_value(vendor)?;
        }
        if let Some(material) = self.material_for(part) {
            value["manufacturing"]["material"] = serde_json::to_value(material)?;
        }
        Ok(value)
    }

    /// Serializable view of the whole denormalized graph: the flat
    /// tables (parts with vendor and material expanded), the top-level
    /// project ids and the license table. Persisted next to the snapshot
    /// at every build.
    pub fn to_json(&self) -> Result<serde_json::Value, CatalogError> {
        let mut projects = serde_json::Map::new();
        for project in self.project_list() {
            projects.insert(project.id.to_string(), serde_json::to_value(project)?);
        }
        let mut parts = serde_json::Map::new();
        for part in self.part_list() {
            parts.insert(part.part_number.key(), self.part_json(part)?);
        }
        let mut vendors = serde_json::Map::new();
        for vendor in self.vendor_list() {
            vendors.insert(vendor.id.clone(), serde_json::to_value(vendor)?);
        }
        Ok(serde_json::json!({
            "projects": projects,
            "topLevelProjects": self.top_level,
            "parts": parts,
            "vendors": vendors,
            "licenses": self.licenses,
        }))
    }

    /// Check that another catalog carries the same flat indexes: same key
    /// sets in the same order, and the same resolved reference targets.
    /// Used by the build self-check after reloading the emitted snapshot.
    pub fn verify_equivalent(&self, other: &Catalog) -> Result<(), String> {
        if self.project_order != other.project_order {
            return Err("project index key mismatch".to_string());
        }
        if self.part_order != other.part_order {
            return Err("part index key mismatch".to_string());
        }
        if self.vendor_order != other.vendor_order {
            return Err("vendor index key mismatch".to_string());
        }
        if self.licenses.keys().ne(other.licenses.keys()) {
            return Err("license table key mismatch".to_string());
        }
        for key in &self.part_order {
            let (a, b) = (&self.parts[key], &other.parts[key]);
            if a.vendor_id != b.vendor_id {
                return Err(format!("vendor reference mismatch on `{}`", a.part_number));
            }
            let material = |p: &Part| {
                p.descriptor
                    .manufacturing
                    .as_ref()
                    .and_then(|m| m.material.clone())
            };
            if material(a) != material(b) {
                return Err(format!("material reference mismatch on `{}`", a.part_number));
            }
        }
        Ok(())
    }
}

/// Errors that abort a catalog build
#[derive(Debug, Error, Diagnostic)]
pub enum CatalogError {
    #[error("duplicate part number `{0}`")]
    #[diagnostic(help("part numbers must be unique across the whole catalog"))]
    DuplicatePartNumber(String),

    #[error("duplicate project id `{0}`")]
    DuplicateProjectId(String),

    #[error("invalid vendor `{0}`")]
    #[diagnostic(help("declare the vendor under the vendors directory or fix the reference"))]
    UnknownVendor(String),

    #[error("invalid part number `{0}`")]
    #[diagnostic(help("the referenced part does not exist in the catalog"))]
    UnknownPartNumber(String),

    #[error("invalid license expression `{expr}` in {}", .path.display())]
    License {
        expr: String,
        path: PathBuf,
        #[source]
        source: LicenseParseError,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Yaml(#[from] YamlSyntaxError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("self-check failed: the emitted snapshot does not reload cleanly: {0}")]
    SelfCheck(String),
}
