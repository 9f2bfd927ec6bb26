//! Two-pass cross-reference resolution
//!
//! Stage 2 of the build pipeline: flatten the raw forest into the
//! id-indexed [`Catalog`] and resolve every cross-reference.
//!
//! Pass 1 walks the forest depth-first in pre-order: it snapshots each
//! node's pre-resolution state, validates vendor references against the
//! vendor index, registers every project and part under the flat indexes
//! and renders readmes. Pass 2 then iterates the finished part index and
//! resolves part-to-part references. The split is load-bearing: a part may
//! reference a part registered anywhere in the forest, including parts
//! pass 1 has not visited yet, so the full index must exist before any
//! such reference can be checked. No placeholder scheme is used; the two
//! passes stay separate.

use std::collections::HashMap;

use crate::core::catalog::{
    Catalog, CatalogError, ChildKind, Part, Project, RawPart, RawProject, Snapshot, Vendor,
};
use crate::core::markdown;

/// Resolve a raw snapshot into the flat, fully linked catalog.
pub fn resolve(snapshot: Snapshot) -> Result<Catalog, CatalogError> {
    let Snapshot {
        projects,
        vendors,
        licenses,
    } = snapshot;

    let mut resolver = Resolver::default();

    for vendor in vendors {
        resolver.register_vendor(vendor);
    }

    let mut top_level = Vec::new();
    for project in projects {
        top_level.push(project.id.as_str().to_string());
        resolver.resolve_project(project)?;
    }

    resolver.fixup_part_references()?;

    Ok(Catalog {
        projects: resolver.projects,
        parts: resolver.parts,
        vendors: resolver.vendors,
        top_level,
        project_order: resolver.project_order,
        part_order: resolver.part_order,
        vendor_order: resolver.vendor_order,
        licenses,
    })
}

#[derive(Default)]
struct Resolver {
    projects: HashMap<String, Project>,
    parts: HashMap<String, Part>,
    vendors: HashMap<String, Vendor>,
    project_order: Vec<String>,
    part_order: Vec<String>,
    vendor_order: Vec<String>,
}

impl Resolver {
    fn register_vendor(&mut self, vendor: Vendor) {
        let id = vendor.id.clone();
        if self.vendors.insert(id.clone(), vendor).is_none() {
            self.vendor_order.push(id);
        }
    }

    /// Pass 1, projects: register the node, then descend.
    fn resolve_project(&mut self, raw: RawProject) -> Result<String, CatalogError> {
        // Deep structural copy of the whole raw subtree, taken before any
        // mutation so later resolution never leaks into it.
        let raw_value = serde_json::to_value(&raw)?;

        let RawProject {
            id,
            projects,
            parts,
            readme,
        } = raw;

        let key = id.as_str().to_string();
        if self.projects.contains_key(&key) {
            return Err(CatalogError::DuplicateProjectId(key));
        }

        let readme_html = readme.as_deref().map(markdown::to_html);
        self.projects.insert(
            key.clone(),
            Project {
                id,
                projects: Vec::new(),
                parts: Vec::new(),
                children: HashMap::new(),
                readme,
                readme_html,
                raw: raw_value,
            },
        );
        self.project_order.push(key.clone());

        let mut child_projects = Vec::new();
        let mut child_parts = Vec::new();
        let mut children = HashMap::new();

        for sub in projects {
            let sub_key = self.resolve_project(sub)?;
            children.insert(sub_key.clone(), ChildKind::Project);
            child_projects.push(sub_key);
        }
        for part in parts {
            let part_key = self.resolve_part(part)?;
            children.insert(part_key.clone(), ChildKind::Part);
            child_parts.push(part_key);
        }

        if let Some(node) = self.projects.get_mut(&key) {
            node.projects = child_projects;
            node.parts = child_parts;
            node.children = children;
        }

        Ok(key)
    }

    /// Pass 1, parts: snapshot, resolve the vendor reference, register.
    fn resolve_part(&mut self, raw: RawPart) -> Result<String, CatalogError> {
        let raw_value = serde_json::to_value(&raw)?;

        let RawPart {
            part_number,
            readme,
            mut descriptor,
        } = raw;

        let key = part_number.key();
        if self.parts.contains_key(&key) {
            return Err(CatalogError::DuplicatePartNumber(
                part_number.as_str().to_string(),
            ));
        }

        // The reference moves from the descriptor onto the part, so both
        // the id and (through the index) the vendor object stay reachable.
        let vendor_id = match descriptor.vendor.take() {
            Some(id) => {
                if !self.vendors.contains_key(&id) {
                    return Err(CatalogError::UnknownVendor(id));
                }
                Some(id)
            }
            None => None,
        };

        let readme_html = readme.as_deref().map(markdown::to_html);
        self.parts.insert(
            key.clone(),
            Part {
                part_number,
                vendor_id,
                readme,
                readme_html,
                descriptor,
                raw: raw_value,
            },
        );
        self.part_order.push(key.clone());

        Ok(key)
    }

    /// Pass 2: resolve part-to-part references across the whole index.
    ///
    /// One reference chain exists today: `manufacturing.material`. A
    /// missing intermediate field means there is nothing to resolve; a
    /// present terminal field must name a registered part and is
    /// canonicalized to its index key.
    fn fixup_part_references(&mut self) -> Result<(), CatalogError> {
        let keys: Vec<String> = self.part_order.clone();
        for key in keys {
            let reference = self
                .parts
                .get(&key)
                .and_then(|part| part.descriptor.manufacturing.as_ref())
                .and_then(|manufacturing| manufacturing.material.clone());

            let Some(material) = reference else {
                continue;
            };

            let canonical = material.to_uppercase();
            if !self.parts.contains_key(&canonical) {
                return Err(CatalogError::UnknownPartNumber(material));
            }
            if let Some(manufacturing) = self
                .parts
                .get_mut(&key)
                .and_then(|part| part.descriptor.manufacturing.as_mut())
            {
                manufacturing.material = Some(canonical);
            }
        }
        Ok(())
    }
}
