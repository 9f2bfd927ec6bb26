//! Part detail page rendering

use rust_embed::Embed;
use tera::{Context, Tera};
use thiserror::Error;

use crate::core::catalog::{Catalog, CatalogError, Part};

#[derive(Embed)]
#[folder = "templates/"]
struct Templates;

/// Pre-compiled page templates, built once at server startup.
pub struct Pages {
    tera: Tera,
}

impl Pages {
    pub fn new() -> Result<Self, PageError> {
        let mut tera = Tera::default();
        let template = Templates::get("part.html")
            .and_then(|file| String::from_utf8(file.data.into_owned()).ok())
            .ok_or(PageError::MissingTemplate("part.html"))?;
        tera.add_raw_template("part.html", &template)?;
        Ok(Self { tera })
    }

    /// Render the detail view for one part: title, denormalized JSON, raw
    /// snapshot JSON, file listing and rendered readme.
    pub fn render_part(&self, catalog: &Catalog, part: &Part) -> Result<String, PageError> {
        let key = part.part_number.key();

        let mut context = Context::new();
        context.insert("part_number", &key);
        context.insert("name", &part.descriptor.name);
        context.insert("title", part.descriptor.name.as_deref().unwrap_or(&key));
        context.insert(
            "json",
            &serde_json::to_string_pretty(&catalog.part_json(part)?)
                .map_err(CatalogError::from)?,
        );
        context.insert(
            "raw_json",
            &serde_json::to_string_pretty(&part.raw).map_err(CatalogError::from)?,
        );
        let files: Vec<&str> = part
            .descriptor
            .files
            .iter()
            .filter_map(|file| file.filename.as_deref())
            .collect();
        context.insert("files", &files);
        context.insert("readme_html", &part.readme_html);

        Ok(self.tera.render("part.html", &context)?)
    }
}

/// Errors while rendering a part page
#[derive(Debug, Error)]
pub enum PageError {
    #[error("embedded template {0} is missing")]
    MissingTemplate(&'static str),

    #[error(transparent)]
    Template(#[from] tera::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{RawPart, RawProject, Snapshot};
    use crate::core::identity::{PartNumber, ProjectId};
    use crate::core::resolver;

    fn catalog() -> Catalog {
        let part = RawPart {
            part_number: PartNumber::parse("ACME.gizmo.motor").unwrap(),
            readme: Some("# Motor\n".to_string()),
            descriptor: serde_yml::from_str(
                "name: Motor\nfiles:\n  - filename: motor.step\n    ipfs: QmMotor\n",
            )
            .unwrap(),
        };
        let snapshot = Snapshot {
            projects: vec![RawProject {
                id: ProjectId::root("gizmo"),
                projects: vec![],
                parts: vec![part],
                readme: None,
            }],
            vendors: vec![],
            licenses: Default::default(),
        };
        resolver::resolve(snapshot).unwrap()
    }

    #[test]
    fn test_renders_part_page() {
        let catalog = catalog();
        let part = catalog.part("ACME.GIZMO.MOTOR").unwrap();
        let pages = Pages::new().unwrap();
        let html = pages.render_part(&catalog, part).unwrap();

        assert!(html.contains("<title>Motor</title>"));
        assert!(html.contains("ACME.GIZMO.MOTOR"));
        assert!(html.contains("motor.step"));
        // raw snapshot section keeps the pre-resolution state
        assert!(html.contains("Raw JSON"));
    }
}
