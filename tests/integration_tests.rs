//! Integration tests for the partcat CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to get a partcat command
fn partcat() -> Command {
    Command::cargo_bin("partcat").unwrap()
}

/// Helper to create an initialized workspace in a temp directory
fn setup_workspace() -> TempDir {
    let tmp = TempDir::new().unwrap();
    partcat()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success();
    tmp
}

/// Helper to write a file under the workspace, creating parent dirs
fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// A small catalog: two top-level projects, a vendor, a forward
/// part-to-part reference and a licensed file.
fn setup_sample_catalog() -> TempDir {
    let tmp = setup_workspace();
    let root = tmp.path();
    write(root, "partcat.yaml", "prefix: LUTRIS\n");
    write(root, "projects/a/README.md", "# Project A\n");
    write(
        root,
        "projects/a/b.part.yml",
        concat!(
            "name: Widget\n",
            "vendor: initech\n",
            "manufacturing:\n",
            "  material: lutris.stock.rod\n",
            "files:\n",
            "  - filename: widget body.stl\n",
            "    ipfs: QmWidget\n",
            "    license: MIT OR Apache-2.0\n",
        ),
    );
    write(root, "projects/a/b.part.md", "# Widget\n\nA *widget*.\n");
    write(root, "projects/stock/rod.part.yml", "name: Steel rod\n");
    write(root, "vendors/initech.yml", "name: Initech\nurl: https://initech.example\n");
    tmp
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    partcat()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Parts Catalog Toolkit"));
}

#[test]
fn test_completions_generate() {
    partcat()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("partcat"));
}

// ============================================================================
// Init Tests
// ============================================================================

#[test]
fn test_init_creates_workspace() {
    let tmp = TempDir::new().unwrap();
    partcat()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized catalog workspace"));

    assert!(tmp.path().join("partcat.yaml").is_file());
    assert!(tmp.path().join("projects").is_dir());
    assert!(tmp.path().join("vendors").is_dir());
}

#[test]
fn test_init_twice_requires_force() {
    let tmp = setup_workspace();
    partcat()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    partcat()
        .current_dir(tmp.path())
        .args(["init", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized catalog workspace"));
}

// ============================================================================
// Build Tests
// ============================================================================

#[test]
fn test_build_writes_snapshot() {
    let tmp = setup_sample_catalog();
    partcat()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 part(s)"));

    let dist: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("dist/parts.json")).unwrap())
            .unwrap();

    // top-level document shape
    let projects = dist["projects"].as_array().unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0]["id"], "a");
    assert_eq!(projects[0]["parts"][0]["part_number"], "LUTRIS.a.b");
    assert_eq!(dist["vendors"][0]["id"], "initech");

    // derived file URL with percent-encoded filename query
    assert_eq!(
        projects[0]["parts"][0]["files"][0]["url"],
        "https://cf-ipfs.com/ipfs/QmWidget?filename=widget%20body.stl"
    );

    // license expansion and build-wide dedup table
    assert_eq!(
        projects[0]["parts"][0]["files"][0]["license_ids"],
        serde_json::json!(["MIT", "Apache-2.0"])
    );
    assert!(dist["licenses"]["MIT"]
        .as_str()
        .unwrap()
        .contains("Permission is hereby granted"));

    // the public mirror is written too
    assert!(tmp.path().join("public/parts.json").is_file());

    // the denormalized view persists resolved references and rendered HTML
    let denormalized: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(tmp.path().join("dist/denormalized.json")).unwrap(),
    )
    .unwrap();
    let widget = &denormalized["parts"]["LUTRIS.A.B"];
    assert_eq!(widget["vendor"]["id"], "initech");
    assert_eq!(
        widget["manufacturing"]["material"]["part_number"],
        "LUTRIS.stock.rod"
    );
    assert!(widget["readme_html"].as_str().unwrap().contains("<em>widget</em>"));
}

#[test]
fn test_build_check_does_not_write() {
    let tmp = setup_sample_catalog();
    partcat()
        .current_dir(tmp.path())
        .args(["build", "--check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Catalog is valid"));

    assert!(!tmp.path().join("dist/parts.json").exists());
}

#[test]
fn test_build_from_subdirectory_discovers_workspace() {
    let tmp = setup_sample_catalog();
    partcat()
        .current_dir(tmp.path().join("projects/a"))
        .arg("build")
        .assert()
        .success();
    assert!(tmp.path().join("dist/parts.json").is_file());
}

#[test]
fn test_build_outside_workspace_fails() {
    let tmp = TempDir::new().unwrap();
    partcat()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a partcat workspace"));
}

// ============================================================================
// Build Failure Tests
// ============================================================================

#[test]
fn test_duplicate_part_number_fails_build() {
    let tmp = setup_workspace();
    let root = tmp.path();
    // same part number up to case: collides in the index
    write(root, "projects/a/motor.part.yml", "name: One\n");
    write(root, "projects/a/MOTOR.part.yaml", "name: Other\n");

    partcat()
        .current_dir(root)
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("duplicate part number"));
}

#[test]
fn test_unknown_vendor_fails_build_naming_id() {
    let tmp = setup_sample_catalog();
    fs::remove_file(tmp.path().join("vendors/initech.yml")).unwrap();

    partcat()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid vendor `initech`"));
}

#[test]
fn test_unknown_material_fails_build_naming_id() {
    let tmp = setup_sample_catalog();
    fs::remove_file(tmp.path().join("projects/stock/rod.part.yml")).unwrap();

    partcat()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "invalid part number `lutris.stock.rod`",
        ));
}

#[test]
fn test_malformed_descriptor_fails_build() {
    let tmp = setup_workspace();
    write(tmp.path(), "projects/a/bad.part.yml", "name: [unclosed\n");

    partcat()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed descriptor"));
}

#[test]
fn test_orphaned_part_readme_warns_but_builds() {
    let tmp = setup_workspace();
    let root = tmp.path();
    write(root, "projects/a/motor.part.yml", "name: Motor\n");
    write(root, "projects/a/stray.part.md", "# No matching part\n");

    partcat().current_dir(root).arg("build").assert().success();

    let dist: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(root.join("dist/parts.json")).unwrap()).unwrap();
    let parts = dist["projects"][0]["parts"].as_array().unwrap();
    assert_eq!(parts.len(), 1);
    assert!(parts[0].get("readme").is_none());
}

// ============================================================================
// Pin Tests
// ============================================================================

#[test]
fn test_pin_without_token_fails() {
    let tmp = setup_sample_catalog();
    partcat()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .success();

    partcat()
        .current_dir(tmp.path())
        .arg("pin")
        .env_remove("PINATA_TOKEN")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing pinning token"));
}

#[test]
fn test_pin_with_nothing_to_pin_succeeds() {
    let tmp = setup_workspace();
    write(tmp.path(), "projects/a/motor.part.yml", "name: Motor\n");
    partcat()
        .current_dir(tmp.path())
        .arg("build")
        .assert()
        .success();

    partcat()
        .current_dir(tmp.path())
        .arg("pin")
        .env("PINATA_TOKEN", "test-token")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to pin"));
}
