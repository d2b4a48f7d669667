//! Test utilities for trellis
//!
//! This crate provides shared testing utilities used across the trellis
//! workspace: workspace-local temporary directories and template-tree
//! fixtures.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

/// Creates a temporary directory within `.tmp/` at the crate root
///
/// This keeps all test temporary files in a single gitignored location
/// that is easy to clean up manually if needed.
///
/// # Panics
///
/// Panics if the current directory cannot be determined or the directory
/// cannot be created. Use [`try_temp_dir_in_workspace`] for error
/// handling instead of panics.
pub fn temp_dir_in_workspace() -> TempDir {
    let workspace_root = std::env::current_dir().expect("Failed to get current directory");

    let tmp_base = workspace_root.join(".tmp");
    fs::create_dir_all(&tmp_base).expect("Failed to create .tmp directory");

    TempDir::new_in(&tmp_base).expect("Failed to create temporary directory in .tmp/")
}

/// Alternative with Result for non-test code
pub fn try_temp_dir_in_workspace() -> std::io::Result<TempDir> {
    let workspace_root = std::env::current_dir()?;
    let tmp_base = workspace_root.join(".tmp");
    fs::create_dir_all(&tmp_base)?;
    TempDir::new_in(&tmp_base)
}

/// Write a template tree under `root`.
///
/// Each entry pairs a dotted template identifier with its source text;
/// `admin.users.index` lands at `root/admin/users/index.trellis`, with
/// intermediate directories created as needed.
///
/// # Panics
///
/// Panics on any filesystem error - fixtures are test-only.
pub fn write_templates(root: &Path, templates: &[(&str, &str)]) {
    for (view, source) in templates {
        let relative = view.replace('.', "/");
        let path = root.join(format!("{relative}.trellis"));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create template directory");
        }
        fs::write(&path, source).expect("Failed to write template fixture");
    }
}
