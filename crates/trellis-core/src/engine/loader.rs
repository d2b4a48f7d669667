//! Template location and compiled-output caching
//!
//! Both collaborators have deliberately narrow contracts: the locator is
//! total (it answers found or not-found, never failing for a missing
//! template), and the cache only promises a freshness comparison plus a
//! write-back hook.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::Result;

/// Resolves template identifiers to source files.
///
/// Identifiers use dots as separators (`admin.users.index`); each root
/// path is probed in order with each extension in order, first hit wins.
#[derive(Debug, Clone)]
pub struct TemplateLocator {
    paths: Vec<PathBuf>,
    extensions: Vec<String>,
}

impl TemplateLocator {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            extensions: vec!["trellis".to_string(), "html".to_string()],
        }
    }

    /// Replace the probe extensions (tried in order, without the dot).
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn add_path(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn prepend_path(&mut self, path: impl Into<PathBuf>) {
        self.paths.insert(0, path.into());
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Resolve a template identifier, or report absence.
    pub fn find(&self, view: &str) -> Option<PathBuf> {
        let relative = view.replace('.', "/");

        for root in &self.paths {
            for extension in &self.extensions {
                let candidate = root.join(format!("{relative}.{extension}"));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }

        None
    }
}

/// Compiled-artifact cache keyed by source path and guarded by mtime.
#[derive(Debug, Clone)]
pub struct CompiledCache {
    dir: PathBuf,
}

impl CompiledCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic flat artifact name derived from the source path.
    fn artifact_path(&self, source: &Path) -> PathBuf {
        let mut name = String::new();
        for ch in source.to_string_lossy().chars() {
            name.push(if ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' {
                ch
            } else {
                '_'
            });
        }
        self.dir.join(format!("{name}.compiled"))
    }

    /// Return the cached artifact when it is at least as new as its source.
    pub fn fresh(&self, source: &Path) -> Result<Option<String>> {
        let artifact = self.artifact_path(source);
        let Ok(artifact_meta) = fs::metadata(&artifact) else {
            return Ok(None);
        };
        let source_meta = fs::metadata(source)?;

        match (source_meta.modified(), artifact_meta.modified()) {
            (Ok(source_time), Ok(artifact_time)) if artifact_time >= source_time => {
                Ok(Some(fs::read_to_string(&artifact)?))
            }
            _ => Ok(None),
        }
    }

    /// Write a compiled artifact back, atomically (temp file then rename).
    pub fn store(&self, source: &Path, compiled: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(compiled.as_bytes())?;
        let artifact = self.artifact_path(source);
        file.persist(&artifact).map_err(|e| e.error)?;

        debug!(artifact = %artifact.display(), "stored compiled artifact");
        Ok(())
    }
}
