//! JSON source trees.

use std::path::Path;

use walkdir::WalkDir;

use super::Frontend;
use crate::diagnostic::CompilerError;
use crate::ir::CompilationUnit;

/// File the compiler writes next to generated code; never a source tree.
pub const MANIFEST_FILE: &str = "vigil.manifest.json";

/// Loads `*.json` source trees.
#[derive(Debug, Default)]
pub struct JsonFrontend;

impl JsonFrontend {
    pub fn new() -> Self {
        Self
    }

    /// Parses one source tree.
    pub fn parse(&self, source: &str, path: &Path) -> Result<CompilationUnit, CompilerError> {
        serde_json::from_str(source).map_err(|e| CompilerError::InvalidTree {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

impl Frontend for JsonFrontend {
    fn format(&self) -> &str {
        "json"
    }

    fn extensions(&self) -> &[&str] {
        &["json"]
    }

    fn load_directory(&self, dir: &Path) -> Result<Vec<CompilationUnit>, CompilerError> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.file_name().is_some_and(|n| n == MANIFEST_FILE) {
                continue;
            }
            if let Some(ext) = path.extension() {
                if self.extensions().contains(&ext.to_string_lossy().as_ref()) {
                    paths.push(path.to_path_buf());
                }
            }
        }

        if paths.is_empty() {
            return Err(CompilerError::NoSourceTrees {
                dir: dir.to_path_buf(),
            });
        }

        let mut units = Vec::with_capacity(paths.len());
        for path in &paths {
            let source =
                std::fs::read_to_string(path).map_err(|e| CompilerError::io(path, e.to_string()))?;
            let unit = self.parse(&source, path)?;
            tracing::debug!(path = %path.display(), declarations = unit.declarations.len(), "source tree loaded");
            units.push(unit);
        }
        Ok(units)
    }
}
