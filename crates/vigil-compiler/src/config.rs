//! Compiler configuration.

use std::path::PathBuf;

/// Configuration for the Vigil compiler.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Directory containing source trees (`*.json`).
    pub input_dir: PathBuf,

    /// Directory to write generated Rust code.
    pub out_dir: PathBuf,

    /// Package used when a source tree does not declare one.
    pub package: Option<String>,

    /// Skip structural validation (for testing).
    pub skip_validation: bool,

    /// Write `vigil.manifest.json` next to the generated code.
    pub emit_manifest: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("monitors"),
            out_dir: PathBuf::from("src/generated"),
            package: None,
            skip_validation: false,
            emit_manifest: true,
        }
    }
}
