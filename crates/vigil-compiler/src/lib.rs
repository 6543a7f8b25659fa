//! # Vigil Compiler
//!
//! This crate lowers monitor and namespace declarations of the Vigil
//! monitoring language into generated types wired to `vigil_runtime`.
//! Parsing and type checking happen upstream; the compiler consumes the
//! resolved source trees as JSON.
//!
//! ## Architecture
//!
//! ```text
//! Source trees (*.json)
//!        │
//!        ▼
//! ┌──────────────┐
//! │   Frontend   │  Load trees into compilation units
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │   Validate   │  Structure checks per declaration
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │    Lower     │  Declarations → generated types
//! │  (IR → TR)   │  (specifiers, events, handlers, namespaces)
//! └──────┬───────┘
//!        │
//!        ├──────────────────────┐
//!        ▼                      ▼
//! ┌──────────────┐      ┌──────────────┐
//! │   Codegen    │      │     Link     │
//! │ (TR → Rust)  │      │ (TR → live)  │
//! └──────────────┘      └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vigil_compiler::{Compiler, CompilerConfig};
//!
//! let config = CompilerConfig {
//!     input_dir: "monitors".into(),
//!     out_dir: "src/generated".into(),
//!     ..CompilerConfig::default()
//! };
//!
//! let compiler = Compiler::new(config);
//! let result = compiler.compile().await?;
//! ```

pub mod codegen;
pub mod config;
pub mod diagnostic;
pub mod frontend;
pub mod ir;
pub mod link;
pub mod lower;
pub mod manifest;
pub mod target;
pub mod validate;

pub use config::CompilerConfig;
pub use diagnostic::CompilerError;
pub use link::{Bindings, Linker};

use frontend::{Frontend, JsonFrontend};
use ir::CompilationUnit;
use lower::{LoweringFailure, LoweringReport};
use manifest::RoutingManifest;
use target::{CollectingAcceptor, GeneratedType};

/// The main compiler struct that orchestrates the compilation pipeline.
pub struct Compiler {
    config: CompilerConfig,
}

/// Result of a compilation.
#[derive(Debug)]
pub struct CompileResult {
    /// Number of monitors generated.
    pub monitors: usize,
    /// Number of root namespaces generated.
    pub namespaces: usize,
    /// Relative paths of the files written.
    pub files: Vec<String>,
    /// Declarations that were rejected. The rest are still generated.
    pub failures: Vec<LoweringFailure>,
}

/// Result of a check.
#[derive(Debug)]
pub struct CheckResult {
    pub report: LoweringReport,
    /// Routing manifest of the accepted declarations.
    pub manifest: RoutingManifest,
}

impl Compiler {
    /// Creates a new compiler with the given configuration.
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compiles the source trees to Rust code.
    ///
    /// This runs the full pipeline:
    /// 1. Load source trees
    /// 2. Validate and lower each declaration
    /// 3. Generate Rust modules, indexes and the routing manifest
    /// 4. Write output files
    pub async fn compile(&self) -> Result<CompileResult, CompilerError> {
        let (types, report) = self.lower()?;

        let generated = codegen::generate(&types, self.config.emit_manifest)?;
        self.write_output(&generated)?;

        let result = CompileResult {
            monitors: count(&types, |t| t == &target::TypeKind::Monitor),
            namespaces: count(&types, |t| matches!(t, target::TypeKind::NamespaceProxy { .. })),
            files: generated.files.iter().map(|(path, _, _)| path.clone()).collect(),
            failures: report.failures,
        };
        tracing::info!(
            monitors = result.monitors,
            namespaces = result.namespaces,
            rejected = result.failures.len(),
            out_dir = %self.config.out_dir.display(),
            "compiled"
        );
        Ok(result)
    }

    /// Validates and lowers the source trees without writing anything.
    pub async fn check(&self) -> Result<CheckResult, CompilerError> {
        let (types, report) = self.lower()?;
        Ok(CheckResult {
            report,
            manifest: RoutingManifest::from_types(&types),
        })
    }

    /// Loads and lowers the source trees. Returns the accepted top-level
    /// types in declaration order with the lowering report.
    pub fn lower(&self) -> Result<(Vec<GeneratedType>, LoweringReport), CompilerError> {
        let units = self.load()?;
        let mut acceptor = CollectingAcceptor::new();
        let report = lower::lower_units(&units, !self.config.skip_validation, &mut acceptor);
        Ok((acceptor.into_types(), report))
    }

    fn load(&self) -> Result<Vec<CompilationUnit>, CompilerError> {
        let mut units = JsonFrontend::new().load_directory(&self.config.input_dir)?;
        if let Some(package) = &self.config.package {
            for unit in units.iter_mut().filter(|u| u.package.is_none()) {
                unit.package = Some(package.clone());
            }
        }
        Ok(units)
    }

    fn write_output(&self, generated: &codegen::GeneratedCode) -> Result<(), CompilerError> {
        std::fs::create_dir_all(&self.config.out_dir)
            .map_err(|e| CompilerError::io(&self.config.out_dir, e.to_string()))?;

        for (filename, content, _) in &generated.files {
            let path = self.config.out_dir.join(filename);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CompilerError::io(parent, e.to_string()))?;
            }
            std::fs::write(&path, content).map_err(|e| CompilerError::io(&path, e.to_string()))?;
        }

        Ok(())
    }
}

fn count(types: &[GeneratedType], kind: impl Fn(&target::TypeKind) -> bool) -> usize {
    types.iter().filter(|t| kind(&t.kind)).count()
}
