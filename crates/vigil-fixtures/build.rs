use std::error::Error;
use std::path::PathBuf;

use vigil_compiler::{codegen, Compiler, CompilerConfig};

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=fixtures");

    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
    let generated_dir = out_dir.join("generated");

    let compiler = Compiler::new(CompilerConfig {
        input_dir: manifest_dir.join("fixtures"),
        out_dir: generated_dir.clone(),
        ..CompilerConfig::default()
    });
    let (types, report) = compiler.lower()?;
    if let Some(failure) = report.failures.first() {
        return Err(format!("fixture '{}' was rejected: {}", failure.declaration, failure.error).into());
    }

    let code = codegen::generate(&types, false)?;
    for (path, content, _) in &code.files {
        let path = generated_dir.join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
    }

    // `#[path]` only takes a literal, so the module declaration is generated too.
    let index = generated_dir.join("mod.rs").display().to_string();
    std::fs::write(
        out_dir.join("generated.rs"),
        format!("#[path = {index:?}]\npub mod generated;\n"),
    )?;
    Ok(())
}
