//! Module index generation for the generated tree.
//!
//! ```text
//! <out>/mod.rs             pub mod monitors; pub mod namespaces;
//! <out>/monitors/mod.rs    one module per monitor, `instantiate`
//! <out>/namespaces/mod.rs  one module per root namespace
//! ```

use super::rust_types::to_snake_case;

/// Generates the root `mod.rs`.
pub fn generate_root_index() -> String {
    "//! Generated by vigil. Do not edit.\n\npub mod monitors;\npub mod namespaces;\n".to_string()
}

/// Generates `monitors/mod.rs` for monitor type names in emission order.
pub fn generate_monitor_index(monitors: &[String]) -> String {
    let mut output = String::new();
    output.push_str("//! Generated by vigil. Do not edit.\n\n");
    output.push_str("use std::sync::Arc;\n\n");
    output.push_str("use vigil_runtime::prelude::*;\n\n");

    for name in monitors {
        output.push_str(&format!("pub mod {};\n", to_snake_case(name)));
    }
    if !monitors.is_empty() {
        output.push('\n');
    }
    for name in monitors {
        output.push_str(&format!("pub use {}::{name};\n", to_snake_case(name)));
    }
    if !monitors.is_empty() {
        output.push('\n');
    }

    output.push_str("/// Instantiates every monitor against `context`.\n");
    output.push_str("pub fn instantiate(context: &RuntimeContext) -> Vec<Arc<dyn Monitor>> {\n");
    output.push_str("    vec![\n");
    for name in monitors {
        output.push_str(&format!("        {name}::new(context) as Arc<dyn Monitor>,\n"));
    }
    output.push_str("    ]\n");
    output.push_str("}\n");
    output
}

/// Generates `namespaces/mod.rs` for root namespace type names.
pub fn generate_namespace_index(namespaces: &[String]) -> String {
    let mut output = String::new();
    output.push_str("//! Generated by vigil. Do not edit.\n\n");
    for name in namespaces {
        output.push_str(&format!("pub mod {};\n", to_snake_case(name)));
    }
    if !namespaces.is_empty() {
        output.push('\n');
    }
    for name in namespaces {
        output.push_str(&format!("pub use {}::{name};\n", to_snake_case(name)));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_index_reexports_and_instantiates() {
        let index = generate_monitor_index(&["Perf".to_string(), "HighLoad".to_string()]);
        assert!(index.contains("pub mod perf;\npub mod high_load;\n"));
        assert!(index.contains("pub use high_load::HighLoad;\n"));
        assert!(index.contains("        HighLoad::new(context) as Arc<dyn Monitor>,\n"));
    }

    #[test]
    fn empty_indexes_still_compile() {
        let index = generate_monitor_index(&[]);
        assert!(index.contains("    vec![\n    ]\n"));
        assert_eq!(
            generate_namespace_index(&[]),
            "//! Generated by vigil. Do not edit.\n\n"
        );
    }
}
