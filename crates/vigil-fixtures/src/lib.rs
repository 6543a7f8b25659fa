//! Monitors and namespaces generated from `fixtures/` at build time.
//!
//! Building this crate type-checks the compiler's output against
//! `vigil_runtime`; its tests run the generated types.

include!(concat!(env!("OUT_DIR"), "/generated.rs"));

pub use generated::monitors::{instantiate, Perf};
pub use generated::namespaces::Cpu;
