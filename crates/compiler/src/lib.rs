//! ASN.1 schema compilation.
//!
//! Compilation runs in two phases. [`TypeGenerator`] turns a parsed
//! [`ModuleRegistry`](asnrd_schema::ModuleRegistry) into one source artifact
//! per type; [`ArtifactBuilder`] then checks all sources under a directory as
//! a single batch and writes the loadable units next to them.

pub mod build;
pub mod classpath;
pub mod generate;
pub mod naming;

pub use build::{ArtifactBuilder, BuildReport, CompilationError, Diagnostics, UnitCompiler};
pub use classpath::Classpath;
pub use generate::{DescriptorGenerator, GeneratedSources, GenerationError, TypeGenerator};
pub use naming::{canonical_name, package_name, package_path, sanitize_type_name};
