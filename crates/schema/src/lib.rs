//! ASN.1 schema parsing.
//!
//! Schema files are tokenized and parsed into [`Module`] values, which are
//! collected into a [`ModuleRegistry`] keyed by module name. Parsing never
//! stops at the first bad file: every file is attempted and all error records
//! are returned together as a [`ParseFailure`].

mod adapter;
mod error;
mod lexer;
pub mod model;
mod parser;
mod registry;

pub use adapter::{parse_schema_file, parse_schema_files, parse_schema_str, split_file_list};
pub use error::{ParseError, ParseFailure};
pub use model::{AsnType, Component, Module, TagDefault, TypeAssignment, TypeKind};
pub use registry::ModuleRegistry;
