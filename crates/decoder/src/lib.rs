//! Runtime support for compiled ASN.1 types.
//!
//! Everything a generated decoder needs at read time lives here: the type
//! descriptor model shared with the compiler, the unit blob format, the BER
//! reader, loaders that resolve canonical type names, and the record reader
//! that turns an input stream into decoded records.

pub mod ber;
pub mod decode;
pub mod descriptor;
pub mod error;
pub mod loader;
pub mod reader;
pub mod unit;
pub mod universal;
pub mod value;

pub use decode::Decoder;
pub use descriptor::{CompiledType, Field, NamedNumber, Presence, StringKind, Tag, TagClass, TagLayer, TagMode, TypeBody, TypeDescriptor};
pub use error::{DecodeError, Result};
pub use loader::{BaseLoader, LoadError, LoaderConstructionError, TypeLoader, UnitLoader, isolated_loader};
pub use reader::{DEFAULT_STRATEGY, DefaultStrategy, IterationStrategy, RecordReader, StrategyRegistry};
pub use value::Value;
