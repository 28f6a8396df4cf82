//! ASN.1 reader service.
//!
//! A [`ReaderService`] is enabled with a [`ReaderConfig`]: the configured
//! schema files are parsed, turned into type sources and built into units
//! inside a fresh output area, and an isolated loader over that area is
//! published. Record readers are then created per request, concurrently, until
//! the service is disabled and the output area deleted.

pub mod config;
pub mod error;
mod lifecycle;
pub mod output_area;
mod pipeline;
pub mod preprocess;
pub mod resolve;
mod vars;

pub use config::{ConfigError, PreprocessingStrategy, ReaderConfig, ValidationIssue};
pub use error::{ActivationError, LifecycleError, ReadSessionError};
pub use lifecycle::{ActiveSession, LifecycleState, ReaderService};
pub use output_area::{DirectoryIoError, OutputArea};
pub use pipeline::Pipeline;
pub use preprocess::{PreprocessError, Preprocessor, PreprocessorEngine};
pub use resolve::{NameResolutionError, RootName, resolve};
pub use vars::Variables;
