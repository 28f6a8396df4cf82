//! Errors at the service boundary.

use asnrd_compiler::{CompilationError, GenerationError};
use asnrd_decoder::DecodeError;
use asnrd_schema::ParseFailure;
use thiserror::Error;

use crate::config::{ConfigError, ValidationIssue};
use crate::output_area::DirectoryIoError;
use crate::preprocess::PreprocessError;
use crate::resolve::NameResolutionError;

/// Why `enable` failed. The service is inactive afterwards.
#[derive(Debug, Error)]
pub enum ActivationError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error("preprocessing output directory rejected: {0}")]
	PreprocessingDirectory(ValidationIssue),

	#[error(transparent)]
	Preprocess(#[from] PreprocessError),

	#[error(transparent)]
	Parse(#[from] ParseFailure),

	#[error("type generation failed: {0}")]
	Generation(#[from] GenerationError),

	#[error(transparent)]
	Compilation(#[from] CompilationError),

	#[error(transparent)]
	Directory(#[from] DirectoryIoError),
}

/// Why `disable` could not finish cleanly. The service is inactive regardless.
#[derive(Debug, Error)]
pub enum LifecycleError {
	#[error(transparent)]
	Directory(#[from] DirectoryIoError),
}

/// Why a read session could not be created. Never affects the active state.
#[derive(Debug, Error)]
pub enum ReadSessionError {
	#[error("reader service is not enabled")]
	Inactive,

	#[error(transparent)]
	Name(#[from] NameResolutionError),

	#[error(transparent)]
	Decode(#[from] DecodeError),
}
