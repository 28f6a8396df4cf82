//! Parse error records.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// One problem found while reading a schema file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ParseError {
	#[error("schema file not found: {}", path.display())]
	FileNotFound { path: PathBuf },

	#[error("cannot read {}: {message}", path.display())]
	Io { path: PathBuf, message: String },

	#[error("{}:{line}:{column}: lexical error: {message}", path.display())]
	Lexical {
		path: PathBuf,
		line: usize,
		column: usize,
		message: String,
	},

	#[error("{}:{line}:{column}: syntax error: {message}", path.display())]
	Syntax {
		path: PathBuf,
		line: usize,
		column: usize,
		message: String,
	},
}

impl ParseError {
	/// The schema file the error belongs to.
	pub fn path(&self) -> &Path {
		match self {
			ParseError::FileNotFound { path }
			| ParseError::Io { path, .. }
			| ParseError::Lexical { path, .. }
			| ParseError::Syntax { path, .. } => path,
		}
	}
}

/// Every parse error from one parsing pass, in the order encountered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
	errors: Vec<ParseError>,
}

impl ParseFailure {
	/// Returns `None` when there is nothing to report.
	pub fn new(errors: Vec<ParseError>) -> Option<Self> {
		if errors.is_empty() { None } else { Some(Self { errors }) }
	}

	/// The first encountered error.
	pub fn first(&self) -> &ParseError {
		&self.errors[0]
	}

	pub fn errors(&self) -> &[ParseError] {
		&self.errors
	}

	pub fn into_errors(self) -> Vec<ParseError> {
		self.errors
	}
}

impl fmt::Display for ParseFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ASN.1 parsing failed ({} error", self.errors.len())?;
		if self.errors.len() != 1 {
			f.write_str("s")?;
		}
		write!(f, "), first: {}", self.first())
	}
}

impl std::error::Error for ParseFailure {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		Some(self.first())
	}
}
