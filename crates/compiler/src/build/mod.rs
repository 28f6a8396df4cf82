//! Artifact building: source artifacts to loadable units.
//!
//! A build is one batch over every source artifact under a root. The batch is
//! checked as a whole and either every unit is written or none is.

mod check;
mod emit;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use asnrd_decoder::CompiledType;
use asnrd_decoder::unit::{SOURCE_EXTENSION, UnitError, source_path};
use indexmap::IndexSet;
use thiserror::Error;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::classpath::Classpath;

/// Ordered, de-duplicated build messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(IndexSet<String>);

impl Diagnostics {
	/// Adds a message; returns `false` if it was already present.
	pub fn push(&mut self, message: impl Into<String>) -> bool {
		self.0.insert(message.into())
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}
}

impl fmt::Display for Diagnostics {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, message) in self.0.iter().enumerate() {
			if i > 0 {
				writeln!(f)?;
			}
			f.write_str(message)?;
		}
		Ok(())
	}
}

#[derive(Debug, Error)]
pub enum CompilationError {
	#[error("compilation failed:\n{0}")]
	Diagnostics(Diagnostics),

	#[error("I/O error on {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("cannot walk source tree: {0}")]
	Walk(#[from] walkdir::Error),

	#[error("cannot encode unit: {0}")]
	Unit(#[from] UnitError),
}

/// Outcome of a successful build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
	pub sources: usize,
	pub units: Vec<PathBuf>,
}

/// Compiles the source artifacts under a directory into units.
pub trait ArtifactBuilder: Send + Sync + fmt::Debug {
	/// `root` is both source root and output root.
	fn build(&self, root: &Path, classpath: &Classpath) -> Result<BuildReport, CompilationError>;
}

/// Builder that checks every source as one batch and writes postcard units.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnitCompiler;

/// Parsed sources of one batch, keyed by canonical name.
pub(crate) type Batch = HashMap<String, Arc<CompiledType>>;

impl UnitCompiler {
	fn collect_sources(root: &Path) -> Result<Vec<PathBuf>, CompilationError> {
		let mut sources = Vec::new();
		for entry in WalkDir::new(root).sort_by_file_name() {
			let entry = entry?;
			if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == SOURCE_EXTENSION) {
				sources.push(entry.into_path());
			}
		}
		Ok(sources)
	}

	fn read_sources(root: &Path, sources: &[PathBuf], diagnostics: &mut Diagnostics) -> Result<Vec<Arc<CompiledType>>, CompilationError> {
		let mut types = Vec::with_capacity(sources.len());
		for path in sources {
			let text = std::fs::read_to_string(path).map_err(|source| CompilationError::Io {
				path: path.clone(),
				source,
			})?;
			let ty: CompiledType = match serde_json::from_str(&text) {
				Ok(ty) => ty,
				Err(e) => {
					diagnostics.push(format!("{}: invalid source artifact: {e}", path.display()));
					continue;
				}
			};
			if source_path(root, &ty.canonical_name) != *path {
				diagnostics.push(format!(
					"{}: declares {} which belongs in {}",
					path.display(),
					ty.canonical_name,
					source_path(root, &ty.canonical_name).display()
				));
				continue;
			}
			debug!(source = %path.display(), "Read type source");
			types.push(Arc::new(ty));
		}
		Ok(types)
	}
}

impl ArtifactBuilder for UnitCompiler {
	fn build(&self, root: &Path, classpath: &Classpath) -> Result<BuildReport, CompilationError> {
		let sources = Self::collect_sources(root)?;
		let mut diagnostics = Diagnostics::default();

		let types = Self::read_sources(root, &sources, &mut diagnostics)?;
		let batch: Batch = types.iter().map(|ty| (ty.canonical_name.clone(), ty.clone())).collect();
		for ty in &types {
			check::check_type(ty, &batch, classpath, &mut diagnostics);
		}

		if !diagnostics.is_empty() {
			for message in diagnostics.iter() {
				error!("{message}");
			}
			return Err(CompilationError::Diagnostics(diagnostics));
		}

		let units = emit::write_units(root, &types)?;
		info!(
			root = %root.display(),
			sources = sources.len(),
			units = units.len(),
			"Compiled ASN.1 type sources"
		);
		Ok(BuildReport {
			sources: sources.len(),
			units,
		})
	}
}
