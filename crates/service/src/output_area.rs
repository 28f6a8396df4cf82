//! The per-activation directory holding generated sources and units.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Entries that could not be deleted, with the reason.
#[derive(Debug, Default)]
pub struct DeleteFailures(pub Vec<(PathBuf, io::Error)>);

impl fmt::Display for DeleteFailures {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (path, error) in &self.0 {
			write!(f, "\n  {}: {error}", path.display())?;
		}
		Ok(())
	}
}

#[derive(Debug, Error)]
pub enum DirectoryIoError {
	#[error("cannot create output area under {}: {source}", parent.display())]
	Create {
		parent: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("cannot delete {} entries of output area {}:{failures}", failures.0.len(), root.display())]
	Delete { root: PathBuf, failures: DeleteFailures },
}

/// A uniquely named directory, created fresh for every activation.
///
/// The directory outlives this value unless [`OutputArea::delete`] is
/// called; only the lifecycle controller does so.
#[derive(Debug, PartialEq, Eq)]
pub struct OutputArea {
	path: PathBuf,
}

impl OutputArea {
	/// Creates `<parent>/<identifier>_asn_<random>`.
	pub fn create(identifier: &str, parent: Option<&Path>) -> Result<Self, DirectoryIoError> {
		let parent = parent.map_or_else(std::env::temp_dir, Path::to_path_buf);
		let dir = tempfile::Builder::new()
			.prefix(&format!("{identifier}_asn_"))
			.tempdir_in(&parent)
			.map_err(|source| DirectoryIoError::Create { parent, source })?;
		let path = dir.keep();
		debug!(area = %path.display(), "Created output area");
		Ok(Self { path })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Deletes the area, deepest entries first.
	///
	/// Every entry is attempted; all failures are returned together.
	pub fn delete(self) -> Result<(), DirectoryIoError> {
		let mut failures = DeleteFailures::default();

		for entry in WalkDir::new(&self.path).contents_first(true) {
			let entry = match entry {
				Ok(entry) => entry,
				Err(e) => {
					let path = e.path().map_or_else(|| self.path.clone(), Path::to_path_buf);
					failures.0.push((path, io::Error::from(e)));
					continue;
				}
			};
			let removed = if entry.file_type().is_dir() {
				std::fs::remove_dir(entry.path())
			} else {
				std::fs::remove_file(entry.path())
			};
			if let Err(e) = removed {
				warn!(path = %entry.path().display(), error = %e, "Cannot delete output area entry");
				failures.0.push((entry.into_path(), e));
			}
		}

		if failures.0.is_empty() {
			debug!(area = %self.path.display(), "Deleted output area");
			Ok(())
		} else {
			Err(DirectoryIoError::Delete {
				root: self.path,
				failures,
			})
		}
	}
}
