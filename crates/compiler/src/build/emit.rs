use std::path::{Path, PathBuf};
use std::sync::Arc;

use asnrd_decoder::CompiledType;
use asnrd_decoder::unit::{encode_unit, unit_path};
use tracing::debug;

use super::CompilationError;

/// Writes one unit per type next to its source artifact.
pub(super) fn write_units(root: &Path, types: &[Arc<CompiledType>]) -> Result<Vec<PathBuf>, CompilationError> {
	let mut units = Vec::with_capacity(types.len());
	for ty in types {
		let blob = encode_unit(ty)?;
		let path = unit_path(root, &ty.canonical_name);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).map_err(|source| CompilationError::Io {
				path: parent.to_path_buf(),
				source,
			})?;
		}
		std::fs::write(&path, &blob).map_err(|source| CompilationError::Io {
			path: path.clone(),
			source,
		})?;
		debug!(unit = %path.display(), bytes = blob.len(), "Wrote compiled unit");
		units.push(path);
	}
	Ok(units)
}
