//! Compiled unit blob handling.
//!
//! A unit is one [`CompiledType`] serialized with postcard behind a fixed
//! header, stored next to its source artifact inside an output area.

use std::mem::size_of;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::descriptor::CompiledType;

/// Magic bytes identifying a compiled unit.
pub const MAGIC: &[u8; 8] = b"ASNRUNIT";

/// Format version for blob compatibility.
pub const FORMAT_VERSION: u32 = 1;

/// Total header size in bytes (magic + version).
pub const HEADER_SIZE: usize = MAGIC.len() + size_of::<u32>();

/// File extension of generated source artifacts.
pub const SOURCE_EXTENSION: &str = "asnd";

/// File extension of compiled units.
pub const UNIT_EXTENSION: &str = "unit";

#[derive(Debug, Error)]
pub enum UnitError {
	#[error("missing or mismatched unit header")]
	BadHeader,
	#[error("unit format version {0} is not supported")]
	Version(u32),
	#[error("unit payload is corrupt: {0}")]
	Payload(#[from] postcard::Error),
	#[error("I/O error on {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

pub fn encode_unit(ty: &CompiledType) -> Result<Vec<u8>, UnitError> {
	let payload = postcard::to_allocvec(ty)?;
	let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
	out.extend_from_slice(MAGIC);
	out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
	out.extend_from_slice(&payload);
	Ok(out)
}

pub fn decode_unit(data: &[u8]) -> Result<CompiledType, UnitError> {
	let (magic, rest) = data.split_first_chunk::<8>().ok_or(UnitError::BadHeader)?;
	if magic != MAGIC {
		return Err(UnitError::BadHeader);
	}
	let (version, payload) = rest.split_first_chunk::<4>().ok_or(UnitError::BadHeader)?;
	match u32::from_le_bytes(*version) {
		FORMAT_VERSION => Ok(postcard::from_bytes(payload)?),
		other => Err(UnitError::Version(other)),
	}
}

pub fn read_unit_file(path: &Path) -> Result<CompiledType, UnitError> {
	let data = std::fs::read(path).map_err(|source| UnitError::Io {
		path: path.to_path_buf(),
		source,
	})?;
	decode_unit(&data)
}

/// Relative path of a canonical name inside an output area, without extension.
///
/// `my.module.MyType` maps to `my/module/MyType`.
pub fn relative_path(canonical: &str) -> PathBuf {
	canonical.split('.').collect()
}

/// Like [`relative_path`], but `None` unless every segment is a single
/// plain path component, so the result cannot leave the directory it is
/// joined to.
pub fn contained_relative_path(canonical: &str) -> Option<PathBuf> {
	canonical
		.split('.')
		.map(|segment| {
			let mut components = Path::new(segment).components();
			match (components.next(), components.next()) {
				(Some(Component::Normal(_)), None) if !segment.contains(['/', '\\']) => Some(segment),
				_ => None,
			}
		})
		.collect()
}

/// Location of the unit for `canonical` under `root`, if it stays under `root`.
pub fn contained_unit_path(root: &Path, canonical: &str) -> Option<PathBuf> {
	contained_relative_path(canonical).map(|relative| root.join(relative).with_extension(UNIT_EXTENSION))
}

/// Location of the unit for `canonical` under `root`.
pub fn unit_path(root: &Path, canonical: &str) -> PathBuf {
	root.join(relative_path(canonical)).with_extension(UNIT_EXTENSION)
}

/// Location of the generated source artifact for `canonical` under `root`.
pub fn source_path(root: &Path, canonical: &str) -> PathBuf {
	root.join(relative_path(canonical)).with_extension(SOURCE_EXTENSION)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::descriptor::{TypeBody, TypeDescriptor};

	fn sample() -> CompiledType {
		CompiledType {
			canonical_name: "my.module.Flag".into(),
			module: "MY-MODULE".into(),
			name: "Flag".into(),
			descriptor: TypeDescriptor::new(TypeBody::Boolean),
		}
	}

	#[test]
	fn test_foreign_blobs_are_rejected() {
		assert!(matches!(decode_unit(b"short"), Err(UnitError::BadHeader)));
		assert!(matches!(decode_unit(b"OTHERFMT\x01\x00\x00\x00payload"), Err(UnitError::BadHeader)));
		assert!(matches!(decode_unit(MAGIC), Err(UnitError::BadHeader)));

		let mut newer = encode_unit(&sample()).unwrap();
		newer[MAGIC.len()..HEADER_SIZE].copy_from_slice(&2u32.to_le_bytes());
		assert!(matches!(decode_unit(&newer), Err(UnitError::Version(2))));
	}

	#[test]
	fn test_unit_header_layout() {
		let blob = encode_unit(&sample()).unwrap();
		assert_eq!(&blob[..8], MAGIC);
		assert_eq!(&blob[8..12], &FORMAT_VERSION.to_le_bytes());
		assert_eq!(decode_unit(&blob).unwrap(), sample());
	}

	#[test]
	fn test_truncated_payload_is_corrupt() {
		let blob = encode_unit(&sample()).unwrap();
		let err = decode_unit(&blob[..HEADER_SIZE + 2]).unwrap_err();
		assert!(matches!(err, UnitError::Payload(_)));
	}

	#[test]
	fn test_unit_path_follows_canonical_segments() {
		let path = unit_path(Path::new("/out"), "my.module.MyType");
		assert_eq!(path, Path::new("/out/my/module/MyType.unit"));
		assert_eq!(source_path(Path::new("/out"), "a.B"), Path::new("/out/a/B.asnd"));
		assert_eq!(contained_unit_path(Path::new("/out"), "my.module.MyType"), Some(path));
	}

	#[test]
	fn test_names_escaping_the_root_have_no_contained_path() {
		for name in ["x./tmp/evil.Thing", "a..B", ".B", "a.", "a/b.C", "a\\b.C", "/etc.passwd", ""] {
			assert_eq!(contained_relative_path(name), None, "{name}");
		}
		assert_eq!(contained_relative_path("cdr.Call-Record"), Some(PathBuf::from("cdr/Call-Record")));
	}
}
