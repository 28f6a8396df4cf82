//! Compile-time search path for already compiled units.

use std::path::PathBuf;
use std::sync::Arc;

use asnrd_decoder::CompiledType;
use asnrd_decoder::unit::{contained_unit_path, read_unit_file};
use asnrd_decoder::universal;

/// Where referenced types that are not part of a batch are looked up.
///
/// The universal types of the runtime library are always present; further
/// entries are directories of precompiled units, searched in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classpath {
	entries: Vec<PathBuf>,
}

impl Classpath {
	/// The runtime library alone.
	pub fn runtime() -> Self {
		Self::default()
	}

	pub fn with_entry(mut self, dir: impl Into<PathBuf>) -> Self {
		self.entries.push(dir.into());
		self
	}

	pub fn entries(&self) -> &[PathBuf] {
		&self.entries
	}

	pub fn contains(&self, canonical: &str) -> bool {
		universal::builtin(canonical).is_some() || self.unit_paths(canonical).any(|path| path.is_file())
	}

	pub fn lookup(&self, canonical: &str) -> Option<Arc<CompiledType>> {
		if let Some(ty) = universal::builtin(canonical) {
			return Some(ty);
		}
		self.unit_paths(canonical)
			.find(|path| path.is_file())
			.and_then(|path| read_unit_file(&path).ok())
			.map(Arc::new)
	}

	/// Candidate unit locations, skipping names that would leave an entry.
	fn unit_paths<'a>(&'a self, canonical: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
		self.entries.iter().filter_map(move |dir| contained_unit_path(dir, canonical))
	}
}

#[cfg(test)]
mod tests {
	use asnrd_decoder::unit::{encode_unit, unit_path};
	use asnrd_decoder::{TypeBody, TypeDescriptor};

	use super::*;

	#[test]
	fn test_runtime_types_are_always_visible() {
		let classpath = Classpath::runtime();
		assert!(classpath.contains("asnrd.universal.OctetString"));
		assert!(!classpath.contains("ext.Thing"));
	}

	#[test]
	fn test_entries_are_searched() {
		let dir = tempfile::tempdir().unwrap();
		let ty = CompiledType {
			canonical_name: "ext.Thing".into(),
			module: "EXT".into(),
			name: "Thing".into(),
			descriptor: TypeDescriptor::new(TypeBody::Null),
		};
		let path = unit_path(dir.path(), "ext.Thing");
		std::fs::create_dir_all(path.parent().unwrap()).unwrap();
		std::fs::write(&path, encode_unit(&ty).unwrap()).unwrap();

		let classpath = Classpath::runtime().with_entry(dir.path());
		assert!(classpath.contains("ext.Thing"));
		assert_eq!(classpath.lookup("ext.Thing").unwrap().name, "Thing");
	}

	#[test]
	fn test_entries_are_not_escaped() {
		let outside = tempfile::tempdir().unwrap();
		let ty = CompiledType {
			canonical_name: "evil.Thing".into(),
			module: "EVIL".into(),
			name: "Thing".into(),
			descriptor: TypeDescriptor::new(TypeBody::Null),
		};
		let path = unit_path(outside.path(), "evil.Thing");
		std::fs::create_dir_all(path.parent().unwrap()).unwrap();
		std::fs::write(&path, encode_unit(&ty).unwrap()).unwrap();

		let entry = tempfile::tempdir().unwrap();
		let classpath = Classpath::runtime().with_entry(entry.path());
		let escaping = format!("x.{}.evil.Thing", outside.path().display());
		assert!(!classpath.contains(&escaping));
		assert!(classpath.lookup(&escaping).is_none());
	}
}
