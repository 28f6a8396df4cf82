//! Type loaders: resolving canonical names to compiled types.
//!
//! Loaders form a parent chain. The [`BaseLoader`] is the host's own symbol
//! space and only knows the universal types; a [`UnitLoader`] is scoped to a
//! single output area and delegates to its parent first, so generated types
//! never leak into any other loader.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, error};

use crate::descriptor::CompiledType;
use crate::unit::{UnitError, contained_unit_path, read_unit_file};
use crate::universal;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
	#[error("type not found: {0}")]
	NotFound(String),

	#[error("compiled unit for {name} is unusable: {reason}")]
	Corrupt { name: String, reason: String },
}

/// Failure to build an isolated loader over an output area.
#[derive(Debug, Error)]
pub enum LoaderConstructionError {
	#[error("output area {0} does not exist")]
	Missing(PathBuf),

	#[error("output area {0} is not a directory")]
	NotADirectory(PathBuf),

	#[error("cannot read output area {path}: {source}")]
	Unreadable {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

/// Resolves canonical type names.
pub trait TypeLoader: Send + Sync + fmt::Debug {
	/// Short description used in logs.
	fn name(&self) -> &str;

	fn load(&self, canonical: &str) -> Result<Arc<CompiledType>, LoadError>;
}

/// The host's default symbol space: universal types only.
#[derive(Debug, Default)]
pub struct BaseLoader;

impl BaseLoader {
	pub fn shared() -> Arc<dyn TypeLoader> {
		Arc::new(BaseLoader)
	}
}

impl TypeLoader for BaseLoader {
	fn name(&self) -> &str {
		"base"
	}

	fn load(&self, canonical: &str) -> Result<Arc<CompiledType>, LoadError> {
		universal::builtin(canonical).ok_or_else(|| LoadError::NotFound(canonical.to_string()))
	}
}

/// Loader scoped to one output area, falling back to its parent.
pub struct UnitLoader {
	root: PathBuf,
	label: String,
	parent: Arc<dyn TypeLoader>,
	cache: RwLock<HashMap<String, Arc<CompiledType>>>,
}

impl fmt::Debug for UnitLoader {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("UnitLoader")
			.field("root", &self.root)
			.field("parent", &self.parent.name())
			.field("cached", &self.cache.read().len())
			.finish()
	}
}

impl UnitLoader {
	pub fn new(root: &Path, parent: Arc<dyn TypeLoader>) -> Result<Self, LoaderConstructionError> {
		let meta = std::fs::metadata(root).map_err(|source| {
			if source.kind() == std::io::ErrorKind::NotFound {
				LoaderConstructionError::Missing(root.to_path_buf())
			} else {
				LoaderConstructionError::Unreadable {
					path: root.to_path_buf(),
					source,
				}
			}
		})?;
		if !meta.is_dir() {
			return Err(LoaderConstructionError::NotADirectory(root.to_path_buf()));
		}
		std::fs::read_dir(root).map_err(|source| LoaderConstructionError::Unreadable {
			path: root.to_path_buf(),
			source,
		})?;

		Ok(Self {
			root: root.to_path_buf(),
			label: format!("units:{}", root.display()),
			parent,
			cache: RwLock::new(HashMap::new()),
		})
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn load_local(&self, canonical: &str) -> Result<Arc<CompiledType>, LoadError> {
		if let Some(ty) = self.cache.read().get(canonical) {
			return Ok(ty.clone());
		}

		// Names come from per-session settings; never look outside the area.
		let path = contained_unit_path(&self.root, canonical).ok_or_else(|| LoadError::NotFound(canonical.to_string()))?;
		let ty = match read_unit_file(&path) {
			Ok(ty) => ty,
			Err(UnitError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
				return Err(LoadError::NotFound(canonical.to_string()));
			}
			Err(e) => {
				return Err(LoadError::Corrupt {
					name: canonical.to_string(),
					reason: e.to_string(),
				});
			}
		};

		if ty.canonical_name != canonical {
			return Err(LoadError::Corrupt {
				name: canonical.to_string(),
				reason: format!("unit declares {}", ty.canonical_name),
			});
		}

		debug!(unit = %path.display(), "Loaded compiled unit");
		let ty = Arc::new(ty);
		self.cache.write().entry(canonical.to_string()).or_insert_with(|| ty.clone());
		Ok(ty)
	}
}

impl TypeLoader for UnitLoader {
	fn name(&self) -> &str {
		&self.label
	}

	fn load(&self, canonical: &str) -> Result<Arc<CompiledType>, LoadError> {
		match self.parent.load(canonical) {
			Err(LoadError::NotFound(_)) => self.load_local(canonical),
			other => other,
		}
	}
}

/// Builds the loader for an activation.
///
/// Without an output area the parent is returned unchanged. If the area
/// cannot be opened the failure is logged and the parent is used instead.
pub fn isolated_loader(root: Option<&Path>, parent: Arc<dyn TypeLoader>) -> Arc<dyn TypeLoader> {
	let Some(root) = root else {
		return parent;
	};

	match UnitLoader::new(root, parent.clone()) {
		Ok(loader) => Arc::new(loader),
		Err(e) => {
			error!(error = %e, "Could not create loader for compiled ASN.1 types");
			parent
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::descriptor::{TypeBody, TypeDescriptor};
	use crate::unit::{encode_unit, unit_path};

	fn write_unit(root: &Path, canonical: &str, body: TypeBody) {
		let ty = CompiledType {
			canonical_name: canonical.to_string(),
			module: "TEST".into(),
			name: canonical.rsplit('.').next().unwrap().to_string(),
			descriptor: TypeDescriptor::new(body),
		};
		let path = unit_path(root, canonical);
		std::fs::create_dir_all(path.parent().unwrap()).unwrap();
		std::fs::write(path, encode_unit(&ty).unwrap()).unwrap();
	}

	#[test]
	fn test_base_loader_knows_only_universal_types() {
		let base = BaseLoader;
		assert!(base.load("asnrd.universal.Boolean").is_ok());
		assert_eq!(base.load("my.module.T"), Err(LoadError::NotFound("my.module.T".into())));
	}

	#[test]
	fn test_unit_loader_resolves_local_units_and_parent_types() {
		let dir = tempfile::tempdir().unwrap();
		write_unit(dir.path(), "my.module.Flag", TypeBody::Boolean);

		let loader = UnitLoader::new(dir.path(), BaseLoader::shared()).unwrap();
		assert_eq!(loader.load("my.module.Flag").unwrap().name, "Flag");
		assert_eq!(loader.load("asnrd.universal.Null").unwrap().name, "Null");
		assert!(matches!(loader.load("my.module.Other"), Err(LoadError::NotFound(_))));
	}

	#[test]
	fn test_two_areas_do_not_see_each_other() {
		let first = tempfile::tempdir().unwrap();
		let second = tempfile::tempdir().unwrap();
		write_unit(first.path(), "a.One", TypeBody::Null);
		write_unit(second.path(), "b.Two", TypeBody::Null);

		let one = UnitLoader::new(first.path(), BaseLoader::shared()).unwrap();
		let two = UnitLoader::new(second.path(), BaseLoader::shared()).unwrap();
		assert!(one.load("a.One").is_ok());
		assert!(one.load("b.Two").is_err());
		assert!(two.load("b.Two").is_ok());
		assert!(two.load("a.One").is_err());
	}

	#[test]
	fn test_names_outside_the_area_are_not_found() {
		let outside = tempfile::tempdir().unwrap();
		write_unit(outside.path(), "evil.Thing", TypeBody::Boolean);
		let area = tempfile::tempdir().unwrap();
		write_unit(area.path(), "a.One", TypeBody::Null);

		let loader = UnitLoader::new(area.path(), BaseLoader::shared()).unwrap();
		let escaping = format!("x.{}.evil.Thing", outside.path().display());
		assert_eq!(loader.load(&escaping), Err(LoadError::NotFound(escaping.clone())));
		assert_eq!(loader.load("a..One"), Err(LoadError::NotFound("a..One".into())));
		assert!(loader.load("a.One").is_ok());
	}

	#[test]
	fn test_corrupt_unit() {
		let dir = tempfile::tempdir().unwrap();
		let path = unit_path(dir.path(), "x.Broken");
		std::fs::create_dir_all(path.parent().unwrap()).unwrap();
		std::fs::write(&path, b"not a unit").unwrap();

		let loader = UnitLoader::new(dir.path(), BaseLoader::shared()).unwrap();
		assert!(matches!(loader.load("x.Broken"), Err(LoadError::Corrupt { .. })));
	}

	#[test]
	fn test_missing_area_degrades_to_parent() {
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("gone");

		assert!(matches!(
			UnitLoader::new(&missing, BaseLoader::shared()),
			Err(LoaderConstructionError::Missing(_))
		));

		let loader = isolated_loader(Some(&missing), BaseLoader::shared());
		assert_eq!(loader.name(), "base");
	}

	#[test]
	fn test_no_area_returns_parent() {
		let loader = isolated_loader(None, BaseLoader::shared());
		assert_eq!(loader.name(), "base");
	}
}
