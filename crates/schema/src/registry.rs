use std::collections::BTreeMap;

use tracing::warn;

use crate::model::Module;

/// All modules of one activation, keyed by module name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleRegistry {
	modules: BTreeMap<String, Module>,
}

impl ModuleRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts `module`, replacing any module with the same name.
	///
	/// The replaced module is returned; the later definition always wins.
	pub fn register(&mut self, module: Module) -> Option<Module> {
		let replaced = self.modules.insert(module.name.clone(), module);
		if let Some(previous) = &replaced
			&& let Some(current) = self.modules.get(&previous.name)
		{
			warn!(
				module = %previous.name,
				previous = ?previous.source,
				replacement = ?current.source,
				"Duplicate ASN.1 module definition, keeping the later one"
			);
		}
		replaced
	}

	pub fn get(&self, name: &str) -> Option<&Module> {
		self.modules.get(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.modules.contains_key(name)
	}

	pub fn len(&self) -> usize {
		self.modules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.modules.is_empty()
	}

	/// Modules sorted by name.
	pub fn iter(&self) -> impl Iterator<Item = &Module> {
		self.modules.values()
	}

	pub fn type_count(&self) -> usize {
		self.modules.values().map(|m| m.types.len()).sum()
	}
}

impl FromIterator<Module> for ModuleRegistry {
	fn from_iter<I: IntoIterator<Item = Module>>(iter: I) -> Self {
		let mut registry = Self::new();
		for module in iter {
			registry.register(module);
		}
		registry
	}
}
