//! Root type name resolution.

use thiserror::Error;

/// How the root type of a read session is named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootName {
	/// Human form, `MODULE-NAME.Type`.
	Model(String),
	/// Canonical name, used as is.
	Class(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameResolutionError {
	#[error("root model name `{0}` is not of the form MODULE-NAME.Type")]
	Format(String),

	#[error("root type name is empty")]
	Empty,
}

/// Produces the canonical name for a root type.
///
/// For the human form the module part (everything before the last `.`) has
/// `-` replaced by `.` and is lowercased; the type part is appended as
/// written.
pub fn resolve(name: &RootName) -> Result<String, NameResolutionError> {
	match name {
		RootName::Class(canonical) if canonical.trim().is_empty() => Err(NameResolutionError::Empty),
		RootName::Class(canonical) => Ok(canonical.clone()),
		RootName::Model(human) => {
			let human = human.trim();
			if human.is_empty() {
				return Err(NameResolutionError::Empty);
			}
			let (module, type_name) = human
				.rsplit_once('.')
				.filter(|(module, type_name)| !module.is_empty() && !type_name.is_empty())
				.ok_or_else(|| NameResolutionError::Format(human.to_string()))?;
			Ok(format!("{}.{type_name}", module.replace('-', ".").to_lowercase()))
		}
	}
}
