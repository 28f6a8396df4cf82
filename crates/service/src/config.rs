//! Reader configuration and validation.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resolve::RootName;

/// Whether schema files are rewritten before parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreprocessingStrategy {
	/// Parse the configured files as they are.
	#[default]
	Default,
	/// Rewrite the files into `preprocessing-output-directory` first.
	AdditionalPreprocessing,
}

/// Settings of one reader service.
///
/// String values may contain `${name}` placeholders. `schema-files` and
/// `preprocessing-output-directory` are expanded when the service is
/// enabled; the root names, `record-field` and `iteration-strategy` are
/// expanded for every read session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReaderConfig {
	/// Prefix of the output area directory name.
	pub identifier: String,
	pub root_model_name: Option<String>,
	pub root_class_name: Option<String>,
	/// Comma-separated schema file paths.
	pub schema_files: Option<String>,
	pub preprocessing_strategy: PreprocessingStrategy,
	pub preprocessing_output_directory: Option<String>,
	pub record_field: Option<String>,
	pub iteration_strategy: Option<String>,
	/// Directory of precompiled units. Schemas may import modules compiled
	/// there; it is on the build classpath and in the runtime loader chain.
	pub runtime_support_directory: Option<PathBuf>,
	/// Where output areas are created; the system temp dir if unset.
	pub output_parent_directory: Option<PathBuf>,
}

impl Default for ReaderConfig {
	fn default() -> Self {
		Self {
			identifier: "asnrd".to_string(),
			root_model_name: None,
			root_class_name: None,
			schema_files: None,
			preprocessing_strategy: PreprocessingStrategy::Default,
			preprocessing_output_directory: None,
			record_field: None,
			iteration_strategy: None,
			runtime_support_directory: None,
			output_parent_directory: None,
		}
	}
}

/// One problem found by [`ReaderConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
	#[error("root-model-name and root-class-name are mutually exclusive")]
	BothRootNames,

	#[error("one of root-model-name or root-class-name is required")]
	NoRootName,

	#[error("{0} must not be empty")]
	Empty(&'static str),

	#[error("preprocessing-output-directory is required for additional preprocessing")]
	PreprocessingDirectoryRequired,

	#[error("preprocessing output directory {} does not exist", .0.display())]
	DirectoryMissing(PathBuf),

	#[error("preprocessing output directory {} is not a directory", .0.display())]
	NotADirectory(PathBuf),

	#[error("preprocessing output directory {} is not readable: {reason}", path.display())]
	DirectoryUnreadable { path: PathBuf, reason: String },

	#[error("runtime support directory {} does not exist", .0.display())]
	RuntimeSupportMissing(PathBuf),
}

/// Issues as a bulleted list, one per line.
struct IssueList<'a>(&'a [ValidationIssue]);

impl fmt::Display for IssueList<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, issue) in self.0.iter().enumerate() {
			if i > 0 {
				writeln!(f)?;
			}
			write!(f, "  - {issue}")?;
		}
		Ok(())
	}
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("invalid reader configuration:\n{}", IssueList(.0))]
	Invalid(Vec<ValidationIssue>),

	#[error("cannot read {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("cannot parse {}: {source}", path.display())]
	Toml {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl ReaderConfig {
	pub fn from_toml_str(text: &str) -> std::result::Result<Self, toml::de::Error> {
		toml::from_str(text)
	}

	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_toml_str(&text).map_err(|source| ConfigError::Toml {
			path: path.to_path_buf(),
			source,
		})
	}

	/// The configured root name, if exactly one form is set.
	pub fn root_name(&self) -> Option<RootName> {
		match (&self.root_model_name, &self.root_class_name) {
			(Some(model), None) => Some(RootName::Model(model.clone())),
			(None, Some(class)) => Some(RootName::Class(class.clone())),
			_ => None,
		}
	}

	/// Every problem with this configuration. Only inspects the filesystem.
	pub fn issues(&self) -> Vec<ValidationIssue> {
		let mut issues = Vec::new();

		match (&self.root_model_name, &self.root_class_name) {
			(Some(_), Some(_)) => issues.push(ValidationIssue::BothRootNames),
			(None, None) => issues.push(ValidationIssue::NoRootName),
			_ => {}
		}
		let non_empty = [
			("identifier", Some(self.identifier.as_str())),
			("root-model-name", self.root_model_name.as_deref()),
			("root-class-name", self.root_class_name.as_deref()),
			("record-field", self.record_field.as_deref()),
			("iteration-strategy", self.iteration_strategy.as_deref()),
		];
		for (key, value) in non_empty {
			if value.is_some_and(|v| v.trim().is_empty()) {
				issues.push(ValidationIssue::Empty(key));
			}
		}

		if self.preprocessing_strategy == PreprocessingStrategy::AdditionalPreprocessing {
			match self.preprocessing_output_directory.as_deref().map(str::trim) {
				None | Some("") => issues.push(ValidationIssue::PreprocessingDirectoryRequired),
				// Placeholders are only known at enable time.
				Some(dir) if dir.contains("${") => {}
				Some(dir) => issues.extend(check_directory(Path::new(dir)).err()),
			}
		}

		if let Some(dir) = &self.runtime_support_directory
			&& !dir.is_dir()
		{
			issues.push(ValidationIssue::RuntimeSupportMissing(dir.clone()));
		}

		issues
	}

	pub fn validate(&self) -> Result<()> {
		let issues = self.issues();
		if issues.is_empty() { Ok(()) } else { Err(ConfigError::Invalid(issues)) }
	}
}

/// Checks that `dir` exists, is a directory and can be listed.
pub fn check_directory(dir: &Path) -> std::result::Result<(), ValidationIssue> {
	let metadata = match std::fs::metadata(dir) {
		Ok(metadata) => metadata,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
			return Err(ValidationIssue::DirectoryMissing(dir.to_path_buf()));
		}
		Err(e) => {
			return Err(ValidationIssue::DirectoryUnreadable {
				path: dir.to_path_buf(),
				reason: e.to_string(),
			});
		}
	};
	if !metadata.is_dir() {
		return Err(ValidationIssue::NotADirectory(dir.to_path_buf()));
	}
	std::fs::read_dir(dir).map(drop).map_err(|e| ValidationIssue::DirectoryUnreadable {
		path: dir.to_path_buf(),
		reason: e.to_string(),
	})
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn test_parse_kebab_case_toml() {
		let config = ReaderConfig::from_toml_str(
			r#"
identifier = "billing"
root-model-name = "BILLING-RECORDS.${type}"
schema-files = "a.asn, b.asn"
preprocessing-strategy = "additional-preprocessing"
preprocessing-output-directory = "${out}"
record-field = "calls"
"#,
		)
		.unwrap();
		assert_eq!(config.identifier, "billing");
		assert_eq!(config.preprocessing_strategy, PreprocessingStrategy::AdditionalPreprocessing);
		assert_eq!(config.root_name(), Some(RootName::Model("BILLING-RECORDS.${type}".into())));
		assert!(config.issues().is_empty());
	}

	#[test]
	fn test_unknown_keys_are_rejected() {
		assert!(ReaderConfig::from_toml_str("root-class = \"x\"").is_err());
	}

	#[test]
	fn test_every_issue_is_reported() {
		let config = ReaderConfig {
			root_model_name: Some("M.T".into()),
			root_class_name: Some("m.T".into()),
			record_field: Some(" ".into()),
			preprocessing_strategy: PreprocessingStrategy::AdditionalPreprocessing,
			..ReaderConfig::default()
		};
		assert_eq!(
			config.issues(),
			vec![
				ValidationIssue::BothRootNames,
				ValidationIssue::Empty("record-field"),
				ValidationIssue::PreprocessingDirectoryRequired,
			]
		);
		assert_eq!(config.root_name(), None);

		let err = ReaderConfig::default().validate().unwrap_err();
		assert_eq!(
			err.to_string(),
			"invalid reader configuration:\n  - one of root-model-name or root-class-name is required"
		);
	}

	#[test]
	fn test_preprocessing_directory_checks() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("plain.txt");
		std::fs::write(&file, "").unwrap();

		assert_eq!(check_directory(dir.path()), Ok(()));
		assert_eq!(check_directory(&file), Err(ValidationIssue::NotADirectory(file.clone())));
		let missing = dir.path().join("missing");
		assert_eq!(check_directory(&missing), Err(ValidationIssue::DirectoryMissing(missing.clone())));
	}
}
