//! Schema file parsing entry points.

use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use tracing::{debug, error, info};

use crate::error::{ParseError, ParseFailure};
use crate::lexer::tokenize;
use crate::model::Module;
use crate::parser::parse_modules;
use crate::registry::ModuleRegistry;

/// Parses schema text. `path` labels error records and module sources.
pub fn parse_schema_str(path: &Path, text: &str) -> Result<Vec<Module>, Vec<ParseError>> {
	let (tokens, lex_errors) = tokenize(text);
	if !lex_errors.is_empty() {
		return Err(lex_errors
			.into_iter()
			.map(|e| ParseError::Lexical {
				path: path.to_path_buf(),
				line: e.line,
				column: e.column,
				message: e.message,
			})
			.collect());
	}

	let (mut modules, syntax_errors) = parse_modules(&tokens);
	if !syntax_errors.is_empty() {
		return Err(syntax_errors
			.into_iter()
			.map(|e| ParseError::Syntax {
				path: path.to_path_buf(),
				line: e.line,
				column: e.column,
				message: e.message,
			})
			.collect());
	}

	for module in &mut modules {
		module.source = Some(path.to_path_buf());
	}
	Ok(modules)
}

/// Reads and parses one schema file.
pub fn parse_schema_file(path: &Path) -> Result<Vec<Module>, Vec<ParseError>> {
	let text = std::fs::read_to_string(path).map_err(|e| {
		vec![if e.kind() == std::io::ErrorKind::NotFound {
			ParseError::FileNotFound { path: path.to_path_buf() }
		} else {
			ParseError::Io {
				path: path.to_path_buf(),
				message: e.to_string(),
			}
		}]
	})?;
	parse_schema_str(path, &text)
}

/// Parses every file into one registry.
///
/// All files are attempted; each error is logged as it is found. If any
/// file failed, the collected errors are returned together.
pub fn parse_schema_files<P: AsRef<Path>>(paths: &[P]) -> Result<ModuleRegistry, ParseFailure> {
	let mut registry = ModuleRegistry::new();
	let mut errors: IndexSet<ParseError> = IndexSet::new();

	for path in paths {
		let path = path.as_ref();
		match parse_schema_file(path) {
			Ok(modules) => {
				debug!(file = %path.display(), modules = modules.len(), "Parsed schema file");
				for module in modules {
					registry.register(module);
				}
			}
			Err(file_errors) => {
				for e in file_errors {
					error!(file = %path.display(), "{e}");
					errors.insert(e);
				}
			}
		}
	}

	if let Some(failure) = ParseFailure::new(errors.into_iter().collect()) {
		return Err(failure);
	}

	info!(
		files = paths.len(),
		modules = registry.len(),
		types = registry.type_count(),
		"Parsed ASN.1 schema"
	);
	Ok(registry)
}

/// Splits a comma-separated file list, trimming each entry and dropping empty ones.
pub fn split_file_list(list: &str) -> Vec<PathBuf> {
	list.split(',').map(str::trim).filter(|s| !s.is_empty()).map(PathBuf::from).collect()
}
