//! Textual schema rewriting before parsing.
//!
//! The engine runs a fixed list of [`Preprocessor`]s over every schema file and
//! writes the result into an output directory under the original file name.
//! The originals are never touched.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PreprocessError {
	#[error("cannot read schema file {}: {source}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("cannot write preprocessed schema {}: {source}", path.display())]
	Write {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("schema path {} has no file name", .0.display())]
	NoFileName(PathBuf),
}

/// One rewriting pass over schema text.
pub trait Preprocessor: Send + Sync + fmt::Debug {
	fn name(&self) -> &'static str;
	fn apply(&self, text: &str) -> String;
}

/// Separates a `--` comment marker from text glued to it, so `--note` becomes
/// `-- note`. Runs of dashes and the closing `--` of inline comments are left
/// alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommentSpacing;

impl Preprocessor for CommentSpacing {
	fn name(&self) -> &'static str {
		"comment-spacing"
	}

	fn apply(&self, text: &str) -> String {
		let mut out = String::with_capacity(text.len());
		for line in text.split_inclusive('\n') {
			let mut in_comment = false;
			let mut chars = line.chars().peekable();
			while let Some(ch) = chars.next() {
				out.push(ch);
				if ch != '-' || chars.peek() != Some(&'-') {
					continue;
				}
				chars.next();
				out.push('-');
				if chars.peek() == Some(&'-') {
					// ASN.1 allows long dash rulers; copy them as they are.
					while chars.peek() == Some(&'-') {
						out.push('-');
						chars.next();
					}
					continue;
				}
				if !in_comment && chars.peek().is_some_and(|c| !c.is_whitespace()) {
					out.push(' ');
				}
				in_comment = !in_comment;
			}
		}
		out
	}
}

/// Drops extension version brackets `[[` and `]]`, keeping their contents.
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionBrackets;

impl Preprocessor for VersionBrackets {
	fn name(&self) -> &'static str {
		"version-brackets"
	}

	fn apply(&self, text: &str) -> String {
		text.replace("[[", "").replace("]]", "")
	}
}

/// Removes subtype constraints: parenthesised groups that follow a type
/// name or keyword, including `SIZE (..)` forms. Named numbers such as
/// `one(1)` follow a lowercase identifier and are kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct Constraints;

impl Constraints {
	fn previous_word(out: &str) -> &str {
		let trimmed = out.trim_end();
		let start = trimmed
			.rfind(|c: char| !(c.is_alphanumeric() || c == '-'))
			.map_or(0, |i| i + 1);
		&trimmed[start..]
	}

	fn is_constraint_position(out: &str) -> bool {
		Self::previous_word(out).chars().next().is_some_and(|c| c.is_ascii_uppercase())
	}
}

impl Preprocessor for Constraints {
	fn name(&self) -> &'static str {
		"constraints"
	}

	fn apply(&self, text: &str) -> String {
		let mut out = String::with_capacity(text.len());
		let mut rest = text;

		while let Some(ch) = rest.chars().next() {
			if rest.starts_with("--") {
				let end = rest[2..].find(['\n']).map_or(rest.len(), |i| i + 2);
				out.push_str(&rest[..end]);
				rest = &rest[end..];
				continue;
			}
			if ch == '(' && Self::is_constraint_position(&out) {
				let mut depth = 0usize;
				let mut end = rest.len();
				for (i, c) in rest.char_indices() {
					match c {
						'(' => depth += 1,
						')' => {
							depth -= 1;
							if depth == 0 {
								end = i + 1;
								break;
							}
						}
						_ => {}
					}
				}
				if Self::previous_word(&out) == "SIZE" {
					let keep = out.trim_end().len() - "SIZE".len();
					out.truncate(keep);
				}
				rest = &rest[end..];
				continue;
			}
			out.push(ch);
			rest = &rest[ch.len_utf8()..];
		}
		out
	}
}

/// Applies every preprocessor, in order, to each schema file.
#[derive(Debug)]
pub struct PreprocessorEngine {
	steps: Vec<Box<dyn Preprocessor>>,
}

impl Default for PreprocessorEngine {
	fn default() -> Self {
		Self {
			steps: vec![Box::new(CommentSpacing), Box::new(VersionBrackets), Box::new(Constraints)],
		}
	}
}

impl PreprocessorEngine {
	pub fn with_steps(steps: Vec<Box<dyn Preprocessor>>) -> Self {
		Self { steps }
	}

	pub fn apply(&self, text: &str) -> String {
		self.steps.iter().fold(text.to_string(), |text, step| step.apply(&text))
	}

	/// Rewrites `files` into `out_dir` and returns the new paths, in order.
	pub fn preprocess(&self, files: &[PathBuf], out_dir: &Path) -> Result<Vec<PathBuf>, PreprocessError> {
		let mut written = Vec::with_capacity(files.len());
		for file in files {
			let name = file.file_name().ok_or_else(|| PreprocessError::NoFileName(file.clone()))?;
			let text = std::fs::read_to_string(file).map_err(|source| PreprocessError::Read {
				path: file.clone(),
				source,
			})?;
			let target = out_dir.join(name);
			std::fs::write(&target, self.apply(&text)).map_err(|source| PreprocessError::Write {
				path: target.clone(),
				source,
			})?;
			debug!(source = %file.display(), target = %target.display(), "Preprocessed schema file");
			written.push(target);
		}
		info!(
			files = written.len(),
			steps = ?self.steps.iter().map(|s| s.name()).collect::<Vec<_>>(),
			output = %out_dir.display(),
			"Preprocessed ASN.1 schemas"
		);
		Ok(written)
	}

	/// Comma-separated form of [`Self::preprocess`].
	pub fn preprocess_list(&self, list: &str, out_dir: &Path) -> Result<String, PreprocessError> {
		let files = asnrd_schema::split_file_list(list);
		let written = self.preprocess(&files, out_dir)?;
		Ok(written.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(","))
	}
}
