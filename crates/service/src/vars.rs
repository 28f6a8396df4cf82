//! `${name}` placeholder expansion for configured values.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}").expect("placeholder pattern is valid"));

/// Values substituted into configured strings.
///
/// Enable-time settings are expanded once against the variables passed to
/// `enable`; read-session settings are expanded per call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables(HashMap<String, String>);

impl Variables {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.insert(name, value);
		self
	}

	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.0.insert(name.into(), value.into());
	}

	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.get(name).map(String::as_str)
	}

	/// Replaces every `${name}` in `text`. Unknown names expand to nothing.
	pub fn expand(&self, text: &str) -> String {
		PLACEHOLDER
			.replace_all(text, |caps: &Captures<'_>| self.get(caps[1].trim()).unwrap_or_default().to_string())
			.into_owned()
	}

	/// Expands `text` and drops the result if it is blank.
	pub fn expand_non_empty(&self, text: Option<&str>) -> Option<String> {
		text.map(|t| self.expand(t)).filter(|t| !t.trim().is_empty())
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}
