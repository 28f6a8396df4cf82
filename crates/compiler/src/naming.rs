//! Canonical naming of generated types.

use std::path::PathBuf;

/// Package of a module: lowercased, with `-` replaced by `.`.
///
/// `MY-MODULE` becomes `my.module`.
pub fn package_name(module: &str) -> String {
	module.replace('-', ".").to_lowercase()
}

/// Directory of a module's artifacts relative to the output root.
pub fn package_path(module: &str) -> PathBuf {
	package_name(module).split('.').collect()
}

/// Type name as used in canonical names: hyphens are dropped and the
/// character after each one is uppercased.
pub fn sanitize_type_name(name: &str) -> String {
	let mut out = String::with_capacity(name.len());
	let mut upper_next = false;
	for ch in name.chars() {
		if ch == '-' {
			upper_next = true;
		} else if upper_next {
			out.extend(ch.to_uppercase());
			upper_next = false;
		} else {
			out.push(ch);
		}
	}
	out
}

/// Canonical name of `type_name` defined in `module`.
pub fn canonical_name(module: &str, type_name: &str) -> String {
	format!("{}.{}", package_name(module), sanitize_type_name(type_name))
}
