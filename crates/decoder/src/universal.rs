//! Universal types available to every loader without any compiled schema.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::descriptor::{CompiledType, StringKind, TypeBody, TypeDescriptor};

/// Package of the built-in universal types.
pub const UNIVERSAL_PACKAGE: &str = "asnrd.universal";

static BUILTINS: LazyLock<HashMap<String, Arc<CompiledType>>> = LazyLock::new(|| {
	let entries = [
		("Boolean", TypeBody::Boolean),
		("Integer", TypeBody::Integer { named: Vec::new() }),
		("Null", TypeBody::Null),
		("BitString", TypeBody::BitString),
		("OctetString", TypeBody::OctetString),
		("ObjectIdentifier", TypeBody::ObjectIdentifier),
		("RelativeOid", TypeBody::RelativeOid),
		("Utf8String", TypeBody::String(StringKind::Utf8)),
		("NumericString", TypeBody::String(StringKind::Numeric)),
		("PrintableString", TypeBody::String(StringKind::Printable)),
		("TeletexString", TypeBody::String(StringKind::Teletex)),
		("VideotexString", TypeBody::String(StringKind::Videotex)),
		("Ia5String", TypeBody::String(StringKind::Ia5)),
		("GraphicString", TypeBody::String(StringKind::Graphic)),
		("VisibleString", TypeBody::String(StringKind::Visible)),
		("GeneralString", TypeBody::String(StringKind::General)),
		("UniversalString", TypeBody::String(StringKind::Universal)),
		("BmpString", TypeBody::String(StringKind::Bmp)),
		("ObjectDescriptor", TypeBody::String(StringKind::ObjectDescriptor)),
		("UtcTime", TypeBody::UtcTime),
		("GeneralizedTime", TypeBody::GeneralizedTime),
		("Any", TypeBody::Any),
	];

	entries
		.into_iter()
		.map(|(name, body)| {
			let canonical = format!("{UNIVERSAL_PACKAGE}.{name}");
			let ty = CompiledType {
				canonical_name: canonical.clone(),
				module: "UNIVERSAL".to_string(),
				name: name.to_string(),
				descriptor: TypeDescriptor::new(body),
			};
			(canonical, Arc::new(ty))
		})
		.collect()
});

/// Looks up a built-in universal type by canonical name.
pub fn builtin(canonical: &str) -> Option<Arc<CompiledType>> {
	BUILTINS.get(canonical).cloned()
}

/// Canonical names of all built-in types, sorted.
pub fn builtin_names() -> Vec<&'static str> {
	let mut names: Vec<&'static str> = BUILTINS.keys().map(String::as_str).collect();
	names.sort_unstable();
	names
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_builtins_are_addressable() {
		let integer = builtin("asnrd.universal.Integer").unwrap();
		assert_eq!(integer.name, "Integer");
		assert!(builtin("asnrd.universal.Nope").is_none());
		assert!(builtin_names().iter().all(|n| n.starts_with(UNIVERSAL_PACKAGE)));
	}
}
