//! Decoded values.

use std::fmt::Write as _;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A decoded ASN.1 value.
///
/// Serializes to plain JSON-like data: records become maps in schema order,
/// octet strings become lowercase hex, bit strings become `0`/`1` text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
	Null,
	Boolean(bool),
	Integer(i64),
	Enumerated { name: Option<String>, value: i64 },
	BitString { unused_bits: u8, bytes: Vec<u8> },
	Bytes(Vec<u8>),
	Text(String),
	Oid(String),
	Time(String),
	Record(Vec<(String, Value)>),
	List(Vec<Value>),
	Choice { alternative: String, value: Box<Value> },
}

impl Value {
	/// Looks up a field of a record value.
	pub fn field(&self, name: &str) -> Option<&Value> {
		match self {
			Value::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
			_ => None,
		}
	}

	/// Takes ownership of a record field.
	pub fn into_field(self, name: &str) -> Option<Value> {
		match self {
			Value::Record(fields) => fields.into_iter().find(|(n, _)| n == name).map(|(_, v)| v),
			_ => None,
		}
	}

	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Value::Integer(v) | Value::Enumerated { value: v, .. } => Some(*v),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Text(s) | Value::Oid(s) | Value::Time(s) => Some(s),
			_ => None,
		}
	}
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
	let mut out = String::with_capacity(bytes.len() * 2);
	for b in bytes {
		let _ = write!(out, "{b:02x}");
	}
	out
}

fn bit_text(unused_bits: u8, bytes: &[u8]) -> String {
	let total = (bytes.len() * 8).saturating_sub(usize::from(unused_bits));
	(0..total)
		.map(|i| if bytes[i / 8] & (0x80 >> (i % 8)) != 0 { '1' } else { '0' })
		.collect()
}

impl Serialize for Value {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Value::Null => serializer.serialize_unit(),
			Value::Boolean(b) => serializer.serialize_bool(*b),
			Value::Integer(v) => serializer.serialize_i64(*v),
			Value::Enumerated { name: Some(name), .. } => serializer.serialize_str(name),
			Value::Enumerated { name: None, value } => serializer.serialize_i64(*value),
			Value::BitString { unused_bits, bytes } => serializer.serialize_str(&bit_text(*unused_bits, bytes)),
			Value::Bytes(bytes) => serializer.serialize_str(&to_hex(bytes)),
			Value::Text(s) | Value::Oid(s) | Value::Time(s) => serializer.serialize_str(s),
			Value::Record(fields) => {
				let mut map = serializer.serialize_map(Some(fields.len()))?;
				for (name, value) in fields {
					map.serialize_entry(name, value)?;
				}
				map.end()
			}
			Value::List(items) => {
				let mut seq = serializer.serialize_seq(Some(items.len()))?;
				for item in items {
					seq.serialize_element(item)?;
				}
				seq.end()
			}
			Value::Choice { alternative, value } => {
				let mut map = serializer.serialize_map(Some(1))?;
				map.serialize_entry(alternative, value)?;
				map.end()
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_bit_string_text_skips_unused_bits() {
		assert_eq!(bit_text(3, &[0b1010_1000]), "10101");
		assert_eq!(bit_text(0, &[]), "");
	}

	#[test]
	fn test_record_serializes_in_field_order() {
		let value = Value::Record(vec![
			("zeta".into(), Value::Integer(1)),
			("alpha".into(), Value::Bytes(vec![0xde, 0xad])),
			(
				"pick".into(),
				Value::Choice {
					alternative: "flag".into(),
					value: Box::new(Value::Boolean(true)),
				},
			),
		]);
		let json = serde_json::to_string(&value).unwrap();
		assert_eq!(json, r#"{"zeta":1,"alpha":"dead","pick":{"flag":true}}"#);
	}

	#[test]
	fn test_field_lookup() {
		let value = Value::Record(vec![("items".into(), Value::List(vec![Value::Null]))]);
		assert_eq!(value.field("items"), Some(&Value::List(vec![Value::Null])));
		assert!(value.field("missing").is_none());
		assert!(Value::Null.field("items").is_none());
	}
}
