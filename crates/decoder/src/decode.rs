//! Descriptor-driven BER decoding.

use std::sync::Arc;

use tracing::trace;

use crate::ber::{BerReader, MAX_DEPTH, Tlv};
use crate::descriptor::{CompiledType, Field, LeadingTagError, LeadingTags, StringKind, TagMode, TypeBody, TypeDescriptor, leading_tags};
use crate::error::{DecodeError, Result};
use crate::loader::{LoadError, TypeLoader};
use crate::value::Value;

/// Decodes BER values of one root type.
///
/// Referenced types are resolved through the loader on first use, so a
/// decoder only ever sees the types visible to its own loader.
#[derive(Debug, Clone)]
pub struct Decoder {
	root: Arc<CompiledType>,
	loader: Arc<dyn TypeLoader>,
}

impl Decoder {
	/// Resolves `canonical` through `loader` and prepares a decoder for it.
	pub fn new(canonical: &str, loader: Arc<dyn TypeLoader>) -> Result<Self> {
		let root = loader.load(canonical)?;
		Ok(Self { root, loader })
	}

	pub fn root_type(&self) -> &CompiledType {
		&self.root
	}

	pub fn loader(&self) -> &Arc<dyn TypeLoader> {
		&self.loader
	}

	/// Decodes one complete value.
	pub fn decode(&self, tlv: Tlv<'_>) -> Result<Value> {
		self.decode_type(&self.root.descriptor, tlv, false, &self.root.canonical_name, 0)
	}

	/// Decodes a buffer holding exactly one value.
	pub fn decode_bytes(&self, data: &[u8]) -> Result<Value> {
		let mut reader = BerReader::new(data);
		let tlv = reader.read_tlv()?.ok_or(DecodeError::UnexpectedEnd)?;
		if !reader.is_empty() {
			return Err(DecodeError::TrailingData {
				remaining: reader.remaining(),
			});
		}
		self.decode(tlv)
	}

	fn leading(&self, descriptor: &TypeDescriptor) -> Result<LeadingTags> {
		leading_tags(descriptor, &mut |name| self.loader.load(name).ok()).map_err(|e| match e {
			LeadingTagError::Unresolved(name) => DecodeError::Load(LoadError::NotFound(name)),
			LeadingTagError::Cycle(name) => DecodeError::invalid("type", format!("untagged reference cycle through {name}")),
		})
	}

	/// Decodes `tlv` as `descriptor`.
	///
	/// `implicit` is set when an outer implicit tag already replaced this
	/// type's identifier; the identifier of `tlv` is then not checked.
	fn decode_type(&self, descriptor: &TypeDescriptor, mut tlv: Tlv<'_>, mut implicit: bool, owner: &str, depth: usize) -> Result<Value> {
		if depth > MAX_DEPTH {
			return Err(DecodeError::TooDeep(MAX_DEPTH));
		}

		for layer in &descriptor.tags {
			if !implicit && tlv.tag != layer.tag {
				return Err(DecodeError::UnexpectedTag {
					expected: layer.tag.to_string(),
					found: tlv.tag,
				});
			}
			match layer.mode {
				TagMode::Explicit => {
					tlv = tlv.single_child()?;
					implicit = false;
				}
				TagMode::Implicit => implicit = true,
			}
		}

		match &descriptor.body {
			TypeBody::Reference(target) => {
				let resolved = self.loader.load(target)?;
				self.decode_type(&resolved.descriptor, tlv, implicit, &resolved.canonical_name, depth + 1)
			}
			TypeBody::Choice(alternatives) => {
				if implicit {
					return Err(DecodeError::invalid("CHOICE", "a CHOICE cannot be implicitly tagged"));
				}
				self.decode_choice(alternatives, tlv, owner, depth)
			}
			TypeBody::Any => Ok(Value::Bytes(tlv.raw.to_vec())),
			body => {
				if !implicit && let Some(expected) = body.natural_tag() && tlv.tag != expected {
					return Err(DecodeError::UnexpectedTag {
						expected: expected.to_string(),
						found: tlv.tag,
					});
				}
				self.decode_body(body, tlv, owner, depth)
			}
		}
	}

	fn decode_choice(&self, alternatives: &[Field], tlv: Tlv<'_>, owner: &str, depth: usize) -> Result<Value> {
		for alternative in alternatives {
			if self.leading(&alternative.ty)?.contains(tlv.tag) {
				let value = self.decode_type(&alternative.ty, tlv, false, owner, depth + 1)?;
				return Ok(Value::Choice {
					alternative: alternative.name.clone(),
					value: Box::new(value),
				});
			}
		}
		Err(DecodeError::NoAlternative {
			type_name: owner.to_string(),
			found: tlv.tag,
		})
	}

	fn decode_body(&self, body: &TypeBody, tlv: Tlv<'_>, owner: &str, depth: usize) -> Result<Value> {
		match body {
			TypeBody::Boolean => match primitive(&tlv, "BOOLEAN")? {
				[b] => Ok(Value::Boolean(*b != 0)),
				other => Err(DecodeError::invalid("BOOLEAN", format!("expected 1 octet, found {}", other.len()))),
			},
			TypeBody::Integer { .. } => Ok(Value::Integer(decode_integer(primitive(&tlv, "INTEGER")?)?)),
			TypeBody::Enumerated { items } => {
				let value = decode_integer(primitive(&tlv, "ENUMERATED")?)?;
				let name = items.iter().find(|item| item.value == value).map(|item| item.name.clone());
				Ok(Value::Enumerated { name, value })
			}
			TypeBody::Null => {
				if primitive(&tlv, "NULL")?.is_empty() {
					Ok(Value::Null)
				} else {
					Err(DecodeError::invalid("NULL", "contents must be empty"))
				}
			}
			TypeBody::BitString => {
				let mut bytes = Vec::new();
				let mut unused_bits = 0;
				collect_bits(&tlv, &mut bytes, &mut unused_bits, depth)?;
				Ok(Value::BitString { unused_bits, bytes })
			}
			TypeBody::OctetString => {
				let mut bytes = Vec::new();
				collect_octets(&tlv, &mut bytes, depth)?;
				Ok(Value::Bytes(bytes))
			}
			TypeBody::ObjectIdentifier => Ok(Value::Oid(decode_oid(primitive(&tlv, "OBJECT IDENTIFIER")?)?)),
			TypeBody::RelativeOid => {
				let arcs = decode_arcs(primitive(&tlv, "RELATIVE-OID")?, "RELATIVE-OID")?;
				Ok(Value::Oid(join_arcs(&arcs)))
			}
			TypeBody::String(kind) => {
				let mut bytes = Vec::new();
				collect_octets(&tlv, &mut bytes, depth)?;
				Ok(Value::Text(decode_text(*kind, bytes)?))
			}
			TypeBody::UtcTime | TypeBody::GeneralizedTime => {
				let mut bytes = Vec::new();
				collect_octets(&tlv, &mut bytes, depth)?;
				let text = String::from_utf8(bytes).map_err(|_| DecodeError::invalid("time", "not ASCII"))?;
				Ok(Value::Time(text))
			}
			TypeBody::Sequence(fields) => self.decode_sequence(fields, tlv, owner, depth),
			TypeBody::Set(fields) => self.decode_set(fields, tlv, owner, depth),
			TypeBody::SequenceOf(element) | TypeBody::SetOf(element) => {
				constructed(&tlv)?;
				let mut items = Vec::new();
				for child in tlv.children() {
					items.push(self.decode_type(element, child?, false, owner, depth + 1)?);
				}
				Ok(Value::List(items))
			}
			TypeBody::Choice(_) | TypeBody::Any | TypeBody::Reference(_) => {
				Err(DecodeError::invalid("type", "body has no content encoding of its own"))
			}
		}
	}

	fn decode_sequence(&self, fields: &[Field], tlv: Tlv<'_>, owner: &str, depth: usize) -> Result<Value> {
		constructed(&tlv)?;
		let mut children = tlv.children();
		let mut out = Vec::with_capacity(fields.len());

		for field in fields {
			let next = children.peek_tlv()?;
			if let Some(child) = next
				&& self.leading(&field.ty)?.contains(child.tag)
			{
				children.read_tlv()?;
				let value = self.decode_type(&field.ty, child, false, owner, depth + 1)?;
				out.push((field.name.clone(), value));
			} else if field.presence.is_required() {
				return Err(DecodeError::MissingField {
					type_name: owner.to_string(),
					field: field.name.clone(),
				});
			}
		}

		if !children.is_empty() {
			trace!(type_name = owner, remaining = children.remaining(), "Skipping unknown trailing components");
		}
		Ok(Value::Record(out))
	}

	fn decode_set(&self, fields: &[Field], tlv: Tlv<'_>, owner: &str, depth: usize) -> Result<Value> {
		constructed(&tlv)?;
		let mut leading = Vec::with_capacity(fields.len());
		for field in fields {
			leading.push(self.leading(&field.ty)?);
		}

		let mut found: Vec<Option<Value>> = vec![None; fields.len()];
		for child in tlv.children() {
			let child = child?;
			let Some(index) = leading.iter().position(|tags| tags.contains(child.tag)) else {
				trace!(type_name = owner, tag = %child.tag, "Skipping unknown SET component");
				continue;
			};
			if found[index].is_some() {
				return Err(DecodeError::DuplicateField {
					type_name: owner.to_string(),
					field: fields[index].name.clone(),
				});
			}
			found[index] = Some(self.decode_type(&fields[index].ty, child, false, owner, depth + 1)?);
		}

		let mut out = Vec::with_capacity(fields.len());
		for (field, value) in fields.iter().zip(found) {
			match value {
				Some(value) => out.push((field.name.clone(), value)),
				None if field.presence.is_required() => {
					return Err(DecodeError::MissingField {
						type_name: owner.to_string(),
						field: field.name.clone(),
					});
				}
				None => {}
			}
		}
		Ok(Value::Record(out))
	}
}

fn primitive<'a>(tlv: &Tlv<'a>, kind: &'static str) -> Result<&'a [u8]> {
	if tlv.constructed {
		return Err(DecodeError::invalid(kind, "constructed form is not allowed"));
	}
	Ok(tlv.contents)
}

fn constructed(tlv: &Tlv<'_>) -> Result<()> {
	if tlv.constructed {
		Ok(())
	} else {
		Err(DecodeError::ExpectedConstructed(tlv.tag))
	}
}

fn decode_integer(contents: &[u8]) -> Result<i64> {
	let Some(first) = contents.first() else {
		return Err(DecodeError::invalid("INTEGER", "empty contents"));
	};
	if contents.len() > 8 {
		return Err(DecodeError::IntegerOverflow);
	}
	let mut value: i64 = if first & 0x80 != 0 { -1 } else { 0 };
	for b in contents {
		value = (value << 8) | i64::from(*b);
	}
	Ok(value)
}

fn decode_arcs(contents: &[u8], kind: &'static str) -> Result<Vec<u64>> {
	if contents.is_empty() {
		return Err(DecodeError::invalid(kind, "empty contents"));
	}
	let mut arcs = Vec::new();
	let mut current: u64 = 0;
	let mut pending = false;
	for b in contents {
		if current > (u64::MAX >> 7) {
			return Err(DecodeError::invalid(kind, "subidentifier does not fit in 64 bits"));
		}
		current = (current << 7) | u64::from(b & 0x7f);
		pending = true;
		if b & 0x80 == 0 {
			arcs.push(current);
			current = 0;
			pending = false;
		}
	}
	if pending {
		return Err(DecodeError::invalid(kind, "unterminated subidentifier"));
	}
	Ok(arcs)
}

fn decode_oid(contents: &[u8]) -> Result<String> {
	let arcs = decode_arcs(contents, "OBJECT IDENTIFIER")?;
	let first = arcs[0];
	let (a, b) = match first {
		0..40 => (0, first),
		40..80 => (1, first - 40),
		_ => (2, first - 80),
	};
	let mut all = vec![a, b];
	all.extend_from_slice(&arcs[1..]);
	Ok(join_arcs(&all))
}

fn join_arcs(arcs: &[u64]) -> String {
	arcs.iter().map(u64::to_string).collect::<Vec<_>>().join(".")
}

fn collect_octets(tlv: &Tlv<'_>, out: &mut Vec<u8>, depth: usize) -> Result<()> {
	if depth > MAX_DEPTH {
		return Err(DecodeError::TooDeep(MAX_DEPTH));
	}
	if !tlv.constructed {
		out.extend_from_slice(tlv.contents);
		return Ok(());
	}
	for segment in tlv.children() {
		collect_octets(&segment?, out, depth + 1)?;
	}
	Ok(())
}

fn collect_bits(tlv: &Tlv<'_>, out: &mut Vec<u8>, unused_bits: &mut u8, depth: usize) -> Result<()> {
	if depth > MAX_DEPTH {
		return Err(DecodeError::TooDeep(MAX_DEPTH));
	}
	if tlv.constructed {
		for segment in tlv.children() {
			collect_bits(&segment?, out, unused_bits, depth + 1)?;
		}
		return Ok(());
	}

	if *unused_bits != 0 {
		return Err(DecodeError::invalid("BIT STRING", "unused bits in a non-final segment"));
	}
	let Some((&unused, rest)) = tlv.contents.split_first() else {
		return Err(DecodeError::invalid("BIT STRING", "missing unused-bits octet"));
	};
	if unused > 7 || (rest.is_empty() && unused != 0) {
		return Err(DecodeError::invalid("BIT STRING", format!("bad unused-bits count {unused}")));
	}
	out.extend_from_slice(rest);
	*unused_bits = unused;
	Ok(())
}

fn decode_text(kind: StringKind, bytes: Vec<u8>) -> Result<String> {
	match kind {
		StringKind::Utf8 => String::from_utf8(bytes).map_err(|e| DecodeError::invalid("UTF8String", e.to_string())),
		StringKind::Bmp => {
			if bytes.len() % 2 != 0 {
				return Err(DecodeError::invalid("BMPString", "odd number of octets"));
			}
			let units: Vec<u16> = bytes.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
			String::from_utf16(&units).map_err(|e| DecodeError::invalid("BMPString", e.to_string()))
		}
		StringKind::Universal => {
			if bytes.len() % 4 != 0 {
				return Err(DecodeError::invalid("UniversalString", "length is not a multiple of 4"));
			}
			bytes
				.chunks_exact(4)
				.map(|c| {
					let code = u32::from_be_bytes([c[0], c[1], c[2], c[3]]);
					char::from_u32(code).ok_or_else(|| DecodeError::invalid("UniversalString", format!("invalid code point {code:#x}")))
				})
				.collect()
		}
		StringKind::Numeric | StringKind::Printable | StringKind::Ia5 | StringKind::Visible => {
			if !bytes.is_ascii() {
				return Err(DecodeError::invalid("character string", "non-ASCII octet in an ASCII string type"));
			}
			Ok(bytes.into_iter().map(char::from).collect())
		}
		StringKind::Teletex | StringKind::Videotex | StringKind::Graphic | StringKind::General | StringKind::ObjectDescriptor => {
			Ok(bytes.into_iter().map(char::from).collect())
		}
	}
}
