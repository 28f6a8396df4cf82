//! Decodable type descriptors.
//!
//! A [`CompiledType`] is what the type generator writes as a source artifact
//! and what the artifact builder serializes into a unit. Descriptors reference
//! other types by canonical name only, so a unit can be loaded on its own and
//! its references resolved lazily through a [`TypeLoader`](crate::TypeLoader).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A generated type addressable by its canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledType {
	/// Fully-qualified name, e.g. `my.module.MyType`.
	pub canonical_name: String,
	/// ASN.1 module the type was defined in, as written in the schema.
	pub module: String,
	/// Type name as written in the schema.
	pub name: String,
	pub descriptor: TypeDescriptor,
}

/// Tag class of a BER identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TagClass {
	Universal,
	Application,
	Context,
	Private,
}

impl TagClass {
	pub fn from_bits(bits: u8) -> Self {
		match bits & 0b11 {
			0 => TagClass::Universal,
			1 => TagClass::Application,
			2 => TagClass::Context,
			_ => TagClass::Private,
		}
	}
}

/// A BER tag: class plus number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
	pub class: TagClass,
	pub number: u32,
}

impl Tag {
	pub const BOOLEAN: Tag = Tag::universal(1);
	pub const INTEGER: Tag = Tag::universal(2);
	pub const BIT_STRING: Tag = Tag::universal(3);
	pub const OCTET_STRING: Tag = Tag::universal(4);
	pub const NULL: Tag = Tag::universal(5);
	pub const OBJECT_IDENTIFIER: Tag = Tag::universal(6);
	pub const OBJECT_DESCRIPTOR: Tag = Tag::universal(7);
	pub const ENUMERATED: Tag = Tag::universal(10);
	pub const UTF8_STRING: Tag = Tag::universal(12);
	pub const RELATIVE_OID: Tag = Tag::universal(13);
	pub const SEQUENCE: Tag = Tag::universal(16);
	pub const SET: Tag = Tag::universal(17);
	pub const NUMERIC_STRING: Tag = Tag::universal(18);
	pub const PRINTABLE_STRING: Tag = Tag::universal(19);
	pub const TELETEX_STRING: Tag = Tag::universal(20);
	pub const VIDEOTEX_STRING: Tag = Tag::universal(21);
	pub const IA5_STRING: Tag = Tag::universal(22);
	pub const UTC_TIME: Tag = Tag::universal(23);
	pub const GENERALIZED_TIME: Tag = Tag::universal(24);
	pub const GRAPHIC_STRING: Tag = Tag::universal(25);
	pub const VISIBLE_STRING: Tag = Tag::universal(26);
	pub const GENERAL_STRING: Tag = Tag::universal(27);
	pub const UNIVERSAL_STRING: Tag = Tag::universal(28);
	pub const BMP_STRING: Tag = Tag::universal(30);

	pub const fn new(class: TagClass, number: u32) -> Self {
		Self { class, number }
	}

	pub const fn universal(number: u32) -> Self {
		Self::new(TagClass::Universal, number)
	}

	pub const fn context(number: u32) -> Self {
		Self::new(TagClass::Context, number)
	}
}

impl fmt::Display for Tag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.class {
			TagClass::Universal => write!(f, "[UNIVERSAL {}]", self.number),
			TagClass::Application => write!(f, "[APPLICATION {}]", self.number),
			TagClass::Context => write!(f, "[{}]", self.number),
			TagClass::Private => write!(f, "[PRIVATE {}]", self.number),
		}
	}
}

/// Whether a tag replaces the inner identifier or wraps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagMode {
	Explicit,
	Implicit,
}

/// One tag applied on top of a type, outermost first in [`TypeDescriptor::tags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagLayer {
	pub tag: Tag,
	pub mode: TagMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
	/// Tag layers, outermost first. Empty means the body's own tag is used.
	#[serde(default)]
	pub tags: Vec<TagLayer>,
	pub body: TypeBody,
}

impl TypeDescriptor {
	pub fn new(body: TypeBody) -> Self {
		Self {
			tags: Vec::new(),
			body,
		}
	}

	pub fn tagged(mut self, tag: Tag, mode: TagMode) -> Self {
		self.tags.insert(0, TagLayer { tag, mode });
		self
	}

	pub fn reference(canonical: impl Into<String>) -> Self {
		Self::new(TypeBody::Reference(canonical.into()))
	}

	/// Calls `f` for every canonical name referenced anywhere in this descriptor.
	pub fn for_each_reference(&self, f: &mut dyn FnMut(&str)) {
		match &self.body {
			TypeBody::Reference(target) => f(target),
			TypeBody::Sequence(fields) | TypeBody::Set(fields) | TypeBody::Choice(fields) => {
				for field in fields {
					field.ty.for_each_reference(f);
				}
			}
			TypeBody::SequenceOf(element) | TypeBody::SetOf(element) => element.for_each_reference(f),
			_ => {}
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedNumber {
	pub name: String,
	pub value: i64,
}

/// Restricted character string types and how their content octets are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringKind {
	Utf8,
	Numeric,
	Printable,
	Teletex,
	Videotex,
	Ia5,
	Graphic,
	Visible,
	General,
	Universal,
	Bmp,
	ObjectDescriptor,
}

impl StringKind {
	pub fn tag(self) -> Tag {
		match self {
			StringKind::Utf8 => Tag::UTF8_STRING,
			StringKind::Numeric => Tag::NUMERIC_STRING,
			StringKind::Printable => Tag::PRINTABLE_STRING,
			StringKind::Teletex => Tag::TELETEX_STRING,
			StringKind::Videotex => Tag::VIDEOTEX_STRING,
			StringKind::Ia5 => Tag::IA5_STRING,
			StringKind::Graphic => Tag::GRAPHIC_STRING,
			StringKind::Visible => Tag::VISIBLE_STRING,
			StringKind::General => Tag::GENERAL_STRING,
			StringKind::Universal => Tag::UNIVERSAL_STRING,
			StringKind::Bmp => Tag::BMP_STRING,
			StringKind::ObjectDescriptor => Tag::OBJECT_DESCRIPTOR,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
	Required,
	Optional,
	/// Absent on the wire means the schema default; the literal is kept for display.
	Default(String),
}

impl Presence {
	pub fn is_required(&self) -> bool {
		matches!(self, Presence::Required)
	}
}

/// A named component of a SEQUENCE or SET, or an alternative of a CHOICE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
	pub name: String,
	pub ty: TypeDescriptor,
	pub presence: Presence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeBody {
	Boolean,
	Integer { named: Vec<NamedNumber> },
	Enumerated { items: Vec<NamedNumber> },
	Null,
	BitString,
	OctetString,
	ObjectIdentifier,
	RelativeOid,
	String(StringKind),
	UtcTime,
	GeneralizedTime,
	Sequence(Vec<Field>),
	Set(Vec<Field>),
	SequenceOf(Box<TypeDescriptor>),
	SetOf(Box<TypeDescriptor>),
	Choice(Vec<Field>),
	/// Open type; decoded as raw TLV bytes.
	Any,
	/// Another compiled type, by canonical name.
	Reference(String),
}

impl TypeBody {
	/// The universal tag carried by this body when untagged.
	///
	/// `None` for bodies without an own tag: CHOICE, ANY and references.
	pub fn natural_tag(&self) -> Option<Tag> {
		Some(match self {
			TypeBody::Boolean => Tag::BOOLEAN,
			TypeBody::Integer { .. } => Tag::INTEGER,
			TypeBody::Enumerated { .. } => Tag::ENUMERATED,
			TypeBody::Null => Tag::NULL,
			TypeBody::BitString => Tag::BIT_STRING,
			TypeBody::OctetString => Tag::OCTET_STRING,
			TypeBody::ObjectIdentifier => Tag::OBJECT_IDENTIFIER,
			TypeBody::RelativeOid => Tag::RELATIVE_OID,
			TypeBody::String(kind) => kind.tag(),
			TypeBody::UtcTime => Tag::UTC_TIME,
			TypeBody::GeneralizedTime => Tag::GENERALIZED_TIME,
			TypeBody::Sequence(_) | TypeBody::SequenceOf(_) => Tag::SEQUENCE,
			TypeBody::Set(_) | TypeBody::SetOf(_) => Tag::SET,
			TypeBody::Choice(_) | TypeBody::Any | TypeBody::Reference(_) => return None,
		})
	}
}

/// The set of identifiers a value of some type may start with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadingTags {
	/// Any identifier (open type).
	Any,
	Tags(Vec<Tag>),
}

impl LeadingTags {
	pub fn contains(&self, tag: Tag) -> bool {
		match self {
			LeadingTags::Any => true,
			LeadingTags::Tags(tags) => tags.contains(&tag),
		}
	}
}

/// Why the leading tags of a descriptor could not be computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadingTagError {
	/// A referenced type could not be found.
	Unresolved(String),
	/// Untagged references loop back onto themselves.
	Cycle(String),
}

/// Computes the identifiers a value of `descriptor` can start with.
///
/// `lookup` resolves referenced canonical names; untagged references and
/// CHOICE alternatives are followed until a tag is found.
pub fn leading_tags(
	descriptor: &TypeDescriptor,
	lookup: &mut dyn FnMut(&str) -> Option<Arc<CompiledType>>,
) -> Result<LeadingTags, LeadingTagError> {
	let mut visiting = Vec::new();
	leading_tags_inner(descriptor, lookup, &mut visiting)
}

fn leading_tags_inner(
	descriptor: &TypeDescriptor,
	lookup: &mut dyn FnMut(&str) -> Option<Arc<CompiledType>>,
	visiting: &mut Vec<String>,
) -> Result<LeadingTags, LeadingTagError> {
	if let Some(layer) = descriptor.tags.first() {
		return Ok(LeadingTags::Tags(vec![layer.tag]));
	}
	if let Some(tag) = descriptor.body.natural_tag() {
		return Ok(LeadingTags::Tags(vec![tag]));
	}

	match &descriptor.body {
		TypeBody::Any => Ok(LeadingTags::Any),
		TypeBody::Reference(target) => {
			if visiting.iter().any(|v| v == target) {
				return Err(LeadingTagError::Cycle(target.clone()));
			}
			let resolved = lookup(target).ok_or_else(|| LeadingTagError::Unresolved(target.clone()))?;
			visiting.push(target.clone());
			let result = leading_tags_inner(&resolved.descriptor, lookup, visiting);
			visiting.pop();
			result
		}
		TypeBody::Choice(alternatives) => {
			let mut tags = Vec::new();
			for alternative in alternatives {
				match leading_tags_inner(&alternative.ty, lookup, visiting)? {
					LeadingTags::Any => return Ok(LeadingTags::Any),
					LeadingTags::Tags(inner) => tags.extend(inner),
				}
			}
			Ok(LeadingTags::Tags(tags))
		}
		_ => unreachable!("bodies with a natural tag are handled above"),
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	fn compiled(name: &str, descriptor: TypeDescriptor) -> Arc<CompiledType> {
		Arc::new(CompiledType {
			canonical_name: name.to_string(),
			module: "M".to_string(),
			name: name.rsplit('.').next().unwrap_or(name).to_string(),
			descriptor,
		})
	}

	#[test]
	fn test_explicit_layer_wins_over_body_tag() {
		let desc = TypeDescriptor::new(TypeBody::Boolean).tagged(Tag::context(3), TagMode::Explicit);
		let tags = leading_tags(&desc, &mut |_| None).unwrap();
		assert_eq!(tags, LeadingTags::Tags(vec![Tag::context(3)]));
	}

	#[test]
	fn test_choice_collects_alternative_tags_through_references() {
		let mut types = HashMap::new();
		types.insert("m.Inner".to_string(), compiled("m.Inner", TypeDescriptor::new(TypeBody::OctetString)));

		let desc = TypeDescriptor::new(TypeBody::Choice(vec![
			Field {
				name: "a".into(),
				ty: TypeDescriptor::new(TypeBody::Integer { named: vec![] }),
				presence: Presence::Required,
			},
			Field {
				name: "b".into(),
				ty: TypeDescriptor::reference("m.Inner"),
				presence: Presence::Required,
			},
		]));

		let tags = leading_tags(&desc, &mut |name| types.get(name).cloned()).unwrap();
		assert_eq!(tags, LeadingTags::Tags(vec![Tag::INTEGER, Tag::OCTET_STRING]));
	}

	#[test]
	fn test_untagged_self_reference_is_a_cycle() {
		let mut types = HashMap::new();
		types.insert("m.Loop".to_string(), compiled("m.Loop", TypeDescriptor::reference("m.Loop")));

		let err = leading_tags(&TypeDescriptor::reference("m.Loop"), &mut |name| types.get(name).cloned()).unwrap_err();
		assert_eq!(err, LeadingTagError::Cycle("m.Loop".into()));
	}

	#[test]
	fn test_missing_reference_is_reported() {
		let err = leading_tags(&TypeDescriptor::reference("m.Nope"), &mut |_| None).unwrap_err();
		assert_eq!(err, LeadingTagError::Unresolved("m.Nope".into()));
	}
}
