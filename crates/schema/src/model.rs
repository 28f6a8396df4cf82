//! In-memory module model produced by the parser.

use std::path::PathBuf;

/// Module-wide tagging environment from the `DEFINITIONS` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagDefault {
	#[default]
	Explicit,
	Implicit,
	Automatic,
}

/// One parsed ASN.1 module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
	pub name: String,
	pub tag_default: TagDefault,
	pub extensibility_implied: bool,
	pub imports: Vec<Import>,
	/// Type assignments in source order.
	pub types: Vec<TypeAssignment>,
	/// File the module was read from, if any.
	pub source: Option<PathBuf>,
}

impl Module {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			tag_default: TagDefault::default(),
			extensibility_implied: false,
			imports: Vec::new(),
			types: Vec::new(),
			source: None,
		}
	}

	pub fn type_named(&self, name: &str) -> Option<&TypeAssignment> {
		self.types.iter().find(|t| t.name == name)
	}

	/// Module that `symbol` is imported from, if it is imported.
	pub fn import_source(&self, symbol: &str) -> Option<&str> {
		self.imports
			.iter()
			.find(|i| i.symbols.iter().any(|s| s == symbol))
			.map(|i| i.module.as_str())
	}
}

/// `symbols FROM module`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
	pub module: String,
	pub symbols: Vec<String>,
}

/// `Name ::= Type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAssignment {
	pub name: String,
	pub ty: AsnType,
	/// 1-based line of the assignment.
	pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
	Universal,
	Application,
	Context,
	Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMode {
	Explicit,
	Implicit,
}

/// `[CLASS n] IMPLICIT|EXPLICIT` as written. `mode` is `None` when the
/// module's tag default applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpec {
	pub class: TagClass,
	pub number: u32,
	pub mode: Option<TagMode>,
}

/// A type with the tags written in front of it, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsnType {
	pub tags: Vec<TagSpec>,
	pub kind: TypeKind,
}

impl AsnType {
	pub fn new(kind: TypeKind) -> Self {
		Self { tags: Vec::new(), kind }
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedNumber {
	pub name: String,
	pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterString {
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

impl CharacterString {
	pub fn from_keyword(word: &str) -> Option<Self> {
		Some(match word {
			"UTF8String" => Self::Utf8,
			"NumericString" => Self::Numeric,
			"PrintableString" => Self::Printable,
			"TeletexString" | "T61String" => Self::Teletex,
			"VideotexString" => Self::Videotex,
			"IA5String" => Self::Ia5,
			"GraphicString" => Self::Graphic,
			"VisibleString" | "ISO646String" => Self::Visible,
			"GeneralString" => Self::General,
			"UniversalString" => Self::Universal,
			"BMPString" => Self::Bmp,
			"ObjectDescriptor" => Self::ObjectDescriptor,
			_ => return None,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
	Required,
	Optional,
	/// Default value, kept as source text.
	Default(String),
}

/// Named component of a SEQUENCE or SET, or alternative of a CHOICE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
	pub name: String,
	pub ty: AsnType,
	pub presence: Presence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
	Boolean,
	Integer(Vec<NamedNumber>),
	Enumerated(Vec<NamedNumber>),
	Null,
	BitString,
	OctetString,
	ObjectIdentifier,
	RelativeOid,
	Real,
	CharacterString(CharacterString),
	UtcTime,
	GeneralizedTime,
	Any,
	Sequence(Vec<Component>),
	Set(Vec<Component>),
	SequenceOf(Box<AsnType>),
	SetOf(Box<AsnType>),
	Choice(Vec<Component>),
	/// `Type` or `Module.Type`.
	Reference { module: Option<String>, name: String },
}
