//! Type generation: module registry to source artifacts.
//!
//! Every type assignment of every registered module becomes one source
//! artifact, a pretty-printed JSON [`CompiledType`] at
//! `<out>/<package path>/<TypeName>.asnd`. References are resolved to
//! canonical names here, and the module tagging environment is applied, so
//! artifacts carry fully explicit tag layers. A reference into a module that
//! was not parsed is accepted when the classpath already holds the type.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use asnrd_decoder::unit::source_path;
use asnrd_decoder::{CompiledType, Field, NamedNumber, Presence, StringKind, Tag, TagClass, TagLayer, TagMode, TypeBody, TypeDescriptor};
use asnrd_schema::model::{self as asn, AsnType, Module, TagDefault, TypeAssignment, TypeKind};
use asnrd_schema::ModuleRegistry;
use thiserror::Error;
use tracing::{debug, info};

use crate::classpath::Classpath;
use crate::naming::canonical_name;

/// Alias chains longer than this are treated as cycles.
const MAX_ALIAS_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum GenerationError {
	#[error("{module}.{type_name}: cannot resolve type reference `{reference}`")]
	UnresolvedReference {
		module: String,
		type_name: String,
		reference: String,
	},

	#[error("module {module} imports from unknown module {import}")]
	UnknownImportModule { module: String, import: String },

	#[error("{module}.{type_name}: unsupported construct {construct}")]
	UnsupportedConstruct {
		module: String,
		type_name: String,
		construct: String,
	},

	#[error("{first} and {second} both generate {canonical}")]
	NameCollision {
		canonical: String,
		first: String,
		second: String,
	},

	#[error("cannot serialize {canonical}: {source}")]
	Serialize {
		canonical: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("cannot write {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

/// Source artifacts written by one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedSources {
	pub files: Vec<PathBuf>,
	/// Canonical names, in generation order.
	pub types: Vec<String>,
}

impl GeneratedSources {
	pub fn is_empty(&self) -> bool {
		self.files.is_empty()
	}
}

/// Produces source artifacts for a complete module registry.
pub trait TypeGenerator: Send + Sync + fmt::Debug {
	fn generate(&self, registry: &ModuleRegistry, out: &Path, classpath: &Classpath) -> Result<GeneratedSources, GenerationError>;
}

/// Writes one JSON type descriptor per type assignment.
#[derive(Debug, Default, Clone, Copy)]
pub struct DescriptorGenerator;

/// The assignment being generated, for error reporting and name lookup.
#[derive(Clone, Copy)]
struct Context<'a> {
	registry: &'a ModuleRegistry,
	classpath: &'a Classpath,
	module: &'a Module,
	type_name: &'a str,
}

/// What a type reference points at.
enum Target<'a> {
	/// An assignment of a parsed module.
	Assignment(&'a Module, &'a TypeAssignment),
	/// A unit already compiled onto the classpath.
	Compiled(Arc<CompiledType>),
}

impl<'a> Context<'a> {
	fn unresolved(&self, reference: String) -> GenerationError {
		GenerationError::UnresolvedReference {
			module: self.module.name.clone(),
			type_name: self.type_name.to_string(),
			reference,
		}
	}

	/// Finds what a reference written in this module points at.
	fn resolve(&self, module: Option<&str>, name: &str) -> Result<Target<'a>, GenerationError> {
		let target_module = match module {
			Some(explicit) => explicit,
			None => {
				if let Some(local) = self.module.type_named(name) {
					return Ok(Target::Assignment(self.module, local));
				}
				self.module.import_source(name).ok_or_else(|| self.unresolved(name.to_string()))?
			}
		};

		let Some(target) = self.registry.get(target_module) else {
			let canonical = canonical_name(target_module, name);
			return match self.classpath.lookup(&canonical) {
				Some(ty) => Ok(Target::Compiled(ty)),
				None => Err(GenerationError::UnknownImportModule {
					module: self.module.name.clone(),
					import: target_module.to_string(),
				}),
			};
		};
		let assignment = target
			.type_named(name)
			.ok_or_else(|| self.unresolved(format!("{target_module}.{name}")))?;
		Ok(Target::Assignment(target, assignment))
	}

	fn in_module(&self, module: &'a Module) -> Self {
		Self { module, ..*self }
	}

	/// Whether a type is an untagged CHOICE or ANY, possibly behind aliases.
	/// Tags on such types are always explicit.
	fn is_choice_like(&self, kind: &TypeKind, depth: usize) -> Result<bool, GenerationError> {
		match kind {
			TypeKind::Choice(_) | TypeKind::Any => Ok(true),
			TypeKind::Reference { module, name } if depth < MAX_ALIAS_DEPTH => match self.resolve(module.as_deref(), name)? {
				Target::Assignment(_, target) if !target.ty.tags.is_empty() => Ok(false),
				Target::Assignment(target_module, target) => self.in_module(target_module).is_choice_like(&target.ty.kind, depth + 1),
				Target::Compiled(ty) => Ok(ty.descriptor.tags.is_empty() && matches!(ty.descriptor.body, TypeBody::Choice(_) | TypeBody::Any)),
			},
			_ => Ok(false),
		}
	}

	fn convert(&self, ty: &AsnType) -> Result<TypeDescriptor, GenerationError> {
		let body = self.convert_kind(&ty.kind)?;
		let choice_like = !ty.tags.is_empty() && self.is_choice_like(&ty.kind, 0)?;

		let mut descriptor = TypeDescriptor::new(body);
		for (i, spec) in ty.tags.iter().enumerate() {
			let innermost = i + 1 == ty.tags.len();
			let mode = match spec.mode {
				Some(asn::TagMode::Explicit) => TagMode::Explicit,
				_ if innermost && choice_like => TagMode::Explicit,
				Some(asn::TagMode::Implicit) => TagMode::Implicit,
				None => match self.module.tag_default {
					TagDefault::Explicit => TagMode::Explicit,
					TagDefault::Implicit | TagDefault::Automatic => TagMode::Implicit,
				},
			};
			descriptor.tags.push(TagLayer {
				tag: Tag::new(tag_class(spec.class), spec.number),
				mode,
			});
		}
		Ok(descriptor)
	}

	fn convert_kind(&self, kind: &TypeKind) -> Result<TypeBody, GenerationError> {
		Ok(match kind {
			TypeKind::Boolean => TypeBody::Boolean,
			TypeKind::Integer(named) => TypeBody::Integer {
				named: named_numbers(named),
			},
			TypeKind::Enumerated(items) => TypeBody::Enumerated {
				items: named_numbers(items),
			},
			TypeKind::Null => TypeBody::Null,
			TypeKind::BitString => TypeBody::BitString,
			TypeKind::OctetString => TypeBody::OctetString,
			TypeKind::ObjectIdentifier => TypeBody::ObjectIdentifier,
			TypeKind::RelativeOid => TypeBody::RelativeOid,
			TypeKind::Real => {
				return Err(GenerationError::UnsupportedConstruct {
					module: self.module.name.clone(),
					type_name: self.type_name.to_string(),
					construct: "REAL".to_string(),
				});
			}
			TypeKind::CharacterString(kind) => TypeBody::String(string_kind(*kind)),
			TypeKind::UtcTime => TypeBody::UtcTime,
			TypeKind::GeneralizedTime => TypeBody::GeneralizedTime,
			TypeKind::Any => TypeBody::Any,
			TypeKind::Sequence(components) => TypeBody::Sequence(self.fields(components)?),
			TypeKind::Set(components) => TypeBody::Set(self.fields(components)?),
			TypeKind::Choice(components) => TypeBody::Choice(self.fields(components)?),
			TypeKind::SequenceOf(element) => TypeBody::SequenceOf(Box::new(self.convert(element)?)),
			TypeKind::SetOf(element) => TypeBody::SetOf(Box::new(self.convert(element)?)),
			TypeKind::Reference { module, name } => match self.resolve(module.as_deref(), name)? {
				Target::Assignment(target_module, target) => TypeBody::Reference(canonical_name(&target_module.name, &target.name)),
				Target::Compiled(ty) => TypeBody::Reference(ty.canonical_name.clone()),
			},
		})
	}

	/// Converts components, applying automatic tagging when the module asks
	/// for it and no component is tagged.
	fn fields(&self, components: &[asn::Component]) -> Result<Vec<Field>, GenerationError> {
		let automatic = self.module.tag_default == TagDefault::Automatic && components.iter().all(|c| c.ty.tags.is_empty());

		let mut fields = Vec::with_capacity(components.len());
		for (index, component) in components.iter().enumerate() {
			let ty = if automatic {
				let mut tagged = component.ty.clone();
				tagged.tags.insert(
					0,
					asn::TagSpec {
						class: asn::TagClass::Context,
						number: index as u32,
						mode: None,
					},
				);
				self.convert(&tagged)?
			} else {
				self.convert(&component.ty)?
			};
			fields.push(Field {
				name: component.name.clone(),
				ty,
				presence: match &component.presence {
					asn::Presence::Required => Presence::Required,
					asn::Presence::Optional => Presence::Optional,
					asn::Presence::Default(value) => Presence::Default(value.clone()),
				},
			});
		}
		Ok(fields)
	}
}

fn tag_class(class: asn::TagClass) -> TagClass {
	match class {
		asn::TagClass::Universal => TagClass::Universal,
		asn::TagClass::Application => TagClass::Application,
		asn::TagClass::Context => TagClass::Context,
		asn::TagClass::Private => TagClass::Private,
	}
}

fn named_numbers(items: &[asn::NamedNumber]) -> Vec<NamedNumber> {
	items
		.iter()
		.map(|n| NamedNumber {
			name: n.name.clone(),
			value: n.value,
		})
		.collect()
}

fn string_kind(kind: asn::CharacterString) -> StringKind {
	match kind {
		asn::CharacterString::Utf8 => StringKind::Utf8,
		asn::CharacterString::Numeric => StringKind::Numeric,
		asn::CharacterString::Printable => StringKind::Printable,
		asn::CharacterString::Teletex => StringKind::Teletex,
		asn::CharacterString::Videotex => StringKind::Videotex,
		asn::CharacterString::Ia5 => StringKind::Ia5,
		asn::CharacterString::Graphic => StringKind::Graphic,
		asn::CharacterString::Visible => StringKind::Visible,
		asn::CharacterString::General => StringKind::General,
		asn::CharacterString::Universal => StringKind::Universal,
		asn::CharacterString::Bmp => StringKind::Bmp,
		asn::CharacterString::ObjectDescriptor => StringKind::ObjectDescriptor,
	}
}

impl DescriptorGenerator {
	/// Builds the compiled form of one assignment without writing anything.
	pub fn describe(
		&self,
		registry: &ModuleRegistry,
		classpath: &Classpath,
		module: &Module,
		assignment: &TypeAssignment,
	) -> Result<CompiledType, GenerationError> {
		let ctx = Context {
			registry,
			classpath,
			module,
			type_name: &assignment.name,
		};
		Ok(CompiledType {
			canonical_name: canonical_name(&module.name, &assignment.name),
			module: module.name.clone(),
			name: assignment.name.clone(),
			descriptor: ctx.convert(&assignment.ty)?,
		})
	}
}

impl TypeGenerator for DescriptorGenerator {
	fn generate(&self, registry: &ModuleRegistry, out: &Path, classpath: &Classpath) -> Result<GeneratedSources, GenerationError> {
		let mut origins: HashMap<String, String> = HashMap::new();
		let mut generated = GeneratedSources::default();

		for module in registry.iter() {
			for assignment in &module.types {
				let ty = self.describe(registry, classpath, module, assignment)?;

				let origin = format!("{}.{}", module.name, assignment.name);
				if let Some(first) = origins.insert(ty.canonical_name.clone(), origin.clone()) {
					return Err(GenerationError::NameCollision {
						canonical: ty.canonical_name,
						first,
						second: origin,
					});
				}

				let path = source_path(out, &ty.canonical_name);
				if let Some(dir) = path.parent() {
					std::fs::create_dir_all(dir).map_err(|source| GenerationError::Io {
						path: dir.to_path_buf(),
						source,
					})?;
				}
				let json = serde_json::to_string_pretty(&ty).map_err(|source| GenerationError::Serialize {
					canonical: ty.canonical_name.clone(),
					source,
				})?;
				std::fs::write(&path, json).map_err(|source| GenerationError::Io {
					path: path.clone(),
					source,
				})?;

				debug!(source = %path.display(), "Generated type source");
				generated.files.push(path);
				generated.types.push(ty.canonical_name);
			}
		}

		info!(
			modules = registry.len(),
			types = generated.types.len(),
			output = %out.display(),
			"Generated ASN.1 type sources"
		);
		Ok(generated)
	}
}
