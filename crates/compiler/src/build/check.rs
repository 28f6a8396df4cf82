//! Batch-wide consistency checks on parsed sources.

use std::sync::Arc;

use asnrd_decoder::descriptor::{LeadingTagError, LeadingTags, leading_tags};
use asnrd_decoder::{CompiledType, Field, Tag, TypeBody, TypeDescriptor};

use super::{Batch, Diagnostics};
use crate::classpath::Classpath;

type Lookup<'a> = dyn FnMut(&str) -> Option<Arc<CompiledType>> + 'a;

/// Records every problem with `ty` in `diagnostics`.
pub(super) fn check_type(ty: &CompiledType, batch: &Batch, classpath: &Classpath, diagnostics: &mut Diagnostics) {
	let owner = ty.canonical_name.as_str();

	ty.descriptor.for_each_reference(&mut |target| {
		if !batch.contains_key(target) && !classpath.contains(target) {
			diagnostics.push(format!("{owner}: cannot find symbol: {target}"));
		}
	});

	let mut lookup = |name: &str| batch.get(name).cloned().or_else(|| classpath.lookup(name));
	if let Err(LeadingTagError::Cycle(through)) = leading_tags(&ty.descriptor, &mut lookup) {
		diagnostics.push(format!("{owner}: cyclic type definition through {through}"));
	}
	check_descriptor(owner, &ty.descriptor, &mut lookup, diagnostics);
}

fn check_descriptor(owner: &str, descriptor: &TypeDescriptor, lookup: &mut Lookup<'_>, diagnostics: &mut Diagnostics) {
	let (construct, fields) = match &descriptor.body {
		TypeBody::Sequence(fields) => ("SEQUENCE", fields),
		TypeBody::Set(fields) => ("SET", fields),
		TypeBody::Choice(fields) => ("CHOICE", fields),
		TypeBody::SequenceOf(element) | TypeBody::SetOf(element) => {
			return check_descriptor(owner, element, lookup, diagnostics);
		}
		_ => return,
	};

	for (i, field) in fields.iter().enumerate() {
		if fields[..i].iter().any(|f| f.name == field.name) {
			diagnostics.push(format!("{owner}: duplicate {construct} component name `{}`", field.name));
		}
	}

	if construct == "SEQUENCE" {
		check_optional_runs(owner, fields, lookup, diagnostics);
	} else {
		check_distinct_tags(owner, construct, fields, lookup, diagnostics);
	}

	for field in fields {
		check_descriptor(owner, &field.ty, lookup, diagnostics);
	}
}

/// Leading tags of a component; unresolved names and cycles are reported elsewhere.
fn tags_of(ty: &TypeDescriptor, lookup: &mut Lookup<'_>) -> Option<LeadingTags> {
	leading_tags(ty, lookup).ok()
}

/// SET components and CHOICE alternatives must all start with different tags.
fn check_distinct_tags(owner: &str, construct: &str, fields: &[Field], lookup: &mut Lookup<'_>, diagnostics: &mut Diagnostics) {
	let mut seen: Vec<(Tag, &str)> = Vec::new();
	for field in fields {
		match tags_of(&field.ty, lookup) {
			Some(LeadingTags::Any) if fields.len() > 1 => {
				diagnostics.push(format!(
					"{owner}: {construct} component `{}` is an untagged open type and makes decoding ambiguous",
					field.name
				));
			}
			Some(LeadingTags::Tags(tags)) => {
				for tag in tags {
					match seen.iter().find(|(t, _)| *t == tag) {
						Some((_, other)) => {
							diagnostics.push(format!(
								"{owner}: {construct} components `{other}` and `{}` share tag {tag}",
								field.name
							));
						}
						None => seen.push((tag, field.name.as_str())),
					}
				}
			}
			_ => {}
		}
	}
}

/// An optional SEQUENCE component must not share a tag with any component
/// that may follow it, up to and including the next required one.
fn check_optional_runs(owner: &str, fields: &[Field], lookup: &mut Lookup<'_>, diagnostics: &mut Diagnostics) {
	let tags: Vec<Option<LeadingTags>> = fields.iter().map(|f| tags_of(&f.ty, lookup)).collect();

	for (i, field) in fields.iter().enumerate() {
		if field.presence.is_required() {
			continue;
		}
		let Some(LeadingTags::Tags(mine)) = &tags[i] else {
			continue;
		};
		for (j, next) in fields.iter().enumerate().skip(i + 1) {
			if let Some(LeadingTags::Tags(theirs)) = &tags[j]
				&& let Some(tag) = mine.iter().find(|t| theirs.contains(t))
			{
				diagnostics.push(format!(
					"{owner}: optional SEQUENCE component `{}` and following component `{}` share tag {tag}",
					field.name, next.name
				));
			}
			if next.presence.is_required() {
				break;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use asnrd_decoder::{Presence, TagMode};
	use pretty_assertions::assert_eq;

	use super::*;

	fn field(name: &str, ty: TypeDescriptor, presence: Presence) -> Field {
		Field {
			name: name.into(),
			ty,
			presence,
		}
	}

	fn compiled(name: &str, descriptor: TypeDescriptor) -> Arc<CompiledType> {
		Arc::new(CompiledType {
			canonical_name: name.into(),
			module: "M".into(),
			name: name.rsplit('.').next().unwrap().into(),
			descriptor,
		})
	}

	fn run(types: &[Arc<CompiledType>]) -> Vec<String> {
		let batch: Batch = types.iter().map(|t| (t.canonical_name.clone(), t.clone())).collect::<HashMap<_, _>>();
		let mut diagnostics = Diagnostics::default();
		for ty in types {
			check_type(ty, &batch, &Classpath::runtime(), &mut diagnostics);
		}
		diagnostics.iter().map(str::to_string).collect()
	}

	#[test]
	fn test_missing_symbol_is_reported_once_per_owner() {
		let rec = compiled(
			"m.Rec",
			TypeDescriptor::new(TypeBody::Sequence(vec![
				field("a", TypeDescriptor::reference("m.Gone").tagged(Tag::context(0), TagMode::Implicit), Presence::Required),
				field("b", TypeDescriptor::reference("m.Gone").tagged(Tag::context(1), TagMode::Implicit), Presence::Required),
			])),
		);
		assert_eq!(run(&[rec]), vec!["m.Rec: cannot find symbol: m.Gone"]);
	}

	#[test]
	fn test_alias_cycle() {
		let a = compiled("m.A", TypeDescriptor::reference("m.B"));
		let b = compiled("m.B", TypeDescriptor::reference("m.A"));
		assert_eq!(
			run(&[a, b]),
			vec![
				"m.A: cyclic type definition through m.B",
				"m.B: cyclic type definition through m.A",
			]
		);
	}

	#[test]
	fn test_ambiguous_choice_and_duplicate_names() {
		let pick = compiled(
			"m.Pick",
			TypeDescriptor::new(TypeBody::Choice(vec![
				field("x", TypeDescriptor::reference("asnrd.universal.Integer"), Presence::Required),
				field("x", TypeDescriptor::new(TypeBody::Integer { named: vec![] }), Presence::Required),
			])),
		);
		assert_eq!(
			run(&[pick]),
			vec![
				"m.Pick: duplicate CHOICE component name `x`",
				"m.Pick: CHOICE components `x` and `x` share tag [UNIVERSAL 2]",
			]
		);
	}

	#[test]
	fn test_optional_run_must_be_distinguishable() {
		let rec = compiled(
			"m.Rec",
			TypeDescriptor::new(TypeBody::Sequence(vec![
				field("a", TypeDescriptor::new(TypeBody::Boolean), Presence::Optional),
				field("b", TypeDescriptor::new(TypeBody::Null), Presence::Required),
				field("c", TypeDescriptor::new(TypeBody::Boolean), Presence::Required),
			])),
		);
		assert!(run(&[rec]).is_empty());

		let clash = compiled(
			"m.Clash",
			TypeDescriptor::new(TypeBody::Sequence(vec![
				field("a", TypeDescriptor::new(TypeBody::Boolean), Presence::Optional),
				field("b", TypeDescriptor::new(TypeBody::Boolean), Presence::Default("TRUE".into())),
			])),
		);
		assert_eq!(
			run(&[clash]),
			vec!["m.Clash: optional SEQUENCE component `a` and following component `b` share tag [UNIVERSAL 1]"]
		);
	}
}
