//! Reading records through units stored in an output area.

use std::path::Path;
use std::sync::Arc;

use asnrd_decoder::unit::{encode_unit, unit_path};
use asnrd_decoder::{
	BaseLoader, CompiledType, Decoder, DefaultStrategy, Field, Presence, RecordReader, Tag, TagMode, TypeBody, TypeDescriptor, UnitLoader, Value,
};
use pretty_assertions::assert_eq;

fn store(root: &Path, canonical: &str, descriptor: TypeDescriptor) {
	let ty = CompiledType {
		canonical_name: canonical.to_string(),
		module: "CDR".into(),
		name: canonical.rsplit('.').next().unwrap().to_string(),
		descriptor,
	};
	let path = unit_path(root, canonical);
	std::fs::create_dir_all(path.parent().unwrap()).unwrap();
	std::fs::write(path, encode_unit(&ty).unwrap()).unwrap();
}

fn field(name: &str, ty: TypeDescriptor) -> Field {
	Field {
		name: name.into(),
		ty,
		presence: Presence::Required,
	}
}

/// File ::= SEQUENCE { header [0] IMPLICIT INTEGER, calls [1] IMPLICIT SEQUENCE OF Call }
/// Call ::= SEQUENCE { number UTF8String, seconds INTEGER }
fn write_schema(root: &Path) {
	store(
		root,
		"cdr.File",
		TypeDescriptor::new(TypeBody::Sequence(vec![
			field(
				"header",
				TypeDescriptor::reference("asnrd.universal.Integer").tagged(Tag::context(0), TagMode::Implicit),
			),
			field(
				"calls",
				TypeDescriptor::new(TypeBody::SequenceOf(Box::new(TypeDescriptor::reference("cdr.Call"))))
					.tagged(Tag::context(1), TagMode::Implicit),
			),
		])),
	);
	store(
		root,
		"cdr.Call",
		TypeDescriptor::new(TypeBody::Sequence(vec![
			field("number", TypeDescriptor::reference("asnrd.universal.Utf8String")),
			field("seconds", TypeDescriptor::reference("asnrd.universal.Integer")),
		])),
	);
}

fn call(number: &str, seconds: u8) -> Vec<u8> {
	let mut body = vec![0x0c, number.len() as u8];
	body.extend_from_slice(number.as_bytes());
	body.extend_from_slice(&[0x02, 0x01, seconds]);
	let mut out = vec![0x30, body.len() as u8];
	out.extend(body);
	out
}

fn file(header: u8, calls: &[Vec<u8>]) -> Vec<u8> {
	let list: Vec<u8> = calls.concat();
	let mut body = vec![0x80, 0x01, header, 0xa1, list.len() as u8];
	body.extend(list);
	let mut out = vec![0x30, body.len() as u8];
	out.extend(body);
	out
}

#[test]
fn record_field_explodes_each_root() {
	let dir = tempfile::tempdir().unwrap();
	write_schema(dir.path());

	let loader = Arc::new(UnitLoader::new(dir.path(), BaseLoader::shared()).unwrap());
	let decoder = Decoder::new("cdr.File", loader).unwrap();

	let mut input = file(1, &[call("100", 5), call("200", 6)]);
	input.extend(file(2, &[call("300", 7)]));

	let reader = RecordReader::new(decoder, input.as_slice(), Some("calls".into()), Arc::new(DefaultStrategy)).unwrap();
	let records: Vec<Value> = reader.map(Result::unwrap).collect();

	let numbers: Vec<&str> = records.iter().map(|r| r.field("number").and_then(Value::as_str).unwrap()).collect();
	assert_eq!(numbers, vec!["100", "200", "300"]);
	assert_eq!(records[2].field("seconds"), Some(&Value::Integer(7)));
}

#[test]
fn root_records_serialize_to_json() {
	let dir = tempfile::tempdir().unwrap();
	write_schema(dir.path());

	let loader = Arc::new(UnitLoader::new(dir.path(), BaseLoader::shared()).unwrap());
	let decoder = Decoder::new("cdr.Call", loader).unwrap();
	let value = decoder.decode_bytes(&call("42", 9)).unwrap();

	assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"number":"42","seconds":9}"#);
}

#[test]
fn base_loader_cannot_see_generated_types() {
	let err = Decoder::new("cdr.File", BaseLoader::shared()).unwrap_err();
	assert_eq!(err.to_string(), "type not found: cdr.File");
}
