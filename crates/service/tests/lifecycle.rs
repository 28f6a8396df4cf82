//! Enable, read and disable against real schema files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use asnrd_compiler::{Classpath, GenerationError};
use asnrd_decoder::{DecodeError, IterationStrategy, Value};
use asnrd_schema::ParseError;
use asnrd_service::{
	ActivationError, ConfigError, LifecycleState, Pipeline, PreprocessingStrategy, ReadSessionError, ReaderConfig, ReaderService,
	ValidationIssue, Variables,
};
use pretty_assertions::assert_eq;

const BILLING: &str = "BILLING-RECORDS DEFINITIONS IMPLICIT TAGS ::= BEGIN
	Record ::= [APPLICATION 1] SEQUENCE {
		subscriber [0] Subscriber,
		duration [1] INTEGER (0..86400),
		outcome [2] Outcome OPTIONAL
	}
	Subscriber ::= CHOICE {
		msisdn [0] OCTET STRING (SIZE (1..15)),
		name [1] UTF8String
	}
	Outcome ::= ENUMERATED { answered, busy, failed }
END
";

const BROKEN: &str = "BROKEN DEFINITIONS ::= BEGIN
Record ::= SEQUENCE { id INTEGER
END
";

/// `{ subscriber name "bob", duration 30, outcome busy }`
const RECORD: [u8; 15] = [
	0x61, 0x0d, 0xa0, 0x05, 0x81, 0x03, b'b', b'o', b'b', 0x81, 0x01, 0x1e, 0x82, 0x01, 0x01,
];

struct Workspace {
	schemas: tempfile::TempDir,
	areas: tempfile::TempDir,
}

impl Workspace {
	fn new() -> Self {
		let schemas = tempfile::tempdir().unwrap();
		fs::write(schemas.path().join("billing.asn"), BILLING).unwrap();
		fs::write(schemas.path().join("broken.asn"), BROKEN).unwrap();
		Self {
			schemas,
			areas: tempfile::tempdir().unwrap(),
		}
	}

	fn write(&self, name: &str, text: &str) {
		fs::write(self.schema(name), text).unwrap();
	}

	fn schema(&self, name: &str) -> PathBuf {
		self.schemas.path().join(name)
	}

	fn config(&self, files: &[&str]) -> ReaderConfig {
		let list: Vec<String> = files.iter().map(|f| format!("${{dir}}/{f}")).collect();
		ReaderConfig {
			identifier: "billing".into(),
			root_model_name: Some("BILLING-RECORDS.Record".into()),
			schema_files: Some(list.join(", ")),
			output_parent_directory: Some(self.areas.path().to_path_buf()),
			..ReaderConfig::default()
		}
	}

	fn vars(&self) -> Variables {
		Variables::new().with("dir", self.schemas.path().display().to_string())
	}

	fn leftover_areas(&self) -> usize {
		fs::read_dir(self.areas.path()).unwrap().count()
	}
}

fn read_all(service: &ReaderService, vars: &Variables, input: &[u8]) -> Vec<Value> {
	service
		.create_record_reader(vars, input)
		.unwrap()
		.map(Result::unwrap)
		.collect()
}

fn unit_count(root: &Path) -> usize {
	walkdir::WalkDir::new(root)
		.into_iter()
		.filter_map(Result::ok)
		.filter(|e| e.path().extension().is_some_and(|ext| ext == "unit"))
		.count()
}

#[test]
fn zero_schema_files_use_the_base_loader() {
	let service = ReaderService::default();
	let config = ReaderConfig {
		root_class_name: Some("asnrd.universal.Integer".into()),
		..ReaderConfig::default()
	};
	service.enable(&config, &Variables::new()).unwrap();

	assert_eq!(service.state(), LifecycleState::Active);
	assert_eq!(service.output_area(), None);
	assert_eq!(service.session().unwrap().loader().name(), "base");
	assert_eq!(
		read_all(&service, &Variables::new(), &[0x02, 0x01, 0x05, 0x02, 0x01, 0x07]),
		vec![Value::Integer(5), Value::Integer(7)]
	);

	service.disable().unwrap();
	assert_eq!(service.state(), LifecycleState::Inactive);
}

#[test]
fn parse_failure_attempts_every_file_and_cleans_up() {
	let ws = Workspace::new();
	let service = ReaderService::default();
	let config = ws.config(&["broken.asn", "billing.asn", "missing.asn"]);

	let err = service.enable(&config, &ws.vars()).unwrap_err();
	let ActivationError::Parse(failure) = err else {
		panic!("expected a parse failure, got {err:?}");
	};
	let paths: Vec<&Path> = failure.errors().iter().map(ParseError::path).collect();
	assert_eq!(paths, vec![ws.schema("broken.asn").as_path(), ws.schema("missing.asn").as_path()]);
	assert_eq!(failure.first().path(), ws.schema("broken.asn"));

	assert_eq!(service.state(), LifecycleState::Inactive);
	assert_eq!(service.output_area(), None);
	assert_eq!(ws.leftover_areas(), 0);
	assert!(matches!(
		service.create_record_reader(&ws.vars(), &RECORD[..]),
		Err(ReadSessionError::Inactive)
	));
}

#[test]
fn invalid_configuration_has_no_side_effects() {
	let ws = Workspace::new();
	let service = ReaderService::default();
	let config = ReaderConfig {
		root_class_name: Some("billing.records.Record".into()),
		..ws.config(&["billing.asn"])
	};

	let err = service.enable(&config, &ws.vars()).unwrap_err();
	assert!(matches!(err, ActivationError::Config(_)), "{err:?}");
	assert_eq!(ws.leftover_areas(), 0);
	assert_eq!(service.state(), LifecycleState::Inactive);
}

#[test]
fn enable_disable_enable_uses_fresh_output_areas() {
	let ws = Workspace::new();
	let service = ReaderService::default();
	let config = ws.config(&["billing.asn"]);

	service.enable(&config, &ws.vars()).unwrap();
	let first = service.output_area().unwrap();
	assert!(first.file_name().unwrap().to_string_lossy().starts_with("billing_asn_"));
	assert_eq!(unit_count(&first), 3);

	let records = read_all(&service, &ws.vars(), &RECORD);
	assert_eq!(records.len(), 1);
	assert_eq!(records[0].field("duration"), Some(&Value::Integer(30)));

	service.disable().unwrap();
	assert!(!first.exists());
	assert_eq!(service.output_area(), None);

	service.enable(&config, &ws.vars()).unwrap();
	let second = service.output_area().unwrap();
	assert_ne!(first, second);
	assert_eq!(read_all(&service, &ws.vars(), &RECORD), records);

	// Enabling again while active replaces the area.
	service.enable(&config, &ws.vars()).unwrap();
	let third = service.output_area().unwrap();
	assert_ne!(second, third);
	assert!(!second.exists());
	assert_eq!(ws.leftover_areas(), 1);

	drop(service);
	assert_eq!(ws.leftover_areas(), 0);
}

#[test]
fn read_sessions_expand_their_own_variables_concurrently() {
	let ws = Workspace::new();
	let service = ReaderService::default();
	let config = ReaderConfig {
		root_model_name: Some("BILLING-RECORDS.${type}".into()),
		..ws.config(&["billing.asn"])
	};
	service.enable(&config, &ws.vars()).unwrap();
	let area = service.output_area().unwrap();

	std::thread::scope(|scope| {
		for i in 0..8 {
			let service = &service;
			scope.spawn(move || {
				for _ in 0..25 {
					if i % 2 == 0 {
						let vars = Variables::new().with("type", "Record");
						assert_eq!(service.root_type_name(&vars).unwrap(), "billing.records.Record");
						let records = read_all(service, &vars, &RECORD);
						assert_eq!(records[0].field("duration"), Some(&Value::Integer(30)));
					} else {
						let vars = Variables::new().with("type", "Outcome");
						assert_eq!(service.root_type_name(&vars).unwrap(), "billing.records.Outcome");
						let records = read_all(service, &vars, &[0x0a, 0x01, 0x02]);
						assert_eq!(
							records,
							vec![Value::Enumerated {
								name: Some("failed".into()),
								value: 2
							}]
						);
					}
				}
			});
		}
	});

	assert_eq!(service.state(), LifecycleState::Active);
	assert_eq!(service.output_area(), Some(area.clone()));
	assert_eq!(unit_count(&area), 3);

	let err = service.root_type_name(&Variables::new()).unwrap_err();
	assert_eq!(err.to_string(), "root model name `BILLING-RECORDS.` is not of the form MODULE-NAME.Type");
	assert_eq!(service.state(), LifecycleState::Active);
}

#[test]
fn additional_preprocessing_rewrites_into_the_configured_directory() {
	let ws = Workspace::new();
	let rewritten = tempfile::tempdir().unwrap();
	let service = ReaderService::default();
	let config = ReaderConfig {
		preprocessing_strategy: PreprocessingStrategy::AdditionalPreprocessing,
		preprocessing_output_directory: Some("${pre}".into()),
		..ws.config(&["billing.asn"])
	};
	let vars = ws.vars().with("pre", rewritten.path().display().to_string());

	service.enable(&config, &vars).unwrap();
	let text = fs::read_to_string(rewritten.path().join("billing.asn")).unwrap();
	assert!(!text.contains("86400"));
	assert!(!text.contains("SIZE"));
	assert_eq!(read_all(&service, &vars, &RECORD).len(), 1);
	service.disable().unwrap();

	let missing = rewritten.path().join("gone");
	let vars = ws.vars().with("pre", missing.display().to_string());
	let err = service.enable(&config, &vars).unwrap_err();
	assert!(
		matches!(err, ActivationError::PreprocessingDirectory(ValidationIssue::DirectoryMissing(ref dir)) if *dir == missing),
		"{err:?}"
	);
	assert_eq!(ws.leftover_areas(), 0);
}

#[derive(Debug)]
struct Twice;

impl IterationStrategy for Twice {
	fn name(&self) -> &str {
		"twice"
	}

	fn records(&self, root: Value, _record_field: Option<&str>) -> asnrd_decoder::Result<Vec<Value>> {
		Ok(vec![root.clone(), root])
	}
}

#[test]
fn iteration_strategy_is_chosen_per_session() {
	let ws = Workspace::new();
	let service = ReaderService::default().with_strategy(Arc::new(Twice));
	let config = ReaderConfig {
		iteration_strategy: Some("${strategy}".into()),
		..ws.config(&["billing.asn"])
	};
	service.enable(&config, &ws.vars()).unwrap();

	assert_eq!(read_all(&service, &ws.vars(), &RECORD).len(), 1);
	assert_eq!(read_all(&service, &ws.vars().with("strategy", "twice"), &RECORD).len(), 2);

	let err = service
		.create_record_reader(&ws.vars().with("strategy", "sideways"), &RECORD[..])
		.unwrap_err();
	assert!(matches!(err, ReadSessionError::Decode(DecodeError::UnknownStrategy(ref name)) if name == "sideways"));
}

#[test]
fn invalid_reconfiguration_leaves_the_active_session_alone() {
	let ws = Workspace::new();
	let service = ReaderService::default();
	service.enable(&ws.config(&["billing.asn"]), &ws.vars()).unwrap();
	let area = service.output_area().unwrap();

	let both = ReaderConfig {
		root_class_name: Some("billing.records.Record".into()),
		..ws.config(&["billing.asn"])
	};
	let err = service.enable(&both, &ws.vars()).unwrap_err();
	assert!(
		matches!(err, ActivationError::Config(ConfigError::Invalid(ref issues)) if issues == &[ValidationIssue::BothRootNames]),
		"{err:?}"
	);

	assert_eq!(service.state(), LifecycleState::Active);
	assert_eq!(service.output_area(), Some(area.clone()));
	assert!(area.exists());
	assert_eq!(read_all(&service, &ws.vars(), &RECORD).len(), 1);
}

#[test]
fn generation_and_compilation_failures_clean_up() {
	let ws = Workspace::new();
	ws.write("unresolved.asn", "GEN DEFINITIONS ::= BEGIN\n\tA ::= Missing\nEND\n");
	ws.write("ambiguous.asn", "AMBIGUOUS DEFINITIONS ::= BEGIN\n\tPick ::= CHOICE { a [0] INTEGER, b [0] BOOLEAN }\nEND\n");
	let service = ReaderService::default();

	let err = service.enable(&ws.config(&["unresolved.asn"]), &ws.vars()).unwrap_err();
	assert!(
		matches!(err, ActivationError::Generation(GenerationError::UnresolvedReference { ref reference, .. }) if reference == "Missing"),
		"{err:?}"
	);
	assert_eq!(service.state(), LifecycleState::Inactive);
	assert_eq!(service.output_area(), None);
	assert_eq!(ws.leftover_areas(), 0);

	let err = service.enable(&ws.config(&["ambiguous.asn"]), &ws.vars()).unwrap_err();
	assert!(matches!(err, ActivationError::Compilation(_)), "{err:?}");
	assert_eq!(service.state(), LifecycleState::Inactive);
	assert_eq!(service.output_area(), None);
	assert_eq!(ws.leftover_areas(), 0);

	service.enable(&ws.config(&["billing.asn"]), &ws.vars()).unwrap();
	assert_eq!(service.state(), LifecycleState::Active);
}

#[test]
fn failed_deletion_still_allows_a_fresh_enable() {
	let ws = Workspace::new();
	let service = ReaderService::default();
	let config = ws.config(&["billing.asn"]);
	service.enable(&config, &ws.vars()).unwrap();
	let first = service.output_area().unwrap();

	fs::remove_dir_all(&first).unwrap();
	assert!(service.disable().is_err());
	assert_eq!(service.state(), LifecycleState::Inactive);
	assert_eq!(service.output_area(), None);

	service.enable(&config, &ws.vars()).unwrap();
	let second = service.output_area().unwrap();
	assert_ne!(first, second);
	assert_eq!(unit_count(&second), 3);
	assert_eq!(read_all(&service, &ws.vars(), &RECORD).len(), 1);
}

#[test]
fn runtime_support_units_are_imported_and_loaded() {
	let ws = Workspace::new();
	ws.write("common.asn", "COMMON DEFINITIONS ::= BEGIN\n\tId ::= INTEGER\nEND\n");
	ws.write("app.asn", "APP DEFINITIONS ::= BEGIN\n\tIMPORTS Id FROM COMMON;\n\tUse ::= SEQUENCE { id Id }\nEND\n");
	let support = tempfile::tempdir().unwrap();
	Pipeline::default()
		.compile(&[ws.schema("common.asn")], support.path(), &Classpath::runtime())
		.unwrap();

	let service = ReaderService::default();
	let config = ReaderConfig {
		root_model_name: Some("APP.Use".into()),
		..ws.config(&["app.asn"])
	};
	let err = service.enable(&config, &ws.vars()).unwrap_err();
	assert!(
		matches!(err, ActivationError::Generation(GenerationError::UnknownImportModule { ref import, .. }) if import == "COMMON"),
		"{err:?}"
	);

	let config = ReaderConfig {
		runtime_support_directory: Some(support.path().to_path_buf()),
		..config
	};
	service.enable(&config, &ws.vars()).unwrap();
	assert_eq!(unit_count(&service.output_area().unwrap()), 1);

	let records = read_all(&service, &ws.vars(), &[0x30, 0x03, 0x02, 0x01, 0x05]);
	assert_eq!(records.len(), 1);
	assert_eq!(records[0].field("id"), Some(&Value::Integer(5)));
}
