//! The reader service and its activation state machine.
//!
//! Transitions (`enable`, `disable`) are serialized by a mutex. Read sessions
//! never take it: they load the published [`ActiveSession`] snapshot and only
//! read from it, so any number of threads can open readers while the service
//! is active.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use asnrd_compiler::Classpath;
use asnrd_decoder::{DEFAULT_STRATEGY, Decoder, IterationStrategy, RecordReader, StrategyRegistry, TypeLoader, isolated_loader};
use asnrd_schema::split_file_list;
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::config::{ConfigError, PreprocessingStrategy, ReaderConfig, ValidationIssue, check_directory};
use crate::error::{ActivationError, LifecycleError, ReadSessionError};
use crate::output_area::OutputArea;
use crate::pipeline::Pipeline;
use crate::preprocess::PreprocessorEngine;
use crate::resolve::{RootName, resolve};
use crate::vars::Variables;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
	Inactive,
	Activating,
	Active,
	Deactivating,
}

#[derive(Debug)]
struct Lifecycle {
	state: LifecycleState,
	area: Option<OutputArea>,
}

/// Everything a read session needs, published once per activation.
///
/// Settings are kept unexpanded; each session expands them with its own
/// variables.
#[derive(Debug)]
pub struct ActiveSession {
	loader: Arc<dyn TypeLoader>,
	root: RootName,
	record_field: Option<String>,
	iteration_strategy: Option<String>,
}

impl ActiveSession {
	pub fn loader(&self) -> &Arc<dyn TypeLoader> {
		&self.loader
	}

	/// Canonical root type name for one session's variables.
	pub fn root_type_name(&self, vars: &Variables) -> Result<String, ReadSessionError> {
		let expanded = match &self.root {
			RootName::Model(name) => RootName::Model(vars.expand(name)),
			RootName::Class(name) => RootName::Class(vars.expand(name)),
		};
		Ok(resolve(&expanded)?)
	}
}

/// Compiles configured schemas on enable and hands out record readers.
#[derive(Debug)]
pub struct ReaderService {
	pipeline: Pipeline,
	strategies: StrategyRegistry,
	preprocessor: PreprocessorEngine,
	lifecycle: Mutex<Lifecycle>,
	session: ArcSwapOption<ActiveSession>,
}

impl Default for ReaderService {
	fn default() -> Self {
		Self::new(Pipeline::default())
	}
}

impl ReaderService {
	pub fn new(pipeline: Pipeline) -> Self {
		Self {
			pipeline,
			strategies: StrategyRegistry::default(),
			preprocessor: PreprocessorEngine::default(),
			lifecycle: Mutex::new(Lifecycle {
				state: LifecycleState::Inactive,
				area: None,
			}),
			session: ArcSwapOption::empty(),
		}
	}

	/// Makes a custom iteration strategy selectable by name.
	pub fn with_strategy(mut self, strategy: Arc<dyn IterationStrategy>) -> Self {
		self.strategies.register(strategy);
		self
	}

	pub fn with_preprocessor(mut self, preprocessor: PreprocessorEngine) -> Self {
		self.preprocessor = preprocessor;
		self
	}

	pub fn state(&self) -> LifecycleState {
		self.lifecycle.lock().state
	}

	/// The current output area, if the active configuration compiled anything.
	pub fn output_area(&self) -> Option<PathBuf> {
		self.lifecycle.lock().area.as_ref().map(|area| area.path().to_path_buf())
	}

	/// The published snapshot while active.
	pub fn session(&self) -> Option<Arc<ActiveSession>> {
		self.session.load_full()
	}

	/// Validates `config`, compiles its schema files into a fresh output area
	/// and publishes the result.
	///
	/// An invalid configuration is rejected before anything changes. An
	/// active service is then disabled first. On failure the service is left
	/// inactive and any partially built output area is removed.
	pub fn enable(&self, config: &ReaderConfig, vars: &Variables) -> Result<(), ActivationError> {
		config.validate()?;
		let root = config
			.root_name()
			.ok_or_else(|| ConfigError::Invalid(vec![ValidationIssue::NoRootName]))?;

		let mut lifecycle = self.lifecycle.lock();
		if lifecycle.state == LifecycleState::Active {
			info!("Re-enabling active ASN.1 reader service");
			if let Err(e) = self.shut_down(&mut lifecycle) {
				warn!(error = %e, "Previous output area was not fully deleted");
			}
		}

		lifecycle.state = LifecycleState::Activating;
		match self.activate(config, vars) {
			Ok((area, loader)) => {
				info!(
					loader = loader.name(),
					area = ?area.as_ref().map(OutputArea::path),
					"ASN.1 reader service enabled"
				);
				self.session.store(Some(Arc::new(ActiveSession {
					loader,
					root,
					record_field: config.record_field.clone(),
					iteration_strategy: config.iteration_strategy.clone(),
				})));
				lifecycle.area = area;
				lifecycle.state = LifecycleState::Active;
				Ok(())
			}
			Err(e) => {
				error!(error = %e, "ASN.1 reader service activation failed");
				lifecycle.state = LifecycleState::Inactive;
				Err(e)
			}
		}
	}

	fn activate(&self, config: &ReaderConfig, vars: &Variables) -> Result<(Option<OutputArea>, Arc<dyn TypeLoader>), ActivationError> {
		// Precompiled support units sit between the host and every area.
		let base = match &config.runtime_support_directory {
			Some(dir) => isolated_loader(Some(dir), self.pipeline.base_loader.clone()),
			None => self.pipeline.base_loader.clone(),
		};
		let mut files = config
			.schema_files
			.as_deref()
			.map(|list| split_file_list(&vars.expand(list)))
			.unwrap_or_default();
		if files.is_empty() {
			info!("No ASN.1 schema files configured");
			return Ok((None, isolated_loader(None, base)));
		}

		if config.preprocessing_strategy == PreprocessingStrategy::AdditionalPreprocessing {
			let dir = vars.expand(config.preprocessing_output_directory.as_deref().unwrap_or_default());
			let dir = PathBuf::from(dir.trim());
			check_directory(&dir).map_err(ActivationError::PreprocessingDirectory)?;
			files = self.preprocessor.preprocess(&files, &dir)?;
		}

		let area = OutputArea::create(&config.identifier, config.output_parent_directory.as_deref())?;
		let mut classpath = Classpath::runtime();
		if let Some(dir) = &config.runtime_support_directory {
			classpath = classpath.with_entry(dir);
		}

		if let Err(e) = self.pipeline.compile(&files, area.path(), &classpath) {
			let path = area.path().to_path_buf();
			if let Err(cleanup) = area.delete() {
				warn!(area = %path.display(), error = %cleanup, "Cannot remove partially built output area");
			}
			return Err(e);
		}

		let loader = isolated_loader(Some(area.path()), base);
		Ok((Some(area), loader))
	}

	/// Unpublishes the session and deletes the output area.
	///
	/// The service is inactive afterwards even when deletion fails.
	pub fn disable(&self) -> Result<(), LifecycleError> {
		let mut lifecycle = self.lifecycle.lock();
		self.shut_down(&mut lifecycle)
	}

	fn shut_down(&self, lifecycle: &mut Lifecycle) -> Result<(), LifecycleError> {
		if lifecycle.state == LifecycleState::Inactive {
			return Ok(());
		}
		lifecycle.state = LifecycleState::Deactivating;
		self.session.store(None);
		let result = match lifecycle.area.take() {
			Some(area) => area.delete().map_err(LifecycleError::from),
			None => Ok(()),
		};
		lifecycle.state = LifecycleState::Inactive;
		match &result {
			Ok(()) => info!("ASN.1 reader service disabled"),
			Err(e) => error!(error = %e, "ASN.1 reader service disabled with leftovers"),
		}
		result
	}

	/// Canonical root type name for `vars` under the active configuration.
	pub fn root_type_name(&self, vars: &Variables) -> Result<String, ReadSessionError> {
		self.session().ok_or(ReadSessionError::Inactive)?.root_type_name(vars)
	}

	/// Opens a reader over `input` using the active loader.
	pub fn create_record_reader(&self, vars: &Variables, input: impl Read) -> Result<RecordReader, ReadSessionError> {
		let session = self.session().ok_or(ReadSessionError::Inactive)?;
		let root = session.root_type_name(vars)?;
		let record_field = vars.expand_non_empty(session.record_field.as_deref());
		let strategy_name = vars
			.expand_non_empty(session.iteration_strategy.as_deref())
			.unwrap_or_else(|| DEFAULT_STRATEGY.to_string());

		let strategy = self.strategies.get(strategy_name.trim())?;
		let decoder = Decoder::new(&root, session.loader.clone())?;
		Ok(RecordReader::new(decoder, input, record_field, strategy)?)
	}
}

impl Drop for ReaderService {
	fn drop(&mut self) {
		let lifecycle = self.lifecycle.get_mut();
		if let Some(area) = lifecycle.area.take() {
			warn!(area = %area.path().display(), "Reader service dropped while enabled");
			if let Err(e) = area.delete() {
				error!(error = %e, "Cannot delete output area of dropped reader service");
			}
		}
	}
}
