//! Parse, generate, build.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use asnrd_compiler::{ArtifactBuilder, BuildReport, Classpath, DescriptorGenerator, TypeGenerator, UnitCompiler};
use asnrd_decoder::{BaseLoader, TypeLoader};
use asnrd_schema::parse_schema_files;
use tracing::info;

use crate::error::ActivationError;

/// The compilation stages of an activation, each replaceable.
#[derive(Debug, Clone)]
pub struct Pipeline {
	pub generator: Arc<dyn TypeGenerator>,
	pub builder: Arc<dyn ArtifactBuilder>,
	/// Parent of every isolated loader; also used alone when nothing is compiled.
	pub base_loader: Arc<dyn TypeLoader>,
}

impl Default for Pipeline {
	fn default() -> Self {
		Self {
			generator: Arc::new(DescriptorGenerator),
			builder: Arc::new(UnitCompiler),
			base_loader: BaseLoader::shared(),
		}
	}
}

impl Pipeline {
	/// Compiles `files` into `out`, which must already exist.
	///
	/// Every file is parsed before anything fails; generation runs once over
	/// the complete registry and building runs once over everything generated.
	pub fn compile(&self, files: &[PathBuf], out: &Path, classpath: &Classpath) -> Result<BuildReport, ActivationError> {
		let registry = parse_schema_files(files)?;
		info!(modules = registry.len(), types = registry.type_count(), "Parsed ASN.1 schemas");

		let generated = self.generator.generate(&registry, out, classpath)?;
		let report = self.builder.build(out, classpath)?;
		info!(
			sources = generated.files.len(),
			units = report.units.len(),
			output = %out.display(),
			"Compiled ASN.1 schemas"
		);
		Ok(report)
	}
}
