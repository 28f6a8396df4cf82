//! Record iteration over a stream of encoded root values.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use tracing::debug;

use crate::ber::BerReader;
use crate::decode::Decoder;
use crate::error::{DecodeError, Result};
use crate::value::Value;

/// Name of the strategy used when none is configured.
pub const DEFAULT_STRATEGY: &str = "default";

/// Turns one decoded root value into the records it contains.
pub trait IterationStrategy: Send + Sync + fmt::Debug {
	fn name(&self) -> &str;

	fn records(&self, root: Value, record_field: Option<&str>) -> Result<Vec<Value>>;
}

/// Each root value is a record, unless a record field is named: then the
/// field's list elements are the records.
#[derive(Debug, Default)]
pub struct DefaultStrategy;

impl IterationStrategy for DefaultStrategy {
	fn name(&self) -> &str {
		DEFAULT_STRATEGY
	}

	fn records(&self, root: Value, record_field: Option<&str>) -> Result<Vec<Value>> {
		let Some(field) = record_field else {
			return Ok(vec![root]);
		};
		match root.into_field(field) {
			Some(Value::List(items)) => Ok(items),
			Some(other) => Ok(vec![other]),
			None => Err(DecodeError::RecordFieldNotFound(field.to_string())),
		}
	}
}

/// Named iteration strategies.
#[derive(Debug)]
pub struct StrategyRegistry {
	strategies: HashMap<String, Arc<dyn IterationStrategy>>,
}

impl Default for StrategyRegistry {
	fn default() -> Self {
		let mut registry = Self { strategies: HashMap::new() };
		registry.register(Arc::new(DefaultStrategy));
		registry
	}
}

impl StrategyRegistry {
	/// Adds a strategy, replacing any registered under the same name.
	pub fn register(&mut self, strategy: Arc<dyn IterationStrategy>) {
		self.strategies.insert(strategy.name().to_string(), strategy);
	}

	pub fn get(&self, name: &str) -> Result<Arc<dyn IterationStrategy>> {
		self.strategies
			.get(name)
			.cloned()
			.ok_or_else(|| DecodeError::UnknownStrategy(name.to_string()))
	}

	pub fn contains(&self, name: &str) -> bool {
		self.strategies.contains_key(name)
	}

	pub fn names(&self) -> Vec<&str> {
		let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}
}

/// Reads records from a byte stream of concatenated root values.
///
/// The first error ends iteration.
#[derive(Debug)]
pub struct RecordReader {
	decoder: Decoder,
	strategy: Arc<dyn IterationStrategy>,
	record_field: Option<String>,
	data: Vec<u8>,
	pos: usize,
	pending: VecDeque<Value>,
	roots: usize,
}

impl RecordReader {
	pub fn new(
		decoder: Decoder,
		mut input: impl Read,
		record_field: Option<String>,
		strategy: Arc<dyn IterationStrategy>,
	) -> Result<Self> {
		let mut data = Vec::new();
		input
			.read_to_end(&mut data)
			.map_err(|e| DecodeError::Input(e.to_string()))?;
		debug!(
			root_type = %decoder.root_type().canonical_name,
			bytes = data.len(),
			strategy = strategy.name(),
			"Opened record reader"
		);
		Ok(Self {
			decoder,
			strategy,
			record_field,
			data,
			pos: 0,
			pending: VecDeque::new(),
			roots: 0,
		})
	}

	/// Number of root values decoded so far.
	pub fn roots_read(&self) -> usize {
		self.roots
	}

	pub fn next_record(&mut self) -> Result<Option<Value>> {
		loop {
			if let Some(record) = self.pending.pop_front() {
				return Ok(Some(record));
			}
			if self.pos >= self.data.len() {
				return Ok(None);
			}

			let result = self.read_root();
			match result {
				Ok(records) => self.pending.extend(records),
				Err(e) => {
					self.pos = self.data.len();
					return Err(e);
				}
			}
		}
	}

	fn read_root(&mut self) -> Result<Vec<Value>> {
		let mut ber = BerReader::new(&self.data[self.pos..]);
		let tlv = ber.read_tlv()?.ok_or(DecodeError::UnexpectedEnd)?;
		let consumed = ber.position();
		let root = self.decoder.decode(tlv)?;
		self.pos += consumed;
		self.roots += 1;
		self.strategy.records(root, self.record_field.as_deref())
	}
}

impl Iterator for RecordReader {
	type Item = Result<Value>;

	fn next(&mut self) -> Option<Self::Item> {
		self.next_record().transpose()
	}
}
