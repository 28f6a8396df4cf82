//! Decoding errors.

use thiserror::Error;

use crate::descriptor::Tag;
use crate::loader::LoadError;

/// Errors raised while reading BER input against a compiled type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
	#[error("unexpected end of input")]
	UnexpectedEnd,

	#[error("value declares {declared} content octets but only {available} remain")]
	Truncated { declared: usize, available: usize },

	#[error("{remaining} trailing octets after value")]
	TrailingData { remaining: usize },

	#[error("tag number does not fit in 32 bits")]
	TagTooLarge,

	#[error("length does not fit in memory")]
	LengthTooLarge,

	#[error("indefinite length used on primitive value {0}")]
	IndefinitePrimitive(Tag),

	#[error("nesting deeper than {0} levels")]
	TooDeep(usize),

	#[error("expected {expected}, found {found}")]
	UnexpectedTag { expected: String, found: Tag },

	#[error("{0} must use the constructed form")]
	ExpectedConstructed(Tag),

	#[error("invalid {kind} encoding: {reason}")]
	InvalidValue { kind: &'static str, reason: String },

	#[error("integer does not fit in 64 bits")]
	IntegerOverflow,

	#[error("missing required field `{field}` in {type_name}")]
	MissingField { type_name: String, field: String },

	#[error("field `{field}` appears more than once in {type_name}")]
	DuplicateField { type_name: String, field: String },

	#[error("no alternative of {type_name} matches {found}")]
	NoAlternative { type_name: String, found: Tag },

	#[error("record field `{0}` not found in root value")]
	RecordFieldNotFound(String),

	#[error("unknown iteration strategy `{0}`")]
	UnknownStrategy(String),

	#[error("cannot read input: {0}")]
	Input(String),

	#[error(transparent)]
	Load(#[from] LoadError),
}

impl DecodeError {
	pub(crate) fn invalid(kind: &'static str, reason: impl Into<String>) -> Self {
		DecodeError::InvalidValue {
			kind,
			reason: reason.into(),
		}
	}
}

/// Result type for decoding operations.
pub type Result<T> = std::result::Result<T, DecodeError>;
