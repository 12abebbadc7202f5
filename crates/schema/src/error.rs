/// Errors produced while parsing, inferring, or validating a schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
	/// The schema text does not follow the grammar.
	#[error("malformed schema `{text}` at offset {offset}: {reason}")]
	MalformedSchema {
		text: String,
		offset: usize,
		reason: String,
	},

	/// A parameter or return annotation is outside the supported-type table.
	#[error(
		"`{name}` has unsupported type `{annotation}`; supported base types are \
		 Tensor, SymInt (i64), float (f64), bool, str, Scalar, ScalarType, Device, \
		 with Option/Vec wrappers where allowed"
	)]
	UnsupportedType { name: String, annotation: String },

	/// A parameter was declared without a type annotation.
	#[error("parameter `{param}` must have a type annotation")]
	MissingAnnotation { param: String },

	/// A parameter declares a default value.
	#[error(
		"parameter `{param}` has a default value; this is not supported. \
		 If you want default values, wrap the operator in a function that applies them"
	)]
	DefaultValueNotSupported { param: String },

	/// A non-tensor parameter was listed as mutated.
	#[error(
		"parameter `{param}` is listed as mutated but has kind `{kind}`; \
		 only tensor-family parameters can be mutated"
	)]
	InvalidMutation { param: String, kind: String },

	/// The schema violates the functional contract.
	#[error("non-functional schema `{schema}`: {reason}")]
	NonFunctionalSchema { schema: String, reason: String },

	/// A prototype does not structurally match the schema.
	#[error("signature does not match schema `{schema}`: {reason}")]
	SignatureMismatch { schema: String, reason: String },
}
