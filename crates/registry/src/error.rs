//! Error types for registration and dispatch.
//!
//! Every message carries the qualified operator name and, where applicable,
//! the offending kind and the prior registration's provenance, so a caller
//! can self-correct without reading source. Registration errors are
//! fail-fast and leave no partial mutation behind; dispatch errors are
//! recoverable by registering the missing kind and retrying.

use opforge_schema::SchemaError;

use crate::key::DispatchKey;
use crate::meta::Provenance;

/// Errors raised by registration-time operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
	/// The qualified name does not follow `namespace::symbol` rules.
	#[error("invalid operator name `{name}`: {reason}")]
	InvalidName { name: String, reason: String },

	/// The namespace is reserved for the host framework.
	#[error("namespace `{namespace}` is reserved, please choose something else")]
	ReservedNamespace { namespace: String },

	/// The qualified name is already live.
	#[error("operator `{name}` is already declared (previously declared at {prior})")]
	DuplicateDeclaration { name: String, prior: Provenance },

	/// The dispatch key already has a kernel on this operator.
	#[error(
		"attempting to register a `{key}` kernel for operator `{op}` that already \
		 has a `{key}` kernel registered at {prior}; a kind may be registered at most once"
	)]
	DuplicateKindRegistration {
		op: String,
		key: DispatchKey,
		prior: Provenance,
	},

	/// A kernel for this kind was already supplied through the host's own
	/// registration surface.
	#[error(
		"operator `{op}` already has a `{key}` kernel via a pre-existing host \
		 registration; remove that registration or register through the host instead"
	)]
	ExternalConflict { op: String, key: DispatchKey },

	/// A differentiability mask does not match the schema's return count.
	#[error(
		"operator `{op}`: expected one differentiability flag per return \
		 ({expected}), got {got}"
	)]
	DifferentiabilityMismatch { op: String, expected: usize, got: usize },

	/// No live operator under this name.
	#[error("no operator named `{name}`{}", suggestion_text(.suggestion))]
	NotFound {
		name: String,
		suggestion: Option<String>,
	},

	/// Schema validation failed.
	#[error(transparent)]
	Schema(#[from] SchemaError),

	/// A handle resolution or dispatch check failed.
	#[error(transparent)]
	Dispatch(#[from] DispatchError),
}

fn suggestion_text(suggestion: &Option<String>) -> String {
	match suggestion {
		Some(s) => format!(" (did you mean `{s}`?)"),
		None => String::new(),
	}
}

/// Errors raised while selecting or resolving a kernel.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
	/// The winning device kind has no registered kernel.
	#[error(
		"operator `{op}`: no kernel registered for kind `{key}`; \
		 register an implementation for `{key}`"
	)]
	NoImplementation { op: String, key: DispatchKey },

	/// The call had no tensor-family inputs, so no device kind could be
	/// computed and no factory kernel was registered.
	#[error(
		"operator `{op}`: there were no tensor-family inputs to select a device \
		 kind from; if this operator constructs tensors from scratch, register a \
		 `factory` kernel"
	)]
	NoTensorInputs { op: String },

	/// Shape inference was requested but no abstract kernel exists.
	#[error(
		"operator `{op}`: no abstract kernel registered; register a `meta` \
		 implementation to make this operator usable for shape inference"
	)]
	NoAbstractImpl { op: String },

	/// The composed differentiation kernel is not live yet.
	#[error("operator `{op}`: differentiation formula is incomplete; still missing {missing}")]
	IncompleteComposition { op: String, missing: String },

	/// The handle refers to a destroyed (or never-declared) operator.
	#[error("operator `{op}` not found; it may have been destroyed")]
	NotFound { op: String },
}

/// Errors surfaced when invoking a selected kernel.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
	#[error(transparent)]
	Dispatch(#[from] DispatchError),

	/// The kernel itself reported a failure.
	#[error("operator `{op}`: kernel failed: {message}")]
	KernelFailed { op: String, message: String },
}
