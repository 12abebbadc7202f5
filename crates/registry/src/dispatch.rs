//! Kernel selection.
//!
//! # Role
//!
//! Pure selection over an operator's published kernel table: one atomic
//! snapshot load per query, with no mutation. Selection depends only on
//! the device rank table and the set of kinds present in the arguments,
//! never on registration order, so repeated queries with the same inputs
//! return the same kernel.

use std::sync::Arc;

use crate::error::DispatchError;
use crate::key::{DeviceKind, DispatchKey};
use crate::name::QualName;
use crate::point::{KernelEntry, Operator};
use crate::value::Value;

/// Dispatch-relevant view of one positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgProfile {
	/// Tensor-family argument on the given device.
	Tensor(DeviceKind),
	/// Anything dispatch does not inspect.
	Opaque,
}

impl ArgProfile {
	/// Profiles a runtime value.
	pub fn of(value: &Value) -> Self {
		match value.device() {
			Some(device) => Self::Tensor(device),
			None => Self::Opaque,
		}
	}

	/// Profiles an argument list.
	pub fn of_args(values: &[Value]) -> Vec<Self> {
		values.iter().map(Self::of).collect()
	}
}

/// Selects the kernel for a call with the given argument profiles.
///
/// Among the device kinds present across tensor-family arguments, the
/// highest-ranked kind wins; a call with no tensor-family arguments selects
/// the `factory` kernel unconditionally if one is registered.
pub fn select(op: &Operator, args: &[ArgProfile]) -> Result<Arc<KernelEntry>, DispatchError> {
	let mut winner: Option<DeviceKind> = None;
	for arg in args {
		if let ArgProfile::Tensor(device) = arg {
			winner = Some(match winner {
				Some(best) if best.rank() >= device.rank() => best,
				_ => *device,
			});
		}
	}

	let key = match winner {
		Some(device) => DispatchKey::Device(device),
		None => DispatchKey::Factory,
	};
	op.kernel(key).ok_or_else(|| {
		tracing::debug!(op = %op.name(), %key, "dispatch miss");
		missing_key_error(op.name(), key)
	})
}

/// Selects the abstract kernel used for shape inference.
///
/// A registered `composite_explicit` kernel satisfies shape inference when
/// no `meta` kernel is registered.
pub fn select_for_shape_inference(op: &Operator) -> Result<Arc<KernelEntry>, DispatchError> {
	op.kernel(DispatchKey::Meta)
		.or_else(|| op.kernel(DispatchKey::CompositeExplicit))
		.ok_or_else(|| {
			tracing::debug!(op = %op.name(), "shape inference miss");
			missing_key_error(op.name(), DispatchKey::Meta)
		})
}

/// Maps a missed dispatch key to its caller-actionable error. Shared with
/// the error hook installed on the host registration point.
pub(crate) fn missing_key_error(op: &QualName, key: DispatchKey) -> DispatchError {
	let op = op.as_str().to_string();
	match key {
		DispatchKey::Factory => DispatchError::NoTensorInputs { op },
		DispatchKey::Meta => DispatchError::NoAbstractImpl { op },
		key => DispatchError::NoImplementation { op, key },
	}
}
