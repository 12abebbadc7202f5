//! The calling convention shared with the host runtime.
//!
//! The registry never inspects tensor contents. A tensor-family value is a
//! [`DeviceKind`] (the only property dispatch reads) plus an opaque
//! payload that kernels downcast on their side of the seam.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::CallError;
use crate::key::DeviceKind;

/// Opaque tensor-family value.
#[derive(Clone)]
pub struct TensorValue {
	device: DeviceKind,
	payload: Arc<dyn Any + Send + Sync>,
}

impl TensorValue {
	pub fn new(device: DeviceKind, payload: impl Any + Send + Sync) -> Self {
		Self {
			device,
			payload: Arc::new(payload),
		}
	}

	pub fn device(&self) -> DeviceKind {
		self.device
	}

	/// Downcasts the payload to a concrete host type.
	pub fn payload<T: Any>(&self) -> Option<&T> {
		self.payload.downcast_ref()
	}
}

impl fmt::Debug for TensorValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TensorValue").field("device", &self.device).finish_non_exhaustive()
	}
}

/// One argument or return value crossing the kernel boundary.
#[derive(Debug, Clone)]
pub enum Value {
	Tensor(TensorValue),
	Int(i64),
	Float(f64),
	Bool(bool),
	Str(String),
}

impl Value {
	/// Builds a tensor-family value.
	pub fn tensor(device: DeviceKind, payload: impl Any + Send + Sync) -> Self {
		Self::Tensor(TensorValue::new(device, payload))
	}

	/// Returns the device kind when this is a tensor-family value.
	pub fn device(&self) -> Option<DeviceKind> {
		match self {
			Self::Tensor(t) => Some(t.device()),
			_ => None,
		}
	}

	pub fn as_tensor(&self) -> Option<&TensorValue> {
		match self {
			Self::Tensor(t) => Some(t),
			_ => None,
		}
	}
}

/// A registered kernel callable.
pub type Kernel = Arc<dyn Fn(&[Value]) -> Result<Vec<Value>, CallError> + Send + Sync>;

/// Wraps a closure as a [`Kernel`].
pub fn kernel<F>(f: F) -> Kernel
where
	F: Fn(&[Value]) -> Result<Vec<Value>, CallError> + Send + Sync + 'static,
{
	Arc::new(f)
}
