//! Narrow interface to the host dispatcher.
//!
//! The registry can run embedded in a larger framework that has its own
//! registration surface. Everything it needs from that framework fits
//! behind [`HostDispatcher`]: an opaque per-operator handle, a boolean
//! probe for kernels registered through the other surface, and a hook the
//! host invokes to produce diagnosable dispatch errors. The registry never
//! inspects host internals.

use std::sync::Arc;

use crate::error::DispatchError;
use crate::key::DispatchKey;

/// Opaque handle to a host-side registration point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostHandle(pub u64);

/// Maps a dispatch key the host failed to find a kernel for into the
/// caller-actionable error for it.
pub type ErrorHook = Arc<dyn Fn(DispatchKey) -> DispatchError + Send + Sync>;

pub trait HostDispatcher: Send + Sync {
	/// Looks up the host-side registration point for a qualified name.
	fn find_registration_point(&self, name: &str) -> Result<HostHandle, DispatchError>;

	/// Returns true when a kernel for `key` was already supplied through the
	/// host's own registration surface.
	fn has_existing_kernel(&self, name: &str, key: DispatchKey) -> bool;

	/// Installs the hook the host invokes when its dispatch finds no kernel.
	fn set_error_hook(&self, handle: HostHandle, hook: ErrorHook);

	/// The declared schema text of an operator the host already knows.
	fn schema_text(&self, name: &str) -> Option<String>;
}

/// Host used when running standalone: every name resolves to a fresh
/// registration point and no kernels exist elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedHost;

impl HostDispatcher for DetachedHost {
	fn find_registration_point(&self, _name: &str) -> Result<HostHandle, DispatchError> {
		Ok(HostHandle(0))
	}

	fn has_existing_kernel(&self, _name: &str, _key: DispatchKey) -> bool {
		false
	}

	fn set_error_hook(&self, _handle: HostHandle, _hook: ErrorHook) {}

	fn schema_text(&self, _name: &str) -> Option<String> {
		None
	}
}
