//! The reserved-slot indirection kernel and autograd composition.
//!
//! # Role
//!
//! Differentiation support is registered in two halves (a save step and a
//! compute step) that may arrive in either order. The proxy bound into an
//! operator's reserved slot defers everything to call time: it re-resolves
//! its operator through a weak handle (so a destroyed operator fails
//! `NotFound` rather than being kept alive) and then looks up whatever is
//! *currently* composed under the `autograd` key. Nothing is captured at
//! bind time; calling before both halves are present fails
//! `IncompleteComposition` naming the missing half.

use std::sync::Arc;

use crate::error::{DispatchError, RegistryError};
use crate::key::DispatchKey;
use crate::lifetime::{LifetimeRegistry, OpId};
use crate::meta::Provenance;
use crate::point::{KernelEntry, Operator};
use crate::value::Kernel;

/// Binds the indirection proxy into `op`'s reserved slot.
///
/// The proxy holds only the registry handle and the operator's weak id;
/// it never holds the operator itself.
pub(crate) fn bind(registry: &LifetimeRegistry, id: OpId, op: &Operator) {
	let registry = registry.clone();
	let kernel: Kernel = Arc::new(move |args| {
		let op = registry.resolve(id)?;
		match op.kernel(DispatchKey::Autograd) {
			Some(entry) => (entry.kernel)(args),
			None => Err(DispatchError::IncompleteComposition {
				op: op.name().as_str().to_string(),
				missing: describe_missing(&op),
			}
			.into()),
		}
	});
	op.bind_indirection(KernelEntry {
		kernel,
		provenance: Provenance::new("<autograd indirection>"),
	});
}

/// Composes the save/backward pair into the `autograd` kernel once both
/// halves are registered. Idempotent until then.
pub(crate) fn compose_if_complete(op: &Operator) -> Result<(), RegistryError> {
	let (Some(save), Some(backward)) = (
		op.kernel(DispatchKey::SaveForBackward),
		op.kernel(DispatchKey::Backward),
	) else {
		return Ok(());
	};
	if op.has_kind(DispatchKey::Autograd) {
		return Ok(());
	}

	let provenance = Provenance::new(format!(
		"<composed from {} and {}>",
		save.provenance, backward.provenance
	));
	let save_kernel = save.kernel.clone();
	let backward_kernel = backward.kernel.clone();
	let kernel: Kernel = Arc::new(move |args| {
		let saved = (save_kernel)(args)?;
		(backward_kernel)(&saved)
	});

	op.register_kernel(DispatchKey::Autograd, KernelEntry { kernel, provenance })?;
	tracing::debug!(op = %op.name(), "composed autograd kernel");
	Ok(())
}

fn describe_missing(op: &Operator) -> String {
	let save = op.has_kind(DispatchKey::SaveForBackward);
	let backward = op.has_kind(DispatchKey::Backward);
	match (save, backward) {
		(false, false) => "a save_for_backward step and a backward step".to_string(),
		(false, true) => "a save_for_backward step".to_string(),
		(true, false) => "a backward step".to_string(),
		// Both present means composition itself has not run yet; report the
		// pair so the message stays actionable.
		(true, true) => "composition of the registered save/backward pair".to_string(),
	}
}
