//! Live extension points and their kernel tables.
//!
//! # Role
//!
//! An [`Operator`] owns the kernels registered against it. The kernel table
//! is published through an atomic snapshot so dispatch reads are wait-free;
//! mutation is a clone-and-CAS loop. Registration is configuration-time and
//! serialized by callers, but a racing duplicate still loses cleanly with
//! `DuplicateKindRegistration` rather than corrupting the table.
//!
//! # Invariants
//!
//! - At most one kernel per dispatch key; a rejected registration leaves
//!   the table untouched.
//! - The reserved indirection slot is separate from the kind table: the
//!   composed `autograd` kernel lives in the table, the proxy that
//!   re-resolves it at call time lives in the slot.

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use opforge_schema::SchemaModel;
use rustc_hash::FxHashMap;

use crate::error::RegistryError;
use crate::host::HostHandle;
use crate::key::DispatchKey;
use crate::meta::Provenance;
use crate::name::QualName;
use crate::value::Kernel;

/// A registered kernel plus its registration site.
#[derive(Clone)]
pub struct KernelEntry {
	pub kernel: Kernel,
	pub provenance: Provenance,
}

impl std::fmt::Debug for KernelEntry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("KernelEntry").field("provenance", &self.provenance).finish_non_exhaustive()
	}
}

type KindTable = FxHashMap<DispatchKey, Arc<KernelEntry>>;

/// A declared extension point: qualified name, schema, and the kernels
/// registered against it.
pub struct Operator {
	name: QualName,
	schema: SchemaModel,
	provenance: Provenance,
	host: HostHandle,
	kinds: ArcSwap<KindTable>,
	indirection: ArcSwapOption<KernelEntry>,
	differentiability: ArcSwapOption<Vec<bool>>,
}

impl Operator {
	pub(crate) fn new(name: QualName, schema: SchemaModel, provenance: Provenance, host: HostHandle) -> Self {
		Self {
			name,
			schema,
			provenance,
			host,
			kinds: ArcSwap::from_pointee(KindTable::default()),
			indirection: ArcSwapOption::empty(),
			differentiability: ArcSwapOption::empty(),
		}
	}

	pub fn name(&self) -> &QualName {
		&self.name
	}

	pub fn schema(&self) -> &SchemaModel {
		&self.schema
	}

	/// Where this operator was declared.
	pub fn provenance(&self) -> &Provenance {
		&self.provenance
	}

	pub fn host_handle(&self) -> HostHandle {
		self.host
	}

	/// Returns the kernel registered under `key`, if any.
	pub fn kernel(&self, key: DispatchKey) -> Option<Arc<KernelEntry>> {
		self.kinds.load().get(&key).cloned()
	}

	pub fn has_kind(&self, key: DispatchKey) -> bool {
		self.kinds.load().contains_key(&key)
	}

	/// Registered keys in deterministic (token) order, for introspection.
	pub fn registered_keys(&self) -> Vec<DispatchKey> {
		let mut keys: Vec<DispatchKey> = self.kinds.load().keys().copied().collect();
		keys.sort_by_key(|k| k.token());
		keys
	}

	/// Inserts a kernel under `key`, failing without mutation if the key is
	/// already occupied.
	pub(crate) fn register_kernel(&self, key: DispatchKey, entry: KernelEntry) -> Result<(), RegistryError> {
		let entry = Arc::new(entry);
		loop {
			let old = self.kinds.load_full();
			if let Some(existing) = old.get(&key) {
				return Err(RegistryError::DuplicateKindRegistration {
					op: self.name.as_str().to_string(),
					key,
					prior: existing.provenance.clone(),
				});
			}
			let mut table = (*old).clone();
			table.insert(key, entry.clone());
			let prev = self.kinds.compare_and_swap(&old, Arc::new(table));
			if Arc::ptr_eq(&prev, &old) {
				return Ok(());
			}
		}
	}

	/// Binds the reserved indirection slot.
	pub(crate) fn bind_indirection(&self, entry: KernelEntry) {
		self.indirection.store(Some(Arc::new(entry)));
	}

	/// The proxy kernel in the reserved slot, if bound.
	pub fn indirection(&self) -> Option<Arc<KernelEntry>> {
		self.indirection.load_full()
	}

	pub fn has_indirection(&self) -> bool {
		self.indirection.load().is_some()
	}

	pub(crate) fn set_differentiability(&self, mask: Vec<bool>) {
		self.differentiability.store(Some(Arc::new(mask)));
	}

	/// Per-output differentiability mask attached with the backward formula.
	pub fn differentiability(&self) -> Option<Arc<Vec<bool>>> {
		self.differentiability.load_full()
	}
}

impl std::fmt::Debug for Operator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Operator")
			.field("name", &self.name.as_str())
			.field("schema", &self.schema.to_string())
			.field("keys", &self.registered_keys())
			.finish_non_exhaustive()
	}
}
