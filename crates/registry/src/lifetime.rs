//! Ownership root for live operators.
//!
//! # Role
//!
//! The [`LifetimeRegistry`] is the sole owner of every live [`Operator`]:
//! introspection can find any operator by name for as long as the process
//! runs, unless a test explicitly tears it down. Handles given out to
//! callers ([`OpId`]) are weak (a slot index plus a generation counter),
//! so a destroyed operator resolves to `NotFound` instead of dangling, and
//! nothing outside this table can keep one alive.
//!
//! # Mental model
//!
//! 1. `put` assigns a slot (reusing freed slots with a bumped generation)
//!    and publishes a new snapshot.
//! 2. `resolve` loads the current snapshot and checks the generation.
//! 3. `remove` clears the occupant but keeps the slot's name as a tombstone
//!    for diagnostics.
//!
//! # Concurrency
//!
//! - Reads: wait-free (atomic snapshot load).
//! - Writes: clone-and-CAS retry loop; a concurrent `put` race loser
//!   observes `DuplicateDeclaration`, never a torn table.

use std::sync::Arc;

use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;

use crate::error::{DispatchError, RegistryError};
use crate::point::Operator;

/// Weak, generation-checked handle to a live operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId {
	slot: u32,
	generation: u32,
}

#[derive(Clone)]
struct Slot {
	generation: u32,
	occupant: Option<Arc<Operator>>,
	/// Name of the current or most recent occupant, kept as a tombstone so
	/// stale-handle errors can still name the operator.
	name: Arc<str>,
}

#[derive(Clone, Default)]
struct TableSnapshot {
	by_name: FxHashMap<Arc<str>, OpId>,
	slots: Vec<Slot>,
}

/// Table of live operators, keyed by qualified name.
///
/// Cheap to clone; clones share the same table. Construct isolated
/// instances in tests, and use the process-wide instance only at the
/// application entry boundary.
#[derive(Clone)]
pub struct LifetimeRegistry {
	snap: Arc<ArcSwap<TableSnapshot>>,
}

impl LifetimeRegistry {
	pub fn new() -> Self {
		Self {
			snap: Arc::new(ArcSwap::from_pointee(TableSnapshot::default())),
		}
	}

	/// Publishes a new operator, failing `DuplicateDeclaration` if its name
	/// is already live.
	pub fn put(&self, op: Arc<Operator>) -> Result<OpId, RegistryError> {
		let name: Arc<str> = op.name().as_str().into();
		loop {
			let old = self.snap.load_full();
			if let Some(existing) = old.by_name.get(&name).and_then(|id| old.occupant(*id)) {
				return Err(RegistryError::DuplicateDeclaration {
					name: name.to_string(),
					prior: existing.provenance().clone(),
				});
			}

			let mut snap = (*old).clone();
			let id = match snap.slots.iter().position(|s| s.occupant.is_none()) {
				Some(index) => {
					let generation = snap.slots[index].generation + 1;
					snap.slots[index] = Slot {
						generation,
						occupant: Some(op.clone()),
						name: name.clone(),
					};
					OpId {
						slot: index as u32,
						generation,
					}
				}
				None => {
					snap.slots.push(Slot {
						generation: 1,
						occupant: Some(op.clone()),
						name: name.clone(),
					});
					OpId {
						slot: (snap.slots.len() - 1) as u32,
						generation: 1,
					}
				}
			};
			snap.by_name.insert(name.clone(), id);

			let prev = self.snap.compare_and_swap(&old, Arc::new(snap));
			if Arc::ptr_eq(&prev, &old) {
				return Ok(id);
			}
		}
	}

	/// Returns the handle for a live name.
	pub fn get(&self, name: &str) -> Option<OpId> {
		let snap = self.snap.load();
		let id = *snap.by_name.get(name)?;
		snap.occupant(id).is_some().then_some(id)
	}

	/// Resolves a handle to its operator, failing `NotFound` once the
	/// operator has been destroyed or the handle never existed.
	pub fn resolve(&self, id: OpId) -> Result<Arc<Operator>, DispatchError> {
		let snap = self.snap.load();
		match snap.slots.get(id.slot as usize) {
			Some(slot) if slot.generation == id.generation => {
				slot.occupant.clone().ok_or_else(|| DispatchError::NotFound {
					op: slot.name.to_string(),
				})
			}
			Some(slot) => Err(DispatchError::NotFound {
				op: slot.name.to_string(),
			}),
			None => Err(DispatchError::NotFound {
				op: "<unknown>".to_string(),
			}),
		}
	}

	/// Removes an operator, returning it; stale handles fail `NotFound`.
	pub fn remove(&self, id: OpId) -> Result<Arc<Operator>, DispatchError> {
		loop {
			let old = self.snap.load_full();
			let Some(op) = old.occupant(id) else {
				let name = old
					.slots
					.get(id.slot as usize)
					.map_or_else(|| "<unknown>".to_string(), |s| s.name.to_string());
				return Err(DispatchError::NotFound { op: name });
			};

			let mut snap = (*old).clone();
			snap.slots[id.slot as usize].occupant = None;
			snap.by_name.remove(op.name().as_str());

			let prev = self.snap.compare_and_swap(&old, Arc::new(snap));
			if Arc::ptr_eq(&prev, &old) {
				return Ok(op);
			}
		}
	}

	/// Names of all live operators.
	pub fn names(&self) -> Vec<String> {
		let snap = self.snap.load();
		let mut names: Vec<String> = snap.by_name.keys().map(|n| n.to_string()).collect();
		names.sort();
		names
	}

	pub fn len(&self) -> usize {
		self.snap.load().by_name.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Suggests the closest live name, for not-found diagnostics.
	pub fn suggest(&self, name: &str) -> Option<String> {
		self.names()
			.into_iter()
			.min_by_key(|candidate| strsim::levenshtein(name, candidate))
			.filter(|candidate| strsim::levenshtein(name, candidate) <= 3)
	}
}

impl Default for LifetimeRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl TableSnapshot {
	fn occupant(&self, id: OpId) -> Option<Arc<Operator>> {
		let slot = self.slots.get(id.slot as usize)?;
		if slot.generation == id.generation {
			slot.occupant.clone()
		} else {
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use opforge_schema::SchemaModel;

	use super::*;
	use crate::error::{DispatchError, RegistryError};
	use crate::host::HostHandle;
	use crate::meta::Provenance;
	use crate::name::QualName;
	use crate::point::Operator;

	fn op(name: &str) -> Arc<Operator> {
		Arc::new(Operator::new(
			QualName::parse(name).unwrap(),
			SchemaModel::parse("(Tensor x) -> Tensor").unwrap(),
			Provenance::new("test"),
			HostHandle(0),
		))
	}

	/// put/get/resolve agree on live operators.
	#[test]
	fn put_then_resolve() {
		let table = LifetimeRegistry::new();
		let id = table.put(op("t::a")).unwrap();
		assert_eq!(table.get("t::a"), Some(id));
		assert_eq!(table.resolve(id).unwrap().name().as_str(), "t::a");
		assert_eq!(table.len(), 1);
	}

	/// A second put of the same name fails `DuplicateDeclaration`.
	#[test]
	fn duplicate_put_is_rejected() {
		let table = LifetimeRegistry::new();
		table.put(op("t::a")).unwrap();
		assert!(matches!(
			table.put(op("t::a")),
			Err(RegistryError::DuplicateDeclaration { .. })
		));
		assert_eq!(table.len(), 1);
	}

	/// Removal invalidates old handles and frees the name.
	#[test]
	fn remove_invalidates_handles() {
		let table = LifetimeRegistry::new();
		let id = table.put(op("t::a")).unwrap();
		table.remove(id).unwrap();

		assert_eq!(table.get("t::a"), None);
		match table.resolve(id) {
			Err(DispatchError::NotFound { op }) => assert_eq!(op, "t::a"),
			other => panic!("expected NotFound, got {other:?}"),
		}
		assert!(matches!(table.remove(id), Err(DispatchError::NotFound { .. })));
	}

	/// Slot reuse bumps the generation, so handles from a previous occupant
	/// stay stale after the name is redeclared.
	#[test]
	fn slot_reuse_keeps_old_handles_stale() {
		let table = LifetimeRegistry::new();
		let first = table.put(op("t::a")).unwrap();
		table.remove(first).unwrap();
		let second = table.put(op("t::a")).unwrap();

		assert_ne!(first, second);
		assert!(table.resolve(first).is_err());
		assert_eq!(table.resolve(second).unwrap().name().as_str(), "t::a");
	}

	/// Near-miss lookups produce a nearest-name suggestion.
	#[test]
	fn suggestions_use_edit_distance() {
		let table = LifetimeRegistry::new();
		table.put(op("mylib::add_one")).unwrap();
		assert_eq!(table.suggest("mylib::add_on"), Some("mylib::add_one".to_string()));
		assert_eq!(table.suggest("other::completely_different"), None);
	}
}
