//! Registry facade: declaration, registration, teardown, and invocation.
//!
//! # Mental model
//!
//! 1. **Declare:** [`OperatorRegistry::declare`] validates the qualified
//!    name and the functional schema, obtains the host registration point,
//!    publishes the operator into the lifetime table, binds the autograd
//!    indirection proxy, and installs the host error hook.
//! 2. **Register:** kernels are attached per dispatch key, at most once
//!    per key, with external-conflict probes against the host's own
//!    registration surface.
//! 3. **Invoke:** [`OperatorRegistry::call`] profiles the arguments,
//!    selects a kernel through the priority order, and runs it.
//! 4. **Destroy:** explicit teardown removes the operator; every handle to
//!    it resolves to `NotFound` from then on.
//!
//! Registration is configuration-time; callers serialize `declare` /
//! `register` / `destroy`. Selection and invocation are safe under
//! concurrent readers and never block.

use std::sync::{Arc, OnceLock};

use opforge_schema::{Prototype, SchemaError, SchemaModel};

use crate::dispatch::{self, ArgProfile};
use crate::error::{CallError, DispatchError, RegistryError};
use crate::host::{DetachedHost, HostDispatcher};
use crate::indirection;
use crate::key::DispatchKey;
use crate::lifetime::{LifetimeRegistry, OpId};
use crate::meta::Provenance;
use crate::name::QualName;
use crate::point::{KernelEntry, Operator};
use crate::value::{Kernel, Value};

/// Schema input accepted by [`OperatorRegistry::declare`]: canonical text,
/// an already-built model, or a prototype to infer from.
pub enum SchemaSpec {
	Text(String),
	Model(SchemaModel),
	Inferred(Prototype),
}

impl From<&str> for SchemaSpec {
	fn from(text: &str) -> Self {
		Self::Text(text.to_string())
	}
}

impl From<String> for SchemaSpec {
	fn from(text: String) -> Self {
		Self::Text(text)
	}
}

impl From<SchemaModel> for SchemaSpec {
	fn from(model: SchemaModel) -> Self {
		Self::Model(model)
	}
}

impl From<Prototype> for SchemaSpec {
	fn from(proto: Prototype) -> Self {
		Self::Inferred(proto)
	}
}

/// The registry: owns the lifetime table and the host seam.
pub struct OperatorRegistry {
	points: LifetimeRegistry,
	host: Arc<dyn HostDispatcher>,
}

impl OperatorRegistry {
	/// Creates a registry bound to a host dispatcher.
	pub fn new(host: Arc<dyn HostDispatcher>) -> Self {
		Self {
			points: LifetimeRegistry::new(),
			host,
		}
	}

	/// Creates a standalone registry with no embedding framework.
	pub fn detached() -> Self {
		Self::new(Arc::new(DetachedHost))
	}

	/// The default process-wide registry.
	///
	/// Prefer constructing isolated instances; this exists for the
	/// application entry boundary, where introspection needs one shared
	/// table for the life of the process.
	pub fn global() -> &'static OperatorRegistry {
		static GLOBAL: OnceLock<OperatorRegistry> = OnceLock::new();
		GLOBAL.get_or_init(OperatorRegistry::detached)
	}

	/// Declares a new operator under `qualname` with the given schema.
	#[track_caller]
	pub fn declare(&self, qualname: &str, schema: impl Into<SchemaSpec>) -> Result<OpId, RegistryError> {
		self.declare_at(qualname, schema, Provenance::caller())
	}

	/// Declares with an explicit provenance, for callers that relay
	/// declarations from elsewhere.
	pub fn declare_at(
		&self,
		qualname: &str,
		schema: impl Into<SchemaSpec>,
		provenance: Provenance,
	) -> Result<OpId, RegistryError> {
		let name = QualName::parse(qualname)?;
		let schema = match schema.into() {
			SchemaSpec::Text(text) => SchemaModel::parse(&text)?,
			SchemaSpec::Model(model) => model,
			SchemaSpec::Inferred(proto) => proto.infer(&[])?,
		};
		schema.validate_functional()?;

		let handle = self.host.find_registration_point(name.as_str())?;
		let op = Arc::new(Operator::new(name, schema, provenance, handle));
		let id = self.points.put(op.clone())?;

		indirection::bind(&self.points, id, &op);
		let hook_name = op.name().clone();
		self.host.set_error_hook(
			handle,
			Arc::new(move |key| dispatch::missing_key_error(&hook_name, key)),
		);

		tracing::debug!(op = %op.name(), schema = %op.schema(), "declared operator");
		Ok(id)
	}

	/// Declares from explicit schema text while checking that `prototype`
	/// structurally matches it (same ordered names in the same groups, no
	/// defaults on either side). For callers that keep a separate callable
	/// whose signature must agree with the declared contract.
	#[track_caller]
	pub fn declare_matching(
		&self,
		qualname: &str,
		schema_text: &str,
		prototype: &Prototype,
	) -> Result<OpId, RegistryError> {
		let provenance = Provenance::caller();
		let schema = SchemaModel::parse(schema_text)?;
		schema.matches(prototype)?;
		self.declare_at(qualname, schema, provenance)
	}

	/// Declares an operator for a registration point the host already
	/// knows, importing its schema from the host.
	pub fn adopt(&self, qualname: &str) -> Result<OpId, RegistryError> {
		if let Some(id) = self.lookup(qualname) {
			return Ok(id);
		}
		let name = QualName::parse(qualname)?;
		let Some(text) = self.host.schema_text(qualname) else {
			return Err(RegistryError::NotFound {
				name: qualname.to_string(),
				suggestion: self.points.suggest(qualname),
			});
		};
		// The host's declared contract is authoritative; it is not re-checked
		// against the functional rules for fresh declarations.
		let schema = SchemaModel::parse(&text)?;
		let handle = self.host.find_registration_point(qualname)?;
		let op = Arc::new(Operator::new(
			name,
			schema,
			Provenance::new("<adopted from host>"),
			handle,
		));
		let id = self.points.put(op.clone())?;
		tracing::debug!(op = %op.name(), "adopted host operator");
		Ok(id)
	}

	/// Registers a kernel under `key`.
	#[track_caller]
	pub fn register(&self, id: OpId, key: DispatchKey, kernel: Kernel) -> Result<(), RegistryError> {
		self.register_at(id, key, kernel, Provenance::caller())
	}

	/// Registers with an explicit provenance.
	pub fn register_at(
		&self,
		id: OpId,
		key: DispatchKey,
		kernel: Kernel,
		provenance: Provenance,
	) -> Result<(), RegistryError> {
		let op = self.points.resolve(id)?;

		match key {
			DispatchKey::Device(_) => self.check_no_external_conflict_on(&op, key)?,
			DispatchKey::Meta => self.check_meta_registrable(&op)?,
			DispatchKey::SaveForBackward | DispatchKey::Backward => {
				self.check_backward_registrable(&op)?;
			}
			_ => {}
		}

		op.register_kernel(key, KernelEntry { kernel, provenance })?;
		tracing::debug!(op = %op.name(), %key, "registered kernel");

		if matches!(key, DispatchKey::SaveForBackward | DispatchKey::Backward) {
			if !op.has_indirection() {
				indirection::bind(&self.points, id, &op);
			}
			indirection::compose_if_complete(&op)?;
		}
		Ok(())
	}

	/// Registers the backward half of a differentiation formula together
	/// with a per-output differentiability mask.
	#[track_caller]
	pub fn register_backward(
		&self,
		id: OpId,
		kernel: Kernel,
		output_differentiability: Option<Vec<bool>>,
	) -> Result<(), RegistryError> {
		let provenance = Provenance::caller();
		if let Some(mask) = &output_differentiability {
			let op = self.points.resolve(id)?;
			let expected = op.schema().returns().len();
			if mask.len() != expected {
				return Err(RegistryError::DifferentiabilityMismatch {
					op: op.name().as_str().to_string(),
					expected,
					got: mask.len(),
				});
			}
		}
		self.register_at(id, DispatchKey::Backward, kernel, provenance)?;
		if let Some(mask) = output_differentiability {
			self.points.resolve(id)?.set_differentiability(mask);
		}
		Ok(())
	}

	/// Returns true when a kernel for `key` is registered on a live
	/// operator.
	pub fn has_kind(&self, id: OpId, key: DispatchKey) -> bool {
		self.points.resolve(id).is_ok_and(|op| op.has_kind(key))
	}

	/// Probes the host for a kernel supplied through its own registration
	/// surface; fails `ExternalConflict` if one exists and `key` was not
	/// registered here.
	pub fn check_no_external_conflict(&self, id: OpId, key: DispatchKey) -> Result<(), RegistryError> {
		let op = self.points.resolve(id)?;
		self.check_no_external_conflict_on(&op, key)
	}

	/// Destroys an operator. Afterwards every lookup through any handle
	/// fails `NotFound`.
	pub fn destroy(&self, id: OpId) -> Result<(), RegistryError> {
		let op = self.points.remove(id)?;
		tracing::debug!(op = %op.name(), "destroyed operator");
		Ok(())
	}

	/// Returns the handle for a live name.
	pub fn lookup(&self, name: &str) -> Option<OpId> {
		self.points.get(name)
	}

	/// Resolves a handle for introspection.
	pub fn resolve(&self, id: OpId) -> Result<Arc<Operator>, DispatchError> {
		self.points.resolve(id)
	}

	/// Selects the kernel a call with these argument profiles would run.
	pub fn select(&self, id: OpId, args: &[ArgProfile]) -> Result<Arc<KernelEntry>, DispatchError> {
		let op = self.points.resolve(id)?;
		dispatch::select(&op, args)
	}

	/// Selects the abstract kernel used for shape inference.
	pub fn select_for_shape_inference(&self, id: OpId) -> Result<Arc<KernelEntry>, DispatchError> {
		let op = self.points.resolve(id)?;
		dispatch::select_for_shape_inference(&op)
	}

	/// Profiles `args`, selects a kernel, and invokes it.
	pub fn call(&self, id: OpId, args: &[Value]) -> Result<Vec<Value>, CallError> {
		let op = self.points.resolve(id)?;
		let profiles = ArgProfile::of_args(args);
		let entry = dispatch::select(&op, &profiles)?;
		(entry.kernel)(args)
	}

	/// The abstract (meta) kernel registered for `name`, if any.
	pub fn abstract_impl(&self, name: &str) -> Option<Kernel> {
		let id = self.lookup(name)?;
		let op = self.points.resolve(id).ok()?;
		op.kernel(DispatchKey::Meta).map(|entry| entry.kernel.clone())
	}

	/// The lifetime table backing this registry.
	pub fn points(&self) -> &LifetimeRegistry {
		&self.points
	}

	fn check_no_external_conflict_on(&self, op: &Operator, key: DispatchKey) -> Result<(), RegistryError> {
		if op.has_kind(key) {
			// The duplicate is local; registration reports it with the
			// prior provenance instead.
			return Ok(());
		}
		if self.host.has_existing_kernel(op.name().as_str(), key) {
			return Err(RegistryError::ExternalConflict {
				op: op.name().as_str().to_string(),
				key,
			});
		}
		Ok(())
	}

	/// Meta registration rules: a host `composite_explicit` kernel without
	/// a host `meta` kernel is an accepted escape hatch; a host `meta` or
	/// `composite_implicit` kernel conflicts.
	fn check_meta_registrable(&self, op: &Operator) -> Result<(), RegistryError> {
		if op.has_kind(DispatchKey::Meta) {
			return Ok(());
		}
		let name = op.name().as_str();
		if self.host.has_existing_kernel(name, DispatchKey::CompositeExplicit)
			&& !self.host.has_existing_kernel(name, DispatchKey::Meta)
		{
			return Ok(());
		}
		for key in [DispatchKey::CompositeImplicit, DispatchKey::Meta] {
			if self.host.has_existing_kernel(name, key) {
				return Err(RegistryError::ExternalConflict {
					op: name.to_string(),
					key,
				});
			}
		}
		Ok(())
	}

	/// Backward registration rules: the schema must be functional with
	/// differentiable returns, and the host must not already provide an
	/// autograd formula through its own surface.
	fn check_backward_registrable(&self, op: &Operator) -> Result<(), RegistryError> {
		op.schema().validate_functional()?;
		if let Some(bad) = op.schema().returns().iter().find(|r| !r.kind.is_differentiable_return()) {
			return Err(RegistryError::Schema(SchemaError::UnsupportedType {
				name: format!("return of `{}`", op.name()),
				annotation: bad.kind.to_string(),
			}));
		}

		// Operators that bound the indirection at declare time own their
		// autograd story; only adopted operators probe the host here.
		if !op.has_indirection() {
			let name = op.name().as_str();
			for key in [DispatchKey::CompositeImplicit, DispatchKey::Autograd] {
				if self.host.has_existing_kernel(name, key) {
					return Err(RegistryError::ExternalConflict {
						op: name.to_string(),
						key,
					});
				}
			}
		}
		Ok(())
	}
}
