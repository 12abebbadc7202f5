//! End-to-end registry behavior tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::{
	ArgProfile, CallError, DeviceKind, DispatchError, DispatchKey, ErrorHook, HostDispatcher,
	HostHandle, Kernel, OperatorRegistry, Prototype, Provenance, RegistryError, SchemaError, Value,
	kernel,
};

/// Host fake: preconfigured external kernels and schemas, and it captures
/// the error hook installed at declare time.
#[derive(Default)]
struct FakeHost {
	existing: HashSet<(String, DispatchKey)>,
	schemas: HashMap<String, String>,
	hook: Mutex<Option<ErrorHook>>,
}

impl FakeHost {
	fn new() -> Self {
		Self::default()
	}

	fn with_kernel(mut self, name: &str, key: DispatchKey) -> Self {
		self.existing.insert((name.to_string(), key));
		self
	}

	fn with_schema(mut self, name: &str, text: &str) -> Self {
		self.schemas.insert(name.to_string(), text.to_string());
		self
	}

	fn installed_hook(&self) -> Option<ErrorHook> {
		self.hook.lock().unwrap().clone()
	}
}

impl HostDispatcher for FakeHost {
	fn find_registration_point(&self, _name: &str) -> Result<HostHandle, DispatchError> {
		Ok(HostHandle(1))
	}

	fn has_existing_kernel(&self, name: &str, key: DispatchKey) -> bool {
		self.existing.contains(&(name.to_string(), key))
	}

	fn set_error_hook(&self, _handle: HostHandle, hook: ErrorHook) {
		*self.hook.lock().unwrap() = Some(hook);
	}

	fn schema_text(&self, name: &str) -> Option<String> {
		self.schemas.get(name).cloned()
	}
}

fn noop_kernel() -> Kernel {
	kernel(|args| Ok(args.to_vec()))
}

fn add_one_schema() -> Prototype {
	Prototype::new().param("x", "Tensor").returns("Tensor")
}

/// Declaration succeeds exactly once per qualified name.
#[test]
fn declare_is_unique_per_name() {
	let registry = OperatorRegistry::detached();
	registry.declare("mylib::foo", "(Tensor x) -> Tensor").unwrap();

	match registry.declare("mylib::foo", "(Tensor x) -> Tensor") {
		Err(RegistryError::DuplicateDeclaration { name, .. }) => assert_eq!(name, "mylib::foo"),
		other => panic!("expected DuplicateDeclaration, got {other:?}"),
	}

	// A different symbol in the same namespace is unaffected.
	registry.declare("mylib::bar", "(Tensor x) -> Tensor").unwrap();
}

/// Name violations fail fast and leave nothing behind.
#[test]
fn declare_validates_names() {
	let registry = OperatorRegistry::detached();

	assert!(matches!(
		registry.declare("no_namespace", "(Tensor x) -> Tensor"),
		Err(RegistryError::InvalidName { .. })
	));
	assert!(matches!(
		registry.declare("aten::foo", "(Tensor x) -> Tensor"),
		Err(RegistryError::ReservedNamespace { .. })
	));
	assert!(registry.points().is_empty());
}

/// A non-functional schema fails declaration without partial mutation.
#[test]
fn declare_requires_functional_schema() {
	let registry = OperatorRegistry::detached();

	assert!(matches!(
		registry.declare("mylib::no_ret", "(Tensor x) -> ()"),
		Err(RegistryError::Schema(SchemaError::NonFunctionalSchema { .. }))
	));
	assert!(matches!(
		registry.declare("mylib::view", "(Tensor(a0) x) -> Tensor(a0)"),
		Err(RegistryError::Schema(SchemaError::NonFunctionalSchema { .. }))
	));
	assert_eq!(registry.lookup("mylib::no_ret"), None);
	assert_eq!(registry.lookup("mylib::view"), None);
	assert!(registry.points().is_empty());
}

/// Malformed schema text is rejected at declaration.
#[test]
fn declare_rejects_malformed_schema_text() {
	let registry = OperatorRegistry::detached();
	assert!(matches!(
		registry.declare("mylib::bad", "Tensor x -> Tensor"),
		Err(RegistryError::Schema(SchemaError::MalformedSchema { .. }))
	));
}

/// Schemas can be supplied as prototypes and are inferred on the way in.
#[test]
fn declare_accepts_prototypes() {
	let registry = OperatorRegistry::detached();
	let id = registry.declare("mylib::add_one", add_one_schema()).unwrap();
	let op = registry.resolve(id).unwrap();
	assert_eq!(op.schema().to_string(), "(Tensor x) -> Tensor");
}

/// A kind accepts exactly one kernel, regardless of callable identity, and
/// the error names the prior registration site.
#[test]
fn duplicate_kind_registration_is_rejected() {
	let registry = OperatorRegistry::detached();
	let id = registry.declare("mylib::foo", "(Tensor x) -> Tensor").unwrap();

	let k = noop_kernel();
	registry
		.register_at(id, DispatchKey::CPU, k.clone(), Provenance::new("first_site"))
		.unwrap();

	// Identical callable, same kind: still rejected.
	match registry.register_at(id, DispatchKey::CPU, k, Provenance::new("second_site")) {
		Err(RegistryError::DuplicateKindRegistration { op, key, prior }) => {
			assert_eq!(op, "mylib::foo");
			assert_eq!(key, DispatchKey::CPU);
			assert_eq!(prior.as_str(), "first_site");
		}
		other => panic!("expected DuplicateKindRegistration, got {other:?}"),
	}

	// The failed call did not disturb the original registration.
	assert!(registry.has_kind(id, DispatchKey::CPU));
}

/// Among mixed device kinds, the accelerator kernel wins, independent of
/// argument order and registration order.
#[test]
fn select_prefers_highest_ranked_device() {
	let registry = OperatorRegistry::detached();
	let id = registry.declare("mylib::mix", "(Tensor a, Tensor b) -> Tensor").unwrap();

	let cpu = noop_kernel();
	let cuda = noop_kernel();
	// Register the lower-priority kind last; order must not matter.
	registry.register(id, DispatchKey::CUDA, cuda.clone()).unwrap();
	registry.register(id, DispatchKey::CPU, cpu.clone()).unwrap();

	let mixed = [
		ArgProfile::Tensor(DeviceKind::Cuda),
		ArgProfile::Tensor(DeviceKind::Cpu),
	];
	let selected = registry.select(id, &mixed).unwrap();
	assert!(Arc::ptr_eq(&selected.kernel, &cuda));

	let reversed = [
		ArgProfile::Tensor(DeviceKind::Cpu),
		ArgProfile::Tensor(DeviceKind::Cuda),
	];
	let selected = registry.select(id, &reversed).unwrap();
	assert!(Arc::ptr_eq(&selected.kernel, &cuda));

	let host_only = [ArgProfile::Tensor(DeviceKind::Cpu), ArgProfile::Opaque];
	let selected = registry.select(id, &host_only).unwrap();
	assert!(Arc::ptr_eq(&selected.kernel, &cpu));
}

/// Selection is deterministic: same registrations, same profiles, same
/// kernel.
#[test]
fn select_is_deterministic() {
	let registry = OperatorRegistry::detached();
	let id = registry.declare("mylib::det", "(Tensor x) -> Tensor").unwrap();
	registry.register(id, DispatchKey::CPU, noop_kernel()).unwrap();

	let args = [ArgProfile::Tensor(DeviceKind::Cpu)];
	let first = registry.select(id, &args).unwrap();
	let second = registry.select(id, &args).unwrap();
	assert!(Arc::ptr_eq(&first, &second));
}

/// Zero tensor-family arguments: `NoTensorInputs` without a factory
/// kernel; the factory kernel unconditionally otherwise.
#[test]
fn select_with_no_tensor_inputs() {
	let registry = OperatorRegistry::detached();
	let id = registry.declare("mylib::make", "(SymInt n) -> Tensor").unwrap();
	registry.register(id, DispatchKey::CPU, noop_kernel()).unwrap();

	for args in [&[][..], &[ArgProfile::Opaque][..]] {
		match registry.select(id, args) {
			Err(DispatchError::NoTensorInputs { op }) => assert_eq!(op, "mylib::make"),
			other => panic!("expected NoTensorInputs, got {other:?}"),
		}
	}

	let factory = noop_kernel();
	registry.register(id, DispatchKey::Factory, factory.clone()).unwrap();
	let selected = registry.select(id, &[ArgProfile::Opaque]).unwrap();
	assert!(Arc::ptr_eq(&selected.kernel, &factory));

	// Tensor inputs still dispatch by device, not to the factory kernel.
	let selected = registry.select(id, &[ArgProfile::Tensor(DeviceKind::Cpu)]).unwrap();
	assert!(!Arc::ptr_eq(&selected.kernel, &factory));
}

/// A missing kernel for the winning kind names the operator and the kind.
#[test]
fn select_missing_device_is_actionable() {
	let registry = OperatorRegistry::detached();
	let id = registry.declare("mylib::cpu_only", "(Tensor x) -> Tensor").unwrap();
	registry.register(id, DispatchKey::CPU, noop_kernel()).unwrap();

	match registry.select(id, &[ArgProfile::Tensor(DeviceKind::Cuda)]) {
		Err(err @ DispatchError::NoImplementation { .. }) => {
			let message = err.to_string();
			assert!(message.contains("mylib::cpu_only"), "message: {message}");
			assert!(message.contains("cuda"), "message: {message}");
		}
		other => panic!("expected NoImplementation, got {other:?}"),
	}
}

/// Shape inference: `meta` wins, `composite_explicit` substitutes, nothing
/// else satisfies it.
#[test]
fn shape_inference_selection() {
	let registry = OperatorRegistry::detached();
	let id = registry.declare("mylib::shapes", "(Tensor x) -> Tensor").unwrap();
	registry.register(id, DispatchKey::CPU, noop_kernel()).unwrap();

	assert!(matches!(
		registry.select_for_shape_inference(id),
		Err(DispatchError::NoAbstractImpl { .. })
	));

	let composite = noop_kernel();
	registry.register(id, DispatchKey::CompositeExplicit, composite.clone()).unwrap();
	let selected = registry.select_for_shape_inference(id).unwrap();
	assert!(Arc::ptr_eq(&selected.kernel, &composite));

	let meta = noop_kernel();
	registry.register(id, DispatchKey::Meta, meta.clone()).unwrap();
	let selected = registry.select_for_shape_inference(id).unwrap();
	assert!(Arc::ptr_eq(&selected.kernel, &meta));
}

/// Destroy removes the name and invalidates every outstanding handle.
#[test]
fn destroy_invalidates_handles() {
	let registry = OperatorRegistry::detached();
	let id = registry.declare("mylib::gone", "(Tensor x) -> Tensor").unwrap();
	registry.register(id, DispatchKey::CPU, noop_kernel()).unwrap();

	registry.destroy(id).unwrap();

	assert_eq!(registry.lookup("mylib::gone"), None);
	assert!(!registry.has_kind(id, DispatchKey::CPU));
	assert!(matches!(
		registry.select(id, &[ArgProfile::Tensor(DeviceKind::Cpu)]),
		Err(DispatchError::NotFound { .. })
	));
	// Stale teardown is benign: a clean NotFound, nothing worse.
	assert!(matches!(
		registry.destroy(id),
		Err(RegistryError::Dispatch(DispatchError::NotFound { .. }))
	));

	// The name is free for redeclaration, and the old handle stays stale.
	let second = registry.declare("mylib::gone", "(Tensor x) -> Tensor").unwrap();
	assert_ne!(id, second);
	assert!(registry.resolve(id).is_err());
	assert!(registry.resolve(second).is_ok());
}

/// Full lifecycle: declare from a prototype, register a host kernel,
/// dispatch to it, and fail closed with no tensor inputs.
#[test]
fn end_to_end_add_one() {
	let registry = OperatorRegistry::detached();
	let id = registry.declare("mylib::add_one", add_one_schema()).unwrap();

	let cpu = kernel(|args| {
		let input = args[0].as_tensor().expect("tensor argument");
		let data: &Vec<f64> = input.payload().expect("f64 payload");
		let bumped: Vec<f64> = data.iter().map(|x| x + 1.0).collect();
		Ok(vec![Value::tensor(input.device(), bumped)])
	});
	registry.register(id, DispatchKey::CPU, cpu.clone()).unwrap();

	let selected = registry.select(id, &[ArgProfile::Tensor(DeviceKind::Cpu)]).unwrap();
	assert!(Arc::ptr_eq(&selected.kernel, &cpu));

	let out = registry
		.call(id, &[Value::tensor(DeviceKind::Cpu, vec![1.0f64, 2.0])])
		.unwrap();
	let out_tensor = out[0].as_tensor().unwrap();
	assert_eq!(out_tensor.payload::<Vec<f64>>().unwrap(), &vec![2.0, 3.0]);

	match registry.select(id, &[]) {
		Err(DispatchError::NoTensorInputs { op }) => assert_eq!(op, "mylib::add_one"),
		other => panic!("expected NoTensorInputs, got {other:?}"),
	}
}

/// The indirection proxy defers composition to call time: incomplete
/// pairs fail with the missing half named, and completing the pair in
/// either order makes the composed kernel live.
#[test]
fn indirection_composes_in_either_order() {
	for save_first in [true, false] {
		let registry = OperatorRegistry::detached();
		let id = registry.declare("mylib::train", "(Tensor x) -> Tensor").unwrap();
		let op = registry.resolve(id).unwrap();
		let proxy = op.indirection().expect("indirection bound at declare");

		let args = [Value::tensor(DeviceKind::Cpu, vec![1.0f64])];
		match (proxy.kernel)(&args) {
			Err(CallError::Dispatch(DispatchError::IncompleteComposition { missing, .. })) => {
				assert!(missing.contains("save_for_backward"), "missing: {missing}");
				assert!(missing.contains("backward"), "missing: {missing}");
			}
			other => panic!("expected IncompleteComposition, got {other:?}"),
		}

		// The save step tags what it saw; the backward step checks it ran
		// downstream of the save step.
		let save = kernel(|args| {
			let mut saved = args.to_vec();
			saved.push(Value::Str("saved".to_string()));
			Ok(saved)
		});
		let backward = kernel(|saved| {
			match saved.last() {
				Some(Value::Str(tag)) if tag == "saved" => {}
				other => panic!("backward did not receive the save step's output: {other:?}"),
			}
			Ok(vec![saved[0].clone()])
		});

		let (first, first_key, second, second_key) = if save_first {
			(save, DispatchKey::SaveForBackward, backward, DispatchKey::Backward)
		} else {
			(backward, DispatchKey::Backward, save, DispatchKey::SaveForBackward)
		};

		registry.register(id, first_key, first).unwrap();
		match (proxy.kernel)(&args) {
			Err(CallError::Dispatch(DispatchError::IncompleteComposition { missing, .. })) => {
				assert!(
					missing.contains(second_key.token()),
					"missing `{missing}` should name `{second_key}`"
				);
			}
			other => panic!("expected IncompleteComposition, got {other:?}"),
		}

		registry.register(id, second_key, second).unwrap();
		let out = (proxy.kernel)(&args).expect("composed kernel should run");
		assert_eq!(out.len(), 1);

		// The composed kernel is a first-class registration under `autograd`.
		let composed = op.kernel(DispatchKey::Autograd).expect("autograd kernel composed");
		assert!(composed.provenance.as_str().contains("composed"));
	}
}

/// The proxy's back-reference is weak: after destroy it fails `NotFound`
/// instead of keeping the operator alive.
#[test]
fn indirection_is_weak_after_destroy() {
	let registry = OperatorRegistry::detached();
	let id = registry.declare("mylib::ghost", "(Tensor x) -> Tensor").unwrap();
	let proxy = registry.resolve(id).unwrap().indirection().unwrap();

	registry.destroy(id).unwrap();

	let args = [Value::tensor(DeviceKind::Cpu, vec![0.0f64])];
	match (proxy.kernel)(&args) {
		Err(CallError::Dispatch(DispatchError::NotFound { op })) => assert_eq!(op, "mylib::ghost"),
		other => panic!("expected NotFound, got {other:?}"),
	}
}

/// A kernel already supplied through the host's registration surface
/// blocks registration here.
#[test]
fn external_conflicts_are_detected() {
	let host = Arc::new(FakeHost::new().with_kernel("mylib::busy", DispatchKey::CPU));
	let registry = OperatorRegistry::new(host);
	let id = registry.declare("mylib::busy", "(Tensor x) -> Tensor").unwrap();

	match registry.register(id, DispatchKey::CPU, noop_kernel()) {
		Err(RegistryError::ExternalConflict { op, key }) => {
			assert_eq!(op, "mylib::busy");
			assert_eq!(key, DispatchKey::CPU);
		}
		other => panic!("expected ExternalConflict, got {other:?}"),
	}

	// Other kinds are unaffected.
	registry.register(id, DispatchKey::CUDA, noop_kernel()).unwrap();
}

/// Meta registration honors the composite-explicit escape hatch and the
/// composite-implicit / meta conflicts.
#[test]
fn meta_registration_conflict_rules() {
	// Host composite-explicit without host meta: escape hatch, allowed.
	let host = Arc::new(FakeHost::new().with_kernel("mylib::esc", DispatchKey::CompositeExplicit));
	let registry = OperatorRegistry::new(host);
	let id = registry.declare("mylib::esc", "(Tensor x) -> Tensor").unwrap();
	registry.register(id, DispatchKey::Meta, noop_kernel()).unwrap();

	// Host composite-implicit: conflict.
	let host = Arc::new(FakeHost::new().with_kernel("mylib::imp", DispatchKey::CompositeImplicit));
	let registry = OperatorRegistry::new(host);
	let id = registry.declare("mylib::imp", "(Tensor x) -> Tensor").unwrap();
	assert!(matches!(
		registry.register(id, DispatchKey::Meta, noop_kernel()),
		Err(RegistryError::ExternalConflict { .. })
	));

	// Host meta kernel: conflict.
	let host = Arc::new(FakeHost::new().with_kernel("mylib::met", DispatchKey::Meta));
	let registry = OperatorRegistry::new(host);
	let id = registry.declare("mylib::met", "(Tensor x) -> Tensor").unwrap();
	assert!(matches!(
		registry.register(id, DispatchKey::Meta, noop_kernel()),
		Err(RegistryError::ExternalConflict { .. })
	));
}

/// Backward formulas require differentiable return kinds.
#[test]
fn backward_requires_differentiable_returns() {
	let registry = OperatorRegistry::detached();
	let id = registry.declare("mylib::tag", "(Tensor x) -> str").unwrap();

	match registry.register(id, DispatchKey::SaveForBackward, noop_kernel()) {
		Err(RegistryError::Schema(SchemaError::UnsupportedType { annotation, .. })) => {
			assert_eq!(annotation, "str");
		}
		other => panic!("expected UnsupportedType, got {other:?}"),
	}
}

/// Backward formulas on adopted operators re-check the host-declared
/// schema and the host's autograd surface.
#[test]
fn backward_on_adopted_operators() {
	// A view-returning host schema cannot take a backward formula.
	let host = Arc::new(FakeHost::new().with_schema("mylib::view", "(Tensor(a0) x) -> Tensor(a0)"));
	let registry = OperatorRegistry::new(host);
	let id = registry.adopt("mylib::view").unwrap();
	assert!(matches!(
		registry.register(id, DispatchKey::Backward, noop_kernel()),
		Err(RegistryError::Schema(SchemaError::NonFunctionalSchema { .. }))
	));

	// A host-side autograd kernel conflicts for adopted operators.
	let host = Arc::new(
		FakeHost::new()
			.with_schema("mylib::auto", "(Tensor x) -> Tensor")
			.with_kernel("mylib::auto", DispatchKey::Autograd),
	);
	let registry = OperatorRegistry::new(host);
	let id = registry.adopt("mylib::auto").unwrap();
	assert!(matches!(
		registry.register(id, DispatchKey::Backward, noop_kernel()),
		Err(RegistryError::ExternalConflict { .. })
	));

	// A clean adopted operator gains the indirection lazily and composes.
	let host = Arc::new(FakeHost::new().with_schema("mylib::ok", "(Tensor x) -> Tensor"));
	let registry = OperatorRegistry::new(host);
	let id = registry.adopt("mylib::ok").unwrap();
	let op = registry.resolve(id).unwrap();
	assert!(!op.has_indirection());
	registry.register(id, DispatchKey::SaveForBackward, noop_kernel()).unwrap();
	assert!(op.has_indirection());
	registry.register(id, DispatchKey::Backward, noop_kernel()).unwrap();
	assert!(op.has_kind(DispatchKey::Autograd));
}

/// Differentiability masks must match the schema's return count.
#[test]
fn differentiability_mask_is_validated() {
	let registry = OperatorRegistry::detached();
	let id = registry.declare("mylib::pair", "(Tensor x) -> (Tensor, Tensor)").unwrap();

	match registry.register_backward(id, noop_kernel(), Some(vec![true])) {
		Err(RegistryError::DifferentiabilityMismatch { expected, got, .. }) => {
			assert_eq!(expected, 2);
			assert_eq!(got, 1);
		}
		other => panic!("expected DifferentiabilityMismatch, got {other:?}"),
	}

	registry.register_backward(id, noop_kernel(), Some(vec![true, false])).unwrap();
	let op = registry.resolve(id).unwrap();
	assert_eq!(op.differentiability().as_deref(), Some(&vec![true, false]));
}

/// Adoption imports the host's schema once and is idempotent; unknown
/// names fail `NotFound` with a nearest-name suggestion.
#[test]
fn adopt_imports_host_operators() {
	let host = Arc::new(FakeHost::new().with_schema("mylib::add_one", "(Tensor x) -> Tensor"));
	let registry = OperatorRegistry::new(host);

	let id = registry.adopt("mylib::add_one").unwrap();
	assert_eq!(registry.adopt("mylib::add_one").unwrap(), id);
	assert_eq!(registry.lookup("mylib::add_one"), Some(id));
	assert_eq!(
		registry.resolve(id).unwrap().schema().to_string(),
		"(Tensor x) -> Tensor"
	);

	match registry.adopt("mylib::add_on") {
		Err(err @ RegistryError::NotFound { .. }) => {
			let message = err.to_string();
			assert!(message.contains("did you mean `mylib::add_one`"), "message: {message}");
		}
		other => panic!("expected NotFound, got {other:?}"),
	}
}

/// The error hook installed on the host maps missed keys the same way the
/// resolver does.
#[test]
fn declare_installs_error_hook() {
	let host = Arc::new(FakeHost::new());
	let registry = OperatorRegistry::new(host.clone());
	registry.declare("mylib::hooked", "(Tensor x) -> Tensor").unwrap();

	let hook = host.installed_hook().expect("declare installs the hook");
	assert!(matches!(hook(DispatchKey::Factory), DispatchError::NoTensorInputs { .. }));
	assert!(matches!(hook(DispatchKey::Meta), DispatchError::NoAbstractImpl { .. }));
	match hook(DispatchKey::CUDA) {
		DispatchError::NoImplementation { op, key } => {
			assert_eq!(op, "mylib::hooked");
			assert_eq!(key, DispatchKey::CUDA);
		}
		other => panic!("expected NoImplementation, got {other:?}"),
	}
}

/// The meta kernel is introspectable by name.
#[test]
fn abstract_impl_lookup() {
	let registry = OperatorRegistry::detached();
	let id = registry.declare("mylib::meta", "(Tensor x) -> Tensor").unwrap();
	assert!(registry.abstract_impl("mylib::meta").is_none());
	assert!(registry.abstract_impl("mylib::missing").is_none());

	let meta = noop_kernel();
	registry.register(id, DispatchKey::Meta, meta.clone()).unwrap();
	let found = registry.abstract_impl("mylib::meta").unwrap();
	assert!(Arc::ptr_eq(&found, &meta));
}

/// Selection stays stable under concurrent readers once registration has
/// settled.
#[test]
fn select_is_safe_under_concurrent_readers() {
	let registry = Arc::new(OperatorRegistry::detached());
	let id = registry.declare("mylib::par", "(Tensor x) -> Tensor").unwrap();
	let cpu = noop_kernel();
	registry.register(id, DispatchKey::CPU, cpu.clone()).unwrap();

	std::thread::scope(|scope| {
		for _ in 0..4 {
			let registry = Arc::clone(&registry);
			let cpu = cpu.clone();
			scope.spawn(move || {
				for _ in 0..1000 {
					let selected = registry.select(id, &[ArgProfile::Tensor(DeviceKind::Cpu)]).unwrap();
					assert!(Arc::ptr_eq(&selected.kernel, &cpu));
				}
			});
		}
	});
}

/// Declaring against an explicit schema text checks the prototype
/// structurally, ignoring annotations.
#[test]
fn declare_matching_checks_structure() {
	let registry = OperatorRegistry::detached();

	registry
		.declare_matching(
			"mylib::checked",
			"(Tensor x, *, SymInt n) -> Tensor",
			&Prototype::new().param("x", "Tensor").kwonly("n", "i64"),
		)
		.unwrap();

	match registry.declare_matching(
		"mylib::mismatched",
		"(Tensor x) -> Tensor",
		&Prototype::new().param("y", "Tensor"),
	) {
		Err(RegistryError::Schema(SchemaError::SignatureMismatch { .. })) => {}
		other => panic!("expected SignatureMismatch, got {other:?}"),
	}
	assert_eq!(registry.lookup("mylib::mismatched"), None);
}

/// A concurrent-declare race has exactly one winner; every loser observes
/// `DuplicateDeclaration`.
#[test]
fn concurrent_declare_race_has_one_winner() {
	let registry = Arc::new(OperatorRegistry::detached());

	let outcomes: Vec<Result<(), RegistryError>> = std::thread::scope(|scope| {
		let handles: Vec<_> = (0..8)
			.map(|_| {
				let registry = Arc::clone(&registry);
				scope.spawn(move || {
					registry
						.declare("mylib::raced", "(Tensor x) -> Tensor")
						.map(|_| ())
				})
			})
			.collect();
		handles.into_iter().map(|h| h.join().unwrap()).collect()
	});

	let winners = outcomes.iter().filter(|r| r.is_ok()).count();
	assert_eq!(winners, 1);
	for outcome in outcomes {
		if let Err(err) = outcome {
			assert!(matches!(err, RegistryError::DuplicateDeclaration { .. }), "got {err:?}");
		}
	}
	assert!(registry.lookup("mylib::raced").is_some());
}

/// The process-wide default registry is a single shared instance.
#[test]
fn global_registry_is_shared() {
	let a = OperatorRegistry::global();
	let b = OperatorRegistry::global();
	assert!(std::ptr::eq(a, b));
}
