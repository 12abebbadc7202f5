//! Typed extension-point registry with priority-ordered kernel dispatch.
//!
//! Callers declare **operators** under a qualified `namespace::symbol` name
//! with a validated [`SchemaModel`], then register **kernels** against each
//! operator keyed by [`DispatchKey`]: a device family, the abstract
//! (`meta`) role, the `factory` role for tensor-constructing calls, or the
//! save/backward differentiation pair. Each key accepts at most one kernel;
//! invocation selects the kernel from the device kinds of the arguments
//! through a fixed priority order and fails closed with an actionable
//! error when nothing matches.
//!
//! ```
//! use opforge_registry::{DeviceKind, DispatchKey, OperatorRegistry, Value, kernel};
//!
//! let registry = OperatorRegistry::detached();
//! let id = registry.declare("mylib::add_one", "(Tensor x) -> Tensor").unwrap();
//! registry
//! 	.register(id, DispatchKey::CPU, kernel(|args| Ok(args.to_vec())))
//! 	.unwrap();
//!
//! let out = registry.call(id, &[Value::tensor(DeviceKind::Cpu, vec![1.0f64])]).unwrap();
//! assert_eq!(out.len(), 1);
//! ```
//!
//! Registration (`declare` / `register` / `destroy`) is configuration-time
//! and serialized by callers; selection and invocation are wait-free reads
//! of published snapshots and safe under concurrent use.

mod dispatch;
mod error;
mod host;
mod indirection;
mod key;
mod lifetime;
mod meta;
mod name;
mod point;
mod registry;
mod value;

pub use dispatch::{ArgProfile, select, select_for_shape_inference};
pub use error::{CallError, DispatchError, RegistryError};
pub use host::{DetachedHost, ErrorHook, HostDispatcher, HostHandle};
pub use key::{DeviceKind, DispatchKey};
pub use lifetime::{LifetimeRegistry, OpId};
pub use meta::Provenance;
pub use name::{QualName, RESERVED_NAMESPACES};
pub use point::{KernelEntry, Operator};
pub use registry::{OperatorRegistry, SchemaSpec};
pub use value::{Kernel, TensorValue, Value, kernel};

pub use opforge_schema::{
	AliasInfo, BaseKind, Param, ParamDecl, ParamKind, Prototype, Return, SchemaError, SchemaModel,
};

#[cfg(test)]
mod tests;
