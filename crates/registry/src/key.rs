//! Dispatch keys and the device priority order.
//!
//! # Role
//!
//! A kernel is registered under exactly one [`DispatchKey`]. Device keys
//! participate in argument-driven selection; the remaining keys are roles
//! reached through dedicated resolution paths (shape inference, factory
//! calls, the composed differentiation kernel).
//!
//! # Precedence contract
//!
//! Device selection uses the total order defined by [`DeviceKind::rank`]:
//! `Cuda > Cpu`. The rank table is the single source of truth: adding a
//! device kind means extending the enum and the table, never inferring an
//! order elsewhere.

use std::fmt;

/// Device families a tensor-family argument may live on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
	/// Host memory.
	Cpu,
	/// Accelerator memory.
	Cuda,
}

impl DeviceKind {
	/// All device kinds, lowest rank first.
	pub const ALL: [DeviceKind; 2] = [DeviceKind::Cpu, DeviceKind::Cuda];

	/// Returns the dispatch precedence rank (higher wins).
	pub const fn rank(self) -> u8 {
		match self {
			Self::Cpu => 0,
			Self::Cuda => 1,
		}
	}

	/// Returns the lowercase device token.
	pub const fn token(self) -> &'static str {
		match self {
			Self::Cpu => "cpu",
			Self::Cuda => "cuda",
		}
	}

	/// Resolves a lowercase device token.
	pub fn from_token(token: &str) -> Option<Self> {
		Some(match token {
			"cpu" => Self::Cpu,
			"cuda" => Self::Cuda,
			_ => return None,
		})
	}
}

impl fmt::Display for DeviceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.token())
	}
}

/// The key a kernel is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchKey {
	/// Per-device kernel, selected from argument device kinds.
	Device(DeviceKind),
	/// Abstract kernel computing output metadata only (shape inference).
	Meta,
	/// Kernel selected when a call has no tensor-family inputs.
	Factory,
	/// Composed differentiation kernel, built from the save/backward pair.
	Autograd,
	/// First half of a differentiation formula: what to save.
	SaveForBackward,
	/// Second half of a differentiation formula: gradient computation.
	Backward,
	/// Host-side kind: decomposes explicitly, usable for shape inference.
	CompositeExplicit,
	/// Host-side kind: decomposes into constituents with their own formulas.
	CompositeImplicit,
}

impl DispatchKey {
	pub const CPU: DispatchKey = DispatchKey::Device(DeviceKind::Cpu);
	pub const CUDA: DispatchKey = DispatchKey::Device(DeviceKind::Cuda);

	/// Returns the lowercase key token used in diagnostics.
	pub const fn token(self) -> &'static str {
		match self {
			Self::Device(d) => d.token(),
			Self::Meta => "meta",
			Self::Factory => "factory",
			Self::Autograd => "autograd",
			Self::SaveForBackward => "save_for_backward",
			Self::Backward => "backward",
			Self::CompositeExplicit => "composite_explicit",
			Self::CompositeImplicit => "composite_implicit",
		}
	}
}

impl fmt::Display for DispatchKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.token())
	}
}
