use std::fmt;
use std::sync::Arc;

/// Where a declaration or registration came from.
///
/// Carried on every registered kernel so duplicate-registration errors can
/// point at the prior registration site. [`Provenance::caller`] captures the
/// `file:line` of the caller via `#[track_caller]`; synthetic sites (the
/// indirection kernel, composed kernels, adoption) use descriptive labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance(Arc<str>);

impl Provenance {
	/// Captures the caller's `file:line`.
	#[track_caller]
	pub fn caller() -> Self {
		let location = std::panic::Location::caller();
		Self(format!("{}:{}", location.file(), location.line()).into())
	}

	/// Creates a provenance from an explicit label.
	pub fn new(label: impl Into<Arc<str>>) -> Self {
		Self(label.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Provenance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for Provenance {
	fn from(label: &str) -> Self {
		Self::new(label.to_string())
	}
}
