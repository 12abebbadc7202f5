use std::fmt;
use std::sync::Arc;

use crate::RegistryError;

/// Namespaces reserved for the host framework's own operators. User
/// declarations in these namespaces are rejected to avoid anything that
/// could be mistaken for framework internals.
pub const RESERVED_NAMESPACES: &[&str] = &["prim", "prims", "aten", "at", "torch", "pytorch"];

/// Qualified operator name, `namespace::symbol`.
///
/// Validated on construction: both parts are non-empty, contain no `.`
/// (overload syntax is not supported), and the namespace is outside
/// [`RESERVED_NAMESPACES`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualName {
	full: Arc<str>,
	sep: usize,
}

impl QualName {
	/// Parses and validates `namespace::symbol`.
	pub fn parse(text: &str) -> Result<Self, RegistryError> {
		let invalid = |reason: &str| RegistryError::InvalidName {
			name: text.to_string(),
			reason: reason.to_string(),
		};

		let Some(sep) = text.find("::") else {
			return Err(invalid("expected a namespace, i.e. `ns::symbol`"));
		};
		let (namespace, symbol) = (&text[..sep], &text[sep + 2..]);

		if namespace.is_empty() {
			return Err(invalid("namespace must not be empty"));
		}
		if namespace.contains('.') {
			return Err(invalid("namespace must not contain `.`"));
		}
		if RESERVED_NAMESPACES.contains(&namespace) {
			return Err(RegistryError::ReservedNamespace {
				namespace: namespace.to_string(),
			});
		}
		if symbol.is_empty() {
			return Err(invalid("symbol must not be empty"));
		}
		if symbol.contains('.') {
			return Err(invalid("overloads (symbols containing `.`) are not supported"));
		}
		if symbol.contains(':') {
			return Err(invalid("symbol must not contain `:`"));
		}

		Ok(Self {
			full: text.into(),
			sep,
		})
	}

	pub fn namespace(&self) -> &str {
		&self.full[..self.sep]
	}

	pub fn symbol(&self) -> &str {
		&self.full[self.sep + 2..]
	}

	pub fn as_str(&self) -> &str {
		&self.full
	}
}

impl fmt::Display for QualName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.full)
	}
}

impl AsRef<str> for QualName {
	fn as_ref(&self) -> &str {
		&self.full
	}
}
