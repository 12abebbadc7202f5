use std::fmt;

use crate::SchemaError;
use crate::infer::Prototype;

/// Base semantic kind of a parameter or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseKind {
	/// Tensor-family value; the only kind that participates in dispatch.
	Tensor,
	/// Integer, symbolic over traced shapes.
	SymInt,
	/// Floating-point scalar.
	Float,
	/// Boolean.
	Bool,
	/// String.
	Str,
	/// Numeric scalar of unspecified width.
	Scalar,
	/// Element-type tag (dtype).
	ScalarType,
	/// Device identifier.
	Device,
}

impl BaseKind {
	/// Returns the canonical schema-text spelling.
	pub const fn schema_name(self) -> &'static str {
		match self {
			Self::Tensor => "Tensor",
			Self::SymInt => "SymInt",
			Self::Float => "float",
			Self::Bool => "bool",
			Self::Str => "str",
			Self::Scalar => "Scalar",
			Self::ScalarType => "ScalarType",
			Self::Device => "Device",
		}
	}

	/// Resolves a schema-text spelling back to a base kind.
	pub fn from_schema_name(name: &str) -> Option<Self> {
		Some(match name {
			"Tensor" => Self::Tensor,
			"SymInt" => Self::SymInt,
			"float" => Self::Float,
			"bool" => Self::Bool,
			"str" => Self::Str,
			"Scalar" => Self::Scalar,
			"ScalarType" => Self::ScalarType,
			"Device" => Self::Device,
			_ => return None,
		})
	}
}

/// Semantic kind of a parameter or return: a base kind plus at most one
/// optionality/list wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
	/// `T`
	Plain(BaseKind),
	/// `T?`
	Optional(BaseKind),
	/// `T[]`
	List(BaseKind),
	/// `T?[]`, a list whose elements may each be absent.
	ListOfOptional(BaseKind),
	/// `T[]?`, a list that may be absent as a whole.
	OptionalList(BaseKind),
}

impl ParamKind {
	/// Returns the underlying base kind.
	pub const fn base(self) -> BaseKind {
		match self {
			Self::Plain(b)
			| Self::Optional(b)
			| Self::List(b)
			| Self::ListOfOptional(b)
			| Self::OptionalList(b) => b,
		}
	}

	/// Returns true if this kind is a tensor or a collection of tensors.
	pub const fn is_tensor_family(self) -> bool {
		matches!(self.base(), BaseKind::Tensor)
	}

	/// Returns true if the wrapper combination is in the supported-type table.
	///
	/// The table is per base kind: every base admits `T` and `T?`; list
	/// wrappers are admitted only where the runtime has a calling convention
	/// for them.
	pub const fn is_supported_param(self) -> bool {
		use BaseKind::*;
		match self {
			Self::Plain(_) | Self::Optional(_) => true,
			Self::List(b) => matches!(b, Tensor | SymInt | Float | Bool | Scalar),
			Self::ListOfOptional(b) => matches!(b, Tensor),
			Self::OptionalList(b) => matches!(b, SymInt | Float | Bool),
		}
	}

	/// Returns true if the kind is admissible as a return value.
	pub const fn is_supported_return(self) -> bool {
		use BaseKind::*;
		match self {
			Self::Plain(b) => matches!(b, Tensor | SymInt | Float | Bool | Scalar),
			Self::List(b) => matches!(b, Tensor),
			_ => false,
		}
	}

	/// Returns true if the kind is admissible as the return of an operator
	/// with a registered differentiation formula.
	pub const fn is_differentiable_return(self) -> bool {
		self.is_supported_return()
	}
}

impl fmt::Display for ParamKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Plain(b) => write!(f, "{}", b.schema_name()),
			Self::Optional(b) => write!(f, "{}?", b.schema_name()),
			Self::List(b) => write!(f, "{}[]", b.schema_name()),
			Self::ListOfOptional(b) => write!(f, "{}?[]", b.schema_name()),
			Self::OptionalList(b) => write!(f, "{}[]?", b.schema_name()),
		}
	}
}

/// Alias annotation on a parameter or return, e.g. the `(a0!)` in
/// `Tensor(a0!) x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasInfo {
	/// Alias set name (`a0`, `a1`, ...).
	pub set: String,
	/// True when the annotation marks a write (`!`).
	pub is_write: bool,
}

impl fmt::Display for AliasInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_write {
			write!(f, "({}!)", self.set)
		} else {
			write!(f, "({})", self.set)
		}
	}
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
	pub name: String,
	pub kind: ParamKind,
	/// Present when the parameter aliases (and possibly mutates) storage.
	pub alias: Option<AliasInfo>,
	/// True when the schema text declared a default for this parameter.
	pub has_default: bool,
}

impl Param {
	/// Returns true if this parameter is marked mutable.
	pub fn is_mutable(&self) -> bool {
		self.alias.as_ref().is_some_and(|a| a.is_write)
	}
}

impl fmt::Display for Param {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		render_kind(f, self.kind, self.alias.as_ref())?;
		write!(f, " {}", self.name)
	}
}

/// One declared return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Return {
	pub kind: ParamKind,
	/// Present when the return aliases an input (a view).
	pub alias: Option<AliasInfo>,
}

impl fmt::Display for Return {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		render_kind(f, self.kind, self.alias.as_ref())
	}
}

// Alias annotations attach to the base, before any wrapper suffix:
// `Tensor(a0!)[]`, not `Tensor[](a0!)`.
fn render_kind(f: &mut fmt::Formatter<'_>, kind: ParamKind, alias: Option<&AliasInfo>) -> fmt::Result {
	let base = kind.base().schema_name();
	write!(f, "{base}")?;
	if let Some(alias) = alias {
		write!(f, "{alias}")?;
	}
	match kind {
		ParamKind::Plain(_) => Ok(()),
		ParamKind::Optional(_) => write!(f, "?"),
		ParamKind::List(_) => write!(f, "[]"),
		ParamKind::ListOfOptional(_) => write!(f, "?[]"),
		ParamKind::OptionalList(_) => write!(f, "[]?"),
	}
}

/// The declared contract of an operator.
///
/// Immutable once built; construct via [`SchemaModel::parse`] or
/// [`Prototype::infer`](crate::Prototype::infer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaModel {
	pub(crate) positional: Vec<Param>,
	pub(crate) keyword_only: Vec<Param>,
	pub(crate) returns: Vec<Return>,
}

impl SchemaModel {
	/// Parses the canonical schema text, e.g. `"(Tensor x, SymInt n) -> Tensor"`.
	pub fn parse(text: &str) -> Result<Self, SchemaError> {
		crate::parse::parse_schema(text)
	}

	/// Ordered positional parameters.
	pub fn positional(&self) -> &[Param] {
		&self.positional
	}

	/// Ordered keyword-only parameters.
	pub fn keyword_only(&self) -> &[Param] {
		&self.keyword_only
	}

	/// All parameters in declaration order.
	pub fn params(&self) -> impl Iterator<Item = &Param> {
		self.positional.iter().chain(self.keyword_only.iter())
	}

	/// Ordered return values.
	pub fn returns(&self) -> &[Return] {
		&self.returns
	}

	/// Names of parameters marked mutable, in declaration order.
	pub fn mutable_params(&self) -> impl Iterator<Item = &str> {
		self.params().filter(|p| p.is_mutable()).map(|p| p.name.as_str())
	}

	/// Checks the functional contract: at least one return, no return
	/// aliasing an input or acting as a non-owning view, and no parameter
	/// using the reserved `self` name.
	pub fn validate_functional(&self) -> Result<(), SchemaError> {
		let non_functional = |reason: &str| SchemaError::NonFunctionalSchema {
			schema: self.to_string(),
			reason: reason.to_string(),
		};

		if self.returns.is_empty() {
			return Err(non_functional("operator has no returns"));
		}
		for ret in &self.returns {
			if let Some(alias) = &ret.alias {
				let reason = if alias.is_write {
					"a return aliases a mutated input"
				} else {
					"a return is a non-owning view of an input"
				};
				return Err(non_functional(reason));
			}
		}
		if self.params().any(|p| p.name == "self") {
			return Err(non_functional("parameters may not be named `self`"));
		}
		Ok(())
	}

	/// Returns true if [`Self::validate_functional`] accepts this schema.
	pub fn is_functional(&self) -> bool {
		self.validate_functional().is_ok()
	}

	/// Returns true if every return kind admits a differentiation formula.
	pub fn has_differentiable_returns(&self) -> bool {
		self.returns.iter().all(|r| r.kind.is_differentiable_return())
	}

	/// Structurally compares a prototype against this schema, ignoring type
	/// annotations: same ordered names in the same positional/keyword-only
	/// groups, and neither side declaring default values.
	pub fn matches(&self, proto: &Prototype) -> Result<(), SchemaError> {
		let mismatch = |reason: String| SchemaError::SignatureMismatch {
			schema: self.to_string(),
			reason,
		};

		if self.params().any(|p| p.has_default) || proto.params().iter().any(|p| p.has_default) {
			return Err(mismatch("neither the schema nor the prototype may declare default values".into()));
		}

		let compare = |group: &str, ours: &[Param], theirs: &[&crate::ParamDecl]| -> Result<(), SchemaError> {
			if ours.len() != theirs.len() {
				return Err(mismatch(format!(
					"expected {} {group} parameter(s), prototype has {}",
					ours.len(),
					theirs.len()
				)));
			}
			for (a, b) in ours.iter().zip(theirs) {
				if a.name != b.name {
					return Err(mismatch(format!(
						"{group} parameter `{}` does not match prototype parameter `{}`",
						a.name, b.name
					)));
				}
			}
			Ok(())
		};

		let (pos, kw) = proto.grouped();
		compare("positional", &self.positional, &pos)?;
		compare("keyword-only", &self.keyword_only, &kw)?;
		Ok(())
	}
}

impl fmt::Display for SchemaModel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "(")?;
		let mut first = true;
		for p in &self.positional {
			if !first {
				write!(f, ", ")?;
			}
			first = false;
			write!(f, "{p}")?;
		}
		if !self.keyword_only.is_empty() {
			if !first {
				write!(f, ", ")?;
			}
			write!(f, "*")?;
			for p in &self.keyword_only {
				write!(f, ", {p}")?;
			}
		}
		write!(f, ") -> ")?;
		match self.returns.as_slice() {
			[] => write!(f, "()"),
			[single] => write!(f, "{single}"),
			many => {
				write!(f, "(")?;
				for (i, r) in many.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{r}")?;
				}
				write!(f, ")")
			}
		}
	}
}
