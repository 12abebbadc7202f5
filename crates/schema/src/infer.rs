//! Schema inference from declared prototypes.
//!
//! A [`Prototype`] stands in for the host-language function signature the
//! operator will be called with: ordered parameters with Rust-spelled type
//! annotations and a return annotation. [`Prototype::infer`] maps the
//! annotations through the supported-type table and produces a validated
//! [`SchemaModel`].

use crate::model::{AliasInfo, BaseKind, Param, ParamKind, Return, SchemaModel};
use crate::SchemaError;

/// One declared prototype parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
	pub name: String,
	/// Rust-spelled type annotation, e.g. `Tensor`, `i64`, `Option<Tensor>`.
	pub annotation: Option<String>,
	pub keyword_only: bool,
	pub has_default: bool,
}

/// Builder-declared function signature used for schema inference and
/// structural matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prototype {
	params: Vec<ParamDecl>,
	ret: Option<String>,
}

impl Prototype {
	pub fn new() -> Self {
		Self::default()
	}

	/// Declares a positional parameter with a type annotation.
	pub fn param(mut self, name: &str, annotation: &str) -> Self {
		self.params.push(ParamDecl {
			name: name.to_string(),
			annotation: Some(annotation.to_string()),
			keyword_only: false,
			has_default: false,
		});
		self
	}

	/// Declares a positional parameter without a type annotation.
	pub fn param_unannotated(mut self, name: &str) -> Self {
		self.params.push(ParamDecl {
			name: name.to_string(),
			annotation: None,
			keyword_only: false,
			has_default: false,
		});
		self
	}

	/// Declares a positional parameter carrying a default value.
	pub fn param_defaulted(mut self, name: &str, annotation: &str) -> Self {
		self.params.push(ParamDecl {
			name: name.to_string(),
			annotation: Some(annotation.to_string()),
			keyword_only: false,
			has_default: true,
		});
		self
	}

	/// Declares a keyword-only parameter.
	pub fn kwonly(mut self, name: &str, annotation: &str) -> Self {
		self.params.push(ParamDecl {
			name: name.to_string(),
			annotation: Some(annotation.to_string()),
			keyword_only: true,
			has_default: false,
		});
		self
	}

	/// Declares the return annotation: a single type or a tuple such as
	/// `(Tensor, Tensor)`. Without this call the prototype returns nothing.
	pub fn returns(mut self, annotation: &str) -> Self {
		self.ret = Some(annotation.to_string());
		self
	}

	/// All declared parameters in declaration order.
	pub fn params(&self) -> &[ParamDecl] {
		&self.params
	}

	pub(crate) fn grouped(&self) -> (Vec<&ParamDecl>, Vec<&ParamDecl>) {
		let positional = self.params.iter().filter(|p| !p.keyword_only).collect();
		let keyword_only = self.params.iter().filter(|p| p.keyword_only).collect();
		(positional, keyword_only)
	}

	/// Infers a schema from the declared annotations.
	///
	/// Parameters named in `mutated` must be tensor-family and are marked
	/// mutable in the resulting schema. Inferred schemas assume no output
	/// aliases any input; the registry checks that assumption separately.
	pub fn infer(&self, mutated: &[&str]) -> Result<SchemaModel, SchemaError> {
		let mut positional = Vec::new();
		let mut keyword_only = Vec::new();

		for (idx, decl) in self.params.iter().enumerate() {
			let Some(annotation) = &decl.annotation else {
				return Err(SchemaError::MissingAnnotation {
					param: decl.name.clone(),
				});
			};
			let Some(kind) = param_kind_of(annotation) else {
				return Err(SchemaError::UnsupportedType {
					name: decl.name.clone(),
					annotation: annotation.clone(),
				});
			};
			if decl.has_default {
				return Err(SchemaError::DefaultValueNotSupported {
					param: decl.name.clone(),
				});
			}

			let alias = if mutated.contains(&decl.name.as_str()) {
				if !kind.is_tensor_family() {
					return Err(SchemaError::InvalidMutation {
						param: decl.name.clone(),
						kind: kind.to_string(),
					});
				}
				Some(AliasInfo {
					set: format!("a{idx}"),
					is_write: true,
				})
			} else {
				None
			};

			let param = Param {
				name: decl.name.clone(),
				kind,
				alias,
				has_default: false,
			};
			if decl.keyword_only {
				keyword_only.push(param);
			} else {
				positional.push(param);
			}
		}

		let returns = infer_returns(self.ret.as_deref())?;
		Ok(SchemaModel {
			positional,
			keyword_only,
			returns,
		})
	}
}

fn infer_returns(annotation: Option<&str>) -> Result<Vec<Return>, SchemaError> {
	let Some(annotation) = annotation else {
		return Ok(Vec::new());
	};
	let trimmed = annotation.trim();
	if trimmed.is_empty() || trimmed == "()" {
		return Ok(Vec::new());
	}

	let elements: Vec<&str> = if let Some(inner) = trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
		inner.split(',').map(str::trim).collect()
	} else {
		vec![trimmed]
	};

	let mut returns = Vec::with_capacity(elements.len());
	for element in elements {
		let kind = param_kind_of(element).filter(|k| k.is_supported_return()).ok_or_else(|| {
			SchemaError::UnsupportedType {
				name: "return".to_string(),
				annotation: element.to_string(),
			}
		})?;
		returns.push(Return { kind, alias: None });
	}
	Ok(returns)
}

/// Maps a Rust-spelled annotation to a semantic kind, or `None` when the
/// annotation is outside the supported-type table.
fn param_kind_of(annotation: &str) -> Option<ParamKind> {
	let s = annotation.trim();

	let kind = if let Some(inner) = strip_generic(s, "Option") {
		if let Some(element) = strip_generic(inner, "Vec") {
			ParamKind::OptionalList(base_of(element)?)
		} else {
			ParamKind::Optional(base_of(inner)?)
		}
	} else if let Some(inner) = strip_generic(s, "Vec").or_else(|| strip_slice(s)) {
		if let Some(element) = strip_generic(inner, "Option") {
			ParamKind::ListOfOptional(base_of(element)?)
		} else {
			ParamKind::List(base_of(inner)?)
		}
	} else {
		ParamKind::Plain(base_of(s)?)
	};

	kind.is_supported_param().then_some(kind)
}

fn strip_generic<'a>(s: &'a str, wrapper: &str) -> Option<&'a str> {
	s.strip_prefix(wrapper)?
		.trim_start()
		.strip_prefix('<')?
		.strip_suffix('>')
		.map(str::trim)
}

fn strip_slice(s: &str) -> Option<&str> {
	s.strip_prefix("&[")?.strip_suffix(']').map(str::trim)
}

fn base_of(s: &str) -> Option<BaseKind> {
	Some(match s.trim() {
		"Tensor" | "tensor" => BaseKind::Tensor,
		"i64" | "int" | "SymInt" => BaseKind::SymInt,
		"f64" | "float" => BaseKind::Float,
		"bool" => BaseKind::Bool,
		"String" | "str" | "&str" => BaseKind::Str,
		"Scalar" => BaseKind::Scalar,
		"Dtype" | "ScalarType" => BaseKind::ScalarType,
		"Device" => BaseKind::Device,
		_ => return None,
	})
}
