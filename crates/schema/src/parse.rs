//! Hand-rolled parser for the canonical schema text grammar.
//!
//! Grammar (whitespace-insensitive between tokens):
//!
//! ```text
//! schema  := "(" params? ")" "->" returns
//! params  := item ("," item)*          -- "*" switches to keyword-only
//! item    := "*" | type NAME ("=" TOKEN)?
//! type    := BASE alias? wrapper?
//! alias   := "(" SET "!"? ")"
//! wrapper := "?" | "[]" | "?[]" | "[]?"
//! returns := "()" | type | "(" type ("," type)* ")"
//! ```

use crate::model::{AliasInfo, BaseKind, Param, ParamKind, Return, SchemaModel};
use crate::SchemaError;

struct Cursor<'a> {
	text: &'a str,
	pos: usize,
}

impl<'a> Cursor<'a> {
	fn new(text: &'a str) -> Self {
		Self { text, pos: 0 }
	}

	fn err(&self, reason: impl Into<String>) -> SchemaError {
		SchemaError::MalformedSchema {
			text: self.text.to_string(),
			offset: self.pos,
			reason: reason.into(),
		}
	}

	fn rest(&self) -> &'a str {
		&self.text[self.pos..]
	}

	fn skip_ws(&mut self) {
		let trimmed = self.rest().trim_start();
		self.pos = self.text.len() - trimmed.len();
	}

	fn peek(&self) -> Option<char> {
		self.rest().chars().next()
	}

	fn eat(&mut self, token: &str) -> bool {
		if self.rest().starts_with(token) {
			self.pos += token.len();
			true
		} else {
			false
		}
	}

	fn expect(&mut self, token: &str) -> Result<(), SchemaError> {
		if self.eat(token) {
			Ok(())
		} else {
			Err(self.err(format!("expected `{token}`")))
		}
	}

	fn ident(&mut self) -> Result<&'a str, SchemaError> {
		let rest = self.rest();
		let len = rest
			.char_indices()
			.find(|&(_, c)| !(c.is_ascii_alphanumeric() || c == '_'))
			.map_or(rest.len(), |(i, _)| i);
		if len == 0 {
			return Err(self.err("expected an identifier"));
		}
		self.pos += len;
		Ok(&rest[..len])
	}

	fn at_end(&self) -> bool {
		self.rest().is_empty()
	}
}

pub(crate) fn parse_schema(text: &str) -> Result<SchemaModel, SchemaError> {
	let mut c = Cursor::new(text);

	c.skip_ws();
	c.expect("(")?;
	c.skip_ws();

	let mut positional = Vec::new();
	let mut keyword_only = Vec::new();
	let mut in_kwonly = false;

	if !c.eat(")") {
		loop {
			c.skip_ws();
			if c.eat("*") {
				if in_kwonly {
					return Err(c.err("duplicate `*` marker"));
				}
				in_kwonly = true;
			} else {
				let param = parse_param(&mut c)?;
				if in_kwonly {
					keyword_only.push(param);
				} else {
					positional.push(param);
				}
			}
			c.skip_ws();
			if c.eat(",") {
				continue;
			}
			c.expect(")")?;
			break;
		}
	}

	c.skip_ws();
	c.expect("->")?;
	c.skip_ws();
	let returns = parse_returns(&mut c)?;

	c.skip_ws();
	if !c.at_end() {
		return Err(c.err("trailing input after return declaration"));
	}

	Ok(SchemaModel {
		positional,
		keyword_only,
		returns,
	})
}

fn parse_param(c: &mut Cursor<'_>) -> Result<Param, SchemaError> {
	let (kind, alias) = parse_type(c)?;
	c.skip_ws();
	let name = c.ident()?.to_string();
	c.skip_ws();
	let has_default = if c.eat("=") {
		c.skip_ws();
		// The default token itself is opaque; schemas with defaults are
		// rejected downstream, not here.
		let len = c
			.rest()
			.char_indices()
			.find(|&(_, ch)| ch == ',' || ch == ')' || ch.is_whitespace())
			.map_or(c.rest().len(), |(i, _)| i);
		if len == 0 {
			return Err(c.err("expected a default value after `=`"));
		}
		c.pos += len;
		true
	} else {
		false
	};
	Ok(Param {
		name,
		kind,
		alias,
		has_default,
	})
}

fn parse_type(c: &mut Cursor<'_>) -> Result<(ParamKind, Option<AliasInfo>), SchemaError> {
	let base_name = c.ident()?;
	let Some(base) = BaseKind::from_schema_name(base_name) else {
		return Err(c.err(format!("unknown type `{base_name}`")));
	};

	let alias = if c.eat("(") {
		let set = c.ident()?.to_string();
		let is_write = c.eat("!");
		c.expect(")")?;
		Some(AliasInfo { set, is_write })
	} else {
		None
	};

	let kind = if c.eat("?") {
		if c.eat("[]") {
			ParamKind::ListOfOptional(base)
		} else {
			ParamKind::Optional(base)
		}
	} else if c.eat("[]") {
		if c.eat("?") {
			ParamKind::OptionalList(base)
		} else {
			ParamKind::List(base)
		}
	} else {
		ParamKind::Plain(base)
	};

	Ok((kind, alias))
}

fn parse_returns(c: &mut Cursor<'_>) -> Result<Vec<Return>, SchemaError> {
	if c.eat("(") {
		c.skip_ws();
		if c.eat(")") {
			return Ok(Vec::new());
		}
		let mut returns = Vec::new();
		loop {
			c.skip_ws();
			let (kind, alias) = parse_type(c)?;
			returns.push(Return { kind, alias });
			c.skip_ws();
			if c.eat(",") {
				continue;
			}
			c.expect(")")?;
			break;
		}
		Ok(returns)
	} else {
		if c.peek().is_none() {
			return Err(c.err("expected a return declaration"));
		}
		let (kind, alias) = parse_type(c)?;
		Ok(vec![Return { kind, alias }])
	}
}
