//! Operator schema model.
//!
//! A schema is the declared parameter/return contract of an operator:
//! ordered positional and keyword-only parameters with semantic kinds and
//! optional alias annotations, plus ordered return kinds. Schemas are used
//! for validation at registration time, never for execution.
//!
//! Schemas come from two places:
//!
//! 1. [`SchemaModel::parse`]: the canonical text form, e.g.
//!    `"(Tensor x, SymInt n) -> Tensor"`.
//! 2. [`Prototype::infer`]: a declared prototype with Rust-spelled type
//!    annotations (`Tensor`, `i64`, `Option<Tensor>`, ...), mapped through
//!    a fixed supported-type table.
//!
//! A validated model is immutable; [`SchemaModel`] exposes read accessors
//! only.

mod error;
mod infer;
mod model;
mod parse;

pub use error::SchemaError;
pub use infer::{ParamDecl, Prototype};
pub use model::{AliasInfo, BaseKind, Param, ParamKind, Return, SchemaModel};
