//! The Sluice source language: a block-structured configuration syntax, its
//! typed value model, immutable evaluation scopes and spec-driven attribute
//! decoding.

pub mod ast;
pub mod eval;
pub mod parser;
pub mod scope;
pub mod spec;
pub mod value;

pub use ast::{Attribute, Block, Body, Expression, TemplatePart};
pub use eval::{evaluate_attributes, evaluate_flat_body};
pub use parser::parse;
pub use scope::{Function, Scope, ScopeBuilder};
pub use spec::{decode, decode_into, AttrSpec, AttrType};
pub use value::Value;
