//! The declarative schema model the interpreter walks, and its validator.
//!
//! A schema is a tree of [`TypeSpec`]s. Expressions embedded anywhere in
//! the tree (sizes, conditions, repetition bounds, switch discriminants,
//! instance values) are carried as source text; this crate has no
//! dependency on the expression engine, which sits above it.

pub mod types;
pub mod validator;

pub use types::{
    Builtin, Contents, Endian, EndianSpec, EnumSpec, FieldSpec, InstanceSpec, Meta, ParamSpec,
    Repeat, SwitchType, TerminatorSpec, TypeRef, TypeSpec,
};
pub use validator::{validate, Finding, Report};
