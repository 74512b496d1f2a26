//! The in-memory schema model: a tree of type definitions the interpreter
//! walks. Expressions are carried as un-parsed source strings — the schema
//! model has no dependency on the expression engine, which sits a layer
//! above it; the interpreter parses an expression the first time the field
//! that carries it is dispatched.

use binfmt_stream::Encoding;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Endian {
    Little,
    Big,
}

impl From<Endian> for binfmt_stream::Endian {
    fn from(e: Endian) -> Self {
        match e {
            Endian::Little => binfmt_stream::Endian::Little,
            Endian::Big => binfmt_stream::Endian::Big,
        }
    }
}

/// `meta.endian` may be a fixed value or an expression selecting one per
/// object (a "switch endian"), evaluated once per type instantiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EndianSpec {
    Fixed(Endian),
    Switch(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub id: Option<String>,
    pub endian: Option<EndianSpec>,
    pub encoding: Option<Encoding>,
}

/// A width/signedness-tagged scalar built-in. `None` endianness means the
/// unsuffixed spelling (`u4`, not `u4le`/`u4be`): it inherits from the
/// nearest enclosing meta at dispatch time.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Builtin {
    U1,
    S1,
    U2(Option<Endian>),
    U4(Option<Endian>),
    U8(Option<Endian>),
    S2(Option<Endian>),
    S4(Option<Endian>),
    S8(Option<Endian>),
    F4(Option<Endian>),
    F8(Option<Endian>),
    Str,
    Strz,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchType {
    /// Source text of the discriminant expression.
    pub on: String,
    /// Case keys are carried as their literal source spelling (e.g. `"1"`,
    /// `"\"binary\""`) since the engine compares against the *stringified*
    /// discriminant value per spec 4.4.4.
    pub cases: IndexMap<String, TypeRef>,
    pub default: Option<Box<TypeRef>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeRef {
    Builtin(Builtin),
    /// A user-defined type name plus the source text of any argument
    /// expressions (spec 3.2's parametric types, spec 4.4 item 1): empty
    /// for an ordinary, non-parametric reference. Arguments are evaluated
    /// against the *caller's* context, then bound to the target type's
    /// declared `params` the same way a root parametric parse does.
    User(String, Vec<String>),
    Switch(Box<SwitchType>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Repeat {
    #[default]
    None,
    /// Carries the count expression's source text.
    Count(String),
    /// Carries the until-condition expression's source text.
    Until(String),
    Eos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Contents {
    Bytes(Vec<u8>),
    Str(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminatorSpec {
    pub byte: u8,
    pub include: bool,
    pub consume: bool,
    pub eos_error: bool,
}

impl Default for TerminatorSpec {
    fn default() -> Self {
        TerminatorSpec {
            byte: 0,
            include: false,
            consume: true,
            eos_error: true,
        }
    }
}

/// One entry in a type's `seq`, or the read-half of an `InstanceSpec`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub id: Option<String>,
    pub type_ref: Option<TypeRef>,
    /// Source text of the size expression, if any.
    pub size: Option<String>,
    /// "read to end of stream" flag; mutually exclusive with `size`.
    pub size_eos: bool,
    pub repeat: Repeat,
    /// Source text of the `if` gate expression, if any.
    pub if_expr: Option<String>,
    pub contents: Option<Contents>,
    pub encoding: Option<Encoding>,
    pub terminator: Option<TerminatorSpec>,
    pub enum_ref: Option<String>,
    /// Source text of the `pos` redirect expression, if any.
    pub pos: Option<String>,
    /// Source text of the `io` redirect expression, if any (unimplemented
    /// per spec 4.4.1 item 3 — carried structurally so the loader can
    /// round-trip it and the interpreter can report it by name).
    pub io: Option<String>,
    /// Opaque `process` directive name — an extension point with no
    /// defined semantics (spec 9, Open Question 5); a field carrying one
    /// fails with a not-implemented error rather than being silently
    /// skipped.
    pub process: Option<String>,
}

/// A named, lazily-evaluated field: either a `value` expression (computed,
/// no stream read) or a `pos`-anchored read sharing `FieldSpec`'s dispatch
/// machinery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub field: FieldSpec,
    /// Source text of the `value` expression. When set, `field` carries no
    /// stream-read attributes and is evaluated without touching the
    /// stream.
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub id: String,
    /// The declared parameter type, as its built-in or user-type name.
    pub type_name: String,
}

/// An integer -> symbolic-name mapping. Provides both directions since the
/// engine needs `Enum::member -> int` (expression evaluation) but the
/// loader naturally produces `int -> member`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumSpec {
    pub members: IndexMap<i64, String>,
}

impl EnumSpec {
    pub fn value_of(&self, member: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(_, name)| name.as_str() == member)
            .map(|(&v, _)| v)
    }

    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.members.get(&value).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub id: String,
    pub meta: Meta,
    pub seq: Vec<FieldSpec>,
    pub instances: IndexMap<String, InstanceSpec>,
    pub types: IndexMap<String, TypeSpec>,
    pub enums: IndexMap<String, EnumSpec>,
    pub params: Vec<ParamSpec>,
}

impl TypeSpec {
    pub fn new(id: impl Into<String>) -> Self {
        TypeSpec {
            id: id.into(),
            ..Default::default()
        }
    }
}
