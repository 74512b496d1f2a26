//! Serde-deserializable mirror of the YAML surface syntax (spec 3.2a). Kept
//! deliberately thin — one key per model field — rather than a
//! feature-complete clone of any particular third-party schema language's
//! surface syntax. `convert` turns this into the real [`binfmt_schema`]
//! model.

use indexmap::IndexMap;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct YamlTypeDef {
    #[serde(default)]
    pub meta: Option<YamlMeta>,
    #[serde(default)]
    pub seq: Vec<YamlField>,
    #[serde(default)]
    pub instances: IndexMap<String, YamlInstance>,
    #[serde(default)]
    pub types: IndexMap<String, YamlTypeDef>,
    #[serde(default)]
    pub enums: IndexMap<String, IndexMap<i64, String>>,
    #[serde(default)]
    pub params: Vec<YamlParam>,
}

#[derive(Debug, Deserialize)]
pub struct YamlMeta {
    pub id: Option<String>,
    pub endian: Option<String>,
    pub encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct YamlParam {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// `type:` accepts a bare type-name string, a `name`/`args` map for a
/// parametric user-type reference (spec 3.2's parameters, spec 4.4 item 1),
/// or a `switch-on`/`cases` map (spec 3.2's switch type). Declaration order
/// matters for untagged deserialization: a plain string always matches
/// `Name`, a map carrying `name` matches `Parametric` before `Switch`'s
/// `switch-on` key is even considered.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum YamlType {
    Name(String),
    Parametric {
        name: String,
        #[serde(default)]
        args: Vec<String>,
    },
    Switch {
        #[serde(rename = "switch-on")]
        switch_on: String,
        cases: IndexMap<String, String>,
        #[serde(default)]
        default: Option<String>,
    },
}

/// `contents:` accepts either a byte-value list or a string literal (spec
/// 3.2's "either a byte sequence or a string").
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum YamlContents {
    Bytes(Vec<u8>),
    Str(String),
}

#[derive(Debug, Default, Deserialize)]
pub struct YamlTerminator {
    pub byte: u8,
    #[serde(default)]
    pub include: bool,
    #[serde(default = "default_true")]
    pub consume: bool,
    #[serde(rename = "eos-error", default = "default_true")]
    pub eos_error: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct YamlField {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<YamlType>,
    pub size: Option<String>,
    #[serde(rename = "size-eos", default)]
    pub size_eos: bool,
    /// `"count"`, `"until"`, or `"eos"`; paired with `repeat-expr` for the
    /// first two (spec 3.2a's reduced example reuses one key for both).
    pub repeat: Option<String>,
    #[serde(rename = "repeat-expr")]
    pub repeat_expr: Option<String>,
    #[serde(rename = "if")]
    pub if_: Option<String>,
    pub contents: Option<YamlContents>,
    pub encoding: Option<String>,
    pub terminator: Option<YamlTerminator>,
    #[serde(rename = "enum")]
    pub enum_: Option<String>,
    pub pos: Option<String>,
    pub io: Option<String>,
    pub process: Option<String>,
}

/// An instance spec's read-half reuses [`YamlField`] in full (spec 3.2a: "an
/// instance spec is a field spec with two additional forms"); `value` is the
/// computed-instance form.
#[derive(Debug, Deserialize)]
pub struct YamlInstance {
    #[serde(flatten)]
    pub field: YamlField,
    pub value: Option<String>,
}
