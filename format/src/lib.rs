//! The textual schema loader (spec 3.2a): deserializes the YAML surface
//! syntax into the [`binfmt_schema::TypeSpec`] model the interpreter and
//! validator consume. This crate has no dependency on the expression engine
//! or the interpreter — expression text, type references and enum tags are
//! carried through as opaque strings, parsed lazily the first time the
//! field that carries them is dispatched (spec 3.2a).
//!
//! The loader performs no semantic validation of its own; malformed YAML
//! shape is reported as a [`LoaderError`], a type distinct from the engine's
//! [`binfmt_error::Error`] taxonomy since it can fail before a schema model
//! exists for that taxonomy's path/position fields to describe.

mod convert;
mod surface;

use thiserror::Error;

/// Failures specific to turning YAML text into a [`binfmt_schema::TypeSpec`].
/// Kept distinct from the engine's error taxonomy per spec 3.2a.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("malformed schema YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown type reference {name:?} at {path}")]
    UnknownTypeSyntax { name: String, path: String },

    #[error("switch type at {path} has no cases")]
    EmptySwitch { path: String },
}

/// Load a schema from its YAML surface syntax (spec 3.2a). Returns the raw
/// model; callers are expected to run it through [`binfmt_schema::validate`]
/// themselves (this mirrors spec 6.1's `options.validate` toggle — the
/// loader never validates on the caller's behalf).
pub fn load_str(src: &str) -> Result<binfmt_schema::TypeSpec, LoaderError> {
    let doc: surface::YamlTypeDef = serde_yaml::from_str(src)?;
    let root_id = doc.meta.as_ref().and_then(|m| m.id.clone()).unwrap_or_default();
    convert::to_type_spec(&root_id, doc, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use binfmt_schema::{Builtin, Contents, Repeat, TypeRef};

    #[test]
    fn loads_magic_fields_and_switch_example_from_spec_3_2a() {
        let yaml = r#"
meta:
  id: my_format
  endian: le
  encoding: UTF-8
seq:
  - id: magic
    contents: [0x4D, 0x5A]
  - id: version
    type: u2
  - id: count
    type: u4
  - id: entries
    type: entry
    repeat: count
    repeat-expr: count
instances:
  checksum:
    pos: "0"
    type: u4
enums:
  file_type:
    1: text
    2: binary
types:
  entry:
    seq:
      - id: tag
        type: u1
        enum: file_type
      - id: body
        type: u4
        if: tag == file_type::text
"#;
        let ts = load_str(yaml).unwrap();
        assert_eq!(ts.id, "my_format");
        assert_eq!(ts.seq.len(), 4);
        assert!(matches!(&ts.seq[0].contents, Some(Contents::Bytes(b)) if b == &[0x4D, 0x5A]));
        assert!(matches!(&ts.seq[1].type_ref, Some(TypeRef::Builtin(Builtin::U2(None)))));
        assert!(matches!(&ts.seq[3].repeat, Repeat::Count(e) if e == "count"));
        assert!(ts.instances.contains_key("checksum"));
        assert!(ts.enums.contains_key("file_type"));

        let entry = ts.types.get("entry").unwrap();
        assert_eq!(entry.id, "entry");
        assert_eq!(entry.seq[1].if_expr.as_deref(), Some("tag == file_type::text"));
    }

    #[test]
    fn switch_type_with_default() {
        let yaml = r#"
meta:
  id: f
seq:
  - id: tc
    type: u1
  - id: d
    type:
      switch-on: tc
      cases:
        "1": u1
        "2": u2
      default: u4
"#;
        let ts = load_str(yaml).unwrap();
        match &ts.seq[1].type_ref {
            Some(TypeRef::Switch(sw)) => {
                assert_eq!(sw.on, "tc");
                assert_eq!(sw.cases.len(), 2);
                assert!(sw.default.is_some());
            }
            other => panic!("expected a switch type, got {other:?}"),
        }
    }

    #[test]
    fn malformed_yaml_is_a_loader_error() {
        let err = load_str("not: [valid, schema").unwrap_err();
        assert!(matches!(err, LoaderError::Yaml(_)));
    }
}
