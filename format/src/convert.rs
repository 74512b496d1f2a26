//! Turns the [`crate::surface`] YAML mirror into the real
//! [`binfmt_schema::TypeSpec`] tree.

use crate::surface::{YamlContents, YamlField, YamlInstance, YamlTerminator, YamlType, YamlTypeDef};
use crate::LoaderError;
use binfmt_schema::{
    Builtin, Contents, Endian, EndianSpec, EnumSpec, FieldSpec, InstanceSpec, Meta, ParamSpec,
    Repeat, SwitchType, TerminatorSpec, TypeRef, TypeSpec,
};
use binfmt_stream::Encoding;
use indexmap::IndexMap;
use std::str::FromStr;

pub fn to_type_spec(id: &str, doc: YamlTypeDef, path: &str) -> Result<TypeSpec, LoaderError> {
    let self_path = if path.is_empty() { id.to_string() } else { format!("{path}/{id}") };

    let meta = match doc.meta {
        Some(m) => Meta {
            id: m.id,
            endian: m.endian.map(|e| parse_endian_spec(&e)).transpose()?,
            encoding: m.encoding.map(|e| Encoding::from_str(&e)).transpose().map_err(|_| {
                LoaderError::UnknownTypeSyntax {
                    name: "<encoding>".to_string(),
                    path: self_path.clone(),
                }
            })?,
        },
        None => Meta::default(),
    };

    let mut seq = Vec::with_capacity(doc.seq.len());
    for (i, f) in doc.seq.into_iter().enumerate() {
        let field_path = match &f.id {
            Some(fid) => format!("{self_path}/seq/{fid}"),
            None => format!("{self_path}/seq[{i}]"),
        };
        seq.push(to_field_spec(f, &field_path)?);
    }

    let mut instances = IndexMap::with_capacity(doc.instances.len());
    for (name, inst) in doc.instances {
        let inst_path = format!("{self_path}/instances/{name}");
        instances.insert(name, to_instance_spec(inst, &inst_path)?);
    }

    let mut types = IndexMap::with_capacity(doc.types.len());
    for (name, nested) in doc.types {
        let nested_spec = to_type_spec(&name, nested, &self_path)?;
        types.insert(name, nested_spec);
    }

    let mut enums = IndexMap::with_capacity(doc.enums.len());
    for (name, members) in doc.enums {
        enums.insert(name, EnumSpec { members });
    }

    let params = doc
        .params
        .into_iter()
        .map(|p| ParamSpec { id: p.id, type_name: p.type_name })
        .collect();

    Ok(TypeSpec { id: id.to_string(), meta, seq, instances, types, enums, params })
}

fn parse_endian_spec(s: &str) -> Result<EndianSpec, LoaderError> {
    match s.to_ascii_lowercase().as_str() {
        "le" | "little" => Ok(EndianSpec::Fixed(Endian::Little)),
        "be" | "big" => Ok(EndianSpec::Fixed(Endian::Big)),
        // Anything else is a switch-endian expression string (spec 3.2):
        // evaluated once per type instantiation by the interpreter.
        _ => Ok(EndianSpec::Switch(s.to_string())),
    }
}

fn to_field_spec(f: YamlField, path: &str) -> Result<FieldSpec, LoaderError> {
    let repeat = match f.repeat.as_deref() {
        None => Repeat::None,
        Some("count") => Repeat::Count(f.repeat_expr.clone().unwrap_or_default()),
        Some("until") => Repeat::Until(f.repeat_expr.clone().unwrap_or_default()),
        Some("eos") => Repeat::Eos,
        Some(other) => {
            return Err(LoaderError::UnknownTypeSyntax {
                name: format!("repeat: {other}"),
                path: path.to_string(),
            })
        }
    };

    let type_ref = f.type_.map(|t| to_type_ref(t, path)).transpose()?;
    let contents = f.contents.map(to_contents);
    let encoding = f.encoding.as_deref().map(Encoding::from_str).transpose().map_err(|_| {
        LoaderError::UnknownTypeSyntax { name: "<encoding>".to_string(), path: path.to_string() }
    })?;
    let terminator = f.terminator.map(to_terminator_spec);

    Ok(FieldSpec {
        id: f.id,
        type_ref,
        size: f.size,
        size_eos: f.size_eos,
        repeat,
        if_expr: f.if_,
        contents,
        encoding,
        terminator,
        enum_ref: f.enum_,
        pos: f.pos,
        io: f.io,
        process: f.process,
    })
}

fn to_instance_spec(inst: YamlInstance, path: &str) -> Result<InstanceSpec, LoaderError> {
    Ok(InstanceSpec { field: to_field_spec(inst.field, path)?, value: inst.value })
}

fn to_contents(c: YamlContents) -> Contents {
    match c {
        YamlContents::Bytes(b) => Contents::Bytes(b),
        YamlContents::Str(s) => Contents::Str(s),
    }
}

fn to_terminator_spec(t: YamlTerminator) -> TerminatorSpec {
    TerminatorSpec { byte: t.byte, include: t.include, consume: t.consume, eos_error: t.eos_error }
}

fn to_type_ref(t: YamlType, path: &str) -> Result<TypeRef, LoaderError> {
    match t {
        YamlType::Name(name) => parse_type_name(&name, path),
        YamlType::Parametric { name, args } => parse_parametric_type_name(&name, args, path),
        YamlType::Switch { switch_on, cases, default } => {
            if cases.is_empty() && default.is_none() {
                return Err(LoaderError::EmptySwitch { path: path.to_string() });
            }
            let mut case_map = IndexMap::with_capacity(cases.len());
            for (key, type_name) in cases {
                case_map.insert(key, parse_type_name(&type_name, path)?);
            }
            let default = default.map(|d| parse_type_name(&d, path)).transpose()?.map(Box::new);
            Ok(TypeRef::Switch(Box::new(SwitchType { on: switch_on, cases: case_map, default })))
        }
    }
}

fn parse_type_name(name: &str, path: &str) -> Result<TypeRef, LoaderError> {
    if name.is_empty() {
        return Err(LoaderError::UnknownTypeSyntax { name: name.to_string(), path: path.to_string() });
    }
    match parse_builtin(name) {
        Some(b) => Ok(TypeRef::Builtin(b)),
        None => Ok(TypeRef::User(name.to_string(), Vec::new())),
    }
}

/// A parametric reference (spec 3.2/4.4 item 1: `type: {name: ..., args:
/// [...]}`) names a user type only — builtins take no parameters.
fn parse_parametric_type_name(name: &str, args: Vec<String>, path: &str) -> Result<TypeRef, LoaderError> {
    if name.is_empty() {
        return Err(LoaderError::UnknownTypeSyntax { name: name.to_string(), path: path.to_string() });
    }
    if parse_builtin(name).is_some() {
        return Err(LoaderError::UnknownTypeSyntax {
            name: format!("{name}(...)"),
            path: path.to_string(),
        });
    }
    Ok(TypeRef::User(name.to_string(), args))
}

/// Recognizes the closed built-in set (spec 3.2): `u1, s1`; `u2, u4, u8,
/// s2, s4, s8` each with optional `le`/`be` suffix; `f4, f8` with `le`/`be`;
/// `str`, `strz`. Anything else is treated as a user-type name — resolved
/// late, against the nested-type scope chain, by the interpreter (spec
/// 4.2's "closed-over references" note).
fn parse_builtin(name: &str) -> Option<Builtin> {
    match name {
        "u1" => return Some(Builtin::U1),
        "s1" => return Some(Builtin::S1),
        "str" => return Some(Builtin::Str),
        "strz" => return Some(Builtin::Strz),
        _ => {}
    }
    let (base, endian) = if let Some(b) = name.strip_suffix("le") {
        (b, Some(Endian::Little))
    } else if let Some(b) = name.strip_suffix("be") {
        (b, Some(Endian::Big))
    } else {
        (name, None)
    };
    match base {
        "u2" => Some(Builtin::U2(endian)),
        "u4" => Some(Builtin::U4(endian)),
        "u8" => Some(Builtin::U8(endian)),
        "s2" => Some(Builtin::S2(endian)),
        "s4" => Some(Builtin::S4(endian)),
        "s8" => Some(Builtin::S8(endian)),
        "f4" => Some(Builtin::F4(endian)),
        "f8" => Some(Builtin::F8(endian)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffixed_builtins_carry_explicit_endianness() {
        assert!(matches!(parse_builtin("u4le"), Some(Builtin::U4(Some(Endian::Little)))));
        assert!(matches!(parse_builtin("u4be"), Some(Builtin::U4(Some(Endian::Big)))));
        assert!(matches!(parse_builtin("u4"), Some(Builtin::U4(None))));
    }

    #[test]
    fn unrecognized_name_is_a_user_type_reference() {
        assert!(parse_builtin("entry").is_none());
    }

    #[test]
    fn parametric_type_name_carries_its_argument_expressions() {
        let t = to_type_ref(
            YamlType::Parametric { name: "entry".to_string(), args: vec!["len".to_string()] },
            "root",
        )
        .unwrap();
        assert_eq!(t, TypeRef::User("entry".to_string(), vec!["len".to_string()]));
    }

    #[test]
    fn parametric_type_name_rejects_a_builtin() {
        let err = to_type_ref(
            YamlType::Parametric { name: "u4".to_string(), args: vec!["len".to_string()] },
            "root",
        )
        .unwrap_err();
        assert!(matches!(err, LoaderError::UnknownTypeSyntax { .. }));
    }
}
