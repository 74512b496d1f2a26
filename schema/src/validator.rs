//! Structural validation of a schema model: spec 4.2.
//!
//! Type-name resolution is deliberately **not** performed here — it is left
//! as late binding to the interpreter, which already has to walk the
//! nested-type scope chain to parse a field. Duplicating that walk here
//! would just be a second place for the two to disagree. What *is* checked
//! here is everything the model's own type system doesn't already rule
//! out by construction: the things no `enum`/`Option` shape can enforce.

use crate::types::{Contents, EnumSpec, FieldSpec, Repeat, TypeSpec};
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub message: String,
    pub path: String,
}

#[derive(Debug, Default)]
pub struct Report {
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
}

impl Report {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Promote warnings to errors, per spec 4.2's `strict` mode.
    pub fn into_strict(mut self) -> Report {
        self.errors.append(&mut self.warnings);
        self
    }
}

/// Validate a root schema. `strict` turns warnings into errors in the
/// returned report (mirrors spec 4.2's `{validate, strict}` options, but
/// `strict` is applied here rather than by the caller so there's a single
/// place that implements "warnings become errors").
pub fn validate(root: &TypeSpec, strict: bool) -> Report {
    let mut report = Report::default();
    if root.meta.id.as_deref().unwrap_or("").is_empty() {
        report.errors.push(Finding {
            message: "root schema is missing a meta identifier".into(),
            path: "meta.id".into(),
        });
    }
    walk_type(root, "", &IndexMap::new(), &mut report);
    if strict {
        report.into_strict()
    } else {
        report
    }
}

fn walk_type<'a>(
    ty: &'a TypeSpec,
    path: &str,
    inherited_enums: &IndexMap<String, &'a EnumSpec>,
    report: &mut Report,
) {
    if !ty.id.is_empty() && !is_canonical_ident(&ty.id) {
        report.warnings.push(Finding {
            message: format!("type name {:?} is not snake_case", ty.id),
            path: format!("{path}/{}", ty.id),
        });
    }

    let mut visible_enums: IndexMap<String, &EnumSpec> = inherited_enums.clone();
    for (name, spec) in &ty.enums {
        visible_enums.insert(name.clone(), spec);
    }

    for (i, field) in ty.seq.iter().enumerate() {
        let field_path = match &field.id {
            Some(id) => format!("{path}/{}/seq/{id}", ty.id),
            None => format!("{path}/{}/seq[{i}]", ty.id),
        };
        validate_field(field, &field_path, &visible_enums, report);
    }

    for (name, inst) in &ty.instances {
        let field_path = format!("{path}/{}/instances/{name}", ty.id);
        if inst.value.is_some() && (inst.field.pos.is_some() || inst.field.type_ref.is_some()) {
            report.warnings.push(Finding {
                message: "instance has both a `value` expression and stream-read attributes"
                    .into(),
                path: field_path.clone(),
            });
        }
        validate_field(&inst.field, &field_path, &visible_enums, report);
    }

    for (name, nested) in &ty.types {
        let nested_path = format!("{path}/{}", ty.id);
        if name != &nested.id && !nested.id.is_empty() {
            // local name and the type's own id are allowed to differ; not
            // an error, just not checked further here.
        }
        walk_type(nested, &nested_path, &visible_enums, report);
    }
}

fn validate_field(
    field: &FieldSpec,
    path: &str,
    visible_enums: &IndexMap<String, &EnumSpec>,
    report: &mut Report,
) {
    if field.size.is_some() && field.size_eos {
        report.errors.push(Finding {
            message: "`size` and size-to-end are mutually exclusive on the same field".into(),
            path: path.into(),
        });
    }

    if let Repeat::Count(expr) = &field.repeat {
        if expr.trim().is_empty() {
            report.errors.push(Finding {
                message: "repeat = count requires a non-empty count expression".into(),
                path: path.into(),
            });
        }
    }
    if let Repeat::Until(expr) = &field.repeat {
        if expr.trim().is_empty() {
            report.errors.push(Finding {
                message: "repeat = until requires a non-empty until expression".into(),
                path: path.into(),
            });
        }
    }

    if let Some(Contents::Str(s)) = &field.contents {
        if s.is_empty() {
            report.warnings.push(Finding {
                message: "empty string contents literal matches anything".into(),
                path: path.into(),
            });
        }
    }

    if let Some(enum_name) = &field.enum_ref {
        if !visible_enums.contains_key(enum_name) {
            report.errors.push(Finding {
                message: format!("field references unknown enum {enum_name:?}"),
                path: path.into(),
            });
        }
    }

    if let Some(id) = &field.id {
        if !is_canonical_ident(id) {
            report.warnings.push(Finding {
                message: format!("field name {id:?} is not snake_case"),
                path: path.into(),
            });
        }
    }
}

fn is_canonical_ident(s: &str) -> bool {
    !s.is_empty()
        && s.chars().next().map_or(false, |c| c.is_ascii_lowercase() || c == '_')
        && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Meta, TypeSpec};

    #[test]
    fn missing_root_id_is_an_error() {
        let root = TypeSpec::new("");
        let report = validate(&root, false);
        assert!(!report.is_valid());
    }

    #[test]
    fn present_root_id_with_empty_seq_is_valid() {
        let mut root = TypeSpec::new("my_format");
        root.meta = Meta {
            id: Some("my_format".into()),
            ..Default::default()
        };
        let report = validate(&root, false);
        assert!(report.is_valid());
    }

    #[test]
    fn mutually_exclusive_size_attrs_is_an_error() {
        let mut root = TypeSpec::new("f");
        root.meta.id = Some("f".into());
        root.seq.push(FieldSpec {
            id: Some("x".into()),
            size: Some("4".into()),
            size_eos: true,
            ..Default::default()
        });
        let report = validate(&root, false);
        assert!(!report.is_valid());
    }

    #[test]
    fn unknown_enum_reference_is_an_error() {
        let mut root = TypeSpec::new("f");
        root.meta.id = Some("f".into());
        root.seq.push(FieldSpec {
            id: Some("x".into()),
            enum_ref: Some("nope".into()),
            ..Default::default()
        });
        let report = validate(&root, false);
        assert!(!report.is_valid());
    }

    #[test]
    fn enum_reference_resolves_through_inherited_scope() {
        let mut child = TypeSpec::new("child");
        child.seq.push(FieldSpec {
            id: Some("tag".into()),
            enum_ref: Some("ft".into()),
            ..Default::default()
        });

        let mut root = TypeSpec::new("f");
        root.meta.id = Some("f".into());
        root.enums.insert(
            "ft".into(),
            EnumSpec {
                members: IndexMap::from([(1, "text".into())]),
            },
        );
        root.types.insert("child".into(), child);

        let report = validate(&root, false);
        assert!(report.is_valid());
    }

    #[test]
    fn strict_mode_promotes_warnings() {
        let mut root = TypeSpec::new("f");
        root.meta.id = Some("f".into());
        root.seq.push(FieldSpec {
            id: Some("BadName".into()),
            ..Default::default()
        });
        let lenient = validate(&root, false);
        assert!(lenient.is_valid());
        let strict = validate(&root, true);
        assert!(!strict.is_valid());
    }
}
