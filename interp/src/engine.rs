//! The type interpreter: spec 4.4. Walks a [`TypeSpec`] against a stream,
//! consulting the expression engine for every attribute that carries one,
//! and builds the result value tree.

use crate::context::EvalContext;
use binfmt_error::Error;
use binfmt_expr::{eval, parse, Lazy, Obj, Value};
use binfmt_schema::{
    Builtin, Contents, Endian, EndianSpec, FieldSpec, Repeat, TerminatorSpec, TypeRef, TypeSpec,
};
use binfmt_stream::{Encoding, Stream, Terminator};
use std::cell::RefCell;
use std::rc::Rc;

/// Options for the top-level `parse` entry point (spec 6.1).
#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub validate: bool,
    pub strict: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options { validate: true, strict: false }
    }
}

/// `parse(schema, stream, parent?, type-args?) -> object`, specialized to
/// the common case of a top-level, non-parametric parse (spec 4.4's entry
/// point; see [`parse_with_args`] for parametric types).
pub fn parse(schema: Rc<TypeSpec>, stream: Stream, options: Options) -> Result<Obj, Error> {
    parse_with_args(schema, stream, options, Vec::new())
}

/// The full entry point, including argument binding for parametric root
/// types (an advanced/secondary operation per spec 6.1 — ordinary `type:`
/// field references never carry arguments in this schema model).
pub fn parse_with_args(
    schema: Rc<TypeSpec>,
    stream: Stream,
    options: Options,
    args: Vec<Value>,
) -> Result<Obj, Error> {
    if options.validate {
        let report = binfmt_schema::validate(&schema, options.strict);
        if !report.is_valid() {
            let first = report
                .errors
                .first()
                .map(|f| f.message.clone())
                .unwrap_or_else(|| "schema failed validation".to_string());
            return Err(Error::validation(first));
        }
    }

    let current = Rc::new(RefCell::new(Obj::new()));
    let io = Rc::new(RefCell::new(stream));
    let mut ctx = EvalContext {
        io,
        root: current.clone(),
        parent_stack: Vec::new(),
        current: current.clone(),
        scope: vec![schema.clone()],
        index: None,
        last_value: None,
    };

    bind_params(&schema, &mut ctx, args)?;

    let (endian, encoding) = resolve_own_meta(&schema, &ctx, None, Encoding::default())?;
    tracing::debug!(type_id = %schema.id, "entering root type");
    run_sequence(&schema, &mut ctx, endian, encoding)?;
    install_instances(&schema, &ctx, endian, encoding);
    tracing::debug!(type_id = %schema.id, pos = ctx.io.borrow().pos(), "leaving root type");

    Ok(Rc::try_unwrap(current)
        .map(|cell| cell.into_inner())
        .unwrap_or_else(|rc| rc.borrow().clone()))
}

fn bind_params(ts: &TypeSpec, ctx: &mut EvalContext, args: Vec<Value>) -> Result<(), Error> {
    if ts.params.is_empty() {
        return Ok(());
    }
    if args.len() != ts.params.len() {
        return Err(Error::parse(format!(
            "type {:?} expects {} argument(s), got {}",
            ts.id,
            ts.params.len(),
            args.len()
        )));
    }
    let mut current = ctx.current.borrow_mut();
    for (param, value) in ts.params.iter().zip(args) {
        current.set(param.id.clone(), value);
    }
    Ok(())
}

fn resolve_own_meta(
    ts: &TypeSpec,
    ctx: &EvalContext,
    inherited_endian: Option<Endian>,
    inherited_encoding: Encoding,
) -> Result<(Option<Endian>, Encoding), Error> {
    let endian = match &ts.meta.endian {
        Some(EndianSpec::Fixed(e)) => Some(*e),
        Some(EndianSpec::Switch(src)) => Some(eval_endian_switch(src, ctx)?),
        None => inherited_endian,
    };
    let encoding = ts.meta.encoding.unwrap_or(inherited_encoding);
    Ok((endian, encoding))
}

fn eval_endian_switch(src: &str, ctx: &EvalContext) -> Result<Endian, Error> {
    let expr = parse(src)?;
    match eval(&expr, ctx)? {
        Value::Str(s) => match s.to_ascii_lowercase().as_str() {
            "be" | "big" => Ok(Endian::Big),
            "le" | "little" => Ok(Endian::Little),
            other => Err(Error::validation(format!(
                "endian switch evaluated to {other:?}, expected \"le\" or \"be\""
            ))),
        },
        Value::Bool(b) => Ok(if b { Endian::Big } else { Endian::Little }),
        other => Err(Error::parse(format!(
            "endian switch must evaluate to a string or boolean, got a {}",
            other.type_name()
        ))),
    }
}

fn run_sequence(
    ts: &TypeSpec,
    ctx: &mut EvalContext,
    endian: Option<Endian>,
    encoding: Encoding,
) -> Result<(), Error> {
    for field in &ts.seq {
        match dispatch_field(field, ctx, endian, encoding)? {
            Some(value) => {
                if let Some(name) = &field.id {
                    ctx.current.borrow_mut().set(name.clone(), value);
                }
            }
            None => {}
        }
    }
    Ok(())
}

fn install_instances(ts: &TypeSpec, ctx: &EvalContext, endian: Option<Endian>, encoding: Encoding) {
    for (name, inst) in &ts.instances {
        let inst = inst.clone();
        let ctx = ctx.clone();
        let name_for_trace = name.clone();
        let lazy = Lazy::new(move || {
            tracing::trace!(instance = %name_for_trace, "realizing lazy instance");
            if let Some(value_src) = &inst.value {
                let expr = parse(value_src)?;
                return eval(&expr, &ctx);
            }
            let saved = ctx.io.borrow().pos();
            let result = (|| {
                if let Some(pos_src) = &inst.field.pos {
                    let p = eval(&parse(pos_src)?, &ctx)?;
                    let pos = as_usize(&p)?;
                    ctx.io.borrow_mut().seek(pos)?;
                }
                read_one(&inst.field, &ctx, endian, encoding)
            })();
            let _ = ctx.io.borrow_mut().seek(saved);
            result
        });
        ctx.current.borrow_mut().set_lazy(name.clone(), lazy);
    }
}

fn as_usize(v: &Value) -> Result<usize, Error> {
    let n = v
        .as_i128()
        .ok_or_else(|| Error::parse(format!("expected a numeric value, got a {}", v.type_name())))?;
    usize::try_from(n).map_err(|_| Error::parse(format!("{n} is out of range for a position/size")))
}

/// Handles the `if`/`pos`/`io` attributes and repetition (spec 4.4.1 items
/// 1-4); delegates the per-element contents-check-then-value-read (items
/// 5-6) to [`read_one`]. `Ok(None)` means the field's `if` gate was falsy
/// and nothing should be stored (spec 4.4.1 item 2 of the top-level
/// contract: "fields with `if` that evaluates falsy produce no stored
/// value").
fn dispatch_field(
    field: &FieldSpec,
    ctx: &mut EvalContext,
    endian: Option<Endian>,
    encoding: Encoding,
) -> Result<Option<Value>, Error> {
    if let Some(src) = &field.if_expr {
        let cond = eval(&parse(src)?, ctx)?;
        if !cond.truthy() {
            return Ok(None);
        }
    }

    if let Some(src) = &field.pos {
        let p = eval(&parse(src)?, ctx)?;
        let pos = as_usize(&p)?;
        ctx.io.borrow_mut().seek(pos)?;
    }

    if field.io.is_some() {
        return Err(Error::not_implemented("io redirect"));
    }

    if let Some(name) = &field.process {
        return Err(Error::not_implemented(format!("process directive {name:?}")));
    }

    let value = match &field.repeat {
        Repeat::None => read_one(field, ctx, endian, encoding)?,
        Repeat::Count(src) => {
            let n = eval(&parse(src)?, ctx)?;
            let n = n
                .as_i128()
                .ok_or_else(|| Error::parse("repeat count must be numeric"))?;
            if n < 0 {
                return Err(Error::parse("repeat count must be non-negative"));
            }
            tracing::trace!(field = ?field.id, count = n, "repeat: count resolved");
            let mut items = Vec::with_capacity(n as usize);
            for i in 0..n {
                let mut iter_ctx = ctx.clone();
                iter_ctx.index = Some(i as i64);
                items.push(read_one(field, &iter_ctx, endian, encoding)?);
            }
            Value::Seq(items)
        }
        Repeat::Eos => {
            let mut items = Vec::new();
            let mut i: i64 = 0;
            while !ctx.io.borrow().is_eof() {
                let mut iter_ctx = ctx.clone();
                iter_ctx.index = Some(i);
                items.push(read_one(field, &iter_ctx, endian, encoding)?);
                i += 1;
            }
            tracing::trace!(field = ?field.id, count = i, "repeat: until-eos resolved");
            Value::Seq(items)
        }
        Repeat::Until(src) => {
            let expr = parse(src)?;
            let mut items = Vec::new();
            let mut i: i64 = 0;
            loop {
                if ctx.io.borrow().is_eof() {
                    break;
                }
                let mut iter_ctx = ctx.clone();
                iter_ctx.index = Some(i);
                let v = read_one(field, &iter_ctx, endian, encoding)?;
                iter_ctx.last_value = Some(v.clone());
                items.push(v);
                i += 1;
                if eval(&expr, &iter_ctx)?.truthy() {
                    break;
                }
            }
            tracing::trace!(field = ?field.id, count = i, "repeat: until resolved");
            Value::Seq(items)
        }
    };
    Ok(Some(value))
}

fn read_one(
    field: &FieldSpec,
    ctx: &EvalContext,
    endian: Option<Endian>,
    encoding: Encoding,
) -> Result<Value, Error> {
    if let Some(contents) = &field.contents {
        return check_contents(contents, ctx);
    }
    read_value(field, ctx, endian, encoding)
}

fn check_contents(contents: &Contents, ctx: &EvalContext) -> Result<Value, Error> {
    let expected: Vec<u8> = match contents {
        Contents::Bytes(b) => b.clone(),
        Contents::Str(s) => s.as_bytes().to_vec(),
    };
    let pos_before = ctx.io.borrow().pos();
    let actual = ctx.io.borrow_mut().read_bytes(expected.len())?;
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        if a != e {
            return Err(Error::validation_at_pos(
                format!("contents mismatch at byte {}", pos_before + i),
                pos_before + i,
            ));
        }
    }
    Ok(Value::Bytes(actual))
}

/// Single-value read: spec 4.4.4.
fn read_value(
    field: &FieldSpec,
    ctx: &EvalContext,
    endian: Option<Endian>,
    encoding: Encoding,
) -> Result<Value, Error> {
    if let Some(size_src) = &field.size {
        let n = as_usize(&eval(&parse(size_src)?, ctx)?)?;
        return read_sized(field, ctx, endian, encoding, n);
    }
    if field.size_eos {
        return read_to_eos(field, ctx, endian, encoding);
    }
    match &field.type_ref {
        Some(type_ref) => read_type_ref(type_ref, field, ctx, endian, encoding),
        None => Err(Error::parse("field has neither a size nor a type reference")),
    }
}

fn read_sized(
    field: &FieldSpec,
    ctx: &EvalContext,
    endian: Option<Endian>,
    encoding: Encoding,
    n: usize,
) -> Result<Value, Error> {
    match &field.type_ref {
        None => Ok(Value::Bytes(ctx.io.borrow_mut().read_bytes(n)?)),
        Some(TypeRef::Builtin(Builtin::Str)) | Some(TypeRef::Builtin(Builtin::Strz)) => {
            let bytes = ctx.io.borrow_mut().read_bytes(n)?;
            let enc = field.encoding.unwrap_or(encoding);
            Ok(Value::Str(enc.decode(&bytes)?))
        }
        Some(type_ref) => {
            let sub = ctx.io.borrow_mut().substream(n)?;
            let mut sub_ctx = ctx.clone();
            sub_ctx.io = Rc::new(RefCell::new(sub));
            read_type_ref(type_ref, field, &sub_ctx, endian, encoding)
        }
    }
}

fn read_to_eos(
    field: &FieldSpec,
    ctx: &EvalContext,
    endian: Option<Endian>,
    encoding: Encoding,
) -> Result<Value, Error> {
    match &field.type_ref {
        None => Ok(Value::Bytes(ctx.io.borrow_mut().read_bytes_to_eof()?)),
        Some(TypeRef::Builtin(Builtin::Str)) | Some(TypeRef::Builtin(Builtin::Strz)) => {
            let bytes = ctx.io.borrow_mut().read_bytes_to_eof()?;
            let enc = field.encoding.unwrap_or(encoding);
            Ok(Value::Str(enc.decode(&bytes)?))
        }
        Some(type_ref) => {
            let remaining = {
                let io = ctx.io.borrow();
                io.len() - io.pos()
            };
            let sub = ctx.io.borrow_mut().substream(remaining)?;
            let mut sub_ctx = ctx.clone();
            sub_ctx.io = Rc::new(RefCell::new(sub));
            read_type_ref(type_ref, field, &sub_ctx, endian, encoding)
        }
    }
}

fn read_type_ref(
    type_ref: &TypeRef,
    field: &FieldSpec,
    ctx: &EvalContext,
    endian: Option<Endian>,
    encoding: Encoding,
) -> Result<Value, Error> {
    match type_ref {
        TypeRef::Builtin(b) => read_builtin(*b, field, ctx, endian, encoding),
        TypeRef::Switch(sw) => {
            let disc = eval(&parse(&sw.on)?, ctx)?;
            let key = binfmt_expr::stringify(&disc);
            let chosen = sw.cases.get(&key).or(sw.default.as_deref());
            tracing::debug!(discriminant = %key, matched = chosen.is_some(), "switch-type dispatch");
            match chosen {
                Some(t) => read_type_ref(t, field, ctx, endian, encoding),
                None => Err(Error::parse(format!(
                    "no switch case for discriminant {key:?} and no default"
                ))),
            }
        }
        TypeRef::User(name, arg_srcs) => {
            let resolved = ctx
                .resolve_type(name)
                .cloned()
                .ok_or_else(|| Error::parse(format!("unknown type {name:?}")))?;
            let resolved = Rc::new(resolved);
            let (endian2, encoding2) = resolve_own_meta(&resolved, ctx, endian, encoding)?;

            // Argument expressions are evaluated against the caller's own
            // context (spec 4.4 item 1: "evaluating string arguments as
            // expressions against the outer context"), before the nested
            // type's own context exists to resolve them against.
            let args = arg_srcs
                .iter()
                .map(|src| eval(&parse(src)?, ctx))
                .collect::<Result<Vec<_>, _>>()?;

            let mut new_scope = ctx.scope.clone();
            new_scope.push(resolved.clone());
            let mut parent_stack = ctx.parent_stack.clone();
            parent_stack.push(ctx.current.clone());
            let mut new_ctx = EvalContext {
                io: ctx.io.clone(),
                root: ctx.root.clone(),
                parent_stack,
                current: Rc::new(RefCell::new(Obj::new())),
                scope: new_scope,
                index: None,
                last_value: None,
            };

            bind_params(&resolved, &mut new_ctx, args)?;

            tracing::debug!(type_id = %resolved.id, pos = new_ctx.io.borrow().pos(), "entering type");
            run_sequence(&resolved, &mut new_ctx, endian2, encoding2)?;
            install_instances(&resolved, &new_ctx, endian2, encoding2);
            tracing::debug!(type_id = %resolved.id, pos = new_ctx.io.borrow().pos(), "leaving type");

            Ok(Value::Obj(new_ctx.current.borrow().clone()))
        }
    }
}

fn resolve_endian(explicit: Option<Endian>, ambient: Option<Endian>) -> binfmt_stream::Endian {
    explicit.or(ambient).unwrap_or(Endian::Little).into()
}

fn read_builtin(
    b: Builtin,
    field: &FieldSpec,
    ctx: &EvalContext,
    endian: Option<Endian>,
    encoding: Encoding,
) -> Result<Value, Error> {
    let mut io = ctx.io.borrow_mut();
    match b {
        Builtin::U1 => Ok(Value::Int(io.read_u1()? as i64)),
        Builtin::S1 => Ok(Value::Int(io.read_s1()? as i64)),
        Builtin::U2(e) => Ok(Value::Int(io.read_u2(resolve_endian(e, endian))? as i64)),
        Builtin::U4(e) => Ok(Value::Int(io.read_u4(resolve_endian(e, endian))? as i64)),
        Builtin::U8(e) => Ok(Value::BigInt(io.read_u8(resolve_endian(e, endian))? as i128)),
        Builtin::S2(e) => Ok(Value::Int(io.read_s2(resolve_endian(e, endian))? as i64)),
        Builtin::S4(e) => Ok(Value::Int(io.read_s4(resolve_endian(e, endian))? as i64)),
        Builtin::S8(e) => Ok(Value::BigInt(io.read_s8(resolve_endian(e, endian))? as i128)),
        Builtin::F4(e) => Ok(Value::Float(io.read_f4(resolve_endian(e, endian))? as f64)),
        Builtin::F8(e) => Ok(Value::Float(io.read_f8(resolve_endian(e, endian))?)),
        Builtin::Str => Err(Error::parse("str requires a size or a terminator")),
        Builtin::Strz => {
            let term = to_stream_terminator(field.terminator.unwrap_or_default());
            let enc = field.encoding.unwrap_or(encoding);
            Ok(Value::Str(io.read_strz(enc, term)?))
        }
    }
}

fn to_stream_terminator(t: TerminatorSpec) -> Terminator {
    Terminator {
        byte: t.byte,
        include: t.include,
        consume: t.consume,
        eos_error: t.eos_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binfmt_schema::{EnumSpec, InstanceSpec, SwitchType};
    use indexmap::IndexMap;

    fn field(id: &str) -> FieldSpec {
        FieldSpec {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }

    fn run(schema: TypeSpec, bytes: &[u8]) -> Obj {
        parse(Rc::new(schema), Stream::from_bytes(bytes.to_vec()), Options { validate: false, strict: false }).unwrap()
    }

    fn run_err(schema: TypeSpec, bytes: &[u8]) -> Error {
        parse(Rc::new(schema), Stream::from_bytes(bytes.to_vec()), Options { validate: false, strict: false })
            .unwrap_err()
    }

    fn get_int(obj: &Obj, name: &str) -> i64 {
        match obj.get(name).unwrap().unwrap() {
            Value::Int(n) => n,
            other => panic!("expected Int for {name:?}, got {other:?}"),
        }
    }

    // S1: magic bytes followed by a couple of fixed-width fields.
    #[test]
    fn magic_and_fields() {
        let mut root = TypeSpec::new("root");
        root.seq.push(FieldSpec {
            contents: Some(Contents::Bytes(vec![0x4D, 0x5A])),
            ..field("magic")
        });
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::Builtin(Builtin::U2(Some(Endian::Little)))),
            ..field("version")
        });

        let obj = run(root, &[0x4D, 0x5A, 0x01, 0x00]);
        assert_eq!(get_int(&obj, "version"), 1);
    }

    // S2: a conditional field that's skipped when its `if` is falsy.
    #[test]
    fn conditional_field_is_skipped_when_falsy() {
        let mut root = TypeSpec::new("root");
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::Builtin(Builtin::U1)),
            ..field("flag")
        });
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::Builtin(Builtin::U1)),
            if_expr: Some("flag == 1".to_string()),
            ..field("extra")
        });

        let obj = run(root.clone(), &[0x00, 0x99]);
        assert!(!obj.contains("extra"));

        let obj = run(root, &[0x01, 0x42]);
        assert_eq!(get_int(&obj, "extra"), 0x42);
    }

    // S3: repeat-count driven by a previously parsed field.
    #[test]
    fn repeat_count_from_computed_expression() {
        let mut root = TypeSpec::new("root");
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::Builtin(Builtin::U1)),
            ..field("count")
        });
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::Builtin(Builtin::U1)),
            repeat: Repeat::Count("count".to_string()),
            ..field("entries")
        });

        let obj = run(root, &[3, 10, 20, 30]);
        match obj.get("entries").unwrap().unwrap() {
            Value::Seq(items) => {
                assert_eq!(items.len(), 3);
                assert!(matches!(&items[0], Value::Int(10)));
                assert!(matches!(&items[2], Value::Int(30)));
            }
            other => panic!("expected Seq, got {other:?}"),
        }
    }

    // S4: repeat-until referencing the just-parsed element via `_`.
    #[test]
    fn repeat_until_stops_on_sentinel() {
        let mut root = TypeSpec::new("root");
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::Builtin(Builtin::U1)),
            repeat: Repeat::Until("_ == 0".to_string()),
            ..field("entries")
        });

        let obj = run(root, &[5, 6, 0, 99]);
        match obj.get("entries").unwrap().unwrap() {
            Value::Seq(items) => assert_eq!(items.len(), 3),
            other => panic!("expected Seq, got {other:?}"),
        }
    }

    // S5: switch-type dispatch falling through to the default case.
    #[test]
    fn switch_type_falls_back_to_default() {
        let mut root = TypeSpec::new("root");
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::Builtin(Builtin::U1)),
            ..field("tag")
        });
        let mut cases = IndexMap::new();
        cases.insert("1".to_string(), TypeRef::Builtin(Builtin::U1));
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::Switch(Box::new(SwitchType {
                on: "tag".to_string(),
                cases,
                default: Some(Box::new(TypeRef::Builtin(Builtin::U2(Some(Endian::Little))))),
            }))),
            ..field("body")
        });

        // tag = 2 has no case -> falls back to the u2le default.
        let obj = run(root, &[2, 0x34, 0x12]);
        assert_eq!(get_int(&obj, "body"), 0x1234);
    }

    // S6: a pos-anchored lazy instance that restores the stream position.
    #[test]
    fn lazy_pos_instance_restores_stream_position() {
        let mut root = TypeSpec::new("root");
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::Builtin(Builtin::U1)),
            ..field("first")
        });
        root.instances.insert(
            "checksum".to_string(),
            InstanceSpec {
                field: FieldSpec {
                    type_ref: Some(TypeRef::Builtin(Builtin::U1)),
                    pos: Some("0".to_string()),
                    ..Default::default()
                },
                value: None,
            },
        );
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::Builtin(Builtin::U1)),
            ..field("second")
        });

        let obj = run(root, &[0xAA, 0xBB]);
        assert_eq!(get_int(&obj, "first"), 0xAA);
        assert_eq!(get_int(&obj, "second"), 0xBB);
        assert_eq!(get_int(&obj, "checksum"), 0xAA);
    }

    // S7: enum member used as the right-hand side of an `if` comparison.
    #[test]
    fn enum_member_usable_in_comparison() {
        let mut root = TypeSpec::new("root");
        let mut members = IndexMap::new();
        members.insert(1, "text".to_string());
        members.insert(2, "binary".to_string());
        root.enums.insert("file_type".to_string(), EnumSpec { members });

        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::Builtin(Builtin::U1)),
            enum_ref: Some("file_type".to_string()),
            ..field("tag")
        });
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::Builtin(Builtin::U1)),
            if_expr: Some("tag == file_type::text".to_string()),
            ..field("body")
        });

        let obj = run(root.clone(), &[1, 0x42]);
        assert_eq!(get_int(&obj, "tag"), 1);
        assert_eq!(get_int(&obj, "body"), 0x42);

        let obj = run(root, &[2, 0x42]);
        assert!(!obj.contains("body"));
    }

    // Reserved `process` directive: not interpreted, fails loudly.
    #[test]
    fn process_directive_is_not_implemented() {
        let mut root = TypeSpec::new("root");
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::Builtin(Builtin::U1)),
            process: Some("zlib".to_string()),
            ..field("payload")
        });

        let err = parse(
            Rc::new(root),
            Stream::from_bytes(vec![0x01]),
            Options { validate: false, strict: false },
        )
        .unwrap_err();
        assert_eq!(err.kind(), binfmt_error::ErrorKind::NotImplemented);
    }

    // Value instance: computed, no stream read.
    #[test]
    fn value_instance_is_computed_without_reading_the_stream() {
        let mut root = TypeSpec::new("root");
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::Builtin(Builtin::U1)),
            ..field("a")
        });
        root.instances.insert(
            "doubled".to_string(),
            InstanceSpec {
                field: FieldSpec::default(),
                value: Some("a * 2".to_string()),
            },
        );

        let obj = run(root, &[21]);
        assert_eq!(get_int(&obj, "doubled"), 42);
    }

    // A parametric nested type, invoked from a field reference with
    // argument expressions evaluated against the caller's context.
    #[test]
    fn parametric_type_reference_binds_arguments_from_caller_context() {
        use binfmt_schema::ParamSpec;

        let mut sized = TypeSpec::new("sized");
        sized.params.push(ParamSpec { id: "n".to_string(), type_name: "u1".to_string() });
        sized.seq.push(FieldSpec {
            type_ref: None,
            size: Some("n".to_string()),
            ..field("payload")
        });

        let mut root = TypeSpec::new("root");
        root.types.insert("sized".to_string(), sized);
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::Builtin(Builtin::U1)),
            ..field("len")
        });
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::User("sized".to_string(), vec!["len".to_string()])),
            ..field("body")
        });

        let obj = run(root, &[3, 0xAA, 0xBB, 0xCC, 0xDD]);
        match obj.get("body").unwrap().unwrap() {
            Value::Obj(nested) => match nested.get("payload").unwrap().unwrap() {
                Value::Bytes(b) => assert_eq!(&*b, &[0xAA, 0xBB, 0xCC]),
                other => panic!("expected Bytes, got {other:?}"),
            },
            other => panic!("expected Obj, got {other:?}"),
        }
    }

    // A parametric type referenced without arguments fails loudly instead
    // of silently binding its parameters to null.
    #[test]
    fn parametric_type_reference_without_args_is_an_error() {
        use binfmt_schema::ParamSpec;

        let mut sized = TypeSpec::new("sized");
        sized.params.push(ParamSpec { id: "n".to_string(), type_name: "u1".to_string() });

        let mut root = TypeSpec::new("root");
        root.types.insert("sized".to_string(), sized);
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::User("sized".to_string(), Vec::new())),
            ..field("body")
        });

        let err = run_err(root, &[0xAA]);
        assert_eq!(err.kind(), binfmt_error::ErrorKind::Parse);
    }

    // Nested user-defined type, inheriting the enclosing meta's endianness.
    #[test]
    fn nested_type_inherits_enclosing_endianness() {
        let mut entry = TypeSpec::new("entry");
        entry.seq.push(FieldSpec {
            type_ref: Some(TypeRef::Builtin(Builtin::U2(None))),
            ..field("value")
        });

        let mut root = TypeSpec::new("root");
        root.meta.endian = Some(EndianSpec::Fixed(Endian::Big));
        root.types.insert("entry".to_string(), entry);
        root.seq.push(FieldSpec {
            type_ref: Some(TypeRef::User("entry".to_string(), Vec::new())),
            ..field("e")
        });

        let obj = run(root, &[0x00, 0x2A]);
        match obj.get("e").unwrap().unwrap() {
            Value::Obj(nested) => assert_eq!(get_int(&nested, "value"), 0x2A),
            other => panic!("expected Obj, got {other:?}"),
        }
    }
}
