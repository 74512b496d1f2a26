//! The tree-walking evaluator: spec 4.3.3.

use crate::ast::{BinOp, Expr, UnOp};
use crate::value::Value;
use binfmt_error::Error;
use std::cmp::Ordering;

/// Everything the evaluator needs from the surrounding parse that isn't
/// part of the expression itself: identifier resolution (special names
/// first, then `current`'s fields, per spec 3.3) and enum-table lookups
/// for `Enum::member` (spec 4.3.3).
///
/// Implemented by the interpreter's evaluation context; this crate only
/// depends on the trait, not on the interpreter.
pub trait Ctx {
    fn resolve(&self, name: &str) -> Option<Result<Value, Error>>;
    fn enum_value(&self, enum_name: &str, member: &str) -> Option<i64>;
}

pub fn eval(expr: &Expr, ctx: &dyn Ctx) -> Result<Value, Error> {
    match expr {
        Expr::Int(n) => Ok(Value::Int(*n)),
        Expr::Float(f) => Ok(Value::Float(*f)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Ident(name) => match ctx.resolve(name) {
            Some(v) => v,
            None => Ok(Value::Null),
        },
        Expr::Unary(op, inner) => eval_unary(*op, eval(inner, ctx)?),
        Expr::Binary(BinOp::And, lhs, rhs) => {
            let l = eval(lhs, ctx)?;
            if !l.truthy() {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval(rhs, ctx)?.truthy()))
        }
        Expr::Binary(BinOp::Or, lhs, rhs) => {
            let l = eval(lhs, ctx)?;
            if l.truthy() {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval(rhs, ctx)?.truthy()))
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = eval(lhs, ctx)?;
            let r = eval(rhs, ctx)?;
            eval_binary(*op, l, r)
        }
        Expr::Ternary(cond, then_branch, else_branch) => {
            if eval(cond, ctx)?.truthy() {
                eval(then_branch, ctx)
            } else {
                eval(else_branch, ctx)
            }
        }
        Expr::Member(obj, name) => {
            let v = eval(obj, ctx)?;
            eval_member(v, name)
        }
        Expr::Index(base, idx) => {
            let base = eval(base, ctx)?;
            let idx = eval(idx, ctx)?;
            eval_index(base, idx)
        }
        Expr::MethodCall(recv, name, args) => {
            let recv = eval(recv, ctx)?;
            let args = args
                .iter()
                .map(|a| eval(a, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            eval_method_call(recv, name, args)
        }
        Expr::EnumAccess(enum_name, member) => match ctx.enum_value(enum_name, member) {
            Some(v) => Ok(Value::Int(v)),
            None => Err(Error::parse(format!(
                "unknown enum member {enum_name}::{member}"
            ))),
        },
    }
}

fn eval_unary(op: UnOp, v: Value) -> Result<Value, Error> {
    match op {
        UnOp::Not => Ok(Value::Bool(!v.truthy())),
        UnOp::Neg => match v {
            Value::Int(n) => Ok(Value::Int(-n)),
            Value::BigInt(n) => Ok(Value::BigInt(-n)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(Error::parse(format!(
                "cannot negate a {}",
                other.type_name()
            ))),
        },
    }
}

/// Numeric values during arithmetic, kept distinct from `Value` so
/// integer-vs-float promotion rules can be applied uniformly regardless of
/// whether an operand started out as `Int` or `BigInt`.
enum Num {
    Int(i128),
    Float(f64),
}

fn as_num(v: &Value) -> Option<Num> {
    match v {
        Value::Int(n) => Some(Num::Int(*n as i128)),
        Value::BigInt(n) => Some(Num::Int(*n)),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

fn is_bigint_valued(v: &Value) -> bool {
    matches!(v, Value::BigInt(_))
}

fn int_result(n: i128, widen: bool) -> Value {
    if widen || n > i64::MAX as i128 || n < i64::MIN as i128 {
        Value::BigInt(n)
    } else {
        Value::Int(n as i64)
    }
}

/// Python-style floored division: quotient rounds toward negative
/// infinity, remainder takes the divisor's sign (spec 4.3.3's `%`
/// contract, generalized consistently to `/`'s exact-quotient case).
fn floor_div_mod(a: i128, b: i128) -> (i128, i128) {
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        (q - 1, r + b)
    } else {
        (q, r)
    }
}

fn eval_binary(op: BinOp, l: Value, r: Value) -> Result<Value, Error> {
    use BinOp::*;
    match op {
        Add if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) => {
            Ok(Value::Str(format!("{}{}", to_s(&l), to_s(&r))))
        }
        Add | Sub | Mul | Div | Mod => {
            let (ln, rn) = (
                as_num(&l).ok_or_else(|| type_err("arithmetic", &l))?,
                as_num(&r).ok_or_else(|| type_err("arithmetic", &r))?,
            );
            let widen = is_bigint_valued(&l) || is_bigint_valued(&r);
            match (ln, rn) {
                (Num::Int(a), Num::Int(b)) => match op {
                    Add => a
                        .checked_add(b)
                        .map(|n| int_result(n, widen))
                        .ok_or_else(|| Error::parse("integer overflow in addition")),
                    Sub => a
                        .checked_sub(b)
                        .map(|n| int_result(n, widen))
                        .ok_or_else(|| Error::parse("integer overflow in subtraction")),
                    Mul => a
                        .checked_mul(b)
                        .map(|n| int_result(n, widen))
                        .ok_or_else(|| Error::parse("integer overflow in multiplication")),
                    Div => {
                        if b == 0 {
                            return Err(Error::parse("division by zero"));
                        }
                        let (q, rem) = floor_div_mod(a, b);
                        if rem == 0 {
                            Ok(int_result(q, widen))
                        } else {
                            Ok(Value::Float(a as f64 / b as f64))
                        }
                    }
                    Mod => {
                        if b == 0 {
                            return Err(Error::parse("modulo by zero"));
                        }
                        Ok(int_result(floor_div_mod(a, b).1, widen))
                    }
                    _ => unreachable!(),
                },
                (a, b) => {
                    let (a, b) = (as_f64(a), as_f64(b));
                    match op {
                        Add => Ok(Value::Float(a + b)),
                        Sub => Ok(Value::Float(a - b)),
                        Mul => Ok(Value::Float(a * b)),
                        Div => {
                            if b == 0.0 {
                                return Err(Error::parse("division by zero"));
                            }
                            Ok(Value::Float(a / b))
                        }
                        Mod => {
                            if b == 0.0 {
                                return Err(Error::parse("modulo by zero"));
                            }
                            Ok(Value::Float(a - b * (a / b).floor()))
                        }
                        _ => unreachable!(),
                    }
                }
            }
        }
        Lt | Le | Gt | Ge => {
            let ord = compare(&l, &r)?;
            Ok(Value::Bool(match op {
                Lt => ord == Ordering::Less,
                Le => ord != Ordering::Greater,
                Gt => ord == Ordering::Greater,
                Ge => ord != Ordering::Less,
                _ => unreachable!(),
            }))
        }
        Eq => Ok(Value::Bool(values_equal(&l, &r))),
        Ne => Ok(Value::Bool(!values_equal(&l, &r))),
        BitAnd | BitOr | BitXor | Shl | Shr => {
            let a = l
                .as_i128()
                .ok_or_else(|| type_err("bitwise operation", &l))?;
            let b = r
                .as_i128()
                .ok_or_else(|| type_err("bitwise operation", &r))?;
            let widen = is_bigint_valued(&l) || is_bigint_valued(&r);
            let result = match op {
                BitAnd => a & b,
                BitOr => a | b,
                BitXor => a ^ b,
                Shl => {
                    let shift = u32::try_from(b).map_err(|_| Error::parse("shift amount out of range"))?;
                    a.checked_shl(shift).ok_or_else(|| Error::parse("integer overflow in left shift"))?
                }
                Shr => {
                    let shift = u32::try_from(b).map_err(|_| Error::parse("shift amount out of range"))?;
                    a.checked_shr(shift).ok_or_else(|| Error::parse("shift amount out of range"))?
                }
                _ => unreachable!(),
            };
            Ok(int_result(result, widen))
        }
        And | Or => unreachable!("short-circuit ops handled in eval()"),
    }
}

fn as_f64(n: Num) -> f64 {
    match n {
        Num::Int(i) => i as f64,
        Num::Float(f) => f,
    }
}

fn type_err(what: &str, v: &Value) -> Error {
    Error::parse(format!("cannot use a {} in {what}", v.type_name()))
}

fn compare(l: &Value, r: &Value) -> Result<Ordering, Error> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ if l.is_numeric() && r.is_numeric() => {
            if let (Value::Int(a), Value::Int(b)) = (l, r) {
                return Ok(a.cmp(b));
            }
            if let (Some(a), Some(b)) = (int_like(l), int_like(r)) {
                return Ok(a.cmp(&b));
            }
            l.as_f64()
                .unwrap()
                .partial_cmp(&r.as_f64().unwrap())
                .ok_or_else(|| Error::parse("cannot compare NaN"))
        }
        _ => Err(Error::parse(format!(
            "cannot compare a {} with a {}",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn int_like(v: &Value) -> Option<i128> {
    match v {
        Value::Int(n) => Some(*n as i128),
        Value::BigInt(n) => Some(*n),
        _ => None,
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Bytes(a), Value::Bytes(b)) => a.as_slice() == b.as_slice(),
        (Value::Seq(a), Value::Seq(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ if l.is_numeric() && r.is_numeric() => {
            if let (Some(a), Some(b)) = (int_like(l), int_like(r)) {
                a == b
            } else {
                l.as_f64() == r.as_f64()
            }
        }
        _ => false,
    }
}

/// The reserved zero-arg sentinels (spec 3.4/4.3.3) are written without
/// parens in practice (`x.length`, not `x.length()`), so the postfix
/// grammar hands them to us as plain `Member` nodes (spec 4.3.2 item 13:
/// "method call only when immediately following a member access"). Member
/// access on a `Str`/`Bytes`/`Seq` dispatches to the same sentinel logic a
/// parenthesized call would use; every other receiver resolves fields.
fn eval_member(v: Value, name: &str) -> Result<Value, Error> {
    match v {
        Value::Obj(obj) => match obj.get(name) {
            Some(r) => r,
            None => Ok(Value::Null),
        },
        Value::Io(io) => {
            let stream = io.borrow();
            match name {
                "pos" => Ok(Value::Int(stream.pos() as i64)),
                "size" => Ok(Value::Int(stream.len() as i64)),
                "eof" => Ok(Value::Bool(stream.is_eof())),
                other => Err(Error::parse(format!("_io has no member {other:?}"))),
            }
        }
        Value::Null => Err(Error::parse("cannot access member of undefined")),
        Value::Str(_) | Value::Bytes(_) | Value::Seq(_)
            if matches!(name, "length" | "size" | "to_i" | "to_s") =>
        {
            eval_method_call(v, name, Vec::new())
        }
        other => Err(Error::parse(format!(
            "cannot access member {name:?} of a {}",
            other.type_name()
        ))),
    }
}

fn eval_index(base: Value, idx: Value) -> Result<Value, Error> {
    let i = idx
        .as_i128()
        .ok_or_else(|| Error::parse("index must be numeric"))?;
    match base {
        Value::Seq(items) => {
            if i < 0 || i as usize >= items.len() {
                Ok(Value::Null)
            } else {
                Ok(items[i as usize].clone())
            }
        }
        Value::Bytes(bytes) => {
            if i < 0 || i as usize >= bytes.len() {
                Ok(Value::Null)
            } else {
                Ok(Value::Int(bytes[i as usize] as i64))
            }
        }
        other => Err(Error::parse(format!(
            "cannot index into a {}",
            other.type_name()
        ))),
    }
}

/// String rendering used for both the `+` string-concatenation coercion and
/// switch-type discriminant stringification (spec 4.4.4: case keys are
/// compared against the discriminant's stringified form).
pub fn stringify(v: &Value) -> String {
    to_s(v)
}

fn to_s(v: &Value) -> String {
    match v {
        Value::Int(n) => n.to_string(),
        Value::BigInt(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Str(s) => s.clone(),
        Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        Value::Null => String::new(),
        Value::Seq(_) | Value::Obj(_) | Value::Io(_) => format!("{v:?}"),
    }
}

fn eval_method_call(recv: Value, name: &str, args: Vec<Value>) -> Result<Value, Error> {
    if !args.is_empty() {
        return Err(Error::parse(format!(
            "method {name:?} does not take arguments"
        )));
    }
    match name {
        "length" | "size" => match &recv {
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::Bytes(b) => Ok(Value::Int(b.len() as i64)),
            Value::Seq(s) => Ok(Value::Int(s.len() as i64)),
            other => Err(Error::parse(format!(
                "{name} is not defined on a {}",
                other.type_name()
            ))),
        },
        "to_i" => match &recv {
            Value::Int(n) => Ok(Value::Int(*n)),
            Value::BigInt(n) => Ok(Value::BigInt(*n)),
            Value::Float(f) => Ok(Value::Int(f.floor() as i64)),
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| Error::parse(format!("cannot convert {s:?} to an integer"))),
            other => Err(Error::parse(format!(
                "to_i is not defined on a {}",
                other.type_name()
            ))),
        },
        "to_s" => Ok(Value::Str(to_s(&recv))),
        other => Err(Error::parse(format!("unknown method {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    struct NullCtx;
    impl Ctx for NullCtx {
        fn resolve(&self, _name: &str) -> Option<Result<Value, Error>> {
            None
        }
        fn enum_value(&self, _enum_name: &str, _member: &str) -> Option<i64> {
            None
        }
    }

    fn eval_str(src: &str) -> Value {
        eval(&parse(src).unwrap(), &NullCtx).unwrap()
    }

    fn as_int(v: Value) -> i64 {
        match v {
            Value::Int(n) => n,
            other => panic!("expected Int, got {other:?}"),
        }
    }

    #[test]
    fn floored_modulo_is_nonnegative_for_positive_divisor() {
        assert_eq!(as_int(eval_str("-7 % 3")), 2);
        assert_eq!(as_int(eval_str("7 % 3")), 1);
    }

    #[test]
    fn division_is_float_when_inexact_and_int_when_exact() {
        assert!(matches!(eval_str("10 / 2"), Value::Int(5)));
        assert!(matches!(eval_str("10 / 3"), Value::Float(_)));
    }

    #[test]
    fn string_concatenation_coerces_non_strings() {
        match eval_str(r#""x=" + 5"#) {
            Value::Str(s) => assert_eq!(s, "x=5"),
            other => panic!("expected Str, got {other:?}"),
        }
    }

    #[test]
    fn short_circuit_and_or() {
        assert!(!eval_str("false and (1/0 == 1)").truthy());
        assert!(eval_str("true or (1/0 == 1)").truthy());
    }

    #[test]
    fn ternary_evaluates_only_selected_branch() {
        assert_eq!(as_int(eval_str("true ? 1 : (1/0)")), 1);
    }

    #[test]
    fn bitwise_ops() {
        assert_eq!(as_int(eval_str("6 & 3")), 2);
        assert_eq!(as_int(eval_str("6 | 1")), 7);
        assert_eq!(as_int(eval_str("5 ^ 1")), 4);
        assert_eq!(as_int(eval_str("1 << 4")), 16);
        assert_eq!(as_int(eval_str("16 >> 4")), 1);
    }

    #[test]
    fn length_method_on_seq_and_bytes_and_str() {
        assert_eq!(as_int(eval_str(r#""hello".length"#)), 5);
    }

    #[test]
    fn comparison_across_mixed_types_fails() {
        assert!(eval(&parse("1 < \"x\"").unwrap(), &NullCtx).is_err());
    }

    #[test]
    fn bigint_multiplication_overflow_is_a_parse_error_not_a_panic() {
        struct BigCtx;
        impl Ctx for BigCtx {
            fn resolve(&self, name: &str) -> Option<Result<Value, Error>> {
                match name {
                    "x" | "y" => Some(Ok(Value::BigInt(u64::MAX as i128))),
                    _ => None,
                }
            }
            fn enum_value(&self, _e: &str, _m: &str) -> Option<i64> {
                None
            }
        }
        let e = parse("x * y").unwrap();
        let err = eval(&e, &BigCtx).unwrap_err();
        assert!(err.to_string().contains("overflow"));
    }

    #[test]
    fn shift_by_out_of_range_amount_is_a_parse_error_not_a_panic() {
        assert!(eval_str_checked("1 << 9999").is_err());
    }

    fn eval_str_checked(src: &str) -> Result<Value, Error> {
        eval(&parse(src).unwrap(), &NullCtx)
    }

    #[test]
    fn member_access_on_undefined_fails() {
        struct UndefCtx;
        impl Ctx for UndefCtx {
            fn resolve(&self, _name: &str) -> Option<Result<Value, Error>> {
                Some(Ok(Value::Null))
            }
            fn enum_value(&self, _e: &str, _m: &str) -> Option<i64> {
                None
            }
        }
        let e = parse("missing.field").unwrap();
        assert!(eval(&e, &UndefCtx).is_err());
    }
}
