//! The dynamically-typed value tree: spec 3.5.
//!
//! `Value` is what expressions evaluate to and what the interpreter's
//! result objects are built from. `Obj` fields can be eager (already
//! computed) or lazy (an instance: spec 4.4.3) — a lazy field shares its
//! memoization cell with every clone of the `Obj` it lives on, mirroring
//! the reference's "instance accessor" semantics in spec 3.6.

use binfmt_error::Error;
use binfmt_stream::{Bytes, Stream};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
pub enum Value {
    Int(i64),
    BigInt(i128),
    Float(f64),
    Bool(bool),
    Bytes(Bytes),
    Str(String),
    Seq(Vec<Value>),
    Obj(Obj),
    /// The special `_io` value: a handle onto the stream currently backing
    /// a type's sequence, exposing `.pos`, `.size`, `.eof` via member
    /// access (spec 3.3, 3.4).
    Io(IoHandle),
    /// The engine's "absent"/"undefined"/"missing" value (spec 4.3.3): an
    /// unresolved identifier, a skipped `if`-gated field, an out-of-range
    /// index.
    Null,
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "Int({n})"),
            Value::BigInt(n) => write!(f, "BigInt({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Seq(v) => f.debug_list().entries(v.iter()).finish(),
            Value::Obj(o) => write!(f, "{o:?}"),
            Value::Io(_) => write!(f, "Io(..)"),
            Value::Null => write!(f, "Null"),
        }
    }
}

pub type IoHandle = Rc<RefCell<Stream>>;

#[derive(Clone)]
enum LazyState {
    Pending(Rc<dyn Fn() -> Result<Value, Error>>),
    Done(Value),
}

/// A memoized, lazily-evaluated field. Cloning shares the same cell, so
/// every clone of the `Obj` that owns this field sees the same memoized
/// (or not-yet-memoized) state — there is exactly one underlying
/// evaluation no matter how many handles exist.
#[derive(Clone)]
pub struct Lazy {
    state: Rc<RefCell<LazyState>>,
}

impl Lazy {
    pub fn new(f: impl Fn() -> Result<Value, Error> + 'static) -> Self {
        Lazy {
            state: Rc::new(RefCell::new(LazyState::Pending(Rc::new(f)))),
        }
    }

    /// Evaluate (first access) or return the memoized value (subsequent
    /// accesses). A failing first access is **not** memoized: the
    /// accessor re-attempts the read on the next access rather than
    /// caching a poisoned result (spec 4.4.3, Open Question 3 resolved in
    /// DESIGN.md).
    pub fn get(&self) -> Result<Value, Error> {
        let pending = match &*self.state.borrow() {
            LazyState::Done(v) => return Ok(v.clone()),
            LazyState::Pending(f) => f.clone(),
        };
        let value = pending()?;
        *self.state.borrow_mut() = LazyState::Done(value.clone());
        Ok(value)
    }
}

impl fmt::Debug for Lazy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &*self.state.borrow() {
            LazyState::Pending(_) => write!(f, "<lazy, unevaluated>"),
            LazyState::Done(v) => write!(f, "<lazy, evaluated: {v:?}>"),
        }
    }
}

#[derive(Clone)]
enum Field {
    Value(Value),
    Lazy(Lazy),
}

/// An object under (or after) construction: the interpreter's `current`,
/// and every nested struct in the result tree. Field order is declaration
/// order, per spec 3.5/6.3's "instances realized in declaration order".
#[derive(Clone, Default)]
pub struct Obj {
    fields: IndexMap<String, Field>,
}

impl Obj {
    pub fn new() -> Self {
        Obj::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), Field::Value(value));
    }

    pub fn set_lazy(&mut self, name: impl Into<String>, lazy: Lazy) {
        self.fields.insert(name.into(), Field::Lazy(lazy));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Realize a field by name. `None` when no field with that name
    /// exists; `Some(Err(..))` when it exists but evaluating it failed.
    pub fn get(&self, name: &str) -> Option<Result<Value, Error>> {
        match self.fields.get(name)? {
            Field::Value(v) => Some(Ok(v.clone())),
            Field::Lazy(l) => Some(l.get()),
        }
    }

    /// Iterate fields in declaration order, realizing lazy ones — the
    /// serialization path (spec 6.3).
    pub fn iter_realized(&self) -> impl Iterator<Item = (&str, Result<Value, Error>)> {
        self.fields.iter().map(|(k, f)| {
            let v = match f {
                Field::Value(v) => Ok(v.clone()),
                Field::Lazy(l) => l.get(),
            };
            (k.as_str(), v)
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut m = f.debug_map();
        for (k, field) in &self.fields {
            match field {
                Field::Value(v) => {
                    m.entry(k, v);
                }
                Field::Lazy(l) => {
                    m.entry(k, l);
                }
            }
        }
        m.finish()
    }
}

impl Value {
    pub fn truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::BigInt(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::Seq(s) => !s.is_empty(),
            Value::Obj(_) | Value::Io(_) => true,
            Value::Null => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::BigInt(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer coercion for bitwise ops: floor of the numeric value.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Int(n) => Some(*n as i128),
            Value::BigInt(n) => Some(*n),
            Value::Float(f) => Some(f.floor() as i128),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::BigInt(_) | Value::Float(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Bytes(_) => "bytes",
            Value::Str(_) => "str",
            Value::Seq(_) => "seq",
            Value::Obj(_) => "obj",
            Value::Io(_) => "io",
            Value::Null => "null",
        }
    }
}
