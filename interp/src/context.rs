//! Per-parse evaluation state: spec 3.3. Cheap to clone — every field is
//! either an `Rc` or a small `Copy`/`Option` — so each repetition iteration
//! and each nested-type entry gets its own `EvalContext` by cloning and
//! tweaking rather than threading mutable borrows through the interpreter.

use binfmt_error::Error;
use binfmt_expr::{Ctx, IoHandle, Obj, Value};
use binfmt_schema::TypeSpec;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone)]
pub struct EvalContext {
    pub io: IoHandle,
    pub root: Rc<RefCell<Obj>>,
    /// Enclosing objects, outermost first; `last()` is `_parent`.
    pub parent_stack: Vec<Rc<RefCell<Obj>>>,
    pub current: Rc<RefCell<Obj>>,
    /// Lexical scope chain for type/enum name resolution: innermost type
    /// last, per spec 3.2's "inner -> outer -> root" resolution order.
    pub scope: Vec<Rc<TypeSpec>>,
    /// Set during repetition (spec 4.4.2); `None` outside a repeated field.
    pub index: Option<i64>,
    /// The `_` binding inside a `repeat: until` condition (spec 4.4.2).
    pub last_value: Option<Value>,
}

impl Ctx for EvalContext {
    fn resolve(&self, name: &str) -> Option<Result<Value, Error>> {
        match name {
            "_io" => Some(Ok(Value::Io(self.io.clone()))),
            "_root" => Some(Ok(Value::Obj(self.root.borrow().clone()))),
            "_parent" => Some(Ok(self
                .parent_stack
                .last()
                .map(|p| Value::Obj(p.borrow().clone()))
                .unwrap_or(Value::Null))),
            "_index" => Some(Ok(self.index.map(Value::Int).unwrap_or(Value::Null))),
            "_" => Some(Ok(self.last_value.clone().unwrap_or(Value::Null))),
            _ => self.current.borrow().get(name),
        }
    }

    fn enum_value(&self, enum_name: &str, member: &str) -> Option<i64> {
        self.scope
            .iter()
            .rev()
            .find_map(|ts| ts.enums.get(enum_name).and_then(|e| e.value_of(member)))
    }
}

impl EvalContext {
    pub fn resolve_type(&self, name: &str) -> Option<&TypeSpec> {
        self.scope.iter().rev().find_map(|ts| ts.types.get(name))
    }
}
