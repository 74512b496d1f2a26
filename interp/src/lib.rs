//! The type interpreter: drives the schema model against a byte stream,
//! consulting the expression engine through a per-parse evaluation context
//! (spec 4.4, and spec 3.3 for the context itself).

mod context;
mod engine;

pub use context::EvalContext;
pub use engine::{parse, parse_with_args, Options};
