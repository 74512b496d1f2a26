//! Random-access typed reads over an immutable byte region, including
//! bit-level and sub-stream views.
//!
//! This is the lowest layer of the interpreter: it knows nothing about
//! schemas or expressions, only about bytes and how to slice them.

pub mod encoding;
pub mod region;
pub mod stream;

pub use encoding::Encoding;
pub use region::{Bytes, Region};
pub use stream::{Endian, Stream, Terminator};
