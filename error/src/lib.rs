//! The error taxonomy shared by every layer of the interpreter.
//!
//! Every failure that can escape the stream, schema, expression, or
//! interpreter crates is exactly one of the five kinds below. Callers that
//! only care about "did it work" can ignore the kind; tooling (the CLI) maps
//! each kind to an exit code.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// A byte offset into some stream. Kept as a plain `usize` rather than a
/// newtype since it never needs to be distinguished from any other count.
pub type Pos = usize;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Raised by the byte stream when a read would run past the end of its
    /// region. Carries the position the read was attempted at, not the
    /// position it would have ended at.
    #[error("end of stream at byte {pos}")]
    EndOfStream { pos: Pos },

    /// Raised by the expression lexer/parser/evaluator and by the
    /// interpreter for any failure that isn't more specifically a
    /// validation error. Carries an optional stream position (where the
    /// interpreter was when it needed the value) and an optional source
    /// position (offset into the expression text itself).
    #[error("parse error: {message}")]
    Parse {
        message: String,
        pos: Option<Pos>,
        src_pos: Option<Pos>,
    },

    /// Raised by the schema validator and by the interpreter's `contents`
    /// check. Carries a path within the schema (dot-separated field names)
    /// or a byte position, whichever is meaningful for the failure.
    #[error("validation error: {message}")]
    Validation {
        message: String,
        path: Option<String>,
        pos: Option<Pos>,
    },

    /// Raised for schema features this interpreter deliberately does not
    /// implement (the `io` redirect). Carries the feature's name.
    #[error("not implemented: {feature}")]
    NotImplemented { feature: String },

    /// Escape hatch for failures that don't fit the other four kinds.
    #[error("{0}")]
    Base(String),
}

impl Error {
    pub fn end_of_stream(pos: Pos) -> Self {
        Error::EndOfStream { pos }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
            pos: None,
            src_pos: None,
        }
    }

    pub fn parse_at(message: impl Into<String>, src_pos: Pos) -> Self {
        Error::Parse {
            message: message.into(),
            pos: None,
            src_pos: Some(src_pos),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            path: None,
            pos: None,
        }
    }

    pub fn validation_at_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            path: Some(path.into()),
            pos: None,
        }
    }

    pub fn validation_at_pos(message: impl Into<String>, pos: Pos) -> Self {
        Error::Validation {
            message: message.into(),
            path: None,
            pos: Some(pos),
        }
    }

    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Error::NotImplemented {
            feature: feature.into(),
        }
    }

    /// Attach (or overwrite) the stream byte position on a `Parse` error.
    /// No-op on every other kind, since only `Parse` models an "optional
    /// stream position" in its contract.
    pub fn with_stream_pos(mut self, pos: Pos) -> Self {
        if let Error::Parse { pos: p, .. } = &mut self {
            *p = Some(pos);
        }
        self
    }

    /// The taxonomy kind, for callers (the CLI) that need to branch on it
    /// without matching the full enum.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EndOfStream { .. } => ErrorKind::EndOfStream,
            Error::Parse { .. } => ErrorKind::Parse,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::NotImplemented { .. } => ErrorKind::NotImplemented,
            Error::Base(_) => ErrorKind::Base,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    EndOfStream,
    Parse,
    Validation,
    NotImplemented,
    Base,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ErrorKind::EndOfStream => "end-of-stream",
            ErrorKind::Parse => "parse-error",
            ErrorKind::Validation => "validation-error",
            ErrorKind::NotImplemented => "not-implemented",
            ErrorKind::Base => "error",
        };
        f.write_str(s)
    }
}

#[macro_export]
macro_rules! bail_parse {
    ($($e:tt)*) => {
        return Err($crate::Error::parse(format!($($e)*)))
    };
}

#[macro_export]
macro_rules! bail_validation {
    ($($e:tt)*) => {
        return Err($crate::Error::validation(format!($($e)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Error::end_of_stream(3).kind(), ErrorKind::EndOfStream);
        assert_eq!(Error::parse("x").kind(), ErrorKind::Parse);
        assert_eq!(Error::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(Error::not_implemented("io").kind(), ErrorKind::NotImplemented);
        assert_eq!(Error::Base("x".into()).kind(), ErrorKind::Base);
    }

    #[test]
    fn with_stream_pos_only_affects_parse() {
        let e = Error::parse("oops").with_stream_pos(42);
        match e {
            Error::Parse { pos: Some(42), .. } => {}
            _ => panic!("expected pos to be set"),
        }

        let e = Error::validation("oops").with_stream_pos(42);
        match e {
            Error::Validation { pos: None, .. } => {}
            _ => panic!("expected pos to stay unset"),
        }
    }
}
