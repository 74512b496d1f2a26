//! Text encodings the stream knows how to decode byte runs with.
//!
//! The engine's contract only requires "decode using the field-local
//! encoding or the enclosing type's default" — it does not mandate a
//! particular registry of encodings. This closed set (UTF-8, ASCII) covers
//! every scenario in the spec and the loader's surface syntax; widening it
//! to a full encoding registry (e.g. via `encoding_rs`) is a natural
//! extension that does not change any interpreter semantics.

use binfmt_error::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    Utf8,
    Ascii,
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Utf8
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_uppercase().as_str() {
            "UTF-8" | "UTF8" => Ok(Encoding::Utf8),
            "ASCII" | "US-ASCII" => Ok(Encoding::Ascii),
            other => Err(Error::validation(format!("unknown encoding {other:?}"))),
        }
    }
}

impl Encoding {
    pub fn decode(self, bytes: &[u8]) -> Result<String, Error> {
        match self {
            Encoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|_| Error::parse("malformed data, non-UTF-8 string bytes")),
            Encoding::Ascii => {
                if bytes.iter().any(|&b| b >= 0x80) {
                    return Err(Error::parse("malformed data, non-ASCII byte in ascii string"));
                }
                Ok(bytes.iter().map(|&b| b as char).collect())
            }
        }
    }
}
