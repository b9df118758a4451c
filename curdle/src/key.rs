//! Opaque cache keys.
//!
//! A [`CacheKey`] identifies exactly one cached result within a store. Keys
//! are equality- and hash-comparable: two calls that derive equal keys map
//! to the same entry. The variants cover the argument types methods
//! realistically key on — integers, strings and raw bytes — with `From`
//! conversions so call sites stay terse.
//!
//! Keys render as human-readable strings in logs (`key = %key`), following
//! the same debuggability rule the rest of the stack uses for identifiers.

use std::fmt;

/// An opaque, comparable cache key derived from a method argument or from
/// the identity field of a cacheable type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Signed integer key (covers the common numeric id types).
    Int(i64),
    /// String key.
    Str(String),
    /// Raw byte key for callers with composite or hashed identities.
    Bytes(Vec<u8>),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Int(v) => write!(f, "{}", v),
            CacheKey::Str(s) => write!(f, "{}", s),
            CacheKey::Bytes(b) => {
                write!(f, "0x")?;
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for CacheKey {
    fn from(v: i64) -> Self {
        CacheKey::Int(v)
    }
}

impl From<i32> for CacheKey {
    fn from(v: i32) -> Self {
        CacheKey::Int(v as i64)
    }
}

impl From<u32> for CacheKey {
    fn from(v: u32) -> Self {
        CacheKey::Int(v as i64)
    }
}

impl From<&str> for CacheKey {
    fn from(v: &str) -> Self {
        CacheKey::Str(v.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(v: String) -> Self {
        CacheKey::Str(v)
    }
}

impl From<Vec<u8>> for CacheKey {
    fn from(v: Vec<u8>) -> Self {
        CacheKey::Bytes(v)
    }
}
