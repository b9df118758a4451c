//! Cache-key derivation from a call's argument list.
//!
//! The external dispatch layer hands us a [`MethodCall`]: the argument
//! values of an intercepted call, each either a plain key-capable value
//! ([`CallArg::Key`]) or a cacheable entity ([`CallArg::Entity`]), plus an
//! optional key-marked parameter index for disambiguation. [`resolve_key`]
//! applies the derivation rules in order; the first match wins, and a call
//! no rule matches is a hard configuration error, never silently uncached.

use crate::entity::{extract_key, Cacheable, TypeToken};
use crate::error::CacheError;
use crate::key::CacheKey;

/// One argument of an intercepted call.
pub enum CallArg<'a> {
    /// A plain value usable as a cache key directly.
    Key(CacheKey),
    /// A cacheable entity; its key lives in its identity field.
    Entity(&'a dyn Cacheable),
}

/// A resolved method call as seen by the dispatch layer.
pub struct MethodCall<'a> {
    /// Name of the intercepted method, for error reporting.
    pub method: &'a str,
    /// Name of the type declaring the method, for error reporting.
    pub declaring_type: &'a str,
    /// The call's arguments, in declaration order.
    pub args: Vec<CallArg<'a>>,
    /// Index of the parameter marked as the cache key, if any.
    pub key_param: Option<usize>,
}

impl<'a> MethodCall<'a> {
    /// A call with no key-marked parameter.
    pub fn new(method: &'a str, declaring_type: &'a str, args: Vec<CallArg<'a>>) -> Self {
        Self {
            method,
            declaring_type,
            args,
            key_param: None,
        }
    }

    /// Mark the parameter at `index` as the cache key.
    pub fn with_key_param(mut self, index: usize) -> Self {
        self.key_param = Some(index);
        self
    }
}

/// Derive the cache key for a call. First matching rule wins:
///
/// 1. Exactly one argument: a plain value is the key itself; an entity's
///    key is extracted from its identity field. (Declared and runtime
///    argument types coincide in Rust, so the designated-type carve-out of
///    the single-argument rule needs no separate branch.)
/// 2. Multiple arguments with a designated type: the first entity argument
///    of that type has its key extracted.
/// 3. Multiple arguments, none designated: the key-marked parameter is the
///    key.
/// 4. Otherwise the call is misconfigured: [`CacheError::NoCacheKey`].
///
/// Extraction walks the entity's ancestor chain; a type with no identity
/// field anywhere fails with [`CacheError::NoIdentityField`].
pub fn resolve_key(
    call: &MethodCall<'_>,
    designated: Option<TypeToken>,
) -> Result<CacheKey, CacheError> {
    if call.args.len() == 1 {
        return match &call.args[0] {
            CallArg::Key(key) => Ok(key.clone()),
            CallArg::Entity(entity) => extract_key(*entity),
        };
    }

    if let Some(token) = designated {
        for arg in &call.args {
            if let CallArg::Entity(entity) = arg {
                if entity.type_token().id == token.id {
                    return extract_key(*entity);
                }
            }
        }
    }

    if let Some(index) = call.key_param {
        if let Some(arg) = call.args.get(index) {
            return match arg {
                CallArg::Key(key) => Ok(key.clone()),
                CallArg::Entity(entity) => extract_key(*entity),
            };
        }
    }

    Err(CacheError::NoCacheKey {
        method: call.method.to_string(),
        declaring_type: call.declaring_type.to_string(),
    })
}
