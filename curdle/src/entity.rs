//! Explicit identity registration for cacheable types.
//!
//! The library performs no runtime introspection. A type that wants its
//! instances cached under the value of one of its fields implements
//! [`Cacheable`] and returns that field's value from [`Cacheable::identity`].
//! Inherited identity fields are modeled by composition: a type embedding a
//! parent entity exposes it through [`Cacheable::parent`], and key
//! extraction walks that chain until a type with an identity field is found.
//!
//! # Example
//!
//! ```ignore
//! use curdle::{Cacheable, CacheKey, TypeToken};
//!
//! struct User { id: i64, name: String }
//!
//! impl Cacheable for User {
//!     fn identity(&self) -> Result<Option<CacheKey>, BoxError> {
//!         Ok(Some(self.id.into()))
//!     }
//!     fn type_token(&self) -> TypeToken {
//!         TypeToken::of::<User>()
//!     }
//! }
//! ```

use std::any::TypeId;

use crate::error::{BoxError, CacheError};
use crate::key::CacheKey;

/// Per-type default TTL in milliseconds (5 hours).
///
/// Applies to entries cached through a [`Cacheable`] type that does not
/// override [`Cacheable::ttl_ms`]. Independent of the registry-wide default
/// TTL, which governs calls with no type-level declaration.
pub const DEFAULT_ENTITY_TTL_MS: i64 = 18_000_000;

/// Identifies a concrete cacheable type for designated-type matching and
/// error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeToken {
    /// The runtime type id.
    pub id: TypeId,
    /// The type name, used in store names and error messages.
    pub name: &'static str,
}

impl TypeToken {
    /// Token for the concrete type `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

/// A type whose instances carry their own cache identity.
///
/// Implementations return the identity field's value from [`identity`]
/// (`Ok(None)` when the type declares no identity field of its own and the
/// lookup should continue on the parent). The remaining methods carry the
/// per-type cache metadata: store name, provider override and TTL.
///
/// [`identity`]: Cacheable::identity
pub trait Cacheable: Send + Sync {
    /// Value of this type's identity field.
    ///
    /// - `Ok(Some(key))`: the type declares an identity field; `key` is its
    ///   value.
    /// - `Ok(None)`: no identity field on this type; extraction continues on
    ///   [`Cacheable::parent`].
    /// - `Err(_)`: the accessor itself failed. Surfaces as
    ///   [`CacheError::KeyAccess`] wrapping the failure.
    fn identity(&self) -> Result<Option<CacheKey>, BoxError>;

    /// Embedded parent entity, for identity fields declared on an ancestor.
    fn parent(&self) -> Option<&dyn Cacheable> {
        None
    }

    /// Token identifying the concrete type.
    fn type_token(&self) -> TypeToken;

    /// Store name for entries of this type. Defaults to the type name.
    fn store_name(&self) -> &str {
        self.type_token().name
    }

    /// Provider override for this type. `None` selects the registry default.
    fn provider_name(&self) -> Option<&str> {
        None
    }

    /// TTL for entries of this type, in milliseconds.
    fn ttl_ms(&self) -> i64 {
        DEFAULT_ENTITY_TTL_MS
    }
}

/// Extract the cache key from an entity, walking the ancestor chain.
///
/// The chain is walked once, nearest type first. A type with no identity
/// field anywhere in its ancestry is a configuration error
/// ([`CacheError::NoIdentityField`]), distinct from an accessor failure
/// ([`CacheError::KeyAccess`]) so callers can tell a misconfigured entity
/// from a broken one.
pub fn extract_key(entity: &dyn Cacheable) -> Result<CacheKey, CacheError> {
    let mut current: Option<&dyn Cacheable> = Some(entity);
    while let Some(node) = current {
        match node.identity() {
            Ok(Some(key)) => return Ok(key),
            Ok(None) => current = node.parent(),
            Err(source) => {
                return Err(CacheError::KeyAccess {
                    type_name: node.type_token().name.to_string(),
                    source,
                })
            }
        }
    }
    Err(CacheError::NoIdentityField {
        type_name: entity.type_token().name.to_string(),
    })
}
