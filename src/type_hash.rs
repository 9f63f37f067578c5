//! Hash-based type identity.
//!
//! [`TypeHash`] is the 64-bit key every registry table is indexed by. Native
//! types get their hash from the process type-identity primitive
//! ([`TypeHash::of`]); name-derived hashes ([`TypeHash::from_name`]) are
//! deterministic across processes and used for content keys.
//!
//! Distinct native types produce distinct [`std::any::TypeId`] values, and the
//! 64-bit reduction of that identity is collision free in practice. The
//! residual collision risk is inherited from the host primitive and is not
//! checked here.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use xxhash_rust::xxh64::xxh64;

/// Domain-mixing constants so name-derived hashes never collide with other
/// hash domains sharing a table.
pub mod hash_constants {
    /// Domain marker for class-name hashes
    pub const CLASS: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for module source content hashes
    pub const SOURCE: u64 = 0x5ea77ffbcdf5f302;
}

/// A 64-bit hash identifying a native type or a named entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Hash of a native type's process identity.
    ///
    /// Stable for the life of the process; not stable across builds.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        let mut hasher = std::hash::DefaultHasher::new();
        TypeId::of::<T>().hash(&mut hasher);
        TypeHash(hasher.finish())
    }

    /// Deterministic hash of a class name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::CLASS ^ xxh64(name.as_bytes(), 0))
    }

    /// Deterministic content hash of module stub source.
    #[inline]
    pub fn from_source(source: &str) -> Self {
        TypeHash(hash_constants::SOURCE ^ xxh64(source.as_bytes(), 0))
    }

    /// Whether this is the empty/invalid hash.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Raw hash value.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
