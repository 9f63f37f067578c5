//! Per-VM type registry.
//!
//! Maps native type identity to its script-side class location, and holds the
//! upcast table that makes derived-to-base conversions work across the
//! boundary. Every VM instance owns its own registry; two VMs never share
//! entries.

use std::any::Any;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{BindError, CastError};
use crate::foreign::Foreign;
use crate::type_hash::TypeHash;

/// Where a registered native type lives on the script side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLocation {
    pub module: String,
    pub name: String,
}

/// Converts an erased cell into a boxed `Shared<Base>` for one registered
/// (derived, base) pair. The box is downcast by the caller, which knows the
/// base type statically.
pub type UpcastFn = Rc<dyn Fn(&dyn Foreign) -> Result<Box<dyn Any>, CastError>>;

struct ClassEntry {
    location: ClassLocation,
    type_name: &'static str,
}

/// Class-location and upcast tables for one VM.
#[derive(Default)]
pub struct TypeRegistry {
    classes: FxHashMap<TypeHash, ClassEntry>,
    upcasts: FxHashMap<(TypeHash, TypeHash), UpcastFn>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    /// Record where a native type is exposed. Registering the same type twice
    /// is rejected; silently replacing the entry would leave the first class
    /// object reachable from scripts but unreachable from the registry.
    pub fn register_class(
        &mut self,
        hash: TypeHash,
        type_name: &'static str,
        module: &str,
        name: &str,
    ) -> Result<(), BindError> {
        if let Some(existing) = self.classes.get(&hash) {
            return Err(BindError::DuplicateClass {
                class: existing.location.name.clone(),
                type_name,
            });
        }
        self.classes.insert(
            hash,
            ClassEntry {
                location: ClassLocation {
                    module: module.to_string(),
                    name: name.to_string(),
                },
                type_name,
            },
        );
        Ok(())
    }

    /// Script-side location of a native type. Missing entry is a hard error;
    /// an unregistered type can never cross the boundary.
    pub fn resolve_class(
        &self,
        hash: TypeHash,
        type_name: &'static str,
    ) -> Result<&ClassLocation, CastError> {
        self.classes
            .get(&hash)
            .map(|entry| &entry.location)
            .ok_or(CastError::ClassNotRegistered { type_name })
    }

    pub fn is_class_registered(&self, hash: TypeHash) -> bool {
        self.classes.contains_key(&hash)
    }

    /// Name a registered class goes by, for diagnostics.
    pub fn class_type_name(&self, hash: TypeHash) -> Option<&'static str> {
        self.classes.get(&hash).map(|entry| entry.type_name)
    }

    /// Record a derived-to-base conversion. One entry per direct pair; only
    /// explicitly registered targets are reachable.
    pub fn register_upcast(&mut self, derived: TypeHash, base: TypeHash, cast: UpcastFn) {
        self.upcasts.insert((derived, base), cast);
    }

    pub fn resolve_upcast(&self, from: TypeHash, to: TypeHash) -> Option<&UpcastFn> {
        self.upcasts.get(&(from, to))
    }
}
