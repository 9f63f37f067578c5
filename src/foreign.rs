//! Foreign object cells.
//!
//! Every native object crossing into the VM is wrapped in a [`ForeignObject`],
//! the fixed-size cell the VM's foreign storage holds. The cell either owns
//! its value through a [`Shared`] handle or borrows it through a raw pointer,
//! depending on which parameter shape crossed the boundary. Type-erased access
//! goes through the [`Foreign`] trait; [`ForeignCell`] is the erased,
//! reference-counted form a slot actually stores.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::CastError;
use crate::type_hash::TypeHash;

/// Shared-ownership handle for native objects. The VM is single-threaded, so
/// plain reference counting with interior mutability is the whole story.
pub type Shared<T> = Rc<RefCell<T>>;

/// Marker trait for native types registered as script classes.
///
/// Implemented by the [`foreign_type!`](crate::foreign_type) macro for user
/// structs, and blanket-implemented for `Vec<T>` and `VecDeque<T>` so the
/// container bindings can be registered like any other class. Trait-object
/// types used as script-visible base classes implement it by hand
/// (`impl ForeignType for dyn Shape {}`).
pub trait ForeignType: 'static {}

impl<T: 'static> ForeignType for Vec<T> {}

impl<T: 'static> ForeignType for std::collections::VecDeque<T> {}

/// How a cell relates to the native value it exposes.
enum ForeignValue<T: ?Sized> {
    /// Cell owns (or co-owns) the value. Created by value and shared-handle
    /// crossings; dropping the last owner drops the native value.
    Owned(Shared<T>),
    /// Cell borrows a value the host owns. Created by pointer crossings; the
    /// cell never frees it. The host keeps the pointee alive for as long as
    /// the VM can reach this cell.
    Borrowed(*mut T),
}

/// The cell stored in the VM's foreign slot for one native object.
pub struct ForeignObject<T: ?Sized + 'static> {
    value: ForeignValue<T>,
}

impl<T: 'static> ForeignObject<T> {
    /// Wrap a value the VM will own.
    pub fn owned(value: T) -> Self {
        ForeignObject {
            value: ForeignValue::Owned(Rc::new(RefCell::new(value))),
        }
    }
}

impl<T: ?Sized + 'static> ForeignObject<T> {
    /// Wrap an existing shared handle; ownership is shared with the host.
    pub fn from_shared(shared: Shared<T>) -> Self {
        ForeignObject {
            value: ForeignValue::Owned(shared),
        }
    }

    /// Wrap a raw pointer without taking ownership.
    pub fn borrowed(ptr: *mut T) -> Self {
        ForeignObject {
            value: ForeignValue::Borrowed(ptr),
        }
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self.value, ForeignValue::Borrowed(_))
    }

    /// Scoped shared access to the native value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        match &self.value {
            ForeignValue::Owned(shared) => f(&shared.borrow()),
            // Pointer crossings carry the host's liveness contract.
            ForeignValue::Borrowed(ptr) => unsafe { f(&**ptr) },
        }
    }

    /// Scoped exclusive access to the native value.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        match &self.value {
            ForeignValue::Owned(shared) => f(&mut shared.borrow_mut()),
            ForeignValue::Borrowed(ptr) => unsafe { f(&mut **ptr) },
        }
    }

    /// Share ownership of the value. Only owned cells can; a borrowed cell
    /// has no ownership to share.
    pub fn shared(&self) -> Result<Shared<T>, CastError> {
        match &self.value {
            ForeignValue::Owned(shared) => Ok(Rc::clone(shared)),
            ForeignValue::Borrowed(_) => Err(CastError::BorrowedCell {
                type_name: std::any::type_name::<T>(),
            }),
        }
    }

    /// Address of the native value. Stable for the life of the cell.
    pub fn as_ptr(&self) -> *mut T {
        match &self.value {
            ForeignValue::Owned(shared) => shared.as_ptr(),
            ForeignValue::Borrowed(ptr) => *ptr,
        }
    }
}

/// Type-erased view of a [`ForeignObject`].
pub trait Foreign {
    /// Identity of the wrapped native type.
    fn type_hash(&self) -> TypeHash;
    /// Native type name, for diagnostics.
    fn type_name(&self) -> &'static str;
    /// Downcast access.
    fn as_any(&self) -> &dyn Any;
}

impl<T: ?Sized + 'static> Foreign for ForeignObject<T> {
    fn type_hash(&self) -> TypeHash {
        TypeHash::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// What a foreign slot holds. Cloning shares the cell, so every copy of the
/// slot sees the same native object; the native value drops with the last
/// owning reference (the finalize hook is [`Drop`]).
pub type ForeignCell = Rc<dyn Foreign>;
