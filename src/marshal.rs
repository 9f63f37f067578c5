//! Value marshalling between native types and slots.
//!
//! [`PushValue`] and [`PopValue`] define the parameter-shape matrix: how each
//! native shape (value, shared handle, raw pointer, option, vector,
//! primitive) crosses the slot boundary in each direction. Pops validate the
//! slot tag and, for foreign objects, the class identity; nothing is ever
//! assumed from context.
//!
//! All numerics cross as `f64`. Integers with magnitude above 2^53 silently
//! lose precision on the way through; that is the wire format's boundary and
//! holds for every integer impl below.
//!
//! `Option<T>` is the only sum type with a built-in crossing; `None` rides as
//! null. Enums with richer alternatives register as foreign classes via
//! [`foreign_type!`](crate::foreign_type) and cross as objects, or implement
//! [`PushValue`] themselves by dispatching on the active variant.

use std::rc::Rc;

use crate::error::CastError;
use crate::foreign::{ForeignCell, ForeignObject, ForeignType, Shared};
use crate::registry::TypeRegistry;
use crate::slot::Slot;
use crate::type_hash::TypeHash;

/// A view over the VM's slot array for one call frame.
pub struct Frame<'a> {
    slots: &'a mut Vec<Slot>,
    registry: &'a TypeRegistry,
}

impl<'a> Frame<'a> {
    pub fn new(slots: &'a mut Vec<Slot>, registry: &'a TypeRegistry) -> Self {
        Frame { slots, registry }
    }

    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Grow the frame to at least `n` slots, filling with null.
    pub fn ensure_slots(&mut self, n: usize) {
        if self.slots.len() < n {
            self.slots.resize(n, Slot::Null);
        }
    }

    pub fn try_slot(&self, idx: usize) -> Option<&Slot> {
        self.slots.get(idx)
    }

    /// Write a slot, growing the frame if needed.
    pub fn set(&mut self, idx: usize, slot: Slot) {
        self.ensure_slots(idx + 1);
        self.slots[idx] = slot;
    }

    pub fn push_value<T: PushValue>(&mut self, idx: usize, value: T) -> Result<(), CastError> {
        value.push(self, idx)
    }

    pub fn pop_value<T: PopValue>(&self, idx: usize) -> Result<T, CastError> {
        T::pop(self, idx)
    }
}

/// Native-to-slot conversion for one parameter shape.
pub trait PushValue {
    fn push(self, frame: &mut Frame<'_>, idx: usize) -> Result<(), CastError>;
}

/// Slot-to-native conversion for one parameter shape.
pub trait PopValue: Sized {
    fn pop(frame: &Frame<'_>, idx: usize) -> Result<Self, CastError>;
}

fn slot_checked<'f>(
    frame: &'f Frame<'_>,
    idx: usize,
    expected: &'static str,
) -> Result<&'f Slot, CastError> {
    frame.try_slot(idx).ok_or(CastError::Mismatch {
        expected,
        actual: "missing slot",
    })
}

pub(crate) fn foreign_cell<'f>(
    frame: &'f Frame<'_>,
    idx: usize,
    target: &'static str,
) -> Result<&'f ForeignCell, CastError> {
    match slot_checked(frame, idx, "foreign")? {
        Slot::Foreign(cell) => Ok(cell),
        Slot::Null => Err(CastError::Null {
            target_type: target,
        }),
        other => Err(CastError::Mismatch {
            expected: "foreign",
            actual: other.slot_type().as_str(),
        }),
    }
}

/// Push a native value as a new owned cell. The class must be registered.
pub fn push_owned<T: ForeignType>(
    frame: &mut Frame<'_>,
    idx: usize,
    value: T,
) -> Result<(), CastError> {
    frame
        .registry()
        .resolve_class(TypeHash::of::<T>(), std::any::type_name::<T>())?;
    frame.set(idx, Slot::Foreign(Rc::new(ForeignObject::owned(value))));
    Ok(())
}

/// Pop a native value by copying it out of the cell. Exact class match only.
pub fn pop_cloned<T: ForeignType + Clone>(
    frame: &Frame<'_>,
    idx: usize,
) -> Result<T, CastError> {
    let cell = foreign_cell(frame, idx, std::any::type_name::<T>())?;
    let obj = cell
        .as_any()
        .downcast_ref::<ForeignObject<T>>()
        .ok_or(CastError::ForeignMismatch {
            expected: std::any::type_name::<T>(),
            actual: cell.type_name(),
        })?;
    Ok(obj.with(|v| v.clone()))
}

/// Implement [`ForeignType`], [`PushValue`] and [`PopValue`] for a native
/// struct so it can cross the boundary by value. Requires `Clone`; by-value
/// crossings copy, they never alias.
#[macro_export]
macro_rules! foreign_type {
    ($ty:ty) => {
        impl $crate::ForeignType for $ty {}

        impl $crate::PushValue for $ty {
            fn push(
                self,
                frame: &mut $crate::Frame<'_>,
                idx: usize,
            ) -> ::std::result::Result<(), $crate::CastError> {
                $crate::marshal::push_owned(frame, idx, self)
            }
        }

        impl<'a> $crate::PushValue for &'a $ty {
            fn push(
                self,
                frame: &mut $crate::Frame<'_>,
                idx: usize,
            ) -> ::std::result::Result<(), $crate::CastError> {
                $crate::marshal::push_owned(frame, idx, ::std::clone::Clone::clone(self))
            }
        }

        impl $crate::PopValue for $ty {
            fn pop(
                frame: &$crate::Frame<'_>,
                idx: usize,
            ) -> ::std::result::Result<Self, $crate::CastError> {
                $crate::marshal::pop_cloned(frame, idx)
            }
        }
    };
}

macro_rules! impl_numeric {
    ($($ty:ty),* $(,)?) => {$(
        impl PushValue for $ty {
            fn push(self, frame: &mut Frame<'_>, idx: usize) -> Result<(), CastError> {
                frame.set(idx, Slot::Num(self as f64));
                Ok(())
            }
        }

        impl PopValue for $ty {
            fn pop(frame: &Frame<'_>, idx: usize) -> Result<Self, CastError> {
                match slot_checked(frame, idx, "number")? {
                    Slot::Num(n) => Ok(*n as $ty),
                    other => Err(CastError::Mismatch {
                        expected: "number",
                        actual: other.slot_type().as_str(),
                    }),
                }
            }
        }
    )*};
}

impl_numeric!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl PushValue for bool {
    fn push(self, frame: &mut Frame<'_>, idx: usize) -> Result<(), CastError> {
        frame.set(idx, Slot::Bool(self));
        Ok(())
    }
}

impl PopValue for bool {
    fn pop(frame: &Frame<'_>, idx: usize) -> Result<Self, CastError> {
        match slot_checked(frame, idx, "bool")? {
            Slot::Bool(b) => Ok(*b),
            other => Err(CastError::Mismatch {
                expected: "bool",
                actual: other.slot_type().as_str(),
            }),
        }
    }
}

impl PushValue for char {
    fn push(self, frame: &mut Frame<'_>, idx: usize) -> Result<(), CastError> {
        frame.set(idx, Slot::Num(self as u32 as f64));
        Ok(())
    }
}

impl PopValue for char {
    fn pop(frame: &Frame<'_>, idx: usize) -> Result<Self, CastError> {
        match slot_checked(frame, idx, "number")? {
            Slot::Num(n) => char::from_u32(*n as u32).ok_or_else(|| {
                CastError::failed(format!("{n} is not a valid character"))
            }),
            other => Err(CastError::Mismatch {
                expected: "number",
                actual: other.slot_type().as_str(),
            }),
        }
    }
}

impl PushValue for String {
    fn push(self, frame: &mut Frame<'_>, idx: usize) -> Result<(), CastError> {
        frame.set(idx, Slot::Str(self));
        Ok(())
    }
}

impl PushValue for &str {
    fn push(self, frame: &mut Frame<'_>, idx: usize) -> Result<(), CastError> {
        frame.set(idx, Slot::Str(self.to_string()));
        Ok(())
    }
}

impl PopValue for String {
    fn pop(frame: &Frame<'_>, idx: usize) -> Result<Self, CastError> {
        match slot_checked(frame, idx, "string")? {
            Slot::Str(s) => Ok(s.clone()),
            other => Err(CastError::Mismatch {
                expected: "string",
                actual: other.slot_type().as_str(),
            }),
        }
    }
}

// Void return: the slot keeps whatever it held.
impl PushValue for () {
    fn push(self, _frame: &mut Frame<'_>, _idx: usize) -> Result<(), CastError> {
        Ok(())
    }
}

impl PopValue for () {
    fn pop(_frame: &Frame<'_>, _idx: usize) -> Result<Self, CastError> {
        Ok(())
    }
}

impl<T: PushValue> PushValue for Option<T> {
    fn push(self, frame: &mut Frame<'_>, idx: usize) -> Result<(), CastError> {
        match self {
            Some(value) => value.push(frame, idx),
            None => {
                frame.set(idx, Slot::Null);
                Ok(())
            }
        }
    }
}

impl<T: PopValue> PopValue for Option<T> {
    fn pop(frame: &Frame<'_>, idx: usize) -> Result<Self, CastError> {
        match frame.try_slot(idx) {
            None | Some(Slot::Null) => Ok(None),
            Some(_) => T::pop(frame, idx).map(Some),
        }
    }
}

impl<T: PushValue + 'static> PushValue for Vec<T> {
    fn push(self, frame: &mut Frame<'_>, idx: usize) -> Result<(), CastError> {
        // Registered vectors cross as first-class foreign objects; everything
        // else expands into a script list.
        if frame.registry().is_class_registered(TypeHash::of::<Vec<T>>()) {
            frame.set(idx, Slot::Foreign(Rc::new(ForeignObject::owned(self))));
            return Ok(());
        }
        let registry = frame.registry();
        let mut items = Vec::with_capacity(self.len());
        for value in self {
            let mut scratch = vec![Slot::Null];
            let mut sub = Frame::new(&mut scratch, registry);
            value.push(&mut sub, 0)?;
            Vec::push(&mut items, scratch.swap_remove(0));
        }
        frame.set(idx, Slot::List(items));
        Ok(())
    }
}

impl<T: PopValue + Clone + 'static> PopValue for Vec<T> {
    fn pop(frame: &Frame<'_>, idx: usize) -> Result<Self, CastError> {
        match slot_checked(frame, idx, "list")? {
            Slot::List(items) => {
                let registry = frame.registry();
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let mut scratch = vec![item.clone()];
                    let sub = Frame::new(&mut scratch, registry);
                    Vec::push(&mut out, T::pop(&sub, 0)?);
                }
                Ok(out)
            }
            Slot::Foreign(cell) => {
                let obj = cell
                    .as_any()
                    .downcast_ref::<ForeignObject<Vec<T>>>()
                    .ok_or(CastError::ForeignMismatch {
                        expected: std::any::type_name::<Vec<T>>(),
                        actual: cell.type_name(),
                    })?;
                Ok(obj.with(|v| v.clone()))
            }
            Slot::Null => Err(CastError::Null {
                target_type: "list",
            }),
            other => Err(CastError::Mismatch {
                expected: "list",
                actual: other.slot_type().as_str(),
            }),
        }
    }
}

impl<B: ForeignType + ?Sized> PushValue for Shared<B> {
    fn push(self, frame: &mut Frame<'_>, idx: usize) -> Result<(), CastError> {
        frame
            .registry()
            .resolve_class(TypeHash::of::<B>(), std::any::type_name::<B>())?;
        frame.set(idx, Slot::Foreign(Rc::new(ForeignObject::from_shared(self))));
        Ok(())
    }
}

impl<B: ForeignType + ?Sized> PopValue for Shared<B> {
    fn pop(frame: &Frame<'_>, idx: usize) -> Result<Self, CastError> {
        let cell = foreign_cell(frame, idx, std::any::type_name::<B>())?;
        if let Some(obj) = cell.as_any().downcast_ref::<ForeignObject<B>>() {
            return obj.shared();
        }
        let Some(cast) = frame
            .registry()
            .resolve_upcast(cell.type_hash(), TypeHash::of::<B>())
        else {
            return Err(CastError::NoUpcast {
                from: cell.type_name(),
                to: std::any::type_name::<B>(),
            });
        };
        let boxed = cast(cell.as_ref())?;
        boxed.downcast::<Shared<B>>().map(|b| *b).map_err(|_| {
            CastError::failed(format!(
                "registered cast did not produce {}",
                std::any::type_name::<B>()
            ))
        })
    }
}

impl<T: ForeignType> PushValue for *mut T {
    fn push(self, frame: &mut Frame<'_>, idx: usize) -> Result<(), CastError> {
        frame
            .registry()
            .resolve_class(TypeHash::of::<T>(), std::any::type_name::<T>())?;
        frame.set(idx, Slot::Foreign(Rc::new(ForeignObject::borrowed(self))));
        Ok(())
    }
}

impl<T: ForeignType> PushValue for *const T {
    fn push(self, frame: &mut Frame<'_>, idx: usize) -> Result<(), CastError> {
        (self as *mut T).push(frame, idx)
    }
}

impl<T: ForeignType> PopValue for *mut T {
    fn pop(frame: &Frame<'_>, idx: usize) -> Result<Self, CastError> {
        let cell = foreign_cell(frame, idx, std::any::type_name::<T>())?;
        let obj = cell
            .as_any()
            .downcast_ref::<ForeignObject<T>>()
            .ok_or(CastError::ForeignMismatch {
                expected: std::any::type_name::<T>(),
                actual: cell.type_name(),
            })?;
        Ok(obj.as_ptr())
    }
}

impl<T: ForeignType> PopValue for *const T {
    fn pop(frame: &Frame<'_>, idx: usize) -> Result<Self, CastError> {
        <*mut T>::pop(frame, idx).map(|p| p as *const T)
    }
}

/// Argument tuples for host-to-script calls. Pushed positionally starting at
/// the first argument slot.
pub trait PushArgs {
    const COUNT: usize;
    fn push_args(self, frame: &mut Frame<'_>, start: usize) -> Result<(), CastError>;
}

macro_rules! impl_push_args {
    ($(($ty:ident, $idx:tt)),*) => {
        impl<$($ty: PushValue),*> PushArgs for ($($ty,)*) {
            const COUNT: usize = {
                const NAMES: &[&str] = &[$(stringify!($ty)),*];
                NAMES.len()
            };

            #[allow(unused_variables)]
            fn push_args(self, frame: &mut Frame<'_>, start: usize) -> Result<(), CastError> {
                $( self.$idx.push(frame, start + $idx)?; )*
                Ok(())
            }
        }
    };
}

impl_push_args!();
impl_push_args!((A0, 0));
impl_push_args!((A0, 0), (A1, 1));
impl_push_args!((A0, 0), (A1, 1), (A2, 2));
impl_push_args!((A0, 0), (A1, 1), (A2, 2), (A3, 3));
impl_push_args!((A0, 0), (A1, 1), (A2, 2), (A3, 3), (A4, 4));
impl_push_args!((A0, 0), (A1, 1), (A2, 2), (A3, 3), (A4, 4), (A5, 5));
