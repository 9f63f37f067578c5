//! Trampoline generation for native callables.
//!
//! A trampoline is the type-erased closure the VM invokes for one bound
//! member: it pops arguments from slots 1..N, resolves the receiver from
//! slot 0, invokes the native callable, and pushes the result back into
//! slot 0. The generator traits ([`ForeignCtor`], [`ForeignMethod`],
//! [`ForeignStaticFn`]) are implemented for plain functions and closures by
//! arity, with marker type parameters keeping the blanket impls apart.
//!
//! Natives signal failure by panicking or, for `Result`-returning callables,
//! by returning an error; either way the message ends up as the fiber abort
//! text. The unwind boundary itself sits in the dispatch layer.

use std::fmt::Display;
use std::rc::Rc;

use crate::error::{CallError, CastError};
use crate::foreign::{ForeignCell, ForeignObject, ForeignType, Shared};
use crate::marshal::{Frame, PopValue, PushValue};
use crate::slot::Slot;
use crate::type_hash::TypeHash;

/// Type-erased member body. Shared between the method table and pinned
/// callbacks, hence reference counted.
pub type TrampolineFn = Rc<dyn Fn(&mut CallContext<'_>) -> Result<(), CallError>>;

/// Per-call view handed to trampolines: slot 0 is the receiver on entry and
/// the return value on exit, arguments sit at slots 1..N.
pub struct CallContext<'a> {
    frame: Frame<'a>,
}

impl<'a> CallContext<'a> {
    pub fn new(frame: Frame<'a>) -> Self {
        CallContext { frame }
    }

    pub fn arg_count(&self) -> usize {
        self.frame.len().saturating_sub(1)
    }

    /// Pop argument `index` (zero-based, receiver excluded).
    pub fn arg<T: PopValue>(&self, index: usize) -> Result<T, CallError> {
        if index + 1 >= self.frame.len() {
            return Err(CallError::MissingArgument {
                index,
                count: self.arg_count(),
            });
        }
        Ok(T::pop(&self.frame, index + 1)?)
    }

    /// Write the return value into slot 0.
    pub fn set_return<R: PushValue>(&mut self, value: R) -> Result<(), CallError> {
        value.push(&mut self.frame, 0).map_err(CallError::from)
    }

    pub(crate) fn set_this_object<T: ForeignType>(&mut self, obj: ForeignObject<T>) {
        self.frame.set(0, Slot::Foreign(Rc::new(obj)));
    }

    fn this_cell(&self) -> Result<&ForeignCell, CallError> {
        match self.frame.try_slot(0) {
            Some(Slot::Foreign(cell)) => Ok(cell),
            Some(other) => Err(CallError::invalid_receiver(format!(
                "receiver slot holds {}",
                other.slot_type()
            ))),
            None => Err(CallError::invalid_receiver("empty call frame")),
        }
    }

    /// Shared access to the receiver. The receiver cell may hold the exact
    /// class or a derived class with a registered upcast to `T`.
    pub fn with_this<T: ForeignType + ?Sized, R>(
        &self,
        f: impl FnOnce(&T) -> R,
    ) -> Result<R, CallError> {
        let cell = self.this_cell()?;
        if let Some(obj) = cell.as_any().downcast_ref::<ForeignObject<T>>() {
            return Ok(obj.with(f));
        }
        let shared = self.upcast_this::<T>(cell)?;
        let guard = shared.borrow();
        Ok(f(&guard))
    }

    /// Exclusive access to the receiver.
    pub fn with_this_mut<T: ForeignType + ?Sized, R>(
        &self,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, CallError> {
        let cell = self.this_cell()?;
        if let Some(obj) = cell.as_any().downcast_ref::<ForeignObject<T>>() {
            return Ok(obj.with_mut(f));
        }
        let shared = self.upcast_this::<T>(cell)?;
        let mut guard = shared.borrow_mut();
        Ok(f(&mut guard))
    }

    fn upcast_this<T: ForeignType + ?Sized>(
        &self,
        cell: &ForeignCell,
    ) -> Result<Shared<T>, CallError> {
        let cast = self
            .frame
            .registry()
            .resolve_upcast(cell.type_hash(), TypeHash::of::<T>())
            .ok_or_else(|| {
                CallError::invalid_receiver(format!(
                    "receiver is {}, method expects {}",
                    cell.type_name(),
                    std::any::type_name::<T>()
                ))
            })?;
        let boxed = cast(cell.as_ref())?;
        boxed.downcast::<Shared<T>>().map(|b| *b).map_err(|_| {
            CallError::Cast(CastError::failed(format!(
                "registered cast did not produce {}",
                std::any::type_name::<T>()
            )))
        })
    }
}

/// Text carried by an unwinding native, for the fiber abort channel.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "native code panicked".to_string()
    }
}

// Markers distinguishing the blanket impl families.
pub struct RefSelf;
pub struct MutSelf;
pub struct Plain;
pub struct Fallible;

/// Constructor bodies: `Fn(args...) -> T` or `Fn(args...) -> Result<T, E>`.
/// The generated trampoline is the class's allocate hook.
pub trait ForeignCtor<T, M> {
    const ARITY: usize;
    fn into_allocator(self) -> TrampolineFn;
}

/// Instance method bodies taking `&T` or `&mut T` as receiver.
pub trait ForeignMethod<T: ?Sized, M> {
    const ARITY: usize;
    fn into_trampoline(self) -> TrampolineFn;
}

/// Static method bodies: no receiver, arguments only.
pub trait ForeignStaticFn<M> {
    const ARITY: usize;
    fn into_trampoline(self) -> TrampolineFn;
}

macro_rules! impl_callables {
    ($(($ty:ident, $idx:tt)),*) => {
        impl<F, T, $($ty,)*> ForeignCtor<T, (Plain, ($($ty,)*))> for F
        where
            F: Fn($($ty),*) -> T + 'static,
            T: ForeignType,
            $($ty: PopValue + 'static,)*
        {
            const ARITY: usize = {
                const NAMES: &[&str] = &[$(stringify!($ty)),*];
                NAMES.len()
            };

            #[allow(unused_variables, clippy::unused_unit)]
            fn into_allocator(self) -> TrampolineFn {
                Rc::new(move |ctx| {
                    let args = ($(ctx.arg::<$ty>($idx)?,)*);
                    let value = (self)($(args.$idx),*);
                    ctx.set_this_object(ForeignObject::owned(value));
                    Ok(())
                })
            }
        }

        impl<F, T, E, $($ty,)*> ForeignCtor<T, (Fallible, E, ($($ty,)*))> for F
        where
            F: Fn($($ty),*) -> Result<T, E> + 'static,
            T: ForeignType,
            E: Display + 'static,
            $($ty: PopValue + 'static,)*
        {
            const ARITY: usize = {
                const NAMES: &[&str] = &[$(stringify!($ty)),*];
                NAMES.len()
            };

            #[allow(unused_variables)]
            fn into_allocator(self) -> TrampolineFn {
                Rc::new(move |ctx| {
                    let args = ($(ctx.arg::<$ty>($idx)?,)*);
                    let value = (self)($(args.$idx),*).map_err(|e| CallError::Native {
                        message: e.to_string(),
                    })?;
                    ctx.set_this_object(ForeignObject::owned(value));
                    Ok(())
                })
            }
        }

        impl<F, T, R, $($ty,)*> ForeignMethod<T, (MutSelf, Plain, R, ($($ty,)*))> for F
        where
            F: Fn(&mut T, $($ty),*) -> R + 'static,
            T: ForeignType + ?Sized,
            R: PushValue + 'static,
            $($ty: PopValue + 'static,)*
        {
            const ARITY: usize = {
                const NAMES: &[&str] = &[$(stringify!($ty)),*];
                NAMES.len()
            };

            #[allow(unused_variables)]
            fn into_trampoline(self) -> TrampolineFn {
                Rc::new(move |ctx| {
                    let args = ($(ctx.arg::<$ty>($idx)?,)*);
                    let f = &self;
                    let ret = ctx.with_this_mut::<T, _>(move |this| f(this, $(args.$idx),*))?;
                    ctx.set_return(ret)
                })
            }
        }

        impl<F, T, R, E, $($ty,)*> ForeignMethod<T, (MutSelf, Fallible, R, E, ($($ty,)*))> for F
        where
            F: Fn(&mut T, $($ty),*) -> Result<R, E> + 'static,
            T: ForeignType + ?Sized,
            R: PushValue + 'static,
            E: Display + 'static,
            $($ty: PopValue + 'static,)*
        {
            const ARITY: usize = {
                const NAMES: &[&str] = &[$(stringify!($ty)),*];
                NAMES.len()
            };

            #[allow(unused_variables)]
            fn into_trampoline(self) -> TrampolineFn {
                Rc::new(move |ctx| {
                    let args = ($(ctx.arg::<$ty>($idx)?,)*);
                    let f = &self;
                    let ret = ctx
                        .with_this_mut::<T, _>(move |this| f(this, $(args.$idx),*))?
                        .map_err(|e| CallError::Native {
                            message: e.to_string(),
                        })?;
                    ctx.set_return(ret)
                })
            }
        }

        impl<F, T, R, $($ty,)*> ForeignMethod<T, (RefSelf, Plain, R, ($($ty,)*))> for F
        where
            F: Fn(&T, $($ty),*) -> R + 'static,
            T: ForeignType + ?Sized,
            R: PushValue + 'static,
            $($ty: PopValue + 'static,)*
        {
            const ARITY: usize = {
                const NAMES: &[&str] = &[$(stringify!($ty)),*];
                NAMES.len()
            };

            #[allow(unused_variables)]
            fn into_trampoline(self) -> TrampolineFn {
                Rc::new(move |ctx| {
                    let args = ($(ctx.arg::<$ty>($idx)?,)*);
                    let f = &self;
                    let ret = ctx.with_this::<T, _>(move |this| f(this, $(args.$idx),*))?;
                    ctx.set_return(ret)
                })
            }
        }

        impl<F, T, R, E, $($ty,)*> ForeignMethod<T, (RefSelf, Fallible, R, E, ($($ty,)*))> for F
        where
            F: Fn(&T, $($ty),*) -> Result<R, E> + 'static,
            T: ForeignType + ?Sized,
            R: PushValue + 'static,
            E: Display + 'static,
            $($ty: PopValue + 'static,)*
        {
            const ARITY: usize = {
                const NAMES: &[&str] = &[$(stringify!($ty)),*];
                NAMES.len()
            };

            #[allow(unused_variables)]
            fn into_trampoline(self) -> TrampolineFn {
                Rc::new(move |ctx| {
                    let args = ($(ctx.arg::<$ty>($idx)?,)*);
                    let f = &self;
                    let ret = ctx
                        .with_this::<T, _>(move |this| f(this, $(args.$idx),*))?
                        .map_err(|e| CallError::Native {
                            message: e.to_string(),
                        })?;
                    ctx.set_return(ret)
                })
            }
        }

        impl<F, R, $($ty,)*> ForeignStaticFn<(Plain, R, ($($ty,)*))> for F
        where
            F: Fn($($ty),*) -> R + 'static,
            R: PushValue + 'static,
            $($ty: PopValue + 'static,)*
        {
            const ARITY: usize = {
                const NAMES: &[&str] = &[$(stringify!($ty)),*];
                NAMES.len()
            };

            #[allow(unused_variables)]
            fn into_trampoline(self) -> TrampolineFn {
                Rc::new(move |ctx| {
                    let args = ($(ctx.arg::<$ty>($idx)?,)*);
                    let ret = (self)($(args.$idx),*);
                    ctx.set_return(ret)
                })
            }
        }

        impl<F, R, E, $($ty,)*> ForeignStaticFn<(Fallible, R, E, ($($ty,)*))> for F
        where
            F: Fn($($ty),*) -> Result<R, E> + 'static,
            R: PushValue + 'static,
            E: Display + 'static,
            $($ty: PopValue + 'static,)*
        {
            const ARITY: usize = {
                const NAMES: &[&str] = &[$(stringify!($ty)),*];
                NAMES.len()
            };

            #[allow(unused_variables)]
            fn into_trampoline(self) -> TrampolineFn {
                Rc::new(move |ctx| {
                    let args = ($(ctx.arg::<$ty>($idx)?,)*);
                    let ret = (self)($(args.$idx),*).map_err(|e| CallError::Native {
                        message: e.to_string(),
                    })?;
                    ctx.set_return(ret)
                })
            }
        }
    };
}

impl_callables!();
impl_callables!((A0, 0));
impl_callables!((A0, 0), (A1, 1));
impl_callables!((A0, 0), (A1, 1), (A2, 2));
impl_callables!((A0, 0), (A1, 1), (A2, 2), (A3, 3));
impl_callables!((A0, 0), (A1, 1), (A2, 2), (A3, 3), (A4, 4));
impl_callables!((A0, 0), (A1, 1), (A2, 2), (A3, 3), (A4, 4), (A5, 5));
