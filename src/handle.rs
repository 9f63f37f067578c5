//! Pinned handles and invocation handles.
//!
//! A [`Handle`] pins one slot value in the VM's pin table so the host can
//! keep it alive across calls; the pin is released when the handle drops,
//! on every exit path. [`Variable`], [`Method`] and [`Callback`] layer the
//! host-to-script calling surface on top: a pinned receiver plus a signature.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::any::Any;
use crate::error::ScriptError;
use crate::marshal::PushArgs;
use crate::module::parse_signature;
use crate::slot::Slot;
use crate::vm::{VmState, invoke};

/// RAII pin of one slot value.
pub struct Handle {
    state: Weak<RefCell<VmState>>,
    index: usize,
}

impl Handle {
    pub(crate) fn new(state: Weak<RefCell<VmState>>, index: usize) -> Self {
        Handle { state, index }
    }

    /// The pinned value. Errors once the VM or the pin is gone.
    pub(crate) fn slot(&self) -> Result<Slot, ScriptError> {
        let state = self.state.upgrade().ok_or(ScriptError::ReleasedHandle)?;
        let slot = state
            .borrow()
            .pinned(self.index)
            .ok_or(ScriptError::ReleasedHandle)?;
        Ok(slot)
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade()
            && let Ok(mut state) = state.try_borrow_mut()
        {
            state.unpin(self.index);
        }
    }
}

/// A pinned module variable.
pub struct Variable {
    handle: Rc<Handle>,
}

impl Variable {
    pub(crate) fn new(state: Weak<RefCell<VmState>>, index: usize) -> Self {
        Variable {
            handle: Rc::new(Handle::new(state, index)),
        }
    }

    /// Resolve a callable signature against this variable as receiver. The
    /// signature is validated textually here; member lookup happens per call.
    pub fn func(&self, signature: &str) -> Result<Method, ScriptError> {
        parse_signature(signature).ok_or_else(|| ScriptError::not_found(signature))?;
        Ok(Method {
            handle: Rc::clone(&self.handle),
            signature: signature.to_string(),
        })
    }

    /// The variable's current value as a dynamic wrapper.
    pub fn value(&self) -> Result<Any, ScriptError> {
        let slot = self.handle.slot()?;
        Ok(Any::new(self.handle.state.clone(), slot))
    }
}

/// A callable pair: pinned receiver plus signature.
pub struct Method {
    handle: Rc<Handle>,
    signature: String,
}

impl Method {
    /// Call through the slot convention. Arguments are a tuple pushed into
    /// slots 1..N; the result is whatever came back in slot 0.
    pub fn call<A: PushArgs>(&self, args: A) -> Result<Any, ScriptError> {
        let receiver = self.handle.slot()?;
        let state = self
            .handle
            .state
            .upgrade()
            .ok_or(ScriptError::ReleasedHandle)?;
        invoke(&state, receiver, &self.signature, A::COUNT, |frame| {
            args.push_args(frame, 1)
        })
    }
}

/// A movable, resettable [`Method`], for capturing script-side callables.
/// A default or reset callback reports an error when called.
#[derive(Default)]
pub struct Callback {
    inner: Option<Method>,
}

impl Callback {
    pub fn new() -> Self {
        Callback::default()
    }

    /// Capture a callable on a pinned module variable.
    pub fn from_variable(variable: &Variable, signature: &str) -> Result<Self, ScriptError> {
        Ok(Callback {
            inner: Some(variable.func(signature)?),
        })
    }

    /// Capture a callable on a value that came back from a call, pinning it
    /// for as long as the callback lives.
    pub fn from_any(value: &Any, signature: &str) -> Result<Self, ScriptError> {
        parse_signature(signature).ok_or_else(|| ScriptError::not_found(signature))?;
        let state_weak = value.state().clone();
        let state = state_weak.upgrade().ok_or(ScriptError::ReleasedHandle)?;
        let index = state.borrow_mut().pin(value.slot().clone());
        Ok(Callback {
            inner: Some(Method {
                handle: Rc::new(Handle::new(state_weak, index)),
                signature: signature.to_string(),
            }),
        })
    }

    pub fn is_set(&self) -> bool {
        self.inner.is_some()
    }

    /// Drop the pinned receiver; the callback reports errors from here on.
    pub fn reset(&mut self) {
        self.inner = None;
    }

    pub fn call<A: PushArgs>(&self, args: A) -> Result<Any, ScriptError> {
        self.inner
            .as_ref()
            .ok_or(ScriptError::ReleasedHandle)?
            .call(args)
    }
}
