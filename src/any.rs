//! Dynamic result wrapper.
//!
//! [`Any`] wraps whatever came back in slot 0 after a call: null, a
//! primitive, a list, or a foreign cell. Extraction is typed and explicit;
//! a mismatch is a cast error, never an inferred coercion. Foreign
//! extraction keeps a weak reference to the VM so the upcast table stays
//! reachable.

use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;

use crate::error::{CastError, ScriptError};
use crate::marshal::{Frame, PopValue, PushValue};
use crate::slot::{Slot, SlotType};
use crate::vm::VmState;

/// A dynamically typed value tied to the VM it came from.
pub struct Any {
    state: Weak<RefCell<VmState>>,
    slot: Slot,
}

impl Any {
    pub(crate) fn new(state: Weak<RefCell<VmState>>, slot: Slot) -> Self {
        Any { state, slot }
    }

    pub(crate) fn state(&self) -> &Weak<RefCell<VmState>> {
        &self.state
    }

    pub(crate) fn slot(&self) -> &Slot {
        &self.slot
    }

    /// Dynamic tag of the wrapped value.
    pub fn slot_type(&self) -> SlotType {
        self.slot.slot_type()
    }

    pub fn is_null(&self) -> bool {
        self.slot.is_null()
    }

    /// Whether the value extracts as `T`. Null is never an instance of a
    /// class type.
    pub fn is<T: PopValue>(&self) -> bool {
        self.get::<T>().is_ok()
    }

    /// Extract the value as `T` through the full pop matrix, upcasts
    /// included.
    pub fn get<T: PopValue>(&self) -> Result<T, ScriptError> {
        let state = self.state.upgrade().ok_or(ScriptError::ReleasedHandle)?;
        let state = state.borrow();
        let mut scratch = vec![self.slot.clone()];
        let frame = Frame::new(&mut scratch, &state.registry);
        Ok(T::pop(&frame, 0)?)
    }
}

impl fmt::Debug for Any {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Any").field(&self.slot).finish()
    }
}

/// A wrapped value can go straight back out as an argument.
impl PushValue for &Any {
    fn push(self, frame: &mut Frame<'_>, idx: usize) -> Result<(), CastError> {
        frame.set(idx, self.slot.clone());
        Ok(())
    }
}
