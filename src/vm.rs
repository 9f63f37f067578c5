//! The VM facade.
//!
//! [`Vm`] owns everything one VM instance needs: the type registry, the
//! module table, the slot frame, the pin table for handles, and the fiber
//! abort channel. Dispatch follows the slot calling convention: the receiver
//! rides in slot 0, arguments in slots 1..N, and the return value comes back
//! in slot 0.
//!
//! The VM is single-threaded and not reentrant. Calling back into it from
//! inside a trampoline is a contract violation; it surfaces as a runtime
//! error on the outer call, never as memory unsafety.

use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::any::Any;
use crate::bind::{CallContext, TrampolineFn, panic_message};
use crate::error::{BindError, CallError, CastError, ScriptError};
use crate::handle::Variable;
use crate::marshal::{Frame, PushValue};
use crate::module::{ForeignModule, ModuleBuilder, SigKind, parse_signature};
use crate::registry::TypeRegistry;
use crate::slot::Slot;
use crate::type_hash::TypeHash;

pub(crate) struct VmState {
    pub(crate) registry: TypeRegistry,
    pub(crate) modules: FxHashMap<String, ForeignModule>,
    variables: FxHashMap<(String, String), Slot>,
    slots: Vec<Slot>,
    pins: Vec<Option<Slot>>,
    free_pins: Vec<usize>,
    last_error: Option<String>,
    compiled: FxHashMap<String, TypeHash>,
}

impl VmState {
    fn new() -> Self {
        VmState {
            registry: TypeRegistry::new(),
            modules: FxHashMap::default(),
            variables: FxHashMap::default(),
            slots: Vec::new(),
            pins: Vec::new(),
            free_pins: Vec::new(),
            last_error: None,
            compiled: FxHashMap::default(),
        }
    }

    pub(crate) fn pin(&mut self, slot: Slot) -> usize {
        if let Some(index) = self.free_pins.pop() {
            self.pins[index] = Some(slot);
            index
        } else {
            self.pins.push(Some(slot));
            self.pins.len() - 1
        }
    }

    pub(crate) fn unpin(&mut self, index: usize) {
        if let Some(entry) = self.pins.get_mut(index)
            && entry.take().is_some()
        {
            Vec::push(&mut self.free_pins, index);
        }
    }

    pub(crate) fn pinned(&self, index: usize) -> Option<Slot> {
        self.pins.get(index).and_then(|entry| entry.clone())
    }

    fn lookup_variable(&self, module: &str, name: &str) -> Option<Slot> {
        if let Some(slot) = self
            .variables
            .get(&(module.to_string(), name.to_string()))
        {
            return Some(slot.clone());
        }
        self.modules
            .get(module)
            .and_then(|m| m.find_klass(name))
            .map(|klass| Slot::ClassRef {
                module: module.to_string(),
                name: klass.name().to_string(),
            })
    }
}

/// One VM instance. Cheap to clone handles out of, single-threaded by
/// construction.
pub struct Vm {
    state: Rc<RefCell<VmState>>,
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Vm {
            state: Rc::new(RefCell::new(VmState::new())),
        }
    }

    /// Open a module for registration. The closure form keeps registration
    /// borrows from escaping the call.
    pub fn module<F>(&self, name: &str, f: F) -> Result<(), BindError>
    where
        F: FnOnce(&mut ModuleBuilder<'_>) -> Result<(), BindError>,
    {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        let module = state
            .modules
            .entry(name.to_string())
            .or_insert_with(|| ForeignModule::new(name));
        let mut builder = ModuleBuilder {
            module,
            registry: &mut state.registry,
        };
        f(&mut builder)
    }

    /// Synthesized declaration stubs for a module, as its compiler input.
    pub fn module_source(&self, name: &str) -> Result<String, ScriptError> {
        self.state
            .borrow()
            .modules
            .get(name)
            .map(|m| m.source())
            .ok_or_else(|| ScriptError::not_found(name))
    }

    /// Whether a module's stub source changed since the last
    /// [`mark_module_compiled`](Self::mark_module_compiled).
    pub fn is_module_dirty(&self, name: &str) -> Result<bool, ScriptError> {
        let state = self.state.borrow();
        let module = state
            .modules
            .get(name)
            .ok_or_else(|| ScriptError::not_found(name))?;
        Ok(state.compiled.get(name) != Some(&module.source_hash()))
    }

    pub fn mark_module_compiled(&self, name: &str) -> Result<(), ScriptError> {
        let mut state = self.state.borrow_mut();
        let hash = state
            .modules
            .get(name)
            .ok_or_else(|| ScriptError::not_found(name))?
            .source_hash();
        state.compiled.insert(name.to_string(), hash);
        Ok(())
    }

    /// Plant a module variable, the way a script assignment would.
    pub fn set_variable<T: PushValue>(
        &self,
        module: &str,
        name: &str,
        value: T,
    ) -> Result<(), ScriptError> {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        let mut scratch = vec![Slot::Null];
        let mut frame = Frame::new(&mut scratch, &state.registry);
        value.push(&mut frame, 0)?;
        state.variables.insert(
            (module.to_string(), name.to_string()),
            scratch.swap_remove(0),
        );
        Ok(())
    }

    /// Pin a module variable. Registered classes resolve here too, as the
    /// class object a constructor or static call dispatches on.
    pub fn find(&self, module: &str, name: &str) -> Result<Variable, ScriptError> {
        let mut state = self.state.borrow_mut();
        let slot = state
            .lookup_variable(module, name)
            .ok_or_else(|| ScriptError::not_found(format!("{module}.{name}")))?;
        let index = state.pin(slot);
        Ok(Variable::new(Rc::downgrade(&self.state), index))
    }

    /// Message from the most recent fiber abort, if the last call failed.
    pub fn last_error(&self) -> Option<String> {
        self.state.borrow().last_error.clone()
    }
}

/// Run one call through the slot convention: resolve the member from the
/// receiver, fill the frame, invoke the trampoline behind an unwind boundary,
/// and wrap slot 0 as the result. Any trampoline failure sets the fiber abort
/// message and surfaces as [`ScriptError::Runtime`].
pub(crate) fn invoke(
    state_rc: &Rc<RefCell<VmState>>,
    receiver: Slot,
    signature: &str,
    arg_count: usize,
    push_args: impl FnOnce(&mut Frame<'_>) -> Result<(), CastError>,
) -> Result<Any, ScriptError> {
    let mut state = state_rc.borrow_mut();
    let state = &mut *state;
    state.last_error = None;

    let parsed =
        parse_signature(signature).ok_or_else(|| ScriptError::not_found(signature))?;

    let trampoline: TrampolineFn = match &receiver {
        Slot::ClassRef { module, name } => {
            let klass = state
                .modules
                .get(module)
                .and_then(|m| m.find_klass(name))
                .ok_or_else(|| ScriptError::not_found(format!("{module}.{name}")))?;
            if matches!(parsed, ("new", SigKind::Method(_))) {
                let ctor = klass
                    .ctor
                    .as_ref()
                    .filter(|c| c.signature == signature)
                    .ok_or_else(|| ScriptError::not_found(format!("{name}.{signature}")))?;
                Rc::clone(&ctor.trampoline)
            } else {
                let method = klass
                    .find_method(signature, true)
                    .ok_or_else(|| ScriptError::not_found(format!("{name}.{signature}")))?;
                Rc::clone(&method.trampoline)
            }
        }
        Slot::Foreign(cell) => {
            let location = state
                .registry
                .resolve_class(cell.type_hash(), cell.type_name())?;
            let klass = state
                .modules
                .get(&location.module)
                .and_then(|m| m.find_klass(&location.name))
                .ok_or_else(|| {
                    ScriptError::not_found(format!("{}.{}", location.module, location.name))
                })?;
            let method = klass
                .find_method(signature, false)
                .ok_or_else(|| {
                    ScriptError::not_found(format!("{}.{signature}", location.name))
                })?;
            Rc::clone(&method.trampoline)
        }
        other => {
            return Err(ScriptError::Runtime {
                message: format!("cannot call {signature} on {}", other.slot_type()),
            });
        }
    };

    // Fresh frame per call; a failed call never leaves a half-written frame
    // visible to the next one.
    state.slots.clear();
    state.slots.resize(1 + arg_count, Slot::Null);
    state.slots[0] = receiver;
    {
        let mut frame = Frame::new(&mut state.slots, &state.registry);
        push_args(&mut frame)?;
    }

    let outcome = {
        let frame = Frame::new(&mut state.slots, &state.registry);
        let mut ctx = CallContext::new(frame);
        catch_unwind(AssertUnwindSafe(|| trampoline(&mut ctx)))
    };
    match outcome {
        Ok(Ok(())) => {
            let slot = state.slots.first().cloned().unwrap_or(Slot::Null);
            Ok(Any::new(Rc::downgrade(state_rc), slot))
        }
        Ok(Err(err)) => {
            let message = err.abort_message();
            state.last_error = Some(message.clone());
            Err(ScriptError::Runtime { message })
        }
        Err(payload) => {
            let err = CallError::Panic {
                message: panic_message(payload),
            };
            let message = err.abort_message();
            state.last_error = Some(message.clone());
            Err(ScriptError::Runtime { message })
        }
    }
}
