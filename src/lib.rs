//! Type-safe bindings between native Rust types and a slot-based embedded
//! scripting VM.
//!
//! `vmbind` generates type-erased trampolines at registration time so script
//! code can construct and call into native types, and marshals values across
//! the slot boundary in both directions. The VM's calling convention is the
//! usual one for embedded scripting engines: slot 0 carries the receiver in
//! and the return value out, arguments sit in slots 1..N.
//!
//! # Overview
//!
//! - Register native types as script classes through [`Vm::module`] and the
//!   fluent [`KlassBuilder`]: constructors, methods, static methods,
//!   properties, operators, and upcasts to trait-object base classes.
//! - Values cross the boundary through the [`PushValue`]/[`PopValue`]
//!   parameter-shape matrix: by value (copied), by [`Shared`] handle
//!   (ownership shared), or by raw pointer (borrowed, never freed by the
//!   VM). All numerics ride as `f64`.
//! - Host code drives the VM through pinned handles: [`Variable`],
//!   [`Method`] and [`Callback`], with results coming back as the dynamic
//!   [`Any`] wrapper.
//! - Native failures (panics or `Result` errors) become fiber aborts whose
//!   message is observable through [`ScriptError::Runtime`] and
//!   [`Vm::last_error`]; no unwind ever crosses the VM boundary.
//!
//! # Example
//!
//! ```
//! use vmbind::{Vm, foreign_type};
//!
//! #[derive(Clone)]
//! struct Vec3 {
//!     x: f64,
//!     y: f64,
//!     z: f64,
//! }
//!
//! foreign_type!(Vec3);
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let vm = Vm::new();
//! vm.module("demo", |m| {
//!     let mut k = m.klass::<Vec3>("Vec3")?;
//!     k.ctor(|x: f64, y: f64, z: f64| Vec3 { x, y, z })
//!         .func("set", |v: &mut Vec3, x: f64, y: f64, z: f64| {
//!             v.x = x;
//!             v.y = y;
//!             v.z = z;
//!         })
//!         .prop("x", |v: &Vec3| v.x, |v: &mut Vec3, x: f64| v.x = x);
//!     Ok(())
//! })?;
//!
//! let class = vm.find("demo", "Vec3")?;
//! let v = class.func("new(_,_,_)")?.call((1.0, 2.0, 3.0))?;
//! let x = vmbind::Callback::from_any(&v, "x")?.call(())?;
//! assert_eq!(x.get::<f64>()?, 1.0);
//! # Ok(())
//! # }
//! ```

pub mod any;
pub mod bind;
pub mod collections;
pub mod error;
pub mod foreign;
pub mod handle;
pub mod marshal;
pub mod module;
pub mod operator;
pub mod registry;
pub mod slot;
pub mod type_hash;
pub mod vm;

pub use any::Any;
pub use bind::{CallContext, ForeignCtor, ForeignMethod, ForeignStaticFn, TrampolineFn};
pub use collections::{DequeBindings, IndexOutOfRange, VecBindings};
pub use error::{BindError, CallError, CastError, ScriptError};
pub use foreign::{Foreign, ForeignCell, ForeignObject, ForeignType, Shared};
pub use handle::{Callback, Handle, Method, Variable};
pub use marshal::{Frame, PopValue, PushArgs, PushValue};
pub use module::{ForeignKlass, ForeignModule, KlassBuilder, ModuleBuilder};
pub use operator::Operator;
pub use registry::{ClassLocation, TypeRegistry, UpcastFn};
pub use slot::{Slot, SlotType};
pub use type_hash::TypeHash;
pub use vm::Vm;
