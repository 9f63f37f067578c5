//! The slot value model.
//!
//! Slots are the VM's typed registers: slot 0 carries the receiver on the way
//! in and the return value on the way out, arguments sit in slots 1..N. A
//! [`Slot`] is one register's value. All numerics ride as `f64`; integers past
//! 2^53 silently lose precision, which is a property of the wire format, not a
//! bug in any one conversion.

use std::fmt;

use crate::foreign::ForeignCell;

/// One VM register value.
#[derive(Clone)]
pub enum Slot {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Slot>),
    /// A native object cell. Cloning shares the cell.
    Foreign(ForeignCell),
    /// The class object a module variable resolves to; the receiver for
    /// constructor and static-method dispatch.
    ClassRef { module: String, name: String },
}

impl Slot {
    /// Dynamic type tag, for dispatch and error messages.
    pub fn slot_type(&self) -> SlotType {
        match self {
            Slot::Null => SlotType::Null,
            Slot::Bool(_) => SlotType::Bool,
            Slot::Num(_) => SlotType::Num,
            Slot::Str(_) => SlotType::Str,
            Slot::List(_) => SlotType::List,
            Slot::Foreign(_) => SlotType::Foreign,
            Slot::ClassRef { .. } => SlotType::ClassRef,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Slot::Null)
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Null => write!(f, "Null"),
            Slot::Bool(b) => write!(f, "Bool({b})"),
            Slot::Num(n) => write!(f, "Num({n})"),
            Slot::Str(s) => write!(f, "Str({s:?})"),
            Slot::List(items) => f.debug_tuple("List").field(items).finish(),
            Slot::Foreign(cell) => write!(f, "Foreign({})", cell.type_name()),
            Slot::ClassRef { module, name } => write!(f, "ClassRef({module}.{name})"),
        }
    }
}

/// Slot type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotType {
    Null,
    Bool,
    Num,
    Str,
    List,
    Foreign,
    ClassRef,
}

impl SlotType {
    /// Tag name used in cast errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotType::Null => "null",
            SlotType::Bool => "bool",
            SlotType::Num => "number",
            SlotType::Str => "string",
            SlotType::List => "list",
            SlotType::Foreign => "foreign",
            SlotType::ClassRef => "class",
        }
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
