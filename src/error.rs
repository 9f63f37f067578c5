//! Error types for the binding layer.
//!
//! Four taxonomies, by where the failure surfaces: [`CastError`] for value
//! marshalling, [`CallError`] for trampoline execution, [`BindError`] for
//! registration-time misuse, and [`ScriptError`] for the host-facing VM
//! driving surface.

use thiserror::Error;

/// Errors that can occur when converting between slot values and native types.
#[derive(Debug, Error)]
pub enum CastError {
    /// Slot held a different kind of value than the requested type
    #[error("bad cast: expected {expected}, got {actual}")]
    Mismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Foreign slot held an object of a different class
    #[error("bad cast: foreign object is {actual}, requested {expected}")]
    ForeignMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Native type was never registered as a script class
    #[error("class not registered for native type {type_name}")]
    ClassNotRegistered { type_name: &'static str },

    /// No upcast entry exists between the two classes
    #[error("no registered cast from {from} to {to}")]
    NoUpcast {
        from: &'static str,
        to: &'static str,
    },

    /// Null where an instance was expected
    #[error("null value cannot be converted to {target_type}")]
    Null { target_type: &'static str },

    /// Shared handle requested from a cell that only borrows its value
    #[error("object of type {type_name} is borrowed, not owned; cannot share it")]
    BorrowedCell { type_name: &'static str },

    /// Generic conversion failure
    #[error("conversion failed: {message}")]
    Failed { message: String },
}

impl CastError {
    /// Create a generic conversion failure with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        CastError::Failed {
            message: message.into(),
        }
    }
}

/// Errors raised inside a trampoline while servicing a script call.
#[derive(Debug, Error)]
pub enum CallError {
    /// Error converting arguments, the receiver, or the return value
    #[error("conversion error: {0}")]
    Cast(#[from] CastError),

    /// Call frame held fewer argument slots than the callable needs
    #[error("missing argument {index} ({count} slots in frame)")]
    MissingArgument { index: usize, count: usize },

    /// Receiver slot did not hold a foreign object of the bound class
    #[error("invalid receiver: {message}")]
    InvalidReceiver { message: String },

    /// Native code panicked; the payload text becomes the fiber abort message
    #[error("{message}")]
    Panic { message: String },

    /// Fallible native returned an error
    #[error("{message}")]
    Native { message: String },
}

impl CallError {
    /// Create an invalid-receiver error with a message.
    pub fn invalid_receiver(message: impl Into<String>) -> Self {
        CallError::InvalidReceiver {
            message: message.into(),
        }
    }

    /// The text a fiber abort should carry for this error.
    pub fn abort_message(&self) -> String {
        self.to_string()
    }
}

/// Errors raised at registration time, before any script runs.
#[derive(Debug, Error)]
pub enum BindError {
    /// The same native type was registered as a class twice
    #[error("class {class} already registered for native type {type_name}")]
    DuplicateClass {
        class: String,
        type_name: &'static str,
    },

    /// Callable arity does not match the operator's fixed arity
    #[error("operator {operator} takes {expected} arguments, callable takes {actual}")]
    OperatorArity {
        operator: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Errors surfaced to the host while driving the VM.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Variable, class, or method lookup failed
    #[error("not found: {name}")]
    NotFound { name: String },

    /// The fiber aborted; carries the abort message verbatim
    #[error("runtime error: {message}")]
    Runtime { message: String },

    /// Extracting a typed value from a dynamic result failed
    #[error("cast error: {0}")]
    Cast(#[from] CastError),

    /// A handle was used after release or reset
    #[error("handle has been released")]
    ReleasedHandle,
}

impl ScriptError {
    /// Create a not-found error for a named entity.
    pub fn not_found(name: impl Into<String>) -> Self {
        ScriptError::NotFound { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_error_mismatch() {
        let err = CastError::Mismatch {
            expected: "number",
            actual: "string",
        };
        assert!(err.to_string().contains("bad cast"));
        assert!(err.to_string().contains("number"));
        assert!(err.to_string().contains("string"));
    }

    #[test]
    fn cast_error_class_not_registered() {
        let err = CastError::ClassNotRegistered { type_name: "Vec3" };
        assert!(err.to_string().contains("not registered"));
        assert!(err.to_string().contains("Vec3"));
    }

    #[test]
    fn cast_error_no_upcast() {
        let err = CastError::NoUpcast {
            from: "Dog",
            to: "Cat",
        };
        assert!(err.to_string().contains("no registered cast"));
    }

    #[test]
    fn cast_error_null() {
        let err = CastError::Null {
            target_type: "Widget",
        };
        assert!(err.to_string().contains("null"));
        assert!(err.to_string().contains("Widget"));
    }

    #[test]
    fn cast_error_borrowed_cell() {
        let err = CastError::BorrowedCell { type_name: "Vec3" };
        assert!(err.to_string().contains("borrowed"));
    }

    #[test]
    fn call_error_from_cast() {
        let cast = CastError::Null { target_type: "T" };
        let err: CallError = cast.into();
        assert!(matches!(err, CallError::Cast(_)));
    }

    #[test]
    fn call_error_panic_message_is_verbatim() {
        let err = CallError::Panic {
            message: "boom".to_string(),
        };
        assert_eq!(err.abort_message(), "boom");
    }

    #[test]
    fn call_error_missing_argument() {
        let err = CallError::MissingArgument { index: 2, count: 2 };
        assert!(err.to_string().contains("missing argument"));
    }

    #[test]
    fn bind_error_duplicate_class() {
        let err = BindError::DuplicateClass {
            class: "Vec3".to_string(),
            type_name: "demo::Vec3",
        };
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn bind_error_operator_arity() {
        let err = BindError::OperatorArity {
            operator: "+(_)",
            expected: 1,
            actual: 2,
        };
        assert!(err.to_string().contains("+(_)"));
    }

    #[test]
    fn script_error_not_found() {
        let err = ScriptError::not_found("main.Vec3");
        assert!(err.to_string().contains("main.Vec3"));
    }

    #[test]
    fn script_error_runtime_carries_message() {
        let err = ScriptError::Runtime {
            message: "boom".to_string(),
        };
        assert!(err.to_string().contains("boom"));
    }
}
