//! Error types for the VM crate.
//!
//! Covers the runtime error taxonomy (type mismatches, name/index/key lookups,
//! arity, division by zero, uncallable values) plus the load-time and
//! infrastructural errors that never become a thrown `Value`.

use thiserror::Error;

/// VM errors, spanning both runtime (catchable) and load-time/host-fatal cases.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VmError {
    /// Operator or call rejected because of operand types.
    #[error("type mismatch: {operation} does not accept ({left}, {right})")]
    TypeMismatch {
        operation: String,
        left: String,
        right: String,
    },

    /// Unary operator rejected because of operand type.
    #[error("type mismatch: {operation} does not accept {operand}")]
    UnaryTypeMismatch { operation: String, operand: String },

    /// Opcode/operand combination has no dispatch table entry.
    #[error("unsupported operation: {operation}")]
    UnsupportedOp { operation: String },

    /// Missing global, missing export, or unresolved property access.
    #[error("name error: {name}")]
    NameError { name: String },

    /// Array/string index out of bounds or negative.
    #[error("index error: index {index} out of bounds for length {length}")]
    IndexError { index: i64, length: usize },

    /// Hash lookup miss where presence was required.
    #[error("key error: key {key:?} not found")]
    KeyError { key: String },

    /// Closure called with fewer arguments than its declared parameter count.
    #[error("arity error: {name} requires {required} argument(s), got {supplied}")]
    ArityError {
        name: String,
        required: usize,
        supplied: usize,
    },

    /// Integer division or modulo by zero.
    #[error("division by zero in {operation}")]
    DivisionByZero { operation: String },

    /// CALL issued against a non-callable value.
    #[error("not callable: value of type {value_type}")]
    NotCallable { value_type: String },

    /// Malformed bytecode text, unresolved label, or bad constant declaration.
    #[error("load error: {reason}")]
    LoadError { reason: String },

    /// A thrown value reached the base frame with no active handler.
    #[error("uncaught exception: {message}")]
    Uncaught { message: String },

    /// I/O failure reading a module or bytecode file from disk.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Invariant violated inside the engine itself (heap corruption, handle
    /// pointing at the wrong object kind, register stack underflow). Should
    /// never be observed from well-formed bytecode; signals a VM bug.
    #[error("internal VM error: {message}")]
    Internal { message: String },
}

/// Convenience alias used throughout the crate.
pub type VmResult<T> = Result<T, VmError>;

impl VmError {
    pub fn type_mismatch(operation: impl Into<String>, left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::TypeMismatch {
            operation: operation.into(),
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn unary_type_mismatch(operation: impl Into<String>, operand: impl Into<String>) -> Self {
        Self::UnaryTypeMismatch {
            operation: operation.into(),
            operand: operand.into(),
        }
    }

    pub fn unsupported_op(operation: impl Into<String>) -> Self {
        Self::UnsupportedOp {
            operation: operation.into(),
        }
    }

    pub fn name_error(name: impl Into<String>) -> Self {
        Self::NameError { name: name.into() }
    }

    pub fn index_error(index: i64, length: usize) -> Self {
        Self::IndexError { index, length }
    }

    pub fn key_error(key: impl Into<String>) -> Self {
        Self::KeyError { key: key.into() }
    }

    pub fn arity_error(name: impl Into<String>, required: usize, supplied: usize) -> Self {
        Self::ArityError {
            name: name.into(),
            required,
            supplied,
        }
    }

    pub fn division_by_zero(operation: impl Into<String>) -> Self {
        Self::DivisionByZero {
            operation: operation.into(),
        }
    }

    pub fn not_callable(value_type: impl Into<String>) -> Self {
        Self::NotCallable {
            value_type: value_type.into(),
        }
    }

    pub fn load_error(reason: impl Into<String>) -> Self {
        Self::LoadError {
            reason: reason.into(),
        }
    }

    pub fn uncaught(message: impl Into<String>) -> Self {
        Self::Uncaught {
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error converts into a thrown `Value` catchable by
    /// `SETUP_TRY`, per the propagation rule in the error-handling design.
    /// `LoadError` and `Internal` always surface to the host instead, and
    /// `Uncaught` is itself the terminal result of a failed catch search —
    /// re-entering `unwind_to_handler` with it would just double-wrap the
    /// message against an already-empty handler stack.
    pub fn is_user_catchable(&self) -> bool {
        !matches!(self, Self::LoadError { .. } | Self::Internal { .. } | Self::Io { .. } | Self::Uncaught { .. })
    }
}

impl From<std::io::Error> for VmError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catchable_classification() {
        assert!(VmError::division_by_zero("/").is_user_catchable());
        assert!(VmError::not_callable("Null").is_user_catchable());
        assert!(!VmError::load_error("bad").is_user_catchable());
        assert!(!VmError::internal("oops").is_user_catchable());
        assert!(!VmError::uncaught("boom").is_user_catchable());
    }

    #[test]
    fn display_messages_are_stable() {
        let e = VmError::index_error(-1, 3);
        assert_eq!(e.to_string(), "index error: index -1 out of bounds for length 3");
    }
}
