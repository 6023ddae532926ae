//! The bytecode virtual machine.
//!
//! Every block runs with its own local frame and its own operand stack. A
//! `Call` moves the arguments from the caller's stack into the callee's, and
//! the callee must hand back exactly its return value. Any violation of the
//! instruction set's typing is a [`VmError`]; the VM never coerces.
//!
//! ## Structure
//!
//! - `interpreter` - the dispatch loop and the public [`Vm`] entry points

mod interpreter;

pub use interpreter::Vm;

use thiserror::Error;

use crate::compiler::OpCode;

/// A fatal fault raised while executing bytecode.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    /// Pop from an empty operand stack
    #[error("stack underflow")]
    StackUnderflow,

    /// An opcode found a value of the wrong kind
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Kind the opcode works on
        expected: &'static str,
        /// Kind that was on the stack
        found: &'static str,
    },

    /// An instruction lacks the operand its opcode needs
    #[error("{opcode:?} is missing its operand")]
    MissingOperand {
        /// The offending opcode
        opcode: OpCode,
    },

    /// A local slot outside the frame
    #[error("local slot {0} is out of range")]
    InvalidSlot(u16),

    /// A local slot read before any store
    #[error("local slot {0} is read before it is set")]
    UninitializedSlot(u16),

    /// A field index outside the struct
    #[error("field {0} is out of range")]
    InvalidField(u16),

    /// A field read before any store
    #[error("field \"{0}\" is read before it is set")]
    UninitializedField(String),

    /// Array index outside the array
    #[error("index {index} is out of bounds for an array of length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: i64,
        /// Array length
        len: usize,
    },

    /// A block id or name that the program does not contain
    #[error("unknown block {0}")]
    UnknownBlock(String),

    /// A call with the wrong number of arguments
    #[error("{block} expects {expected} argument(s) but got {got}")]
    ArgumentCount {
        /// Callee name
        block: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        got: usize,
    },

    /// A block left the wrong number of values on its operand stack
    #[error("{block} finished with {found} value(s) on its stack, expected {expected}")]
    UnbalancedStack {
        /// Block name
        block: String,
        /// Values the block should leave
        expected: usize,
        /// Values actually left
        found: usize,
    },

    /// Nested calls went deeper than the configured limit
    #[error("call depth exceeded the limit of {0}")]
    CallDepthExceeded(usize),

    /// Integer division or remainder by zero
    #[error("integer division by zero")]
    DivisionByZero,

    /// Integer arithmetic overflowed
    #[error("integer overflow")]
    IntegerOverflow,

    /// An html buffer appended to itself
    #[error("an html value cannot be appended to itself")]
    SelfAppend,

    /// `render` was asked for something that is not a component
    #[error("\"{0}\" is not a component")]
    NotAComponent(String),
}
