//! Bytecode compiler.
//!
//! Lowers the typed AST into blocks of stack-slot-addressed instructions.
//!
//! # Module Structure
//!
//! - `bytecode`: the instruction set and the [`Program`] container
//! - `codegen`: the [`Emitter`]
//!   - `codegen::scope`: local slot allocation

pub mod bytecode;
pub mod codegen;

pub use bytecode::{Block, BlockId, BlockKind, Instruction, OpCode, Operand, Program};
pub use codegen::Emitter;
