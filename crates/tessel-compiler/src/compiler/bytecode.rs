//! Bytecode definitions.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::runtime::css::{ClassScope, ComponentStyle};

/// Index of a [`Block`] in [`Program::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BlockId(pub u32);

impl BlockId {
    /// Position in the block list.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a block was compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// A procedure
    Procedure,
    /// A named or anonymous component
    Component,
    /// A workspace definition
    Workspace,
    /// The statements of a template file
    Template,
    /// The statements of a plain file
    File,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockKind::Procedure => "procedure",
            BlockKind::Component => "component",
            BlockKind::Workspace => "workspace",
            BlockKind::Template => "template",
            BlockKind::File => "file",
        };
        f.write_str(name)
    }
}

/// A compiled unit of code with its own frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    /// Procedure, component, workspace or file name
    pub name: String,
    /// Origin of the block
    pub kind: BlockKind,
    /// The instructions
    pub instructions: Vec<Instruction>,
    /// Number of local slots the frame needs
    pub stack_size: usize,
    /// Values taken from the caller's operand stack
    pub params: usize,
    /// Whether one value is left for the caller
    pub has_return: bool,
}

impl Block {
    /// Creates an empty block.
    pub fn new(name: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            name: name.into(),
            kind,
            instructions: Vec::new(),
            stack_size: 0,
            params: 0,
            has_return: false,
        }
    }

    /// Adds an instruction and returns its index.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    /// Points the jump at `index` to `target`.
    pub fn patch_jump(&mut self, index: usize, target: usize) {
        if let Some(instruction) = self.instructions.get_mut(index) {
            instruction.operand = Some(Operand::Jump(target));
        }
    }

    /// Opcodes in order, for assertions and listings.
    pub fn opcodes(&self) -> Vec<OpCode> {
        self.instructions.iter().map(|i| i.opcode).collect()
    }
}

/// A single bytecode instruction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruction {
    /// The operation code
    pub opcode: OpCode,
    /// Optional operand
    pub operand: Option<Operand>,
}

impl Instruction {
    /// Creates a new instruction with no operand.
    pub fn simple(opcode: OpCode) -> Self {
        Self {
            opcode,
            operand: None,
        }
    }

    /// Creates a new instruction with an operand.
    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Self {
            opcode,
            operand: Some(operand),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.opcode)?;
        if let Some(operand) = &self.operand {
            write!(f, " {}", operand)?;
        }
        Ok(())
    }
}

/// Instruction operands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// Boolean literal
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal, tag or attribute name
    Text(String),
    /// Local slot in the current frame
    Slot(u16),
    /// Positional struct field
    Field(u16),
    /// Absolute instruction index
    Jump(usize),
    /// Callee block
    Block(BlockId),
    /// Struct layout for `NewStruct`
    Struct {
        /// Struct name
        name: String,
        /// Field names in slot order
        fields: Vec<String>,
    },
    /// Class rewriting for `ScopeClasses`
    ClassScope(ClassScope),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Bool(b) => write!(f, "{}", b),
            Operand::Int(n) => write!(f, "{}", n),
            Operand::Float(n) => write!(f, "{:?}", n),
            Operand::Text(s) => write!(f, "{:?}", s),
            Operand::Slot(slot) => write!(f, "${}", slot),
            Operand::Field(index) => write!(f, ".{}", index),
            Operand::Jump(target) => write!(f, "@{}", target),
            Operand::Block(id) => write!(f, "#{}", id.0),
            Operand::Struct { name, fields } => write!(f, "{}{{{}}}", name, fields.join(", ")),
            Operand::ClassScope(scope) => write!(f, "{}__*", scope.component),
        }
    }
}

/// Operation codes for the VM. Every opcode works on one statically known
/// kind of value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum OpCode {
    // Literals and stack operations
    /// Push a bool
    PushBool,
    /// Push an int
    PushInt,
    /// Push a float
    PushFloat,
    /// Push a string
    PushString,
    /// Pop the top value
    Pop,

    // Locals and structs
    /// Push a local slot
    LoadLocal,
    /// Pop into a local slot
    StoreLocal,
    /// Push a struct with unset fields
    NewStruct,
    /// Pop a struct, push one of its fields
    GetField,
    /// Pop a value into a field of the struct below it
    StoreField,

    // Arrays
    /// Push an empty array
    NewArray,
    /// Pop a value onto the array below it
    ArrayPush,
    /// Pop an array, push its length
    ArrayLen,
    /// Pop an index and an array, push the element
    ArrayGet,

    // Arithmetic
    /// int + int
    AddInt,
    /// int - int
    SubInt,
    /// int * int
    MulInt,
    /// int / int
    DivInt,
    /// int % int
    ModInt,
    /// float + float
    AddFloat,
    /// float - float
    SubFloat,
    /// float * float
    MulFloat,
    /// float / float
    DivFloat,
    /// string + string
    ConcatString,

    // Comparison
    /// int == int
    EqInt,
    /// int != int
    NeInt,
    /// int < int
    LtInt,
    /// int <= int
    LeInt,
    /// int > int
    GtInt,
    /// int >= int
    GeInt,
    /// float == float
    EqFloat,
    /// float != float
    NeFloat,
    /// float < float
    LtFloat,
    /// float <= float
    LeFloat,
    /// float > float
    GtFloat,
    /// float >= float
    GeFloat,
    /// string == string
    EqString,
    /// string != string
    NeString,
    /// bool == bool
    EqBool,
    /// bool != bool
    NeBool,

    // Logic
    /// bool && bool
    And,
    /// bool || bool
    Or,
    /// !bool
    Not,

    // Control flow
    /// Unconditional jump
    Jump,
    /// Pop a bool, jump when false
    JumpIfFalse,
    /// Run another block
    Call,
    /// Leave the current block
    Return,

    // HTML
    /// Push a new element
    NewElement,
    /// Push a new fragment
    NewFragment,
    /// Pop a primitive into an attribute of the element below it
    SetAttribute,
    /// Rewrite the class names of the string on top
    ScopeClasses,
    /// Pop an html value into the element below it
    AppendChild,
    /// Pop a primitive as text into the element below it
    AppendText,
}

/// The output of the emitter.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Program {
    /// Every compiled block
    pub blocks: Vec<Block>,
    /// Procedure and component blocks by name
    pub names: BTreeMap<String, BlockId>,
    /// File blocks by path
    pub files: BTreeMap<String, BlockId>,
    /// Workspace blocks by name
    pub workspaces: BTreeMap<String, BlockId>,
    /// Component styles in declaration order
    pub styles: Vec<ComponentStyle>,
}

impl Program {
    /// The block under `id`.
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    /// A procedure or component block by name.
    pub fn lookup(&self, name: &str) -> Option<BlockId> {
        self.names.get(name).copied()
    }

    /// The block of a source file.
    pub fn file(&self, path: &str) -> Option<BlockId> {
        self.files.get(path).copied()
    }

    /// The block of a workspace.
    pub fn workspace(&self, name: &str) -> Option<BlockId> {
        self.workspaces.get(name).copied()
    }
}

/// Human readable listing of every block.
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, block) in self.blocks.iter().enumerate() {
            writeln!(
                f,
                "#{} {} {} (params {}, slots {}{})",
                index,
                block.kind,
                block.name,
                block.params,
                block.stack_size,
                if block.has_return { ", returns" } else { "" }
            )?;
            for (ip, instruction) in block.instructions.iter().enumerate() {
                writeln!(f, "  {:04} {}", ip, instruction)?;
            }
        }
        Ok(())
    }
}
