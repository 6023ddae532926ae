//! The bytecode interpreter.

use tracing::trace;

use super::VmError;
use crate::compiler::{Block, BlockId, BlockKind, Instruction, OpCode, Operand, Program};
use crate::config::Config;
use crate::runtime::{ClassScope, HtmlBuffer, Node, RcCell, StructValue, Value};

/// Executes blocks of a [`Program`].
pub struct Vm<'p> {
    program: &'p Program,
    config: &'p Config,
    /// Blocks currently being interpreted
    depth: usize,
}

impl<'p> Vm<'p> {
    /// Creates a VM over a compiled program.
    pub fn new(program: &'p Program, config: &'p Config) -> Self {
        Self {
            program,
            config,
            depth: 0,
        }
    }

    /// Runs a block that takes no arguments.
    pub fn execute(&mut self, id: BlockId) -> Result<Option<Value>, VmError> {
        self.call(id, Vec::new())
    }

    /// Runs a block with `args` as its parameters, first argument first.
    pub fn call(&mut self, id: BlockId, args: Vec<Value>) -> Result<Option<Value>, VmError> {
        let block = self.block(id)?;
        if args.len() != block.params {
            return Err(VmError::ArgumentCount {
                block: block.name.clone(),
                expected: block.params,
                got: args.len(),
            });
        }
        self.run(block, args)
    }

    /// Renders a named component with an empty `children` fragment. `args`
    /// holds one value per property, in declaration order.
    pub fn render(&mut self, component: &str, args: Vec<Value>) -> Result<Vec<Node>, VmError> {
        let id = self
            .program
            .lookup(component)
            .ok_or_else(|| VmError::UnknownBlock(component.to_string()))?;
        if self.block(id)?.kind != BlockKind::Component {
            return Err(VmError::NotAComponent(component.to_string()));
        }
        let mut arguments = Vec::with_capacity(args.len() + 1);
        arguments.push(Value::Html(RcCell::new(HtmlBuffer::fragment())));
        arguments.extend(args);
        into_nodes(self.call(id, arguments)?)
    }

    /// Renders the statements of a template file.
    pub fn render_file(&mut self, path: &str) -> Result<Vec<Node>, VmError> {
        let id = self
            .program
            .file(path)
            .ok_or_else(|| VmError::UnknownBlock(path.to_string()))?;
        into_nodes(self.execute(id)?)
    }

    fn block(&self, id: BlockId) -> Result<&'p Block, VmError> {
        let program: &'p Program = self.program;
        program
            .block(id)
            .ok_or_else(|| VmError::UnknownBlock(format!("#{}", id.0)))
    }

    /// Interprets `block` on a fresh frame whose operand stack starts as `stack`.
    fn run(&mut self, block: &'p Block, stack: Vec<Value>) -> Result<Option<Value>, VmError> {
        if self.depth >= self.config.max_call_depth {
            return Err(VmError::CallDepthExceeded(self.config.max_call_depth));
        }
        self.depth += 1;
        trace!(block = %block.name, depth = self.depth, "enter");
        let result = self.interpret(block, stack);
        self.depth -= 1;

        let mut stack = result?;
        let expected = usize::from(block.has_return);
        if stack.len() != expected {
            return Err(VmError::UnbalancedStack {
                block: block.name.clone(),
                expected,
                found: stack.len(),
            });
        }
        Ok(stack.pop())
    }

    fn interpret(&mut self, block: &'p Block, arguments: Vec<Value>) -> Result<Vec<Value>, VmError> {
        let mut stack = Vec::with_capacity(self.config.operand_stack_capacity.max(arguments.len()));
        stack.extend(arguments);
        let mut frame = Frame {
            locals: vec![None; block.stack_size],
            stack,
        };
        let mut ip = 0;

        while let Some(instruction) = block.instructions.get(ip) {
            ip += 1;

            match instruction.opcode {
                OpCode::PushBool => match instruction.operand {
                    Some(Operand::Bool(b)) => frame.push(Value::Bool(b)),
                    _ => return Err(missing(instruction)),
                },
                OpCode::PushInt => match instruction.operand {
                    Some(Operand::Int(n)) => frame.push(Value::Int(n)),
                    _ => return Err(missing(instruction)),
                },
                OpCode::PushFloat => match instruction.operand {
                    Some(Operand::Float(n)) => frame.push(Value::Float(n)),
                    _ => return Err(missing(instruction)),
                },
                OpCode::PushString => frame.push(Value::String(text(instruction)?.to_string())),
                OpCode::Pop => {
                    frame.pop()?;
                }

                // ============================================================
                // Locals and structs
                // ============================================================
                OpCode::LoadLocal => {
                    let slot = slot(instruction)?;
                    let value = match frame.locals.get(usize::from(slot)) {
                        Some(Some(value)) => value.clone(),
                        Some(None) => return Err(VmError::UninitializedSlot(slot)),
                        None => return Err(VmError::InvalidSlot(slot)),
                    };
                    frame.push(value);
                }
                OpCode::StoreLocal => {
                    let slot = slot(instruction)?;
                    let value = frame.pop()?;
                    let local = frame
                        .locals
                        .get_mut(usize::from(slot))
                        .ok_or(VmError::InvalidSlot(slot))?;
                    *local = Some(value);
                }
                OpCode::NewStruct => match &instruction.operand {
                    Some(Operand::Struct { name, fields }) => {
                        let value = StructValue::new(name.clone(), fields.clone());
                        frame.push(Value::Struct(RcCell::new(value)));
                    }
                    _ => return Err(missing(instruction)),
                },
                OpCode::GetField => {
                    let index = field(instruction)?;
                    let target = frame.pop_struct()?;
                    let target = target.borrow();
                    let value = match target.fields.get(usize::from(index)) {
                        Some(Some(value)) => value.clone(),
                        Some(None) => {
                            let name = target.names.get(usize::from(index)).cloned().unwrap_or_default();
                            return Err(VmError::UninitializedField(name));
                        }
                        None => return Err(VmError::InvalidField(index)),
                    };
                    frame.push(value);
                }
                OpCode::StoreField => {
                    let index = field(instruction)?;
                    let value = frame.pop()?;
                    let target = frame.peek_struct()?;
                    let mut target = target.borrow_mut();
                    let slot = target
                        .fields
                        .get_mut(usize::from(index))
                        .ok_or(VmError::InvalidField(index))?;
                    *slot = Some(value);
                }

                // ============================================================
                // Arrays
                // ============================================================
                OpCode::NewArray => frame.push(Value::new_array(Vec::new())),
                OpCode::ArrayPush => {
                    let value = frame.pop()?;
                    frame.peek_array()?.borrow_mut().push(value);
                }
                OpCode::ArrayLen => {
                    let array = frame.pop_array()?;
                    let len = array.borrow().len();
                    frame.push(Value::Int(len as i64));
                }
                OpCode::ArrayGet => {
                    let index = frame.pop_int()?;
                    let array = frame.pop_array()?;
                    let elements = array.borrow();
                    let value = usize::try_from(index)
                        .ok()
                        .and_then(|i| elements.get(i))
                        .cloned()
                        .ok_or(VmError::IndexOutOfBounds {
                            index,
                            len: elements.len(),
                        })?;
                    frame.push(value);
                }

                // ============================================================
                // Arithmetic
                // ============================================================
                OpCode::AddInt => frame.int_op(|a, b| a.checked_add(b).ok_or(VmError::IntegerOverflow))?,
                OpCode::SubInt => frame.int_op(|a, b| a.checked_sub(b).ok_or(VmError::IntegerOverflow))?,
                OpCode::MulInt => frame.int_op(|a, b| a.checked_mul(b).ok_or(VmError::IntegerOverflow))?,
                OpCode::DivInt => frame.int_op(|a, b| {
                    if b == 0 {
                        return Err(VmError::DivisionByZero);
                    }
                    a.checked_div(b).ok_or(VmError::IntegerOverflow)
                })?,
                OpCode::ModInt => frame.int_op(|a, b| {
                    if b == 0 {
                        return Err(VmError::DivisionByZero);
                    }
                    a.checked_rem(b).ok_or(VmError::IntegerOverflow)
                })?,
                OpCode::AddFloat => frame.float_op(|a, b| a + b)?,
                OpCode::SubFloat => frame.float_op(|a, b| a - b)?,
                OpCode::MulFloat => frame.float_op(|a, b| a * b)?,
                OpCode::DivFloat => frame.float_op(|a, b| a / b)?,
                OpCode::ConcatString => {
                    let b = frame.pop_string()?;
                    let mut a = frame.pop_string()?;
                    a.push_str(&b);
                    frame.push(Value::String(a));
                }

                // ============================================================
                // Comparison
                // ============================================================
                OpCode::EqInt => frame.compare(Frame::pop_int, |a, b| a == b)?,
                OpCode::NeInt => frame.compare(Frame::pop_int, |a, b| a != b)?,
                OpCode::LtInt => frame.compare(Frame::pop_int, |a, b| a < b)?,
                OpCode::LeInt => frame.compare(Frame::pop_int, |a, b| a <= b)?,
                OpCode::GtInt => frame.compare(Frame::pop_int, |a, b| a > b)?,
                OpCode::GeInt => frame.compare(Frame::pop_int, |a, b| a >= b)?,
                OpCode::EqFloat => frame.compare(Frame::pop_float, |a, b| a == b)?,
                OpCode::NeFloat => frame.compare(Frame::pop_float, |a, b| a != b)?,
                OpCode::LtFloat => frame.compare(Frame::pop_float, |a, b| a < b)?,
                OpCode::LeFloat => frame.compare(Frame::pop_float, |a, b| a <= b)?,
                OpCode::GtFloat => frame.compare(Frame::pop_float, |a, b| a > b)?,
                OpCode::GeFloat => frame.compare(Frame::pop_float, |a, b| a >= b)?,
                OpCode::EqString => frame.compare(Frame::pop_string, |a, b| a == b)?,
                OpCode::NeString => frame.compare(Frame::pop_string, |a, b| a != b)?,
                OpCode::EqBool => frame.compare(Frame::pop_bool, |a, b| a == b)?,
                OpCode::NeBool => frame.compare(Frame::pop_bool, |a, b| a != b)?,

                // ============================================================
                // Logic
                // ============================================================
                OpCode::And => frame.compare(Frame::pop_bool, |a, b| *a && *b)?,
                OpCode::Or => frame.compare(Frame::pop_bool, |a, b| *a || *b)?,
                OpCode::Not => {
                    let b = frame.pop_bool()?;
                    frame.push(Value::Bool(!b));
                }

                // ============================================================
                // Control flow
                // ============================================================
                OpCode::Jump => ip = jump(instruction)?,
                OpCode::JumpIfFalse => {
                    let target = jump(instruction)?;
                    if !frame.pop_bool()? {
                        ip = target;
                    }
                }
                OpCode::Call => {
                    let id = match instruction.operand {
                        Some(Operand::Block(id)) => id,
                        _ => return Err(missing(instruction)),
                    };
                    let callee = self.block(id)?;
                    let base = frame
                        .stack
                        .len()
                        .checked_sub(callee.params)
                        .ok_or(VmError::StackUnderflow)?;
                    let arguments = frame.stack.split_off(base);
                    if let Some(result) = self.run(callee, arguments)? {
                        frame.push(result);
                    }
                }
                OpCode::Return => break,

                // ============================================================
                // HTML
                // ============================================================
                OpCode::NewElement => {
                    let tag = text(instruction)?;
                    frame.push(Value::Html(RcCell::new(HtmlBuffer::element(tag))));
                }
                OpCode::NewFragment => frame.push(Value::Html(RcCell::new(HtmlBuffer::fragment()))),
                OpCode::SetAttribute => {
                    let name = text(instruction)?;
                    let value = frame.pop_primitive()?;
                    frame.peek_html()?.borrow_mut().set_attribute(name, value.to_string());
                }
                OpCode::ScopeClasses => {
                    let scope = class_scope(instruction)?;
                    let classes = frame.pop_string()?;
                    frame.push(Value::String(scope.scope_class_list(&classes)));
                }
                OpCode::AppendChild => {
                    let child = frame.pop_html()?;
                    let parent = frame.peek_html()?;
                    if parent.ptr_eq(&child) {
                        return Err(VmError::SelfAppend);
                    }
                    parent.borrow_mut().append_child(&child);
                }
                OpCode::AppendText => {
                    let value = frame.pop_primitive()?;
                    frame.peek_html()?.borrow_mut().append_text(value.to_string());
                }
            }
        }

        Ok(frame.stack)
    }
}

/// Locals and operand stack of one block invocation.
struct Frame {
    locals: Vec<Option<Value>>,
    stack: Vec<Value>,
}

impl Frame {
    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<Value, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    fn peek(&self) -> Result<&Value, VmError> {
        self.stack.last().ok_or(VmError::StackUnderflow)
    }

    fn pop_bool(&mut self) -> Result<bool, VmError> {
        match self.pop()? {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }

    fn pop_int(&mut self) -> Result<i64, VmError> {
        match self.pop()? {
            Value::Int(n) => Ok(n),
            other => Err(mismatch("int", &other)),
        }
    }

    fn pop_float(&mut self) -> Result<f64, VmError> {
        match self.pop()? {
            Value::Float(n) => Ok(n),
            other => Err(mismatch("float", &other)),
        }
    }

    fn pop_string(&mut self) -> Result<String, VmError> {
        match self.pop()? {
            Value::String(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }

    fn pop_primitive(&mut self) -> Result<Value, VmError> {
        let value = self.pop()?;
        if value.is_primitive() {
            Ok(value)
        } else {
            Err(mismatch("primitive", &value))
        }
    }

    fn pop_struct(&mut self) -> Result<RcCell<StructValue>, VmError> {
        match self.pop()? {
            Value::Struct(st) => Ok(st),
            other => Err(mismatch("struct", &other)),
        }
    }

    fn pop_array(&mut self) -> Result<RcCell<Vec<Value>>, VmError> {
        match self.pop()? {
            Value::Array(array) => Ok(array),
            other => Err(mismatch("array", &other)),
        }
    }

    fn pop_html(&mut self) -> Result<RcCell<HtmlBuffer>, VmError> {
        match self.pop()? {
            Value::Html(html) => Ok(html),
            other => Err(mismatch("html", &other)),
        }
    }

    fn peek_struct(&self) -> Result<RcCell<StructValue>, VmError> {
        match self.peek()? {
            Value::Struct(st) => Ok(st.clone()),
            other => Err(mismatch("struct", other)),
        }
    }

    fn peek_array(&self) -> Result<RcCell<Vec<Value>>, VmError> {
        match self.peek()? {
            Value::Array(array) => Ok(array.clone()),
            other => Err(mismatch("array", other)),
        }
    }

    fn peek_html(&self) -> Result<RcCell<HtmlBuffer>, VmError> {
        match self.peek()? {
            Value::Html(html) => Ok(html.clone()),
            other => Err(mismatch("html", other)),
        }
    }

    fn int_op<F>(&mut self, op: F) -> Result<(), VmError>
    where
        F: Fn(i64, i64) -> Result<i64, VmError>,
    {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        self.push(Value::Int(op(a, b)?));
        Ok(())
    }

    fn float_op<F>(&mut self, op: F) -> Result<(), VmError>
    where
        F: Fn(f64, f64) -> f64,
    {
        let b = self.pop_float()?;
        let a = self.pop_float()?;
        self.push(Value::Float(op(a, b)));
        Ok(())
    }

    fn compare<T>(
        &mut self,
        pop: fn(&mut Frame) -> Result<T, VmError>,
        op: fn(&T, &T) -> bool,
    ) -> Result<(), VmError> {
        let b = pop(self)?;
        let a = pop(self)?;
        self.push(Value::Bool(op(&a, &b)));
        Ok(())
    }
}

fn mismatch(expected: &'static str, found: &Value) -> VmError {
    VmError::TypeMismatch {
        expected,
        found: found.kind(),
    }
}

fn missing(instruction: &Instruction) -> VmError {
    VmError::MissingOperand {
        opcode: instruction.opcode,
    }
}

fn slot(instruction: &Instruction) -> Result<u16, VmError> {
    match instruction.operand {
        Some(Operand::Slot(slot)) => Ok(slot),
        _ => Err(missing(instruction)),
    }
}

fn field(instruction: &Instruction) -> Result<u16, VmError> {
    match instruction.operand {
        Some(Operand::Field(index)) => Ok(index),
        _ => Err(missing(instruction)),
    }
}

fn jump(instruction: &Instruction) -> Result<usize, VmError> {
    match instruction.operand {
        Some(Operand::Jump(target)) => Ok(target),
        _ => Err(missing(instruction)),
    }
}

fn text(instruction: &Instruction) -> Result<&str, VmError> {
    match &instruction.operand {
        Some(Operand::Text(text)) => Ok(text),
        _ => Err(missing(instruction)),
    }
}

fn class_scope(instruction: &Instruction) -> Result<&ClassScope, VmError> {
    match &instruction.operand {
        Some(Operand::ClassScope(scope)) => Ok(scope),
        _ => Err(missing(instruction)),
    }
}

fn into_nodes(value: Option<Value>) -> Result<Vec<Node>, VmError> {
    match value {
        Some(Value::Html(html)) => Ok(html.borrow().to_nodes()),
        Some(other) => Err(mismatch("html", &other)),
        None => Err(VmError::StackUnderflow),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(blocks: Vec<Block>) -> Program {
        let mut program = Program::default();
        for (index, block) in blocks.into_iter().enumerate() {
            program.names.insert(block.name.clone(), BlockId(index as u32));
            program.blocks.push(block);
        }
        program
    }

    fn block(name: &str, params: usize, has_return: bool, instructions: Vec<Instruction>) -> Block {
        let mut block = Block::new(name, BlockKind::Procedure);
        block.params = params;
        block.has_return = has_return;
        block.stack_size = 4;
        block.instructions = instructions;
        block
    }

    fn op(opcode: OpCode) -> Instruction {
        Instruction::simple(opcode)
    }

    fn int(n: i64) -> Instruction {
        Instruction::with_operand(OpCode::PushInt, Operand::Int(n))
    }

    fn run(instructions: Vec<Instruction>) -> Result<Option<Value>, VmError> {
        let program = program(vec![block("main", 0, true, instructions)]);
        let config = Config::default();
        Vm::new(&program, &config).execute(BlockId(0))
    }

    #[test]
    fn test_vm_arithmetic() {
        let result = run(vec![int(2), int(3), op(OpCode::MulInt), int(4), op(OpCode::SubInt), op(OpCode::Return)]);
        assert_eq!(result, Ok(Some(Value::Int(2))));
    }

    #[test]
    fn test_vm_division_by_zero() {
        let result = run(vec![int(1), int(0), op(OpCode::DivInt), op(OpCode::Return)]);
        assert_eq!(result, Err(VmError::DivisionByZero));
    }

    #[test]
    fn test_vm_integer_overflow() {
        let result = run(vec![int(i64::MAX), int(1), op(OpCode::AddInt), op(OpCode::Return)]);
        assert_eq!(result, Err(VmError::IntegerOverflow));
    }

    #[test]
    fn test_vm_type_mismatch() {
        let result = run(vec![
            int(1),
            Instruction::with_operand(OpCode::PushFloat, Operand::Float(1.0)),
            op(OpCode::AddInt),
            op(OpCode::Return),
        ]);
        assert_eq!(
            result,
            Err(VmError::TypeMismatch {
                expected: "int",
                found: "float"
            })
        );
    }

    #[test]
    fn test_vm_stack_underflow() {
        assert_eq!(run(vec![op(OpCode::Pop)]), Err(VmError::StackUnderflow));
    }

    #[test]
    fn test_vm_unbalanced_stack() {
        let result = run(vec![int(1), int(2), op(OpCode::Return)]);
        assert!(matches!(result, Err(VmError::UnbalancedStack { expected: 1, found: 2, .. })));
    }

    #[test]
    fn test_vm_uninitialized_slot() {
        let result = run(vec![
            Instruction::with_operand(OpCode::LoadLocal, Operand::Slot(1)),
            op(OpCode::Return),
        ]);
        assert_eq!(result, Err(VmError::UninitializedSlot(1)));
    }

    #[test]
    fn test_vm_conditional_jump() {
        // if false { 1 } else { 2 }
        let result = run(vec![
            Instruction::with_operand(OpCode::PushBool, Operand::Bool(false)),
            Instruction::with_operand(OpCode::JumpIfFalse, Operand::Jump(4)),
            int(1),
            Instruction::with_operand(OpCode::Jump, Operand::Jump(5)),
            int(2),
            op(OpCode::Return),
        ]);
        assert_eq!(result, Ok(Some(Value::Int(2))));
    }

    #[test]
    fn test_vm_call_moves_arguments() {
        let sub = block(
            "sub",
            2,
            true,
            vec![
                Instruction::with_operand(OpCode::StoreLocal, Operand::Slot(1)),
                Instruction::with_operand(OpCode::StoreLocal, Operand::Slot(0)),
                Instruction::with_operand(OpCode::LoadLocal, Operand::Slot(0)),
                Instruction::with_operand(OpCode::LoadLocal, Operand::Slot(1)),
                op(OpCode::SubInt),
                op(OpCode::Return),
            ],
        );
        let main = block(
            "main",
            0,
            true,
            vec![
                int(10),
                int(3),
                Instruction::with_operand(OpCode::Call, Operand::Block(BlockId(0))),
                op(OpCode::Return),
            ],
        );
        let program = program(vec![sub, main]);
        let config = Config::default();
        let mut vm = Vm::new(&program, &config);
        assert_eq!(vm.execute(BlockId(1)), Ok(Some(Value::Int(7))));
        assert_eq!(vm.call(BlockId(0), vec![Value::Int(1), Value::Int(5)]), Ok(Some(Value::Int(-4))));
    }

    #[test]
    fn test_vm_callee_cannot_leave_extra_values() {
        let leaky = block("leaky", 0, false, vec![int(1), op(OpCode::Return)]);
        let main = block(
            "main",
            0,
            false,
            vec![
                Instruction::with_operand(OpCode::Call, Operand::Block(BlockId(0))),
                op(OpCode::Return),
            ],
        );
        let program = program(vec![leaky, main]);
        let config = Config::default();
        let result = Vm::new(&program, &config).execute(BlockId(1));
        assert!(matches!(result, Err(VmError::UnbalancedStack { ref block, .. }) if block == "leaky"));
    }

    #[test]
    fn test_vm_argument_count() {
        let program = program(vec![block("two", 2, false, vec![op(OpCode::Return)])]);
        let config = Config::default();
        let result = Vm::new(&program, &config).call(BlockId(0), vec![Value::Int(1)]);
        assert!(matches!(result, Err(VmError::ArgumentCount { expected: 2, got: 1, .. })));
    }

    #[test]
    fn test_vm_call_depth() {
        let forever = block(
            "forever",
            0,
            false,
            vec![
                Instruction::with_operand(OpCode::Call, Operand::Block(BlockId(0))),
                op(OpCode::Return),
            ],
        );
        let program = program(vec![forever]);
        let config = Config {
            max_call_depth: 8,
            ..Config::default()
        };
        let result = Vm::new(&program, &config).execute(BlockId(0));
        assert_eq!(result, Err(VmError::CallDepthExceeded(8)));
    }

    #[test]
    fn test_vm_array_bounds() {
        let result = run(vec![
            op(OpCode::NewArray),
            int(5),
            op(OpCode::ArrayPush),
            int(1),
            op(OpCode::ArrayGet),
            op(OpCode::Return),
        ]);
        assert_eq!(result, Err(VmError::IndexOutOfBounds { index: 1, len: 1 }));
    }

    #[test]
    fn test_vm_struct_fields_are_shared() {
        let layout = Operand::Struct {
            name: "Point".into(),
            fields: vec!["x".into()],
        };
        let result = run(vec![
            Instruction::with_operand(OpCode::NewStruct, layout),
            int(1),
            Instruction::with_operand(OpCode::StoreField, Operand::Field(0)),
            Instruction::with_operand(OpCode::StoreLocal, Operand::Slot(0)),
            Instruction::with_operand(OpCode::LoadLocal, Operand::Slot(0)),
            Instruction::with_operand(OpCode::StoreLocal, Operand::Slot(1)),
            Instruction::with_operand(OpCode::LoadLocal, Operand::Slot(1)),
            int(9),
            Instruction::with_operand(OpCode::StoreField, Operand::Field(0)),
            op(OpCode::Pop),
            Instruction::with_operand(OpCode::LoadLocal, Operand::Slot(0)),
            Instruction::with_operand(OpCode::GetField, Operand::Field(0)),
            op(OpCode::Return),
        ]);
        assert_eq!(result, Ok(Some(Value::Int(9))));
    }

    #[test]
    fn test_vm_html_building() {
        let mut component = block(
            "Tag",
            1,
            true,
            vec![
                Instruction::with_operand(OpCode::StoreLocal, Operand::Slot(0)),
                op(OpCode::NewFragment),
                Instruction::with_operand(OpCode::NewElement, Operand::Text("span".into())),
                Instruction::with_operand(OpCode::PushString, Operand::Text("title".into())),
                Instruction::with_operand(
                    OpCode::ScopeClasses,
                    Operand::ClassScope(ClassScope::new("Tag", vec![])),
                ),
                Instruction::with_operand(OpCode::SetAttribute, Operand::Text("class".into())),
                int(42),
                op(OpCode::AppendText),
                op(OpCode::AppendChild),
                op(OpCode::Return),
            ],
        );
        component.kind = BlockKind::Component;
        let program = program(vec![component]);
        let config = Config::default();
        let nodes = Vm::new(&program, &config).render("Tag", vec![]).unwrap();

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].tag(), Some("span"));
        assert_eq!(nodes[0].attribute("class"), Some("Tag__title"));
        assert_eq!(nodes[0].children(), &[Node::text("42")]);
    }

    #[test]
    fn test_vm_self_append() {
        let result = run(vec![
            op(OpCode::NewFragment),
            Instruction::with_operand(OpCode::StoreLocal, Operand::Slot(0)),
            Instruction::with_operand(OpCode::LoadLocal, Operand::Slot(0)),
            Instruction::with_operand(OpCode::LoadLocal, Operand::Slot(0)),
            op(OpCode::AppendChild),
            op(OpCode::Return),
        ]);
        assert_eq!(result, Err(VmError::SelfAppend));
    }

    #[test]
    fn test_vm_render_rejects_procedures() {
        let program = program(vec![block("f", 0, false, vec![op(OpCode::Return)])]);
        let config = Config::default();
        let result = Vm::new(&program, &config).render("f", vec![]);
        assert_eq!(result, Err(VmError::NotAComponent("f".into())));
    }
}
