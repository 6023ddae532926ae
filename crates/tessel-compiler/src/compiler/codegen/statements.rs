//! Statement lowering.

use super::{Emitter, unset};
use crate::Error;
use crate::ast::{Assignment, Expression, ForStatement, IfStatement, Statement};
use crate::compiler::bytecode::{OpCode, Operand};
use crate::error::Result;
use crate::types::TypeId;

impl Emitter<'_> {
    /// Compiles statements in the current scope. In `html` context the
    /// fragment or element being built is on top of the stack.
    pub(super) fn compile_statements(&mut self, body: &[Statement], html: bool) -> Result<()> {
        for statement in body {
            self.compile_statement(statement, html)?;
        }
        Ok(())
    }

    /// Compiles statements in a nested scope.
    pub(super) fn compile_block(&mut self, body: &[Statement], html: bool) -> Result<()> {
        self.scope.begin_scope();
        let result = self.compile_statements(body, html);
        self.scope.end_scope();
        result
    }

    pub(super) fn compile_statement(&mut self, statement: &Statement, html: bool) -> Result<()> {
        match statement {
            Statement::Declaration(declaration) => {
                let ty = declaration
                    .ty
                    .ok_or_else(|| unset(&format!("variable \"{}\"", declaration.name)))?;
                match &declaration.value {
                    Some(value) => self.emit_expression(value)?,
                    None => self.emit_zero(ty)?,
                }
                let slot = self.scope.declare(&declaration.name, ty)?;
                self.emit_with(OpCode::StoreLocal, Operand::Slot(slot));
            }
            Statement::Assignment(assignment) => self.compile_assignment(assignment)?,
            Statement::ArrayAppend(append) => {
                self.emit_load_path(&append.target)?;
                self.emit_expression(&append.value)?;
                self.emit_simple(OpCode::ArrayPush);
                self.emit_simple(OpCode::Pop);
            }
            Statement::If(statement) => self.compile_if(statement, html)?,
            Statement::For(statement) => self.compile_for(statement, html)?,
            Statement::Return(statement) => {
                if let Some(value) = &statement.value {
                    self.emit_expression(value)?;
                }
                self.emit_simple(OpCode::Return);
            }
            Statement::Expression(expr) => self.compile_expression_statement(expr, html)?,
            Statement::Html(element) => self.compile_element(element)?,
            Statement::Block(body) => self.compile_block(body, html)?,
        }
        Ok(())
    }

    fn compile_assignment(&mut self, assignment: &Assignment) -> Result<()> {
        let (last, prefix) = assignment
            .target
            .split_last()
            .ok_or_else(|| Error::internal("assignment without a target"))?;

        if prefix.is_empty() {
            self.emit_expression(&assignment.value)?;
            let slot = self
                .scope
                .resolve(last)
                .map(|local| local.slot)
                .ok_or_else(|| Error::internal(format!("\"{}\" has no local slot{}", last, self.tag_context())))?;
            self.emit_with(OpCode::StoreLocal, Operand::Slot(slot));
            return Ok(());
        }

        let owner = self.emit_load_path(prefix)?;
        let (index, _) = self.field_index(owner, last)?;
        self.emit_expression(&assignment.value)?;
        self.emit_with(OpCode::StoreField, Operand::Field(index));
        self.emit_simple(OpCode::Pop);
        Ok(())
    }

    fn compile_if(&mut self, statement: &IfStatement, html: bool) -> Result<()> {
        self.emit_expression(&statement.condition)?;

        match (statement.then_branch.is_empty(), statement.else_branch.is_empty()) {
            (true, true) => {
                self.emit_simple(OpCode::Pop);
            }
            (true, false) => {
                self.emit_simple(OpCode::Not);
                let skip = self.emit_jump(OpCode::JumpIfFalse);
                self.compile_block(&statement.else_branch, html)?;
                self.patch_jump(skip);
            }
            (false, true) => {
                let skip = self.emit_jump(OpCode::JumpIfFalse);
                self.compile_block(&statement.then_branch, html)?;
                self.patch_jump(skip);
            }
            (false, false) => {
                let else_jump = self.emit_jump(OpCode::JumpIfFalse);
                self.compile_block(&statement.then_branch, html)?;
                let end_jump = self.emit_jump(OpCode::Jump);
                self.patch_jump(else_jump);
                self.compile_block(&statement.else_branch, html)?;
                self.patch_jump(end_jump);
            }
        }
        Ok(())
    }

    fn compile_for(&mut self, statement: &ForStatement, html: bool) -> Result<()> {
        let array_ty = statement
            .array
            .ty
            .ok_or_else(|| unset(&format!("array of loop over \"{}\"", statement.item)))?;
        let item_ty = statement
            .item_ty
            .ok_or_else(|| unset(&format!("loop item \"{}\"", statement.item)))?;

        self.scope.begin_scope();

        self.emit_expression(&statement.array)?;
        let array = self.scope.hidden(array_ty)?;
        self.emit_with(OpCode::StoreLocal, Operand::Slot(array));
        self.emit_with(OpCode::PushInt, Operand::Int(0));
        let counter = self.scope.hidden(TypeId::INT)?;
        self.emit_with(OpCode::StoreLocal, Operand::Slot(counter));

        let loop_start = self.block.instructions.len();
        self.emit_with(OpCode::LoadLocal, Operand::Slot(counter));
        self.emit_with(OpCode::LoadLocal, Operand::Slot(array));
        self.emit_simple(OpCode::ArrayLen);
        self.emit_simple(OpCode::LtInt);
        let exit = self.emit_jump(OpCode::JumpIfFalse);

        self.emit_with(OpCode::LoadLocal, Operand::Slot(array));
        self.emit_with(OpCode::LoadLocal, Operand::Slot(counter));
        self.emit_simple(OpCode::ArrayGet);
        let item = self.scope.declare(&statement.item, item_ty)?;
        self.emit_with(OpCode::StoreLocal, Operand::Slot(item));
        if let Some(index) = &statement.index {
            self.emit_with(OpCode::LoadLocal, Operand::Slot(counter));
            let slot = self.scope.declare(index, TypeId::INT)?;
            self.emit_with(OpCode::StoreLocal, Operand::Slot(slot));
        }

        self.compile_block(&statement.body, html)?;

        self.emit_with(OpCode::LoadLocal, Operand::Slot(counter));
        self.emit_with(OpCode::PushInt, Operand::Int(1));
        self.emit_simple(OpCode::AddInt);
        self.emit_with(OpCode::StoreLocal, Operand::Slot(counter));
        self.emit_with(OpCode::Jump, Operand::Jump(loop_start));
        self.patch_jump(exit);

        self.scope.end_scope();
        Ok(())
    }

    /// A lone call runs for its effect or, in html context, appends its
    /// result. Any other expression is rendered into the element on top.
    fn compile_expression_statement(&mut self, expr: &Expression, html: bool) -> Result<()> {
        if let Some(call) = expr.as_call() {
            self.emit_call(call)?;
            match (expr.ty, html) {
                (None, _) => {}
                (Some(ty), true) => self.emit_append(ty),
                (Some(_), false) => {
                    self.emit_simple(OpCode::Pop);
                }
            }
            return Ok(());
        }

        if !html {
            return Err(Error::internal(format!(
                "unused expression on line {}{}",
                expr.location.line,
                self.tag_context()
            )));
        }
        let ty = expr
            .ty
            .ok_or_else(|| unset(&format!("expression on line {}", expr.location.line)))?;
        self.emit_expression(expr)?;
        self.emit_append(ty);
        Ok(())
    }

    fn emit_append(&mut self, ty: TypeId) {
        let opcode = if ty == TypeId::HTML_NODE {
            OpCode::AppendChild
        } else {
            OpCode::AppendText
        };
        self.emit_simple(opcode);
    }
}
