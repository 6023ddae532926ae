//! Expression lowering.

use super::{Emitter, field_operand, unset};
use crate::Error;
use crate::ast::{ArrayLiteral, Call, CallKind, ExprNode, Expression, FieldInit, Literal, LiteralKind, Operator};
use crate::compiler::bytecode::{OpCode, Operand};
use crate::error::Result;
use crate::types::{TypeId, TypeInfo};

impl Emitter<'_> {
    /// Emits a typed expression, leaving its value on the stack.
    pub(super) fn emit_expression(&mut self, expr: &Expression) -> Result<()> {
        if expr.ty.is_none() {
            return Err(unset(&format!("expression on line {}", expr.location.line)));
        }
        for node in &expr.nodes {
            match node {
                ExprNode::Literal(literal) => self.emit_literal(literal)?,
                ExprNode::Identifier(identifier) => {
                    self.emit_load_path(&identifier.path)?;
                }
                ExprNode::Call(call) => self.emit_call(call)?,
                ExprNode::StructLiteral(literal) => {
                    let ty = literal
                        .ty
                        .ok_or_else(|| unset(&format!("struct literal {}", literal.name)))?;
                    self.emit_struct(ty, &literal.fields)?;
                }
                ExprNode::ArrayLiteral(literal) => self.emit_array(literal)?,
                ExprNode::Operator(op) => {
                    let opcode = self.operator_opcode(*op, expr.operand_ty)?;
                    self.emit_simple(opcode);
                }
            }
        }
        Ok(())
    }

    fn emit_literal(&mut self, literal: &Literal) -> Result<()> {
        let invalid = || Error::internal(format!("invalid literal \"{}\"", literal.value));
        match literal.kind {
            LiteralKind::Text => {
                self.emit_with(OpCode::PushString, Operand::Text(literal.value.clone()));
            }
            LiteralKind::Number if literal.value.contains('.') => {
                let value = literal.value.parse::<f64>().map_err(|_| invalid())?;
                self.emit_with(OpCode::PushFloat, Operand::Float(value));
            }
            LiteralKind::Number => {
                let value = literal.value.parse::<i64>().map_err(|_| invalid())?;
                self.emit_with(OpCode::PushInt, Operand::Int(value));
            }
            LiteralKind::Bool => {
                let value = match literal.value.as_str() {
                    "true" => true,
                    "false" => false,
                    _ => return Err(invalid()),
                };
                self.emit_with(OpCode::PushBool, Operand::Bool(value));
            }
        }
        Ok(())
    }

    /// Pushes the value at `a.b.c` and returns its type.
    pub(super) fn emit_load_path(&mut self, path: &[String]) -> Result<TypeId> {
        let (first, rest) = path
            .split_first()
            .ok_or_else(|| Error::internal("empty variable path"))?;
        let (slot, mut ty) = match self.scope.resolve(first) {
            Some(local) => (local.slot, local.ty),
            None => {
                return Err(Error::internal(format!(
                    "\"{}\" has no local slot{}",
                    first,
                    self.tag_context()
                )));
            }
        };
        self.emit_with(OpCode::LoadLocal, Operand::Slot(slot));
        for segment in rest {
            let (index, field_ty) = self.field_index(ty, segment)?;
            self.emit_with(OpCode::GetField, Operand::Field(index));
            ty = field_ty;
        }
        Ok(ty)
    }

    pub(super) fn emit_call(&mut self, call: &Call) -> Result<()> {
        match call.kind {
            Some(CallKind::Procedure { .. }) => {
                for argument in &call.arguments {
                    self.emit_expression(&argument.value)?;
                }
                let id = self.block_id(&call.name)?;
                self.emit_with(OpCode::Call, Operand::Block(id));
                Ok(())
            }
            Some(CallKind::Component) => self.emit_component_call(call),
            None => Err(Error::internal(format!(
                "call to \"{}\" was never resolved{}",
                call.name,
                self.tag_context()
            ))),
        }
    }

    /// Builds a struct field by field: supplied value, declared default or
    /// zero value.
    fn emit_struct(&mut self, ty: TypeId, supplied: &[FieldInit]) -> Result<()> {
        let st = self.struct_type(ty)?;
        self.emit_with(
            OpCode::NewStruct,
            Operand::Struct {
                name: st.name.clone(),
                fields: st.fields.iter().map(|f| f.name.clone()).collect(),
            },
        );
        for (index, field) in st.fields.iter().enumerate() {
            if let Some(init) = supplied.iter().find(|init| init.name == field.name) {
                self.emit_expression(&init.value)?;
            } else if let Some(default) = self.field_default(ty, index) {
                self.emit_default(ty, index, default)?;
            } else {
                self.emit_zero(field.ty)?;
            }
            self.emit_with(OpCode::StoreField, Operand::Field(field_operand(index)?));
        }
        Ok(())
    }

    fn emit_array(&mut self, literal: &ArrayLiteral) -> Result<()> {
        if literal.ty.is_none() {
            return Err(unset(&format!("array literal of {}", literal.element)));
        }
        self.emit_simple(OpCode::NewArray);
        for element in &literal.elements {
            self.emit_expression(element)?;
            self.emit_simple(OpCode::ArrayPush);
        }
        Ok(())
    }

    /// Pushes the zero value of `ty`.
    pub(super) fn emit_zero(&mut self, ty: TypeId) -> Result<()> {
        let registry = self.registry;
        match registry.get(ty) {
            TypeInfo::Bool => {
                self.emit_with(OpCode::PushBool, Operand::Bool(false));
            }
            TypeInfo::Int => {
                self.emit_with(OpCode::PushInt, Operand::Int(0));
            }
            TypeInfo::Float => {
                self.emit_with(OpCode::PushFloat, Operand::Float(0.0));
            }
            TypeInfo::String => {
                self.emit_with(OpCode::PushString, Operand::Text(String::new()));
            }
            TypeInfo::Array(_) => {
                self.emit_simple(OpCode::NewArray);
            }
            TypeInfo::HtmlNode => {
                self.emit_simple(OpCode::NewFragment);
            }
            TypeInfo::Struct(_) => self.emit_struct(ty, &[])?,
            TypeInfo::Procedure(_) => {
                return Err(Error::internal(format!(
                    "procedure type {} has no zero value",
                    registry.display(ty)
                )));
            }
        }
        Ok(())
    }

    fn operator_opcode(&self, op: Operator, operand_ty: Option<TypeId>) -> Result<OpCode> {
        match op {
            Operator::And => return Ok(OpCode::And),
            Operator::Or => return Ok(OpCode::Or),
            Operator::Not => return Ok(OpCode::Not),
            _ => {}
        }
        let ty = operand_ty.ok_or_else(|| unset(&format!("operands of \"{}\"", op)))?;
        let opcode = match (op, ty) {
            (Operator::Add, TypeId::INT) => OpCode::AddInt,
            (Operator::Subtract, TypeId::INT) => OpCode::SubInt,
            (Operator::Multiply, TypeId::INT) => OpCode::MulInt,
            (Operator::Divide, TypeId::INT) => OpCode::DivInt,
            (Operator::Modulo, TypeId::INT) => OpCode::ModInt,
            (Operator::Add, TypeId::FLOAT) => OpCode::AddFloat,
            (Operator::Subtract, TypeId::FLOAT) => OpCode::SubFloat,
            (Operator::Multiply, TypeId::FLOAT) => OpCode::MulFloat,
            (Operator::Divide, TypeId::FLOAT) => OpCode::DivFloat,
            (Operator::Add, TypeId::STRING) => OpCode::ConcatString,

            (Operator::Equal, TypeId::INT) => OpCode::EqInt,
            (Operator::NotEqual, TypeId::INT) => OpCode::NeInt,
            (Operator::Less, TypeId::INT) => OpCode::LtInt,
            (Operator::LessEqual, TypeId::INT) => OpCode::LeInt,
            (Operator::Greater, TypeId::INT) => OpCode::GtInt,
            (Operator::GreaterEqual, TypeId::INT) => OpCode::GeInt,
            (Operator::Equal, TypeId::FLOAT) => OpCode::EqFloat,
            (Operator::NotEqual, TypeId::FLOAT) => OpCode::NeFloat,
            (Operator::Less, TypeId::FLOAT) => OpCode::LtFloat,
            (Operator::LessEqual, TypeId::FLOAT) => OpCode::LeFloat,
            (Operator::Greater, TypeId::FLOAT) => OpCode::GtFloat,
            (Operator::GreaterEqual, TypeId::FLOAT) => OpCode::GeFloat,
            (Operator::Equal, TypeId::STRING) => OpCode::EqString,
            (Operator::NotEqual, TypeId::STRING) => OpCode::NeString,
            (Operator::Equal, TypeId::BOOL) => OpCode::EqBool,
            (Operator::NotEqual, TypeId::BOOL) => OpCode::NeBool,
            _ => {
                return Err(Error::internal(format!(
                    "no instruction for \"{}\" on {}",
                    op,
                    self.registry.display(ty)
                )));
            }
        };
        Ok(opcode)
    }
}
