//! Element and component invocation lowering.

use super::Emitter;
use crate::Error;
use crate::ast::{Call, HtmlElement};
use crate::compiler::bytecode::{OpCode, Operand};
use crate::error::Result;

impl Emitter<'_> {
    /// Builds an element and appends it to the html value below it.
    pub(super) fn compile_element(&mut self, element: &HtmlElement) -> Result<()> {
        self.emit_with(OpCode::NewElement, Operand::Text(element.tag.clone()));
        self.tags.push(element.tag.clone());

        for attribute in &element.attributes {
            self.emit_expression(&attribute.value)?;
            if attribute.name == "class" {
                if let Some(scope) = &self.class_scope {
                    let operand = Operand::ClassScope(scope.clone());
                    self.emit_with(OpCode::ScopeClasses, operand);
                }
            }
            self.emit_with(OpCode::SetAttribute, Operand::Text(attribute.name.clone()));
        }

        self.compile_block(&element.children, true)?;
        self.emit_simple(OpCode::AppendChild);
        self.tags.pop();
        Ok(())
    }

    /// Pushes the children fragment and every property in declaration
    /// order, then calls the component block.
    pub(super) fn emit_component_call(&mut self, call: &Call) -> Result<()> {
        let properties = self
            .components
            .get(call.name.as_str())
            .copied()
            .ok_or_else(|| Error::internal(format!("\"{}\" is not a component", call.name)))?;
        let id = self.block_id(&call.name)?;

        self.emit_simple(OpCode::NewFragment);
        self.compile_block(&call.children, true)?;

        let st = self.struct_type(properties)?;
        for (index, field) in st.fields.iter().enumerate() {
            let argument = call
                .arguments
                .iter()
                .find(|argument| argument.name.as_deref() == Some(field.name.as_str()));
            match argument {
                Some(argument) => self.emit_expression(&argument.value)?,
                None => match self.field_default(properties, index) {
                    Some(default) => self.emit_default(properties, index, default)?,
                    None => self.emit_zero(field.ty)?,
                },
            }
        }
        self.emit_with(OpCode::Call, Operand::Block(id));
        Ok(())
    }
}
