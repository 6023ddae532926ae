//! Expression typing.
//!
//! Expressions arrive in postfix order. One left-to-right pass keeps a stack
//! of operand types and a single running expectation: the declared type when
//! the expression has no comparison, otherwise the first operand's type.

use super::{Context, Symbol, Typer};
use crate::ast::{
    ArrayLiteral, Call, CallKind, Expression, ExprNode, Literal, LiteralKind, Operator, StructLiteral,
};
use crate::types::{Signature, TypeId};

/// The type of a literal token.
pub(crate) fn literal_type(literal: &Literal) -> Result<TypeId, String> {
    match literal.kind {
        LiteralKind::Text => Ok(TypeId::STRING),
        LiteralKind::Number if literal.value.contains('.') => literal
            .value
            .parse::<f64>()
            .map(|_| TypeId::FLOAT)
            .map_err(|_| format!("invalid number literal \"{}\"", literal.value)),
        LiteralKind::Number => literal
            .value
            .parse::<i64>()
            .map(|_| TypeId::INT)
            .map_err(|_| format!("invalid number literal \"{}\"", literal.value)),
        LiteralKind::Bool => match literal.value.as_str() {
            "true" | "false" => Ok(TypeId::BOOL),
            other => Err(format!("invalid boolean literal \"{}\"", other)),
        },
    }
}

impl Typer<'_> {
    /// Types `expr`, checking it against `expected` when given. Returns the
    /// result type, or `None` after reporting an error.
    pub(crate) fn check_expression(&mut self, expr: &mut Expression, expected: Option<TypeId>) -> Option<TypeId> {
        let line = expr.location.line;
        if expr.nodes.is_empty() {
            self.error(line, "malformed expression: nothing to evaluate");
            return None;
        }
        let has_comparison = expr
            .nodes
            .iter()
            .any(|node| matches!(node, ExprNode::Operator(op) if op.is_comparison()));

        let mut expectation = if has_comparison { None } else { expected };
        let mut operand_ty: Option<TypeId> = None;
        let mut stack: Vec<TypeId> = Vec::new();

        for node in expr.nodes.iter_mut() {
            if let ExprNode::Operator(op) = node {
                let op = *op;
                if stack.len() < op.arity() {
                    self.error(line, format!("malformed expression: \"{}\" is missing an operand", op));
                    return None;
                }
                let operands = stack.split_off(stack.len() - op.arity());
                let result = self.check_operator(op, &operands, operand_ty?, line)?;
                stack.push(result);
                continue;
            }

            let ty = self.check_operand(node, line)?;
            match expectation {
                Some(expected) if !self.registry.type_equals(expected, ty) => {
                    self.mismatch(line, expected, ty);
                    return None;
                }
                Some(_) => {}
                None => expectation = Some(ty),
            }
            operand_ty.get_or_insert(ty);
            stack.push(ty);
        }

        let [result] = stack.as_slice() else {
            self.error(line, "malformed expression: operands are left without an operator");
            return None;
        };
        let result = *result;
        if has_comparison {
            if let Some(expected) = expected {
                if !self.registry.type_equals(expected, result) {
                    self.mismatch(line, expected, result);
                    return None;
                }
            }
        }
        expr.ty = Some(result);
        expr.operand_ty = operand_ty;
        Some(result)
    }

    fn check_operator(&mut self, op: Operator, operands: &[TypeId], operand_ty: TypeId, line: usize) -> Option<TypeId> {
        let required = match op {
            Operator::And | Operator::Or | Operator::Not => TypeId::BOOL,
            _ => operand_ty,
        };
        for ty in operands {
            if !self.registry.type_equals(required, *ty) {
                self.mismatch(line, required, *ty);
                return None;
            }
        }
        let supported = match op {
            Operator::Add => matches!(required, TypeId::INT | TypeId::FLOAT | TypeId::STRING),
            Operator::Subtract | Operator::Multiply | Operator::Divide => {
                matches!(required, TypeId::INT | TypeId::FLOAT)
            }
            Operator::Modulo => required == TypeId::INT,
            Operator::Less | Operator::LessEqual | Operator::Greater | Operator::GreaterEqual => {
                matches!(required, TypeId::INT | TypeId::FLOAT)
            }
            Operator::Equal | Operator::NotEqual => self.registry.is_primitive(required),
            Operator::And | Operator::Or | Operator::Not => true,
        };
        if !supported {
            let message = format!(
                "operator \"{}\" cannot be applied to {}",
                op,
                self.registry.display(required)
            );
            self.error(line, message);
            return None;
        }
        Some(if op.is_comparison() { TypeId::BOOL } else { required })
    }

    fn check_operand(&mut self, node: &mut ExprNode, line: usize) -> Option<TypeId> {
        match node {
            ExprNode::Literal(literal) => match literal_type(literal) {
                Ok(ty) => Some(ty),
                Err(message) => {
                    self.error(line, message);
                    None
                }
            },
            ExprNode::Identifier(identifier) => {
                let ty = self.resolve_path(&identifier.path, line)?;
                identifier.ty = Some(ty);
                Some(ty)
            }
            ExprNode::Call(call) => match self.check_call(call)? {
                Some(ty) => Some(ty),
                None => {
                    self.error(
                        call.location.line,
                        format!("procedure \"{}\" does not return a value", call.name),
                    );
                    None
                }
            },
            ExprNode::StructLiteral(literal) => self.check_struct_literal(literal, line),
            ExprNode::ArrayLiteral(literal) => self.check_array_literal(literal, line),
            ExprNode::Operator(op) => {
                self.error(line, format!("malformed expression: unexpected \"{}\"", op));
                None
            }
        }
    }

    /// Resolves `a.b.c` to the type of the last segment.
    pub(crate) fn resolve_path(&mut self, path: &[String], line: usize) -> Option<TypeId> {
        let Some((first, rest)) = path.split_first() else {
            self.error(line, "malformed expression: empty identifier");
            return None;
        };
        let mut ty = match self.scope.get_symbol(first) {
            Some(Symbol::Variable(ty)) if self.registry.signature(ty).is_some() => {
                self.error(line, format!("procedure \"{}\" cannot be used as a value", first));
                return None;
            }
            Some(Symbol::Variable(ty)) => ty,
            Some(_) => {
                self.error(line, format!("\"{}\" is not a variable", first));
                return None;
            }
            None => {
                self.error(line, format!("\"{}\" is not declared", first));
                return None;
            }
        };
        for segment in rest {
            let field = self
                .registry
                .struct_type(ty)
                .and_then(|st| st.field(segment))
                .map(|(_, field)| field.ty);
            match field {
                Some(field) => ty = field,
                None => {
                    let message = format!("\"{}\" is not a field on {}", segment, self.registry.display(ty));
                    self.error(line, message);
                    return None;
                }
            }
        }
        Some(ty)
    }

    /// Checks a call and returns its result type: `Some(None)` for a
    /// procedure without a return value, `None` after an error.
    pub(crate) fn check_call(&mut self, call: &mut Call) -> Option<Option<TypeId>> {
        let line = call.location.line;
        match self.scope.get_symbol(&call.name) {
            Some(Symbol::Variable(ty)) => match self.registry.signature(ty).cloned() {
                Some(signature) => self.check_procedure_call(call, &signature),
                None => {
                    self.error(line, format!("\"{}\" is not callable", call.name));
                    None
                }
            },
            Some(Symbol::HtmlComponentDefinition { properties, .. }) => {
                self.check_component_call(call, properties)
            }
            Some(_) => {
                self.error(line, format!("\"{}\" is not callable", call.name));
                None
            }
            None => {
                self.error(line, format!("\"{}\" is not declared", call.name));
                None
            }
        }
    }

    fn check_procedure_call(&mut self, call: &mut Call, signature: &Signature) -> Option<Option<TypeId>> {
        let line = call.location.line;
        let mut ok = true;
        if !call.children.is_empty() {
            self.error(line, format!("procedure \"{}\" does not take children", call.name));
            ok = false;
        }
        if call.arguments.len() != signature.params.len() {
            self.error(
                line,
                format!(
                    "procedure \"{}\" expects {} argument(s) but got {}",
                    call.name,
                    signature.params.len(),
                    call.arguments.len()
                ),
            );
            return None;
        }
        for (argument, param) in call.arguments.iter_mut().zip(&signature.params) {
            if let Some(name) = &argument.name {
                self.error(
                    line,
                    format!("named argument \"{}\" in call to procedure \"{}\"", name, call.name),
                );
                ok = false;
                continue;
            }
            if self.check_expression(&mut argument.value, Some(*param)).is_none() {
                ok = false;
            }
        }
        call.kind = Some(CallKind::Procedure {
            returns: signature.returns,
        });
        ok.then_some(signature.returns)
    }

    fn check_component_call(&mut self, call: &mut Call, properties: TypeId) -> Option<Option<TypeId>> {
        let line = call.location.line;
        let fields = self
            .registry
            .struct_type(properties)
            .map(|st| st.fields.clone())
            .unwrap_or_default();
        let mut ok = true;
        let mut seen: Vec<String> = Vec::new();
        for argument in call.arguments.iter_mut() {
            let Some(name) = argument.name.clone() else {
                self.error(line, format!("arguments to component \"{}\" must be named", call.name));
                ok = false;
                continue;
            };
            let Some(field) = fields.iter().find(|field| field.name == name) else {
                self.error(line, format!("\"{}\" is not a property on {}", name, call.name));
                ok = false;
                continue;
            };
            if seen.contains(&name) {
                self.error(line, format!("property \"{}\" is given more than once", name));
                ok = false;
                continue;
            }
            seen.push(name);
            if self.check_expression(&mut argument.value, Some(field.ty)).is_none() {
                ok = false;
            }
        }

        self.in_scope(|typer| typer.check_statements(&mut call.children, Context::html()));

        self.used.insert(call.name.clone());
        if let Some(current) = &self.current_component {
            self.dependencies
                .entry(current.clone())
                .or_default()
                .entry(call.name.clone())
                .or_insert(call.location);
        }
        call.kind = Some(CallKind::Component);
        ok.then_some(Some(TypeId::HTML_NODE))
    }

    fn check_struct_literal(&mut self, literal: &mut StructLiteral, line: usize) -> Option<TypeId> {
        let ty = match self.scope.get_symbol(&literal.name) {
            Some(Symbol::StructDefinition { ty, .. }) => ty,
            _ => {
                self.error(line, format!("unknown struct \"{}\"", literal.name));
                return None;
            }
        };
        let fields = self
            .registry
            .struct_type(ty)
            .map(|st| st.fields.clone())
            .unwrap_or_default();
        let mut ok = true;
        let mut seen: Vec<&str> = Vec::new();
        for init in literal.fields.iter_mut() {
            let Some(field) = fields.iter().find(|field| field.name == init.name) else {
                self.error(line, format!("\"{}\" is not a field on {}", init.name, literal.name));
                ok = false;
                continue;
            };
            if seen.contains(&field.name.as_str()) {
                self.error(line, format!("field \"{}\" is given more than once", init.name));
                ok = false;
                continue;
            }
            seen.push(&field.name);
            if self.check_expression(&mut init.value, Some(field.ty)).is_none() {
                ok = false;
            }
        }
        literal.ty = Some(ty);
        ok.then_some(ty)
    }

    fn check_array_literal(&mut self, literal: &mut ArrayLiteral, line: usize) -> Option<TypeId> {
        let element = self.resolve_type(&literal.element, line)?;
        let ty = self.registry.array_of(element);
        let mut ok = true;
        for value in literal.elements.iter_mut() {
            if self.check_expression(value, Some(element)).is_none() {
                ok = false;
            }
        }
        literal.ty = Some(ty);
        ok.then_some(ty)
    }
}
