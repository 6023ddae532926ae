//! Statement checking.

use super::{Context, Typer};
use crate::ast::{Expression, ExprNode, ForStatement, HtmlElement, ReturnStatement, Statement};
use crate::types::TypeId;

/// Element names accepted in HTML literals. Names containing `-` are
/// accepted as custom elements.
const HTML_ELEMENTS: &[&str] = &[
    "a", "abbr", "address", "area", "article", "aside", "audio", "b", "base", "bdi", "bdo",
    "blockquote", "body", "br", "button", "canvas", "caption", "cite", "code", "col", "colgroup",
    "data", "datalist", "dd", "del", "details", "dfn", "dialog", "div", "dl", "dt", "em", "embed",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "head", "header", "hgroup", "hr", "html", "i", "iframe", "img", "input", "ins", "kbd", "label",
    "legend", "li", "link", "main", "map", "mark", "menu", "meta", "meter", "nav", "noscript",
    "object", "ol", "optgroup", "option", "output", "p", "picture", "pre", "progress", "q", "rp",
    "rt", "ruby", "s", "samp", "script", "search", "section", "select", "slot", "small", "source",
    "span", "strong", "style", "sub", "summary", "sup", "svg", "table", "tbody", "td", "template",
    "textarea", "tfoot", "th", "thead", "time", "title", "tr", "track", "u", "ul", "var", "video",
    "wbr",
];

/// Whether `tag` names a known or custom HTML element.
pub(crate) fn is_known_element(tag: &str) -> bool {
    HTML_ELEMENTS.contains(&tag)
        || (tag.contains('-') && tag.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'))
}

/// Whether every path through `body` ends in a `return`.
pub(crate) fn always_returns(body: &[Statement]) -> bool {
    body.iter().any(|statement| match statement {
        Statement::Return(_) => true,
        Statement::If(stmt) => always_returns(&stmt.then_branch) && always_returns(&stmt.else_branch),
        Statement::Block(inner) => always_returns(inner),
        _ => false,
    })
}

impl Typer<'_> {
    pub(crate) fn check_statements(&mut self, body: &mut [Statement], context: Context) {
        for statement in body.iter_mut() {
            self.check_statement(statement, context);
        }
    }

    pub(crate) fn check_statement(&mut self, statement: &mut Statement, context: Context) {
        match statement {
            Statement::Declaration(decl) => {
                let line = decl.location.line;
                let declared = match &decl.type_ident {
                    Some(ident) => match self.resolve_type(ident, line) {
                        Some(ty) => Some(ty),
                        None => return,
                    },
                    None => None,
                };
                let value_ty = match &mut decl.value {
                    Some(value) => self.check_expression(value, declared),
                    None => None,
                };
                if decl.type_ident.is_none() && decl.value.is_none() {
                    self.error(line, format!("\"{}\" needs a type or a value", decl.name));
                }
                let Some(ty) = declared.or(value_ty) else {
                    return;
                };
                decl.ty = Some(ty);
                self.bind_variable(&decl.name, ty, line);
            }
            Statement::Assignment(assignment) => {
                let line = assignment.location.line;
                if let Some(ty) = self.resolve_path(&assignment.target, line) {
                    self.check_expression(&mut assignment.value, Some(ty));
                }
            }
            Statement::ArrayAppend(append) => {
                let line = append.location.line;
                let Some(ty) = self.resolve_path(&append.target, line) else {
                    return;
                };
                match self.registry.element(ty) {
                    Some(element) => {
                        self.check_expression(&mut append.value, Some(element));
                    }
                    None => self.error(
                        line,
                        format!("\"{}\" is not an array", append.target.join(".")),
                    ),
                }
            }
            Statement::If(stmt) => {
                self.check_expression(&mut stmt.condition, Some(TypeId::BOOL));
                self.in_scope(|typer| typer.check_statements(&mut stmt.then_branch, context));
                self.in_scope(|typer| typer.check_statements(&mut stmt.else_branch, context));
            }
            Statement::For(stmt) => self.check_for(stmt, context),
            Statement::Return(stmt) => self.check_return(stmt, context),
            Statement::Expression(expr) => self.check_expression_statement(expr, context),
            Statement::Html(element) => self.check_element(element, context),
            Statement::Block(inner) => {
                self.in_scope(|typer| typer.check_statements(inner, context));
            }
        }
    }

    fn check_for(&mut self, stmt: &mut ForStatement, context: Context) {
        let line = stmt.location.line;
        let Some(array) = self.check_expression(&mut stmt.array, None) else {
            return;
        };
        let Some(element) = self.registry.element(array) else {
            let message = format!("cannot iterate over {}", self.registry.display(array));
            self.error(line, message);
            return;
        };
        stmt.item_ty = Some(element);
        self.in_scope(|typer| {
            if let Some(index) = &stmt.index {
                typer.bind_variable(index, TypeId::INT, line);
            }
            typer.bind_variable(&stmt.item, element, line);
            typer.check_statements(&mut stmt.body, context);
        });
    }

    fn check_return(&mut self, stmt: &mut ReturnStatement, context: Context) {
        let line = stmt.location.line;
        let Some(returns) = context.procedure else {
            self.error(line, "return outside of a procedure");
            return;
        };
        match (returns, &mut stmt.value) {
            (Some(ty), Some(value)) => {
                self.check_expression(value, Some(ty));
            }
            (Some(ty), None) => {
                let message = format!("missing return value of type {}", self.registry.display(ty));
                self.error(line, message);
            }
            (None, Some(_)) => self.error(line, "procedure does not return a value"),
            (None, None) => {}
        }
    }

    fn check_expression_statement(&mut self, expr: &mut Expression, context: Context) {
        let line = expr.location.line;
        if let [ExprNode::Call(call)] = expr.nodes.as_mut_slice() {
            let Some(returns) = self.check_call(call) else {
                return;
            };
            expr.ty = returns;
            expr.operand_ty = returns;
            if let (true, Some(ty)) = (context.html, returns) {
                self.check_renderable(ty, line);
            }
            return;
        }
        if !context.html {
            self.error(line, "expression result is unused");
            return;
        }
        if let Some(ty) = self.check_expression(expr, None) {
            self.check_renderable(ty, line);
        }
    }

    fn check_renderable(&mut self, ty: TypeId, line: usize) {
        if ty != TypeId::HTML_NODE && !self.registry.is_primitive(ty) {
            let message = format!("cannot render a value of type {}", self.registry.display(ty));
            self.error(line, message);
        }
    }

    fn check_element(&mut self, element: &mut HtmlElement, context: Context) {
        let line = element.location.line;
        if !context.html {
            self.error(
                line,
                format!("element \"{}\" is only allowed in components and templates", element.tag),
            );
            return;
        }
        if !is_known_element(&element.tag) {
            self.error(line, format!("invalid element name \"{}\"", element.tag));
        }
        for attribute in element.attributes.iter_mut() {
            let expected = (attribute.name == "class").then_some(TypeId::STRING);
            let Some(ty) = self.check_expression(&mut attribute.value, expected) else {
                continue;
            };
            if !self.registry.is_primitive(ty) {
                let message = format!(
                    "attribute \"{}\" must be a primitive value, got {}",
                    attribute.name,
                    self.registry.display(ty)
                );
                self.error(line, message);
            }
        }
        self.in_scope(|typer| typer.check_statements(&mut element.children, context));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;

    #[test]
    fn test_known_elements() {
        assert!(is_known_element("div"));
        assert!(is_known_element("my-widget"));
        assert!(!is_known_element("dvi"));
        assert!(!is_known_element("My-Widget"));
    }

    #[test]
    fn test_always_returns() {
        assert!(always_returns(&[ret(Some(expr(vec![int(1)])))]));
        assert!(!always_returns(&[if_else(
            expr(vec![boolean(true)]),
            vec![ret(Some(expr(vec![int(1)])))],
            vec![],
        )]));
        assert!(always_returns(&[if_else(
            expr(vec![boolean(true)]),
            vec![ret(Some(expr(vec![int(1)])))],
            vec![Statement::Block(vec![ret(Some(expr(vec![int(2)])))])],
        )]));
    }
}
