//! Terse AST constructors.
//!
//! Every node built here sits at line 0 unless a constructor takes a line.
//!
//! ```rust
//! use tessel_compiler::ast::build::*;
//!
//! // x := 1 + 2
//! let stmt = declare("x", expr(vec![int(1), int(2), add()]));
//! ```

use super::*;

/// A location on `line`.
pub fn loc(line: usize) -> Location {
    Location::new(line)
}

/// A non-array type identifier.
pub fn ty(name: &str) -> TypeIdent {
    array_ty(name, 0)
}

/// A type identifier with `depth` array levels.
pub fn array_ty(name: &str, depth: u8) -> TypeIdent {
    TypeIdent {
        name: name.to_string(),
        array_depth: depth,
    }
}

/// A postfix expression.
pub fn expr(nodes: Vec<ExprNode>) -> Expression {
    Expression {
        nodes,
        location: Location::default(),
        ty: None,
        operand_ty: None,
    }
}

/// A postfix expression on `line`.
pub fn expr_at(line: usize, nodes: Vec<ExprNode>) -> Expression {
    Expression {
        location: loc(line),
        ..expr(nodes)
    }
}

/// A quoted text literal.
pub fn text(value: &str) -> ExprNode {
    ExprNode::Literal(Literal {
        kind: LiteralKind::Text,
        value: value.to_string(),
    })
}

/// An integer literal.
pub fn int(value: i64) -> ExprNode {
    ExprNode::Literal(Literal {
        kind: LiteralKind::Number,
        value: value.to_string(),
    })
}

/// A float literal, written as it appears in source (`"1.5"`).
pub fn float(value: &str) -> ExprNode {
    ExprNode::Literal(Literal {
        kind: LiteralKind::Number,
        value: value.to_string(),
    })
}

/// `true` or `false`.
pub fn boolean(value: bool) -> ExprNode {
    ExprNode::Literal(Literal {
        kind: LiteralKind::Bool,
        value: value.to_string(),
    })
}

/// A variable reference; dots separate a field path.
pub fn ident(path: &str) -> ExprNode {
    ExprNode::Identifier(Identifier {
        path: path.split('.').map(str::to_string).collect(),
        ty: None,
    })
}

/// An operator node.
pub fn op(operator: Operator) -> ExprNode {
    ExprNode::Operator(operator)
}

/// `+`
pub fn add() -> ExprNode {
    op(Operator::Add)
}

/// A call without children.
pub fn call(name: &str, arguments: Vec<Argument>) -> ExprNode {
    call_with_children(name, arguments, Vec::new())
}

/// A component invocation with a children body.
pub fn call_with_children(name: &str, arguments: Vec<Argument>, children: Vec<Statement>) -> ExprNode {
    ExprNode::Call(Call {
        name: name.to_string(),
        arguments,
        children,
        location: Location::default(),
        kind: None,
    })
}

/// A call on `line`.
pub fn call_at(line: usize, name: &str, arguments: Vec<Argument>) -> ExprNode {
    ExprNode::Call(Call {
        name: name.to_string(),
        arguments,
        children: Vec::new(),
        location: loc(line),
        kind: None,
    })
}

/// A positional argument.
pub fn arg(value: Expression) -> Argument {
    Argument { name: None, value }
}

/// A named argument.
pub fn named(name: &str, value: Expression) -> Argument {
    Argument {
        name: Some(name.to_string()),
        value,
    }
}

/// `Name{field = e, ...}`
pub fn struct_lit(name: &str, fields: Vec<(&str, Expression)>) -> ExprNode {
    ExprNode::StructLiteral(StructLiteral {
        name: name.to_string(),
        fields: fields
            .into_iter()
            .map(|(name, value)| FieldInit {
                name: name.to_string(),
                value,
            })
            .collect(),
        ty: None,
    })
}

/// `[]T{e, ...}`
pub fn array_lit(element: TypeIdent, elements: Vec<Expression>) -> ExprNode {
    ExprNode::ArrayLiteral(ArrayLiteral {
        element,
        elements,
        ty: None,
    })
}

/// `name := value`
pub fn declare(name: &str, value: Expression) -> Statement {
    Statement::Declaration(Declaration {
        name: name.to_string(),
        type_ident: None,
        value: Some(value),
        location: Location::default(),
        ty: None,
    })
}

/// `name : T = value` or `name : T`
pub fn declare_typed(name: &str, type_ident: TypeIdent, value: Option<Expression>) -> Statement {
    Statement::Declaration(Declaration {
        name: name.to_string(),
        type_ident: Some(type_ident),
        value,
        location: Location::default(),
        ty: None,
    })
}

/// `a.b = value`
pub fn assign(target: &str, value: Expression) -> Statement {
    Statement::Assignment(Assignment {
        target: target.split('.').map(str::to_string).collect(),
        value,
        location: Location::default(),
    })
}

/// `a.b []= value`
pub fn append(target: &str, value: Expression) -> Statement {
    Statement::ArrayAppend(ArrayAppend {
        target: target.split('.').map(str::to_string).collect(),
        value,
        location: Location::default(),
    })
}

/// `if condition { then } else { otherwise }`
pub fn if_else(condition: Expression, then_branch: Vec<Statement>, else_branch: Vec<Statement>) -> Statement {
    Statement::If(IfStatement {
        condition,
        then_branch,
        else_branch,
        location: Location::default(),
    })
}

/// `for index, item in array { body }`
pub fn for_in(index: Option<&str>, item: &str, array: Expression, body: Vec<Statement>) -> Statement {
    Statement::For(ForStatement {
        index: index.map(str::to_string),
        item: item.to_string(),
        array,
        body,
        location: Location::default(),
        item_ty: None,
    })
}

/// `return value`
pub fn ret(value: Option<Expression>) -> Statement {
    Statement::Return(ReturnStatement {
        value,
        location: Location::default(),
    })
}

/// A bare expression statement.
pub fn stmt(expression: Expression) -> Statement {
    Statement::Expression(expression)
}

/// `tag(attr = value) { children }`
pub fn element(tag: &str, attributes: Vec<(&str, Expression)>, children: Vec<Statement>) -> Statement {
    Statement::Html(HtmlElement {
        tag: tag.to_string(),
        attributes: attributes
            .into_iter()
            .map(|(name, value)| HtmlAttribute {
                name: name.to_string(),
                value,
            })
            .collect(),
        children,
        location: Location::default(),
    })
}

/// A procedure definition.
pub fn procedure(
    name: &str,
    parameters: Vec<(&str, TypeIdent)>,
    returns: Option<TypeIdent>,
    body: Vec<Statement>,
) -> ProcedureDefinition {
    ProcedureDefinition {
        name: name.to_string(),
        parameters: parameters
            .into_iter()
            .map(|(name, type_ident)| Parameter {
                name: name.to_string(),
                type_ident,
                location: Location::default(),
                ty: None,
            })
            .collect(),
        returns,
        body,
        location: Location::default(),
        ty: None,
    }
}

/// A struct field with an optional type and default.
pub fn field(name: &str, type_ident: Option<TypeIdent>, default: Option<Expression>) -> StructField {
    StructField {
        name: name.to_string(),
        type_ident,
        default,
        location: Location::default(),
        ty: None,
        index: 0,
    }
}

/// A struct definition.
pub fn struct_def(name: &str, fields: Vec<StructField>) -> StructDefinition {
    StructDefinition {
        name: name.to_string(),
        fields,
        location: Location::default(),
        ty: None,
    }
}

/// A named component. `properties` becomes the nested property struct.
pub fn component(name: &str, properties: Option<Vec<StructField>>, body: Vec<Statement>) -> HtmlComponentDefinition {
    HtmlComponentDefinition {
        name: Some(name.to_string()),
        properties: properties.map(|fields| struct_def(name, fields)),
        body,
        ..HtmlComponentDefinition::default()
    }
}

/// A CSS rule.
pub fn rule(selectors: &[&str], declarations: &[(&str, &str)]) -> CssRule {
    CssRule {
        selectors: selectors.iter().map(|s| s.to_string()).collect(),
        declarations: declarations
            .iter()
            .map(|(property, value)| CssDeclaration {
                property: property.to_string(),
                value: value.to_string(),
            })
            .collect(),
        location: Location::default(),
    }
}

/// A CSS definition; named ones attach to the component of that name.
pub fn css(name: Option<&str>, rules: Vec<CssRule>) -> CssDefinition {
    CssDefinition {
        name: name.map(str::to_string),
        rules,
        location: Location::default(),
    }
}

/// A CSS config definition.
pub fn css_config(name: Option<&str>, unscoped_classes: &[&str]) -> CssConfigDefinition {
    CssConfigDefinition {
        name: name.map(str::to_string),
        unscoped_classes: unscoped_classes.iter().map(|s| s.to_string()).collect(),
        location: Location::default(),
    }
}

/// A workspace definition.
pub fn workspace(name: &str, body: Vec<Statement>) -> WorkspaceDefinition {
    WorkspaceDefinition {
        name: name.to_string(),
        body,
        location: Location::default(),
    }
}

/// A plain source file.
pub fn file(path: &str, items: Vec<Item>) -> SourceFile {
    SourceFile {
        path: path.to_string(),
        template: false,
        items,
    }
}

/// A template source file.
pub fn template(path: &str, items: Vec<Item>) -> SourceFile {
    SourceFile {
        template: true,
        ..file(path, items)
    }
}

impl From<ProcedureDefinition> for Item {
    fn from(def: ProcedureDefinition) -> Self {
        Item::Definition(Definition::Procedure(def))
    }
}

impl From<StructDefinition> for Item {
    fn from(def: StructDefinition) -> Self {
        Item::Definition(Definition::Struct(def))
    }
}

impl From<HtmlComponentDefinition> for Item {
    fn from(def: HtmlComponentDefinition) -> Self {
        Item::Definition(Definition::Component(def))
    }
}

impl From<CssDefinition> for Item {
    fn from(def: CssDefinition) -> Self {
        Item::Definition(Definition::Css(def))
    }
}

impl From<CssConfigDefinition> for Item {
    fn from(def: CssConfigDefinition) -> Self {
        Item::Definition(Definition::CssConfig(def))
    }
}

impl From<WorkspaceDefinition> for Item {
    fn from(def: WorkspaceDefinition) -> Self {
        Item::Definition(Definition::Workspace(def))
    }
}

impl From<Statement> for Item {
    fn from(statement: Statement) -> Self {
        Item::Statement(statement)
    }
}
