//! Abstract Syntax Tree (AST) definitions.
//!
//! The tree is produced by an upstream parser, either directly through the
//! [`build`] constructors or as JSON through serde. Fields marked
//! `#[serde(skip)]` are annotations written by the typer and read by the
//! emitter; they are never part of the interchange format.

pub mod build;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::TypeId;

/// A source position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    /// 1-based line number
    pub line: usize,
}

impl Location {
    /// Creates a location on `line`.
    pub fn new(line: usize) -> Self {
        Self { line }
    }
}

/// Locates a top-level item: `files[file].items[item]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DefRef {
    /// Index of the source file
    pub file: usize,
    /// Index of the item within that file
    pub item: usize,
}

/// One parsed source file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path used to key diagnostics
    pub path: String,
    /// Template files render their top-level statements into an HTML fragment
    #[serde(default)]
    pub template: bool,
    /// Top-level items in source order
    #[serde(default)]
    pub items: Vec<Item>,
}

impl SourceFile {
    /// The top-level definition at `index`, if that item is one.
    pub fn definition(&self, index: usize) -> Option<&Definition> {
        match self.items.get(index) {
            Some(Item::Definition(def)) => Some(def),
            _ => None,
        }
    }
}

/// A top-level item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Item {
    /// `Name :: kind { ... }`
    Definition(Definition),
    /// A file-level statement
    Statement(Statement),
}

/// A named top-level definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Definition {
    /// `name :: (params) returns { body }`
    Procedure(ProcedureDefinition),
    /// `Name :: struct { fields }`
    Struct(StructDefinition),
    /// `Name :: html { ... }`
    Component(HtmlComponentDefinition),
    /// `Name :: css { ... }`
    Css(CssDefinition),
    /// `Name :: css_config { ... }`
    CssConfig(CssConfigDefinition),
    /// `Name :: workspace { ... }`
    Workspace(WorkspaceDefinition),
}

impl Definition {
    /// The declared name, if the definition has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Definition::Procedure(def) => Some(&def.name),
            Definition::Struct(def) => Some(&def.name),
            Definition::Component(def) => def.name.as_deref(),
            Definition::Css(def) => def.name.as_deref(),
            Definition::CssConfig(def) => def.name.as_deref(),
            Definition::Workspace(def) => Some(&def.name),
        }
    }

    /// Where the definition starts.
    pub fn location(&self) -> Location {
        match self {
            Definition::Procedure(def) => def.location,
            Definition::Struct(def) => def.location,
            Definition::Component(def) => def.location,
            Definition::Css(def) => def.location,
            Definition::CssConfig(def) => def.location,
            Definition::Workspace(def) => def.location,
        }
    }
}

/// A type identifier such as `int` or `[]Config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeIdent {
    /// Base type name
    pub name: String,
    /// Number of `[]` prefixes
    #[serde(default)]
    pub array_depth: u8,
}

impl fmt::Display for TypeIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.array_depth {
            write!(f, "[]")?;
        }
        write!(f, "{}", self.name)
    }
}

/// A procedure parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub type_ident: TypeIdent,
    /// Source location
    #[serde(default)]
    pub location: Location,
    /// Resolved type
    #[serde(skip)]
    pub ty: Option<TypeId>,
}

/// A procedure definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureDefinition {
    /// Procedure name
    pub name: String,
    /// Parameters in order
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Declared return type
    #[serde(default)]
    pub returns: Option<TypeIdent>,
    /// Body
    #[serde(default)]
    pub body: Vec<Statement>,
    /// Source location
    #[serde(default)]
    pub location: Location,
    /// Resolved procedure type
    #[serde(skip)]
    pub ty: Option<TypeId>,
}

/// A struct field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    /// Field name
    pub name: String,
    /// Declared type; inferred from the default when absent
    #[serde(default)]
    pub type_ident: Option<TypeIdent>,
    /// Default value expression
    #[serde(default)]
    pub default: Option<Expression>,
    /// Source location
    #[serde(default)]
    pub location: Location,
    /// Resolved type
    #[serde(skip)]
    pub ty: Option<TypeId>,
    /// Positional index, used directly as the bytecode field operand
    #[serde(skip)]
    pub index: usize,
}

/// A struct definition, top-level or the property block of a component.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StructDefinition {
    /// Struct name (the component name for property blocks)
    #[serde(default)]
    pub name: String,
    /// Fields in declaration order
    #[serde(default)]
    pub fields: Vec<StructField>,
    /// Source location
    #[serde(default)]
    pub location: Location,
    /// Resolved struct type
    #[serde(skip)]
    pub ty: Option<TypeId>,
}

/// An HTML component definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HtmlComponentDefinition {
    /// Component name; anonymous components cannot be invoked
    #[serde(default)]
    pub name: Option<String>,
    /// The nested `:: struct { ... }` property block
    #[serde(default)]
    pub properties: Option<StructDefinition>,
    /// A nested `:: css { ... }` block
    #[serde(default)]
    pub css: Option<CssDefinition>,
    /// A nested `:: css_config { ... }` block
    #[serde(default)]
    pub css_config: Option<CssConfigDefinition>,
    /// Body statements
    #[serde(default)]
    pub body: Vec<Statement>,
    /// Source location
    #[serde(default)]
    pub location: Location,
    /// Written by the typer
    #[serde(skip)]
    pub typed: ComponentAnnotations,
}

impl HtmlComponentDefinition {
    /// Name used for blocks and messages, including anonymous components.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("<anonymous:{}>", self.location.line),
        }
    }
}

/// What the typer learns about a component.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComponentAnnotations {
    /// Property struct type
    pub properties: Option<TypeId>,
    /// Attached CSS definition (nested or top-level)
    pub css: Option<CssDefinition>,
    /// Attached CSS config definition (nested or top-level)
    pub css_config: Option<CssConfigDefinition>,
    /// Whether any checked code invokes this component
    pub used: bool,
    /// Every component this one invokes, transitively closed, with the
    /// location of the reference
    pub dependencies: BTreeMap<String, Location>,
}

/// A CSS definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CssDefinition {
    /// Name of the component this styles when declared at the top level
    #[serde(default)]
    pub name: Option<String>,
    /// Rules in order
    #[serde(default)]
    pub rules: Vec<CssRule>,
    /// Source location
    #[serde(default)]
    pub location: Location,
}

/// One CSS rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CssRule {
    /// Selectors, e.g. `.header`, `div > .title`
    pub selectors: Vec<String>,
    /// Declarations in order
    #[serde(default)]
    pub declarations: Vec<CssDeclaration>,
    /// Source location
    #[serde(default)]
    pub location: Location,
}

/// A `property: value` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CssDeclaration {
    /// Property name
    pub property: String,
    /// Raw value text
    pub value: String,
}

/// CSS configuration of a component.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CssConfigDefinition {
    /// Name of the component this configures when declared at the top level
    #[serde(default)]
    pub name: Option<String>,
    /// Class names left untouched by scoping
    #[serde(default)]
    pub unscoped_classes: Vec<String>,
    /// Source location
    #[serde(default)]
    pub location: Location,
}

/// A workspace definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceDefinition {
    /// Workspace name
    pub name: String,
    /// Body statements; the `Workspace` fields are in scope as variables
    #[serde(default)]
    pub body: Vec<Statement>,
    /// Source location
    #[serde(default)]
    pub location: Location,
}

/// A statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    /// `x := e`, `x : T = e`, `x : T`
    Declaration(Declaration),
    /// `a.b = e`
    Assignment(Assignment),
    /// `a.items []= e`
    ArrayAppend(ArrayAppend),
    /// `if cond { } else { }`
    If(IfStatement),
    /// `for index, item in array { }`
    For(ForStatement),
    /// `return e`
    Return(ReturnStatement),
    /// A bare expression
    Expression(Expression),
    /// `tag(attr = e) { children }`
    Html(HtmlElement),
    /// `{ ... }`
    Block(Vec<Statement>),
}

/// A variable declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    /// Variable name
    pub name: String,
    /// Explicit type annotation
    #[serde(default)]
    pub type_ident: Option<TypeIdent>,
    /// Initializer
    #[serde(default)]
    pub value: Option<Expression>,
    /// Source location
    #[serde(default)]
    pub location: Location,
    /// Resolved variable type
    #[serde(skip)]
    pub ty: Option<TypeId>,
}

/// Assignment to a variable or a field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// `a.b.c` as segments
    pub target: Vec<String>,
    /// Assigned value
    pub value: Expression,
    /// Source location
    #[serde(default)]
    pub location: Location,
}

/// Append to an array variable or field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayAppend {
    /// `a.b.items` as segments
    pub target: Vec<String>,
    /// Appended value
    pub value: Expression,
    /// Source location
    #[serde(default)]
    pub location: Location,
}

/// A conditional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    /// Must be bool
    pub condition: Expression,
    /// Statements run when true
    #[serde(default)]
    pub then_branch: Vec<Statement>,
    /// Statements run when false; `else if` nests an `If` here
    #[serde(default)]
    pub else_branch: Vec<Statement>,
    /// Source location
    #[serde(default)]
    pub location: Location,
}

/// Iteration over an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStatement {
    /// Optional index variable
    #[serde(default)]
    pub index: Option<String>,
    /// Element variable
    pub item: String,
    /// Array being iterated
    pub array: Expression,
    /// Loop body
    #[serde(default)]
    pub body: Vec<Statement>,
    /// Source location
    #[serde(default)]
    pub location: Location,
    /// Resolved element type
    #[serde(skip)]
    pub item_ty: Option<TypeId>,
}

/// A return statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatement {
    /// Returned value
    #[serde(default)]
    pub value: Option<Expression>,
    /// Source location
    #[serde(default)]
    pub location: Location,
}

/// A literal HTML element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlElement {
    /// Tag name
    pub tag: String,
    /// Attributes in order
    #[serde(default)]
    pub attributes: Vec<HtmlAttribute>,
    /// Child statements
    #[serde(default)]
    pub children: Vec<Statement>,
    /// Source location
    #[serde(default)]
    pub location: Location,
}

/// `name = value` on an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlAttribute {
    /// Attribute name
    pub name: String,
    /// Attribute value; must be a primitive
    pub value: Expression,
}

/// An expression as a postfix (reverse Polish) node sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    /// Operands and operators in postfix order
    pub nodes: Vec<ExprNode>,
    /// Source location
    #[serde(default)]
    pub location: Location,
    /// Result type
    #[serde(skip)]
    pub ty: Option<TypeId>,
    /// Type shared by every operand; selects the operator opcodes
    #[serde(skip)]
    pub operand_ty: Option<TypeId>,
}

impl Expression {
    /// The single call node of a call-only expression.
    pub fn as_call(&self) -> Option<&Call> {
        match self.nodes.as_slice() {
            [ExprNode::Call(call)] => Some(call),
            _ => None,
        }
    }
}

/// One node of a postfix expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprNode {
    /// Text, number or boolean literal
    Literal(Literal),
    /// Variable or field path
    Identifier(Identifier),
    /// Procedure call or component invocation
    Call(Call),
    /// `Name{field = e}`
    StructLiteral(StructLiteral),
    /// `[]T{e, e}`
    ArrayLiteral(ArrayLiteral),
    /// An operator applied to the preceding operands
    Operator(Operator),
}

/// A literal token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Literal {
    /// Token class
    pub kind: LiteralKind,
    /// Token text without quotes
    pub value: String,
}

/// Literal token classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralKind {
    /// Quoted text
    Text,
    /// Numeral; a `.` makes it a float
    Number,
    /// `true` / `false`
    Bool,
}

/// A variable reference, possibly with a field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    /// `a.b.c` as segments
    pub path: Vec<String>,
    /// Resolved type of the whole path
    #[serde(skip)]
    pub ty: Option<TypeId>,
}

/// A call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Procedure or component name
    pub name: String,
    /// Positional (procedure) or named (component) arguments
    #[serde(default)]
    pub arguments: Vec<Argument>,
    /// Statements forming the `children` fragment of a component invocation
    #[serde(default)]
    pub children: Vec<Statement>,
    /// Reference site
    #[serde(default)]
    pub location: Location,
    /// What the name resolved to
    #[serde(skip)]
    pub kind: Option<CallKind>,
}

/// Resolution of a call name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// A procedure and its return type
    Procedure {
        /// Return type, `None` for procedures without a value
        returns: Option<TypeId>,
    },
    /// A component invocation
    Component,
}

/// A call argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    /// Property name for component invocations
    #[serde(default)]
    pub name: Option<String>,
    /// Argument value
    pub value: Expression,
}

/// `Name{field = e, ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructLiteral {
    /// Struct name
    pub name: String,
    /// Supplied fields
    #[serde(default)]
    pub fields: Vec<FieldInit>,
    /// Resolved struct type
    #[serde(skip)]
    pub ty: Option<TypeId>,
}

/// A supplied struct literal field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInit {
    /// Field name
    pub name: String,
    /// Field value
    pub value: Expression,
}

/// `[]T{e, e}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayLiteral {
    /// Element type
    pub element: TypeIdent,
    /// Elements in order
    #[serde(default)]
    pub elements: Vec<Expression>,
    /// Resolved array type
    #[serde(skip)]
    pub ty: Option<TypeId>,
}

/// Binary and unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `!`
    Not,
}

impl Operator {
    /// Number of operands consumed.
    pub fn arity(self) -> usize {
        match self {
            Operator::Not => 1,
            _ => 2,
        }
    }

    /// Whether the operator yields bool from non-bool operands.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Equal
                | Operator::NotEqual
                | Operator::Less
                | Operator::LessEqual
                | Operator::Greater
                | Operator::GreaterEqual
        )
    }

    /// Source spelling.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Modulo => "%",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Not => "!",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
