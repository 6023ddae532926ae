//! Semantic analysis.
//!
//! The [`Typer`] walks every source file in a fixed sequence of phases:
//!
//! 1. collect top-level definitions of every file into the global scope
//! 2. resolve struct fields, component properties and procedure signatures
//! 3. check struct defaults and recursive containment
//! 4. attach CSS and CSS config definitions to their components
//! 5. check component bodies, recording which components each one invokes
//! 6. detect dependency cycles and close the dependency maps
//! 7. check procedure bodies
//! 8. check workspace bodies
//! 9. check the top-level statements of each file
//!
//! User errors go to [`Diagnostics`] and checking carries on. Types and
//! resolutions are written back onto the AST for the emitter.

mod components;
mod expressions;
pub mod scope;
mod statements;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

pub use scope::{Scope, Symbol};
pub(crate) use statements::always_returns;

use crate::ast::{
    CallKind, DefRef, Definition, Expression, ExprNode, HtmlComponentDefinition, Item, Location, Operator,
    ProcedureDefinition, SourceFile, StructDefinition, TypeIdent,
};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::types::{FieldType, TypeId, TypeRegistry, WORKSPACE_FIELDS, WORKSPACE_STRUCT};

/// Names that always denote built-in types.
const RESERVED_TYPE_NAMES: [&str; 5] = ["bool", "int", "float", "string", "html"];

/// What a statement list is allowed to contain.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Context {
    /// Elements and rendered values are allowed
    html: bool,
    /// `Some(returns)` inside a procedure body
    procedure: Option<Option<TypeId>>,
}

impl Context {
    fn plain() -> Self {
        Self::default()
    }

    fn html() -> Self {
        Self {
            html: true,
            procedure: None,
        }
    }

    fn procedure(returns: Option<TypeId>) -> Self {
        Self {
            html: false,
            procedure: Some(returns),
        }
    }
}

/// A struct field default, as struct type and field index.
type DefaultSite = (TypeId, usize);

/// The default expression of field `index` of struct `ty`.
fn default_expression<'f>(
    registry: &TypeRegistry,
    files: &'f [SourceFile],
    ty: TypeId,
    index: usize,
) -> Option<&'f Expression> {
    let def = registry.struct_type(ty)?.definition?;
    let fields = match files.get(def.file)?.definition(def.item)? {
        Definition::Struct(st) => &st.fields,
        Definition::Component(component) => &component.properties.as_ref()?.fields,
        _ => return None,
    };
    fields.get(index)?.default.as_ref()
}

/// Key under which a top-level `Name :: css` style definition is bound.
fn style_key(name: &str, kind: &str) -> String {
    format!("{} :: {}", name, kind)
}

/// The type checker for one compilation session.
pub struct Typer<'a> {
    registry: &'a mut TypeRegistry,
    diagnostics: &'a mut Diagnostics,
    scope: Scope,
    /// Path of the file being checked, for diagnostics
    file: String,
    /// Component whose body is being checked
    current_component: Option<String>,
    /// Direct component invocations per component
    dependencies: BTreeMap<String, BTreeMap<String, Location>>,
    component_files: BTreeMap<String, String>,
    workspaces: BTreeSet<String>,
    used: BTreeSet<String>,
}

impl<'a> Typer<'a> {
    /// Creates a typer over a session's registry and diagnostics.
    pub fn new(registry: &'a mut TypeRegistry, diagnostics: &'a mut Diagnostics) -> Self {
        let mut scope = Scope::new();
        let workspace = registry.workspace();
        // A fresh scope cannot already hold the name.
        let _ = scope.set_symbol(
            WORKSPACE_STRUCT,
            Symbol::StructDefinition {
                ty: workspace,
                def: None,
            },
        );
        Self {
            registry,
            diagnostics,
            scope,
            file: String::new(),
            current_component: None,
            dependencies: BTreeMap::new(),
            component_files: BTreeMap::new(),
            workspaces: BTreeSet::new(),
            used: BTreeSet::new(),
        }
    }

    /// Checks and annotates every file.
    pub fn check(mut self, files: &mut [SourceFile]) -> Result<()> {
        debug!(files = files.len(), "collecting definitions");
        self.collect(files);

        debug!("resolving signatures");
        self.resolve_signatures(files)?;

        debug!("checking structs");
        self.check_structs(files)?;

        debug!("attaching styles");
        self.attach_styles(files);

        debug!("checking components");
        self.for_each_definition(files, |typer, definition| match definition {
            Definition::Component(component) => typer.check_component(component),
            _ => Ok(()),
        })?;

        debug!("resolving component dependencies");
        let closed = self.resolve_dependencies();

        debug!("checking procedures");
        self.for_each_definition(files, |typer, definition| {
            if let Definition::Procedure(procedure) = definition {
                typer.check_procedure(procedure);
            }
            Ok(())
        })?;

        debug!("checking workspaces");
        self.for_each_definition(files, |typer, definition| {
            if let Definition::Workspace(workspace) = definition {
                typer.in_scope(|typer| {
                    for (name, ty) in WORKSPACE_FIELDS {
                        typer.bind_variable(name, ty, workspace.location.line);
                    }
                    typer.check_statements(&mut workspace.body, Context::plain());
                });
            }
            Ok(())
        })?;

        debug!("checking file statements");
        for file in files.iter_mut() {
            self.file = file.path.clone();
            let context = if file.template {
                Context::html()
            } else {
                Context::plain()
            };
            self.push_scope();
            for item in file.items.iter_mut() {
                if let Item::Statement(statement) = item {
                    self.check_statement(statement, context);
                }
            }
            self.pop_scope();
        }

        self.write_back(files, closed);
        debug!(errors = self.diagnostics.error_count(), "type checking finished");
        Ok(())
    }

    fn for_each_definition<F>(&mut self, files: &mut [SourceFile], mut f: F) -> Result<()>
    where
        F: FnMut(&mut Self, &mut Definition) -> Result<()>,
    {
        for file in files.iter_mut() {
            self.file = file.path.clone();
            for item in file.items.iter_mut() {
                if let Item::Definition(definition) = item {
                    f(self, definition)?;
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Collection
    // ========================================================================

    fn collect(&mut self, files: &mut [SourceFile]) {
        for (file_index, file) in files.iter_mut().enumerate() {
            self.file = file.path.clone();
            for (item_index, item) in file.items.iter_mut().enumerate() {
                let Item::Definition(definition) = item else {
                    continue;
                };
                let def = DefRef {
                    file: file_index,
                    item: item_index,
                };
                self.collect_definition(definition, def);
            }
        }
    }

    fn collect_definition(&mut self, definition: &mut Definition, def: DefRef) {
        let location = definition.location();
        match definition {
            Definition::Procedure(procedure) => {
                let ty = self.registry.declare_procedure(&procedure.name);
                procedure.ty = Some(ty);
                self.declare_global(&procedure.name, Symbol::Variable(ty), location);
            }
            Definition::Struct(st) => {
                if RESERVED_TYPE_NAMES.contains(&st.name.as_str()) {
                    self.error(location.line, format!("\"{}\" is a reserved type name", st.name));
                    return;
                }
                if self.scope.get_symbol_local(&st.name).is_some() {
                    self.error(location.line, format!("\"{}\" is already declared", st.name));
                    return;
                }
                let ty = self.registry.declare_struct(&st.name, Some(def));
                st.ty = Some(ty);
                self.declare_global(&st.name, Symbol::StructDefinition { ty, def: Some(def) }, location);
            }
            Definition::Component(component) => {
                let name = component.display_name();
                let properties = self.registry.declare_anonymous_struct(&name, Some(def));
                component.typed.properties = Some(properties);
                if let Some(block) = &mut component.properties {
                    block.ty = Some(properties);
                }
                if let Some(declared) = &component.name {
                    let symbol = Symbol::HtmlComponentDefinition { properties, def };
                    if !self.declare_global(declared, symbol, location) {
                        return;
                    }
                }
                self.component_files.insert(name.clone(), self.file.clone());
                self.dependencies.insert(name, BTreeMap::new());
            }
            Definition::Css(css) => match &css.name {
                Some(name) => {
                    self.declare_global(&style_key(name, "css"), Symbol::CssDefinition { def }, location);
                }
                None => self.error(location.line, "a top-level css definition must name its component"),
            },
            Definition::CssConfig(config) => match &config.name {
                Some(name) => {
                    let key = style_key(name, "css_config");
                    self.declare_global(&key, Symbol::CssConfigDefinition { def }, location);
                }
                None => self.error(
                    location.line,
                    "a top-level css_config definition must name its component",
                ),
            },
            Definition::Workspace(workspace) => {
                if !self.workspaces.insert(workspace.name.clone()) {
                    self.error(location.line, format!("\"{}\" is already declared", workspace.name));
                }
            }
        }
    }

    fn declare_global(&mut self, name: &str, symbol: Symbol, location: Location) -> bool {
        match self.scope.set_symbol(name, symbol) {
            Ok(()) => true,
            Err(_) => {
                self.error(location.line, format!("\"{}\" is already declared", name));
                false
            }
        }
    }

    // ========================================================================
    // Signatures
    // ========================================================================

    fn resolve_signatures(&mut self, files: &mut [SourceFile]) -> Result<()> {
        self.for_each_definition(files, |typer, definition| match definition {
            Definition::Struct(st) => typer.resolve_struct(st),
            Definition::Component(component) => match &mut component.properties {
                Some(block) => typer.resolve_struct(block),
                None => Ok(()),
            },
            Definition::Procedure(procedure) => typer.resolve_procedure(procedure),
            _ => Ok(()),
        })
    }

    fn resolve_struct(&mut self, st: &mut StructDefinition) -> Result<()> {
        let Some(id) = st.ty else {
            return Ok(());
        };
        let mut fields: Vec<FieldType> = Vec::with_capacity(st.fields.len());
        for (index, field) in st.fields.iter_mut().enumerate() {
            let line = field.location.line;
            field.index = index;
            if fields.iter().any(|existing| existing.name == field.name) {
                self.error(line, format!("field \"{}\" is declared more than once", field.name));
            }
            let ty = match (&field.type_ident, &field.default) {
                (Some(ident), _) => self.resolve_type(ident, line),
                (None, Some(default)) => self.infer_type(default, line),
                (None, None) => {
                    self.error(line, format!("field \"{}\" needs a type or a default value", field.name));
                    None
                }
            };
            field.ty = ty;
            fields.push(FieldType {
                name: field.name.clone(),
                // Unresolved fields are already reported; the placeholder keeps indices stable.
                ty: ty.unwrap_or(TypeId::INT),
            });
        }
        self.registry.set_struct_fields(id, fields)
    }

    /// Infers a field type from the leading node of its default value.
    fn infer_type(&mut self, default: &Expression, line: usize) -> Option<TypeId> {
        let logical = default.nodes.iter().any(|node| {
            matches!(node, ExprNode::Operator(op)
                if op.is_comparison() || matches!(op, Operator::And | Operator::Or | Operator::Not))
        });
        if logical {
            return Some(TypeId::BOOL);
        }
        match default.nodes.first() {
            Some(ExprNode::Literal(literal)) => match expressions::literal_type(literal) {
                Ok(ty) => Some(ty),
                Err(message) => {
                    self.error(line, message);
                    None
                }
            },
            Some(ExprNode::StructLiteral(literal)) => match self.scope.get_symbol(&literal.name) {
                Some(Symbol::StructDefinition { ty, .. }) => Some(ty),
                _ => {
                    self.error(line, format!("unknown struct \"{}\"", literal.name));
                    None
                }
            },
            Some(ExprNode::ArrayLiteral(literal)) => {
                let element = self.resolve_type(&literal.element, line)?;
                Some(self.registry.array_of(element))
            }
            _ => {
                self.error(line, "cannot infer the type of this default value; declare the field type");
                None
            }
        }
    }

    fn resolve_procedure(&mut self, procedure: &mut ProcedureDefinition) -> Result<()> {
        let Some(id) = procedure.ty else {
            return Ok(());
        };
        let mut params = Vec::with_capacity(procedure.parameters.len());
        for parameter in procedure.parameters.iter_mut() {
            let ty = self.resolve_type(&parameter.type_ident, parameter.location.line);
            parameter.ty = ty;
            params.push(ty.unwrap_or(TypeId::INT));
        }
        let returns = match &procedure.returns {
            Some(ident) => Some(
                self.resolve_type(ident, procedure.location.line)
                    .unwrap_or(TypeId::INT),
            ),
            None => None,
        };
        self.registry.set_signature(id, params, returns)
    }

    /// Resolves a written type, reporting unknown names.
    pub(crate) fn resolve_type(&mut self, ident: &TypeIdent, line: usize) -> Option<TypeId> {
        match self.registry.lookup(&ident.name, ident.array_depth) {
            Some(ty) => Some(ty),
            None => {
                self.error(line, format!("unknown type \"{}\"", ident));
                None
            }
        }
    }

    // ========================================================================
    // Structs
    // ========================================================================

    fn check_structs(&mut self, files: &mut [SourceFile]) -> Result<()> {
        self.for_each_definition(files, |typer, definition| {
            match definition {
                Definition::Struct(st) => {
                    typer.check_struct_defaults(st);
                    if let Some(ty) = st.ty {
                        let mut visited = BTreeSet::new();
                        if typer.contains_struct(ty, ty, &mut visited) {
                            typer.error(st.location.line, format!("struct \"{}\" contains itself", st.name));
                        }
                    }
                }
                Definition::Component(component) => {
                    let name = component.display_name();
                    if let Some(block) = &mut component.properties {
                        // Invocations inside property defaults count as dependencies.
                        typer.current_component = Some(name);
                        typer.check_struct_defaults(block);
                        typer.current_component = None;
                    }
                }
                _ => {}
            }
            Ok(())
        })?;
        self.check_default_expansion(files);
        Ok(())
    }

    fn check_struct_defaults(&mut self, st: &mut StructDefinition) {
        for field in st.fields.iter_mut() {
            if let (Some(ty), Some(default)) = (field.ty, &mut field.default) {
                self.check_expression(default, Some(ty));
            }
        }
    }

    /// Whether `current` holds a `target` through non-array fields.
    fn contains_struct(&self, target: TypeId, current: TypeId, visited: &mut BTreeSet<TypeId>) -> bool {
        let Some(st) = self.registry.struct_type(current) else {
            return false;
        };
        for field in &st.fields {
            if field.ty == target {
                return true;
            }
            if self.registry.struct_type(field.ty).is_some()
                && visited.insert(field.ty)
                && self.contains_struct(target, field.ty, visited)
            {
                return true;
            }
        }
        false
    }

    /// Reports struct field defaults whose evaluation builds the same
    /// default again, directly or through other defaults.
    fn check_default_expansion(&mut self, files: &[SourceFile]) {
        for file in files {
            self.file = file.path.clone();
            for item in &file.items {
                let Item::Definition(Definition::Struct(st)) = item else {
                    continue;
                };
                let Some(ty) = st.ty else {
                    continue;
                };
                // Already reported as containing itself.
                if self.contains_struct(ty, ty, &mut BTreeSet::new()) {
                    continue;
                }
                for (index, field) in st.fields.iter().enumerate() {
                    if field.default.is_none() {
                        continue;
                    }
                    let mut visited = BTreeSet::new();
                    if self.default_reaches(files, (ty, index), (ty, index), &mut visited) {
                        self.error(
                            field.location.line,
                            format!(
                                "default value of field \"{}\" constructs \"{}\" recursively",
                                field.name, st.name
                            ),
                        );
                    }
                }
            }
        }
    }

    fn default_reaches(
        &self,
        files: &[SourceFile],
        from: DefaultSite,
        target: DefaultSite,
        visited: &mut BTreeSet<DefaultSite>,
    ) -> bool {
        let Some(default) = default_expression(&*self.registry, files, from.0, from.1) else {
            return false;
        };
        let mut expanded = Vec::new();
        self.expanded_defaults(files, default, &mut expanded);
        for site in expanded {
            if site == target {
                return true;
            }
            if visited.insert(site) && self.default_reaches(files, site, target, visited) {
                return true;
            }
        }
        false
    }

    /// Field defaults that emitting `expr` evaluates inline.
    fn expanded_defaults(&self, files: &[SourceFile], expr: &Expression, out: &mut Vec<DefaultSite>) {
        for node in &expr.nodes {
            match node {
                ExprNode::StructLiteral(literal) => {
                    for init in &literal.fields {
                        self.expanded_defaults(files, &init.value, out);
                    }
                    if let Some(ty) = literal.ty {
                        let supplied: Vec<&str> = literal.fields.iter().map(|init| init.name.as_str()).collect();
                        self.construction_defaults(files, ty, &supplied, out, &mut BTreeSet::new());
                    }
                }
                ExprNode::ArrayLiteral(literal) => {
                    for element in &literal.elements {
                        self.expanded_defaults(files, element, out);
                    }
                }
                ExprNode::Call(call) => {
                    for argument in &call.arguments {
                        self.expanded_defaults(files, &argument.value, out);
                    }
                    if call.kind == Some(CallKind::Component) {
                        if let Some(Symbol::HtmlComponentDefinition { properties, .. }) =
                            self.scope.get_symbol(&call.name)
                        {
                            let supplied: Vec<&str> =
                                call.arguments.iter().filter_map(|argument| argument.name.as_deref()).collect();
                            self.construction_defaults(files, properties, &supplied, out, &mut BTreeSet::new());
                        }
                    }
                }
                ExprNode::Literal(_) | ExprNode::Identifier(_) | ExprNode::Operator(_) => {}
            }
        }
    }

    /// Defaults evaluated when building `ty` with only `supplied` given,
    /// following zero values into nested structs.
    fn construction_defaults(
        &self,
        files: &[SourceFile],
        ty: TypeId,
        supplied: &[&str],
        out: &mut Vec<DefaultSite>,
        zeroed: &mut BTreeSet<TypeId>,
    ) {
        let Some(st) = self.registry.struct_type(ty) else {
            return;
        };
        for (index, field) in st.fields.iter().enumerate() {
            if supplied.contains(&field.name.as_str()) {
                continue;
            }
            if default_expression(&*self.registry, files, ty, index).is_some() {
                out.push((ty, index));
            } else if self.registry.struct_type(field.ty).is_some() && zeroed.insert(field.ty) {
                self.construction_defaults(files, field.ty, &[], out, zeroed);
            }
        }
    }

    // ========================================================================
    // Bodies
    // ========================================================================

    fn check_component(&mut self, component: &mut HtmlComponentDefinition) -> Result<()> {
        let name = component.display_name();
        let Some(properties) = component.typed.properties else {
            return Err(Error::internal(format!("component {} has no property struct", name)));
        };
        let fields = self
            .registry
            .struct_type(properties)
            .map(|st| st.fields.clone())
            .unwrap_or_default();
        let line = component.location.line;

        self.current_component = Some(name);
        self.in_scope(|typer| {
            typer.bind_variable("children", TypeId::HTML_NODE, line);
            for field in &fields {
                typer.bind_variable(&field.name, field.ty, line);
            }
            typer.check_statements(&mut component.body, Context::html());
        });
        self.current_component = None;
        Ok(())
    }

    fn check_procedure(&mut self, procedure: &mut ProcedureDefinition) {
        let Some(signature) = procedure.ty.and_then(|ty| self.registry.signature(ty)).cloned() else {
            return;
        };
        self.in_scope(|typer| {
            for (parameter, ty) in procedure.parameters.iter().zip(&signature.params) {
                typer.bind_variable(&parameter.name, *ty, parameter.location.line);
            }
            typer.check_statements(&mut procedure.body, Context::procedure(signature.returns));
        });
        if signature.returns.is_some() && !statements::always_returns(&procedure.body) {
            self.error(
                procedure.location.line,
                format!("procedure \"{}\" does not return a value on every path", procedure.name),
            );
        }
    }

    fn write_back(&self, files: &mut [SourceFile], mut closed: BTreeMap<String, BTreeMap<String, Location>>) {
        for file in files.iter_mut() {
            for item in file.items.iter_mut() {
                let Item::Definition(Definition::Component(component)) = item else {
                    continue;
                };
                let name = component.display_name();
                component.typed.dependencies = closed.remove(&name).unwrap_or_default();
                component.typed.used = self.used.contains(&name);
                if !component.typed.used {
                    warn!(component = %name, "component is never invoked");
                }
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    pub(crate) fn error(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.push(&self.file, line, message);
    }

    pub(crate) fn mismatch(&mut self, line: usize, expected: TypeId, got: TypeId) {
        let message = format!(
            "mismatching types, expected {} but got {}",
            self.registry.display(expected),
            self.registry.display(got)
        );
        self.error(line, message);
    }

    pub(crate) fn bind_variable(&mut self, name: &str, ty: TypeId, line: usize) {
        if self.scope.set_variable(name, ty).is_err() {
            self.error(line, format!("\"{}\" is already declared", name));
        }
    }

    fn push_scope(&mut self) {
        let parent = std::mem::take(&mut self.scope);
        self.scope = Scope::with_parent(parent);
    }

    fn pop_scope(&mut self) {
        let current = std::mem::take(&mut self.scope);
        self.scope = current.into_parent();
    }

    /// Runs `f` inside a fresh nested scope.
    pub(crate) fn in_scope<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.push_scope();
        let result = f(self);
        self.pop_scope();
        result
    }
}
