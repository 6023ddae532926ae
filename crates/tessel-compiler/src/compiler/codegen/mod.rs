//! Code generation from the typed AST to bytecode.
//!
//! The [`Emitter`] produces one [`Block`] per procedure, component, workspace
//! and source file. Block ids for procedures and components are assigned
//! before any body is compiled, so forward calls and recursion resolve to a
//! known id. The emitter trusts the typer: a missing annotation is an
//! internal error, never a user diagnostic.

mod expressions;
mod html;
mod scope;
mod statements;

#[cfg(test)]
mod tests;

pub use scope::{Local, Scope};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::Error;
use crate::ast::{
    Definition, Expression, HtmlComponentDefinition, Item, ProcedureDefinition, SourceFile, WorkspaceDefinition,
};
use crate::compiler::bytecode::{Block, BlockId, BlockKind, Instruction, OpCode, Operand, Program};
use crate::config::Config;
use crate::error::Result;
use crate::runtime::css::{ClassScope, ComponentStyle, StyleRule};
use crate::typer::always_returns;
use crate::types::{StructType, TypeId, TypeRegistry};

/// Something that compiles to one block.
#[derive(Clone, Copy)]
enum Unit<'a> {
    Procedure(&'a ProcedureDefinition),
    Component(&'a HtmlComponentDefinition),
    Workspace(&'a WorkspaceDefinition),
    File(&'a SourceFile),
}

/// Lowers checked source files into a [`Program`].
pub struct Emitter<'a> {
    registry: &'a TypeRegistry,
    config: &'a Config,
    files: &'a [SourceFile],
    program: Program,
    /// Property struct of every named component
    components: FxHashMap<&'a str, TypeId>,
    /// The block being compiled
    block: Block,
    /// Locals of the block being compiled
    scope: Scope,
    /// Open element tags, for error messages
    tags: Vec<String>,
    /// Class rewriting of the component being compiled
    class_scope: Option<ClassScope>,
    /// Field defaults currently being emitted inline
    expanding: FxHashSet<(TypeId, usize)>,
}

impl<'a> Emitter<'a> {
    /// Creates an emitter over checked files.
    pub fn new(registry: &'a TypeRegistry, config: &'a Config, files: &'a [SourceFile]) -> Self {
        Self {
            registry,
            config,
            files,
            program: Program::default(),
            components: FxHashMap::default(),
            block: Block::new("", BlockKind::File),
            scope: Scope::new(),
            tags: Vec::new(),
            class_scope: None,
            expanding: FxHashSet::default(),
        }
    }

    /// Compiles every unit and collects component styles.
    pub fn emit(mut self) -> Result<Program> {
        let units = self.assign_blocks();
        for (id, unit) in units {
            let block = match unit {
                Unit::Procedure(procedure) => self.compile_procedure(procedure)?,
                Unit::Component(component) => self.compile_component(component)?,
                Unit::Workspace(workspace) => self.compile_workspace(workspace)?,
                Unit::File(file) => self.compile_file(file)?,
            };
            debug!(
                block = %block.name,
                kind = %block.kind,
                instructions = block.instructions.len(),
                stack_size = block.stack_size,
                "compiled block"
            );
            let slot = self
                .program
                .blocks
                .get_mut(id.index())
                .ok_or_else(|| Error::internal(format!("block #{} was never assigned", id.0)))?;
            *slot = block;
        }
        self.emit_styles();
        Ok(self.program)
    }

    fn assign_blocks(&mut self) -> Vec<(BlockId, Unit<'a>)> {
        let files = self.files;
        let mut units = Vec::new();
        let mut add = |program: &mut Program, name: String, kind: BlockKind, unit: Unit<'a>| {
            let id = BlockId(program.blocks.len() as u32);
            program.blocks.push(Block::new(name, kind));
            units.push((id, unit));
            id
        };

        for file in files {
            for item in &file.items {
                match item {
                    Item::Definition(Definition::Procedure(procedure)) => {
                        let id = add(
                            &mut self.program,
                            procedure.name.clone(),
                            BlockKind::Procedure,
                            Unit::Procedure(procedure),
                        );
                        self.program.names.insert(procedure.name.clone(), id);
                    }
                    Item::Definition(Definition::Component(component)) => {
                        let name = component.display_name();
                        let id = add(
                            &mut self.program,
                            name.clone(),
                            BlockKind::Component,
                            Unit::Component(component),
                        );
                        self.program.names.insert(name, id);
                        if let (Some(declared), Some(properties)) = (&component.name, component.typed.properties) {
                            self.components.insert(declared.as_str(), properties);
                        }
                    }
                    _ => {}
                }
            }
        }
        for file in files {
            for item in &file.items {
                if let Item::Definition(Definition::Workspace(workspace)) = item {
                    let id = add(
                        &mut self.program,
                        workspace.name.clone(),
                        BlockKind::Workspace,
                        Unit::Workspace(workspace),
                    );
                    self.program.workspaces.insert(workspace.name.clone(), id);
                }
            }
        }
        for file in files {
            let kind = if file.template {
                BlockKind::Template
            } else {
                BlockKind::File
            };
            let id = add(&mut self.program, file.path.clone(), kind, Unit::File(file));
            self.program.files.insert(file.path.clone(), id);
        }
        units
    }

    // ========================================================================
    // Units
    // ========================================================================

    fn begin_block(&mut self, name: &str, kind: BlockKind) {
        self.block = Block::new(name, kind);
        self.scope = Scope::new();
        self.tags.clear();
    }

    fn finish_block(&mut self) -> Block {
        let mut block = std::mem::replace(&mut self.block, Block::new("", BlockKind::File));
        block.stack_size = self.scope.frame_size();
        block
    }

    /// Pops the caller's arguments into freshly declared slots, last argument first.
    fn bind_parameters(&mut self, parameters: &[(&str, TypeId)]) -> Result<()> {
        let mut slots = Vec::with_capacity(parameters.len());
        for (name, ty) in parameters {
            slots.push(self.scope.declare(name, *ty)?);
        }
        for slot in slots.into_iter().rev() {
            self.emit_with(OpCode::StoreLocal, Operand::Slot(slot));
        }
        self.block.params = parameters.len();
        Ok(())
    }

    fn compile_procedure(&mut self, procedure: &'a ProcedureDefinition) -> Result<Block> {
        self.begin_block(&procedure.name, BlockKind::Procedure);
        let returns = procedure
            .ty
            .and_then(|ty| self.registry.signature(ty))
            .ok_or_else(|| unset(&format!("procedure \"{}\"", procedure.name)))?
            .returns;

        let mut parameters = Vec::with_capacity(procedure.parameters.len());
        for parameter in &procedure.parameters {
            let ty = parameter
                .ty
                .ok_or_else(|| unset(&format!("parameter \"{}\"", parameter.name)))?;
            parameters.push((parameter.name.as_str(), ty));
        }
        self.bind_parameters(&parameters)?;
        self.compile_statements(&procedure.body, false)?;

        match returns {
            None => {
                self.emit_simple(OpCode::Return);
            }
            Some(_) if !always_returns(&procedure.body) => {
                return Err(Error::internal(format!(
                    "procedure \"{}\" can finish without returning a value",
                    procedure.name
                )));
            }
            Some(_) => {}
        }
        self.block.has_return = returns.is_some();
        Ok(self.finish_block())
    }

    fn compile_component(&mut self, component: &'a HtmlComponentDefinition) -> Result<Block> {
        let name = component.display_name();
        self.begin_block(&name, BlockKind::Component);
        let properties = component
            .typed
            .properties
            .ok_or_else(|| unset(&format!("component {}", name)))?;
        let st = self.struct_type(properties)?;

        let mut parameters = vec![("children", TypeId::HTML_NODE)];
        parameters.extend(st.fields.iter().map(|field| (field.name.as_str(), field.ty)));
        self.bind_parameters(&parameters)?;

        self.class_scope = self.class_scope_for(component);
        self.emit_simple(OpCode::NewFragment);
        self.compile_statements(&component.body, true)?;
        self.emit_simple(OpCode::Return);
        self.class_scope = None;

        self.block.has_return = true;
        Ok(self.finish_block())
    }

    fn compile_workspace(&mut self, workspace: &'a WorkspaceDefinition) -> Result<Block> {
        self.begin_block(&workspace.name, BlockKind::Workspace);
        let st = self.struct_type(self.registry.workspace())?;

        let mut slots = Vec::with_capacity(st.fields.len());
        for field in &st.fields {
            self.emit_zero(field.ty)?;
            let slot = self.scope.declare(&field.name, field.ty)?;
            self.emit_with(OpCode::StoreLocal, Operand::Slot(slot));
            slots.push(slot);
        }
        self.compile_statements(&workspace.body, false)?;

        self.emit_with(
            OpCode::NewStruct,
            Operand::Struct {
                name: st.name.clone(),
                fields: st.fields.iter().map(|f| f.name.clone()).collect(),
            },
        );
        for (index, slot) in slots.into_iter().enumerate() {
            self.emit_with(OpCode::LoadLocal, Operand::Slot(slot));
            self.emit_with(OpCode::StoreField, Operand::Field(field_operand(index)?));
        }
        self.emit_simple(OpCode::Return);
        self.block.has_return = true;
        Ok(self.finish_block())
    }

    fn compile_file(&mut self, file: &'a SourceFile) -> Result<Block> {
        let kind = if file.template {
            BlockKind::Template
        } else {
            BlockKind::File
        };
        self.begin_block(&file.path, kind);
        if file.template {
            self.emit_simple(OpCode::NewFragment);
        }
        for item in &file.items {
            if let Item::Statement(statement) = item {
                self.compile_statement(statement, file.template)?;
            }
        }
        self.emit_simple(OpCode::Return);
        self.block.has_return = file.template;
        Ok(self.finish_block())
    }

    // ========================================================================
    // Styles
    // ========================================================================

    fn class_scope_for(&self, component: &HtmlComponentDefinition) -> Option<ClassScope> {
        if !self.config.scope_css || component.typed.css.is_none() {
            return None;
        }
        let name = component.name.as_ref()?;
        let unscoped = component
            .typed
            .css_config
            .as_ref()
            .map(|config| config.unscoped_classes.clone())
            .unwrap_or_default();
        Some(ClassScope::new(name.clone(), unscoped))
    }

    fn emit_styles(&mut self) {
        let files = self.files;
        for file in files {
            for item in &file.items {
                let Item::Definition(Definition::Component(component)) = item else {
                    continue;
                };
                let Some(css) = &component.typed.css else {
                    continue;
                };
                if !component.typed.used && !self.config.emit_unused_css {
                    debug!(component = %component.display_name(), "skipping styles of unused component");
                    continue;
                }
                let scope = self.class_scope_for(component);
                let rules = css
                    .rules
                    .iter()
                    .map(|rule| StyleRule {
                        selectors: rule
                            .selectors
                            .iter()
                            .map(|selector| match &scope {
                                Some(scope) => scope.scope_selector(selector),
                                None => selector.clone(),
                            })
                            .collect(),
                        declarations: rule
                            .declarations
                            .iter()
                            .map(|d| (d.property.clone(), d.value.clone()))
                            .collect(),
                    })
                    .collect();
                self.program.styles.push(ComponentStyle {
                    component: component.display_name(),
                    rules,
                });
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn emit_simple(&mut self, opcode: OpCode) -> usize {
        self.block.emit(Instruction::simple(opcode))
    }

    fn emit_with(&mut self, opcode: OpCode, operand: Operand) -> usize {
        self.block.emit(Instruction::with_operand(opcode, operand))
    }

    /// Emits a jump with a placeholder target, to be patched.
    fn emit_jump(&mut self, opcode: OpCode) -> usize {
        self.emit_with(opcode, Operand::Jump(0))
    }

    /// Points a placeholder jump at the next instruction.
    fn patch_jump(&mut self, index: usize) {
        let target = self.block.instructions.len();
        self.block.patch_jump(index, target);
    }

    fn struct_type(&self, ty: TypeId) -> Result<&'a StructType> {
        let registry: &'a TypeRegistry = self.registry;
        registry
            .struct_type(ty)
            .ok_or_else(|| Error::internal(format!("{} is not a struct", registry.display(ty))))
    }

    /// Resolves a field name to its operand and type.
    fn field_index(&self, ty: TypeId, name: &str) -> Result<(u16, TypeId)> {
        let st = self.struct_type(ty)?;
        let (index, field) = st
            .field(name)
            .ok_or_else(|| Error::internal(format!("\"{}\" is not a field on {}{}", name, st.name, self.tag_context())))?;
        Ok((field_operand(index)?, field.ty))
    }

    /// The declared default of a struct or property field.
    fn field_default(&self, ty: TypeId, index: usize) -> Option<&'a Expression> {
        let def = self.registry.struct_type(ty)?.definition?;
        let files: &'a [SourceFile] = self.files;
        let fields = match files.get(def.file)?.definition(def.item)? {
            Definition::Struct(st) => &st.fields,
            Definition::Component(component) => &component.properties.as_ref()?.fields,
            _ => return None,
        };
        fields.get(index)?.default.as_ref()
    }

    /// Emits the default of field `index` of `ty` inline.
    fn emit_default(&mut self, ty: TypeId, index: usize, default: &Expression) -> Result<()> {
        if !self.expanding.insert((ty, index)) {
            return Err(Error::internal(format!(
                "default of field {} on {} expands itself{}",
                index,
                self.registry.display(ty),
                self.tag_context()
            )));
        }
        let result = self.emit_expression(default);
        self.expanding.remove(&(ty, index));
        result
    }

    fn block_id(&self, name: &str) -> Result<BlockId> {
        self.program
            .lookup(name)
            .ok_or_else(|| Error::internal(format!("no block for \"{}\"", name)))
    }

    fn tag_context(&self) -> String {
        if self.tags.is_empty() {
            format!(" in {}", self.block.name)
        } else {
            format!(" in {} inside <{}>", self.block.name, self.tags.join("> <"))
        }
    }
}

fn unset(what: &str) -> Error {
    Error::internal(format!("{} has no resolved type", what))
}

fn field_operand(index: usize) -> Result<u16> {
    u16::try_from(index).map_err(|_| Error::internal("struct has more than 65535 fields"))
}
