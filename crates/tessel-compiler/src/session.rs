//! The check, emit and compile pipeline.

use tracing::{debug, info};

use crate::ast::SourceFile;
use crate::compiler::{Emitter, Program};
use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::typer::Typer;
use crate::types::TypeRegistry;

/// Owns the type registry and diagnostics for one set of source files.
///
/// A session checks its files once; check a changed file set with a new
/// session.
#[derive(Debug)]
pub struct Session {
    config: Config,
    registry: TypeRegistry,
    diagnostics: Diagnostics,
    checked: bool,
}

impl Session {
    /// Creates a session with a fresh registry.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: TypeRegistry::new(),
            diagnostics: Diagnostics::new(),
            checked: false,
        }
    }

    /// Type checks and annotates `files`. Fails with [`Error::Semantic`]
    /// when any diagnostic was reported.
    pub fn check(&mut self, files: &mut [SourceFile]) -> Result<()> {
        if self.checked {
            return Err(Error::internal("a session can only check one set of files"));
        }
        self.checked = true;

        Typer::new(&mut self.registry, &mut self.diagnostics).check(files)?;
        if self.diagnostics.has_errors() {
            info!(errors = self.diagnostics.error_count(), "type checking failed");
            return Err(Error::Semantic(self.diagnostics.clone()));
        }
        Ok(())
    }

    /// Emits bytecode for files annotated by [`Session::check`].
    pub fn emit(&self, files: &[SourceFile]) -> Result<Program> {
        if !self.checked {
            return Err(Error::internal("files must be checked before emission"));
        }
        if self.diagnostics.has_errors() {
            return Err(Error::Semantic(self.diagnostics.clone()));
        }
        let program = Emitter::new(&self.registry, &self.config, files).emit()?;
        debug!(
            blocks = program.blocks.len(),
            styles = program.styles.len(),
            "emitted program"
        );
        Ok(program)
    }

    /// Checks then emits.
    pub fn compile(&mut self, files: &mut [SourceFile]) -> Result<Program> {
        self.check(files)?;
        self.emit(files)
    }

    /// Diagnostics reported so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// The type registry.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// The session configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}
