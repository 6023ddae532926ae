//! Local slot allocation during emission.

use crate::Error;
use crate::types::TypeId;

/// A named or hidden local.
#[derive(Debug, Clone)]
pub struct Local {
    /// The variable name, empty for compiler temporaries
    pub name: String,
    /// Frame slot
    pub slot: u16,
    /// Static type
    pub ty: TypeId,
    /// The scope depth where this was declared
    pub depth: usize,
}

/// Locals of the block being compiled.
#[derive(Debug, Default)]
pub struct Scope {
    /// Locals in declaration order
    pub locals: Vec<Local>,
    /// Current scope depth (0 = block level)
    pub depth: usize,
    next_slot: usize,
    max_slots: usize,
}

impl Scope {
    /// Creates a scope for a new block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a nested scope.
    pub fn begin_scope(&mut self) {
        self.depth += 1;
    }

    /// End the current scope; its slots become free for reuse.
    pub fn end_scope(&mut self) {
        while let Some(local) = self.locals.last() {
            if local.depth < self.depth {
                break;
            }
            self.next_slot = local.slot as usize;
            self.locals.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Declare a local in the current scope and return its slot.
    pub fn declare(&mut self, name: &str, ty: TypeId) -> Result<u16, Error> {
        for local in self.locals.iter().rev() {
            if local.depth < self.depth {
                break;
            }
            if !name.is_empty() && local.name == name {
                return Err(Error::internal(format!(
                    "local \"{}\" is bound twice in one scope",
                    name
                )));
            }
        }

        let slot = u16::try_from(self.next_slot)
            .map_err(|_| Error::internal("a block needs more than 65535 local slots"))?;
        self.locals.push(Local {
            name: name.to_string(),
            slot,
            ty,
            depth: self.depth,
        });
        self.next_slot += 1;
        self.max_slots = self.max_slots.max(self.next_slot);
        Ok(slot)
    }

    /// Allocate a compiler temporary.
    pub fn hidden(&mut self, ty: TypeId) -> Result<u16, Error> {
        self.declare("", ty)
    }

    /// Resolve a named local, innermost first.
    pub fn resolve(&self, name: &str) -> Option<&Local> {
        self.locals
            .iter()
            .rev()
            .find(|local| !local.name.is_empty() && local.name == name)
    }

    /// Frame size needed so far.
    pub fn frame_size(&self) -> usize {
        self.max_slots
    }
}
