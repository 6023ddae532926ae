//! Compiler and VM configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings shared by the emitter and the VM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rewrite class names to `{Component}__{class}`
    pub scope_css: bool,

    /// Emit styles of components nothing invokes
    pub emit_unused_css: bool,

    /// Maximum nesting of `Call` instructions
    pub max_call_depth: usize,

    /// Initial capacity of each operand stack
    pub operand_stack_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scope_css: true,
            emit_unused_css: false,
            max_call_depth: 256,
            operand_stack_capacity: 256,
        }
    }
}

impl Config {
    /// Parses a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }
}
