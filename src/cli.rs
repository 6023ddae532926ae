//! Command line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// tessel - compiler and VM for a typed HTML/CSS templating language
#[derive(Parser, Debug)]
#[command(name = "tessel")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Keep class names as written
    #[arg(long, global = true)]
    pub no_scope_css: bool,

    /// Emit styles of components that are never invoked
    #[arg(long, global = true)]
    pub emit_unused_css: bool,

    /// Maximum nesting of calls at runtime
    #[arg(long, global = true)]
    pub max_call_depth: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Type check AST files and report diagnostics
    Check(SourceArgs),

    /// Compile AST files and print the bytecode listing
    Build(BuildArgs),

    /// Compile AST files and execute a template file or workspace
    Run(RunArgs),
}

/// Input files shared by every command.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Source files in the JSON AST format
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub sources: SourceArgs,

    /// Print the program as JSON instead of a listing
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub sources: SourceArgs,

    /// Path of the template file to render
    #[arg(long, conflicts_with = "workspace", required_unless_present = "workspace")]
    pub file: Option<String>,

    /// Name of the workspace to evaluate
    #[arg(long)]
    pub workspace: Option<String>,
}
