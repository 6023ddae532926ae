// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # tessel-compiler
//!
//! A statically typed templating language for HTML and CSS, compiled to
//! bytecode and executed on a small stack VM.
//!
//! ## Overview
//!
//! The crate takes parsed source files (the [`ast`], usually read from JSON)
//! through three phases:
//! - the [`typer`] resolves names and types, reports diagnostics per file and
//!   annotates the AST in place
//! - the [`compiler`] lowers the annotated AST into one bytecode block per
//!   procedure, component, workspace and file
//! - the [`vm`] executes blocks and produces [`runtime::Node`] trees
//!
//! ## Quick Start
//!
//! ```rust
//! use tessel_compiler::ast::build::*;
//! use tessel_compiler::{Config, Session, Vm};
//!
//! // Greeting :: component { name: "world" } -> <p>"hello " + name</p>
//! let greeting = component(
//!     "Greeting",
//!     Some(vec![field("name", None, Some(expr(vec![text("world")])))]),
//!     vec![element("p", vec![], vec![stmt(expr(vec![text("hello "), ident("name"), add()]))])],
//! );
//! let mut files = vec![file("greeting.tsl", vec![greeting.into()])];
//!
//! let config = Config::default();
//! let mut session = Session::new(config.clone());
//! let program = session.compile(&mut files).unwrap();
//!
//! let nodes = Vm::new(&program, &config)
//!     .render("Greeting", vec![tessel_compiler::Value::String("tessel".into())])
//!     .unwrap();
//! assert_eq!(nodes[0].to_string(), "<p>hello tessel</p>");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod runtime;
pub mod session;
pub mod typer;
pub mod types;
pub mod vm;

// Re-exports for convenience
pub use compiler::Program;
pub use config::Config;
pub use diagnostics::Diagnostics;
pub use error::{Error, Result};
pub use runtime::{Node, Value};
pub use session::Session;
pub use types::{TypeId, TypeRegistry};
pub use vm::{Vm, VmError};
