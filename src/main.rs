// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! tessel - compiler and VM for a typed HTML/CSS templating language
//!
//! Reads source files in the JSON AST format produced by the parser, then
//! checks, compiles or executes them.

mod cli;

use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use owo_colors::OwoColorize;
use tessel_compiler::ast::SourceFile;
use tessel_compiler::{Config, Diagnostics, Program, Session, Vm};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands, RunArgs, SourceArgs};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    match &cli.command {
        Commands::Check(args) => {
            let mut files = read_sources(args)?;
            let mut session = Session::new(config);
            let result = session.check(&mut files);
            report(&mut io::stderr(), &session, result)?;
            println!("{} {} file(s) checked", "ok".green().bold(), files.len());
            Ok(())
        }
        Commands::Build(args) => {
            let mut session = Session::new(config);
            let program = compile(&args.sources, &mut session)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&program)?);
            } else {
                print!("{}", program);
            }
            Ok(())
        }
        Commands::Run(args) => execute(args, config),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let source = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            Config::from_toml_str(&source).with_context(|| format!("parsing {}", path.display()))?
        }
        None => Config::default(),
    };
    if cli.no_scope_css {
        config.scope_css = false;
    }
    if cli.emit_unused_css {
        config.emit_unused_css = true;
    }
    if let Some(depth) = cli.max_call_depth {
        config.max_call_depth = depth;
    }
    Ok(config)
}

fn read_sources(args: &SourceArgs) -> Result<Vec<SourceFile>> {
    args.files
        .iter()
        .map(|path| {
            let source = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let file: SourceFile =
                serde_json::from_str(&source).with_context(|| format!("parsing {}", path.display()))?;
            info!(path = %file.path, items = file.items.len(), "loaded source file");
            Ok(file)
        })
        .collect()
}

fn compile(args: &SourceArgs, session: &mut Session) -> Result<Program> {
    let mut files = read_sources(args)?;
    let result = session.compile(&mut files);
    report(&mut io::stderr(), session, result)
}

/// Prints everything the session collected before a failure surfaces.
fn report<T>(out: &mut impl Write, session: &Session, result: tessel_compiler::Result<T>) -> Result<T> {
    if result.is_err() {
        write_diagnostics(out, session.diagnostics())?;
    }
    Ok(result?)
}

fn execute(args: &RunArgs, config: Config) -> Result<()> {
    let mut session = Session::new(config);
    let program = compile(&args.sources, &mut session)?;
    let mut vm = Vm::new(&program, session.config());

    let output = match (&args.file, &args.workspace) {
        (Some(path), _) => {
            let nodes = vm.render_file(path)?;
            let css: String = program.styles.iter().map(|style| style.to_string()).collect();
            serde_json::json!({
                "nodes": nodes,
                "styles": program.styles,
                "css": css,
            })
        }
        (None, Some(name)) => {
            let id = program
                .workspace(name)
                .ok_or_else(|| anyhow!("no workspace named \"{}\"", name))?;
            let value = vm
                .execute(id)?
                .ok_or_else(|| anyhow!("workspace \"{}\" produced no value", name))?;
            serde_json::to_value(&value)?
        }
        (None, None) => return Err(anyhow!("pass --file or --workspace")),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn write_diagnostics(out: &mut impl Write, diagnostics: &Diagnostics) -> io::Result<()> {
    let mut current = None;
    for (file, diagnostic) in diagnostics.iter() {
        if current != Some(file) {
            writeln!(out, "{}", file.bold())?;
            current = Some(file);
        }
        writeln!(
            out,
            "  {} {}: {}",
            "error".red().bold(),
            format!("line {}", diagnostic.line).dimmed(),
            diagnostic.message
        )?;
    }
    Ok(())
}
