//! C-minus Compiler
//!
//! Compiles a small C subset to MIPS assembly for the SPIM simulator.

mod backend;
mod frontend;
mod types;
mod utils;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use backend::{CodeGen, MipsCodeGen};
use frontend::checked::CheckedProgram;
use frontend::parser::parse_source;
use frontend::semantic;
use utils::Error;

/// C-minus Compiler
#[derive(Parser, Debug)]
#[command(name = "cmc")]
#[command(version)]
#[command(about = "C-minus compiler - emits MIPS assembly for SPIM")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input source file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file (defaults to the input with a .s extension)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a source file
    Build {
        /// Input source file
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a source file for errors
    Check {
        /// Input source file
        input: PathBuf,
    },
    /// Print the syntax tree as JSON
    Ast {
        /// Input source file
        input: PathBuf,
    },
    /// Print version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        let (message, status) = report(&err);
        eprintln!("{}", message);
        process::exit(status);
    }
}

/// Render a failure for stderr and pick the exit status
fn report(err: &anyhow::Error) -> (String, i32) {
    let mut message = format!("{:#}", err);
    let compiler_error = err.downcast_ref::<Error>();
    if let Some(code) = compiler_error.and_then(Error::code) {
        message.push_str(&format!("\nFailed semantic analysis: {}", code));
    }
    let fatal = compiler_error.map_or(false, Error::is_fatal);
    (message, if fatal { 2 } else { 1 })
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Build { input, output }) => compile_file(&input, output),
        Some(Commands::Check { input }) => check_file(&input),
        Some(Commands::Ast { input }) => print_ast(&input),
        Some(Commands::Version) => {
            println!("cmc {}", env!("CARGO_PKG_VERSION"));
            println!("C-minus Compiler (MIPS/SPIM backend)");
            println!("License: Apache-2.0");
            Ok(())
        }
        None => match cli.input {
            Some(input) => compile_file(&input, cli.output),
            None => anyhow::bail!("no input file specified\nUsage: cmc <FILE> or cmc build <FILE>"),
        },
    }
}

fn read_source(input: &Path) -> anyhow::Result<String> {
    fs::read_to_string(input).with_context(|| format!("error reading {}", input.display()))
}

/// Attach `file:line:col` to a compiler error
fn located(input: &Path, source: &str, err: Error) -> anyhow::Error {
    let location = match err.span() {
        Some(span) => {
            let (line, col) = span.line_col(source);
            format!("{}:{}:{}", input.display(), line, col)
        }
        None => input.display().to_string(),
    };
    anyhow::Error::new(err).context(location)
}

/// Parse and check a source text
fn check_source(source: &str) -> utils::Result<CheckedProgram> {
    let program = parse_source(source)?;
    log::info!("parsed {} declarations", program.decls.len());

    let checked = semantic::check(program)?;
    log::info!("semantic analysis passed");
    Ok(checked)
}

/// Compile a source text to assembly
fn compile_source(source: &str) -> utils::Result<String> {
    let checked = check_source(source)?;
    let mut codegen = MipsCodeGen::new();
    let asm = codegen.generate(&checked);
    log::info!("{} backend generated {} bytes for {}", codegen.name(), asm.len(), codegen.target());
    Ok(asm)
}

/// Compile a source file; nothing is written unless every stage succeeds
fn compile_file(input: &Path, output: Option<PathBuf>) -> anyhow::Result<()> {
    log::info!("compiling {}", input.display());
    let source = read_source(input)?;
    let asm = compile_source(&source).map_err(|err| located(input, &source, err))?;

    let out_path = output.unwrap_or_else(|| input.with_extension("s"));
    fs::write(&out_path, asm).with_context(|| format!("error writing {}", out_path.display()))?;
    println!("Output: {}", out_path.display());
    Ok(())
}

/// Check a source file for errors without generating code
fn check_file(input: &Path) -> anyhow::Result<()> {
    log::info!("checking {}", input.display());
    let source = read_source(input)?;
    check_source(&source).map_err(|err| located(input, &source, err))?;
    println!("No errors found");
    Ok(())
}

fn print_ast(input: &Path) -> anyhow::Result<()> {
    let source = read_source(input)?;
    let program = parse_source(&source).map_err(|err| located(input, &source, err))?;
    println!("{}", serde_json::to_string_pretty(&program)?);
    Ok(())
}
