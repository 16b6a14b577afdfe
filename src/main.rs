use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use mandrill::backend;
use mandrill::bytecode::{self, CompiledProgram, format};
use mandrill::config::{Config, Overrides};
use mandrill::error::Error;
use mandrill::lexer::Lexer;
use mandrill::pipeline::{self, RunFailure};
use mandrill::runtime::{Io, Output};
use mandrill::token::TokenKind;
use mandrill::vm::{PreparedVM, VmConfig};

/// Mandrill toolchain: tree-walking interpreter, bytecode compiler and stack VM.
#[derive(Parser, Debug)]
#[command(name = "mandrill", version, about, long_about = None)]
struct Cli {
    /// Raise log verbosity (-v for debug, -vv for trace). MANDRILL_LOG overrides it.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a source program; reads stdin when no file is given.
    Run {
        /// Execution backend: interpreter or vm.
        #[arg(short, long)]
        backend: Option<String>,
        /// Abort after this many execution steps.
        #[arg(long)]
        max_steps: Option<u64>,
        /// File fed to read() and getc().
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// YAML run configuration; flags override its values.
        #[arg(short, long)]
        config: Option<PathBuf>,
        file: Option<PathBuf>,
    },
    /// Compile a source program to a bytecode file.
    Compile {
        file: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Run a bytecode file on the VM.
    Exec {
        file: PathBuf,
        #[arg(long)]
        max_steps: Option<u64>,
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Print the token stream of a source file.
    Tokens { file: PathBuf },
    /// Print the disassembly of a source or bytecode file.
    Disasm { file: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<Error>() {
                Some(error) => eprintln!("{}", error.report()),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("MANDRILL_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn execute(command: Command) -> Result<()> {
    match command {
        Command::Run {
            backend,
            max_steps,
            input,
            config,
            file,
        } => {
            let config = match config {
                Some(path) => Config::load(&path)?,
                None => Config::default(),
            };
            let settings = config.resolve(Overrides {
                backend,
                max_steps,
                input,
            })?;
            debug!(?settings, "resolved run settings");

            let source = read_source(file.as_deref())?;
            let input = read_input(settings.input.as_deref())?;
            let backend = backend::backend_by_name(&settings.backend, settings.limits)
                .with_context(|| format!("Unknown backend '{}'", settings.backend))?;
            finish_run(pipeline::run_with_backend(backend.as_ref(), &source, &input))
        }
        Command::Compile { file, output } => {
            let source = read_source(Some(&file))?;
            let compiled = pipeline::compile_source(&source)?;
            let bytes = format::encode(&compiled).map_err(Error::from)?;
            fs::write(&output, bytes).with_context(|| format!("Writing {}", output.display()))?;
            Ok(())
        }
        Command::Exec {
            file,
            max_steps,
            input,
        } => {
            let bytes = fs::read(&file).with_context(|| format!("Reading {}", file.display()))?;
            let compiled = format::decode(&bytes).map_err(Error::from)?;
            let prepared =
                PreparedVM::load(compiled, VmConfig { max_steps }).map_err(Error::from)?;
            let mut io = Io::new(&read_input(input.as_deref())?);
            let result = prepared.run_with_io(&mut io);
            finish_run(match result {
                Ok(()) => Ok(io.output),
                Err(error) => Err(RunFailure {
                    error: error.into(),
                    output: io.output,
                }),
            })
        }
        Command::Tokens { file } => {
            let source = read_source(Some(&file))?;
            let mut stdout = io::stdout().lock();
            for token in Lexer::new(&source) {
                let token = token.map_err(Error::from)?;
                let lexeme = match token.kind {
                    TokenKind::Eof => "<eof>",
                    _ => token.lexeme,
                };
                writeln!(
                    stdout,
                    "{}:{} {} {}",
                    token.span.line,
                    token.span.column,
                    token.kind.category(),
                    lexeme
                )?;
            }
            Ok(())
        }
        Command::Disasm { file } => {
            let compiled = load_compiled(&file)?;
            print!("{compiled}");
            Ok(())
        }
    }
}

/// Prints whatever the program produced, then surfaces its failure, if any.
fn finish_run(result: Result<Output, RunFailure>) -> Result<()> {
    let (output, error) = match result {
        Ok(output) => (output, None),
        Err(failure) => (failure.output, Some(failure.error)),
    };
    let mut stdout = io::stdout().lock();
    stdout.write_all(output.text().as_bytes())?;
    stdout.flush()?;
    match error {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

fn load_compiled(path: &Path) -> Result<CompiledProgram> {
    let bytes = fs::read(path).with_context(|| format!("Reading {}", path.display()))?;
    if bytes.starts_with(format::MAGIC) {
        return Ok(format::decode(&bytes).map_err(Error::from)?);
    }
    let source =
        String::from_utf8(bytes).with_context(|| format!("Decoding {}", path.display()))?;
    let program = pipeline::parse_source(&source)?;
    Ok(bytecode::compile(&program).map_err(Error::from)?)
}

fn read_source(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))
        }
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Reading stdin")?;
            Ok(buffer)
        }
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Reading input {}", path.display()))
        }
        None => Ok(String::new()),
    }
}
