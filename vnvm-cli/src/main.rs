//! VNVM shell.

use std::path::PathBuf;
use std::process;

use argh::FromArgs;

use vnvm_core::assembler::{disassemble, Assembler};
use vnvm_core::bytecode::Program;
use vnvm_core::collaborators::Bitmap;
use vnvm_core::errors::CResult;
use vnvm_core::headless::{NullDisplaySink, NullSayDispatch, SystemClock};
use vnvm_core::runtime::{Collaborators, Runtime};

/// VNVM bytecode assembler and runtime
#[derive(FromArgs)]
pub struct Args {
    /// verbose mode
    #[argh(switch, short = 'v')]
    pub verbose: bool,

    /// subcommand
    #[argh(subcommand)]
    pub nested: SubCommands,
}

/// Subcommands
#[derive(FromArgs)]
#[argh(subcommand)]
pub enum SubCommands {
    /// Assemble command
    Assemble(AssembleCommand),
    /// Disassemble command
    Disassemble(DisassembleCommand),
    /// Run command
    Run(RunCommand),
    /// Version command
    Version(VersionCommand),
}

/// assemble a source file into a program
#[derive(FromArgs)]
#[argh(subcommand, name = "assemble")]
pub struct AssembleCommand {
    /// source assembly path
    #[argh(positional)]
    pub source: PathBuf,

    /// output file
    #[argh(positional)]
    pub output: PathBuf,
}

/// disassemble a program into source text
#[derive(FromArgs)]
#[argh(subcommand, name = "disassemble")]
pub struct DisassembleCommand {
    /// program path
    #[argh(positional)]
    pub file: PathBuf,

    /// output file (omit argument for stdout)
    #[argh(option, short = 'o')]
    pub output: Option<PathBuf>,
}

/// run a program to completion against the headless collaborators
#[derive(FromArgs)]
#[argh(subcommand, name = "run")]
pub struct RunCommand {
    /// program path
    #[argh(positional)]
    pub file: PathBuf,

    /// trace each dispatched instruction
    #[argh(switch, short = 't')]
    pub trace: bool,
}

/// show version
#[derive(FromArgs)]
#[argh(subcommand, name = "version")]
pub struct VersionCommand {}

fn main() -> CResult {
    let args: Args = argh::from_env();
    parse_args(args)
}

fn parse_args(args: Args) -> CResult {
    let subscriber = tracing_subscriber::fmt();
    if args.verbose {
        subscriber.with_max_level(tracing::Level::TRACE).compact().init();
    } else {
        subscriber.compact().init();
    }

    match args.nested {
        SubCommands::Version(_) => {
            let cmd_name = std::env::current_exe()?
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            println!("{} {}", cmd_name, env!("CARGO_PKG_VERSION"));
        }
        SubCommands::Assemble(cmd) => {
            let assembler = match Assembler::from_path(&cmd.source) {
                Ok(assembler) => assembler,
                Err(e) => {
                    eprintln!("{e}");
                    process::exit(1);
                }
            };
            match assembler.assemble() {
                Ok(program) => program.save_to_path(&cmd.output)?,
                Err(e) => {
                    eprintln!("{e}");
                    process::exit(1);
                }
            }
        }
        SubCommands::Disassemble(cmd) => {
            let program = Program::load_from_path(&cmd.file)?;
            let text = disassemble(&program)?;
            match cmd.output {
                Some(path) => std::fs::write(path, text)?,
                None => print!("{text}"),
            }
        }
        SubCommands::Run(cmd) => {
            let program = Program::load_from_path(&cmd.file)?;
            let runtime = Runtime::new(program, Collaborators {
                image_loader: std::sync::Arc::new(CliImageLoader),
                display_sink: Box::new(NullDisplaySink),
                say_dispatch: Box::new(NullSayDispatch),
                clock: std::sync::Arc::new(SystemClock::default()),
            });
            if let Err(e) = runtime.start() {
                eprintln!("execution error: {e}");
                process::exit(1);
            }
            runtime.join();
        }
    }

    Ok(())
}

/// Reads sprite image files from disk without decoding their pixel format;
/// good enough for a headless `run` that never actually renders.
struct CliImageLoader;

impl vnvm_core::collaborators::ImageLoader for CliImageLoader {
    fn load(&self, path: &str) -> CResult<Bitmap> {
        let bytes = std::fs::read(path)?;
        Ok(Bitmap::new(bytes.len().max(1) as u32, 1, vec![0, 0, 0, 255]))
    }
}
