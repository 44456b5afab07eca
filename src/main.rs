use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ahmes::assembler::assemble;
use ahmes::image::{self, ProgramImage};
use ahmes::listing;
use ahmes::machine::{Machine, RunConfig};
use ahmes::soak::{self, SoakConfig, SoakReport};
use ahmes::substrate::Ahmes;
use ahmes::{Error, InstructionTable};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;

#[derive(Parser)]
#[command(name = "ahmes", about = "Ahmes: an 8-bit educational accumulator machine")]
struct Cli {
    /// Log more (-v info, -vv debug with per-instruction trace, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a source file into a memory image.
    Assemble {
        /// Whitespace-separated mnemonics and decimal bytes.
        source: PathBuf,

        /// Write a .mem container here instead of printing the memory dump.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load an image and run it until HLT or the step budget runs out.
    Run {
        /// A .mem container, or source text with --asm.
        image: PathBuf,

        /// Treat IMAGE as assembler source.
        #[arg(long)]
        asm: bool,

        /// Max instructions to execute.
        #[arg(long, default_value_t = RunConfig::default().step_limit)]
        steps: usize,

        /// Stop on the first undocumented opcode instead of falling back.
        #[arg(long)]
        strict: bool,
    },

    /// Print a disassembly of an image.
    Disasm {
        /// A .mem container, or source text with --asm.
        image: PathBuf,

        /// Treat IMAGE as assembler source.
        #[arg(long)]
        asm: bool,
    },

    /// Run many random images and print a CSV summary.
    Soak {
        /// Random seed for reproducibility.
        #[arg(long)]
        seed: u64,

        /// Number of random images.
        #[arg(long, default_value_t = SoakConfig::default().images)]
        images: usize,

        /// Max instructions per image.
        #[arg(long, default_value_t = SoakConfig::default().step_limit)]
        steps: usize,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new().with_level(level).init()?;

    let table = InstructionTable::shared();
    match cli.command {
        Command::Assemble { source, output } => {
            let Some(image) = read_image(&source, true, table)? else {
                return Ok(not_found(&source));
            };
            match output {
                Some(path) => {
                    image::save(&path, &image)
                        .with_context(|| format!("writing {}", path.display()))?;
                    log::info!("wrote {}", path.display());
                }
                None => println!("{}", listing::dump(image.bytes())),
            }
        }
        Command::Run {
            image,
            asm,
            steps,
            strict,
        } => {
            let Some(program) = read_image(&image, asm, table)? else {
                return Ok(not_found(&image));
            };
            let config = RunConfig {
                step_limit: steps,
                strict,
            };
            let mut machine = Machine::new(table);
            machine.load_program(&program);
            let status = run_status(machine.run_with(&config), &machine)?;
            println!("{machine}");
            println!("{}", listing::dump(machine.memory()));
            return Ok(status);
        }
        Command::Disasm { image, asm } => {
            let Some(program) = read_image(&image, asm, table)? else {
                return Ok(not_found(&image));
            };
            print!("{}", listing::disassemble(program.bytes(), table));
        }
        Command::Soak {
            seed,
            images,
            steps,
        } => {
            let config = SoakConfig {
                images,
                step_limit: steps,
            };
            let report = soak::run::<Ahmes>(&config, seed);
            println!("{}", SoakReport::csv_header());
            println!("{}", report.csv_row());
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Load a container or assemble a source file. `Ok(None)` if the file does
/// not exist.
fn read_image(path: &Path, asm: bool, table: &InstructionTable) -> Result<Option<ProgramImage>> {
    if !asm {
        return image::load(path).with_context(|| format!("loading {}", path.display()));
    }
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    let image = assemble(&source, table).with_context(|| format!("assembling {}", path.display()))?;
    Ok(Some(image))
}

/// Exit status for a finished `run`. Running out of budget is only worth a
/// warning; a strict-mode rejection is a failure.
fn run_status(result: ahmes::Result<usize>, machine: &Machine) -> Result<ExitCode> {
    match result {
        Ok(executed) if machine.is_running() => {
            log::warn!("stopped after {executed} steps without reaching HLT");
            Ok(ExitCode::SUCCESS)
        }
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(Error::UnmappedOpcode(op)) => {
            log::warn!("strict mode: undocumented opcode {op} at pc={}", machine.pc());
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

fn not_found(path: &Path) -> ExitCode {
    log::error!("{}: not found", path.display());
    ExitCode::FAILURE
}
