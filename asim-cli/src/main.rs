//! ASIM - Assembly Simulator
//! Command-line interface for running and debugging register-machine programs

mod console;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use asim_core::prelude::*;
use clap::{Args, Parser, Subcommand};
use colored::*;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use console::{format_memory, format_registers, format_vectors, paint, Console};

#[derive(Parser)]
#[command(name = "asim")]
#[command(author = "ASIM Contributors")]
#[command(version = "2026.1.16")]
#[command(about = "ASIM - Teaching assembly simulator", long_about = None)]
struct Cli {
    /// Verbose logging (-v for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Machine settings shared by `run` and `debug`
#[derive(Args, Debug, Clone)]
struct MachineArgs {
    /// Register width in bits (8, 16 or 32)
    #[arg(long, value_name = "BITS", env = "ASIM_BIT_WIDTH")]
    bit_width: Option<u32>,

    /// Memory capacity in cells
    #[arg(long, value_name = "CELLS", env = "ASIM_MEMORY_SIZE")]
    memory_size: Option<usize>,

    /// Step limit for one run (0 = unlimited)
    #[arg(long, value_name = "STEPS")]
    max_steps: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program to completion
    Run {
        /// Assembly source file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        machine: MachineArgs,

        /// Delay between instructions in milliseconds
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,

        /// Print machine state when reaching LINE (1-based, repeatable)
        #[arg(short = 'b', long = "break", value_name = "LINE")]
        breakpoints: Vec<usize>,

        /// Emit every engine event as a JSON line
        #[arg(long)]
        json_events: bool,

        /// Dump memory cells after the run
        #[arg(long, value_name = "START:LEN", value_parser = parse_range)]
        dump_memory: Option<(usize, usize)>,
    },

    /// Validate a program and print its listing
    Check {
        /// Assembly source file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Open the interactive debug console
    Debug {
        /// Assembly source file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        machine: MachineArgs,
    },

    /// Show the instruction set
    Info,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            file,
            machine,
            interval_ms,
            breakpoints,
            json_events,
            dump_memory,
        } => run_command(&file, &machine, interval_ms, &breakpoints, json_events, dump_memory),
        Commands::Check { file } => check_command(&file),
        Commands::Debug { file, machine } => debug_command(&file, &machine),
        Commands::Info => {
            print_info();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = if verbose > 0 {
        "asim=debug,asim_core=debug"
    } else {
        "asim=info,asim_core=warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Parses `START:LEN`
fn parse_range(s: &str) -> Result<(usize, usize), String> {
    let (start, len) = s
        .split_once(':')
        .ok_or_else(|| format!("expected START:LEN, got '{}'", s))?;
    let start = start.trim().parse().map_err(|_| format!("invalid start '{}'", start))?;
    let len = len.trim().parse().map_err(|_| format!("invalid length '{}'", len))?;
    Ok((start, len))
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn build_config(machine: &MachineArgs) -> Result<EngineConfig> {
    let mut config = EngineConfig::default();
    if let Some(bits) = machine.bit_width {
        config = config.with_bit_width(BitWidth::from_bits(bits)?);
    }
    if let Some(cells) = machine.memory_size {
        if cells == 0 {
            bail!("memory size must be at least 1 cell");
        }
        config = config.with_memory_size(cells);
    }
    if let Some(steps) = machine.max_steps {
        config = config.with_max_steps(steps);
    }
    Ok(config)
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUN
// ═══════════════════════════════════════════════════════════════════════════════

fn run_command(
    file: &Path,
    machine: &MachineArgs,
    interval_ms: Option<u64>,
    breakpoints: &[usize],
    json_events: bool,
    dump_memory: Option<(usize, usize)>,
) -> Result<()> {
    let source = read_source(file)?;
    let mut config = build_config(machine)?;
    if let Some(ms) = interval_ms {
        config = config.with_run_interval(Duration::from_millis(ms));
    }

    let mut engine = Engine::with_config(config);
    if json_events {
        engine.subscribe(EventFilter::All, |event| {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{}", line);
            }
        });
    } else {
        engine.subscribe(EventFilter::Output, |event| {
            if let Event::Output { text, severity, .. } = event {
                // Runtime errors are reported once, by main
                if *severity != Severity::Error {
                    println!("{}", paint(*severity, text));
                }
            }
        });
    }

    engine.load_program(&source)?;
    tracing::info!(file = %file.display(), width = %engine.state().bit_width(), "running");

    let set = Breakpoints::new();
    for &line in breakpoints {
        if line == 0 || line > engine.program().len() {
            bail!("breakpoint line {} is outside the program (1..={})", line, engine.program().len());
        }
        set.add(line - 1);
    }
    if !set.is_empty() {
        engine.set_breakpoint_hook(set.hook());
    }

    let result = run_to_end(&mut engine, json_events);

    if !json_events {
        println!();
        println!("{}", format_registers(&engine));
        println!("{}", format_vectors(&engine));
        if let Some((start, len)) = dump_memory {
            if start >= engine.memory().len() {
                bail!("memory dump start {} is outside memory ({} cells)", start, engine.memory().len());
            }
            println!("{}", format_memory(engine.memory(), start, len));
        }
    }

    result
}

/// Runs until completion, printing the machine state at each breakpoint
fn run_to_end(engine: &mut Engine, quiet: bool) -> Result<()> {
    loop {
        match engine.run()? {
            RunOutcome::Breakpoint { .. } => {
                if !quiet {
                    println!("{}", format_registers(engine));
                }
            }
            RunOutcome::Completed | RunOutcome::Stopped => return Ok(()),
            RunOutcome::StepLimit { steps } => {
                tracing::warn!(steps, "run stopped at step limit");
                return Ok(());
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHECK
// ═══════════════════════════════════════════════════════════════════════════════

fn check_command(file: &Path) -> Result<()> {
    let source = read_source(file)?;
    let program = Program::parse(&source)?;

    println!("{}", "Listing:".bold());
    print!("{}", program.listing());
    println!();

    println!("{}", "Labels:".bold());
    if program.labels().is_empty() {
        println!("  (none)");
    }
    for (name, index) in program.labels().sorted() {
        println!("  {:<16} line {}", name.cyan(), index + 1);
    }
    println!();

    let problems = validate(&program);
    for problem in &problems {
        println!("  {} {}", "✗".red(), problem);
    }
    if !problems.is_empty() {
        bail!("{} problem(s) found in {}", problems.len(), file.display());
    }

    println!(
        "{} {} ({} instruction(s))",
        "✓".green(),
        "Program is valid".green().bold(),
        program.instruction_count()
    );
    Ok(())
}

/// Static checks: known opcodes, operand counts and jump targets
fn validate(program: &Program) -> Vec<String> {
    let mut problems = Vec::new();
    for stmt in program.statements() {
        let Some(inst) = stmt.instruction() else {
            continue;
        };
        let line = stmt.index + 1;

        let opcode: Opcode = match inst.mnemonic.parse() {
            Ok(op) => op,
            Err(e) => {
                problems.push(format!("Line {}: {}", line, e));
                continue;
            }
        };
        if inst.operands.len() != opcode.arity() {
            let err = VmError::ArityMismatch {
                opcode: opcode.mnemonic(),
                expected: opcode.arity(),
                found: inst.operands.len(),
            };
            problems.push(format!("Line {}: {}", line, err));
            continue;
        }

        let takes_label = opcode == Opcode::Jmp || opcode == Opcode::Call || opcode.is_conditional_jump();
        if takes_label {
            if let Err(e) = program.labels().resolve(&inst.operands[0]) {
                problems.push(format!("Line {}: {}", line, e));
            }
        }
    }
    problems
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEBUG
// ═══════════════════════════════════════════════════════════════════════════════

fn debug_command(file: &Path, machine: &MachineArgs) -> Result<()> {
    let source = read_source(file)?;
    let config = build_config(machine)?.with_run_interval(Duration::ZERO);
    let mut console = Console::new(Engine::with_config(config), &source)?;
    console.run()?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// INFO
// ═══════════════════════════════════════════════════════════════════════════════

const CATEGORIES: [OpcodeCategory; 6] = [
    OpcodeCategory::Arithmetic,
    OpcodeCategory::Data,
    OpcodeCategory::Stack,
    OpcodeCategory::Control,
    OpcodeCategory::Simd,
    OpcodeCategory::Config,
];

fn print_info() {
    println!("{}", "ASIM - Teaching Assembly Simulator".bold());
    println!();
    println!("A register machine with 7 general registers (r0-r6), a downward stack,");
    println!("numeric memory and 4 four-lane vector registers (v0-v3).");
    println!();

    println!("{}", "Instruction Set:".bold());
    for category in CATEGORIES {
        let ops: Vec<String> = Opcode::ALL
            .iter()
            .filter(|op| op.category() == category)
            .map(|op| format!("{}/{}", op.mnemonic(), op.arity()))
            .collect();
        println!("  {:<15} {}", format!("{}:", category).cyan(), ops.join("  "));
    }
    println!();

    println!("{}", "Operands:".bold());
    println!("  r0-r6, SP, PC, FLAGS, FLAG, OVERFLOW    registers");
    println!("  42, -7, 0x2A, 0b101010                  literals");
    println!("  [12], [r1], [r1+4], [4+r1]              memory references");
    println!();

    println!("{}", "Commands:".bold());
    println!("  asim run program.asm                 # Run to completion");
    println!("  asim run program.asm -b 4 -b 9       # Print state at lines 4 and 9");
    println!("  asim run program.asm --json-events   # Stream events as JSON");
    println!("  asim check program.asm               # Validate and list");
    println!("  asim debug program.asm               # Interactive console");
    println!();
    println!("{}", "Environment:".bold());
    println!("  ASIM_MEMORY_SIZE, ASIM_BIT_WIDTH, ASIM_RUN_INTERVAL_MS,");
    println!("  ASIM_MAX_STEPS, ASIM_EVENT_HISTORY   (also read from .env)");
}
