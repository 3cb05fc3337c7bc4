//! Interactive debug console
//!
//! # Uso
//!
//! ```text
//! $ asim debug program.asm
//! asim> break 4
//! Breakpoint 1 set at line 4
//! asim> continue
//! Breakpoint reached at line 4
//! → line 4: ADD r0, r1
//! asim> regs
//! asim> step 3
//! asim> quit
//! ```

use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};

use asim_core::prelude::*;
use asim_core::vm::{Statement, GENERAL_REGISTERS};
use colored::*;

/// Cells shown by `mem` when no count is given
const DEFAULT_MEM_CELLS: usize = 8;
const CELLS_PER_ROW: usize = 8;

/// Result of one console command
#[derive(Debug, PartialEq)]
pub enum ConsoleResult {
    Continue,
    Output(String),
    Error(String),
    Exit,
}

/// Colors a message by severity
pub fn paint(severity: Severity, text: &str) -> String {
    match severity {
        Severity::Info => text.cyan().to_string(),
        Severity::Success => text.green().to_string(),
        Severity::Warning => text.yellow().to_string(),
        Severity::Error => text.red().to_string(),
    }
}

/// Parses `42`, `0x2A` or `0b101010`
fn parse_number(token: &str) -> Option<usize> {
    let lower = token.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        usize::from_str_radix(bin, 2).ok()
    } else {
        lower.parse().ok()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONSOLE STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Debug console around one engine
pub struct Console {
    engine: Engine,
    /// Source kept for `reset`
    source: String,
    breakpoints: Breakpoints,
    /// Engine output collected between commands
    messages: Arc<Mutex<Vec<(Severity, String)>>>,
    history: Vec<String>,
    running: bool,
}

impl Console {
    /// Loads `source` into `engine` and installs the breakpoint hook
    pub fn new(mut engine: Engine, source: &str) -> Result<Self, VmError> {
        let breakpoints = Breakpoints::new();
        engine.set_breakpoint_hook(breakpoints.hook());

        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&messages);
        engine.subscribe(EventFilter::Output, move |event| {
            if let Event::Output { text, severity, .. } = event {
                // Errors come back through the command result
                if *severity != Severity::Error {
                    if let Ok(mut messages) = sink.lock() {
                        messages.push((*severity, text.clone()));
                    }
                }
            }
        });

        engine.load_program(source)?;
        Ok(Self {
            engine,
            source: source.to_string(),
            breakpoints,
            messages,
            history: Vec::new(),
            running: true,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Reads commands from stdin until `quit` or end of input
    pub fn run(&mut self) -> io::Result<()> {
        self.print_banner();
        if let Some(messages) = self.drain_messages() {
            println!("{}", messages);
        }

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        while self.running {
            print!("{} ", "asim>".bold());
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }

            match self.process_line(&line) {
                ConsoleResult::Continue => {}
                ConsoleResult::Output(s) => println!("{}", s),
                ConsoleResult::Error(e) => eprintln!("{} {}", "error:".red().bold(), e),
                ConsoleResult::Exit => break,
            }
        }

        Ok(())
    }

    fn print_banner(&self) {
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║                     ASIM Debug Console                       ║");
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║  Lines are 1-based  │  Type help for commands                ║");
        println!("╚══════════════════════════════════════════════════════════════╝");
        println!();
    }

    /// Processes one input line
    pub fn process_line(&mut self, line: &str) -> ConsoleResult {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&cmd, args)) = parts.split_first() else {
            return ConsoleResult::Continue;
        };
        self.history.push(line.trim().to_string());

        let result = match cmd {
            "step" | "s" | "n" => self.cmd_step(args),
            "continue" | "c" | "run" => self.cmd_continue(),
            "break" | "b" => self.cmd_break(args),
            "delete" | "d" => self.cmd_delete(args),
            "list" | "l" => self.cmd_list(),
            "regs" | "r" => self.cmd_registers(),
            "mem" | "m" => self.cmd_memory(args),
            "vec" | "v" => self.cmd_vectors(),
            "reset" => self.cmd_reset(),
            "width" | "w" => self.cmd_width(args),
            "program" | "p" => ConsoleResult::Output(self.engine.program().listing()),
            "help" | "h" | "?" => self.cmd_help(),
            "quit" | "q" | "exit" => {
                self.running = false;
                ConsoleResult::Exit
            }
            _ => ConsoleResult::Error(format!("Unknown command: {}", cmd)),
        };

        self.with_messages(result)
    }

    fn drain_messages(&self) -> Option<String> {
        let mut messages = self.messages.lock().ok()?;
        if messages.is_empty() {
            return None;
        }
        let text = messages
            .drain(..)
            .map(|(severity, text)| paint(severity, &text))
            .collect::<Vec<_>>()
            .join("\n");
        Some(text)
    }

    /// Prepends engine messages produced while the command ran
    fn with_messages(&self, result: ConsoleResult) -> ConsoleResult {
        let Some(messages) = self.drain_messages() else {
            return result;
        };
        match result {
            ConsoleResult::Continue => ConsoleResult::Output(messages),
            ConsoleResult::Output(s) => ConsoleResult::Output(format!("{}\n{}", messages, s)),
            ConsoleResult::Error(e) => ConsoleResult::Error(format!("{}\n{}", messages, e)),
            ConsoleResult::Exit => ConsoleResult::Exit,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXECUTION
    // ═══════════════════════════════════════════════════════════════════════════

    fn cmd_step(&mut self, args: &[&str]) -> ConsoleResult {
        let count = match args.first() {
            Some(arg) => match parse_number(arg) {
                Some(n) if n > 0 => n,
                _ => return ConsoleResult::Error(format!("Invalid step count: {}", arg)),
            },
            None => 1,
        };

        for _ in 0..count {
            match self.engine.step() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return ConsoleResult::Error(e.to_string()),
            }
        }
        ConsoleResult::Output(self.location())
    }

    fn cmd_continue(&mut self) -> ConsoleResult {
        if self.engine.status().is_stopped() {
            return ConsoleResult::Output("Program has ended; use reset to restart".to_string());
        }
        match self.engine.run() {
            Ok(_) => ConsoleResult::Output(self.location()),
            Err(e) => ConsoleResult::Error(e.to_string()),
        }
    }

    fn cmd_reset(&mut self) -> ConsoleResult {
        self.engine.reset();
        match self.engine.load_program(&self.source) {
            Ok(()) => ConsoleResult::Output(self.location()),
            Err(e) => ConsoleResult::Error(e.to_string()),
        }
    }

    fn cmd_width(&mut self, args: &[&str]) -> ConsoleResult {
        let Some(arg) = args.first() else {
            return ConsoleResult::Output(format!("Bit width: {}", self.engine.state().bit_width()));
        };
        let bits = parse_number(arg).and_then(|n| u32::try_from(n).ok()).unwrap_or(0);
        match BitWidth::from_bits(bits) {
            Ok(width) => {
                self.engine.set_bit_width(width);
                ConsoleResult::Continue
            }
            Err(e) => ConsoleResult::Error(e.to_string()),
        }
    }

    /// Next statement that will run, skipping blank lines
    fn next_statement(&self) -> Option<&Statement> {
        self.engine
            .program()
            .statements()
            .iter()
            .skip(self.engine.cursor())
            .find(|s| !s.is_blank())
    }

    fn location(&self) -> String {
        match self.engine.status() {
            EngineState::Stopped(StopReason::Success) => "Program finished".to_string(),
            EngineState::Stopped(StopReason::Error) => "Program stopped on an error".to_string(),
            _ => match self.next_statement() {
                Some(stmt) => format!("→ line {}: {}", stmt.index + 1, stmt.text),
                None => "→ end of program".to_string(),
            },
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BREAKPOINTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// 1-based line → statement index; blank lines snap to the next statement
    fn resolve_line(&self, arg: &str) -> Result<usize, String> {
        let program = self.engine.program();
        let line = parse_number(arg)
            .filter(|&line| line >= 1 && line <= program.len())
            .ok_or_else(|| format!("Invalid line: {} (program has {} lines)", arg, program.len()))?;
        program
            .statements()
            .iter()
            .skip(line - 1)
            .find(|s| !s.is_blank())
            .map(|s| s.index)
            .ok_or_else(|| format!("No statement at or after line {}", line))
    }

    fn cmd_break(&mut self, args: &[&str]) -> ConsoleResult {
        let Some(arg) = args.first() else {
            return ConsoleResult::Error("Usage: break LINE".to_string());
        };
        match self.resolve_line(arg) {
            Ok(index) => {
                let id = self.breakpoints.add(index);
                ConsoleResult::Output(format!("Breakpoint {} set at line {}", id, index + 1))
            }
            Err(e) => ConsoleResult::Error(e),
        }
    }

    fn cmd_delete(&mut self, args: &[&str]) -> ConsoleResult {
        match args.first() {
            Some(&"all") | None => {
                let count = self.breakpoints.len();
                self.breakpoints.clear();
                ConsoleResult::Output(format!("Deleted {} breakpoint(s)", count))
            }
            Some(arg) => match parse_number(arg) {
                Some(line) if line >= 1 && self.breakpoints.remove(line - 1) => {
                    ConsoleResult::Output(format!("Breakpoint at line {} deleted", line))
                }
                _ => ConsoleResult::Error(format!("No breakpoint at line {}", arg)),
            },
        }
    }

    fn cmd_list(&self) -> ConsoleResult {
        let breakpoints = self.breakpoints.list();
        if breakpoints.is_empty() {
            return ConsoleResult::Output("No breakpoints".to_string());
        }

        let program = self.engine.program();
        let mut output = String::from("Breakpoints:\n");
        for bp in breakpoints {
            let text = program.statement(bp.index).map_or("", |s| s.text.as_str());
            output.push_str(&format!(
                "  #{:<3} line {:<4} {:<8} hits: {:<4} {}\n",
                bp.id,
                bp.line(),
                if bp.enabled { "enabled" } else { "disabled" },
                bp.hit_count,
                text
            ));
        }
        ConsoleResult::Output(output.trim_end().to_string())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INSPECTION
    // ═══════════════════════════════════════════════════════════════════════════

    fn cmd_registers(&self) -> ConsoleResult {
        ConsoleResult::Output(format_registers(&self.engine))
    }

    fn cmd_memory(&self, args: &[&str]) -> ConsoleResult {
        let Some(addr) = args.first().and_then(|a| parse_number(a)) else {
            return ConsoleResult::Error("Usage: mem ADDR [COUNT]".to_string());
        };
        let count = match args.get(1) {
            Some(arg) => match parse_number(arg) {
                Some(n) => n,
                None => return ConsoleResult::Error(format!("Invalid count: {}", arg)),
            },
            None => DEFAULT_MEM_CELLS,
        };

        let memory = self.engine.memory();
        if addr >= memory.len() {
            return ConsoleResult::Error(format!(
                "Address {} out of range (memory has {} cells)",
                addr,
                memory.len()
            ));
        }
        ConsoleResult::Output(format_memory(memory, addr, count))
    }

    fn cmd_vectors(&self) -> ConsoleResult {
        ConsoleResult::Output(format_vectors(&self.engine))
    }

    fn cmd_help(&self) -> ConsoleResult {
        ConsoleResult::Output(r#"
╔══════════════════════════════════════════════════════════════════════╗
║                          Console Commands                            ║
╠══════════════════════════════════════════════════════════════════════╣
║ EXECUTION                                                            ║
║   step [N], s         Execute N instructions (default 1)             ║
║   continue, c         Run until end, breakpoint or step limit        ║
║   reset               Reload the program from scratch                ║
║                                                                      ║
║ BREAKPOINTS                                                          ║
║   break LINE, b       Pause before LINE                              ║
║   delete [LINE|all]   Remove breakpoint(s)                           ║
║   list, l             List breakpoints                               ║
║                                                                      ║
║ INSPECTION                                                           ║
║   regs, r             Registers and flags                            ║
║   mem ADDR [N], m     N memory cells from ADDR (default 8)           ║
║   vec, v              Vector registers                               ║
║   program, p          Program listing                                ║
║                                                                      ║
║ SETTINGS                                                             ║
║   width [8|16|32]     Show or set the register bit width             ║
║                                                                      ║
║ OTHER                                                                ║
║   help, h             This help                                      ║
║   quit, q             Exit                                           ║
╚══════════════════════════════════════════════════════════════════════╝
"#
        .to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FORMATTING (shared with `asim run`)
// ═══════════════════════════════════════════════════════════════════════════════

/// Register file, flags and status
pub fn format_registers(engine: &Engine) -> String {
    let state = engine.state();
    let mut output = String::from("Registers:\n");
    for i in 0..GENERAL_REGISTERS {
        if let Some(reg) = Register::general(i) {
            let value = state.read_register(reg);
            output.push_str(&format!("  {} = {:<10} (0x{:08X})\n", reg, value, value));
        }
    }
    let flags = state.flags();
    output.push_str(&format!("\n  SP = {}\n", state.sp()));
    output.push_str(&format!("  PC = {} (line {})\n", state.pc(), state.pc() + 1));
    output.push_str(&format!(
        "  FLAGS={} FLAG={} OVERFLOW={}\n",
        flags.zero as u8, flags.negative as u8, flags.overflow as u8
    ));
    output.push_str(&format!(
        "  Width: {}  │  Status: {}  │  Executed: {}",
        state.bit_width(),
        engine.status(),
        engine.stats().executed
    ));
    output
}

/// Vector registers and matrix size
pub fn format_vectors(engine: &Engine) -> String {
    let mut output = String::from("Vectors:\n");
    for (i, lanes) in engine.vectors().iter().enumerate() {
        let lanes: Vec<String> = lanes.iter().map(|lane| lane.to_string()).collect();
        output.push_str(&format!("  v{} = [{}]\n", i, lanes.join(", ")));
    }
    output.push_str(&format!("  Matrix size: {}", engine.state().mat_size()));
    output
}

/// `count` cells from `start`, clipped to memory
pub fn format_memory(memory: &[f64], start: usize, count: usize) -> String {
    let end = start.saturating_add(count).min(memory.len());
    let mut output = format!("Memory [{}..{}):\n", start, end);
    for (row, chunk) in memory[start..end].chunks(CELLS_PER_ROW).enumerate() {
        let cells: Vec<String> = chunk.iter().map(|cell| format!("{:>8}", cell)).collect();
        output.push_str(&format!("  {:06}: {}\n", start + row * CELLS_PER_ROW, cells.join(" ")));
    }
    output.trim_end().to_string()
}
