//! Execution engine
//!
//! Owns the program, the machine state and the execution cursor, and
//! advances them one whole instruction per [`Engine::step`].
//!
//! ```text
//!  Idle ──load──▶ Loaded ──step/run──▶ Running ──┬──▶ Paused ──step/run──▶ Running
//!                                                ├──▶ Stopped(Success)
//!                                                └──▶ Stopped(Error)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::config::EngineConfig;
use super::error::{EngineError, VmError, VmResult};
use super::events::{Event, EventBus, EventFilter, Severity};
use super::instructions::{self, ExecContext, Flow};
use super::loader::{is_blank_source, Instruction, LabelTable, Program, StatementKind};
use super::opcode::Opcode;
use super::state::{
    BitWidth, Change, MachineState, Register, Snapshot, StatusRegister, Vector, GENERAL_REGISTERS,
    VECTOR_REGISTERS,
};

/// Breakpoint hook: statement index → pause?
pub type BreakpointHook = Box<dyn FnMut(usize) -> bool + Send>;

// ═══════════════════════════════════════════════════════════════════════════════
// STATUS
// ═══════════════════════════════════════════════════════════════════════════════

/// How a stopped program ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Success,
    Error,
}

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No program
    Idle,
    Loaded,
    Running,
    Paused,
    Stopped(StopReason),
}

impl EngineState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped(_))
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loaded => write!(f, "loaded"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped(StopReason::Success) => write!(f, "stopped (success)"),
            Self::Stopped(StopReason::Error) => write!(f, "stopped (error)"),
        }
    }
}

/// Why `run()` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Program reached its end
    Completed,
    /// Paused before the given 1-based line
    Breakpoint { line: usize },
    /// `stop()` was requested
    Stopped,
    /// Configured step limit reached
    StepLimit { steps: u64 },
}

/// Execution counters since the last load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecStats {
    /// Instructions executed successfully
    pub executed: u64,
    /// Label-only statements passed
    pub labels_passed: u64,
    pub breakpoint_hits: u64,
    pub errors: u64,
}

/// Cloneable stop request shared with other threads
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Requests a stop at the next tick boundary
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Step/run execution engine
pub struct Engine {
    config: EngineConfig,
    machine: MachineState,
    program: Program,
    cursor: usize,
    status: EngineState,
    events: EventBus,
    hook: Option<BreakpointHook>,
    /// Cursor whose breakpoint was already reported
    resume_at: Option<usize>,
    stop: StopHandle,
    stats: ExecStats,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            machine: MachineState::new(config.memory_size, config.bit_width),
            events: EventBus::with_history(config.event_history),
            config,
            program: Program::default(),
            cursor: 0,
            status: EngineState::Idle,
            hook: None,
            resume_at: None,
            stop: StopHandle::default(),
            stats: ExecStats::default(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PROGRAM LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Loads source text and reinitializes the machine
    ///
    /// Blank or comment-only text is ignored and leaves everything as it was.
    /// A duplicate label rejects the load, also leaving everything untouched.
    pub fn load_program(&mut self, source: &str) -> VmResult<()> {
        if is_blank_source(source) {
            tracing::debug!("ignoring empty program");
            return Ok(());
        }

        let program = Program::parse(source)?;
        self.machine = MachineState::new(self.config.memory_size, self.config.bit_width);
        self.program = program;
        self.cursor = 0;
        self.status = EngineState::Loaded;
        self.resume_at = None;
        self.stats = ExecStats::default();
        self.stop.clear();

        let count = self.program.instruction_count();
        tracing::info!(
            instructions = count,
            labels = self.program.labels().len(),
            "program loaded"
        );
        self.events.emit(Event::info(format!("Program loaded: {} instruction(s)", count)));
        Ok(())
    }

    /// Clears program, machine state and cursor
    pub fn reset(&mut self) {
        self.machine = MachineState::new(self.config.memory_size, self.config.bit_width);
        self.program = Program::default();
        self.cursor = 0;
        self.status = EngineState::Idle;
        self.resume_at = None;
        self.stats = ExecStats::default();
        self.stop.clear();

        tracing::info!("engine reset");
        self.events.emit(Event::info("Machine reset"));
    }

    /// Changes the active width; register contents are kept as they are
    pub fn set_bit_width(&mut self, width: BitWidth) {
        self.config.bit_width = width;
        self.machine.set_bit_width(width);
        tracing::debug!(%width, "bit width changed");
        self.events.emit(Event::info(format!("Bit width set to {}", width)));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXECUTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Executes at most one instruction
    ///
    /// Returns `Ok(true)` while the program can continue and `Ok(false)` when
    /// it paused on a breakpoint or finished.
    pub fn step(&mut self) -> Result<bool, EngineError> {
        if self.status == EngineState::Idle {
            return Err(EngineError::new(0, VmError::NoProgram));
        }
        if self.status.is_stopped() {
            return Ok(false);
        }

        let cursor = self.skip_blank(self.cursor);
        self.cursor = cursor;
        self.machine.set_pc(cursor);

        if self.resume_at.take() != Some(cursor) && self.breakpoint_at(cursor) {
            self.resume_at = Some(cursor);
            self.status = EngineState::Paused;
            self.stats.breakpoint_hits += 1;
            tracing::debug!(line = cursor + 1, "breakpoint reached");
            self.events.emit(Event::BreakpointHit { line: cursor + 1 });
            self.events.emit(Event::output(
                format!("Breakpoint reached at line {}", cursor + 1),
                Severity::Info,
                Some(cursor + 1),
            ));
            return Ok(false);
        }

        let Some(statement) = self.program.statement(cursor) else {
            return Ok(self.complete());
        };
        let instruction = match &statement.kind {
            StatementKind::Terminator => return Ok(self.complete()),
            StatementKind::Label { .. } | StatementKind::Blank => {
                self.advance(cursor + 1);
                self.stats.labels_passed += 1;
                self.status = EngineState::Running;
                return Ok(true);
            }
            StatementKind::Instruction(inst) => inst,
        };

        self.status = EngineState::Running;
        let result = execute(&mut self.machine, &self.program, cursor, instruction);
        if result.is_ok() {
            tracing::debug!(line = cursor + 1, %instruction, "executed");
        }
        self.publish_changes();

        match result {
            Ok(flow) => {
                let next = match flow {
                    Flow::Next => cursor + 1,
                    Flow::Jump(target) => target,
                };
                self.advance(next);
                self.stats.executed += 1;
                Ok(true)
            }
            Err(source) => Err(self.fail(cursor, source)),
        }
    }

    /// Runs until completion, breakpoint, stop request or step limit
    ///
    /// Sleeps the configured run interval between ticks.
    pub fn run(&mut self) -> Result<RunOutcome, EngineError> {
        self.run_loop(self.config.run_interval)
    }

    /// [`run`](Self::run) with an explicit delay between ticks
    pub fn run_with_interval(&mut self, interval: Duration) -> Result<RunOutcome, EngineError> {
        self.run_loop(interval)
    }

    fn run_loop(&mut self, interval: Duration) -> Result<RunOutcome, EngineError> {
        match self.status {
            EngineState::Idle => return Err(EngineError::new(0, VmError::NoProgram)),
            EngineState::Stopped(StopReason::Success) => return Ok(RunOutcome::Completed),
            EngineState::Stopped(StopReason::Error) => return Ok(RunOutcome::Stopped),
            _ => {}
        }

        self.status = EngineState::Running;
        tracing::info!(line = self.cursor + 1, "run started");

        let mut steps: u64 = 0;
        loop {
            if self.stop.is_stop_requested() {
                self.stop.clear();
                self.status = EngineState::Paused;
                tracing::info!(steps, "run stopped on request");
                self.events.emit(Event::output(
                    "Execution stopped",
                    Severity::Warning,
                    Some(self.cursor + 1),
                ));
                return Ok(RunOutcome::Stopped);
            }
            if self.config.max_steps > 0 && steps >= self.config.max_steps {
                self.status = EngineState::Paused;
                tracing::warn!(steps, "step limit reached");
                self.events.emit(Event::output(
                    format!("Step limit of {} reached", self.config.max_steps),
                    Severity::Warning,
                    Some(self.cursor + 1),
                ));
                return Ok(RunOutcome::StepLimit { steps });
            }

            if !self.step()? {
                return Ok(match self.status {
                    EngineState::Paused => RunOutcome::Breakpoint { line: self.cursor + 1 },
                    _ => RunOutcome::Completed,
                });
            }
            steps += 1;

            if !interval.is_zero() {
                std::thread::sleep(interval);
            }
        }
    }

    /// Requests the current run to stop at the next tick boundary
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DEBUG HOOK & EVENTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Installs the hook consulted before each instruction fetch
    pub fn set_breakpoint_hook<F>(&mut self, hook: F)
    where
        F: FnMut(usize) -> bool + Send + 'static,
    {
        self.hook = Some(Box::new(hook));
    }

    pub fn clear_breakpoint_hook(&mut self) {
        self.hook = None;
        self.resume_at = None;
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe<F>(&self, filter: EventFilter, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events.subscribe(filter, handler);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn state(&self) -> &MachineState {
        &self.machine
    }

    pub fn snapshot(&self) -> Snapshot {
        self.machine.snapshot()
    }

    pub fn registers(&self) -> [u32; GENERAL_REGISTERS] {
        self.machine.general_registers()
    }

    pub fn register(&self, reg: Register) -> u32 {
        self.machine.read_register(reg)
    }

    pub fn memory(&self) -> &[f64] {
        self.machine.memory()
    }

    pub fn vectors(&self) -> &[Vector; VECTOR_REGISTERS] {
        self.machine.vectors()
    }

    pub fn flags(&self) -> StatusRegister {
        self.machine.flags()
    }

    /// 0-based index of the next statement
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// 1-based source line of the next statement
    pub fn current_line(&self) -> usize {
        self.cursor + 1
    }

    pub fn status(&self) -> EngineState {
        self.status
    }

    pub fn labels(&self) -> &LabelTable {
        self.program.labels()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn stats(&self) -> ExecStats {
        self.stats
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNALS
    // ═══════════════════════════════════════════════════════════════════════════

    fn skip_blank(&self, mut cursor: usize) -> usize {
        while self.program.statement(cursor).is_some_and(|s| s.is_blank()) {
            cursor += 1;
        }
        cursor
    }

    fn breakpoint_at(&mut self, cursor: usize) -> bool {
        match self.hook.as_mut() {
            Some(hook) => hook(cursor),
            None => false,
        }
    }

    fn advance(&mut self, next: usize) {
        self.cursor = next;
        self.machine.set_pc(next);
    }

    fn complete(&mut self) -> bool {
        self.status = EngineState::Stopped(StopReason::Success);
        let executed = self.stats.executed;
        tracing::info!(executed, "program completed");
        self.events.emit(Event::Completed { executed });
        self.events.emit(Event::output(
            format!("Program completed ({} instruction(s) executed)", executed),
            Severity::Success,
            None,
        ));
        false
    }

    fn fail(&mut self, cursor: usize, source: VmError) -> EngineError {
        let error = EngineError::new(cursor + 1, source);
        self.status = EngineState::Stopped(StopReason::Error);
        self.stats.errors += 1;
        tracing::warn!(line = error.line, error = %error.source, "instruction failed");
        self.events.emit(Event::Error {
            message: error.source.to_string(),
            line: error.line,
        });
        self.events.emit(Event::output(error.to_string(), Severity::Error, Some(error.line)));
        error
    }

    /// Turns the state's change journal into events
    fn publish_changes(&mut self) {
        for change in self.machine.take_changes() {
            match change {
                Change::Register(register) => self.events.emit(Event::RegisterChanged {
                    register,
                    value: self.machine.read_register(register),
                }),
                Change::Flags => {
                    for register in [Register::Flags, Register::Flag, Register::Overflow] {
                        self.events.emit(Event::RegisterChanged {
                            register,
                            value: self.machine.read_register(register),
                        });
                    }
                }
                Change::Memory(address) => self.events.emit(Event::MemoryChanged {
                    address,
                    value: self.machine.memory()[address],
                }),
                Change::Vector(index) => self.events.emit(Event::VectorChanged {
                    index,
                    lanes: self.machine.vector(index),
                }),
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("status", &self.status)
            .field("cursor", &self.cursor)
            .field("statements", &self.program.len())
            .field("stats", &self.stats)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

/// Decodes, validates arity and dispatches one instruction
fn execute(
    machine: &mut MachineState,
    program: &Program,
    cursor: usize,
    instruction: &Instruction,
) -> VmResult<Flow> {
    let opcode: Opcode = instruction.mnemonic.parse()?;
    if instruction.operands.len() != opcode.arity() {
        return Err(VmError::ArityMismatch {
            opcode: opcode.mnemonic(),
            expected: opcode.arity(),
            found: instruction.operands.len(),
        });
    }

    let mut ctx = ExecContext {
        opcode,
        state: machine,
        labels: program.labels(),
        cursor,
        program_len: program.len(),
    };
    instructions::dispatch(&mut ctx, &instruction.operands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn engine() -> Engine {
        Engine::with_config(
            EngineConfig::default()
                .with_memory_size(64)
                .with_bit_width(BitWidth::W32)
                .with_run_interval(Duration::ZERO)
                .with_max_steps(10_000)
                .with_event_history(64),
        )
    }

    #[test]
    fn test_step_without_program() {
        let mut engine = engine();
        let err = engine.step().unwrap_err();
        assert_eq!(err.line, 0);
        assert_eq!(err.source, VmError::NoProgram);
        assert_eq!(engine.status(), EngineState::Idle);
    }

    #[test]
    fn test_step_through_program() {
        let mut engine = engine();
        engine.load_program("MOV r0, 2\n\n; comment\nADD r0, 3\nEND").unwrap();
        assert_eq!(engine.status(), EngineState::Loaded);

        assert!(engine.step().unwrap());
        assert_eq!(engine.cursor(), 1);
        assert!(engine.step().unwrap());
        assert_eq!(engine.register(Register::R0), 5);
        assert_eq!(engine.cursor(), 4);

        assert!(!engine.step().unwrap());
        assert_eq!(engine.status(), EngineState::Stopped(StopReason::Success));
        assert!(!engine.step().unwrap());
        assert_eq!(engine.stats().executed, 2);
    }

    #[test]
    fn test_error_stops_with_line_number() {
        let mut engine = engine();
        engine.load_program("MOV r0, 1\nFOO r0\nINC r0").unwrap();
        engine.step().unwrap();
        let err = engine.step().unwrap_err();
        assert_eq!(err.to_string(), "Line 2: Unknown instruction: FOO");
        assert_eq!(engine.cursor(), 1);
        assert_eq!(engine.status(), EngineState::Stopped(StopReason::Error));
        assert!(!engine.step().unwrap());
    }

    #[test]
    fn test_arity_checked_before_dispatch() {
        let mut engine = engine();
        engine.load_program("INC r0, r1").unwrap();
        let err = engine.step().unwrap_err();
        assert_eq!(
            err.source,
            VmError::ArityMismatch { opcode: "INC", expected: 1, found: 2 }
        );
    }

    #[test]
    fn test_empty_load_is_noop() {
        let mut engine = engine();
        engine.load_program("MOV r1, 9").unwrap();
        engine.step().unwrap();
        engine.load_program("   \n ; nothing\n").unwrap();
        assert_eq!(engine.register(Register::R1), 9);
        assert_eq!(engine.cursor(), 1);
        assert_eq!(engine.program().len(), 1);
    }

    #[test]
    fn test_label_line_runs_as_noop() {
        let mut engine = engine();
        engine.load_program("start: INC r0\nEND").unwrap();
        assert_eq!(engine.run().unwrap(), RunOutcome::Completed);
        assert_eq!(engine.register(Register::R0), 0);
        assert_eq!(engine.stats().executed, 0);
        assert_eq!(engine.stats().labels_passed, 1);
    }

    #[test]
    fn test_breakpoint_pauses_then_resumes() {
        let mut engine = engine();
        engine.load_program("INC r0\nINC r0\nINC r0").unwrap();
        engine.set_breakpoint_hook(|index| index == 1);

        assert_eq!(engine.run().unwrap(), RunOutcome::Breakpoint { line: 2 });
        assert_eq!(engine.register(Register::R0), 1);
        assert_eq!(engine.status(), EngineState::Paused);

        assert!(engine.step().unwrap());
        assert_eq!(engine.register(Register::R0), 2);
        assert_eq!(engine.run().unwrap(), RunOutcome::Completed);
        assert_eq!(engine.register(Register::R0), 3);
        assert_eq!(engine.stats().breakpoint_hits, 1);
    }

    #[test]
    fn test_breakpoint_sees_cursor_after_blank_lines() {
        let mut engine = engine();
        engine.load_program("\n; setup\nINC r0\nEND").unwrap();
        engine.set_breakpoint_hook(|index| index == 2);

        assert!(!engine.step().unwrap());
        assert_eq!(engine.status(), EngineState::Paused);
        assert_eq!(engine.cursor(), 2);
        assert_eq!(engine.register(Register::R0), 0);

        assert!(engine.step().unwrap());
        assert_eq!(engine.register(Register::R0), 1);
    }

    #[test]
    fn test_stop_request_pauses_run() {
        let mut engine = engine();
        engine.load_program("loop:\nINC r0\nJMP loop").unwrap();
        let handle = engine.stop_handle();
        engine.set_breakpoint_hook(move |index| {
            if index == 2 {
                handle.stop();
            }
            false
        });
        assert_eq!(engine.run().unwrap(), RunOutcome::Stopped);
        assert_eq!(engine.status(), EngineState::Paused);
        assert_eq!(engine.register(Register::R0), 1);
    }

    #[test]
    fn test_step_limit() {
        let mut engine = Engine::with_config(
            EngineConfig::default()
                .with_memory_size(16)
                .with_run_interval(Duration::ZERO)
                .with_max_steps(5),
        );
        engine.load_program("top:\nINC r0\nJMP top").unwrap();
        assert_eq!(engine.run().unwrap(), RunOutcome::StepLimit { steps: 5 });
        assert_eq!(engine.status(), EngineState::Paused);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut engine = engine();
        engine.load_program("MOV r0, 4\nVADD v0, v0, v0").unwrap();
        engine.run().unwrap();
        engine.reset();
        assert_eq!(engine.status(), EngineState::Idle);
        assert_eq!(engine.registers(), [0; GENERAL_REGISTERS]);
        assert!(engine.program().is_empty());
        assert!(engine.step().is_err());
    }

    #[test]
    fn test_events_follow_execution() {
        let mut engine = engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine.subscribe(EventFilter::Register(Register::R2), move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        engine.load_program("MOV r2, 7\nPUSH r2\nEND").unwrap();
        engine.run().unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Event::RegisterChanged { register: Register::R2, value: 7 }]
        );
        let history = engine.events().history();
        assert!(history.contains(&Event::MemoryChanged { address: 62, value: 7.0 }));
        assert!(history.contains(&Event::Completed { executed: 2 }));
    }

    #[test]
    fn test_error_event_carries_line() {
        let mut engine = engine();
        engine.load_program("\nDIV r0, 0").unwrap();
        assert!(engine.run().is_err());
        assert!(engine.events().history().contains(&Event::Error {
            message: "Division by zero".into(),
            line: 2,
        }));
    }

    #[test]
    fn test_set_bit_width_survives_load() {
        let mut engine = engine();
        engine.set_bit_width(BitWidth::W8);
        engine.load_program("MOV r0, 1000").unwrap();
        engine.step().unwrap();
        assert_eq!(engine.register(Register::R0), 255);
    }
}
