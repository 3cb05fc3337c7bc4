//! # VM — register machine
//!
//! Loader, machine state, instruction handlers and the step/run engine.
//!
//! ## Arquitetura
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          ENGINE                              │
//! │   source ──▶ Program ──▶ step() ──▶ handler table            │
//! │              (labels)      │           │                     │
//! │                            ▼           ▼                     │
//! │   ┌──────────┐ ┌────────┐ ┌─────────┐ ┌──────────────┐       │
//! │   │ r0..r6   │ │ memory │ │ v0..v3  │ │ FLAGS / FLAG │       │
//! │   │ SP  PC   │ │ (f64)  │ │ 4 lanes │ │ OVERFLOW     │       │
//! │   └──────────┘ └────────┘ └─────────┘ └──────────────┘       │
//! │                            │                                 │
//! │                            ▼                                 │
//! │                        EventBus ──▶ observers                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Módulos
//!
//! - [`loader`] - source text → statements + label table
//! - [`state`] - registers, flags, memory, vectors
//! - [`operand`] - operand classification
//! - [`opcode`] - instruction set and arity table
//! - [`instructions`] - one handler per opcode
//! - [`engine`] - step/run state machine
//! - [`events`] - notifications for observers
//! - [`debugger`] - breakpoint set
//! - [`config`] - environment-backed defaults
//!
//! ## Uso
//!
//! ```
//! use asim_core::vm::{Engine, Register, RunOutcome};
//!
//! let mut engine = Engine::new();
//! engine.load_program("MOV r0, 20\nADD r0, 22\nEND").unwrap();
//! assert_eq!(engine.run().unwrap(), RunOutcome::Completed);
//! assert_eq!(engine.register(Register::R0), 42);
//! ```

pub mod config;
pub mod debugger;
pub mod engine;
pub mod error;
pub mod events;
pub mod instructions;
pub mod loader;
pub mod opcode;
pub mod operand;
pub mod state;

pub use config::EngineConfig;
pub use debugger::{Breakpoint, Breakpoints};
pub use engine::{
    BreakpointHook, Engine, EngineState, ExecStats, RunOutcome, StopHandle, StopReason,
};
pub use error::{EngineError, VmError, VmResult};
pub use events::{Event, EventBus, EventFilter, EventHandler, Severity};
pub use loader::{Instruction, LabelTable, Program, Statement, StatementKind};
pub use opcode::{Opcode, OpcodeCategory};
pub use operand::{AddressExpr, Operand, Value};
pub use state::{
    BitWidth, MachineState, Register, Snapshot, StatusRegister, Vector, GENERAL_REGISTERS, LANES,
    VECTOR_REGISTERS,
};
