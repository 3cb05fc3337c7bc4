//! # Prelude — Re-exportações Convenientes
//!
//! ```
//! use asim_core::prelude::*;
//! ```

// Engine
pub use crate::vm::engine::{Engine, EngineState, ExecStats, RunOutcome, StopHandle, StopReason};

// Configuração
pub use crate::vm::config::EngineConfig;

// Estado
pub use crate::vm::state::{BitWidth, MachineState, Register, Snapshot, StatusRegister, Vector};

// Programa
pub use crate::vm::loader::Program;
pub use crate::vm::opcode::{Opcode, OpcodeCategory};

// Observação e debug
pub use crate::vm::debugger::Breakpoints;
pub use crate::vm::events::{Event, EventBus, EventFilter, Severity};

// Erros
pub use crate::vm::error::{EngineError, VmError, VmResult};
