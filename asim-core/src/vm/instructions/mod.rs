//! Instruction handlers
//!
//! One module per instruction family. Every handler has the same shape
//! ([`OpcodeHandler`]): it validates its own operands, mutates the machine
//! state it is lent for the call and reports whether the cursor simply
//! advances or jumps.

pub mod arithmetic;
pub mod control;
pub mod data;
pub mod simd;
pub mod stack;

use super::error::{VmError, VmResult};
use super::loader::LabelTable;
use super::opcode::Opcode;
use super::operand::Operand;
use super::state::{MachineState, Register};

/// Cursor movement requested by a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// cursor + 1
    Next,
    /// Explicit next cursor (jumps, calls, returns)
    Jump(usize),
}

/// Everything a handler may touch during one dispatch
pub struct ExecContext<'a> {
    pub opcode: Opcode,
    pub state: &'a mut MachineState,
    pub labels: &'a LabelTable,
    /// Index of the instruction being executed
    pub cursor: usize,
    /// Number of statements in the program
    pub program_len: usize,
}

/// Handler function type for opcode execution
pub type OpcodeHandler = fn(&mut ExecContext<'_>, &[String]) -> VmResult<Flow>;

/// Map opcode to handler function
pub fn handler(opcode: Opcode) -> OpcodeHandler {
    match opcode {
        // Arithmetic
        Opcode::Add => arithmetic::op_add,
        Opcode::Sub => arithmetic::op_sub,
        Opcode::Mul => arithmetic::op_mul,
        Opcode::Div => arithmetic::op_div,
        Opcode::And => arithmetic::op_and,
        Opcode::Or => arithmetic::op_or,
        Opcode::Xor => arithmetic::op_xor,
        Opcode::Inc => arithmetic::op_inc,
        Opcode::Dec => arithmetic::op_dec,
        Opcode::Not => arithmetic::op_not,
        Opcode::Cmp => arithmetic::op_cmp,

        // Data Movement
        Opcode::Mov => data::op_mov,
        Opcode::Load => data::op_load,
        Opcode::Store => data::op_store,

        // Stack
        Opcode::Push => stack::op_push,
        Opcode::Pop => stack::op_pop,
        Opcode::Dup => stack::op_dup,
        Opcode::Swap => stack::op_swap,
        Opcode::Rot => stack::op_rot,

        // Control Flow
        Opcode::Jmp => control::op_jmp,
        Opcode::Je | Opcode::Jz | Opcode::Jne | Opcode::Jnz |
        Opcode::Jl | Opcode::Jg | Opcode::Jle | Opcode::Jge => control::op_jcc,
        Opcode::Call => control::op_call,
        Opcode::Ret => control::op_ret,

        // SIMD
        Opcode::Vadd => simd::op_vadd,
        Opcode::Vmul => simd::op_vmul,
        Opcode::Vdiv => simd::op_vdiv,
        Opcode::Vload => simd::op_vload,
        Opcode::Vstore => simd::op_vstore,
        Opcode::SetMatSize => simd::op_setmatsize,
    }
}

/// Runs one instruction against the context
pub fn dispatch(ctx: &mut ExecContext<'_>, operands: &[String]) -> VmResult<Flow> {
    handler(ctx.opcode)(ctx, operands)
}

// ═════════════════════════════════════════════════════════════════
// OPERAND HELPERS
// ═════════════════════════════════════════════════════════════════

/// Checks the operand count and borrows the tokens as an array
pub(crate) fn operands<'a, const N: usize>(
    opcode: Opcode,
    ops: &'a [String],
) -> VmResult<[&'a str; N]> {
    if ops.len() != N {
        return Err(VmError::ArityMismatch {
            opcode: opcode.mnemonic(),
            expected: N,
            found: ops.len(),
        });
    }
    Ok(std::array::from_fn(|i| ops[i].as_str()))
}

/// Register a program may write (r0-r6, SP)
pub(crate) fn writable_register(token: &str) -> VmResult<Register> {
    let reg: Register = token.parse()?;
    if !reg.is_writable_by_program() {
        return Err(VmError::InvalidRegister(reg.name().to_string()));
    }
    Ok(reg)
}

/// Register-or-literal operand; memory references are rejected
pub(crate) fn scalar(state: &MachineState, token: &str) -> VmResult<i64> {
    match Operand::parse(token)? {
        Operand::Register(reg) => Ok(state.read_register(reg) as i64),
        Operand::Immediate(value) => Ok(value),
        Operand::Memory(_) => Err(VmError::InvalidOperand(token.trim().to_string())),
    }
}
