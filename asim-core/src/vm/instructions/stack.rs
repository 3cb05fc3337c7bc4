//! Stack: PUSH, POP, DUP, SWAP, ROT
//!
//! The stack grows downward from the top of memory. SP addresses the
//! current top cell; `SP == memory length` means the stack is empty.

use super::{operands, scalar, writable_register, ExecContext, Flow};
use crate::vm::error::{VmError, VmResult};
use crate::vm::state::Register;

/// Requires `count` cells between SP and the end of memory
fn require_depth(ctx: &ExecContext<'_>, count: usize) -> VmResult<usize> {
    let sp = ctx.state.sp();
    if sp + count > ctx.state.memory_len() {
        return Err(VmError::StackUnderflow);
    }
    Ok(sp)
}

/// `PUSH val`
pub fn op_push(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    let [src] = operands::<1>(ctx.opcode, ops)?;
    let value = scalar(ctx.state, src)?;

    let sp = ctx.state.sp();
    if sp == 0 {
        return Err(VmError::StackOverflow);
    }
    ctx.state.write_memory(sp as i64 - 1, value as f64)?;
    ctx.state.set_sp(sp - 1);
    Ok(Flow::Next)
}

/// `POP dest`
pub fn op_pop(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    let [dest] = operands::<1>(ctx.opcode, ops)?;
    let reg = writable_register(dest)?;

    let sp = require_depth(ctx, 1)?;
    let cell = ctx.state.read_numeric(sp)?;
    let value = ctx.state.cell_to_register(cell);
    if reg == Register::Sp {
        ctx.state.check_address(value as i64)?;
    }
    ctx.state.set_sp(sp + 1);
    ctx.state.write_register(reg, value)?;
    Ok(Flow::Next)
}

/// Copies the top cell one slot down
pub fn op_dup(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    operands::<0>(ctx.opcode, ops)?;
    let sp = ctx.state.sp();
    if sp == 0 {
        return Err(VmError::StackOverflow);
    }
    let sp = require_depth(ctx, 1)?;
    let top = ctx.state.read_memory(sp as i64)?;
    ctx.state.write_memory(sp as i64 - 1, top)?;
    ctx.state.set_sp(sp - 1);
    Ok(Flow::Next)
}

/// Exchanges SP and SP+1
pub fn op_swap(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    operands::<0>(ctx.opcode, ops)?;
    let sp = require_depth(ctx, 2)? as i64;
    let a = ctx.state.read_memory(sp)?;
    let b = ctx.state.read_memory(sp + 1)?;
    ctx.state.write_memory(sp, b)?;
    ctx.state.write_memory(sp + 1, a)?;
    Ok(Flow::Next)
}

/// `[a, b, c]` at SP, SP+1, SP+2 becomes `[b, c, a]`
pub fn op_rot(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    operands::<0>(ctx.opcode, ops)?;
    let sp = require_depth(ctx, 3)? as i64;
    let a = ctx.state.read_memory(sp)?;
    let b = ctx.state.read_memory(sp + 1)?;
    let c = ctx.state.read_memory(sp + 2)?;
    ctx.state.write_memory(sp, b)?;
    ctx.state.write_memory(sp + 1, c)?;
    ctx.state.write_memory(sp + 2, a)?;
    Ok(Flow::Next)
}
