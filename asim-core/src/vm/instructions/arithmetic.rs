//! Arithmetic and logic: ADD, SUB, MUL, DIV, AND, OR, XOR, INC, DEC, NOT, CMP
//!
//! Results are computed in `i128`, wrapped to the active bit width and the
//! unmasked value drives the status flags.

use super::{operands, scalar, writable_register, ExecContext, Flow};
use crate::vm::error::{VmError, VmResult};
use crate::vm::state::{MachineState, Register};

type BinaryOp = fn(i128, i128) -> VmResult<i128>;

/// Register-or-literal source operand
fn source(state: &MachineState, token: &str) -> VmResult<i128> {
    Ok(scalar(state, token)? as i128)
}

/// Writes the wrapped result and updates flags from the raw one
fn commit(state: &mut MachineState, dest: Register, raw: i128) -> VmResult<Flow> {
    let value = state.mask(raw);
    state.write_register(dest, value)?;
    state.update_flags(raw);
    Ok(Flow::Next)
}

fn binary(ctx: &mut ExecContext<'_>, ops: &[String], op: BinaryOp) -> VmResult<Flow> {
    let [dest, src] = operands::<2>(ctx.opcode, ops)?;
    let dest = writable_register(dest)?;
    let rhs = source(ctx.state, src)?;
    let lhs = ctx.state.read_register(dest) as i128;
    let raw = op(lhs, rhs)?;
    commit(ctx.state, dest, raw)
}

fn unary(ctx: &mut ExecContext<'_>, ops: &[String], op: fn(i128, u32) -> i128) -> VmResult<Flow> {
    let [dest] = operands::<1>(ctx.opcode, ops)?;
    let dest = writable_register(dest)?;
    let value = ctx.state.read_register(dest) as i128;
    let raw = op(value, ctx.state.max_value());
    commit(ctx.state, dest, raw)
}

// ═════════════════════════════════════════════════════════════════
// HANDLERS
// ═════════════════════════════════════════════════════════════════

pub fn op_add(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    binary(ctx, ops, |a, b| Ok(a + b))
}

pub fn op_sub(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    binary(ctx, ops, |a, b| Ok(a - b))
}

pub fn op_mul(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    binary(ctx, ops, |a, b| Ok(a * b))
}

/// Register gets the truncated quotient; flags follow the exact one
pub fn op_div(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    let [dest, src] = operands::<2>(ctx.opcode, ops)?;
    let dest = writable_register(dest)?;
    let divisor = source(ctx.state, src)?;
    if divisor == 0 {
        return Err(VmError::DivisionByZero);
    }
    let dividend = ctx.state.read_register(dest) as i128;
    let value = ctx.state.mask(dividend / divisor);
    ctx.state.write_register(dest, value)?;
    ctx.state.update_quotient_flags(dividend, divisor);
    Ok(Flow::Next)
}

pub fn op_and(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    binary(ctx, ops, |a, b| Ok(a & b))
}

pub fn op_or(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    binary(ctx, ops, |a, b| Ok(a | b))
}

pub fn op_xor(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    binary(ctx, ops, |a, b| Ok(a ^ b))
}

pub fn op_inc(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    unary(ctx, ops, |a, _| a + 1)
}

pub fn op_dec(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    unary(ctx, ops, |a, _| a - 1)
}

/// Complement within the active width
pub fn op_not(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    unary(ctx, ops, |a, max| ((a as u32 ^ max) & max) as i128)
}

/// Sets FLAGS (equal) and FLAG (less than); nothing else changes
pub fn op_cmp(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    let [lhs, rhs] = operands::<2>(ctx.opcode, ops)?;
    let lhs: Register = lhs.parse()?;
    let lhs = ctx.state.read_register(lhs) as i128;
    let rhs = source(ctx.state, rhs)?;
    ctx.state.set_compare(lhs, rhs);
    Ok(Flow::Next)
}
