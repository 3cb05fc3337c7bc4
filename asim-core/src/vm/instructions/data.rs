//! Data movement: MOV, LOAD, STORE

use super::{operands, scalar, writable_register, ExecContext, Flow};
use crate::vm::error::VmResult;
use crate::vm::operand::{is_memory_reference, AddressExpr, Operand};
use crate::vm::state::MachineState;

/// Reads `[addr]`, a register or a literal as a number
fn read_source(state: &MachineState, token: &str) -> VmResult<f64> {
    match Operand::parse(token)? {
        Operand::Register(reg) => Ok(state.read_register(reg) as f64),
        Operand::Memory(expr) => state.read_numeric(state.resolve_address(&expr)?),
        Operand::Immediate(value) => Ok(value as f64),
    }
}

/// `MOV dest, src`; register destinations saturate, memory stores raw
pub fn op_mov(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    let [dest, src] = operands::<2>(ctx.opcode, ops)?;

    if is_memory_reference(dest) {
        let addr = ctx.state.resolve_address(&AddressExpr::parse(dest)?)?;
        let value = read_source(ctx.state, src)?;
        ctx.state.write_memory(addr as i64, value)?;
    } else {
        let reg = writable_register(dest)?;
        let value = read_source(ctx.state, src)?;
        let value = ctx.state.cell_to_register(value);
        ctx.state.write_register(reg, value)?;
    }
    Ok(Flow::Next)
}

/// `LOAD dest, address`
pub fn op_load(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    let [dest, address] = operands::<2>(ctx.opcode, ops)?;
    let reg = writable_register(dest)?;
    let addr = ctx.state.resolve_address(&AddressExpr::parse(address)?)?;
    let cell = ctx.state.read_numeric(addr)?;
    let value = ctx.state.cell_to_register(cell);
    ctx.state.write_register(reg, value)?;
    Ok(Flow::Next)
}

/// `STORE src, address`
pub fn op_store(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    let [src, address] = operands::<2>(ctx.opcode, ops)?;
    let value = scalar(ctx.state, src)?;
    let addr = ctx.state.resolve_address(&AddressExpr::parse(address)?)?;
    ctx.state.write_memory(addr as i64, value as f64)?;
    Ok(Flow::Next)
}
