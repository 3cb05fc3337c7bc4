//! Control flow: JMP, conditional jumps, CALL, RET

use super::{operands, ExecContext, Flow};
use crate::vm::error::{VmError, VmResult};
use crate::vm::opcode::Opcode;
use crate::vm::state::StatusRegister;

/// Branch condition of a conditional jump
fn condition(opcode: Opcode, sr: StatusRegister) -> bool {
    match opcode {
        Opcode::Je | Opcode::Jz => sr.zero,
        Opcode::Jne | Opcode::Jnz => !sr.zero,
        Opcode::Jl => sr.negative,
        Opcode::Jg => !sr.zero && !sr.negative,
        Opcode::Jle => sr.negative || sr.zero,
        Opcode::Jge => !sr.negative,
        _ => true,
    }
}

/// `JMP label`
pub fn op_jmp(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    let [label] = operands::<1>(ctx.opcode, ops)?;
    Ok(Flow::Jump(ctx.labels.resolve(label)?))
}

/// `Jcc label`; the label must exist even when the branch is not taken
pub fn op_jcc(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    let [label] = operands::<1>(ctx.opcode, ops)?;
    let target = ctx.labels.resolve(label)?;
    if condition(ctx.opcode, ctx.state.flags()) {
        Ok(Flow::Jump(target))
    } else {
        Ok(Flow::Next)
    }
}

/// `CALL label`: pushes the return index and jumps
pub fn op_call(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    let [label] = operands::<1>(ctx.opcode, ops)?;
    let target = ctx.labels.resolve(label)?;

    let sp = ctx.state.sp();
    if sp == 0 {
        return Err(VmError::StackOverflow);
    }
    ctx.state.write_memory(sp as i64 - 1, (ctx.cursor + 1) as f64)?;
    ctx.state.set_sp(sp - 1);
    Ok(Flow::Jump(target))
}

/// `RET`: pops a return index in `0..=program length`
pub fn op_ret(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    operands::<0>(ctx.opcode, ops)?;
    let sp = ctx.state.sp();
    if sp >= ctx.state.memory_len() {
        return Err(VmError::StackUnderflow);
    }

    let cell = ctx.state.read_memory(sp as i64)?;
    let valid = cell.is_finite()
        && cell.fract() == 0.0
        && cell >= 0.0
        && cell <= ctx.program_len as f64;
    if !valid {
        return Err(VmError::InvalidReturnAddress(cell.to_string()));
    }

    ctx.state.set_sp(sp + 1);
    Ok(Flow::Jump(cell as usize))
}
