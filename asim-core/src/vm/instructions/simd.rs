//! Vector operations: VADD, VMUL, VDIV, VLOAD, VSTORE, SETMATSIZE
//!
//! Four `f64` lanes per register. Results are built in a temporary and
//! committed only when every lane succeeded.

use super::{operands, scalar, ExecContext, Flow};
use crate::vm::error::{VmError, VmResult};
use crate::vm::operand::{parse_vector_register, AddressExpr};
use crate::vm::state::{MachineState, Vector, LANES};

fn lanewise(ctx: &mut ExecContext<'_>, ops: &[String], f: fn(f64, f64) -> f64) -> VmResult<Flow> {
    let [dest, a, b] = operands::<3>(ctx.opcode, ops)?;
    let dest = parse_vector_register(dest)?;
    let a = ctx.state.vector(parse_vector_register(a)?);
    let b = ctx.state.vector(parse_vector_register(b)?);
    let lanes: Vector = std::array::from_fn(|i| f(a[i], b[i]));
    ctx.state.set_vector(dest, lanes);
    Ok(Flow::Next)
}

/// First of four consecutive cells; `address + 3` must be in range
fn block_address(state: &MachineState, token: &str) -> VmResult<usize> {
    let addr = state.effective_address(&AddressExpr::parse(token)?);
    let last = addr.checked_add(LANES as i64 - 1);
    match last {
        Some(last) if addr >= 0 && (last as u64) < state.memory_len() as u64 => Ok(addr as usize),
        _ => Err(VmError::InvalidAddress(addr)),
    }
}

pub fn op_vadd(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    lanewise(ctx, ops, |a, b| a + b)
}

pub fn op_vmul(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    lanewise(ctx, ops, |a, b| a * b)
}

/// Any zero divisor lane rejects the whole operation
pub fn op_vdiv(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    let [dest, _, divisor] = operands::<3>(ctx.opcode, ops)?;
    parse_vector_register(dest)?;
    let divisor = ctx.state.vector(parse_vector_register(divisor)?);
    if divisor.iter().any(|&lane| lane == 0.0) {
        return Err(VmError::DivisionByZero);
    }
    lanewise(ctx, ops, |a, b| a / b)
}

/// `VLOAD dest, [address]`
pub fn op_vload(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    let [dest, address] = operands::<2>(ctx.opcode, ops)?;
    let dest = parse_vector_register(dest)?;
    let base = block_address(ctx.state, address)?;

    let mut lanes: Vector = [0.0; LANES];
    for (i, lane) in lanes.iter_mut().enumerate() {
        let cell = ctx.state.read_memory((base + i) as i64)?;
        if !cell.is_finite() {
            return Err(VmError::InvalidValue(base + i));
        }
        *lane = cell;
    }
    ctx.state.set_vector(dest, lanes);
    Ok(Flow::Next)
}

/// `VSTORE src, [address]`
pub fn op_vstore(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    let [src, address] = operands::<2>(ctx.opcode, ops)?;
    let lanes = ctx.state.vector(parse_vector_register(src)?);
    let base = block_address(ctx.state, address)?;
    for (i, lane) in lanes.into_iter().enumerate() {
        ctx.state.write_memory((base + i) as i64, lane)?;
    }
    Ok(Flow::Next)
}

/// `SETMATSIZE n` with `1 <= n <= 4`; advisory only
pub fn op_setmatsize(ctx: &mut ExecContext<'_>, ops: &[String]) -> VmResult<Flow> {
    let [size] = operands::<1>(ctx.opcode, ops)?;
    let n = scalar(ctx.state, size)?;
    if !(1..=LANES as i64).contains(&n) {
        return Err(VmError::InvalidOperand(size.trim().to_string()));
    }
    ctx.state.set_mat_size(n as usize);
    Ok(Flow::Next)
}

#[cfg(test)]
mod tests {
    use crate::vm::error::VmError;
    use crate::vm::instructions::test_support::{exec, machine};
    use crate::vm::state::BitWidth;

    #[test]
    fn test_vadd_vmul() {
        let mut state = machine(BitWidth::W32);
        state.set_vector(1, [1.0, 2.0, 3.0, 4.0]);
        state.set_vector(2, [4.0, 3.0, 2.0, 1.0]);
        exec(&mut state, "VADD v0, v1, v2").unwrap();
        assert_eq!(state.vector(0), [5.0; 4]);
        exec(&mut state, "VMUL v3, v1, v2").unwrap();
        assert_eq!(state.vector(3), [4.0, 6.0, 6.0, 4.0]);
    }

    #[test]
    fn test_vdiv_zero_lane_is_atomic() {
        let mut state = machine(BitWidth::W32);
        state.set_vector(0, [9.0; 4]);
        state.set_vector(1, [8.0, 6.0, 4.0, 2.0]);
        state.set_vector(2, [2.0, 0.0, 2.0, 2.0]);
        assert_eq!(exec(&mut state, "VDIV v0, v1, v2"), Err(VmError::DivisionByZero));
        assert_eq!(state.vector(0), [9.0; 4]);

        state.set_vector(2, [2.0; 4]);
        exec(&mut state, "VDIV v0, v1, v2").unwrap();
        assert_eq!(state.vector(0), [4.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_vdiv_checks_destination_before_divisor() {
        let mut state = machine(BitWidth::W32);
        state.set_vector(1, [1.0; 4]);
        assert!(matches!(exec(&mut state, "VDIV v9, v1, v2"), Err(VmError::InvalidOperand(_))));
        assert_eq!(exec(&mut state, "VDIV v0, v1, v2"), Err(VmError::DivisionByZero));
    }

    #[test]
    fn test_vector_names_are_strict() {
        let mut state = machine(BitWidth::W32);
        assert!(matches!(exec(&mut state, "VADD V0, v1, v2"), Err(VmError::InvalidOperand(_))));
        assert!(matches!(exec(&mut state, "VADD v0, v1, v4"), Err(VmError::InvalidOperand(_))));
    }

    #[test]
    fn test_vload_vstore() {
        let mut state = machine(BitWidth::W32);
        for (i, value) in [1.5, 2.5, 3.5, 4.5].into_iter().enumerate() {
            state.write_memory(i as i64 + 2, value).unwrap();
        }
        exec(&mut state, "VLOAD v1, [2]").unwrap();
        assert_eq!(state.vector(1), [1.5, 2.5, 3.5, 4.5]);

        exec(&mut state, "VSTORE v1, [12]").unwrap();
        assert_eq!(&state.memory()[12..16], &[1.5, 2.5, 3.5, 4.5]);
        assert_eq!(exec(&mut state, "VSTORE v1, [13]"), Err(VmError::InvalidAddress(13)));
        assert_eq!(exec(&mut state, "VLOAD v1, [-1]"), Err(VmError::InvalidAddress(-1)));
    }

    #[test]
    fn test_vload_rejects_non_numeric() {
        let mut state = machine(BitWidth::W32);
        state.write_memory(5, f64::NAN).unwrap();
        assert_eq!(exec(&mut state, "VLOAD v2, [4]"), Err(VmError::InvalidValue(5)));
        assert_eq!(state.vector(2), [0.0; 4]);
    }

    #[test]
    fn test_setmatsize() {
        let mut state = machine(BitWidth::W32);
        exec(&mut state, "SETMATSIZE 2").unwrap();
        assert_eq!(state.mat_size(), 2);
        assert!(matches!(exec(&mut state, "SETMATSIZE 5"), Err(VmError::InvalidOperand(_))));
        assert!(matches!(exec(&mut state, "SETMATSIZE 0"), Err(VmError::InvalidOperand(_))));
        assert_eq!(state.mat_size(), 2);
    }
}
