//! Machine state
//!
//! Registers, flags, flat memory, vector registers and bit-width mode.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::error::{VmError, VmResult};
use super::operand::{AddressExpr, Value};

/// General-purpose registers (r0-r6)
pub const GENERAL_REGISTERS: usize = 7;
/// Vector registers (v0-v3)
pub const VECTOR_REGISTERS: usize = 4;
/// Lanes per vector register
pub const LANES: usize = 4;

/// Vector register contents
pub type Vector = [f64; LANES];

// ═══════════════════════════════════════════════════════════════════════════════
// BIT WIDTH
// ═══════════════════════════════════════════════════════════════════════════════

/// Active register width
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum BitWidth {
    W8,
    W16,
    W32,
}

impl BitWidth {
    /// Number of bits
    pub fn bit_count(&self) -> u32 {
        match self {
            Self::W8 => 8,
            Self::W16 => 16,
            Self::W32 => 32,
        }
    }

    /// Largest representable register value
    pub fn max_value(&self) -> u32 {
        match self {
            Self::W8 => 0xFF,
            Self::W16 => 0xFFFF,
            Self::W32 => u32::MAX,
        }
    }

    pub fn from_bits(bits: u32) -> VmResult<Self> {
        Ok(match bits {
            8 => Self::W8,
            16 => Self::W16,
            32 => Self::W32,
            _ => return Err(VmError::InvalidBitWidth(bits)),
        })
    }
}

impl fmt::Display for BitWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bit_count())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Named register of the register file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    /// Stack pointer (index into memory)
    Sp,
    /// Mirror of the execution cursor
    Pc,
    /// Zero / equal flag (0 or 1)
    Flags,
    /// Less-than / negative flag
    Flag,
    /// Overflow flag (0 or 1)
    Overflow,
}

impl Register {
    pub const ALL: [Register; 12] = [
        Self::R0,
        Self::R1,
        Self::R2,
        Self::R3,
        Self::R4,
        Self::R5,
        Self::R6,
        Self::Sp,
        Self::Pc,
        Self::Flags,
        Self::Flag,
        Self::Overflow,
    ];

    /// General-purpose register by index
    pub fn general(index: usize) -> Option<Self> {
        Self::ALL[..GENERAL_REGISTERS].get(index).copied()
    }

    /// Index into the general register bank
    pub fn general_index(&self) -> Option<usize> {
        Self::ALL[..GENERAL_REGISTERS].iter().position(|r| r == self)
    }

    /// Registers an arithmetic or data-movement instruction may write
    pub fn is_writable_by_program(&self) -> bool {
        self.general_index().is_some() || *self == Self::Sp
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::R0 => "r0",
            Self::R1 => "r1",
            Self::R2 => "r2",
            Self::R3 => "r3",
            Self::R4 => "r4",
            Self::R5 => "r5",
            Self::R6 => "r6",
            Self::Sp => "SP",
            Self::Pc => "PC",
            Self::Flags => "FLAGS",
            Self::Flag => "FLAG",
            Self::Overflow => "OVERFLOW",
        }
    }
}

impl FromStr for Register {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .iter()
            .find(|r| r.name().eq_ignore_ascii_case(name))
            .copied()
            .ok_or_else(|| VmError::InvalidRegister(name.to_string()))
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Status flags set by arithmetic and CMP
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusRegister {
    /// FLAGS: result was zero / operands were equal
    pub zero: bool,
    /// FLAG: result was negative / first operand was smaller
    pub negative: bool,
    /// OVERFLOW: |result| exceeded the active width
    pub overflow: bool,
}

impl StatusRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHANGE JOURNAL
// ═══════════════════════════════════════════════════════════════════════════════

/// Write recorded by the state, drained by the engine into events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Register(Register),
    Flags,
    Memory(usize),
    Vector(usize),
}

// ═══════════════════════════════════════════════════════════════════════════════
// MACHINE STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Complete machine state
#[derive(Debug, Clone)]
pub struct MachineState {
    regs: [u32; GENERAL_REGISTERS],
    sp: usize,
    pc: usize,
    sr: StatusRegister,
    memory: Vec<f64>,
    vectors: [Vector; VECTOR_REGISTERS],
    width: BitWidth,
    mat_size: usize,
    journal: Vec<Change>,
}

impl MachineState {
    /// Creates a zeroed machine with `memory_size` cells
    pub fn new(memory_size: usize, width: BitWidth) -> Self {
        let memory_size = memory_size.max(1);
        Self {
            regs: [0; GENERAL_REGISTERS],
            sp: memory_size - 1,
            pc: 0,
            sr: StatusRegister::new(),
            memory: vec![0.0; memory_size],
            vectors: [[0.0; LANES]; VECTOR_REGISTERS],
            width,
            mat_size: LANES,
            journal: Vec::new(),
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Width & masking
    // ───────────────────────────────────────────────────────────────────────────

    pub fn bit_width(&self) -> BitWidth {
        self.width
    }

    pub fn max_value(&self) -> u32 {
        self.width.max_value()
    }

    /// Changes the active width; existing register contents are not re-masked
    pub fn set_bit_width(&mut self, width: BitWidth) {
        self.width = width;
    }

    /// Two's-complement truncation to the active width
    pub fn mask(&self, raw: i128) -> u32 {
        (raw as u64 & self.max_value() as u64) as u32
    }

    /// Clamps into `[0, maxValue]`
    pub fn saturate(&self, raw: i128) -> u32 {
        raw.clamp(0, self.max_value() as i128) as u32
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Registers
    // ───────────────────────────────────────────────────────────────────────────

    pub fn read_register(&self, reg: Register) -> u32 {
        match reg {
            Register::Sp => self.sp as u32,
            Register::Pc => self.pc as u32,
            Register::Flags => self.sr.zero as u32,
            Register::Flag => self.sr.negative as u32,
            Register::Overflow => self.sr.overflow as u32,
            general => general.general_index().map_or(0, |i| self.regs[i]),
        }
    }

    /// Writes a register; general registers are masked to the active width
    pub fn write_register(&mut self, reg: Register, value: u32) -> VmResult<()> {
        match reg {
            Register::Pc => return Err(VmError::InvalidRegister(reg.name().to_string())),
            Register::Sp => {
                let sp = self.check_address(value as i64)?;
                self.sp = sp;
            }
            Register::Flags => self.sr.zero = value != 0,
            Register::Flag => self.sr.negative = value != 0,
            Register::Overflow => self.sr.overflow = value != 0,
            general => {
                if let Some(i) = general.general_index() {
                    self.regs[i] = value & self.max_value();
                }
            }
        }
        self.journal.push(Change::Register(reg));
        Ok(())
    }

    pub fn register_by_name(&self, name: &str) -> VmResult<u32> {
        Ok(self.read_register(name.parse()?))
    }

    pub fn set_register_by_name(&mut self, name: &str, value: u32) -> VmResult<()> {
        self.write_register(name.parse()?, value)
    }

    /// General-purpose register values r0-r6
    pub fn general_registers(&self) -> [u32; GENERAL_REGISTERS] {
        self.regs
    }

    pub fn sp(&self) -> usize {
        self.sp
    }

    /// Moves SP; `memoryLength` is allowed as the empty-stack position
    pub(crate) fn set_sp(&mut self, sp: usize) {
        self.sp = sp.min(self.memory.len());
        self.journal.push(Change::Register(Register::Sp));
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub(crate) fn set_pc(&mut self, pc: usize) {
        self.pc = pc;
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Flags
    // ───────────────────────────────────────────────────────────────────────────

    pub fn flags(&self) -> StatusRegister {
        self.sr
    }

    /// Sets FLAGS / FLAG / OVERFLOW from an unmasked result
    pub fn update_flags(&mut self, raw: i128) {
        self.sr.zero = raw == 0;
        self.sr.negative = raw < 0;
        self.sr.overflow = raw.unsigned_abs() > self.max_value() as u128;
        self.journal.push(Change::Flags);
    }

    /// Flags for the exact quotient `dividend / divisor`; `divisor != 0`
    pub fn update_quotient_flags(&mut self, dividend: i128, divisor: i128) {
        self.sr.zero = dividend == 0;
        self.sr.negative = dividend != 0 && (dividend < 0) != (divisor < 0);
        self.sr.overflow =
            dividend.unsigned_abs() > self.max_value() as u128 * divisor.unsigned_abs();
        self.journal.push(Change::Flags);
    }

    /// CMP: equality and ordering, overflow untouched
    pub fn set_compare(&mut self, lhs: i128, rhs: i128) {
        self.sr.zero = lhs == rhs;
        self.sr.negative = lhs < rhs;
        self.journal.push(Change::Flags);
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Memory
    // ───────────────────────────────────────────────────────────────────────────

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn memory(&self) -> &[f64] {
        &self.memory
    }

    /// Validates `addr ∈ [0, memoryLength)`
    pub fn check_address(&self, addr: i64) -> VmResult<usize> {
        if addr < 0 || addr as u64 >= self.memory.len() as u64 {
            return Err(VmError::InvalidAddress(addr));
        }
        Ok(addr as usize)
    }

    pub fn read_memory(&self, addr: i64) -> VmResult<f64> {
        let addr = self.check_address(addr)?;
        Ok(self.memory[addr])
    }

    pub fn write_memory(&mut self, addr: i64, value: f64) -> VmResult<()> {
        let addr = self.check_address(addr)?;
        self.memory[addr] = value;
        self.journal.push(Change::Memory(addr));
        Ok(())
    }

    /// Reads a cell that must hold a finite number
    pub fn read_numeric(&self, addr: usize) -> VmResult<f64> {
        let value = self.read_memory(addr as i64)?;
        if !value.is_finite() {
            return Err(VmError::InvalidMemoryValue(addr));
        }
        Ok(value)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Vectors & configuration
    // ───────────────────────────────────────────────────────────────────────────

    pub fn vector(&self, index: usize) -> Vector {
        self.vectors[index]
    }

    pub fn vectors(&self) -> &[Vector; VECTOR_REGISTERS] {
        &self.vectors
    }

    pub fn set_vector(&mut self, index: usize, lanes: Vector) {
        self.vectors[index] = lanes;
        self.journal.push(Change::Vector(index));
    }

    pub fn mat_size(&self) -> usize {
        self.mat_size
    }

    pub(crate) fn set_mat_size(&mut self, size: usize) {
        self.mat_size = size;
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Operand resolution
    // ───────────────────────────────────────────────────────────────────────────

    /// Register contents or literal value
    pub fn resolve_value(&self, value: &Value) -> i64 {
        match value {
            Value::Register(reg) => self.read_register(*reg) as i64,
            Value::Immediate(imm) => *imm,
        }
    }

    /// `base (+ offset)`, unchecked
    pub fn effective_address(&self, expr: &AddressExpr) -> i64 {
        let base = self.resolve_value(&expr.base);
        let offset = expr.offset.as_ref().map_or(0, |v| self.resolve_value(v));
        base.saturating_add(offset)
    }

    /// Computes `base (+ offset)` and bounds-checks it
    pub fn resolve_address(&self, expr: &AddressExpr) -> VmResult<usize> {
        self.check_address(self.effective_address(expr))
    }

    /// Converts a memory cell into a register value (saturating)
    pub fn cell_to_register(&self, cell: f64) -> u32 {
        self.saturate(cell.trunc() as i128)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Observation
    // ───────────────────────────────────────────────────────────────────────────

    /// Drains the writes recorded since the last call
    pub fn take_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.journal)
    }

    /// Consistent read-only copy for observers
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            registers: self.regs,
            sp: self.sp,
            pc: self.pc,
            flags: self.sr,
            bit_width: self.width,
            vectors: self.vectors,
            mat_size: self.mat_size,
            memory: self.memory.clone(),
        }
    }
}

/// Copy of the machine state taken between steps
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub registers: [u32; GENERAL_REGISTERS],
    pub sp: usize,
    pub pc: usize,
    pub flags: StatusRegister,
    pub bit_width: BitWidth,
    pub vectors: [Vector; VECTOR_REGISTERS],
    pub mat_size: usize,
    pub memory: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_names_are_case_insensitive() {
        assert_eq!("R0".parse::<Register>().unwrap(), Register::R0);
        assert_eq!("sp".parse::<Register>().unwrap(), Register::Sp);
        assert_eq!("Overflow".parse::<Register>().unwrap(), Register::Overflow);
        assert!(matches!("r7".parse::<Register>(), Err(VmError::InvalidRegister(_))));
    }

    #[test]
    fn test_registers_by_name() {
        let mut state = MachineState::new(16, BitWidth::W32);
        state.set_register_by_name("R3", 42).unwrap();
        assert_eq!(state.register_by_name("r3"), Ok(42));
        assert_eq!(state.read_register(Register::R3), 42);
        assert!(matches!(state.register_by_name("foo"), Err(VmError::InvalidRegister(_))));
        assert!(matches!(
            state.set_register_by_name("r9", 1),
            Err(VmError::InvalidRegister(_))
        ));
        assert_eq!(state.general_registers(), [0, 0, 0, 42, 0, 0, 0]);
    }

    #[test]
    fn test_initial_state() {
        let state = MachineState::new(1000, BitWidth::W32);
        assert_eq!(state.sp(), 999);
        assert_eq!(state.memory_len(), 1000);
        assert_eq!(state.general_registers(), [0; GENERAL_REGISTERS]);
        assert_eq!(state.mat_size(), LANES);
    }

    #[test]
    fn test_mask_and_saturate() {
        let state = MachineState::new(16, BitWidth::W8);
        assert_eq!(state.mask(256), 0);
        assert_eq!(state.mask(-1), 255);
        assert_eq!(state.saturate(300), 255);
        assert_eq!(state.saturate(-4), 0);

        let wide = MachineState::new(16, BitWidth::W32);
        assert_eq!(wide.mask(-1), u32::MAX);
        assert_eq!(wide.mask(1 << 32), 0);
    }

    #[test]
    fn test_set_bit_width_does_not_remask() {
        let mut state = MachineState::new(16, BitWidth::W16);
        state.write_register(Register::R1, 0x1234).unwrap();
        state.set_bit_width(BitWidth::W8);
        assert_eq!(state.read_register(Register::R1), 0x1234);
        assert_eq!(state.max_value(), 0xFF);
    }

    #[test]
    fn test_pc_is_read_only_and_sp_is_bounded() {
        let mut state = MachineState::new(8, BitWidth::W32);
        assert!(matches!(
            state.write_register(Register::Pc, 1),
            Err(VmError::InvalidRegister(_))
        ));
        assert_eq!(state.write_register(Register::Sp, 8), Err(VmError::InvalidAddress(8)));
        state.write_register(Register::Sp, 3).unwrap();
        assert_eq!(state.sp(), 3);
    }

    #[test]
    fn test_memory_bounds() {
        let mut state = MachineState::new(4, BitWidth::W32);
        assert_eq!(state.read_memory(4), Err(VmError::InvalidAddress(4)));
        assert_eq!(state.write_memory(-1, 1.0), Err(VmError::InvalidAddress(-1)));
        state.write_memory(3, 9.0).unwrap();
        assert_eq!(state.read_memory(3).unwrap(), 9.0);
    }

    #[test]
    fn test_flags() {
        let mut state = MachineState::new(4, BitWidth::W8);
        state.update_flags(0);
        assert!(state.flags().zero);
        state.update_flags(-3);
        assert!(state.flags().negative && !state.flags().zero);
        state.update_flags(256);
        assert!(state.flags().overflow);
        state.set_compare(2, 5);
        assert!(state.flags().negative && !state.flags().zero);
        assert!(state.flags().overflow, "CMP leaves OVERFLOW alone");
    }

    #[test]
    fn test_journal_is_drained() {
        let mut state = MachineState::new(4, BitWidth::W8);
        state.write_register(Register::R2, 1).unwrap();
        state.write_memory(1, 2.0).unwrap();
        assert_eq!(
            state.take_changes(),
            vec![Change::Register(Register::R2), Change::Memory(1)]
        );
        assert!(state.take_changes().is_empty());
    }
}
