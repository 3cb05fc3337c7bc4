//! Opcodes
//!
//! The closed instruction set, its mnemonics and the static arity table.

use std::fmt;
use std::str::FromStr;

use super::error::VmError;

/// Instruction families, one per handler module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeCategory {
    Arithmetic,
    Data,
    Stack,
    Control,
    Simd,
    Config,
}

impl fmt::Display for OpcodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Arithmetic => "arithmetic",
            Self::Data => "data movement",
            Self::Stack => "stack",
            Self::Control => "control flow",
            Self::Simd => "simd",
            Self::Config => "configuration",
        };
        f.write_str(name)
    }
}

/// Opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ═══════════════════════════════════════════════════════════════
    // ARITHMETIC
    // ═══════════════════════════════════════════════════════════════
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Xor,
    Inc,
    Dec,
    Not,
    Cmp,

    // ═══════════════════════════════════════════════════════════════
    // DATA MOVEMENT
    // ═══════════════════════════════════════════════════════════════
    Mov,
    Load,
    Store,

    // ═══════════════════════════════════════════════════════════════
    // STACK
    // ═══════════════════════════════════════════════════════════════
    Push,
    Pop,
    Dup,
    Swap,
    Rot,

    // ═══════════════════════════════════════════════════════════════
    // CONTROL FLOW
    // ═══════════════════════════════════════════════════════════════
    Jmp,
    /// Jump if equal (FLAGS == 1)
    Je,
    /// Jump if zero (FLAGS == 1)
    Jz,
    /// Jump if not equal (FLAGS == 0)
    Jne,
    /// Jump if not zero (FLAGS == 0)
    Jnz,
    /// Jump if less (FLAG)
    Jl,
    /// Jump if greater (!FLAGS && !FLAG)
    Jg,
    /// Jump if less or equal (FLAG || FLAGS)
    Jle,
    /// Jump if greater or equal (!FLAG)
    Jge,
    Call,
    Ret,

    // ═══════════════════════════════════════════════════════════════
    // SIMD
    // ═══════════════════════════════════════════════════════════════
    Vadd,
    Vmul,
    Vdiv,
    Vload,
    Vstore,

    // ═══════════════════════════════════════════════════════════════
    // CONFIGURATION
    // ═══════════════════════════════════════════════════════════════
    SetMatSize,
}

impl Opcode {
    pub const ALL: [Opcode; 36] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::Inc,
        Self::Dec,
        Self::Not,
        Self::Cmp,
        Self::Mov,
        Self::Load,
        Self::Store,
        Self::Push,
        Self::Pop,
        Self::Dup,
        Self::Swap,
        Self::Rot,
        Self::Jmp,
        Self::Je,
        Self::Jz,
        Self::Jne,
        Self::Jnz,
        Self::Jl,
        Self::Jg,
        Self::Jle,
        Self::Jge,
        Self::Call,
        Self::Ret,
        Self::Vadd,
        Self::Vmul,
        Self::Vdiv,
        Self::Vload,
        Self::Vstore,
        Self::SetMatSize,
    ];

    /// Case-insensitive mnemonic lookup
    pub fn from_mnemonic(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .iter()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(token))
            .copied()
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Xor => "XOR",
            Self::Inc => "INC",
            Self::Dec => "DEC",
            Self::Not => "NOT",
            Self::Cmp => "CMP",
            Self::Mov => "MOV",
            Self::Load => "LOAD",
            Self::Store => "STORE",
            Self::Push => "PUSH",
            Self::Pop => "POP",
            Self::Dup => "DUP",
            Self::Swap => "SWAP",
            Self::Rot => "ROT",
            Self::Jmp => "JMP",
            Self::Je => "JE",
            Self::Jz => "JZ",
            Self::Jne => "JNE",
            Self::Jnz => "JNZ",
            Self::Jl => "JL",
            Self::Jg => "JG",
            Self::Jle => "JLE",
            Self::Jge => "JGE",
            Self::Call => "CALL",
            Self::Ret => "RET",
            Self::Vadd => "VADD",
            Self::Vmul => "VMUL",
            Self::Vdiv => "VDIV",
            Self::Vload => "VLOAD",
            Self::Vstore => "VSTORE",
            Self::SetMatSize => "SETMATSIZE",
        }
    }

    /// Number of operands the instruction takes
    pub fn arity(&self) -> usize {
        match self {
            Self::Mov | Self::Add | Self::Sub | Self::Mul | Self::Div |
            Self::And | Self::Or | Self::Xor | Self::Cmp |
            Self::Load | Self::Store |
            Self::Vload | Self::Vstore => 2,

            Self::Inc | Self::Dec | Self::Not |
            Self::Jmp | Self::Je | Self::Jz | Self::Jne | Self::Jnz |
            Self::Jl | Self::Jg | Self::Jle | Self::Jge |
            Self::Push | Self::Pop | Self::Call |
            Self::SetMatSize => 1,

            Self::Ret | Self::Dup | Self::Swap | Self::Rot => 0,

            Self::Vadd | Self::Vmul | Self::Vdiv => 3,
        }
    }

    pub fn category(&self) -> OpcodeCategory {
        match self {
            Self::Add | Self::Sub | Self::Mul | Self::Div |
            Self::And | Self::Or | Self::Xor |
            Self::Inc | Self::Dec | Self::Not | Self::Cmp => OpcodeCategory::Arithmetic,

            Self::Mov | Self::Load | Self::Store => OpcodeCategory::Data,

            Self::Push | Self::Pop | Self::Dup | Self::Swap | Self::Rot => OpcodeCategory::Stack,

            Self::Jmp | Self::Je | Self::Jz | Self::Jne | Self::Jnz |
            Self::Jl | Self::Jg | Self::Jle | Self::Jge |
            Self::Call | Self::Ret => OpcodeCategory::Control,

            Self::Vadd | Self::Vmul | Self::Vdiv | Self::Vload | Self::Vstore => OpcodeCategory::Simd,

            Self::SetMatSize => OpcodeCategory::Config,
        }
    }

    /// Conditional jumps
    pub fn is_conditional_jump(&self) -> bool {
        matches!(
            self,
            Self::Je | Self::Jz | Self::Jne | Self::Jnz |
            Self::Jl | Self::Jg | Self::Jle | Self::Jge
        )
    }
}

impl FromStr for Opcode {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_mnemonic(s).ok_or_else(|| VmError::UnknownInstruction(s.trim().to_string()))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
