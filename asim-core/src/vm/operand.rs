//! Operand classification
//!
//! A token is, in order of precedence: a register name, a bracketed memory
//! reference (`[addr]` or `[base+offset]`), a hex literal (`0x…`), a binary
//! literal (`0b…`) or a base-10 literal.

use super::error::{VmError, VmResult};
use super::state::{Register, VECTOR_REGISTERS};

/// Register-or-literal term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Register(Register),
    Immediate(i64),
}

impl Value {
    pub fn parse(token: &str) -> VmResult<Self> {
        let token = token.trim();
        if let Ok(reg) = token.parse::<Register>() {
            return Ok(Self::Register(reg));
        }
        parse_literal(token)
            .map(Self::Immediate)
            .ok_or_else(|| VmError::InvalidOperand(token.to_string()))
    }
}

/// Memory reference: `base` or `base+offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressExpr {
    pub base: Value,
    pub offset: Option<Value>,
}

impl AddressExpr {
    /// Parses an address, with or without surrounding brackets
    pub fn parse(token: &str) -> VmResult<Self> {
        let inner: String = token
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '[' && *c != ']')
            .collect();
        if inner.is_empty() {
            return Err(VmError::InvalidOperand(token.trim().to_string()));
        }

        match inner.split_once('+') {
            Some((base, offset)) => Ok(Self {
                base: Value::parse(base)?,
                offset: Some(Value::parse(offset)?),
            }),
            None => Ok(Self {
                base: Value::parse(&inner)?,
                offset: None,
            }),
        }
    }
}

/// Classified operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    Memory(AddressExpr),
    Immediate(i64),
}

impl Operand {
    pub fn parse(token: &str) -> VmResult<Self> {
        let token = token.trim();
        if let Ok(reg) = token.parse::<Register>() {
            return Ok(Self::Register(reg));
        }
        if is_memory_reference(token) {
            return AddressExpr::parse(token).map(Self::Memory);
        }
        parse_literal(token)
            .map(Self::Immediate)
            .ok_or_else(|| VmError::InvalidOperand(token.to_string()))
    }
}

/// `[ ... ]`
pub fn is_memory_reference(token: &str) -> bool {
    let token = token.trim();
    token.len() >= 2 && token.starts_with('[') && token.ends_with(']')
}

/// Parses `0x1F`, `0b1010`, `42` or `-42`
pub fn parse_literal(token: &str) -> Option<i64> {
    let token = token.trim();
    let (negative, body) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    if body.is_empty() {
        return None;
    }

    let lower = body.to_ascii_lowercase();
    let (digits, radix) = if let Some(hex) = lower.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (bin, 2)
    } else {
        (lower.as_str(), 10)
    };
    // from_str_radix would accept a sign here
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    if negative { magnitude.checked_neg() } else { Some(magnitude) }
}

/// Parses a vector register name: exactly `v0`..`v3`
pub fn parse_vector_register(token: &str) -> VmResult<usize> {
    let token = token.trim();
    let bytes = token.as_bytes();
    if bytes.len() == 2 && bytes[0] == b'v' && bytes[1].is_ascii_digit() {
        let index = (bytes[1] - b'0') as usize;
        if index < VECTOR_REGISTERS {
            return Ok(index);
        }
    }
    Err(VmError::InvalidOperand(token.to_string()))
}
