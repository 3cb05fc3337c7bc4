//! Program loader
//!
//! Turns source text into one statement per source line plus a label table.
//!
//! # Syntax
//!
//! ```text
//! ; comment
//! start:              ; label
//!     MOV r0, 10      ; instruction
//!     DEC r0
//!     JNZ start
//! END                 ; terminator
//! ```
//!
//! Blank and comment-only lines stay in the program as placeholders, so the
//! statement index always equals the 0-based source line.

use std::collections::HashMap;
use std::fmt;

use super::error::{VmError, VmResult};

/// Raw instruction: mnemonic plus trimmed operand tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: String,
    pub operands: Vec<String>,
}

impl Instruction {
    /// Splits `OPCODE a, b, c` into mnemonic and operands
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let (mnemonic, rest) = match text.split_once(char::is_whitespace) {
            Some((mnemonic, rest)) => (mnemonic, rest.trim()),
            None => (text, ""),
        };
        let operands = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(|op| op.trim().to_string()).collect()
        };
        Self {
            mnemonic: mnemonic.to_string(),
            operands,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic.to_uppercase())?;
        if !self.operands.is_empty() {
            write!(f, " {}", self.operands.join(", "))?;
        }
        Ok(())
    }
}

/// What a source line contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    /// Empty or comment-only line
    Blank,
    /// `name:` definition; anything after the colon is not executed
    Label { name: String },
    Instruction(Instruction),
    /// END / HALT / .END ...
    Terminator,
}

/// One source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// 0-based source line
    pub index: usize,
    /// Line text with the comment stripped
    pub text: String,
    pub kind: StatementKind,
}

impl Statement {
    /// Instruction to execute at this line, if any
    pub fn instruction(&self) -> Option<&Instruction> {
        match &self.kind {
            StatementKind::Instruction(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self.kind, StatementKind::Blank)
    }
}

/// Label name → statement index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    labels: HashMap<String, usize>,
}

impl LabelTable {
    /// Resolves a jump target; text after the first `:` is ignored
    pub fn resolve(&self, target: &str) -> VmResult<usize> {
        let name = normalize_label(target);
        self.labels
            .get(name)
            .copied()
            .ok_or_else(|| VmError::UnknownLabel(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.labels.get(normalize_label(name)).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels sorted by position
    pub fn sorted(&self) -> Vec<(&str, usize)> {
        let mut labels: Vec<(&str, usize)> =
            self.labels.iter().map(|(name, &index)| (name.as_str(), index)).collect();
        labels.sort_by_key(|&(name, index)| (index, name));
        labels
    }

    fn insert(&mut self, name: &str, index: usize) -> VmResult<()> {
        if self.labels.contains_key(name) {
            return Err(VmError::DuplicateLabel {
                label: name.to_string(),
                line: index + 1,
            });
        }
        self.labels.insert(name.to_string(), index);
        Ok(())
    }
}

fn normalize_label(target: &str) -> &str {
    target.split(':').next().unwrap_or_default().trim()
}

/// Loaded program
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    statements: Vec<Statement>,
    labels: LabelTable,
}

impl Program {
    /// Parses source text; the only load-time error is a duplicate label
    pub fn parse(source: &str) -> VmResult<Self> {
        let mut statements = Vec::new();
        let mut labels = LabelTable::default();

        for (index, raw) in source.lines().enumerate() {
            let text = strip_comment(raw).trim().to_string();
            let kind = classify(&text);
            if let StatementKind::Label { name, .. } = &kind {
                labels.insert(name, index)?;
            }
            statements.push(Statement { index, text, kind });
        }

        Ok(Self { statements, labels })
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statement(&self, index: usize) -> Option<&Statement> {
        self.statements.get(index)
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Statements that carry an instruction
    pub fn instruction_count(&self) -> usize {
        self.statements.iter().filter(|s| s.instruction().is_some()).count()
    }

    /// Human-readable listing, one line per non-blank statement
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for stmt in self.statements.iter().filter(|s| !s.is_blank()) {
            let line = match &stmt.kind {
                StatementKind::Label { name } => format!("{}:", name),
                StatementKind::Instruction(inst) => format!("    {}", inst),
                StatementKind::Terminator => format!("    {}", stmt.text.to_uppercase()),
                StatementKind::Blank => continue,
            };
            out.push_str(&format!("{:4}  {}\n", stmt.index + 1, line));
        }
        out
    }
}

/// True when the text holds nothing but whitespace and comments
pub fn is_blank_source(source: &str) -> bool {
    source.lines().all(|line| strip_comment(line).trim().is_empty())
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn is_terminator(text: &str) -> bool {
    let upper = text.to_ascii_uppercase();
    matches!(upper.as_str(), "END" | "END:" | "END_OF_PROGRAM" | "HALT" | ".END")
        || upper.starts_with("END ")
}

/// `^(\w+):` → label name
fn label_name(text: &str) -> Option<&str> {
    let end = text
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map_or(text.len(), |(i, _)| i);
    if end > 0 && text[end..].starts_with(':') {
        Some(&text[..end])
    } else {
        None
    }
}

fn classify(text: &str) -> StatementKind {
    if text.is_empty() {
        return StatementKind::Blank;
    }
    if is_terminator(text) {
        return StatementKind::Terminator;
    }
    if let Some(name) = label_name(text) {
        return StatementKind::Label { name: name.to_string() };
    }
    StatementKind::Instruction(Instruction::parse(text))
}
