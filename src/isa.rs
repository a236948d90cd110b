//! Instruction set of the sigil stack machine.
//!
//! The machine executes a closed vocabulary of opcodes, each paired with a
//! single integer argument whose meaning depends on the opcode: an absolute
//! jump target for `jmp`/`jz`, a literal for `push`, an absolute address for
//! `mov`, and zero otherwise. Translated programs are persisted as JSON so the
//! translator and the emulator can run as separate invocations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for instruction construction and program (de)serialization
#[derive(Debug, Error)]
pub enum IsaError {
    #[error("unknown word: {0}")]
    UnknownWord(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type for ISA operations
pub type Result<T> = std::result::Result<T, IsaError>;

/// One operation of the machine, identified by its textual form in source and
/// in the serialized program format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "%")]
    Mod,
    #[serde(rename = "dup")]
    Dup,
    #[serde(rename = ".")]
    Output,
    #[serde(rename = "input")]
    Input,
    #[serde(rename = "jmp")]
    Jmp,
    #[serde(rename = "jz")]
    Jz,
    #[serde(rename = "dec")]
    Dec,
    #[serde(rename = "inc")]
    Inc,
    #[serde(rename = "mov")]
    Mov,
    #[serde(rename = "mov_rbp")]
    MovRbp,
    #[serde(rename = "push")]
    Push,
    #[serde(rename = "halt")]
    Halt,
}

impl Opcode {
    /// The textual form used in source programs and in the JSON format.
    pub fn as_str(self) -> &'static str {
        match self {
            Opcode::Eq => "=",
            Opcode::Neq => "!=",
            Opcode::Add => "+",
            Opcode::Sub => "-",
            Opcode::Mul => "*",
            Opcode::Div => "/",
            Opcode::Mod => "%",
            Opcode::Dup => "dup",
            Opcode::Output => ".",
            Opcode::Input => "input",
            Opcode::Jmp => "jmp",
            Opcode::Jz => "jz",
            Opcode::Dec => "dec",
            Opcode::Inc => "inc",
            Opcode::Mov => "mov",
            Opcode::MovRbp => "mov_rbp",
            Opcode::Push => "push",
            Opcode::Halt => "halt",
        }
    }

    /// Look a token up in the opcode vocabulary.
    pub fn from_token(token: &str) -> Option<Opcode> {
        let code = match token {
            "=" => Opcode::Eq,
            "!=" => Opcode::Neq,
            "+" => Opcode::Add,
            "-" => Opcode::Sub,
            "*" => Opcode::Mul,
            "/" => Opcode::Div,
            "%" => Opcode::Mod,
            "dup" => Opcode::Dup,
            "." => Opcode::Output,
            "input" => Opcode::Input,
            "jmp" => Opcode::Jmp,
            "jz" => Opcode::Jz,
            "dec" => Opcode::Dec,
            "inc" => Opcode::Inc,
            "mov" => Opcode::Mov,
            "mov_rbp" => Opcode::MovRbp,
            "push" => Opcode::Push,
            "halt" => Opcode::Halt,
            _ => return None,
        };
        Some(code)
    }

    /// Binary opcodes pop two operands and push one result.
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            Opcode::Eq
                | Opcode::Neq
                | Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Mod
        )
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opcode with its integer argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub code: Opcode,
    pub arg: i64,
}

impl Instruction {
    pub fn new(code: Opcode, arg: i64) -> Instruction {
        Instruction { code, arg }
    }

    /// Interpret a source token as an instruction.
    ///
    /// A token that parses as a base-10 integer or as a single-quoted
    /// character becomes a `push` of that value; anything else must name an
    /// opcode and carries the given argument.
    pub fn from_token(token: &str, arg: i64) -> Result<Instruction> {
        if let Ok(value) = token.parse::<i64>() {
            return Ok(Instruction::new(Opcode::Push, value));
        }

        if let Some(code_point) = char_literal(token) {
            return Ok(Instruction::new(Opcode::Push, code_point));
        }

        match Opcode::from_token(token) {
            Some(code) => Ok(Instruction::new(code, arg)),
            None => Err(IsaError::UnknownWord(token.to_string())),
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} {}", self.code, self.arg)
    }
}

/// Code point of a single-quoted character token, e.g. `'a'`, `' '`, `'\n'`.
fn char_literal(token: &str) -> Option<i64> {
    let inner = token.strip_prefix('\'')?.strip_suffix('\'')?;

    match inner {
        "\\n" => Some('\n' as i64),
        "\\0" => Some(0),
        "\\t" => Some('\t' as i64),
        _ => {
            let mut chars = inner.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Some(ch as i64),
                _ => None,
            }
        }
    }
}

/// A translated program: the data segment followed, in the machine's address
/// space, by the instruction sequence. Jump targets are already absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledProgram {
    pub data: Vec<i64>,
    pub program: Vec<Instruction>,
}

impl CompiledProgram {
    /// Serialize to the pretty-printed JSON interchange format.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from the JSON interchange format.
    pub fn from_json(text: &str) -> Result<CompiledProgram> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_token_becomes_push() {
        let instr = Instruction::from_token("42", 0).unwrap();
        assert_eq!(instr, Instruction::new(Opcode::Push, 42));

        let instr = Instruction::from_token("-7", 0).unwrap();
        assert_eq!(instr, Instruction::new(Opcode::Push, -7));
    }

    #[test]
    fn char_token_becomes_push() {
        let instr = Instruction::from_token("'a'", 0).unwrap();
        assert_eq!(instr, Instruction::new(Opcode::Push, 97));

        let instr = Instruction::from_token("' '", 0).unwrap();
        assert_eq!(instr, Instruction::new(Opcode::Push, 32));
    }

    #[test]
    fn escaped_char_tokens() {
        assert_eq!(Instruction::from_token("'\\n'", 0).unwrap().arg, 10);
        assert_eq!(Instruction::from_token("'\\t'", 0).unwrap().arg, 9);
        assert_eq!(Instruction::from_token("'\\0'", 0).unwrap().arg, 0);
    }

    #[test]
    fn opcode_token_keeps_argument() {
        let instr = Instruction::from_token("jz", 17).unwrap();
        assert_eq!(instr, Instruction::new(Opcode::Jz, 17));
    }

    #[test]
    fn unknown_token_is_rejected() {
        let err = Instruction::from_token("frobnicate", 0).unwrap_err();
        assert!(matches!(err, IsaError::UnknownWord(word) if word == "frobnicate"));
    }

    #[test]
    fn opcode_textual_forms_round_trip() {
        for token in [
            "=", "!=", "+", "-", "*", "/", "%", "dup", ".", "input", "jmp", "jz", "dec", "inc",
            "mov", "mov_rbp", "push", "halt",
        ] {
            let code = Opcode::from_token(token).unwrap();
            assert_eq!(code.as_str(), token);
        }
    }

    #[test]
    fn binary_opcodes_are_classified() {
        for token in ["=", "!=", "+", "-", "*", "/", "%"] {
            assert!(Opcode::from_token(token).unwrap().is_binary());
        }
        for token in ["dup", ".", "jmp", "push", "halt"] {
            assert!(!Opcode::from_token(token).unwrap().is_binary());
        }
    }

    #[test]
    fn program_json_round_trip() {
        let program = CompiledProgram {
            data: vec![0, 0, 2, 104, 105],
            program: vec![
                Instruction::new(Opcode::Push, 3),
                Instruction::new(Opcode::Jz, 9),
                Instruction::new(Opcode::Halt, 0),
            ],
        };

        let json = program.to_json().unwrap();
        assert_eq!(CompiledProgram::from_json(&json).unwrap(), program);
    }

    #[test]
    fn serialized_opcodes_use_textual_forms() {
        let json = serde_json::to_string(&Instruction::new(Opcode::MovRbp, 0)).unwrap();
        assert_eq!(json, r#"{"code":"mov_rbp","arg":0}"#);
    }
}
