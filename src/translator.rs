//! Translator from the Forth-like source language to machine programs.
//!
//! Translation runs in two passes over the token stream. The first pass is a
//! macro expander: `: name body ;` definitions are recorded in a word table
//! and inlined, recursively, at every use site, and `."text"` literals are
//! rewritten into a print loop over a data blob. The second pass is a
//! recursive-descent parser that flattens `if`/`else`/`then` and
//! `begin`/`until` into relative jumps; a final walk rebases those jumps onto
//! absolute addresses once the data segment length is known.
//!
//! Expansion is pure textual substitution with no recursion guard: a word
//! defined in terms of itself never finishes expanding. That is accepted
//! translator behavior, mirrored from the language it implements.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::isa::{self, CompiledProgram, Instruction, Opcode};

/// Errors that abort translation. No output is produced once one occurs.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("word redeclaration: {0}")]
    WordRedeclaration(String),

    #[error("string is not terminated")]
    UnterminatedString,

    #[error("expected a word after ':'")]
    MissingDefinitionName,

    #[error("definition of '{0}' is not terminated")]
    UnterminatedDefinition(String),

    #[error("word definition is not allowed here")]
    MisplacedDefinition,

    #[error("expected '{expected}', found {found}")]
    ExpectedKeyword {
        expected: &'static str,
        found: String,
    },

    #[error("unexpected '{0}'")]
    UnexpectedToken(String),

    #[error("'mov' has no string literal left to address")]
    MissingBlob,

    #[error(transparent)]
    Isa(#[from] isa::IsaError),
}

/// Result type for translation
pub type Result<T> = std::result::Result<T, TranslateError>;

/// Body of the `swap` built-in: exchange the two topmost stack values using
/// only arithmetic and pointer moves.
const SWAP: &[&str] = &["dup", "inc", "-", "dup", "dec", "-", "dup", "inc", "+", "dec"];

/// Body of the `drop` built-in.
const DROP: &[&str] = &["inc"];

/// Body of the `.s` built-in: print a length-prefixed region the stack
/// pointer was retargeted into, one cell per iteration.
const PRINT_LOOP: &[&str] = &["begin", "swap", ".", "1", "swap", "-", "dup", "until"];

/// Translate source text into an executable program.
pub fn translate(source: &str) -> Result<CompiledProgram> {
    let prepared = format!("{} halt", source.replace('\n', " ").trim().to_lowercase());
    let tokens = tokenize(&prepared)?;

    let mut words = builtin_words();
    let mut blobs = Vec::new();
    let expanded = expand(&tokens, &mut words, &mut blobs)?;
    debug!("expanded to {} tokens, {} blobs", expanded.len(), blobs.len());

    let mut cursor = BlobCursor::new(&blobs);
    let (mut program, stopped_at) = parse_block(&expanded, 0, &mut cursor)?;
    if stopped_at < expanded.len() {
        return Err(TranslateError::UnexpectedToken(
            expanded[stopped_at].clone(),
        ));
    }

    let data: Vec<i64> = blobs.concat();
    resolve_jumps(&mut program, data.len());

    Ok(CompiledProgram { data, program })
}

/// The seeded word table. User definitions may not shadow these.
fn builtin_words() -> HashMap<String, Vec<String>> {
    let owned = |body: &[&str]| body.iter().map(|t| t.to_string()).collect();

    HashMap::from([
        ("swap".to_string(), owned(SWAP)),
        ("drop".to_string(), owned(DROP)),
        (".s".to_string(), owned(PRINT_LOOP)),
    ])
}

/// Split prepared source into tokens.
///
/// Whitespace separates tokens, with two exceptions: a token opening with
/// `."` runs through its nearest closing quote, and `' '` is one token even
/// though it contains a space.
fn tokenize(text: &str) -> Result<Vec<String>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut ind = 0;

    while ind < chars.len() {
        if chars[ind].is_whitespace() {
            ind += 1;
        } else if chars[ind] == '.' && chars.get(ind + 1) == Some(&'"') {
            let close = chars[ind + 2..]
                .iter()
                .position(|&ch| ch == '"')
                .ok_or(TranslateError::UnterminatedString)?;
            let end = ind + 2 + close + 1;
            tokens.push(chars[ind..end].iter().collect());
            ind = end;
        } else if chars[ind] == '\''
            && chars.get(ind + 1) == Some(&' ')
            && chars.get(ind + 2) == Some(&'\'')
        {
            tokens.push("' '".to_string());
            ind += 3;
        } else {
            let start = ind;
            while ind < chars.len() && !chars[ind].is_whitespace() {
                ind += 1;
            }
            tokens.push(chars[start..ind].iter().collect());
        }
    }

    Ok(tokens)
}

/// First pass: record definitions, inline every defined word depth-first, and
/// rewrite string literals into `mov` + print loop + `mov_rbp`, collecting
/// their bytes as data blobs.
fn expand(
    tokens: &[String],
    words: &mut HashMap<String, Vec<String>>,
    blobs: &mut Vec<Vec<i64>>,
) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut ind = 0;

    while ind < tokens.len() {
        let token = tokens[ind].as_str();

        if token == ":" {
            let name = tokens
                .get(ind + 1)
                .ok_or(TranslateError::MissingDefinitionName)?
                .clone();
            if words.contains_key(&name) || Opcode::from_token(&name).is_some() {
                return Err(TranslateError::WordRedeclaration(name));
            }

            ind += 2;
            let mut body = Vec::new();
            loop {
                match tokens.get(ind) {
                    Some(word) if word == ";" => break,
                    Some(word) => body.push(word.clone()),
                    None => return Err(TranslateError::UnterminatedDefinition(name)),
                }
                ind += 1;
            }
            words.insert(name, body);
        } else if let Some(rest) = token.strip_prefix(".\"") {
            let text = rest
                .strip_suffix('"')
                .ok_or(TranslateError::UnterminatedString)?;

            out.push("mov".to_string());
            let print_loop: Vec<String> = PRINT_LOOP.iter().map(|t| t.to_string()).collect();
            out.extend(expand(&print_loop, words, blobs)?);
            out.push("mov_rbp".to_string());

            // 3-cell header [0, 0, len], then the raw bytes.
            let mut blob = vec![0, 0, text.chars().count() as i64];
            blob.extend(text.chars().map(|ch| ch as i64));
            blobs.push(blob);
        } else if let Some(body) = words.get(token).cloned() {
            out.extend(expand(&body, words, blobs)?);
        } else {
            out.push(token.to_string());
        }

        ind += 1;
    }

    Ok(out)
}

/// Hands out the address of the next unassigned blob, one per `mov` token in
/// emission order. The address is one past the blob's first cell.
struct BlobCursor<'a> {
    blobs: &'a [Vec<i64>],
    consumed: usize,
}

impl<'a> BlobCursor<'a> {
    fn new(blobs: &'a [Vec<i64>]) -> BlobCursor<'a> {
        BlobCursor { blobs, consumed: 0 }
    }

    fn next_addr(&mut self) -> Result<i64> {
        if self.consumed >= self.blobs.len() {
            return Err(TranslateError::MissingBlob);
        }
        let start: usize = self.blobs[..self.consumed].iter().map(Vec::len).sum();
        self.consumed += 1;
        Ok(start as i64 + 1)
    }
}

/// Second pass: compile the expanded token stream into instructions, turning
/// structured control flow into relative jumps.
///
/// Returns the compiled block together with the index of the token that
/// stopped it (`else`/`then`/`until`, or one past the end of input). Block
/// lengths are known as soon as a recursive call returns, so jump distances
/// are resolved on the way out with no backpatch table.
fn parse_block(
    tokens: &[String],
    mut ind: usize,
    blobs: &mut BlobCursor,
) -> Result<(Vec<Instruction>, usize)> {
    let mut prog = Vec::new();

    while ind < tokens.len() {
        match tokens[ind].as_str() {
            ":" => return Err(TranslateError::MisplacedDefinition),
            "else" | "then" | "until" => break,
            "mov" => prog.push(Instruction::new(Opcode::Mov, blobs.next_addr()?)),
            "mov_rbp" => prog.push(Instruction::new(Opcode::MovRbp, 0)),
            "if" => {
                let (then_body, next) = parse_block(tokens, ind + 1, blobs)?;
                expect_keyword(tokens, next, "else")?;
                let (else_body, next) = parse_block(tokens, next + 1, blobs)?;
                expect_keyword(tokens, next, "then")?;
                ind = next;

                prog.push(Instruction::new(Opcode::Inc, 0));
                prog.push(Instruction::new(Opcode::Jz, then_body.len() as i64 + 2));
                prog.extend(then_body);
                prog.push(Instruction::new(Opcode::Jmp, else_body.len() as i64 + 1));
                prog.extend(else_body);
            }
            "begin" => {
                let (body, next) = parse_block(tokens, ind + 1, blobs)?;
                expect_keyword(tokens, next, "until")?;
                ind = next;

                let body_len = body.len() as i64;
                prog.extend(body);
                prog.push(Instruction::new(Opcode::Inc, 0));
                prog.push(Instruction::new(Opcode::Jz, 2));
                prog.push(Instruction::new(Opcode::Jmp, -(body_len + 2)));
            }
            token => prog.push(Instruction::from_token(token, 0)?),
        }

        ind += 1;
    }

    Ok((prog, ind))
}

fn expect_keyword(tokens: &[String], ind: usize, expected: &'static str) -> Result<()> {
    match tokens.get(ind) {
        Some(token) if token == expected => Ok(()),
        Some(token) => Err(TranslateError::ExpectedKeyword {
            expected,
            found: format!("'{token}'"),
        }),
        None => Err(TranslateError::ExpectedKeyword {
            expected,
            found: "end of input".to_string(),
        }),
    }
}

/// Rebase relative jump offsets onto absolute addresses. Instruction `i`
/// lives at memory address `i + data_len`, so both terms are added to the
/// stored offset.
fn resolve_jumps(program: &mut [Instruction], data_len: usize) {
    for (index, instr) in program.iter_mut().enumerate() {
        if matches!(instr.code, Opcode::Jmp | Opcode::Jz) {
            instr.arg += (index + data_len) as i64;
        }
    }
}
