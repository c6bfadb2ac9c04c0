//! Two-pass assembler and disassembler.
//!
//! Mirrors the original's single-scan emit pass (opcode candidates tried in
//! declaration order, forward procedure references recorded as
//! `(offset, name)` placeholders) followed by a resolution pass that
//! patches every placeholder once every label is known.

pub mod tokenizer;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::bytecode::{specs_for_mnemonic, OperandKind, Program, MAX_REGISTERS};
use crate::errors::AssembleError;

use tokenizer::tokenize_line;

/// Mnemonics whose `LitInt` operand is a jump target rather than a plain
/// number, for the disassembler's hex-address rendering.
const ADDRESS_MNEMONICS: &[&str] = &["fork", "call", "jl", "je", "jg", "jmp"];

/// Holds unassembled source text until [`Assembler::assemble`] runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembler {
    contents: String,
}

struct LabelRef {
    offset: usize,
    name: String,
}

impl Assembler {
    /// An assembler over already-loaded source text.
    pub fn from_string(contents: &str) -> Self {
        Self { contents: contents.to_owned() }
    }

    /// Read source text from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, AssembleError> {
        let contents = fs::read_to_string(path)?;
        Ok(Self::from_string(&contents))
    }

    /// Assemble into a loaded, runnable [`Program`].
    pub fn assemble(&self) -> Result<Program, AssembleError> {
        let mut output: Vec<u8> = Vec::new();
        let mut procedures: HashMap<String, usize> = HashMap::new();
        let mut label_refs: Vec<LabelRef> = Vec::new();

        for (index, line) in self.contents.lines().enumerate() {
            let line_no = index + 1;
            let tokens = tokenize_line(line);
            if tokens.is_empty() {
                continue;
            }

            if tokens.len() == 1 && tokens[0].ends_with(':') {
                let name = tokens[0][..tokens[0].len() - 1].to_owned();
                if procedures.contains_key(&name) {
                    return Err(AssembleError::DuplicateLabel { line: line_no, name });
                }
                procedures.insert(name, output.len());
                continue;
            }

            let mnemonic = &tokens[0];
            let operand_tokens = &tokens[1..];
            let candidates = specs_for_mnemonic(mnemonic).ok_or_else(|| AssembleError::NoEncoding {
                line: line_no,
                mnemonic: mnemonic.clone(),
            })?;

            let mut encoded = None;
            for spec in candidates {
                if spec.operands.len() != operand_tokens.len() {
                    continue;
                }
                match encode_operands(spec.operands, operand_tokens, line_no, output.len() + 1) {
                    Ok((bytes, refs)) => {
                        let mut buffer = vec![spec.opcode];
                        buffer.extend(bytes);
                        encoded = Some((buffer, refs));
                        break;
                    }
                    Err(_) => continue,
                }
            }

            let (buffer, refs) = encoded.ok_or_else(|| AssembleError::NoEncoding {
                line: line_no,
                mnemonic: mnemonic.clone(),
            })?;
            for label_ref in refs {
                // +1 for the opcode byte already prepended to `buffer`, which
                // `refs` offsets (computed against the operand-only bytes) don't
                // account for.
                label_refs.push(LabelRef { offset: output.len() + 1 + label_ref.0, name: label_ref.1 });
            }
            output.extend(buffer);
        }

        for label_ref in label_refs {
            let target = procedures.get(&label_ref.name).ok_or_else(|| AssembleError::UnresolvedLabel {
                name: label_ref.name.clone(),
            })?;
            let patch = (*target as u32).to_le_bytes();
            output[label_ref.offset..label_ref.offset + 4].copy_from_slice(&patch);
        }

        Ok(Program::new(output))
    }
}

/// Try to encode one candidate's operand tokens. Returns the encoded bytes
/// plus any forward label references recorded as offsets relative to the
/// start of the returned byte buffer (the opcode byte is not included in
/// that buffer, so callers must add 1 when computing absolute offsets).
fn encode_operands(
    kinds: &[OperandKind],
    tokens: &[String],
    line_no: usize,
    _instr_start: usize,
) -> Result<(Vec<u8>, Vec<(usize, String)>), AssembleError> {
    let mut bytes = Vec::new();
    let mut refs = Vec::new();

    for (kind, token) in kinds.iter().zip(tokens) {
        match kind {
            OperandKind::RegInt => bytes.push(parse_register(token, 'i', line_no)?),
            OperandKind::RegStr => bytes.push(parse_register(token, 's', line_no)?),
            OperandKind::LitInt => {
                if let Some(label) = token.strip_prefix('@') {
                    refs.push((bytes.len(), label.to_owned()));
                    bytes.extend([0u8; 4]);
                } else {
                    let value: i32 = token
                        .parse()
                        .map_err(|_| AssembleError::NoEncoding { line: line_no, mnemonic: token.clone() })?;
                    bytes.extend((value as u32).to_le_bytes());
                }
            }
            OperandKind::LitStr => {
                // A bare token shaped like a register reference (`s1`, `i2`)
                // is never meant as literal text: reject it here so a
                // competing RegStr/RegInt candidate for this mnemonic gets
                // tried instead of silently stringifying the register name.
                if looks_like_register(token) {
                    return Err(AssembleError::NoEncoding { line: line_no, mnemonic: token.clone() });
                }
                if token.as_bytes().contains(&0) {
                    return Err(AssembleError::StringNul { line: line_no });
                }
                bytes.extend(token.as_bytes());
                bytes.push(0);
            }
        }
    }

    Ok((bytes, refs))
}

/// True for a bare `s<digits>`/`i<digits>` token, the register-reference
/// shape — used to keep such tokens out of `LitStr` candidates so the
/// matching `RegStr`/`RegInt` overload gets a chance instead.
fn looks_like_register(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some('s') | Some('i') => {}
        _ => return false,
    }
    let rest = &token[1..];
    !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())
}

fn parse_register(token: &str, prefix: char, line_no: usize) -> Result<u8, AssembleError> {
    let digits = token.strip_prefix(prefix).ok_or_else(|| AssembleError::NoEncoding {
        line: line_no,
        mnemonic: token.to_owned(),
    })?;
    let idx: usize = digits
        .parse()
        .map_err(|_| AssembleError::NoEncoding { line: line_no, mnemonic: token.to_owned() })?;
    if idx >= MAX_REGISTERS {
        return Err(AssembleError::NoEncoding { line: line_no, mnemonic: token.to_owned() });
    }
    Ok(idx as u8)
}

/// Render a loaded program as assembly text, one instruction per line,
/// annotated with its byte offset. Jump-like `LitInt` operands print as
/// raw hex addresses since the original label names aren't recoverable
/// from bytecode alone.
pub fn disassemble(program: &Program) -> Result<String, crate::errors::RuntimeFault> {
    let mut out = String::new();
    let mut pc = 0;
    while pc < program.len() {
        let (mnemonic, operands, next) = program.decode_at(pc)?;
        let rendered: Vec<String> = operands
            .iter()
            .map(|operand| render_operand(operand, mnemonic))
            .collect();
        out.push_str(&format!("{}  {}  ; 0x{pc:04X}\n", mnemonic, rendered.join(", ")));
        pc = next;
    }
    Ok(out)
}

fn render_operand(operand: &crate::bytecode::Operand, mnemonic: &str) -> String {
    use crate::bytecode::Operand::*;
    match operand {
        RegInt(idx) => format!("i{idx}"),
        RegStr(idx) => format!("s{idx}"),
        LitInt(value) if ADDRESS_MNEMONICS.contains(&mnemonic) => format!("@0x{value:04X}"),
        LitInt(value) => value.to_string(),
        LitStr(text) => format!("{text:?}"),
    }
}
