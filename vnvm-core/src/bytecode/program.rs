//! Loaded program bytes and the operand decoder shared by the dispatcher
//! and the disassembler.

use std::fs;
use std::path::Path;

use super::opcode::spec_for_opcode;
use super::types::{MAX_REGISTERS, Operand, OperandKind, RegIdx, VmInt};
use crate::errors::{CResult, RuntimeFault};

/// A loaded, read-only bytecode program. Offset 0 is the entry point.
#[derive(Debug, Clone, Default)]
pub struct Program {
    bytes: Vec<u8>,
}

impl Program {
    /// Wrap already-assembled bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Load a program from disk.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> CResult<Self> {
        let bytes = fs::read(path)?;
        Ok(Self::new(bytes))
    }

    /// Write the program bytes verbatim to disk.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> CResult {
        fs::write(path, &self.bytes)?;
        Ok(())
    }

    /// Raw program bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Program length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the program holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode one instruction at `pc`.
    ///
    /// Returns the opcode's mnemonic, its decoded operands, and the offset
    /// of the byte immediately after the last operand consumed — the
    /// dispatcher's `cursor` in §4.5, before the trailing `PC += 1`.
    pub fn decode_at(&self, pc: usize) -> Result<(&'static str, Vec<Operand>, usize), RuntimeFault> {
        if pc >= self.bytes.len() {
            return Err(RuntimeFault::DecodeFault {
                pc,
                detail: "program counter out of range".to_owned(),
            });
        }

        let opcode = self.bytes[pc];
        let spec = spec_for_opcode(opcode).ok_or_else(|| RuntimeFault::DecodeFault {
            pc,
            detail: format!("unknown opcode 0x{opcode:02X}"),
        })?;

        let mut cursor = pc + 1;
        let mut args = Vec::with_capacity(spec.operands.len());
        for kind in spec.operands {
            let (operand, next) = self.decode_operand(*kind, cursor, pc)?;
            args.push(operand);
            cursor = next;
        }

        Ok((spec.mnemonic, args, cursor))
    }

    fn decode_operand(
        &self,
        kind: OperandKind,
        at: usize,
        instr_pc: usize,
    ) -> Result<(Operand, usize), RuntimeFault> {
        match kind {
            OperandKind::RegInt | OperandKind::RegStr => {
                let byte = *self.bytes.get(at).ok_or_else(|| RuntimeFault::DecodeFault {
                    pc: instr_pc,
                    detail: "truncated register operand".to_owned(),
                })?;
                let idx: RegIdx = byte;
                if idx as usize >= MAX_REGISTERS {
                    return Err(RuntimeFault::DecodeFault {
                        pc: instr_pc,
                        detail: format!("register index {idx} out of range"),
                    });
                }
                let operand = if kind == OperandKind::RegInt {
                    Operand::RegInt(idx)
                } else {
                    Operand::RegStr(idx)
                };
                Ok((operand, at + 1))
            }
            OperandKind::LitInt => {
                let bytes = self.bytes.get(at..at + 4).ok_or_else(|| RuntimeFault::DecodeFault {
                    pc: instr_pc,
                    detail: "truncated literal-int operand".to_owned(),
                })?;
                let raw = u32::from_le_bytes(bytes.try_into().unwrap());
                Ok((Operand::LitInt(raw as VmInt), at + 4))
            }
            OperandKind::LitStr => {
                let terminator = self.bytes[at..]
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or_else(|| RuntimeFault::DecodeFault {
                        pc: instr_pc,
                        detail: "unterminated string literal".to_owned(),
                    })?;
                let raw = &self.bytes[at..at + terminator];
                let text = std::str::from_utf8(raw)
                    .map_err(|_| RuntimeFault::DecodeFault {
                        pc: instr_pc,
                        detail: "string literal is not valid UTF-8".to_owned(),
                    })?
                    .to_owned();
                Ok((Operand::LitStr(text), at + terminator + 1))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_reset_with_no_operands() {
        let program = Program::new(vec![0x00]);
        let (mnemonic, args, next) = program.decode_at(0).unwrap();
        assert_eq!(mnemonic, "reset");
        assert!(args.is_empty());
        assert_eq!(next, 1);
    }

    #[test]
    fn decodes_litint_little_endian() {
        let program = Program::new(vec![0x05, 0x34, 0x12, 0x00, 0x00]);
        let (mnemonic, args, next) = program.decode_at(0).unwrap();
        assert_eq!(mnemonic, "call");
        assert_eq!(args, vec![Operand::LitInt(0x1234)]);
        assert_eq!(next, 5);
    }

    #[test]
    fn decodes_litstr_until_nul() {
        let mut bytes = vec![0x0C];
        bytes.extend_from_slice(b"go\0");
        let program = Program::new(bytes);
        let (mnemonic, args, next) = program.decode_at(0).unwrap();
        assert_eq!(mnemonic, "fire");
        assert_eq!(args, vec![Operand::LitStr("go".to_owned())]);
        assert_eq!(next, 4);
    }

    #[test]
    fn out_of_range_register_is_a_decode_fault() {
        let program = Program::new(vec![0x08, 99]);
        assert!(matches!(
            program.decode_at(0),
            Err(RuntimeFault::DecodeFault { .. })
        ));
    }

    #[test]
    fn pc_past_end_is_a_decode_fault() {
        let program = Program::new(vec![0x00]);
        assert!(matches!(
            program.decode_at(5),
            Err(RuntimeFault::DecodeFault { .. })
        ));
    }

    #[test]
    fn unknown_opcode_is_a_decode_fault() {
        let program = Program::new(vec![0xFE]);
        assert!(matches!(
            program.decode_at(0),
            Err(RuntimeFault::DecodeFault { .. })
        ));
    }
}
