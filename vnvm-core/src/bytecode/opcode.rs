//! Opcode table.
//!
//! Mirrors the shape of a CHIP-8-style opcode table: a fixed byte value maps
//! to a mnemonic plus a fixed sequence of operand kinds. Several mnemonics
//! (`set`, `cmp`, `attr`, `concat`, `wait`) have more than one opcode byte,
//! disambiguated by the operand-kind sequence at encode time.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::types::OperandKind;

/// One row of the opcode table.
#[derive(Debug, Clone, Copy)]
pub struct OpSpec {
    /// Opcode byte.
    pub opcode: u8,
    /// Assembly mnemonic.
    pub mnemonic: &'static str,
    /// Fixed operand-kind sequence.
    pub operands: &'static [OperandKind],
}

use OperandKind::{LitInt, LitStr, RegInt, RegStr};

/// The opcode table, indexed by opcode byte (§6 of the spec).
pub static OPCODE_TABLE: &[OpSpec] = &[
    OpSpec { opcode: 0x00, mnemonic: "reset", operands: &[] },
    OpSpec { opcode: 0x01, mnemonic: "loadspr", operands: &[RegStr, RegInt] },
    OpSpec { opcode: 0x02, mnemonic: "unloadspr", operands: &[RegInt] },
    OpSpec { opcode: 0x03, mnemonic: "fork", operands: &[LitInt] },
    OpSpec { opcode: 0x04, mnemonic: "ret", operands: &[] },
    OpSpec { opcode: 0x05, mnemonic: "call", operands: &[LitInt] },
    OpSpec { opcode: 0x06, mnemonic: "pushs", operands: &[RegStr] },
    OpSpec { opcode: 0x07, mnemonic: "pops", operands: &[RegStr] },
    OpSpec { opcode: 0x08, mnemonic: "pushi", operands: &[RegInt] },
    OpSpec { opcode: 0x09, mnemonic: "popi", operands: &[RegInt] },
    OpSpec { opcode: 0x0A, mnemonic: "wait", operands: &[RegInt] },
    OpSpec { opcode: 0x0B, mnemonic: "wait", operands: &[LitStr] },
    OpSpec { opcode: 0x0C, mnemonic: "fire", operands: &[LitStr] },
    OpSpec { opcode: 0x0D, mnemonic: "say", operands: &[RegInt, RegStr] },
    OpSpec { opcode: 0x0E, mnemonic: "set", operands: &[RegStr, LitStr] },
    OpSpec { opcode: 0x0F, mnemonic: "set", operands: &[RegInt, LitInt] },
    OpSpec { opcode: 0x10, mnemonic: "set", operands: &[RegStr, RegStr] },
    OpSpec { opcode: 0x11, mnemonic: "set", operands: &[RegInt, RegInt] },
    OpSpec { opcode: 0x12, mnemonic: "show", operands: &[RegInt, RegInt] },
    OpSpec { opcode: 0x13, mnemonic: "layer", operands: &[RegInt, RegInt] },
    OpSpec { opcode: 0x14, mnemonic: "attr", operands: &[LitStr, RegInt] },
    OpSpec { opcode: 0x15, mnemonic: "attr", operands: &[LitStr, RegStr] },
    OpSpec { opcode: 0x16, mnemonic: "openbank", operands: &[RegInt] },
    OpSpec { opcode: 0x17, mnemonic: "add", operands: &[RegInt, RegInt] },
    OpSpec { opcode: 0x18, mnemonic: "sub", operands: &[RegInt, RegInt] },
    OpSpec { opcode: 0x19, mnemonic: "concat", operands: &[RegStr, LitStr] },
    OpSpec { opcode: 0x1A, mnemonic: "concat", operands: &[RegStr, RegStr] },
    OpSpec { opcode: 0x1B, mnemonic: "cmp", operands: &[RegInt, LitInt] },
    OpSpec { opcode: 0x1C, mnemonic: "cmp", operands: &[RegInt, RegInt] },
    OpSpec { opcode: 0x1D, mnemonic: "jl", operands: &[LitInt] },
    OpSpec { opcode: 0x1E, mnemonic: "je", operands: &[LitInt] },
    OpSpec { opcode: 0x1F, mnemonic: "jg", operands: &[LitInt] },
    OpSpec { opcode: 0x20, mnemonic: "jmp", operands: &[LitInt] },
];

/// Opcode byte → table row, for dispatcher decode.
static BY_OPCODE: Lazy<HashMap<u8, OpSpec>> =
    Lazy::new(|| OPCODE_TABLE.iter().map(|spec| (spec.opcode, *spec)).collect());

/// Mnemonic → candidate rows, in table declaration order. The assembler
/// tries each candidate in this order and commits to the first whose
/// operand-kind sequence matches the source tokens.
static BY_MNEMONIC: Lazy<HashMap<&'static str, Vec<OpSpec>>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, Vec<OpSpec>> = HashMap::new();
    for spec in OPCODE_TABLE {
        map.entry(spec.mnemonic).or_default().push(*spec);
    }
    map
});

/// Look up a table row by opcode byte.
pub fn spec_for_opcode(opcode: u8) -> Option<OpSpec> {
    BY_OPCODE.get(&opcode).copied()
}

/// Look up the candidate encodings for a mnemonic, in declaration order.
pub fn specs_for_mnemonic(mnemonic: &str) -> Option<&'static [OpSpec]> {
    BY_MNEMONIC.get(mnemonic).map(Vec::as_slice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_table_round_trips_by_byte() {
        for spec in OPCODE_TABLE {
            assert_eq!(spec_for_opcode(spec.opcode).unwrap().mnemonic, spec.mnemonic);
        }
    }

    #[test]
    fn set_has_four_overloads_in_declaration_order() {
        let sets = specs_for_mnemonic("set").unwrap();
        assert_eq!(sets.len(), 4);
        assert_eq!(sets[0].operands, &[RegStr, LitStr]);
        assert_eq!(sets[1].operands, &[RegInt, LitInt]);
        assert_eq!(sets[2].operands, &[RegStr, RegStr]);
        assert_eq!(sets[3].operands, &[RegInt, RegInt]);
    }

    #[test]
    fn unknown_opcode_byte_is_none() {
        assert!(spec_for_opcode(0xFF).is_none());
    }
}
