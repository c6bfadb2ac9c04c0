//! Bytecode primitive types.

/// Number of integer/string registers per thread.
pub const MAX_REGISTERS: usize = 8;

/// Number of sprite-bank slots.
pub const MAX_BANKS: usize = 32;

/// Register index, as decoded from a `REGINT`/`REGSTR` operand byte.
pub type RegIdx = u8;

/// A 32-bit signed VM integer (register/stack/comparator value).
pub type VmInt = i32;

/// One decoded operand, tagged by the kind the opcode table expects at
/// this position.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `REGINT` - integer-register index.
    RegInt(RegIdx),
    /// `REGSTR` - string-register index.
    RegStr(RegIdx),
    /// `LITINT` - 4-byte little-endian literal, read as unsigned then
    /// reinterpreted as signed where arithmetic/compare semantics demand it.
    LitInt(VmInt),
    /// `LITSTR` - NUL-terminated UTF-8 literal.
    LitStr(String),
}

/// The four operand kinds an opcode's arity is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// One byte, range-checked against [`MAX_REGISTERS`].
    RegInt,
    /// One byte, range-checked against [`MAX_REGISTERS`].
    RegStr,
    /// Four bytes, little-endian.
    LitInt,
    /// NUL-terminated UTF-8 bytes.
    LitStr,
}
