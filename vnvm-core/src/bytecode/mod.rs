//! Bytecode model: opcode table, operand types, and the loaded program.

pub mod opcode;
pub mod program;
pub mod types;

pub use opcode::{spec_for_opcode, specs_for_mnemonic, OpSpec, OPCODE_TABLE};
pub use program::Program;
pub use types::{Operand, OperandKind, RegIdx, VmInt, MAX_BANKS, MAX_REGISTERS};
