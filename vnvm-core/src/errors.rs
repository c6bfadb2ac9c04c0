//! Error types.

use thiserror::Error;

/// Common result, for call sites that mix collaborator I/O with typed errors.
pub type CResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Runtime fault.
///
/// Faults terminate the thread that raised them; sibling threads continue
/// running (see the concurrency model's cancellation rules).
#[derive(Debug, Error)]
pub enum RuntimeFault {
    /// Opcode decoding failed: unknown opcode, PC out of range, bad register
    /// index, or a `LITSTR` that ran off the end of the program or was not
    /// valid UTF-8.
    #[error("decode fault at pc={pc:04X}: {detail}")]
    DecodeFault {
        /// Program counter at the time of the fault.
        pc: usize,
        /// Human-readable detail.
        detail: String,
    },

    /// A stack pop was attempted on an empty integer or string stack.
    #[error("stack underflow at pc={pc:04X}")]
    StackUnderflow {
        /// Program counter at the time of the fault.
        pc: usize,
    },

    /// A sprite-bank operation used a bad index or an empty slot.
    #[error("sprite bank fault: {detail}")]
    BankFault {
        /// Human-readable detail.
        detail: String,
    },

    /// A `show` instruction would have driven alpha outside `[0, 255]`.
    #[error("alpha value {value} out of range [0, 255]")]
    AlphaRange {
        /// The rejected value.
        value: i64,
    },

    /// `Runtime::start` was called while threads already existed.
    #[error("runtime is already running")]
    AlreadyRunning,
}

/// Assembler error, always line-qualified per the `line N: message` convention.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// Two procedure labels declared the same name.
    #[error("line {line}: duplicate procedure label '{name}'")]
    DuplicateLabel {
        /// 1-based source line.
        line: usize,
        /// The duplicated label name.
        name: String,
    },

    /// A `@label` reference never matched a declared label.
    #[error("procedure '{name}' not found")]
    UnresolvedLabel {
        /// The missing label name.
        name: String,
    },

    /// No operand-kind candidate for a mnemonic matched the given tokens.
    #[error("line {line}: no encoding of '{mnemonic}' matches these operands")]
    NoEncoding {
        /// 1-based source line.
        line: usize,
        /// The mnemonic that failed to encode.
        mnemonic: String,
    },

    /// A `LITSTR` token contained an embedded NUL byte.
    #[error("line {line}: string literal contains an embedded NUL byte")]
    StringNul {
        /// 1-based source line.
        line: usize,
    },

    /// Underlying I/O failure while reading source or writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
