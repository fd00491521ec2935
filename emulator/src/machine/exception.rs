use thiserror::Error;

use super::keypad::InvalidKey;
use super::memory::MemoryError;

/// Faults raised while fetching or executing an instruction.
///
/// Each one reflects a malformed program rather than a transient fault; the
/// host may halt the machine and report, and no state past the faulting
/// access has been touched.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    /// The program counter points outside the fetchable range
    #[error("program counter out of bounds ({0:#06x})")]
    OutOfBounds(u16),

    /// A subroutine call was made with all stack frames in use
    #[error("call stack overflow")]
    StackOverflow,

    /// A return was executed with no frame to pop
    #[error("call stack underflow")]
    StackUnderflow,

    /// An opcode matched no known pattern, surfaced in strict mode only
    #[error("unknown opcode {0:#06x}")]
    UnknownOpcode(u16),

    #[error("invalid memory access ({0})")]
    InvalidMemoryAccess(#[from] MemoryError),

    #[error("invalid key ({0})")]
    Key(#[from] InvalidKey),
}
