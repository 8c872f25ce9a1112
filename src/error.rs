use thiserror::Error;

use crate::state::Address;

pub type Result<T> = std::result::Result<T, Chip8Error>;

/// Conditions that stop the machine from executing the current instruction.
///
/// Every check runs before the instruction mutates any state, so a machine
/// that returned one of these is still in the state it had before the step.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Chip8Error {
    #[error("ROM too large to fit in memory: {size} bytes, max is {max} bytes")]
    RomTooLarge { size: usize, max: usize },

    #[error("Unknown instruction {opcode:#06X} at {address:#05X}")]
    UnknownInstruction { opcode: u16, address: Address },

    #[error("Stack overflow: call at {address:#05X} with a full call stack")]
    StackOverflow { address: Address },

    #[error("Stack underflow: return at {address:#05X} with no return address available")]
    StackUnderflow { address: Address },

    #[error("Program counter out of bounds: {pc:#06X}")]
    ProgramCounterOutOfBounds { pc: Address },

    #[error("Memory access out of bounds: {address:#06X}")]
    MemoryOutOfBounds { address: usize },
}
