//! A CHIP-8 virtual machine.
//!
//! [`Machine`] owns the whole machine state and advances it one instruction
//! per [`Machine::step`]. The host feeds it ROM bytes and key states and reads
//! back the frame buffer, the redraw flag and the sound signal.

pub mod display;
pub mod error;
pub mod instruction;
pub mod machine;
pub mod state;

pub use display::Framebuffer;
pub use error::{Chip8Error, Result};
pub use instruction::{Instruction, decode};
pub use machine::{Machine, Snapshot, StepOutcome};
pub use state::{Key, Register};
