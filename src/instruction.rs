use std::fmt;

use crate::state::{Address, Register};

/// Fixed bit-fields of a raw instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Operands {
    /// First nibble. Represents the operation code.
    pub opcode: u8,
    /// Second nibble. Used to look up one of the 16 registers.
    pub x: u8,
    /// Third nibble. Used to look up one of the 16 registers.
    pub y: u8,
    /// Fourth nibble. A 4-bit number.
    pub n: u8,
    /// The second byte (third and fourth nibbles). An 8-bit immediate number.
    pub kk: u8,
    /// The second, third, and fourth nibbles. A 12-bit immediate address.
    pub nnn: Address,
}
impl Operands {
    pub fn new(raw: u16) -> Self {
        Operands {
            opcode: (raw >> 12) as u8,
            x: ((raw >> 8) & 0x0F) as u8,
            y: ((raw >> 4) & 0x0F) as u8,
            n: (raw & 0x0F) as u8,
            kk: (raw & 0x00FF) as u8,
            nnn: raw & 0x0FFF,
        }
    }

    fn vx(&self) -> Register {
        Register::from_nibble(self.x)
    }

    fn vy(&self) -> Register {
        Register::from_nibble(self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `0000`: end-of-program sentinel.
    Halt,
    /// `00E0`
    ClearScreen,
    /// `00EE`
    Return,
    /// `1nnn`
    Jump(Address),
    /// `2nnn`
    Call(Address),
    /// `3xkk`
    SkipEqImmediate(Register, u8),
    /// `4xkk`
    SkipNeqImmediate(Register, u8),
    /// `5xy0`
    SkipEqRegister(Register, Register),
    /// `6xkk`
    SetImmediate(Register, u8),
    /// `7xkk`
    AddImmediate(Register, u8),
    /// `8xy0`
    Move(Register, Register),
    /// `8xy1`
    Or(Register, Register),
    /// `8xy2`
    And(Register, Register),
    /// `8xy3`
    Xor(Register, Register),
    /// `8xy4`
    AddRegister(Register, Register),
    /// `8xy5`
    Sub(Register, Register),
    /// `8xy6`
    ShiftRight(Register),
    /// `8xy7`
    SubReversed(Register, Register),
    /// `8xyE`
    ShiftLeft(Register),
    /// `9xy0`
    SkipNeqRegister(Register, Register),
    /// `Annn`
    SetIndex(Address),
    /// `Bnnn`
    JumpWithOffset(Address),
    /// `Cxkk`
    Random(Register, u8),
    /// `Dxyn`
    Draw(Register, Register, u8),
    /// `Ex9E`
    SkipIfKeyPressed(Register),
    /// `ExA1`
    SkipIfKeyNotPressed(Register),
    /// `Fx07`
    ReadDelayTimer(Register),
    /// `Fx0A`
    WaitForKey(Register),
    /// `Fx15`
    SetDelayTimer(Register),
    /// `Fx18`
    SetSoundTimer(Register),
    /// `Fx1E`
    AddToIndex(Register),
    /// `Fx29`
    FontChar(Register),
    /// `Fx33`
    BinaryCodedDecimal(Register),
    /// `Fx55`
    StoreRegisters(Register),
    /// `Fx65`
    LoadRegisters(Register),
}

/// Decodes a raw instruction word, or `None` if it names no operation.
pub fn decode(raw: u16) -> Option<Instruction> {
    use Instruction::*;

    let d = Operands::new(raw);
    let instruction = match d.opcode {
        0x0 => match raw {
            0x0000 => Halt,
            0x00E0 => ClearScreen,
            0x00EE => Return,
            _ => return None,
        },
        0x1 => Jump(d.nnn),
        0x2 => Call(d.nnn),
        0x3 => SkipEqImmediate(d.vx(), d.kk),
        0x4 => SkipNeqImmediate(d.vx(), d.kk),
        0x5 if d.n == 0 => SkipEqRegister(d.vx(), d.vy()),
        0x6 => SetImmediate(d.vx(), d.kk),
        0x7 => AddImmediate(d.vx(), d.kk),
        0x8 => match d.n {
            0x0 => Move(d.vx(), d.vy()),
            0x1 => Or(d.vx(), d.vy()),
            0x2 => And(d.vx(), d.vy()),
            0x3 => Xor(d.vx(), d.vy()),
            0x4 => AddRegister(d.vx(), d.vy()),
            0x5 => Sub(d.vx(), d.vy()),
            0x6 => ShiftRight(d.vx()),
            0x7 => SubReversed(d.vx(), d.vy()),
            0xE => ShiftLeft(d.vx()),
            _ => return None,
        },
        0x9 if d.n == 0 => SkipNeqRegister(d.vx(), d.vy()),
        0xA => SetIndex(d.nnn),
        0xB => JumpWithOffset(d.nnn),
        0xC => Random(d.vx(), d.kk),
        0xD => Draw(d.vx(), d.vy(), d.n),
        0xE => match d.kk {
            0x9E => SkipIfKeyPressed(d.vx()),
            0xA1 => SkipIfKeyNotPressed(d.vx()),
            _ => return None,
        },
        0xF => match d.kk {
            0x07 => ReadDelayTimer(d.vx()),
            0x0A => WaitForKey(d.vx()),
            0x15 => SetDelayTimer(d.vx()),
            0x18 => SetSoundTimer(d.vx()),
            0x1E => AddToIndex(d.vx()),
            0x29 => FontChar(d.vx()),
            0x33 => BinaryCodedDecimal(d.vx()),
            0x55 => StoreRegisters(d.vx()),
            0x65 => LoadRegisters(d.vx()),
            _ => return None,
        },
        _ => return None,
    };
    Some(instruction)
}

struct V(Register);
impl fmt::Display for V {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{:X}", self.0.index())
    }
}

/// Conventional CHIP-8 assembler mnemonics.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match *self {
            Halt => write!(f, "HALT"),
            ClearScreen => write!(f, "CLS"),
            Return => write!(f, "RET"),
            Jump(addr) => write!(f, "JP {addr:#05X}"),
            Call(addr) => write!(f, "CALL {addr:#05X}"),
            SkipEqImmediate(x, kk) => write!(f, "SE {}, {kk:#04X}", V(x)),
            SkipNeqImmediate(x, kk) => write!(f, "SNE {}, {kk:#04X}", V(x)),
            SkipEqRegister(x, y) => write!(f, "SE {}, {}", V(x), V(y)),
            SetImmediate(x, kk) => write!(f, "LD {}, {kk:#04X}", V(x)),
            AddImmediate(x, kk) => write!(f, "ADD {}, {kk:#04X}", V(x)),
            Move(x, y) => write!(f, "LD {}, {}", V(x), V(y)),
            Or(x, y) => write!(f, "OR {}, {}", V(x), V(y)),
            And(x, y) => write!(f, "AND {}, {}", V(x), V(y)),
            Xor(x, y) => write!(f, "XOR {}, {}", V(x), V(y)),
            AddRegister(x, y) => write!(f, "ADD {}, {}", V(x), V(y)),
            Sub(x, y) => write!(f, "SUB {}, {}", V(x), V(y)),
            ShiftRight(x) => write!(f, "SHR {}", V(x)),
            SubReversed(x, y) => write!(f, "SUBN {}, {}", V(x), V(y)),
            ShiftLeft(x) => write!(f, "SHL {}", V(x)),
            SkipNeqRegister(x, y) => write!(f, "SNE {}, {}", V(x), V(y)),
            SetIndex(addr) => write!(f, "LD I, {addr:#05X}"),
            JumpWithOffset(addr) => write!(f, "JP V0, {addr:#05X}"),
            Random(x, kk) => write!(f, "RND {}, {kk:#04X}", V(x)),
            Draw(x, y, n) => write!(f, "DRW {}, {}, {n}", V(x), V(y)),
            SkipIfKeyPressed(x) => write!(f, "SKP {}", V(x)),
            SkipIfKeyNotPressed(x) => write!(f, "SKNP {}", V(x)),
            ReadDelayTimer(x) => write!(f, "LD {}, DT", V(x)),
            WaitForKey(x) => write!(f, "LD {}, K", V(x)),
            SetDelayTimer(x) => write!(f, "LD DT, {}", V(x)),
            SetSoundTimer(x) => write!(f, "LD ST, {}", V(x)),
            AddToIndex(x) => write!(f, "ADD I, {}", V(x)),
            FontChar(x) => write!(f, "LD F, {}", V(x)),
            BinaryCodedDecimal(x) => write!(f, "LD B, {}", V(x)),
            StoreRegisters(x) => write!(f, "LD [I], {}", V(x)),
            LoadRegisters(x) => write!(f, "LD {}, [I]", V(x)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Instruction::*;
    use Register::*;

    #[test]
    fn test_operand_fields() {
        let d = Operands::new(0xD12F);
        assert_eq!(
            d,
            Operands {
                opcode: 0xD,
                x: 0x1,
                y: 0x2,
                n: 0xF,
                kk: 0x2F,
                nnn: 0x12F,
            }
        );
    }

    #[test]
    fn test_decode_table() {
        let cases = [
            (0x0000, Halt),
            (0x00E0, ClearScreen),
            (0x00EE, Return),
            (0x1ABC, Jump(0xABC)),
            (0x2ABC, Call(0xABC)),
            (0x3A12, SkipEqImmediate(VA, 0x12)),
            (0x4B34, SkipNeqImmediate(VB, 0x34)),
            (0x5120, SkipEqRegister(V1, V2)),
            (0x6F05, SetImmediate(VF, 0x05)),
            (0x7001, AddImmediate(V0, 0x01)),
            (0x8120, Move(V1, V2)),
            (0x8121, Or(V1, V2)),
            (0x8122, And(V1, V2)),
            (0x8123, Xor(V1, V2)),
            (0x8124, AddRegister(V1, V2)),
            (0x8125, Sub(V1, V2)),
            (0x8126, ShiftRight(V1)),
            (0x8127, SubReversed(V1, V2)),
            (0x812E, ShiftLeft(V1)),
            (0x9340, SkipNeqRegister(V3, V4)),
            (0xA123, SetIndex(0x123)),
            (0xB123, JumpWithOffset(0x123)),
            (0xC50F, Random(V5, 0x0F)),
            (0xD125, Draw(V1, V2, 5)),
            (0xE69E, SkipIfKeyPressed(V6)),
            (0xE6A1, SkipIfKeyNotPressed(V6)),
            (0xF707, ReadDelayTimer(V7)),
            (0xF70A, WaitForKey(V7)),
            (0xF715, SetDelayTimer(V7)),
            (0xF718, SetSoundTimer(V7)),
            (0xF71E, AddToIndex(V7)),
            (0xF729, FontChar(V7)),
            (0xF733, BinaryCodedDecimal(V7)),
            (0xF755, StoreRegisters(V7)),
            (0xF765, LoadRegisters(V7)),
        ];
        for (raw, expected) in cases {
            assert_eq!(decode(raw), Some(expected), "{raw:#06X}");
        }
    }

    #[test]
    fn test_decode_rejects_undefined_words() {
        for raw in [0x0123, 0x00E1, 0x5121, 0x8128, 0x812F, 0x9341, 0xE600, 0xF700, 0xF7FF] {
            assert_eq!(decode(raw), None, "{raw:#06X}");
        }
    }

    #[test]
    fn test_disassembly() {
        assert_eq!(decode(0xD125).unwrap().to_string(), "DRW V1, V2, 5");
        assert_eq!(decode(0x2ABC).unwrap().to_string(), "CALL 0xABC");
        assert_eq!(decode(0x6F05).unwrap().to_string(), "LD VF, 0x05");
        assert_eq!(decode(0xF755).unwrap().to_string(), "LD [I], V7");
    }
}
