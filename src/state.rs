use crate::display::FONT_SET;
use crate::error::{Chip8Error, Result};

pub type Timer = u8;
pub type Address = u16;

pub const MEM_SIZE: usize = 4096;
pub const FONT_ADDR: usize = 0x000;
pub const FONT_HEIGHT: usize = 5;
pub const PC_START_ADDR: Address = 0x200;
pub const MAX_ROM_SIZE: usize = MEM_SIZE - PC_START_ADDR as usize;
pub const NUM_REGISTERS: usize = 16;
pub const NUM_KEYS: usize = 16;
pub const STACK_SIZE: usize = 16;

pub struct Memory {
    data: [u8; MEM_SIZE],
}
impl Memory {
    /// Zeroed memory with the font table at [`FONT_ADDR`].
    pub fn new() -> Self {
        let data = {
            let mut data = [0; MEM_SIZE];
            data[FONT_ADDR..FONT_ADDR + FONT_SET.len()].copy_from_slice(&FONT_SET);
            data
        };

        Memory { data }
    }

    pub fn read(&self, addr: usize) -> Result<u8> {
        self.data
            .get(addr)
            .copied()
            .ok_or(Chip8Error::MemoryOutOfBounds { address: addr })
    }

    pub fn write(&mut self, addr: usize, value: u8) -> Result<()> {
        let cell = self
            .data
            .get_mut(addr)
            .ok_or(Chip8Error::MemoryOutOfBounds { address: addr })?;
        *cell = value;
        Ok(())
    }

    /// Reads `len` bytes starting at `addr`. Fails without partial reads if the
    /// range runs past the end of memory.
    pub fn read_slice(&self, addr: usize, len: usize) -> Result<&[u8]> {
        if len == 0 {
            return Ok(&[]);
        }
        let end = addr + len;
        if end > MEM_SIZE {
            return Err(Chip8Error::MemoryOutOfBounds { address: end - 1 });
        }
        Ok(&self.data[addr..end])
    }

    /// Copies `bytes` to `addr..`. Nothing is written if the range does not fit.
    pub fn write_slice(&mut self, addr: usize, bytes: &[u8]) -> Result<()> {
        let end = addr + bytes.len();
        if end > MEM_SIZE {
            return Err(Chip8Error::MemoryOutOfBounds { address: end - 1 });
        }
        self.data[addr..end].copy_from_slice(bytes);
        Ok(())
    }

    pub fn read_word(&self, addr: Address) -> Result<u16> {
        let addr = usize::from(addr);
        if addr + 1 >= MEM_SIZE {
            return Err(Chip8Error::ProgramCounterOutOfBounds { pc: addr as Address });
        }
        Ok(u16::from_be_bytes([self.data[addr], self.data[addr + 1]]))
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> Result<()> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(Chip8Error::RomTooLarge {
                size: rom.len(),
                max: MAX_ROM_SIZE,
            });
        }
        let start = usize::from(PC_START_ADDR);
        self.data[start..start + rom.len()].copy_from_slice(rom);
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8; MEM_SIZE] {
        &self.data
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Register {
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    VA,
    VB,
    VC,
    VD,
    VE,
    VF,
}
impl Register {
    pub const ALL: [Register; NUM_REGISTERS] = [
        Register::V0,
        Register::V1,
        Register::V2,
        Register::V3,
        Register::V4,
        Register::V5,
        Register::V6,
        Register::V7,
        Register::V8,
        Register::V9,
        Register::VA,
        Register::VB,
        Register::VC,
        Register::VD,
        Register::VE,
        Register::VF,
    ];

    /// Register named by the low nibble of `value`.
    pub fn from_nibble(value: u8) -> Self {
        Self::ALL[usize::from(value & 0x0F)]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterBank {
    registers: [u8; NUM_REGISTERS],
}
impl RegisterBank {
    pub fn new() -> Self {
        RegisterBank {
            registers: [0; NUM_REGISTERS],
        }
    }

    pub fn read(&self, reg: Register) -> u8 {
        self.registers[reg.index()]
    }

    pub fn write(&mut self, reg: Register, value: u8) {
        self.registers[reg.index()] = value;
    }

    pub fn as_array(&self) -> &[u8; NUM_REGISTERS] {
        &self.registers
    }
}

/// Fixed-capacity return address stack.
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    entries: [Address; STACK_SIZE],
    pointer: usize,
}
impl CallStack {
    pub fn new() -> Self {
        CallStack {
            entries: [0; STACK_SIZE],
            pointer: 0,
        }
    }

    /// Returns `false` and leaves the stack untouched when it is full.
    pub fn push(&mut self, address: Address) -> bool {
        if self.pointer == STACK_SIZE {
            return false;
        }
        self.entries[self.pointer] = address;
        self.pointer += 1;
        true
    }

    pub fn pop(&mut self) -> Option<Address> {
        if self.pointer == 0 {
            return None;
        }
        self.pointer -= 1;
        Some(self.entries[self.pointer])
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn entries(&self) -> &[Address] {
        &self.entries[..self.pointer]
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Key {
    Key0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF,
}
impl Key {
    pub const ALL: [Key; NUM_KEYS] = [
        Key::Key0,
        Key::Key1,
        Key::Key2,
        Key::Key3,
        Key::Key4,
        Key::Key5,
        Key::Key6,
        Key::Key7,
        Key::Key8,
        Key::Key9,
        Key::KeyA,
        Key::KeyB,
        Key::KeyC,
        Key::KeyD,
        Key::KeyE,
        Key::KeyF,
    ];

    pub fn from_index(index: u8) -> Option<Key> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Default)]
pub struct Keypad {
    pressed: [bool; NUM_KEYS],
}
impl Keypad {
    pub fn new() -> Self {
        Keypad {
            pressed: [false; NUM_KEYS],
        }
    }

    pub fn set_key(&mut self, key: Key, pressed: bool) {
        self.pressed[usize::from(key.index())] = pressed;
    }

    pub fn release_all(&mut self) {
        self.pressed = [false; NUM_KEYS];
    }

    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.pressed[usize::from(key.index())]
    }

    /// Values outside 0x0..=0xF name no key and are never pressed.
    pub fn is_index_pressed(&self, index: u8) -> bool {
        Key::from_index(index).is_some_and(|key| self.is_key_pressed(key))
    }

    /// Lowest-numbered key currently held down.
    pub fn first_pressed(&self) -> Option<Key> {
        Key::ALL.into_iter().find(|&key| self.is_key_pressed(key))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timers {
    pub delay: Timer,
    pub sound: Timer,
}
impl Timers {
    pub fn tick(&mut self) {
        self.delay = self.delay.saturating_sub(1);
        self.sound = self.sound.saturating_sub(1);
    }

    pub fn sound_active(&self) -> bool {
        self.sound > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_has_font_and_zeroed_program_area() {
        let m = Memory::new();
        assert_eq!(&m.as_bytes()[..FONT_SET.len()], &FONT_SET);
        assert!(m.as_bytes()[FONT_SET.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_load_rom_at_program_start() {
        let mut m = Memory::new();
        m.load_rom(&[0x00, 0xE0]).unwrap();
        assert_eq!(m.read_slice(0x200, 2).unwrap(), &[0x00, 0xE0]);
    }

    #[test]
    fn test_load_rom_too_large_copies_nothing() {
        let mut m = Memory::new();
        let rom = vec![0xAB; MAX_ROM_SIZE + 1];
        assert_eq!(
            m.load_rom(&rom),
            Err(Chip8Error::RomTooLarge {
                size: MAX_ROM_SIZE + 1,
                max: MAX_ROM_SIZE
            })
        );
        assert_eq!(m.read(0x200).unwrap(), 0);
    }

    #[test]
    fn test_out_of_bounds_access() {
        let mut m = Memory::new();
        assert!(m.read(MEM_SIZE).is_err());
        assert!(m.write(MEM_SIZE, 1).is_err());
        assert!(m.read_slice(MEM_SIZE - 1, 2).is_err());
        assert!(m.write_slice(MEM_SIZE - 2, &[1, 2, 3]).is_err());
        assert_eq!(m.read(MEM_SIZE - 2).unwrap(), 0);
        assert_eq!(
            m.read_word(0xFFF),
            Err(Chip8Error::ProgramCounterOutOfBounds { pc: 0xFFF })
        );
    }

    #[test]
    fn test_empty_read_past_memory_end() {
        let m = Memory::new();
        assert_eq!(m.read_slice(0x10FD, 0).unwrap(), &[] as &[u8]);
        assert!(m.read_slice(0x10FD, 1).is_err());
    }

    #[test]
    fn test_read_word_is_big_endian() {
        let mut m = Memory::new();
        m.write_slice(0x300, &[0x12, 0x34]).unwrap();
        assert_eq!(m.read_word(0x300).unwrap(), 0x1234);
    }

    #[test]
    fn test_call_stack_capacity() {
        let mut stack = CallStack::new();
        for i in 0..STACK_SIZE as Address {
            assert!(stack.push(0x200 + i * 2));
        }
        assert!(!stack.push(0x300));
        assert_eq!(stack.pointer(), STACK_SIZE);
        assert_eq!(stack.pop(), Some(0x200 + (STACK_SIZE as Address - 1) * 2));
        while stack.pop().is_some() {}
        assert_eq!(stack.pointer(), 0);
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn test_keypad_first_pressed_is_lowest() {
        let mut keypad = Keypad::new();
        assert_eq!(keypad.first_pressed(), None);
        keypad.set_key(Key::KeyB, true);
        keypad.set_key(Key::Key3, true);
        assert_eq!(keypad.first_pressed(), Some(Key::Key3));
        assert!(keypad.is_index_pressed(0xB));
        assert!(!keypad.is_index_pressed(0x10));
        keypad.release_all();
        assert_eq!(keypad.first_pressed(), None);
    }

    #[test]
    fn test_timers_stop_at_zero() {
        let mut timers = Timers { delay: 2, sound: 1 };
        timers.tick();
        assert_eq!(timers, Timers { delay: 1, sound: 0 });
        assert!(!timers.sound_active());
        timers.tick();
        timers.tick();
        assert_eq!(timers, Timers { delay: 0, sound: 0 });
    }
}
