use std::fmt;

use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::display::{DISPLAY_HEIGHT, DISPLAY_WIDTH, Framebuffer};
use crate::error::{Chip8Error, Result};
use crate::instruction::{Instruction, Operands, decode};
use crate::state::{
    Address, CallStack, FONT_ADDR, FONT_HEIGHT, Key, Keypad, Memory, NUM_REGISTERS, PC_START_ADDR,
    Register, RegisterBank, Timers,
};

/// What a successful [`Machine::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Executed(Instruction),
    /// `Fx0A` found no key held; the same instruction runs again next step.
    WaitingForKey,
    /// An all-zero word was fetched. The machine stays halted until reset.
    Halted,
}

/// How the program counter moves once an instruction has executed.
enum Flow {
    Next,
    SkipIf(bool),
    Goto(Address),
    Wait,
    Halt,
}

/// Read-only view of the CPU for tracing and debugger panels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub pc: Address,
    pub sp: usize,
    pub index: Address,
    pub registers: [u8; NUM_REGISTERS],
    pub delay_timer: u8,
    pub sound_timer: u8,
    /// Raw word at `pc`, `None` when `pc` points past the end of memory.
    pub opcode: Option<u16>,
    pub operands: Operands,
    pub instruction: Option<Instruction>,
    pub halted: bool,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pc={:#05X} sp={} i={:#05X} dt={} st={} v=[",
            self.pc, self.sp, self.index, self.delay_timer, self.sound_timer
        )?;
        for (i, value) in self.registers.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{value:02X}")?;
        }
        write!(f, "]")?;
        match (self.opcode, self.instruction) {
            (Some(raw), Some(instruction)) => write!(f, " {raw:04X} {instruction}"),
            (Some(raw), None) => write!(f, " {raw:04X} ???"),
            (None, _) => write!(f, " <out of memory>"),
        }
    }
}

/// The CHIP-8 virtual machine: memory, registers, stack, timers, keypad and
/// frame buffer, advanced one instruction per [`step`](Machine::step).
///
/// `R` supplies the bytes for `Cxkk`.
pub struct Machine<R = StdRng> {
    memory: Memory,
    registers: RegisterBank,
    pc: Address,
    index: Address,
    stack: CallStack,
    timers: Timers,
    keypad: Keypad,
    display: Framebuffer,
    needs_redraw: bool,
    halted: bool,
    rng: R,
}

impl Machine<StdRng> {
    /// A machine whose random opcode draws from an OS-seeded generator.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// A machine whose random opcode sequence is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for Machine<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> Machine<R> {
    pub fn with_rng(rng: R) -> Self {
        Machine {
            memory: Memory::new(),
            registers: RegisterBank::new(),
            pc: PC_START_ADDR,
            index: 0,
            stack: CallStack::new(),
            timers: Timers::default(),
            keypad: Keypad::new(),
            display: Framebuffer::new(),
            needs_redraw: false,
            halted: false,
            rng,
        }
    }

    /// Returns every piece of state to power-on values. The random source is
    /// kept.
    pub fn reset(&mut self) {
        self.memory = Memory::new();
        self.registers = RegisterBank::new();
        self.pc = PC_START_ADDR;
        self.index = 0;
        self.stack = CallStack::new();
        self.timers = Timers::default();
        self.keypad.release_all();
        self.display.clear();
        self.needs_redraw = false;
        self.halted = false;
    }

    /// Resets the machine and copies `rom` to the program area.
    pub fn load(&mut self, rom: &[u8]) -> Result<()> {
        self.reset();
        self.memory.load_rom(rom)?;
        debug!("Loaded {} byte ROM at {:#05X}", rom.len(), PC_START_ADDR);
        Ok(())
    }

    pub fn tick_timers(&mut self) {
        self.timers.tick();
    }

    /// One logical tick: timers first, then a single instruction.
    pub fn cycle(&mut self) -> Result<StepOutcome> {
        self.tick_timers();
        self.step()
    }

    /// Fetches, decodes and executes the instruction at the program counter.
    pub fn step(&mut self) -> Result<StepOutcome> {
        if self.halted {
            return Ok(StepOutcome::Halted);
        }

        let raw = self.memory.read_word(self.pc)?;
        let Some(instruction) = decode(raw) else {
            warn!("Unknown instruction {:#06X} at {:#05X}", raw, self.pc);
            return Err(Chip8Error::UnknownInstruction {
                opcode: raw,
                address: self.pc,
            });
        };
        trace!("{}", self.snapshot());

        match self.execute(instruction)? {
            Flow::Next => self.pc = self.pc.wrapping_add(2),
            Flow::SkipIf(skip) => self.pc = self.pc.wrapping_add(if skip { 4 } else { 2 }),
            Flow::Goto(address) => self.pc = address,
            Flow::Wait => return Ok(StepOutcome::WaitingForKey),
            Flow::Halt => {
                debug!("Halted at {:#05X}", self.pc);
                self.halted = true;
                return Ok(StepOutcome::Halted);
            }
        }
        Ok(StepOutcome::Executed(instruction))
    }

    fn execute(&mut self, instruction: Instruction) -> Result<Flow> {
        use Instruction::*;

        let flow = match instruction {
            Halt => Flow::Halt,
            ClearScreen => {
                self.display.clear();
                self.needs_redraw = true;
                Flow::Next
            }
            Return => {
                let Some(return_address) = self.stack.pop() else {
                    warn!("Return with empty stack at {:#05X}", self.pc);
                    return Err(Chip8Error::StackUnderflow { address: self.pc });
                };
                Flow::Goto(return_address.wrapping_add(2))
            }
            Jump(address) => Flow::Goto(address),
            Call(address) => {
                if !self.stack.push(self.pc) {
                    warn!("Call with full stack at {:#05X}", self.pc);
                    return Err(Chip8Error::StackOverflow { address: self.pc });
                }
                Flow::Goto(address)
            }
            SkipEqImmediate(x, kk) => Flow::SkipIf(self.registers.read(x) == kk),
            SkipNeqImmediate(x, kk) => Flow::SkipIf(self.registers.read(x) != kk),
            SkipEqRegister(x, y) => {
                Flow::SkipIf(self.registers.read(x) == self.registers.read(y))
            }
            SkipNeqRegister(x, y) => {
                Flow::SkipIf(self.registers.read(x) != self.registers.read(y))
            }
            SetImmediate(x, kk) => {
                self.registers.write(x, kk);
                Flow::Next
            }
            AddImmediate(x, kk) => {
                let value_x = self.registers.read(x);
                self.registers.write(x, value_x.wrapping_add(kk));
                Flow::Next
            }
            Move(x, y) => {
                self.registers.write(x, self.registers.read(y));
                Flow::Next
            }
            Or(x, y) => self.logic(x, y, |a, b| a | b),
            And(x, y) => self.logic(x, y, |a, b| a & b),
            Xor(x, y) => self.logic(x, y, |a, b| a ^ b),
            AddRegister(x, y) => self.arithmetic(x, y, |a, b| a.overflowing_add(b)),
            Sub(x, y) => self.arithmetic(x, y, |a, b| (a.wrapping_sub(b), a > b)),
            SubReversed(x, y) => self.arithmetic(x, y, |a, b| (b.wrapping_sub(a), b > a)),
            ShiftRight(x) => {
                let value_x = self.registers.read(x);
                self.registers.write(x, value_x >> 1);
                self.registers.write(Register::VF, value_x & 0x01);
                Flow::Next
            }
            ShiftLeft(x) => {
                let value_x = self.registers.read(x);
                self.registers.write(x, value_x << 1);
                self.registers.write(Register::VF, value_x >> 7);
                Flow::Next
            }
            SetIndex(address) => {
                self.index = address;
                Flow::Next
            }
            JumpWithOffset(address) => {
                Flow::Goto(address.wrapping_add(u16::from(self.registers.read(Register::V0))))
            }
            Random(x, kk) => {
                let random_value = self.rng.random::<u8>() & kk;
                self.registers.write(x, random_value);
                Flow::Next
            }
            Draw(x, y, n) => {
                let pos_x = usize::from(self.registers.read(x)) % DISPLAY_WIDTH;
                let pos_y = usize::from(self.registers.read(y)) % DISPLAY_HEIGHT;
                let sprite = self
                    .memory
                    .read_slice(usize::from(self.index), usize::from(n))?;
                let outcome = self.display.draw_sprite(pos_x, pos_y, sprite);

                self.registers
                    .write(Register::VF, u8::from(outcome.collision));
                if outcome.changed {
                    self.needs_redraw = true;
                }
                Flow::Next
            }
            SkipIfKeyPressed(x) => {
                Flow::SkipIf(self.keypad.is_index_pressed(self.registers.read(x)))
            }
            SkipIfKeyNotPressed(x) => {
                Flow::SkipIf(!self.keypad.is_index_pressed(self.registers.read(x)))
            }
            ReadDelayTimer(x) => {
                self.registers.write(x, self.timers.delay);
                Flow::Next
            }
            WaitForKey(x) => match self.keypad.first_pressed() {
                Some(key) => {
                    self.registers.write(x, key.index());
                    Flow::Next
                }
                None => Flow::Wait,
            },
            SetDelayTimer(x) => {
                self.timers.delay = self.registers.read(x);
                Flow::Next
            }
            SetSoundTimer(x) => {
                self.timers.sound = self.registers.read(x);
                Flow::Next
            }
            AddToIndex(x) => {
                self.index = self
                    .index
                    .wrapping_add(u16::from(self.registers.read(x)));
                Flow::Next
            }
            FontChar(x) => {
                let glyph = u16::from(self.registers.read(x));
                self.index = FONT_ADDR as Address + glyph * FONT_HEIGHT as Address;
                Flow::Next
            }
            BinaryCodedDecimal(x) => {
                let value_x = self.registers.read(x);
                let bcd = [value_x / 100, (value_x / 10) % 10, value_x % 10];
                self.memory.write_slice(usize::from(self.index), &bcd)?;
                Flow::Next
            }
            StoreRegisters(x) => {
                let count = x.index() + 1;
                let values = &self.registers.as_array()[..count];
                self.memory.write_slice(usize::from(self.index), values)?;
                Flow::Next
            }
            LoadRegisters(x) => {
                let count = x.index() + 1;
                let values = self.memory.read_slice(usize::from(self.index), count)?;
                for (&reg, &value) in Register::ALL.iter().zip(values) {
                    self.registers.write(reg, value);
                }
                Flow::Next
            }
        };
        Ok(flow)
    }

    /// `8xy1`..`8xy3`. `VF` is left alone.
    fn logic(&mut self, x: Register, y: Register, op: impl Fn(u8, u8) -> u8) -> Flow {
        let value_x = self.registers.read(x);
        let value_y = self.registers.read(y);
        self.registers.write(x, op(value_x, value_y));
        Flow::Next
    }

    /// `8xy4`, `8xy5`, `8xy7`. The flag is written after the result, so it
    /// wins when `x` is `VF`.
    fn arithmetic(&mut self, x: Register, y: Register, op: impl Fn(u8, u8) -> (u8, bool)) -> Flow {
        let value_x = self.registers.read(x);
        let value_y = self.registers.read(y);
        let (result, flag) = op(value_x, value_y);
        self.registers.write(x, result);
        self.registers.write(Register::VF, u8::from(flag));
        Flow::Next
    }

    pub fn set_key(&mut self, key: Key, pressed: bool) {
        self.keypad.set_key(key, pressed);
    }

    pub fn release_all_keys(&mut self) {
        self.keypad.release_all();
    }

    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.keypad.is_key_pressed(key)
    }

    /// Reports whether the frame changed since the last call, and clears the
    /// flag.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.display
    }

    pub fn sound_active(&self) -> bool {
        self.timers.sound_active()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn pc(&self) -> Address {
        self.pc
    }

    pub fn index(&self) -> Address {
        self.index
    }

    pub fn register(&self, reg: Register) -> u8 {
        self.registers.read(reg)
    }

    pub fn timers(&self) -> Timers {
        self.timers
    }

    pub fn stack(&self) -> &CallStack {
        &self.stack
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn snapshot(&self) -> Snapshot {
        let opcode = self.memory.read_word(self.pc).ok();
        Snapshot {
            pc: self.pc,
            sp: self.stack.pointer(),
            index: self.index,
            registers: *self.registers.as_array(),
            delay_timer: self.timers.delay,
            sound_timer: self.timers.sound,
            opcode,
            operands: opcode.map(Operands::new).unwrap_or_default(),
            instruction: opcode.and_then(decode),
            halted: self.halted,
        }
    }
}
