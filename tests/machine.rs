use chip8vm::display::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use chip8vm::state::PC_START_ADDR;
use chip8vm::{Chip8Error, Instruction, Key, Machine, Register, StepOutcome};

fn rom(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

fn load(words: &[u16]) -> Machine {
    let mut machine = Machine::with_seed(0);
    machine.load(&rom(words)).unwrap();
    machine
}

#[test]
fn scripted_register_loads_advance_pc() {
    let mut machine = load(&[0x6005, 0x600A]);
    assert_eq!(machine.pc(), PC_START_ADDR);

    machine.step().unwrap();
    assert_eq!(machine.register(Register::V0), 0x05);
    assert_eq!(machine.pc(), PC_START_ADDR + 2);

    machine.step().unwrap();
    assert_eq!(machine.register(Register::V0), 0x0A);
    assert_eq!(machine.pc(), PC_START_ADDR + 4);

    // Zero padding after the program ends the run.
    assert_eq!(machine.step(), Ok(StepOutcome::Halted));
}

#[test]
fn rom_size_limit() {
    let mut machine = Machine::with_seed(0);
    assert!(machine.load(&[0u8; 3584]).is_ok());
    assert!(matches!(
        machine.load(&[0u8; 3585]),
        Err(Chip8Error::RomTooLarge { size: 3585, .. })
    ));
}

#[test]
fn reload_starts_from_clean_state() {
    let mut machine = load(&[0x6A33, 0xA400, 0x00E0]);
    for _ in 0..3 {
        machine.step().unwrap();
    }
    machine.load(&rom(&[0x1200])).unwrap();
    assert_eq!(machine.register(Register::VA), 0);
    assert_eq!(machine.index(), 0);
    assert!(!machine.take_redraw());
    assert_eq!(machine.pc(), PC_START_ADDR);
}

#[test]
fn subroutine_round_trip() {
    // 0x200: CALL 0x206 / 0x202: LD V1, 2 / 0x204: JP 0x204 / 0x206: LD V0, 1 / 0x208: RET
    let mut machine = load(&[0x2206, 0x6102, 0x1204, 0x6001, 0x00EE]);
    let outcomes: Vec<_> = (0..4).map(|_| machine.step().unwrap()).collect();
    assert_eq!(
        outcomes,
        vec![
            StepOutcome::Executed(Instruction::Call(0x206)),
            StepOutcome::Executed(Instruction::SetImmediate(Register::V0, 1)),
            StepOutcome::Executed(Instruction::Return),
            StepOutcome::Executed(Instruction::SetImmediate(Register::V1, 2)),
        ]
    );
    assert_eq!(machine.pc(), 0x204);
    assert_eq!(machine.stack().pointer(), 0);
}

#[test]
fn countdown_with_delay_timer() {
    // LD V0, 3 / LD DT, V0 / loop: LD V1, DT / SE V1, 0 / JP loop / HALT
    let mut machine = load(&[0x6003, 0xF015, 0xF107, 0x3100, 0x1204, 0x0000]);
    let mut cycles = 0;
    while machine.cycle().unwrap() != StepOutcome::Halted {
        cycles += 1;
        assert!(cycles < 100, "delay timer never reached zero");
    }
    assert_eq!(machine.timers().delay, 0);
    assert_eq!(machine.register(Register::V1), 0);
}

#[test]
fn wait_for_key_then_draw_digit() {
    // LD V0, K / LD F, V0 / DRW V1, V1, 5
    let mut machine = load(&[0xF00A, 0xF029, 0xD115]);
    for _ in 0..3 {
        assert_eq!(machine.step(), Ok(StepOutcome::WaitingForKey));
    }
    machine.set_key(Key::Key1, true);
    machine.step().unwrap();
    machine.release_all_keys();
    assert!(!machine.is_key_pressed(Key::Key1));
    machine.step().unwrap();
    machine.step().unwrap();

    assert_eq!(machine.register(Register::V0), 1);
    assert!(machine.take_redraw());
    // Glyph "1": 0x20 0x60 0x20 0x20 0x70
    let frame = machine.framebuffer();
    let lit: Vec<(usize, usize)> = (0..DISPLAY_HEIGHT)
        .flat_map(|y| (0..DISPLAY_WIDTH).map(move |x| (x, y)))
        .filter(|&(x, y)| frame.pixel(x, y))
        .collect();
    assert_eq!(
        lit,
        vec![(2, 0), (1, 1), (2, 1), (2, 2), (2, 3), (1, 4), (2, 4), (3, 4)]
    );
}

#[test]
fn sound_follows_sound_timer() {
    let mut machine = load(&[0x6002, 0xF018, 0x1204]);
    machine.step().unwrap();
    machine.step().unwrap();
    assert!(machine.sound_active());
    machine.cycle().unwrap();
    assert!(machine.sound_active());
    machine.cycle().unwrap();
    assert!(!machine.sound_active());
}

#[test]
fn errors_leave_state_untouched() {
    let mut machine = load(&[0x6007, 0xFFFF]);
    machine.step().unwrap();
    let before = machine.snapshot();
    let err = machine.step().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unknown instruction 0xFFFF at 0x202"
    );
    assert_eq!(machine.snapshot(), before);
}

#[test]
fn load_clears_halted_state() {
    let mut machine = load(&[0x0000]);
    assert_eq!(machine.step(), Ok(StepOutcome::Halted));
    assert!(machine.is_halted());

    machine.load(&rom(&[0x6042])).unwrap();
    assert!(!machine.is_halted());
    assert!(matches!(machine.step(), Ok(StepOutcome::Executed(_))));
    assert_eq!(machine.register(Register::V0), 0x42);
}
