use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use log::{error, info};
use ratatui::{
    Terminal,
    backend::{Backend, CrosstermBackend},
    layout::Alignment,
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
};
use rdev::{EventType, Key as HostKey};
use rodio::{OutputStream, Sink, Source, source::SineWave};

use chip8vm::display::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use chip8vm::{Key, Machine, StepOutcome};

use crate::settings::Settings;

const DEFAULT_FREQUENCY: f32 = 440.0;

pub struct Beep {
    sink: Sink,
    #[allow(dead_code)]
    stream: OutputStream,
}

impl Beep {
    pub fn new(freq: f32) -> anyhow::Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&stream_handle)?;
        let source = SineWave::new(freq).repeat_infinite();

        sink.append(source);
        sink.pause();

        Ok(Self { sink, stream })
    }

    pub fn on(&mut self) {
        self.sink.play();
    }

    pub fn off(&mut self) {
        self.sink.pause();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputEvent {
    Keypad(Key, bool),
    Quit,
    /// The global hook could not start; only terminal key events remain.
    ListenerFailed(String),
}

/// Physical keys laid out as the 4x4 CHIP-8 keypad:
///
/// ```text
/// 1 2 3 4        1 2 3 C
/// Q W E R   ->   4 5 6 D
/// A S D F        7 8 9 E
/// Z X C V        A 0 B F
/// ```
fn map_key(key: HostKey) -> Option<Key> {
    let key = match key {
        HostKey::Num1 => Key::Key1,
        HostKey::Num2 => Key::Key2,
        HostKey::Num3 => Key::Key3,
        HostKey::Num4 => Key::KeyC,
        HostKey::KeyQ => Key::Key4,
        HostKey::KeyW => Key::Key5,
        HostKey::KeyE => Key::Key6,
        HostKey::KeyR => Key::KeyD,
        HostKey::KeyA => Key::Key7,
        HostKey::KeyS => Key::Key8,
        HostKey::KeyD => Key::Key9,
        HostKey::KeyF => Key::KeyE,
        HostKey::KeyZ => Key::KeyA,
        HostKey::KeyX => Key::Key0,
        HostKey::KeyC => Key::KeyB,
        HostKey::KeyV => Key::KeyF,
        _ => return None,
    };
    Some(key)
}

fn translate(event_type: EventType) -> Option<InputEvent> {
    match event_type {
        EventType::KeyPress(HostKey::Escape) => Some(InputEvent::Quit),
        EventType::KeyPress(key) => map_key(key).map(|k| InputEvent::Keypad(k, true)),
        EventType::KeyRelease(key) => map_key(key).map(|k| InputEvent::Keypad(k, false)),
        _ => None,
    }
}

/// Esc or Ctrl+C typed into the terminal. Raw mode delivers Ctrl+C as a
/// key event instead of a signal.
fn is_quit_event(event: &Event) -> bool {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            key.code == KeyCode::Esc
                || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        }
        _ => false,
    }
}

/// Listens for global key presses and releases on a background thread.
fn spawn_keyboard_listener() -> Receiver<InputEvent> {
    let (tx, rx): (Sender<InputEvent>, Receiver<InputEvent>) = mpsc::channel();
    let failure_tx = tx.clone();
    std::thread::spawn(move || {
        let result = rdev::listen(move |event| {
            if let Some(input) = translate(event.event_type) {
                let _ = tx.send(input);
            }
        });
        if let Err(e) = result {
            error!("Keyboard listener stopped: {e:?}");
            let _ = failure_tx.send(InputEvent::ListenerFailed(format!("{e:?}")));
        }
    });
    rx
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    Halted,
}

pub struct Emulator {
    machine: Machine,
    settings: Settings,
    beeper: Option<Beep>,
    run_state: RunState,
    input_error: Option<String>,
}

impl Emulator {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let machine = match settings.seed {
            Some(seed) => Machine::with_seed(seed),
            None => Machine::new(),
        };
        let beeper = if settings.mute {
            None
        } else {
            Some(Beep::new(DEFAULT_FREQUENCY).context("Failed to open audio output")?)
        };

        Ok(Emulator {
            machine,
            settings,
            beeper,
            run_state: RunState::Running,
            input_error: None,
        })
    }

    fn draw(&self, frame: &mut ratatui::Frame, rom_name: &str) {
        use ratatui::layout::{Constraint, Direction, Layout};

        let area = frame.area();
        // Exact size for a 64x32 display plus borders
        let game_width = (DISPLAY_WIDTH as u16) + 2;
        let game_height = (DISPLAY_HEIGHT as u16) + 2;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(game_height),
                Constraint::Length(7),
                Constraint::Min(0),
            ])
            .split(area);

        let top = if self.settings.debug {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Length(game_width),
                    Constraint::Length(32),
                    Constraint::Min(0),
                ])
                .split(chunks[0])
        } else {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Min(0),
                    Constraint::Length(game_width),
                    Constraint::Min(0),
                ])
                .split(chunks[0])
        };
        let game_area = if self.settings.debug { top[0] } else { top[1] };

        let framebuffer = self.machine.framebuffer();
        let mut screen = String::with_capacity(DISPLAY_WIDTH * DISPLAY_HEIGHT + DISPLAY_HEIGHT);
        for y in 0..DISPLAY_HEIGHT {
            screen.extend(framebuffer.row(y).map(|lit| if lit { '█' } else { ' ' }));
            screen.push('\n');
        }
        let mut title = match self.run_state {
            RunState::Running => rom_name.to_string(),
            RunState::Halted => format!("{rom_name} (halted, Esc to quit)"),
        };
        if let Some(reason) = &self.input_error {
            title.push_str(&format!(" [keyboard unavailable: {reason}, Esc to quit]"));
        }
        let game_paragraph = Paragraph::new(screen)
            .block(Block::default().borders(Borders::ALL).title(title))
            .style(Style::default().fg(Color::White));
        frame.render_widget(game_paragraph, game_area);

        if self.settings.debug {
            let registers = self.debug_text();
            let debug_paragraph = Paragraph::new(registers)
                .block(Block::default().borders(Borders::ALL).title("Machine"))
                .style(Style::default().fg(Color::Green));
            frame.render_widget(debug_paragraph, top[1]);
        }

        let key_mapping = "Key Mapping:\n\
    1 2 3 4    →    1 2 3 C\n\
    Q W E R    →    4 5 6 D\n\
    A S D F    →    7 8 9 E\n\
    Z X C V    →    A 0 B F";
        let key_paragraph = Paragraph::new(key_mapping)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Keypad"))
            .style(Style::default().fg(Color::Yellow));
        frame.render_widget(key_paragraph, chunks[1]);
    }

    fn debug_text(&self) -> String {
        let snapshot = self.machine.snapshot();
        let mut text = format!(
            "PC {:#05X}  SP {:2}\nI  {:#05X}\nDT {:3}   ST {:3}\n\n",
            snapshot.pc, snapshot.sp, snapshot.index, snapshot.delay_timer, snapshot.sound_timer
        );
        for (i, value) in snapshot.registers.iter().enumerate() {
            text.push_str(&format!("V{i:X} {value:#04X}"));
            text.push(if i % 2 == 0 { ' ' } else { '\n' });
        }
        text.push('\n');
        match (snapshot.opcode, snapshot.instruction) {
            (Some(raw), Some(instruction)) => text.push_str(&format!("{raw:04X} {instruction}\n")),
            (Some(raw), None) => text.push_str(&format!("{raw:04X} ???\n")),
            (None, _) => text.push_str("<out of memory>\n"),
        }
        let ops = snapshot.operands;
        text.push_str(&format!(
            "x={:X} y={:X} n={:X}\nkk={:#04X} nnn={:#05X}",
            ops.x, ops.y, ops.n, ops.kk, ops.nnn
        ));
        text
    }

    /// Runs the cycles due this frame. Stops early once the program halts.
    fn run_cycles(&mut self, count: usize) -> anyhow::Result<()> {
        for _ in 0..count {
            if self.machine.cycle()? == StepOutcome::Halted {
                info!("Program halted at {:#05X}", self.machine.pc());
                self.run_state = RunState::Halted;
                break;
            }
        }
        Ok(())
    }

    fn update_sound(&mut self) {
        let active = self.run_state == RunState::Running && self.machine.sound_active();
        if let Some(beeper) = self.beeper.as_mut() {
            if active {
                beeper.on();
            } else {
                beeper.off();
            }
        }
    }

    fn main_loop<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        input: &Receiver<InputEvent>,
    ) -> anyhow::Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.settings.frame_rate as f64);
        let cycles_per_frame = self.settings.cycles_per_frame();
        let rom_name = self.settings.rom_name();
        let mut cycle_budget = 0.0;
        let mut last_status = None;

        'mainloop: loop {
            let frame_start = Instant::now();

            for event in input.try_iter() {
                match event {
                    InputEvent::Quit => break 'mainloop,
                    InputEvent::Keypad(key, pressed) => self.machine.set_key(key, pressed),
                    InputEvent::ListenerFailed(reason) => self.input_error = Some(reason),
                }
            }

            // Drain terminal events to prevent echoing; they still carry quit
            while event::poll(Duration::ZERO)? {
                if is_quit_event(&event::read()?) {
                    break 'mainloop;
                }
            }

            if self.run_state == RunState::Running {
                cycle_budget += cycles_per_frame;
                let due = cycle_budget.floor();
                cycle_budget -= due;
                self.run_cycles(due as usize)?;
            }
            self.update_sound();

            let redraw = self.machine.take_redraw();
            let status = (self.run_state, self.input_error.is_some());
            if redraw || self.settings.debug || last_status != Some(status) {
                terminal.draw(|frame| self.draw(frame, &rom_name))?;
                last_status = Some(status);
            }

            let elapsed = frame_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
        Ok(())
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        let rom_data = std::fs::read(&self.settings.rom)
            .with_context(|| format!("Failed to read ROM {}", self.settings.rom.display()))?;
        self.machine.load(&rom_data)?;
        info!(
            "Running {} ({} bytes) at {} cycles/s",
            self.settings.rom.display(),
            rom_data.len(),
            self.settings.cycle_rate
        );

        let input = spawn_keyboard_listener();

        enable_raw_mode()?;
        let stdout = std::io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.main_loop(&mut terminal, &input);

        if let Some(beeper) = self.beeper.as_mut() {
            beeper.off();
        }
        terminal.clear()?;
        disable_raw_mode()?;

        if let Err(e) = &result {
            error!("Emulation stopped: {e:#}");
            error!("{}", self.machine.snapshot());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypad_layout() {
        let rows = [
            [HostKey::Num1, HostKey::Num2, HostKey::Num3, HostKey::Num4],
            [HostKey::KeyQ, HostKey::KeyW, HostKey::KeyE, HostKey::KeyR],
            [HostKey::KeyA, HostKey::KeyS, HostKey::KeyD, HostKey::KeyF],
            [HostKey::KeyZ, HostKey::KeyX, HostKey::KeyC, HostKey::KeyV],
        ];
        let expected = [
            [0x1, 0x2, 0x3, 0xC],
            [0x4, 0x5, 0x6, 0xD],
            [0x7, 0x8, 0x9, 0xE],
            [0xA, 0x0, 0xB, 0xF],
        ];
        for (row, expected_row) in rows.iter().zip(expected) {
            for (&host, index) in row.iter().zip(expected_row) {
                assert_eq!(map_key(host).map(Key::index), Some(index));
            }
        }
        assert_eq!(map_key(HostKey::KeyP), None);
    }

    #[test]
    fn test_translate_events() {
        assert_eq!(
            translate(EventType::KeyPress(HostKey::Escape)),
            Some(InputEvent::Quit)
        );
        assert_eq!(
            translate(EventType::KeyPress(HostKey::KeyX)),
            Some(InputEvent::Keypad(Key::Key0, true))
        );
        assert_eq!(
            translate(EventType::KeyRelease(HostKey::KeyV)),
            Some(InputEvent::Keypad(Key::KeyF, false))
        );
        assert_eq!(translate(EventType::KeyRelease(HostKey::Escape)), None);
        assert_eq!(translate(EventType::MouseMove { x: 1.0, y: 2.0 }), None);
    }

    #[test]
    fn test_terminal_quit_keys() {
        use crossterm::event::KeyEvent;

        let key = |code, modifiers| Event::Key(KeyEvent::new(code, modifiers));
        assert!(is_quit_event(&key(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(is_quit_event(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_quit_event(&key(KeyCode::Char('c'), KeyModifiers::NONE)));
        assert!(!is_quit_event(&key(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(!is_quit_event(&Event::FocusGained));

        let mut release = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert!(!is_quit_event(&Event::Key(release)));
    }
}
