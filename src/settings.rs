use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_FRAME_RATE: u64 = 60;
/// One cycle ticks the timers once, so 60 keeps them at their nominal 60 Hz.
pub const DEFAULT_CYCLE_RATE: u64 = 60;
pub const DEFAULT_LOG_FILE: &str = "chip8vm.log";

/// Run a CHIP-8 program in the terminal.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Path to the ROM image
    pub rom: PathBuf,

    /// Screen refreshes and keyboard polls per second
    #[arg(long, default_value_t = DEFAULT_FRAME_RATE, value_parser = clap::value_parser!(u64).range(1..))]
    pub frame_rate: u64,

    /// Machine cycles per second (one timer tick plus one instruction each)
    #[arg(long, default_value_t = DEFAULT_CYCLE_RATE, value_parser = clap::value_parser!(u64).range(1..))]
    pub cycle_rate: u64,

    /// Seed for the random number opcode
    #[arg(long)]
    pub seed: Option<u64>,

    /// File receiving log output; RUST_LOG selects the level
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Log every executed instruction with the register state
    #[arg(long)]
    pub trace: bool,

    /// Show the register and instruction panel
    #[arg(long)]
    pub debug: bool,

    /// Do not open an audio device
    #[arg(long)]
    pub mute: bool,
}

pub struct Settings {
    pub frame_rate: u64,
    pub cycle_rate: u64,
    pub rom: PathBuf,
    pub seed: Option<u64>,
    pub log_file: PathBuf,
    pub trace: bool,
    pub debug: bool,
    pub mute: bool,
}
impl Settings {
    /// Cycles to run per displayed frame. Fractional for rates that do not
    /// divide evenly.
    pub fn cycles_per_frame(&self) -> f64 {
        self.cycle_rate as f64 / self.frame_rate as f64
    }

    pub fn rom_name(&self) -> String {
        self.rom
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown ROM".to_string())
    }
}

impl From<Args> for Settings {
    fn from(args: Args) -> Self {
        Settings {
            frame_rate: args.frame_rate,
            cycle_rate: args.cycle_rate,
            rom: args.rom,
            seed: args.seed,
            log_file: args.log_file,
            trace: args.trace,
            debug: args.debug,
            mute: args.mute,
        }
    }
}
