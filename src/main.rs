mod emulator;
mod settings;

use std::fs::File;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

use crate::emulator::Emulator;
use crate::settings::{Args, Settings};

/// The terminal belongs to the UI, so log records go to a file.
fn init_logging(settings: &Settings) -> anyhow::Result<()> {
    let file = File::create(&settings.log_file).with_context(|| {
        format!("Failed to create log file {}", settings.log_file.display())
    })?;
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if settings.trace {
        builder.filter_module("chip8vm", LevelFilter::Trace);
    }
    builder
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::from(Args::parse());
    init_logging(&settings)?;

    let mut emulator = Emulator::new(settings)?;
    emulator.run()?;

    Ok(())
}
