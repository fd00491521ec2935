use std::fs::File;

use anyhow::Context;
use camino::Utf8PathBuf;
use chip8_emulator::Machine;
use clap::{ArgAction, Parser, ValueHint};
use tracing::info;

use crate::host;
use crate::interactive::run_interactive;

#[derive(Parser, Debug)]
pub struct RunOpt {
    /// Program image to load
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Run the program in interactive mode instead of the terminal display
    #[clap(short, long, action = ArgAction::SetTrue)]
    interactive: bool,

    /// Instructions executed per second
    #[clap(short, long, default_value = "700")]
    speed: u32,

    /// Halt on unknown opcodes instead of skipping them
    #[clap(long, action = ArgAction::SetTrue)]
    strict: bool,

    /// Disable the buzzer
    #[clap(long, action = ArgAction::SetTrue)]
    mute: bool,
}

impl RunOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        let mut machine = Machine::new();
        machine.set_strict(self.strict);

        info!(path = %self.input, "Reading program image");
        let file = File::open(&self.input)
            .with_context(|| format!("could not open {}", self.input))?;
        let size = machine
            .load_rom_from(file)
            .with_context(|| format!("could not load {}", self.input))?;
        info!(size, "Program image loaded");

        if self.interactive {
            run_interactive(&mut machine)?;
        } else {
            host::run(&mut machine, self.speed, self.mute)?;
        }

        info!(cycles = machine.cycles, "End of program");

        Ok(())
    }
}
