//! Terminal host: renders the frame buffer, maps keyboard events onto the
//! keypad and drives the buzzer, pacing everything at 60 Hz.

mod input;
mod screen;
mod sound;

use std::time::{Duration, Instant};

use anyhow::Context;
use chip8_emulator::{Machine, Step};
use tracing::debug;

use self::input::TermInput;
use self::screen::TermScreen;
use self::sound::{Beeper, Mute, Sound};

/// Duration of one 60 Hz frame
const FRAME: Duration = Duration::from_micros(16_667);

/// Run the machine until the program faults or the user quits with Escape
pub fn run(machine: &mut Machine, speed: u32, mute: bool) -> anyhow::Result<()> {
    let mut screen = TermScreen::new()?;
    let mut input = TermInput::default();
    let mut sound: Box<dyn Sound> = if mute {
        Box::new(Mute)
    } else {
        Box::new(Beeper::default())
    };

    // Instructions per frame
    let batch = (speed / 60).max(1);

    loop {
        let frame_start = Instant::now();

        if !input.poll(&mut machine.keypad)? {
            debug!("quit requested");
            break;
        }

        for _ in 0..batch {
            match machine.step().context("program fault")? {
                Step::Executed => {}
                // Blocked on the keypad, idle until the next frame
                Step::AwaitingKey => break,
            }
        }

        if machine.tick() {
            sound.start()?;
        } else {
            sound.stop()?;
        }

        if machine.take_redraw() {
            screen.draw(machine.screen.pixels())?;
        }

        spin_sleep::sleep(FRAME.saturating_sub(frame_start.elapsed()));
    }

    Ok(())
}
