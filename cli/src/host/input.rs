use std::time::Duration;

use chip8_emulator::machine::{Key, Keypad};
use crossterm::event::{poll, read, Event, KeyCode, KeyModifiers};

/// The conventional mapping of the hexadecimal pad onto the left-hand
/// block of a QWERTY keyboard:
///
/// ```text
/// 1 2 3 4        1 2 3 C
/// Q W E R   ->   4 5 6 D
/// A S D F        7 8 9 E
/// Z X C V        A 0 B F
/// ```
const KEYMAP: [(char, u8); 16] = [
    ('1', 0x1),
    ('2', 0x2),
    ('3', 0x3),
    ('4', 0xC),
    ('q', 0x4),
    ('w', 0x5),
    ('e', 0x6),
    ('r', 0xD),
    ('a', 0x7),
    ('s', 0x8),
    ('d', 0x9),
    ('f', 0xE),
    ('z', 0xA),
    ('x', 0x0),
    ('c', 0xB),
    ('v', 0xF),
];

/// Frames a key stays pressed after its last event. Terminals report key
/// presses but not releases, so held keys are decayed instead.
const HOLD_FRAMES: u8 = 6;

/// Feeds terminal key events into the keypad, once per frame
#[derive(Debug, Default)]
pub struct TermInput {
    held: [u8; 16],
}

impl TermInput {
    /// Drain pending key events and refresh the keypad state.
    ///
    /// Returns `false` when the user asked to quit with Escape or Ctrl-C.
    pub fn poll(&mut self, keypad: &mut Keypad) -> anyhow::Result<bool> {
        while poll(Duration::ZERO)? {
            let Event::Key(event) = read()? else {
                continue;
            };
            match event.code {
                KeyCode::Esc => return Ok(false),
                KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(false);
                }
                KeyCode::Char(c) => {
                    let c = c.to_ascii_lowercase();
                    if let Some(slot) = KEYMAP.iter().position(|&(mapped, _)| mapped == c) {
                        self.held[slot] = HOLD_FRAMES;
                    }
                }
                _ => {}
            }
        }

        for (&(_, code), frames) in KEYMAP.iter().zip(self.held.iter_mut()) {
            *frames = frames.saturating_sub(1);
            keypad.set(Key::try_from(code)?, *frames > 0);
        }

        Ok(true)
    }
}
