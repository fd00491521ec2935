use thiserror::Error;

use crate::constants::KEY_COUNT;

/// One of the sixteen keypad keys, identified by its hexadecimal code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key(u8);

impl Key {
    /// The key code, `0x0` to `0xF`
    #[must_use]
    pub const fn code(self) -> u8 {
        self.0
    }
}

/// Raised when a key code does not fit the 16-key pad.
///
/// Key codes come out of 8-bit registers, so a program can name keys that
/// do not exist.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid key code {0:#04x}")]
pub struct InvalidKey(pub u8);

impl TryFrom<u8> for Key {
    type Error = InvalidKey;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        if usize::from(code) < KEY_COUNT {
            Ok(Self(code))
        } else {
            Err(InvalidKey(code))
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

#[derive(Error, Debug)]
#[error("could not parse key, expected a single hexadecimal digit")]
pub struct KeyParseError;

impl std::str::FromStr for Key {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 1 {
            return Err(KeyParseError);
        }
        let code = u8::from_str_radix(s, 16).map_err(|_| KeyParseError)?;
        Key::try_from(code).map_err(|_| KeyParseError)
    }
}

/// Pressed/released state of the 16-key hexadecimal pad, mutated by the
/// host between cycles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keypad {
    pressed: [bool; KEY_COUNT],
}

impl Keypad {
    pub fn press(&mut self, key: Key) {
        self.pressed[usize::from(key.code())] = true;
    }

    pub fn release(&mut self, key: Key) {
        self.pressed[usize::from(key.code())] = false;
    }

    pub fn set(&mut self, key: Key, pressed: bool) {
        self.pressed[usize::from(key.code())] = pressed;
    }

    #[must_use]
    pub fn is_pressed(&self, key: Key) -> bool {
        self.pressed[usize::from(key.code())]
    }

    /// The lowest pressed key code, if any
    #[must_use]
    pub fn first_pressed(&self) -> Option<Key> {
        self.pressed
            .iter()
            .enumerate()
            .find(|(_, &pressed)| pressed)
            .and_then(|(code, _)| u8::try_from(code).ok())
            .map(Key)
    }

    /// The raw 16-cell state, indexed by key code
    #[must_use]
    pub fn state(&self) -> &[bool] {
        &self.pressed
    }
}
