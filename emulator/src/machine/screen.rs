use std::fmt::Write;

use crate::constants::{SCREEN_HEIGHT, SCREEN_SIZE, SCREEN_WIDTH};

/// 64×32 one-bit frame buffer, stored one byte per pixel, row-major
#[derive(Clone, PartialEq, Eq)]
pub struct Screen {
    pixels: Box<[u8; SCREEN_SIZE]>,
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            pixels: Box::new([0; SCREEN_SIZE]),
        }
    }
}

impl Screen {
    /// Turn every pixel off
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// XOR a sprite into the buffer, one byte per row of eight pixels,
    /// starting at `(x, y)`.
    ///
    /// Pixel addressing wraps through the whole buffer: column, row and row
    /// stride are combined into a single linear index reduced modulo the
    /// buffer size, so a sprite crossing the right edge spills into the next
    /// row and the bottom edge wraps back to the top.
    ///
    /// Returns whether any pixel that was already lit got toggled off.
    pub fn blit(&mut self, x: u8, y: u8, sprite: &[u8]) -> bool {
        let mut collision = false;
        for (row, bits) in sprite.iter().enumerate() {
            for col in 0..8 {
                let mask = 0x80_u8 >> col;
                if bits & mask == 0 {
                    continue;
                }
                let index =
                    (usize::from(x) + col + (usize::from(y) + row) * SCREEN_WIDTH) % SCREEN_SIZE;
                collision |= self.pixels[index] == 1;
                self.pixels[index] ^= 1;
            }
        }
        collision
    }

    /// Pixel state at `(x, y)`, 0 or 1
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[(x + y * SCREEN_WIDTH) % SCREEN_SIZE]
    }

    /// The whole buffer, row-major, one byte per pixel
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels[..]
    }
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for y in 0..SCREEN_HEIGHT {
            if y > 0 {
                f.write_char('\n')?;
            }
            for x in 0..SCREEN_WIDTH {
                f.write_char(if self.pixel(x, y) == 1 { '#' } else { '.' })?;
            }
        }
        Ok(())
    }
}
