/// Total size of the machine memory, in bytes
pub const MEMORY_SIZE: usize = 4096;

/// Address at which program images are loaded and execution starts
pub const PROGRAM_START: u16 = 0x200;

/// Maximum size of a program image, in bytes
pub const MAX_PROGRAM_SIZE: usize = MEMORY_SIZE - 0x200;

/// Last address a 2-byte opcode can be fetched from
pub const LAST_OPCODE_ADDRESS: u16 = 0xFFE;

/// Address of the embedded glyph table
pub const FONT_START: u16 = 0x050;

/// Bytes per glyph, one per sprite row
pub const GLYPH_SIZE: u16 = 5;

/// Width of the frame buffer, in pixels
pub const SCREEN_WIDTH: usize = 64;

/// Height of the frame buffer, in pixels
pub const SCREEN_HEIGHT: usize = 32;

/// Number of pixels in the frame buffer
pub const SCREEN_SIZE: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

/// Capacity of the call stack
pub const STACK_DEPTH: usize = 16;

/// Number of keys on the hexadecimal keypad
pub const KEY_COUNT: usize = 16;

/// Bitmaps for the hexadecimal digits, five rows of eight pixels per glyph,
/// copied to [`FONT_START`] when the machine is built
pub const FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
