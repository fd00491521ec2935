//! The machine itself: memory, registers, call stack, frame buffer, keypad
//! and timers, stepped one instruction at a time by a host.

use std::io::Read;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use thiserror::Error;
use tracing::debug;

use crate::constants::{LAST_OPCODE_ADDRESS, MAX_PROGRAM_SIZE, PROGRAM_START};

mod exception;
mod instruction;
mod keypad;
mod memory;
mod registers;
mod screen;
mod stack;

pub use self::exception::Exception;
pub use self::instruction::Instruction;
pub use self::keypad::{InvalidKey, Key, KeyParseError, Keypad};
pub use self::memory::{Memory, MemoryError};
pub use self::registers::{Reg, RegisterParseError, Registers};
pub use self::screen::Screen;
pub use self::stack::CallStack;

/// Raised when a program image cannot be brought into memory
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read program image")]
    Io(#[from] std::io::Error),

    /// The image does not fit between the load address and the end of memory
    #[error("program image too large ({size} bytes, {capacity} available)")]
    TooLarge { size: usize, capacity: usize },
}

/// Outcome of a successful [`Machine::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// An instruction ran to completion
    Executed,

    /// The program is blocked on a key press; stepping again without a
    /// pressed key re-runs the same instruction
    AwaitingKey,
}

/// An instruction-level CHIP-8 virtual machine.
///
/// The machine owns all interpreter state and exposes two entry points to
/// the host: [`step`](Machine::step) runs one instruction, and
/// [`tick`](Machine::tick) decrements the timers, to be called at 60 Hz
/// regardless of the instruction rate.
pub struct Machine {
    pub registers: Registers,
    pub memory: Memory,
    pub stack: CallStack,
    pub screen: Screen,
    pub keypad: Keypad,

    /// Number of instructions executed so far
    pub cycles: usize,

    delay_timer: u8,
    sound_timer: u8,
    redraw: bool,
    strict: bool,
    rng: Box<dyn RngCore>,
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("registers", &self.registers)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    /// Build a machine with zeroed state, the glyph table in place and an
    /// OS-seeded random source
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Build a machine drawing random bytes from the given source
    pub fn with_rng(rng: impl RngCore + 'static) -> Self {
        Self {
            registers: Registers::default(),
            memory: Memory::default(),
            stack: CallStack::default(),
            screen: Screen::default(),
            keypad: Keypad::default(),
            cycles: 0,
            delay_timer: 0,
            sound_timer: 0,
            redraw: false,
            strict: false,
            rng: Box::new(rng),
        }
    }

    /// In strict mode unknown opcodes raise [`Exception::UnknownOpcode`]
    /// instead of being skipped
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Copy a program image into memory at the load address
    ///
    /// # Errors
    ///
    /// It fails with [`LoadError::TooLarge`] when the image exceeds the
    /// program capacity; nothing is copied in that case.
    pub fn load_rom(&mut self, image: &[u8]) -> Result<(), LoadError> {
        if image.len() > MAX_PROGRAM_SIZE {
            return Err(LoadError::TooLarge {
                size: image.len(),
                capacity: MAX_PROGRAM_SIZE,
            });
        }

        self.memory
            .load(PROGRAM_START, image)
            .map_err(|_| LoadError::TooLarge {
                size: image.len(),
                capacity: MAX_PROGRAM_SIZE,
            })?;
        debug!(size = image.len(), "program image loaded");
        Ok(())
    }

    /// Read a program image from a source and load it, returning its size
    ///
    /// # Errors
    ///
    /// It fails if reading fails or if the image does not fit in memory.
    pub fn load_rom_from(&mut self, mut source: impl Read) -> Result<usize, LoadError> {
        let mut image = Vec::new();
        source.read_to_end(&mut image)?;
        self.load_rom(&image)?;
        Ok(image.len())
    }

    fn fetch(&mut self) -> Result<u16, Exception> {
        if self.registers.pc > LAST_OPCODE_ADDRESS {
            return Err(Exception::OutOfBounds(self.registers.pc));
        }
        let opcode = self.memory.read_opcode(self.registers.pc)?;
        self.registers.pc += 2;
        Ok(opcode)
    }

    /// Fetch, decode and execute one instruction
    ///
    /// # Errors
    ///
    /// It fails with an [`Exception`] describing the fault; the program
    /// counter has already moved past the faulting instruction.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn step(&mut self) -> Result<Step, Exception> {
        let opcode = self.fetch()?;

        let Some(instruction) = Instruction::decode(opcode) else {
            if self.strict {
                return Err(Exception::UnknownOpcode(opcode));
            }
            debug!(opcode = format_args!("{opcode:#06x}"), "unknown opcode skipped");
            self.cycles += 1;
            return Ok(Step::Executed);
        };

        debug!(%instruction, "executing");
        let step = instruction.execute(self)?;
        self.cycles += 1;
        Ok(step)
    }

    /// Decrement both timers by one, flooring at zero.
    ///
    /// Returns whether the sound timer was running before the tick, so the
    /// host knows the buzzer should be audible for this frame.
    pub fn tick(&mut self) -> bool {
        let sounding = self.sound_timer > 0;
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
        sounding
    }

    /// Current `(delay, sound)` timer values
    #[must_use]
    pub const fn timers(&self) -> (u8, u8) {
        (self.delay_timer, self.sound_timer)
    }

    /// Whether the sound timer is running
    #[must_use]
    pub const fn sound_active(&self) -> bool {
        self.sound_timer > 0
    }

    /// Whether the frame buffer changed since the last [`take_redraw`]
    ///
    /// [`take_redraw`]: Machine::take_redraw
    #[must_use]
    pub const fn needs_redraw(&self) -> bool {
        self.redraw
    }

    /// Consume the redraw flag
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }

    fn random_byte(&mut self) -> u8 {
        self.rng.gen()
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use rand::rngs::mock::StepRng;

    use crate::constants::{FONT_START, GLYPH_SIZE, MAX_PROGRAM_SIZE};

    use super::*;

    fn machine_with_program(program: &[u8]) -> Machine {
        let mut machine = Machine::with_rng(StepRng::new(0, 0));
        machine.load_rom(program).unwrap();
        machine
    }

    #[test]
    fn load_immediate_advances_the_program_counter() {
        let mut machine = machine_with_program(&[0x6A, 0x05]);
        assert_eq!(machine.registers.pc, 0x200);

        assert_eq!(machine.step(), Ok(Step::Executed));
        assert_eq!(machine.registers.get(Reg::VA), 0x05);
        assert_eq!(machine.registers.pc, 0x202);
        assert_eq!(machine.cycles, 1);
    }

    #[test]
    fn add_carries_into_the_flag_register() {
        // add V1, V2 over every operand pair
        let mut machine = machine_with_program(&[0x81, 0x24]);
        for a in 0..=255_u8 {
            for b in 0..=255_u8 {
                machine.registers.pc = 0x200;
                machine.registers.set(Reg::V1, a);
                machine.registers.set(Reg::V2, b);
                machine.step().unwrap();

                let (expected, carry) = a.overflowing_add(b);
                assert_eq!(machine.registers.get(Reg::V1), expected);
                assert_eq!(machine.registers.get(Reg::VF), u8::from(carry));
            }
        }
    }

    #[test]
    fn sub_sets_the_flag_when_no_borrow_occurs() {
        // sub V1, V2 over every operand pair
        let mut machine = machine_with_program(&[0x81, 0x25]);
        for a in 0..=255_u8 {
            for b in 0..=255_u8 {
                machine.registers.pc = 0x200;
                machine.registers.set(Reg::V1, a);
                machine.registers.set(Reg::V2, b);
                machine.step().unwrap();

                assert_eq!(machine.registers.get(Reg::V1), a.wrapping_sub(b));
                assert_eq!(machine.registers.get(Reg::VF), u8::from(a >= b));
            }
        }
    }

    #[test]
    fn subn_subtracts_in_reverse() {
        // subn V1, V2 over every operand pair
        let mut machine = machine_with_program(&[0x81, 0x27]);
        for a in 0..=255_u8 {
            for b in 0..=255_u8 {
                machine.registers.pc = 0x200;
                machine.registers.set(Reg::V1, a);
                machine.registers.set(Reg::V2, b);
                machine.step().unwrap();

                assert_eq!(machine.registers.get(Reg::V1), b.wrapping_sub(a));
                assert_eq!(machine.registers.get(Reg::VF), u8::from(b >= a));
            }
        }
    }

    #[test]
    fn shifts_capture_the_discarded_bit() {
        let mut machine = machine_with_program(&[0x81, 0x06]);
        for value in 0..=255_u8 {
            machine.registers.pc = 0x200;
            machine.registers.set(Reg::V1, value);
            machine.step().unwrap();
            assert_eq!(machine.registers.get(Reg::V1), value >> 1);
            assert_eq!(machine.registers.get(Reg::VF), value & 1);
        }

        let mut machine = machine_with_program(&[0x81, 0x0E]);
        for value in 0..=255_u8 {
            machine.registers.pc = 0x200;
            machine.registers.set(Reg::V1, value);
            machine.step().unwrap();
            assert_eq!(machine.registers.get(Reg::V1), value << 1);
            assert_eq!(machine.registers.get(Reg::VF), value >> 7);
        }
    }

    #[test]
    fn add_immediate_wraps_without_touching_the_flag() {
        let mut machine = machine_with_program(&[0x71, 0x10]);
        machine.registers.set(Reg::V1, 0xF8);
        machine.registers.set(Reg::VF, 0x42);
        machine.step().unwrap();

        assert_eq!(machine.registers.get(Reg::V1), 0x08);
        assert_eq!(machine.registers.get(Reg::VF), 0x42);
    }

    #[test]
    fn flag_register_reports_the_flag_when_it_is_the_destination() {
        // add VF, VF: the carry overwrites the sum
        let mut machine = machine_with_program(&[0x8F, 0xF4]);
        machine.registers.set(Reg::VF, 0x80);
        machine.step().unwrap();
        assert_eq!(machine.registers.get(Reg::VF), 1);
    }

    #[test]
    fn call_and_return_round_trip() {
        let mut machine = machine_with_program(&[0x23, 0x00]);
        machine.memory.load(0x300, &[0x00, 0xEE]).unwrap();

        machine.step().unwrap();
        assert_eq!(machine.registers.pc, 0x300);
        assert_eq!(machine.stack.depth(), 1);

        machine.step().unwrap();
        assert_eq!(machine.registers.pc, 0x202);
        assert_eq!(machine.stack.depth(), 0);
    }

    #[test]
    fn call_overflows_after_sixteen_frames() {
        // A subroutine that calls itself
        let mut machine = machine_with_program(&[0x22, 0x00]);
        for _ in 0..16 {
            assert_eq!(machine.step(), Ok(Step::Executed));
        }
        assert_eq!(machine.step(), Err(Exception::StackOverflow));
    }

    #[test]
    fn return_with_an_empty_stack_underflows() {
        let mut machine = machine_with_program(&[0x00, 0xEE]);
        assert_eq!(machine.step(), Err(Exception::StackUnderflow));
    }

    #[test]
    fn draw_xors_sprites_and_reports_collisions() {
        // ld I, 0x300; drw V0, V1, 1; drw V0, V1, 1
        let mut machine = machine_with_program(&[0xA3, 0x00, 0xD0, 0x11, 0xD0, 0x11]);
        machine.memory.load(0x300, &[0xFF]).unwrap();

        machine.step().unwrap();
        assert!(!machine.needs_redraw());

        machine.step().unwrap();
        assert_eq!(machine.registers.get(Reg::VF), 0);
        for x in 0..8 {
            assert_eq!(machine.screen.pixel(x, 0), 1);
        }
        assert!(machine.take_redraw());
        assert!(!machine.needs_redraw());

        // Drawing the same sprite again erases it and sets the flag
        machine.step().unwrap();
        assert_eq!(machine.registers.get(Reg::VF), 1);
        for x in 0..8 {
            assert_eq!(machine.screen.pixel(x, 0), 0);
        }
        assert!(machine.needs_redraw());
    }

    #[test]
    fn bcd_writes_three_decimal_digits() {
        // ld I, 0x300; ld B, V4
        let mut machine = machine_with_program(&[0xA3, 0x00, 0xF4, 0x33]);
        machine.registers.set(Reg::V4, 255);
        machine.step().unwrap();
        machine.step().unwrap();
        assert_eq!(machine.memory.slice(0x300, 3).unwrap(), &[2, 5, 5]);

        let mut machine = machine_with_program(&[0xA3, 0x00, 0xF4, 0x33]);
        machine.registers.set(Reg::V4, 7);
        machine.step().unwrap();
        machine.step().unwrap();
        assert_eq!(machine.memory.slice(0x300, 3).unwrap(), &[0, 0, 7]);
    }

    #[test]
    fn store_and_load_registers_are_inclusive() {
        // ld I, 0x300; ld [I], V2
        let mut machine = machine_with_program(&[0xA3, 0x00, 0xF2, 0x55]);
        machine.registers.set(Reg::V0, 0x11);
        machine.registers.set(Reg::V1, 0x22);
        machine.registers.set(Reg::V2, 0x33);
        machine.registers.set(Reg::V3, 0x44);
        machine.step().unwrap();
        machine.step().unwrap();

        // V3 is past the named register and stays untouched in memory
        assert_eq!(machine.memory.slice(0x300, 4).unwrap(), &[0x11, 0x22, 0x33, 0]);

        // ld I, 0x300; ld V2, [I]
        let mut machine = machine_with_program(&[0xA3, 0x00, 0xF2, 0x65]);
        machine.memory.load(0x300, &[0xAA, 0xBB, 0xCC, 0xDD]).unwrap();
        machine.step().unwrap();
        machine.step().unwrap();

        assert_eq!(machine.registers.get(Reg::V0), 0xAA);
        assert_eq!(machine.registers.get(Reg::V1), 0xBB);
        assert_eq!(machine.registers.get(Reg::V2), 0xCC);
        assert_eq!(machine.registers.get(Reg::V3), 0);
    }

    #[test]
    fn wait_for_key_rewinds_until_a_key_is_pressed() {
        let mut machine = machine_with_program(&[0xF5, 0x0A]);

        assert_eq!(machine.step(), Ok(Step::AwaitingKey));
        assert_eq!(machine.registers.pc, 0x200);
        assert_eq!(machine.step(), Ok(Step::AwaitingKey));
        assert_eq!(machine.registers.pc, 0x200);

        machine.keypad.press(Key::try_from(0xB).unwrap());
        assert_eq!(machine.step(), Ok(Step::Executed));
        assert_eq!(machine.registers.get(Reg::V5), 0xB);
        assert_eq!(machine.registers.pc, 0x202);
    }

    #[test]
    fn wait_for_key_picks_the_lowest_pressed_code() {
        let mut machine = machine_with_program(&[0xF5, 0x0A]);
        machine.keypad.press(Key::try_from(0xC).unwrap());
        machine.keypad.press(Key::try_from(0x2).unwrap());

        machine.step().unwrap();
        assert_eq!(machine.registers.get(Reg::V5), 0x2);
    }

    #[test]
    fn key_skips_check_both_polarities() {
        // skp V1; sknp V1
        let mut machine = machine_with_program(&[0xE1, 0x9E, 0xE1, 0xA1]);
        machine.registers.set(Reg::V1, 0x4);

        // Not pressed: skp falls through, sknp skips
        machine.step().unwrap();
        assert_eq!(machine.registers.pc, 0x202);
        machine.step().unwrap();
        assert_eq!(machine.registers.pc, 0x206);

        let mut machine = machine_with_program(&[0xE1, 0x9E]);
        machine.registers.set(Reg::V1, 0x4);
        machine.keypad.press(Key::try_from(0x4).unwrap());
        machine.step().unwrap();
        assert_eq!(machine.registers.pc, 0x204);
    }

    #[test]
    fn key_skips_reject_codes_past_the_pad() {
        let mut machine = machine_with_program(&[0xE1, 0x9E]);
        machine.registers.set(Reg::V1, 0x10);
        assert_eq!(
            machine.step(),
            Err(Exception::Key(InvalidKey(0x10)))
        );
    }

    #[test]
    fn timers_decrement_and_floor_at_zero() {
        // ld DT, V2; ld ST, V3; ld V1, DT
        let mut machine = machine_with_program(&[0xF2, 0x15, 0xF3, 0x18, 0xF1, 0x07]);
        machine.registers.set(Reg::V2, 2);
        machine.registers.set(Reg::V3, 1);
        machine.step().unwrap();
        machine.step().unwrap();
        assert_eq!(machine.timers(), (2, 1));
        assert!(machine.sound_active());

        assert!(machine.tick());
        assert_eq!(machine.timers(), (1, 0));
        assert!(!machine.sound_active());

        assert!(!machine.tick());
        assert!(!machine.tick());
        assert_eq!(machine.timers(), (0, 0));

        machine.step().unwrap();
        assert_eq!(machine.registers.get(Reg::V1), 0);
    }

    #[test]
    fn loader_rejects_images_past_the_capacity() {
        let mut machine = Machine::with_rng(StepRng::new(0, 0));
        let image = vec![0xAA; MAX_PROGRAM_SIZE];
        machine.load_rom(&image).unwrap();
        assert_eq!(machine.memory.get(0xFFF).unwrap(), 0xAA);

        let mut machine = Machine::with_rng(StepRng::new(0, 0));
        let image = vec![0xAA; MAX_PROGRAM_SIZE + 1];
        assert!(matches!(
            machine.load_rom(&image),
            Err(LoadError::TooLarge { size: 3585, capacity: 3584 })
        ));
        // Nothing was copied
        assert_eq!(machine.memory.get(0x200).unwrap(), 0);
    }

    #[test]
    fn loader_reads_from_any_source() {
        let mut machine = Machine::with_rng(StepRng::new(0, 0));
        let image: &[u8] = &[0x6A, 0x05, 0x00, 0xE0];
        let size = machine.load_rom_from(image).unwrap();
        assert_eq!(size, 4);
        assert_eq!(machine.memory.read_opcode(0x200).unwrap(), 0x6A05);
    }

    #[test]
    fn fetch_past_the_address_space_faults() {
        let mut machine = Machine::with_rng(StepRng::new(0, 0));
        machine.registers.pc = 0xFFF;
        assert_eq!(machine.step(), Err(Exception::OutOfBounds(0xFFF)));
    }

    #[test]
    fn unknown_opcodes_skip_unless_strict() {
        // 5XY1 matches no pattern
        let mut machine = machine_with_program(&[0x50, 0x01]);
        assert_eq!(machine.step(), Ok(Step::Executed));
        assert_eq!(machine.registers.pc, 0x202);
        assert_eq!(machine.cycles, 1);

        let mut machine = machine_with_program(&[0x50, 0x01]);
        machine.set_strict(true);
        assert_eq!(machine.step(), Err(Exception::UnknownOpcode(0x5001)));
    }

    #[test]
    fn random_masks_the_drawn_byte() {
        let mut machine = Machine::with_rng(StepRng::new(0x53, 0));
        machine.load_rom(&[0xC1, 0x0F]).unwrap();
        machine.step().unwrap();
        assert_eq!(machine.registers.get(Reg::V1), 0x53 & 0x0F);
    }

    #[test]
    fn glyph_addresses_cover_the_whole_table() {
        let mut machine = machine_with_program(&[0xF1, 0x29]);
        for digit in 0..16_u8 {
            machine.registers.pc = 0x200;
            machine.registers.set(Reg::V1, digit);
            machine.step().unwrap();
            assert_eq!(
                machine.registers.i,
                FONT_START + u16::from(digit) * GLYPH_SIZE
            );
            assert!(machine.memory.slice(machine.registers.i, 5).is_ok());
        }
    }

    #[test]
    fn drawing_a_glyph_renders_its_shape() {
        // ld F, V0; drw V1, V2, 5
        let mut machine = machine_with_program(&[0xF0, 0x29, 0xD1, 0x25]);
        machine.step().unwrap();
        machine.step().unwrap();

        let rendered = machine.screen.to_string();
        let top = rendered
            .lines()
            .take(5)
            .map(|line| &line[..8])
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(
            top,
            indoc! {"
                ####....
                #..#....
                #..#....
                #..#....
                ####...."}
        );
    }

    #[test]
    fn add_to_index_is_not_masked_to_twelve_bits() {
        // ld I, 0xfff; add I, V1; drw V0, V0, 1
        let mut machine = machine_with_program(&[0xAF, 0xFF, 0xF1, 0x1E, 0xD0, 0x01]);
        machine.registers.set(Reg::V1, 0x10);
        machine.step().unwrap();
        machine.step().unwrap();
        assert_eq!(machine.registers.i, 0x100F);

        // Dereferencing the out-of-range index is reported, not wrapped
        assert_eq!(
            machine.step(),
            Err(Exception::InvalidMemoryAccess(MemoryError::InvalidAddress(
                0x100F
            )))
        );
    }

    #[test]
    fn jumps_and_immediate_skips_move_the_program_counter() {
        let mut machine = machine_with_program(&[0x12, 0x06]);
        machine.step().unwrap();
        assert_eq!(machine.registers.pc, 0x206);

        // jp V0, 0x204 with V0 = 4
        let mut machine = machine_with_program(&[0xB2, 0x04]);
        machine.registers.set(Reg::V0, 4);
        machine.step().unwrap();
        assert_eq!(machine.registers.pc, 0x208);

        // se V1, 0x05 skips when equal
        let mut machine = machine_with_program(&[0x31, 0x05, 0x31, 0x06]);
        machine.registers.set(Reg::V1, 0x05);
        machine.step().unwrap();
        assert_eq!(machine.registers.pc, 0x204);
        machine.step().unwrap();
        assert_eq!(machine.registers.pc, 0x206);
    }

    #[test]
    fn clear_screen_wipes_the_frame_buffer() {
        let mut machine = machine_with_program(&[0x00, 0xE0]);
        machine.screen.blit(0, 0, &[0xFF]);
        machine.step().unwrap();
        assert!(machine.screen.pixels().iter().all(|&pixel| pixel == 0));
        assert!(machine.needs_redraw());
    }
}
