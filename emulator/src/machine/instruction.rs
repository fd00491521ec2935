use tracing::debug;

use crate::constants as C;

use super::exception::Exception;
use super::keypad::Key;
use super::registers::Reg;
use super::{Machine, Step};

/// One decoded instruction, a variant per opcode pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Turn every pixel off (`00E0`)
    ClearScreen,

    /// Pop the call stack and return (`00EE`)
    Return,

    /// Unconditional jump (`1NNN`)
    Jump(u16),

    /// Push the return address and jump (`2NNN`)
    Call(u16),

    /// Skip the next instruction if `VX == NN` (`3XNN`)
    SkipEqImm(Reg, u8),

    /// Skip the next instruction if `VX != NN` (`4XNN`)
    SkipNeImm(Reg, u8),

    /// Skip the next instruction if `VX == VY` (`5XY0`)
    SkipEqReg(Reg, Reg),

    /// Load an immediate into a register (`6XNN`)
    LoadImm(Reg, u8),

    /// Add an immediate to a register, wrapping, no flag (`7XNN`)
    AddImm(Reg, u8),

    /// Copy `VY` into `VX` (`8XY0`)
    Move(Reg, Reg),

    /// Bitwise `or` of two registers (`8XY1`)
    Or(Reg, Reg),

    /// Bitwise `and` of two registers (`8XY2`)
    And(Reg, Reg),

    /// Bitwise `xor` of two registers (`8XY3`)
    Xor(Reg, Reg),

    /// `VX += VY`, `VF` holds the carry (`8XY4`)
    Add(Reg, Reg),

    /// `VX -= VY`, `VF` set when no borrow occurs (`8XY5`)
    Sub(Reg, Reg),

    /// Shift `VX` right by one, `VF` holds the shifted-out bit (`8XY6`)
    ShiftRight(Reg),

    /// `VX = VY - VX`, `VF` set when no borrow occurs (`8XY7`)
    SubReverse(Reg, Reg),

    /// Shift `VX` left by one, `VF` holds the shifted-out bit (`8XYE`)
    ShiftLeft(Reg),

    /// Skip the next instruction if `VX != VY` (`9XY0`)
    SkipNeReg(Reg, Reg),

    /// Load an address into the index register (`ANNN`)
    SetIndex(u16),

    /// Jump to an address offset by `V0` (`BNNN`)
    JumpOffset(u16),

    /// Load a random byte masked by an immediate (`CXNN`)
    Random(Reg, u8),

    /// Draw an N-row sprite at `(VX, VY)`, `VF` reports collisions (`DXYN`)
    Draw(Reg, Reg, u8),

    /// Skip the next instruction if the key in `VX` is pressed (`EX9E`)
    SkipKeyPressed(Reg),

    /// Skip the next instruction if the key in `VX` is not pressed (`EXA1`)
    SkipKeyReleased(Reg),

    /// Read the delay timer into a register (`FX07`)
    GetDelay(Reg),

    /// Block until a key is pressed, storing its code (`FX0A`)
    WaitKey(Reg),

    /// Set the delay timer from a register (`FX15`)
    SetDelay(Reg),

    /// Set the sound timer from a register (`FX18`)
    SetSound(Reg),

    /// Add a register to the index register (`FX1E`)
    AddIndex(Reg),

    /// Point the index register at the glyph for the digit in `VX` (`FX29`)
    GlyphAddress(Reg),

    /// Write the decimal digits of `VX` to memory at the index (`FX33`)
    StoreBcd(Reg),

    /// Copy `V0..=VX` into memory at the index (`FX55`)
    StoreRegisters(Reg),

    /// Fill `V0..=VX` from memory at the index (`FX65`)
    LoadRegisters(Reg),
}

impl Instruction {
    /// Decode an opcode, returning `None` when no pattern matches.
    ///
    /// Only canonical patterns decode: `5XY0`/`9XY0` require a zero low
    /// nibble and the `0`/`8`/`E`/`F` families must match their
    /// sub-patterns exactly.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn decode(opcode: u16) -> Option<Self> {
        use Instruction::*;

        let x = Reg::from_index((opcode >> 8) as u8 & 0xF);
        let y = Reg::from_index((opcode >> 4) as u8 & 0xF);
        let address = opcode & 0x0FFF;
        let byte = (opcode & 0x00FF) as u8;
        let nibble = (opcode & 0x000F) as u8;

        match opcode >> 12 {
            0x0 => match opcode {
                0x00E0 => Some(ClearScreen),
                0x00EE => Some(Return),
                _ => None,
            },
            0x1 => Some(Jump(address)),
            0x2 => Some(Call(address)),
            0x3 => Some(SkipEqImm(x, byte)),
            0x4 => Some(SkipNeImm(x, byte)),
            0x5 if nibble == 0 => Some(SkipEqReg(x, y)),
            0x6 => Some(LoadImm(x, byte)),
            0x7 => Some(AddImm(x, byte)),
            0x8 => match nibble {
                0x0 => Some(Move(x, y)),
                0x1 => Some(Or(x, y)),
                0x2 => Some(And(x, y)),
                0x3 => Some(Xor(x, y)),
                0x4 => Some(Add(x, y)),
                0x5 => Some(Sub(x, y)),
                0x6 => Some(ShiftRight(x)),
                0x7 => Some(SubReverse(x, y)),
                0xE => Some(ShiftLeft(x)),
                _ => None,
            },
            0x9 if nibble == 0 => Some(SkipNeReg(x, y)),
            0xA => Some(SetIndex(address)),
            0xB => Some(JumpOffset(address)),
            0xC => Some(Random(x, byte)),
            0xD => Some(Draw(x, y, nibble)),
            0xE => match byte {
                0x9E => Some(SkipKeyPressed(x)),
                0xA1 => Some(SkipKeyReleased(x)),
                _ => None,
            },
            0xF => match byte {
                0x07 => Some(GetDelay(x)),
                0x0A => Some(WaitKey(x)),
                0x15 => Some(SetDelay(x)),
                0x18 => Some(SetSound(x)),
                0x1E => Some(AddIndex(x)),
                0x29 => Some(GlyphAddress(x)),
                0x33 => Some(StoreBcd(x)),
                0x55 => Some(StoreRegisters(x)),
                0x65 => Some(LoadRegisters(x)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Execute the instruction
    #[tracing::instrument(skip(machine), level = "debug")]
    pub(crate) fn execute(&self, machine: &mut Machine) -> Result<Step, Exception> {
        use Instruction::*;

        match self {
            ClearScreen => {
                machine.screen.clear();
                machine.redraw = true;
            }

            Return => {
                let address = machine.stack.pop()?;
                debug!("returning to {address:#05x}");
                machine.registers.pc = address;
            }

            Jump(address) => {
                machine.registers.pc = *address;
            }

            Call(address) => {
                machine.stack.push(machine.registers.pc)?;
                debug!("calling subroutine at {address:#05x}");
                machine.registers.pc = *address;
            }

            SkipEqImm(x, byte) => {
                if machine.registers.get(*x) == *byte {
                    machine.registers.pc += 2;
                }
            }

            SkipNeImm(x, byte) => {
                if machine.registers.get(*x) != *byte {
                    machine.registers.pc += 2;
                }
            }

            SkipEqReg(x, y) => {
                if machine.registers.get(*x) == machine.registers.get(*y) {
                    machine.registers.pc += 2;
                }
            }

            LoadImm(x, byte) => {
                machine.registers.set(*x, *byte);
            }

            AddImm(x, byte) => {
                let value = machine.registers.get(*x).wrapping_add(*byte);
                machine.registers.set(*x, value);
            }

            Move(x, y) => {
                let value = machine.registers.get(*y);
                machine.registers.set(*x, value);
            }

            Or(x, y) => {
                let value = machine.registers.get(*x) | machine.registers.get(*y);
                machine.registers.set(*x, value);
            }

            And(x, y) => {
                let value = machine.registers.get(*x) & machine.registers.get(*y);
                machine.registers.set(*x, value);
            }

            Xor(x, y) => {
                let value = machine.registers.get(*x) ^ machine.registers.get(*y);
                machine.registers.set(*x, value);
            }

            // The flag is written after the result so that VF holds the
            // flag when it is also the destination
            Add(x, y) => {
                let a = machine.registers.get(*x);
                let b = machine.registers.get(*y);
                let (result, carry) = a.overflowing_add(b);
                machine.registers.set(*x, result);
                machine.registers.set_flag(u8::from(carry));
            }

            Sub(x, y) => {
                let a = machine.registers.get(*x);
                let b = machine.registers.get(*y);
                machine.registers.set(*x, a.wrapping_sub(b));
                machine.registers.set_flag(u8::from(a >= b));
            }

            ShiftRight(x) => {
                let value = machine.registers.get(*x);
                machine.registers.set(*x, value >> 1);
                machine.registers.set_flag(value & 1);
            }

            SubReverse(x, y) => {
                let a = machine.registers.get(*x);
                let b = machine.registers.get(*y);
                machine.registers.set(*x, b.wrapping_sub(a));
                machine.registers.set_flag(u8::from(b >= a));
            }

            ShiftLeft(x) => {
                let value = machine.registers.get(*x);
                machine.registers.set(*x, value << 1);
                machine.registers.set_flag(value >> 7);
            }

            SkipNeReg(x, y) => {
                if machine.registers.get(*x) != machine.registers.get(*y) {
                    machine.registers.pc += 2;
                }
            }

            SetIndex(address) => {
                machine.registers.i = *address;
            }

            JumpOffset(address) => {
                machine.registers.pc = address + u16::from(machine.registers.get(Reg::V0));
            }

            Random(x, mask) => {
                let value = machine.random_byte() & mask;
                machine.registers.set(*x, value);
            }

            Draw(x, y, rows) => {
                let x0 = machine.registers.get(*x);
                let y0 = machine.registers.get(*y);
                machine.registers.set_flag(0);
                let sprite = machine.memory.slice(machine.registers.i, usize::from(*rows))?;
                let collision = machine.screen.blit(x0, y0, sprite);
                machine.registers.set_flag(u8::from(collision));
                machine.redraw = true;
                debug!(x = x0, y = y0, rows = *rows, collision, "sprite drawn");
            }

            SkipKeyPressed(x) => {
                let key = Key::try_from(machine.registers.get(*x))?;
                if machine.keypad.is_pressed(key) {
                    machine.registers.pc += 2;
                }
            }

            SkipKeyReleased(x) => {
                let key = Key::try_from(machine.registers.get(*x))?;
                if !machine.keypad.is_pressed(key) {
                    machine.registers.pc += 2;
                }
            }

            GetDelay(x) => {
                machine.registers.set(*x, machine.delay_timer);
            }

            WaitKey(x) => {
                return Ok(match machine.keypad.first_pressed() {
                    Some(key) => {
                        machine.registers.set(*x, key.code());
                        Step::Executed
                    }
                    None => {
                        // Rewind past the fetch so the same opcode runs
                        // again on the next step
                        machine.registers.pc -= 2;
                        Step::AwaitingKey
                    }
                });
            }

            SetDelay(x) => {
                machine.delay_timer = machine.registers.get(*x);
            }

            SetSound(x) => {
                machine.sound_timer = machine.registers.get(*x);
            }

            // The index register is left unmasked past 12 bits; some
            // programs rely on the overflow, and any later dereference
            // outside the address space is reported by the checked
            // memory accessors
            AddIndex(x) => {
                let value = machine.registers.get(*x);
                machine.registers.i = machine.registers.i.wrapping_add(u16::from(value));
            }

            GlyphAddress(x) => {
                let digit = machine.registers.get(*x);
                machine.registers.i = C::FONT_START + u16::from(digit) * C::GLYPH_SIZE;
            }

            StoreBcd(x) => {
                let value = machine.registers.get(*x);
                let cells = machine.memory.slice_mut(machine.registers.i, 3)?;
                cells[0] = value / 100;
                cells[1] = (value / 10) % 10;
                cells[2] = value % 10;
            }

            StoreRegisters(x) => {
                let count = x.index() + 1;
                let cells = machine.memory.slice_mut(machine.registers.i, count)?;
                for (cell, reg) in cells.iter_mut().zip(Reg::ALL) {
                    *cell = machine.registers.get(reg);
                }
            }

            LoadRegisters(x) => {
                let count = x.index() + 1;
                let cells = machine.memory.slice(machine.registers.i, count)?;
                for (&cell, reg) in cells.iter().zip(Reg::ALL) {
                    machine.registers.set(reg, cell);
                }
            }
        };

        Ok(Step::Executed)
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Instruction::*;

        match self {
            ClearScreen => write!(f, "cls"),
            Return => write!(f, "ret"),
            Jump(address) => write!(f, "jp   {address:#05x}"),
            Call(address) => write!(f, "call {address:#05x}"),
            SkipEqImm(x, byte) => write!(f, "se   {x}, {byte:#04x}"),
            SkipNeImm(x, byte) => write!(f, "sne  {x}, {byte:#04x}"),
            SkipEqReg(x, y) => write!(f, "se   {x}, {y}"),
            LoadImm(x, byte) => write!(f, "ld   {x}, {byte:#04x}"),
            AddImm(x, byte) => write!(f, "add  {x}, {byte:#04x}"),
            Move(x, y) => write!(f, "ld   {x}, {y}"),
            Or(x, y) => write!(f, "or   {x}, {y}"),
            And(x, y) => write!(f, "and  {x}, {y}"),
            Xor(x, y) => write!(f, "xor  {x}, {y}"),
            Add(x, y) => write!(f, "add  {x}, {y}"),
            Sub(x, y) => write!(f, "sub  {x}, {y}"),
            ShiftRight(x) => write!(f, "shr  {x}"),
            SubReverse(x, y) => write!(f, "subn {x}, {y}"),
            ShiftLeft(x) => write!(f, "shl  {x}"),
            SkipNeReg(x, y) => write!(f, "sne  {x}, {y}"),
            SetIndex(address) => write!(f, "ld   I, {address:#05x}"),
            JumpOffset(address) => write!(f, "jp   V0, {address:#05x}"),
            Random(x, mask) => write!(f, "rnd  {x}, {mask:#04x}"),
            Draw(x, y, rows) => write!(f, "drw  {x}, {y}, {rows}"),
            SkipKeyPressed(x) => write!(f, "skp  {x}"),
            SkipKeyReleased(x) => write!(f, "sknp {x}"),
            GetDelay(x) => write!(f, "ld   {x}, DT"),
            WaitKey(x) => write!(f, "ld   {x}, K"),
            SetDelay(x) => write!(f, "ld   DT, {x}"),
            SetSound(x) => write!(f, "ld   ST, {x}"),
            AddIndex(x) => write!(f, "add  I, {x}"),
            GlyphAddress(x) => write!(f, "ld   F, {x}"),
            StoreBcd(x) => write!(f, "ld   B, {x}"),
            StoreRegisters(x) => write!(f, "ld   [I], {x}"),
            LoadRegisters(x) => write!(f, "ld   {x}, [I]"),
        }
    }
}
