use parse_display::Display;
use thiserror::Error;

use crate::constants::PROGRAM_START;

/// General purpose register names, one per 4-bit index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "UPPERCASE")]
pub enum Reg {
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    VA,
    VB,
    VC,
    VD,
    VE,

    /// Also the flag output of the arithmetic and draw opcodes
    VF,
}

impl Reg {
    /// All registers in index order
    pub const ALL: [Reg; 16] = [
        Reg::V0,
        Reg::V1,
        Reg::V2,
        Reg::V3,
        Reg::V4,
        Reg::V5,
        Reg::V6,
        Reg::V7,
        Reg::V8,
        Reg::V9,
        Reg::VA,
        Reg::VB,
        Reg::VC,
        Reg::VD,
        Reg::VE,
        Reg::VF,
    ];

    /// The register designated by the low four bits of `index`
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        Self::ALL[(index & 0xF) as usize]
    }

    /// Position of this register in the register file
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Error, Debug)]
#[error("could not parse register")]
pub struct RegisterParseError;

impl std::str::FromStr for Reg {
    type Err = RegisterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_lowercase();
        let code = s.strip_prefix('v').ok_or(RegisterParseError)?;
        if code.len() != 1 {
            return Err(RegisterParseError);
        }
        let index = u8::from_str_radix(code, 16).map_err(|_| RegisterParseError)?;
        Ok(Reg::from_index(index))
    }
}

/// Register file: sixteen 8-bit general registers plus the index register
/// and the program counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    v: [u8; 16],

    /// Index register, holds the memory address used by the block and
    /// sprite opcodes
    pub i: u16,

    /// Address of the next instruction
    pub pc: u16,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            v: [0; 16],
            i: 0,
            pc: PROGRAM_START,
        }
    }
}

impl Registers {
    #[must_use]
    pub fn get(&self, reg: Reg) -> u8 {
        self.v[reg.index()]
    }

    pub fn set(&mut self, reg: Reg, value: u8) {
        self.v[reg.index()] = value;
    }

    /// Overwrite the flag register (`VF`)
    pub fn set_flag(&mut self, value: u8) {
        self.v[Reg::VF.index()] = value;
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, value) in self.v.iter().enumerate() {
            write!(f, "V{index:X}={value:02X} ")?;
        }
        write!(f, "| I={:04X} PC={:04X}", self.i, self.pc)
    }
}
