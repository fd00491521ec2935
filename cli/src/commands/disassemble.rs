use camino::Utf8PathBuf;
use chip8_emulator::constants::PROGRAM_START;
use chip8_emulator::machine::Instruction;
use clap::{Parser, ValueHint};

#[derive(Parser, Debug)]
pub struct DisassembleOpt {
    /// Program image to disassemble
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,
}

impl DisassembleOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        let image = std::fs::read(&self.input)?;

        for (offset, pair) in image.chunks(2).enumerate() {
            // A trailing odd byte is padded with zero
            let opcode = (u16::from(pair[0]) << 8) | u16::from(*pair.get(1).unwrap_or(&0));
            let address = usize::from(PROGRAM_START) + offset * 2;

            match Instruction::decode(opcode) {
                Some(instruction) => println!("{address:#05x}    {instruction}"),
                None => println!("{address:#05x}    .word {opcode:#06x}"),
            }
        }

        Ok(())
    }
}
