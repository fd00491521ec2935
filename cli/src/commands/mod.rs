mod completion;
mod disassemble;
mod run;

#[derive(clap::Subcommand)]
pub enum Subcommand {
    /// Load a program image and run it
    Run(self::run::RunOpt),

    /// Print the instructions of a program image
    Disassemble(self::disassemble::DisassembleOpt),

    /// Generate shell completion scripts
    Completion(self::completion::CompletionOpt),
}

impl Subcommand {
    /// Run a subcommand
    pub fn exec(self) -> anyhow::Result<()> {
        match self {
            Subcommand::Run(opt) => opt.exec(),
            Subcommand::Disassemble(opt) => opt.exec(),
            Subcommand::Completion(opt) => opt.exec(),
        }
    }
}
