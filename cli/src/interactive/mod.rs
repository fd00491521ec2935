//! This module implements the TTY interactive interface.
//!
//! It is mainly based on two crates:
//!   - rustyline, to handle the line-editting logic
//!   - clap, to handle the parsing of those interactive commands
//!
//! Using Parser to do this is a bit of a hack, and requires some weird options
//! to have it working but works nonetheless.

use std::collections::HashSet;

use chip8_emulator::machine::{Instruction, Key, Reg};
use chip8_emulator::{Machine, Step};
use clap::Parser;
use rustyline::{Behavior, CompletionType, Config, DefaultEditor, EditMode};
use tracing::{debug, info, warn};

static HELP: &str = r#"
Run "help [command]" for command-specific help.
An empty line re-runs the last valid command."#;

#[derive(Parser, Clone, Debug)]
#[clap(
    help_template = "{about}\n\nCOMMANDS:\n{subcommands}\n{after-help}",
    after_help = HELP,
    disable_version_flag = true,
    infer_subcommands = true,
    no_binary_name = true,
)]
/// Interactive mode commands
enum Command {
    /// Execute the next instructions
    #[clap(alias = "s")]
    Step {
        /// Number of steps to execute
        #[clap(value_parser, default_value = "1")]
        number: u64,
    },

    /// Decrement the timers, as a 60 Hz frame would
    Tick {
        /// Number of ticks to apply
        #[clap(value_parser, default_value = "1")]
        number: u64,
    },

    /// Show the state of registers
    Registers {
        #[clap(value_parser)]
        register: Option<Reg>,
    },

    /// Show the content of a block in memory
    Memory {
        /// The address to show, decimal or 0x-prefixed hexadecimal
        #[clap(value_parser = parse_address)]
        address: u16,

        /// Number of bytes to show
        #[clap(value_parser, default_value = "8")]
        number: u16,
    },

    /// Render the frame buffer
    Screen,

    /// Press a keypad key
    Press {
        /// The key to press, a single hexadecimal digit
        #[clap(value_parser)]
        key: Key,
    },

    /// Release a keypad key
    Release {
        /// The key to release, a single hexadecimal digit
        #[clap(value_parser)]
        key: Key,
    },

    /// Show the next few instructions
    List {
        /// Number of instructions to show
        #[clap(value_parser, default_value = "10")]
        number: u16,
    },

    /// Set a breakpoint
    Break {
        /// The address where to set the breakpoint
        #[clap(value_parser = parse_address)]
        address: u16,
    },

    /// Remove a breakpoint
    Unbreak {
        /// The address of the breakpoint to remove
        #[clap(value_parser = parse_address)]
        address: u16,
    },

    /// Run until the next breakpoint, fault or key wait
    Continue,

    /// Exit the emulator
    Exit,
}

fn parse_address(s: &str) -> Result<u16, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x") {
        u16::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| e.to_string())
}

/// Holds informations about a interactive session
#[derive(Debug, Default)]
struct Session {
    /// List of active breakpoints
    breakpoints: HashSet<u16>,

    /// Current address for the `list` command
    list_address: Option<u16>,
}

impl Session {
    /// Add a breakpoint
    fn add_breakpoint(&mut self, address: u16) {
        if self.breakpoints.insert(address) {
            info!(address = format_args!("{address:#05x}"), "Setting a breakpoint");
        } else {
            warn!(address = format_args!("{address:#05x}"), "A breakpoint was already set");
        }
    }

    /// Remove a breakpoint
    fn remove_breakpoint(&mut self, address: u16) {
        if self.breakpoints.remove(&address) {
            info!(address = format_args!("{address:#05x}"), "Removing breakpoint");
        } else {
            warn!(address = format_args!("{address:#05x}"), "No breakpoint was set here");
        }
    }

    /// Checks if the given address has a breakpoint
    fn has_breakpoint(&self, address: u16) -> bool {
        self.breakpoints.contains(&address)
    }

    /// Reset the `list` command (after running an instruction)
    fn reset_list(&mut self) {
        self.list_address = None;
    }

    /// Offset the `list` command, returns the address to show.
    ///
    /// Each listed instruction is two bytes wide.
    fn offset_list(&mut self, machine: &Machine, number: u16) -> u16 {
        let addr = self.list_address.unwrap_or(machine.registers.pc);
        self.list_address = Some(addr.saturating_add(number.saturating_mul(2)));
        addr
    }

    /// Display an instruction at specified address
    fn display_instruction(&self, machine: &Machine, address: u16) {
        let is_current_line = machine.registers.pc == address;
        let has_breakpoint = self.has_breakpoint(address);

        let gutter = match (has_breakpoint, is_current_line) {
            (true, true) => "B>",
            (true, false) => "B ",
            (false, true) => " >",
            (false, false) => "  ",
        };

        // This will be `None` if the address is too high or the opcode
        // matches no pattern
        let instruction = machine
            .memory
            .read_opcode(address)
            .ok()
            .and_then(Instruction::decode);

        if let Some(instruction) = instruction {
            info!("{:<2} {:#05x}    {}", gutter, address, instruction);
        } else {
            info!("{:<2} {:#05x}    –", gutter, address);
        }
    }
}

#[allow(clippy::too_many_lines)]
pub(crate) fn run_interactive(machine: &mut Machine) -> anyhow::Result<()> {
    info!("Running in interactive mode. Type \"help\" to list available commands.");
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .behavior(Behavior::PreferTerm)
        .auto_add_history(true)
        .build();

    let mut session = Session::default();
    let mut rl = DefaultEditor::with_config(config)?;

    let mut last_command: Option<Command> = None;
    let mut halted = false;

    'read: loop {
        // A macro to unwrap an error, log it and continue the loop
        macro_rules! warn_and_continue {
            ($e:expr) => {
                match $e {
                    Ok(o) => o,
                    Err(e) => {
                        tracing::warn!(error = %e);
                        continue 'read;
                    }
                }
            };
        }

        let Ok(readline) = rl.readline(">> ") else {
            info!("EOF, exitting");
            return Ok(());
        };

        let command = if readline.is_empty() {
            if let Some(command) = &last_command {
                command.clone()
            } else {
                info!("Type \"help\" to get the list of available commands");
                continue 'read;
            }
        } else {
            let Ok(words) = shell_words::split(readline.as_str()) else {
                warn!("Invalid input");
                continue 'read;
            };

            let command = warn_and_continue!(Command::try_parse_from(words));
            last_command = Some(command.clone());
            command
        };

        debug!("Executing command: {:?}", command);

        match (command, halted) {
            (Command::Exit, _) => break,
            (Command::Step { number }, false) => {
                session.reset_list();

                for _ in 0..number {
                    match machine.step() {
                        Ok(Step::Executed) => {}
                        Ok(Step::AwaitingKey) => {
                            info!("Waiting for a key press");
                            break;
                        }
                        Err(e) => {
                            warn!(error = &e as &dyn std::error::Error, "Halted");
                            halted = true;
                            continue 'read;
                        }
                    }
                }
            }

            (Command::Tick { number }, false) => {
                for _ in 0..number {
                    machine.tick();
                }
                let (delay, sound) = machine.timers();
                info!(delay, sound, "Timers");
            }

            (Command::Registers { register }, _) => {
                if let Some(reg) = register {
                    let value = machine.registers.get(reg);
                    info!("Register {} = {:#04x}", reg, value);
                } else {
                    info!("Registers: {}", machine.registers);
                }
            }

            (Command::Memory { address, number }, _) => {
                let bytes =
                    warn_and_continue!(machine.memory.slice(address, usize::from(number)));
                for (address, byte) in (address..).zip(bytes) {
                    info!("{:#05x}    {:#04x}", address, byte);
                }
            }

            (Command::Screen, _) => {
                for line in machine.screen.to_string().lines() {
                    info!("{}", line);
                }
            }

            (Command::Press { key }, false) => {
                machine.keypad.press(key);
                info!(%key, "Key pressed");
            }

            (Command::Release { key }, false) => {
                machine.keypad.release(key);
                info!(%key, "Key released");
            }

            (Command::List { number }, _) => {
                let addr = session.offset_list(machine, number);
                for i in 0..number {
                    session.display_instruction(machine, addr.saturating_add(i * 2));
                }
            }

            (Command::Break { address }, false) => {
                session.add_breakpoint(address);
            }

            (Command::Unbreak { address }, false) => {
                session.remove_breakpoint(address);
            }

            (Command::Continue, false) => {
                session.reset_list();

                loop {
                    match machine.step() {
                        Ok(Step::Executed) => {}
                        Ok(Step::AwaitingKey) => {
                            // Stepping again would spin on the same opcode
                            info!("Waiting for a key press");
                            break;
                        }
                        Err(e) => {
                            warn!(error = &e as &dyn std::error::Error, "Halted");
                            halted = true;
                            continue 'read;
                        }
                    }

                    if session.has_breakpoint(machine.registers.pc) {
                        info!(
                            address = format_args!("{:#05x}", machine.registers.pc),
                            "Stopped at a breakpoint"
                        );
                        break;
                    }
                }
            }

            (_, true) => {
                // Machine is halted but the user asked to continue, we just warn
                warn!("Machine is halted. Use \"exit\" to quit");
            }
        }
    }

    Ok(())
}
