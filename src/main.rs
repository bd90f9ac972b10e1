//! LS-8 Emulator - CLI Entry Point
//!
//! Commands:
//! - `ls8-emu run <program>` - Run an `.ls8` or `.asm` file
//! - `ls8-emu asm <source>` - Assemble to `.ls8`
//! - `ls8-emu disasm <program>` - Disassemble an `.ls8` file

use clap::{Parser, Subcommand};
use ls8::{Cpu, Output};

#[derive(Parser)]
#[command(name = "ls8-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of the LS-8 8-bit microcomputer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the .ls8 or .asm file to execute
        program: String,
        /// Maximum number of cycles to run (default: 10000)
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Show a trace line before each instruction
        #[arg(short, long)]
        trace: bool,
        /// Dump the final machine state as JSON
        #[arg(short, long)]
        dump_state: bool,
    },
    /// Assemble source to .ls8
    Asm {
        /// Path to the source file
        source: String,
        /// Output .ls8 file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble .ls8 to readable text
    Disasm {
        /// Path to the .ls8 file
        program: String,
    },
}

/// PRN sink that renders each value as a decimal line on stdout.
struct StdoutOutput;

impl Output for StdoutOutput {
    fn emit(&mut self, value: u8) {
        println!("{}", value);
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { program, max_cycles, trace, dump_state } => {
            run_program(&program, max_cycles, trace, dump_state);
        }
        Commands::Asm { source, output } => {
            assemble_file(&source, output);
        }
        Commands::Disasm { program } => {
            disassemble_file(&program);
        }
    }
}

/// Load a program's bytes, assembling first when given an `.asm` file.
fn load_bytes(path: &str) -> Vec<u8> {
    if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("failed to read file: {}", e);
                std::process::exit(1);
            }
        };

        match ls8::assemble(&source) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match ls8::load_program_file(path) {
            Ok(program) => program.bytes,
            Err(e) => {
                eprintln!("failed to load program: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_program(path: &str, max_cycles: u64, trace: bool, dump_state: bool) {
    let bytes = load_bytes(path);

    if bytes.is_empty() {
        eprintln!("no instructions to execute");
        std::process::exit(1);
    }

    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_program(&bytes) {
        eprintln!("failed to load program: {}", e);
        std::process::exit(1);
    }

    let mut out = StdoutOutput;
    let mut cycles = 0u64;

    while cpu.is_running() && cycles < max_cycles {
        if trace {
            eprintln!("{}", cpu.trace());
        }

        let pc = cpu.regs.pc;
        if let Err(e) = cpu.step(&mut out) {
            eprintln!("CPU error at PC={:#04x}: {}", pc, e);
            std::process::exit(1);
        }
        cycles += 1;
    }

    if cycles >= max_cycles && cpu.is_running() {
        eprintln!(
            "reached max cycles limit ({}); use --max-cycles to increase",
            max_cycles
        );
        std::process::exit(1);
    }

    if dump_state {
        match serde_json::to_string_pretty(&cpu) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("failed to serialize machine state: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn assemble_file(source_path: &str, output: Option<String>) {
    let out_path = output.unwrap_or_else(|| source_path.replace(".asm", ".ls8"));

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    let bytes = match ls8::assemble(&source) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("assembly error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = ls8::save_program_file(&out_path, &bytes) {
        eprintln!("failed to save program: {}", e);
        std::process::exit(1);
    }

    println!("assembled {} bytes to {}", bytes.len(), out_path);
}

fn disassemble_file(path: &str) {
    let bytes = load_bytes(path);
    print!("{}", ls8::disassemble(&bytes));
}
