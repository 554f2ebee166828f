use std::fs;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, LevelFilter};
use nes_core::{Bus, Cartridge, Cpu};

/// Headless nestest-style CPU driver: loads an iNES image, runs it to
/// completion (STP or a fatal error), and reports the automation-test
/// result codes nestest leaves at $0002/$0003.
#[derive(Parser, Debug)]
#[command(name = "nestest")]
struct Args {
    /// Path to an iNES (.nes) ROM image.
    rom: String,

    /// Override the RESET vector and start execution at $C000, the
    /// convention nestest's automation mode expects.
    #[arg(long)]
    headless: bool,

    /// Print a disassembly trace line to stdout for every instruction.
    #[arg(short, long)]
    verbose: bool,

    /// Abort after this many instructions, to guarantee termination on a
    /// misbehaving ROM instead of looping forever.
    #[arg(long, default_value_t = 10_000_000)]
    max_instructions: u64,
}

fn setup_logging(verbose: bool) -> Result<(), fern::InitError> {
    let level = if verbose { LevelFilter::Trace } else { LevelFilter::Info };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}][{}] {}", record.target(), record.level(), message))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if setup_logging(args.verbose).is_err() {
        eprintln!("logger setup failed");
    }

    let data = match fs::read(&args.rom) {
        Ok(data) => data,
        Err(e) => {
            error!("failed to read {}: {}", args.rom, e);
            return ExitCode::FAILURE;
        }
    };

    let cartridge = match Cartridge::load(&data) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load cartridge: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut bus = Bus::new(cartridge);
    let mut cpu = Cpu::power_on(&mut bus);
    if args.headless {
        cpu.pc = 0xC000;
    }

    let mut instructions = 0u64;
    while !cpu.halted {
        if args.verbose {
            println!("{}", nes_core::trace::trace_line(&cpu, &bus));
        }
        match cpu.step(&mut bus) {
            Ok(_) => {}
            Err(e) => {
                error!("fatal error at pc={:04x}: {}", cpu.pc, e);
                return ExitCode::FAILURE;
            }
        }
        instructions += 1;
        if instructions >= args.max_instructions {
            error!("aborted after {} instructions without halting", instructions);
            return ExitCode::FAILURE;
        }
    }

    let code2 = bus.peek8(0x0002);
    let code3 = bus.peek8(0x0003);
    info!(
        "halted at pc={:04x} last_brk_operand={:02x} $0002={:02x} $0003={:02x}",
        cpu.pc, cpu.last_brk_operand, code2, code3
    );

    if code2 == 0 && code3 == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
