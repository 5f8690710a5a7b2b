#[macro_use]
mod console;
mod programs;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use kernel_core::{KernelConfig, Policy, DEFAULT_FRAME_SIZE};
use log::LevelFilter;
use platform_sim::{Machine, MachineConfig};

use programs::ProgramSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    Fcfs,
    Rr,
    Priority,
    PriorityNp,
}

/// Interrupt-driven kernel emulator with pluggable CPU scheduling and paged memory
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scheduling policy
    #[arg(long, value_enum, default_value = "fcfs")]
    policy: PolicyArg,

    /// Round-Robin time slice in ticks
    #[arg(long, default_value_t = 3)]
    quantum: u32,

    /// Memory size in cells
    #[arg(long, default_value_t = 32)]
    memory_size: usize,

    /// Cells per frame
    #[arg(long, default_value_t = DEFAULT_FRAME_SIZE)]
    frame_size: usize,

    /// Ticks an I/O operation takes
    #[arg(long, default_value_t = 3)]
    io_latency: u32,

    /// Stop after this many ticks even if programs are still alive
    #[arg(long, default_value_t = 10_000)]
    max_ticks: usize,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Mirror console output and logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Program as NAME:INSTRS[:PRIORITY[:ARRIVAL]], e.g. prg1.exe:cpu2,io,cpu1:1:0
    #[arg(long = "program")]
    programs: Vec<String>,
}

impl Args {
    fn policy(&self) -> Policy {
        match self.policy {
            PolicyArg::Fcfs => Policy::Fcfs,
            PolicyArg::Rr => Policy::RoundRobin {
                quantum: self.quantum,
            },
            PolicyArg::Priority => Policy::PreemptivePriority,
            PolicyArg::PriorityNp => Policy::NonPreemptivePriority,
        }
    }

    fn program_specs(&self) -> Result<Vec<ProgramSpec>> {
        if self.programs.is_empty() {
            return Ok(programs::defaults());
        }
        self.programs
            .iter()
            .map(|text| programs::parse(text).with_context(|| format!("invalid --program {}", text)))
            .collect()
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    console::init(args.log_level, args.log_file.as_deref())?;

    let specs = args.program_specs()?;
    let kernel_config = KernelConfig {
        frame_size: args.frame_size,
        policy: args.policy(),
    };
    let machine_config = MachineConfig {
        memory_size: args.memory_size,
        io_latency: args.io_latency,
        max_ticks: args.max_ticks,
    };
    let mut machine =
        Machine::new(machine_config, kernel_config).context("failed to boot the kernel")?;

    kprintln!("policy: {}", kernel_config.policy);
    for spec in &specs {
        machine.install(spec.path(), spec.program.clone());
    }
    for spec in &specs {
        if spec.arrival > 0 {
            machine.schedule(spec.arrival, spec.path(), spec.priority);
            continue;
        }
        match machine.submit(spec.path(), spec.priority) {
            Ok(pid) => kprintln!("submitted {} as pid {}", spec.path(), pid),
            Err(err) if err.is_recoverable() => kprintln!("rejected {}: {}", spec.path(), err),
            Err(err) => return Err(err).context("kernel failed during submission"),
        }
    }

    let summary = machine
        .run_observed(console::set_tick)
        .context("kernel failed while running")?;

    kprintln!();
    kprintln!("{}", machine.kernel().gantt());
    kprintln!();
    kprint!("{}", machine.kernel().pcb_table());
    kprintln!("{}", summary);
    Ok(())
}
