//! Interpreter-driven execution of the disassembled listing.

use anyhow::{bail, Context, Result};
use clap::Args;

use binscope_emulate::{Interpreter, InterpreterConfig, StopReason};
use binscope_pipeline::Report;

/// Arguments for `binscope <binary> emulate`.
#[derive(Args)]
pub struct EmulateArgs {
    /// Single-step this many instructions instead of running freely
    #[arg(short, long)]
    pub steps: Option<usize>,

    /// Stop when execution reaches this address (repeatable)
    #[arg(short, long = "break", value_parser = crate::parse_hex)]
    pub breakpoints: Vec<u64>,

    /// Hard cap on executed instructions for a free run
    #[arg(long, default_value = "50000")]
    pub max_steps: usize,

    /// Seed a register before execution (format: rax=0x1234, repeatable)
    #[arg(short, long)]
    pub reg: Vec<String>,

    /// Print each executed instruction
    #[arg(long)]
    pub trace: bool,
}

/// Loads the report's listing into a fresh interpreter and executes it.
pub fn run(report: &Report, args: EmulateArgs) -> Result<()> {
    if report.disasm.fallback {
        bail!("cannot emulate a hex-dump fallback listing; no decoder output available");
    }
    if report.disasm.instructions.is_empty() {
        bail!("nothing to emulate; the listing is empty");
    }

    let mut interp = Interpreter::with_config(
        report.file.bits,
        InterpreterConfig {
            batch_size: 100,
            max_steps: args.max_steps,
        },
    );
    interp.load(report.disasm.instructions.clone());

    for assignment in &args.reg {
        let (name, value) = parse_reg_assignment(assignment)?;
        if !interp.set_register(&name, value) {
            bail!("unknown register: {}", name);
        }
    }
    for addr in &args.breakpoints {
        interp.add_breakpoint(*addr);
    }

    match args.steps {
        Some(count) => {
            for i in 0..count {
                match interp.step() {
                    Ok(inst) => {
                        if args.trace {
                            println!("{}", inst);
                        }
                    }
                    Err(trap) => {
                        println!("trap after {} step(s): {}", i, trap.message);
                        break;
                    }
                }
            }
        }
        None => {
            let outcome = interp.run();
            match outcome.reason {
                StopReason::Breakpoint(addr) => {
                    println!("breakpoint at {:#x} after {} step(s)", addr, outcome.steps)
                }
                StopReason::Trap(trap) => match &trap.inst {
                    Some(inst) => println!(
                        "trap after {} step(s) at {}: {}",
                        outcome.steps, inst.address, trap.message
                    ),
                    None => println!("trap after {} step(s): {}", outcome.steps, trap.message),
                },
                StopReason::StepLimit => {
                    println!("step cap reached after {} step(s)", outcome.steps)
                }
                StopReason::Cancelled => println!("cancelled after {} step(s)", outcome.steps),
            }
        }
    }

    println!("\nfinal state:");
    print!("{}", interp.dump_registers());
    Ok(())
}

/// Parses a `name=value` register seed.
fn parse_reg_assignment(s: &str) -> Result<(String, u64)> {
    let (name, value) = s
        .split_once('=')
        .with_context(|| format!("invalid register assignment '{}'; use rax=0x1234", s))?;
    let value = crate::parse_hex(value.trim()).map_err(anyhow::Error::msg)?;
    Ok((name.trim().to_ascii_lowercase(), value))
}
