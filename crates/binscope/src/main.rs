//! binscope - static binary analysis from the command line
//!
//! Usage:
//!   binscope <binary>                 Header and section summary
//!   binscope <binary> disasm         Linear disassembly of the code section
//!   binscope <binary> xrefs          Cross-reference index
//!   binscope <binary> report         Full JSON report
//!   binscope <binary> emulate ...    Step the interpreter over the listing

mod commands;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use binscope_analysis::{build_cfg, XrefKind};
use binscope_core::EdgeKind;
use binscope_disasm::DecoderAdapter;
use binscope_pipeline::{
    InputSource, NullSink, Pipeline, ProgressSink, Report, StageEvent, StageId, StageStatus,
};

#[derive(Parser)]
#[command(name = "binscope")]
#[command(about = "A static binary analyzer with a built-in x86 interpreter", long_about = None)]
struct Cli {
    /// Path to the binary file
    binary: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Skip the semantic decoder; show the hex fallback view
    #[arg(long)]
    no_decoder: bool,

    /// Print pipeline stage events to stderr
    #[arg(long)]
    progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show header facts
    Info,
    /// List sections
    Sections,
    /// Print the linear disassembly of the primary code section
    Disasm {
        /// Limit the number of printed rows
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Print the cross-reference index
    Xrefs {
        /// Only show references to this address
        target: Option<String>,
    },
    /// Print detected function labels
    Functions,
    /// Print byte-signature hits
    Sigs,
    /// Print the basic-block partition of the listing
    Cfg,
    /// Dump the full report as JSON
    Report,
    /// Load the listing into the interpreter and execute it
    Emulate(commands::emulate::EmulateArgs),
}

/// Parses `0x`-prefixed or bare hex into a u64 (clap value parser).
pub(crate) fn parse_hex(s: &str) -> Result<u64, String> {
    u64::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16)
        .map_err(|_| format!("invalid hex address: {}", s))
}

/// Progress sink that narrates stage events on stderr.
struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn stage(&mut self, event: StageEvent) {
        let marker = match event.status {
            StageStatus::Running => "..",
            StageStatus::Done => "ok",
            StageStatus::Error => "!!",
        };
        eprintln!("[{:8}] {} {}", event.id.as_str(), marker, event.label);
    }

    fn results(&mut self, _report: &Report) {}

    fn error(&mut self, stage: StageId, message: &str) {
        eprintln!("analysis failed at {}: {}", stage.as_str(), message);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let bytes = fs::read(&cli.binary)
        .with_context(|| format!("failed to read {}", cli.binary.display()))?;
    let name = cli
        .binary
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| cli.binary.display().to_string());

    let adapter = if cli.no_decoder {
        DecoderAdapter::fallback_only()
    } else {
        DecoderAdapter::new()
    };
    let pipeline = Pipeline::with_adapter(adapter);

    let mut console = ConsoleSink;
    let mut null = NullSink;
    let sink: &mut dyn ProgressSink = if cli.progress { &mut console } else { &mut null };
    let report = pipeline.analyze(InputSource::new(name, bytes), sink)?;

    match cli.command {
        None | Some(Commands::Info) => print_info(&report),
        Some(Commands::Sections) => print_sections(&report),
        Some(Commands::Disasm { limit }) => print_disasm(&report, limit),
        Some(Commands::Xrefs { target }) => print_xrefs(&report, target.as_deref()),
        Some(Commands::Functions) => print_functions(&report),
        Some(Commands::Sigs) => print_sigs(&report),
        Some(Commands::Cfg) => print_cfg(&report),
        Some(Commands::Report) => println!("{}", serde_json::to_string_pretty(&report)?),
        Some(Commands::Emulate(args)) => commands::emulate::run(&report, args)?,
    }

    Ok(())
}

fn print_info(report: &Report) {
    let file = &report.file;
    println!("{} ({})", file.name, file.size_str);
    println!("  format:  {}", file.format);
    println!("  type:    {}", file.type_desc);
    println!("  arch:    {} ({}-bit)", file.arch, file.bits);
    for (key, value) in &file.info {
        println!("  {}: {}", key, value);
    }
}

fn print_sections(report: &Report) {
    println!(
        "{:<16} {:>18} {:>10} {:>10}  {:<20} {}",
        "NAME", "VADDR", "SIZE", "RAW", "FLAGS", "TYPE"
    );
    for section in &report.sections {
        println!(
            "{:<16} {:>18} {:>10} {:>10}  {:<20} {}{}",
            section.name,
            section.virtual_address,
            section.size,
            section.raw_size,
            section.flags,
            section.type_str,
            if section.is_code { "  [code]" } else { "" }
        );
    }
}

fn print_disasm(report: &Report, limit: Option<usize>) {
    let disasm = &report.disasm;
    if disasm.fallback {
        println!("; no decoder output for {}; hex view", disasm.section);
    } else {
        println!("; {} @ {}", disasm.section, disasm.base_va);
    }
    let shown = limit.unwrap_or(disasm.instructions.len());
    for inst in disasm.instructions.iter().take(shown) {
        let label = report.analysis.func_labels.get(&inst.address);
        if let Some(label) = label {
            println!("\n{}:", label);
        }
        println!(
            "  {}  {:<24} {} {}",
            inst.address, inst.bytes, inst.mnemonic, inst.operands
        );
    }
    if shown < disasm.instructions.len() {
        println!("  ... ({} more)", disasm.instructions.len() - shown);
    }
}

fn print_xrefs(report: &Report, target: Option<&str>) {
    for (addr, refs) in &report.analysis.xrefs {
        if let Some(filter) = target {
            if addr != filter {
                continue;
            }
        }
        println!("{}:", addr);
        for xref in refs {
            let kind = match xref.kind {
                XrefKind::Call => "call",
                XrefKind::Jmp => "jmp",
                XrefKind::Jcc => "jcc",
            };
            println!("  {} from {}", kind, xref.from);
        }
    }
}

fn print_functions(report: &Report) {
    for (addr, label) in &report.analysis.func_labels {
        println!("{}  {}", addr, label);
    }
}

fn print_sigs(report: &Report) {
    for hit in &report.analysis.byte_sigs {
        println!("{}  {:<12} {}", hit.address, hit.name, hit.note);
    }
}

fn print_cfg(report: &Report) {
    let blocks = build_cfg(&report.disasm.instructions);
    for block in &blocks {
        println!("block {:#x} ({} instruction(s))", block.id, block.insts.len());
        for edge in &block.succs {
            let kind = match edge.kind {
                EdgeKind::Fall => "fall",
                EdgeKind::Jump => "jump",
            };
            println!("  -> {:#x} [{}]", edge.to, kind);
        }
    }
}
