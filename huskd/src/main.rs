//! # husk daemon (huskd)
//!
//! Analyst front end for the husk toolkit: decode a module binary and
//! print its section layout, import/export surface, data-segment
//! placements, and (on request) the constant-scanner report.
//!
//! ## Usage
//!
//! ```bash
//! huskd <module.wasm> [--scan] [--verbose]
//! ```
//!
//! Executing the module is out of scope for this tool; it reports the
//! structure a host runtime would build its import table from.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use husk_format::{
    DataMode, ExportKind, FunctionRef, ImportDesc, Module, SectionKind,
};
use husk_scanner::ScanReport;
use tracing::{debug, info};

/// huskd CLI arguments
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the module binary to analyze
    module_file: PathBuf,

    /// Run the constant scanner over the data section
    #[arg(short, long, help = "Report extracted strings and entropy candidates")]
    scan: bool,

    /// Enable verbose diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    initialize_tracing(args.verbose);

    let bytes = fs::read(&args.module_file)
        .with_context(|| format!("reading {}", args.module_file.display()))?;
    debug!("loaded {} bytes", bytes.len());

    let module = husk_decoder::decode_module(&bytes)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("decoding {}", args.module_file.display()))?;
    info!(
        sections = module.sections.len(),
        imports = module.imports.len(),
        exports = module.exports.len(),
        "module decoded"
    );

    print_sections(&module);
    print_imports(&module);
    print_exports(&module);
    print_data(&module);

    if args.scan {
        let report = husk_scanner::scan(&module.data);
        print_scan_report(&report);
    }

    Ok(())
}

fn initialize_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn print_sections(module: &Module) {
    println!("Sections:");
    for section in &module.sections {
        let name = section
            .name
            .as_deref()
            .map(|n| format!(" \"{n}\""))
            .unwrap_or_default();
        println!(
            "  {:>10?}{name}  offset {:#x}  length {}",
            section.kind, section.byte_offset, section.byte_length
        );
    }
    if module.sections.iter().any(|s| s.kind == SectionKind::Code) {
        println!(
            "  {} function bodies, {} type signatures",
            module.bodies.len(),
            module.types.len()
        );
    }
}

fn print_imports(module: &Module) {
    if module.imports.is_empty() {
        return;
    }
    println!("Imports ({} function-kind):", module.import_function_count);
    for import in &module.imports {
        let desc = match &import.desc {
            ImportDesc::Function { type_index } => {
                format!(
                    "func (type {type_index}) -> capability {}",
                    husk_runtime::capability_key(&import.field)
                )
            }
            ImportDesc::Memory { limits } => format!(
                "memory {}..{}",
                limits.min,
                limits
                    .max
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "*".to_owned())
            ),
            ImportDesc::Table { .. } => "table".to_owned(),
            ImportDesc::Global { value_type, .. } => format!("global {value_type:?}"),
        };
        println!("  {}.{}  {desc}", import.module, import.field);
    }
}

fn print_exports(module: &Module) {
    if module.exports.is_empty() {
        return;
    }
    println!("Exports:");
    for export in &module.exports {
        let detail = match export.kind {
            ExportKind::Function => match module.resolve_function(export.index) {
                Some(FunctionRef::Imported(i)) => format!("func {} (import {i})", export.index),
                Some(FunctionRef::Defined(i)) => format!("func {} (defined {i})", export.index),
                None => format!("func {} (dangling)", export.index),
            },
            ExportKind::Memory => format!("memory {}", export.index),
            ExportKind::Table => format!("table {}", export.index),
            ExportKind::Global => format!("global {}", export.index),
        };
        println!("  {:<32} {detail}", export.name);
    }
}

fn print_data(module: &Module) {
    if module.data.is_empty() {
        return;
    }
    println!("Data segments:");
    for (i, segment) in module.data.iter().enumerate() {
        match segment.mode {
            DataMode::Active => println!(
                "  #{i}: active, memory {}, offset {}, {} bytes",
                segment.memory_index,
                segment
                    .init_offset
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "?".to_owned()),
                segment.payload.len()
            ),
            DataMode::Passive => println!(
                "  #{i}: passive, {} bytes (placement unknown until initialized)",
                segment.payload.len()
            ),
        }
    }
}

fn print_scan_report(report: &ScanReport) {
    println!("Extracted strings ({}):", report.strings.len());
    for s in &report.strings {
        match s.absolute_offset {
            Some(offset) => println!("  {offset:#010x}  {:?}", s.text),
            None => println!("  (passive)   {:?}", s.text),
        }
    }

    println!("Entropy candidates ({}):", report.entropy_candidates.len());
    for window in &report.entropy_candidates {
        let offset = window
            .absolute_offset
            .map(|o| format!("{o:#010x}"))
            .unwrap_or_else(|| "(passive)".to_owned());
        println!(
            "  {offset}  H={:.3} bits  distinct={}  {}",
            window.entropy_bits,
            window.distinct_byte_count,
            window.hex()
        );
    }
}
