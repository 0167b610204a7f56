// crates/eventio-cli/src/cmd/trgmask.rs

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use eventio_core::records::types::TRIGGER_MASKS;
use eventio_core::{BlockReader, BlockWriter, TriggerMaskIndex, TriggerMaskSet};

#[derive(Args)]
pub struct TrgmaskArgs {
    #[command(subcommand)]
    pub cmd: TrgmaskCmd,
}

#[derive(Subcommand)]
pub enum TrgmaskCmd {
    /// Extract trigger type masks from a simulation log into a side file
    Scan(ScanArgs),

    /// Print the trigger type masks stored in a file
    List(ListArgs),
}

#[derive(Args)]
pub struct ScanArgs {
    /// Simulation log
    pub log: PathBuf,

    /// Side file to write (default: log name without `.log`, plus `.trgmask`)
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct ListArgs {
    /// File holding trigger mask blocks
    pub file: PathBuf,

    /// Entries printed per block
    #[arg(long, default_value_t = 20)]
    pub max_print: usize,
}

pub fn run(args: TrgmaskArgs) -> anyhow::Result<()> {
    match args.cmd {
        TrgmaskCmd::Scan(a) => cmd_scan(a),
        TrgmaskCmd::List(a) => cmd_list(a),
    }
}

pub fn default_output(log: &Path) -> PathBuf {
    let name = log.to_string_lossy();
    let stem = name.strip_suffix(".log").unwrap_or(&name);
    PathBuf::from(format!("{}.trgmask", stem))
}

fn cmd_scan(a: ScanArgs) -> anyhow::Result<()> {
    let set = TriggerMaskSet::scan_log_file(&a.log)
        .with_context(|| format!("scan log {}", a.log.display()))?;
    let out_path = a.out.unwrap_or_else(|| default_output(&a.log));

    let f = File::create(&out_path)
        .with_context(|| format!("create side file {}", out_path.display()))?;
    let mut w = BlockWriter::new(BufWriter::new(f));
    set.write(&mut w)?;
    w.into_inner()?
        .flush()
        .with_context(|| format!("flush side file {}", out_path.display()))?;

    let index = TriggerMaskIndex::build(set);
    eprintln!("--- trgmask scan ---");
    eprintln!("log           = {}", a.log.display());
    eprintln!("side_file     = {}", out_path.display());
    eprintln!("run           = {}", index.run());
    eprintln!("entries       = {}", index.set().len());
    eprintln!("longest_chain = {}", index.longest_chain());
    Ok(())
}

fn cmd_list(a: ListArgs) -> anyhow::Result<()> {
    let f = File::open(&a.file).with_context(|| format!("open {}", a.file.display()))?;
    let mut reader = BlockReader::new(BufReader::new(f));
    let mut found = 0usize;
    while let Some(h) = reader.find_next_block()? {
        if h.type_code != TRIGGER_MASKS {
            reader.skip_block(&h)?;
            continue;
        }
        let set = TriggerMaskSet::read(&reader.read_block(h)?)?;
        for line in set.describe(a.max_print) {
            println!("{}", line);
        }
        found += 1;
    }
    if found == 0 {
        eprintln!("no trigger mask blocks in {}", a.file.display());
    }
    Ok(())
}
