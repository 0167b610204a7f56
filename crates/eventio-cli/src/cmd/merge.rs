// crates/eventio-cli/src/cmd/merge.rs

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context};
use clap::Args;
use eventio_core::trgmask;
use eventio_core::{
    BlockReader, BlockWriter, History, MergeOptions, Source, StreamMerger, TelescopeMap,
};

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Look for `<input>.trgmask` side files next to both inputs
    #[arg(long)]
    pub auto_trgmask: bool,

    /// Minimum number of telescopes for an event to be kept
    #[arg(long, default_value_t = 2)]
    pub min_trg_tel: usize,

    /// Number of merged events listed individually
    #[arg(long, default_value_t = 999)]
    pub max_list: usize,

    /// Telescope mapping file
    pub map: PathBuf,

    /// First input
    pub input1: PathBuf,

    /// Second input
    pub input2: PathBuf,

    /// Merged output (not stdout)
    pub output: PathBuf,
}

fn open_input(path: &Path) -> anyhow::Result<BlockReader<BufReader<File>>> {
    let f = File::open(path).with_context(|| format!("open input {}", path.display()))?;
    Ok(BlockReader::new(BufReader::new(f)))
}

fn now_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub fn run(args: MergeArgs, verbose: bool, stop: &AtomicBool) -> anyhow::Result<()> {
    if args.output.as_os_str() == "-" {
        bail!("merged output cannot go to standard output");
    }

    let mut map = TelescopeMap::from_path(&args.map)
        .with_context(|| format!("load telescope mapping {}", args.map.display()))?;

    let mut r1 = open_input(&args.input1)?;
    let mut r2 = open_input(&args.input2)?;

    let f = File::create(&args.output)
        .with_context(|| format!("create output {}", args.output.display()))?;
    let mut out = BlockWriter::new(BufWriter::new(f));

    let now = now_seconds();
    let command_line = std::env::args().collect::<Vec<_>>().join(" ");
    let mut history = History::new(0, &command_line, now);
    for line in map.describe() {
        history.push_config(&line, now);
    }
    history.write(&mut out).context("write history block")?;

    let options = MergeOptions {
        min_telescopes: args.min_trg_tel,
        max_list: args.max_list,
        verbose,
    };
    let mut merger = StreamMerger::new(&mut map, options);

    if args.auto_trgmask {
        for (source, path) in [(Source::First, &args.input1), (Source::Second, &args.input2)] {
            if let Some(index) = trgmask::load_for_input(path)
                .with_context(|| format!("trigger mask side file for {}", path.display()))?
            {
                merger.set_trigger_masks(source, index);
            }
        }
    }

    let summary = merger.run(&mut r1, &mut r2, &mut out, stop)?;
    let mut sink = out.into_inner()?;
    sink.flush()
        .with_context(|| format!("flush output {}", args.output.display()))?;

    eprintln!("--- merge ---");
    eprintln!("output            = {}", args.output.display());
    eprintln!("events_written    = {}", summary.events_written);
    eprintln!("events_dropped    = {}", summary.events_dropped);
    eprintln!("pe_sums_written   = {}", summary.pe_sums_written);
    eprintln!(
        "blocks_read       = {} + {}",
        summary.blocks_read[0], summary.blocks_read[1]
    );
    eprintln!("blocks_written    = {}", summary.blocks_written);

    if summary.cancelled {
        bail!(
            "merge interrupted, {} pending record(s) lost: {:?}",
            summary.lost.len(),
            summary.lost
        );
    }
    Ok(())
}
