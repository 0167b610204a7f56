// crates/eventio-core/src/trgmask/mod.rs
//
// Corrections for trigger-type bit patterns that some producer versions
// wrote wrongly. They come from simulation logs or from a side file holding
// one trigger-mask block per run.

pub mod index;
pub mod set;

pub use index::{bucket_of, TriggerMaskIndex, TRGMASK_PRIME};
pub use set::{TriggerMaskEntry, TriggerMaskSet};

use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::block::BlockReader;
use crate::error::Result;
use crate::records::types::TRIGGER_MASKS;

/// Side file that goes with a data file: the name up to the first `.sim`,
/// plus `.trgmask`.
pub fn side_file_path(input: &Path) -> PathBuf {
    let name = input.to_string_lossy();
    let stem = match name.find(".sim") {
        Some(at) => &name[..at],
        None => &name[..],
    };
    PathBuf::from(format!("{}.trgmask", stem))
}

/// Read the first trigger-mask block of `path`. A missing file is not an
/// error.
pub fn load_side_file(path: &Path) -> Result<Option<TriggerMaskSet>> {
    let f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no trigger mask side file");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let mut reader = BlockReader::new(BufReader::new(f));
    while let Some(h) = reader.find_next_block()? {
        if h.type_code != TRIGGER_MASKS {
            reader.skip_block(&h)?;
            continue;
        }
        let set = TriggerMaskSet::read(&reader.read_block(h)?)?;
        info!(
            path = %path.display(),
            run = set.run,
            entries = set.len(),
            "loaded trigger mask side file"
        );
        return Ok(Some(set));
    }
    warn!(path = %path.display(), "side file has no trigger mask block");
    Ok(None)
}

/// Side-file index for a data file, if one exists.
pub fn load_for_input(input: &Path) -> Result<Option<TriggerMaskIndex>> {
    Ok(load_side_file(&side_file_path(input))?.map(TriggerMaskIndex::build))
}
