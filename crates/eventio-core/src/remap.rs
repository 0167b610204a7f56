// crates/eventio-core/src/remap.rs
//
// Which telescope of which input becomes which telescope in the merged
// output. Output ids are handed out densely from 1 in declaration order,
// so the output slot of id n is n - 1.

use std::fmt;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{EventIoError, Result};
use crate::records::types::{
    CAMERA_ORGANISATION, CAMERA_SETTINGS, CAMERA_SOFTWARE_SETTINGS, LASER_CALIBRATION,
    PIXEL_DISABLED, PIXEL_SETTINGS, POINTING_CORRECTION, TEL_MONITORING, TRACKING_SETTINGS,
};

/// Most telescopes on either side of the mapping.
pub const MAX_TELESCOPES: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {
    First,
    Second,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::First, Source::Second];

    pub fn from_number(n: i64) -> Option<Self> {
        match n {
            1 => Some(Source::First),
            2 => Some(Source::Second),
            _ => None,
        }
    }

    /// 1 or 2.
    pub fn number(self) -> u8 {
        match self {
            Source::First => 1,
            Source::Second => 2,
        }
    }

    pub fn index(self) -> usize {
        self.number() as usize - 1
    }

    pub fn other(self) -> Source {
        match self {
            Source::First => Source::Second,
            Source::Second => Source::First,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "input {}", self.number())
    }
}

/// Per-telescope block types already seen for a telescope in this run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Received(u16);

impl Received {
    fn bit(type_code: u32) -> Option<u16> {
        let b = match type_code {
            CAMERA_SETTINGS => 0,
            CAMERA_ORGANISATION => 1,
            PIXEL_SETTINGS => 2,
            PIXEL_DISABLED => 3,
            CAMERA_SOFTWARE_SETTINGS => 4,
            POINTING_CORRECTION => 5,
            TRACKING_SETTINGS => 6,
            TEL_MONITORING => 7,
            LASER_CALIBRATION => 8,
            _ => return None,
        };
        Some(1 << b)
    }

    /// Record `type_code`; returns true if it had been seen before.
    pub fn mark(&mut self, type_code: u32) -> bool {
        match Self::bit(type_code) {
            Some(b) => {
                let seen = self.0 & b != 0;
                self.0 |= b;
                seen
            }
            None => false,
        }
    }

    pub fn has(&self, type_code: u32) -> bool {
        Self::bit(type_code).map(|b| self.0 & b != 0).unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

/// One output telescope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemapEntry {
    pub output_id: i32,
    pub source: Source,
    pub input_id: i32,
    /// Position of the telescope in its input's current run header.
    pub input_slot: Option<usize>,
    pub received: Received,
}

#[derive(Clone, Debug)]
pub struct TelescopeMap {
    entries: Vec<RemapEntry>,
    /// input id -> output id, per source.
    forward: [Vec<Option<i32>>; 2],
    /// output id -> slot.
    slots: Vec<Option<usize>>,
}

impl TelescopeMap {
    /// Parse a mapping description. Each non-blank line reads
    /// `<source> <range>[,<range>...]` where source is 1 or 2 and a range is
    /// `a` or `a-b`. `#` starts a comment.
    pub fn load(text: &str) -> Result<Self> {
        let mut map = TelescopeMap {
            entries: Vec::new(),
            forward: [
                vec![None; MAX_TELESCOPES + 1],
                vec![None; MAX_TELESCOPES + 1],
            ],
            slots: vec![None; MAX_TELESCOPES + 1],
        };

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").replace('\t', " ");
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (src_word, rest) = line.split_once(' ').unwrap_or((line, ""));
            let source = src_word
                .parse::<i64>()
                .ok()
                .and_then(Source::from_number)
                .ok_or_else(|| {
                    EventIoError::Config(format!(
                        "mapping line {}: input must be 1 or 2, got '{}'",
                        lineno + 1,
                        src_word
                    ))
                })?;

            for word in rest.split(',').map(|w| w.trim()).filter(|w| !w.is_empty()) {
                let (lo, hi) = parse_range(word).ok_or_else(|| {
                    EventIoError::Config(format!(
                        "mapping line {}: invalid telescope range '{}'",
                        lineno + 1,
                        word
                    ))
                })?;
                if lo < 1 || hi < lo || hi as usize > MAX_TELESCOPES {
                    return Err(EventIoError::Config(format!(
                        "mapping line {}: telescope range {}-{} outside 1..={}",
                        lineno + 1,
                        lo,
                        hi,
                        MAX_TELESCOPES
                    )));
                }
                for input_id in lo..=hi {
                    map.push(source, input_id)?;
                }
            }
        }

        let (n1, n2) = map.counts();
        info!(
            total = map.len(),
            from_first = n1,
            from_second = n2,
            "telescope mapping loaded"
        );
        if n1 == 0 || n2 == 0 {
            return Err(EventIoError::Config(format!(
                "mapping takes {} telescopes from input 1 and {} from input 2, no merging needed",
                n1, n2
            )));
        }
        Ok(map)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            EventIoError::Config(format!("cannot read mapping file {}: {}", path.display(), e))
        })?;
        Self::load(&text)
    }

    fn push(&mut self, source: Source, input_id: i32) -> Result<()> {
        if self.entries.len() >= MAX_TELESCOPES {
            return Err(EventIoError::Config(format!(
                "too many mappings, at most {} telescopes supported",
                MAX_TELESCOPES
            )));
        }
        let output_id = self.entries.len() as i32 + 1;
        if self.slots[output_id as usize].is_some() {
            return Err(EventIoError::Config(format!(
                "duplicated output telescope id {}",
                output_id
            )));
        }
        if self.forward[source.index()][input_id as usize].is_some() {
            return Err(EventIoError::Config(format!(
                "duplicated telescope id {} from {}",
                input_id, source
            )));
        }
        self.forward[source.index()][input_id as usize] = Some(output_id);
        self.slots[output_id as usize] = Some(self.entries.len());
        self.entries.push(RemapEntry {
            output_id,
            source,
            input_id,
            input_slot: None,
            received: Received::default(),
        });
        Ok(())
    }

    /// Output id of an input telescope, if it is mapped.
    pub fn map(&self, source: Source, input_id: i32) -> Option<i32> {
        let i = usize::try_from(input_id).ok()?;
        self.forward[source.index()].get(i).copied().flatten()
    }

    pub fn output_slot(&self, output_id: i32) -> Option<usize> {
        let i = usize::try_from(output_id).ok()?;
        self.slots.get(i).copied().flatten()
    }

    pub fn entry(&self, slot: usize) -> Option<&RemapEntry> {
        self.entries.get(slot)
    }

    pub fn entry_mut(&mut self, slot: usize) -> Option<&mut RemapEntry> {
        self.entries.get_mut(slot)
    }

    pub fn entries(&self) -> &[RemapEntry] {
        &self.entries
    }

    /// Number of output telescopes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Telescopes taken from input 1 and from input 2.
    pub fn counts(&self) -> (usize, usize) {
        let n1 = self
            .entries
            .iter()
            .filter(|e| e.source == Source::First)
            .count();
        (n1, self.entries.len() - n1)
    }

    /// Slot of `(source, input_id)` after checking that both lookup
    /// directions agree. A disagreement means the tables are corrupt.
    pub fn checked_slot(&self, source: Source, input_id: i32) -> Result<Option<usize>> {
        let Some(out) = self.map(source, input_id) else {
            return Ok(None);
        };
        let slot = self.output_slot(out).ok_or_else(|| {
            EventIoError::Internal(format!(
                "telescope {} of {} maps to id {} which has no output slot",
                input_id, source, out
            ))
        })?;
        match self.entries.get(slot) {
            Some(e) if e.output_id == out && e.source == source && e.input_id == input_id => {
                Ok(Some(slot))
            }
            Some(e) => Err(EventIoError::Internal(format!(
                "telescope lookup problem: slot {} expected id {} (telescope {} from {}) \
                 but found id {} (telescope {} from {})",
                slot, e.output_id, e.input_id, e.source, out, input_id, source
            ))),
            None => Err(EventIoError::Internal(format!(
                "output slot {} for telescope id {} does not exist",
                slot, out
            ))),
        }
    }

    /// Slot of a telescope that is mapped and present in the source's
    /// current run.
    pub fn run_slot(&self, source: Source, input_id: i32) -> Result<Option<usize>> {
        Ok(self
            .checked_slot(source, input_id)?
            .filter(|&slot| self.entries[slot].input_slot.is_some()))
    }

    /// Start of a new run in `source`: record where each telescope sits in
    /// its run header and forget which settings blocks were seen.
    pub fn bind_run(&mut self, source: Source, tel_ids: &[i32]) -> Result<()> {
        for e in self.entries.iter_mut().filter(|e| e.source == source) {
            e.input_slot = None;
            e.received.clear();
        }
        for (itel, &tel_id) in tel_ids.iter().enumerate() {
            if tel_id < 0 || tel_id as usize > MAX_TELESCOPES {
                warn!(
                    tel_id,
                    source = %source,
                    max = MAX_TELESCOPES,
                    "telescope id outside of valid range"
                );
                continue;
            }
            if let Some(slot) = self.checked_slot(source, tel_id)? {
                self.entries[slot].input_slot = Some(itel);
            }
        }
        Ok(())
    }

    /// Human-readable mapping, one line per output telescope.
    pub fn describe(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| {
                format!(
                    "Telescope ID {:3} from input file {} mapped to telescope ID {:3}.",
                    e.input_id,
                    e.source.number(),
                    e.output_id
                )
            })
            .collect()
    }
}

fn parse_range(word: &str) -> Option<(i32, i32)> {
    match word.split_once('-') {
        Some((a, b)) => Some((a.trim().parse().ok()?, b.trim().parse().ok()?)),
        None => {
            let a = word.parse().ok()?;
            Some((a, a))
        }
    }
}
