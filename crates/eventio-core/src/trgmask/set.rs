// crates/eventio-core/src/trgmask/set.rs

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::block::{Block, BlockWriter};
use crate::error::{EventIoError, Result};
use crate::records::check_block;
use crate::records::types::TRIGGER_MASKS;

const VERSION: u16 = 1;

/// Corrected trigger-type bits of one telescope in one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerMaskEntry {
    pub event: i64,
    pub tel_id: i32,
    pub mask: i32,
}

/// All corrections known for one run, in the order they were found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TriggerMaskSet {
    pub run: i64,
    entries: Vec<TriggerMaskEntry>,
}

impl TriggerMaskSet {
    pub fn new(run: i64) -> Self {
        Self {
            run,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, event: i64, tel_id: i32, mask: i32) {
        self.entries.push(TriggerMaskEntry {
            event,
            tel_id,
            mask,
        });
    }

    pub fn entries(&self) -> &[TriggerMaskEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Collect masks from a simulation log. Recognised lines:
    ///
    /// ```text
    /// Run 1234 (started ...
    /// Event 100 has triggered ...
    /// Telescope 3 triggered ... mask 5
    /// ```
    ///
    /// Telescope lines belong to the last event line seen.
    pub fn scan_log<R: BufRead>(mut input: R) -> Result<Self> {
        let mut set = TriggerMaskSet::default();
        let mut event = 0i64;
        let mut raw = Vec::new();
        loop {
            raw.clear();
            if input.read_until(b'\n', &mut raw)? == 0 {
                break;
            }
            // Logs may hold arbitrary bytes; only the prefixed lines matter.
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(&['\n', '\r'][..]);
            if let Some(rest) = line.strip_prefix("Run ") {
                if !line.contains("(started") {
                    continue;
                }
                let run = leading_int(rest);
                if set.run != 0 {
                    warn!(from = set.run, to = run, "run number changed in log file");
                } else {
                    info!(run, "scanning log for trigger type masks");
                }
                set.run = run;
            } else if let Some(rest) = line.strip_prefix("Event ") {
                if line.contains(" has triggered") {
                    event = leading_int(rest);
                }
            } else if let Some(rest) = line.strip_prefix("Telescope ") {
                if !line.contains(" triggered ") {
                    continue;
                }
                let Some(at) = line.find("mask") else {
                    continue;
                };
                let tel_id = leading_int(rest) as i32;
                let mask = line.get(at + 5..).map(leading_int).unwrap_or(0) as i32;
                set.push(event, tel_id, mask);
            }
        }
        Ok(set)
    }

    pub fn scan_log_file(path: &Path) -> Result<Self> {
        let f = File::open(path).map_err(|e| {
            EventIoError::Config(format!("cannot open log file {}: {}", path.display(), e))
        })?;
        Self::scan_log(BufReader::new(f))
    }

    /// Decode a trigger-mask block (2090, ident = run).
    ///
    /// Layout: n:count { event:count tel_id:scount mask:scount }*n
    pub fn read(block: &Block) -> Result<Self> {
        check_block(block, TRIGGER_MASKS, VERSION)?;
        let mut c = block.cursor();
        let n = c.get_count()?;
        if n > c.remaining() as u64 {
            return Err(EventIoError::Format(format!(
                "trigger mask block for run {} claims {} entries in {} bytes",
                block.ident(),
                n,
                c.remaining()
            )));
        }
        let mut set = TriggerMaskSet::new(block.ident());
        set.entries.reserve(n as usize);
        for _ in 0..n {
            let event = c.get_count()? as i64;
            let tel_id = c.get_scount32()?;
            let mask = c.get_scount32()?;
            set.push(event, tel_id, mask);
        }
        Ok(set)
    }

    pub fn write<W: Write>(&self, w: &mut BlockWriter<W>) -> Result<()> {
        let h = w.begin_block(TRIGGER_MASKS, VERSION, self.run)?;
        w.put_count(self.entries.len() as u64)?;
        for e in &self.entries {
            if e.event < 0 {
                return Err(EventIoError::Format(format!(
                    "trigger mask entry for telescope {} has negative event number {}",
                    e.tel_id, e.event
                )));
            }
            w.put_count(e.event as u64)?;
            w.put_scount(e.tel_id as i64)?;
            w.put_scount(e.mask as i64)?;
        }
        w.end_block(h)
    }

    /// One line per entry, for listings.
    pub fn describe(&self, max_lines: usize) -> Vec<String> {
        let mut out = Vec::with_capacity(self.entries.len().min(max_lines) + 1);
        out.push(format!(
            "Trigger type masks for run {}: {} entries",
            self.run,
            self.entries.len()
        ));
        for e in self.entries.iter().take(max_lines) {
            out.push(format!(
                "   Event {}, telescope {} has mask {}",
                e.event, e.tel_id, e.mask
            ));
        }
        if self.entries.len() > max_lines {
            out.push("   ...".to_string());
        }
        out
    }
}

/// Integer at the start of `s` after blanks, 0 if there is none.
fn leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (neg, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut v: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        v = v.saturating_mul(10).saturating_add((b - b'0') as i64);
    }
    if neg {
        -v
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::leading_int;

    #[test]
    fn leading_int_stops_at_first_non_digit() {
        assert_eq!(leading_int("  42 (started"), 42);
        assert_eq!(leading_int("-7x"), -7);
        assert_eq!(leading_int("abc"), 0);
        assert_eq!(leading_int(""), 0);
    }
}
