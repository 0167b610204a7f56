// crates/eventio-core/src/merge/state.rs

use std::collections::HashMap;

use tracing::trace;

use crate::block::{Block, BlockSource};
use crate::error::{EventIoError, Result};
use crate::merge::aggregate::OutputAggregate;
use crate::merge::order::{classify, BlockClass, OrderKey};
use crate::records::{McEvent, McShower, RunHeader};
use crate::remap::Source;
use crate::trgmask::TriggerMaskIndex;

/// Progress of one input.
#[derive(Debug)]
pub struct SourceCursor {
    pub source: Source,
    /// Look-ahead block, loaded but not yet merged.
    pub current: Option<(Block, OrderKey)>,
    /// Counts runs; bumped when a run-scope block follows anything else.
    pub run_index: u32,
    in_prelude: bool,
    pub exhausted: bool,
    pub last_type: Option<u32>,
    pub current_run: Option<i32>,
    pub last_event: Option<i64>,
    pub last_shower: Option<i64>,
    pub last_mc_event: Option<i64>,
    pub last_pe_sum: Option<i64>,
    pub trgmask: Option<TriggerMaskIndex>,
    pub blocks_read: u64,
    pub events_read: u64,
}

impl SourceCursor {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            current: None,
            run_index: 0,
            in_prelude: false,
            exhausted: false,
            last_type: None,
            current_run: None,
            last_event: None,
            last_shower: None,
            last_mc_event: None,
            last_pe_sum: None,
            trgmask: None,
            blocks_read: 0,
            events_read: 0,
        }
    }

    /// Pull the next block from `src` unless one is already waiting.
    pub fn refill<S: BlockSource + ?Sized>(&mut self, src: &mut S) -> Result<()> {
        if self.current.is_some() || self.exhausted {
            return Ok(());
        }
        match src.next_block()? {
            Some(block) => self.load(block),
            None => {
                trace!(source = %self.source, "input exhausted");
                self.exhausted = true;
            }
        }
        Ok(())
    }

    pub fn load(&mut self, block: Block) {
        let class = classify(&block);
        match class {
            BlockClass::RunScope { .. } => {
                if !self.in_prelude {
                    self.run_index += 1;
                    self.in_prelude = true;
                }
            }
            BlockClass::Immediate => {}
            _ => self.in_prelude = false,
        }
        let key = OrderKey::new(self.run_index, class);
        self.blocks_read += 1;
        self.current = Some((block, key));
    }

    pub fn key(&self) -> Option<OrderKey> {
        self.current.as_ref().map(|(_, k)| *k)
    }

    /// New run: per-run identifiers start over.
    pub fn start_run(&mut self, run: i32) {
        self.current_run = Some(run);
        self.last_event = None;
        self.last_shower = None;
        self.last_mc_event = None;
        self.last_pe_sum = None;
    }

    /// Identifiers of one kind must not decrease within a run.
    pub fn advance(&mut self, what: Tracked, id: i64) -> Result<()> {
        let source = self.source;
        let slot = match what {
            Tracked::Event => &mut self.last_event,
            Tracked::Shower => &mut self.last_shower,
            Tracked::McEvent => &mut self.last_mc_event,
            Tracked::PeSum => &mut self.last_pe_sum,
        };
        if let Some(prev) = *slot {
            if id < prev {
                return Err(EventIoError::Order(format!(
                    "{} {} from {} follows {} {}",
                    what.name(),
                    id,
                    source,
                    what.name(),
                    prev
                )));
            }
        }
        *slot = Some(id);
        Ok(())
    }

    /// Whether the side table applies to the run being read.
    pub fn trgmask_for_current_run(&self) -> Option<&TriggerMaskIndex> {
        let run = self.current_run? as i64;
        self.trgmask.as_ref().filter(|ix| ix.run() == run)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tracked {
    Event,
    Shower,
    McEvent,
    PeSum,
}

impl Tracked {
    fn name(self) -> &'static str {
        match self {
            Tracked::Event => "event",
            Tracked::Shower => "shower",
            Tracked::McEvent => "MC event",
            Tracked::PeSum => "p.e. sum",
        }
    }
}

/// Everything the merge loop knows about its progress. Owned by the loop
/// and threaded through every step.
#[derive(Debug)]
pub struct MergerState {
    pub cursors: [SourceCursor; 2],
    pub pending_event: Option<i64>,
    pub pending_pe_sum: Option<i64>,
    pub output: OutputAggregate,
    /// Run header of input 1 for the current run.
    pub first_header: Option<RunHeader>,
    pub last_shower: Option<McShower>,
    pub last_mc_event: Option<McEvent>,
    pub last_written_event: Option<i64>,
    pub last_written_pe_sum: Option<i64>,
    /// Which input owns a given end-of-run block type, per run index.
    pub end_of_run_owner: HashMap<(u32, u32), Source>,
    pub listed_events: usize,
}

impl MergerState {
    pub fn new(num_tel: usize) -> Self {
        Self {
            cursors: [
                SourceCursor::new(Source::First),
                SourceCursor::new(Source::Second),
            ],
            pending_event: None,
            pending_pe_sum: None,
            output: OutputAggregate::new(num_tel),
            first_header: None,
            last_shower: None,
            last_mc_event: None,
            last_written_event: None,
            last_written_pe_sum: None,
            end_of_run_owner: HashMap::new(),
            listed_events: 0,
        }
    }

    pub fn cursor(&self, source: Source) -> &SourceCursor {
        &self.cursors[source.index()]
    }

    pub fn cursor_mut(&mut self, source: Source) -> &mut SourceCursor {
        &mut self.cursors[source.index()]
    }

    /// Input whose look-ahead block goes next, or `None` when both are
    /// exhausted.
    pub fn pick(&self) -> Option<Source> {
        match (self.cursors[0].key(), self.cursors[1].key()) {
            (None, None) => None,
            (Some(_), None) => Some(Source::First),
            (None, Some(_)) => Some(Source::Second),
            (Some(a), Some(b)) => {
                if b < a {
                    Some(Source::Second)
                } else {
                    Some(Source::First)
                }
            }
        }
    }
}
