// crates/eventio-core/src/merge/order.rs
//
// Every look-ahead block gets an ordering key; the merge always processes
// the smaller key next, input 1 first on ties.

use crate::block::Block;
use crate::records::types::{
    CALIBRATION_EVENT, EVENT, HISTOGRAMS, HISTORY, MC_EVENT, MC_INPUT_CONFIG, MC_PE_SUM,
    MC_PHOTONS, MC_RUN_HEADER, MC_RUN_STATISTICS, MC_SHOWER, RUN_HEADER, RUN_STATISTICS,
    TRIGGER_MASKS,
};
use crate::records::TelescopeBlock;

/// How often a block type occurs and therefore how it is merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockClass {
    /// Handled as soon as it shows up: side tables, ignored and unknown types.
    Immediate,
    /// Once per run, in the order history, run header, MC run header,
    /// input configuration.
    RunScope { rank: u8 },
    /// Once per telescope and run.
    PerTelescope,
    /// Once per shower or event. `key` is comparable across types.
    PerEvent { key: i64, priority: u8 },
    /// Histograms and statistics after the last event of a run.
    EndOfRun,
}

pub const PRIORITY_SHOWER: u8 = 0;
pub const PRIORITY_MC_EVENT: u8 = 1;
pub const PRIORITY_AUXILIARY: u8 = 2;
pub const PRIORITY_EVENT: u8 = 3;

/// Showers share the event number space: event numbers are
/// shower * 100 + reuse.
pub const SHOWER_KEY_SCALE: i64 = 100;

pub fn classify(block: &Block) -> BlockClass {
    let id = block.ident();
    match block.type_code() {
        HISTORY => BlockClass::RunScope { rank: 0 },
        RUN_HEADER => BlockClass::RunScope { rank: 1 },
        MC_RUN_HEADER => BlockClass::RunScope { rank: 2 },
        MC_INPUT_CONFIG => BlockClass::RunScope { rank: 3 },
        MC_SHOWER => BlockClass::PerEvent {
            key: id.saturating_mul(SHOWER_KEY_SCALE),
            priority: PRIORITY_SHOWER,
        },
        MC_EVENT => BlockClass::PerEvent {
            key: id,
            priority: PRIORITY_MC_EVENT,
        },
        MC_PE_SUM | MC_PHOTONS => BlockClass::PerEvent {
            key: id,
            priority: PRIORITY_AUXILIARY,
        },
        EVENT => BlockClass::PerEvent {
            key: id,
            priority: PRIORITY_EVENT,
        },
        HISTOGRAMS | RUN_STATISTICS | MC_RUN_STATISTICS => BlockClass::EndOfRun,
        TRIGGER_MASKS | CALIBRATION_EVENT => BlockClass::Immediate,
        t if TelescopeBlock::is_per_telescope(t) => BlockClass::PerTelescope,
        _ => BlockClass::Immediate,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Immediate,
    RunScope,
    PerTelescope,
    PerEvent,
    EndOfRun,
}

/// Sort key of a look-ahead block. Field order is significant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrderKey {
    pub run_index: u32,
    pub stage: Stage,
    pub key: i64,
    pub priority: u8,
}

impl OrderKey {
    pub fn new(run_index: u32, class: BlockClass) -> Self {
        let (stage, key, priority) = match class {
            BlockClass::Immediate => (Stage::Immediate, 0, 0),
            BlockClass::RunScope { rank } => (Stage::RunScope, rank as i64, 0),
            BlockClass::PerTelescope => (Stage::PerTelescope, 0, 0),
            BlockClass::PerEvent { key, priority } => (Stage::PerEvent, key, priority),
            BlockClass::EndOfRun => (Stage::EndOfRun, 0, 0),
        };
        Self {
            run_index,
            stage,
            key,
            priority,
        }
    }
}
