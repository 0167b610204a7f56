// crates/eventio-core/src/merge/aggregate.rs
//
// Merged records under construction. Storage is indexed by output slot and
// reused from event to event; a new run replaces it wholesale.

use crate::error::Result;
use crate::records::{
    CentralEvent, FullEvent, McPeSum, TelEvent, TelPeSum, TrackEvent, WithTelescopeId,
};
use crate::remap::{Source, TelescopeMap};

/// Telescope counts of a merged event after adding one input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventCounts {
    pub triggered: usize,
    pub with_data: usize,
    pub tel_events: usize,
}

#[derive(Debug)]
pub struct EventAggregate {
    pub event: i64,
    central: CentralEvent,
    tracks: Vec<Option<TrackEvent>>,
    tels: Vec<Option<TelEvent>>,
    track_order: Vec<usize>,
    data_order: Vec<usize>,
}

impl EventAggregate {
    pub fn new(num_tel: usize) -> Self {
        Self {
            event: 0,
            central: CentralEvent::default(),
            tracks: vec![None; num_tel],
            tels: vec![None; num_tel],
            track_order: Vec::with_capacity(num_tel),
            data_order: Vec::with_capacity(num_tel),
        }
    }

    /// Forget the previous event; storage stays allocated.
    pub fn reset(&mut self, event: i64) {
        self.event = event;
        self.central.glob_count = 0;
        self.central.triggered.clear();
        self.central.with_data.clear();
        for slot in &self.track_order {
            self.tracks[*slot] = None;
        }
        for slot in &self.data_order {
            self.tels[*slot] = None;
        }
        self.track_order.clear();
        self.data_order.clear();
    }

    /// Add the telescopes of one input's event record, renamed to their
    /// output ids. Telescopes without a mapping are left out.
    pub fn merge(
        &mut self,
        input: &FullEvent,
        source: Source,
        map: &TelescopeMap,
    ) -> Result<EventCounts> {
        let cap = self.tels.len();
        self.central.glob_count = input.central.glob_count;
        self.central.cpu_time = input.central.cpu_time;
        self.central.gps_time = input.central.gps_time;

        for trg in &input.central.triggered {
            if self.central.triggered.len() >= cap {
                break;
            }
            if let Some(out) = output_id(map, source, trg.tel_id)? {
                self.central.triggered.push(trg.with_telescope_id(out));
            }
        }
        for &tel_id in &input.central.with_data {
            if self.central.with_data.len() >= cap {
                break;
            }
            if let Some(out) = output_id(map, source, tel_id)? {
                self.central.with_data.push(out);
            }
        }

        for trk in &input.tracks {
            if let Some(slot) = map.run_slot(source, trk.tel_id)? {
                let out = map.entries()[slot].output_id;
                if self.tracks[slot].is_none() {
                    self.track_order.push(slot);
                }
                self.tracks[slot] = Some(trk.with_telescope_id(out));
            }
        }
        for tel in &input.tels {
            if let Some(slot) = map.run_slot(source, tel.tel_id)? {
                let out = map.entries()[slot].output_id;
                if self.tels[slot].is_none() {
                    self.data_order.push(slot);
                }
                self.tels[slot] = Some(tel.with_telescope_id(out));
            }
        }

        Ok(self.counts())
    }

    pub fn counts(&self) -> EventCounts {
        EventCounts {
            triggered: self.central.triggered.len(),
            with_data: self.central.with_data.len(),
            tel_events: self.data_order.len(),
        }
    }

    /// Whether enough telescopes took part to keep the event.
    pub fn passes(&self, min_telescopes: usize) -> bool {
        let c = self.counts();
        c.tel_events >= min_telescopes
            || c.triggered >= min_telescopes
            || c.with_data >= min_telescopes
    }

    pub fn to_event(&self) -> FullEvent {
        FullEvent {
            event: self.event as i32,
            central: self.central.clone(),
            tracks: self
                .track_order
                .iter()
                .filter_map(|&s| self.tracks[s].clone())
                .collect(),
            tels: self
                .data_order
                .iter()
                .filter_map(|&s| self.tels[s].clone())
                .collect(),
        }
    }
}

#[derive(Debug)]
pub struct PeSumAggregate {
    sum: McPeSum,
}

impl PeSumAggregate {
    pub fn new(map_ids: impl Iterator<Item = i32>) -> Self {
        Self {
            sum: McPeSum {
                event: 0,
                shower_num: 0,
                tels: map_ids.map(TelPeSum::empty).collect(),
            },
        }
    }

    pub fn event(&self) -> i64 {
        self.sum.event as i64
    }

    pub fn reset(&mut self, event: i64, shower_num: i32) {
        self.sum.event = event as i32;
        self.sum.shower_num = shower_num;
        for t in &mut self.sum.tels {
            *t = TelPeSum::empty(t.tel_id);
        }
    }

    pub fn merge(&mut self, input: &McPeSum, source: Source, map: &TelescopeMap) -> Result<usize> {
        let mut n = 0;
        for t in &input.tels {
            if let Some(slot) = map.run_slot(source, t.tel_id)? {
                let out = map.entries()[slot].output_id;
                if let Some(dst) = self.sum.tels.get_mut(slot) {
                    *dst = t.with_telescope_id(out);
                    n += 1;
                }
            }
        }
        Ok(n)
    }

    pub fn sum(&self) -> &McPeSum {
        &self.sum
    }
}

/// Merged output state that persists between blocks.
#[derive(Debug)]
pub struct OutputAggregate {
    pub event: EventAggregate,
    pub pe_sum: PeSumAggregate,
}

impl OutputAggregate {
    pub fn new(num_tel: usize) -> Self {
        Self {
            event: EventAggregate::new(num_tel),
            pe_sum: PeSumAggregate::new(1..=num_tel as i32),
        }
    }

    /// Fresh per-telescope storage for a new run.
    pub fn new_run(&mut self, map: &TelescopeMap) {
        self.event = EventAggregate::new(map.len());
        self.pe_sum = PeSumAggregate::new(map.entries().iter().map(|e| e.output_id));
    }
}

fn output_id(map: &TelescopeMap, source: Source, tel_id: i32) -> Result<Option<i32>> {
    Ok(map
        .run_slot(source, tel_id)?
        .map(|slot| map.entries()[slot].output_id))
}
