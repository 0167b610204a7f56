// crates/eventio-core/src/merge/engine.rs

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, trace, warn};

use crate::block::{Block, BlockSource, BlockWriter};
use crate::error::{EventIoError, Result};
use crate::merge::order::{classify, BlockClass};
use crate::merge::state::{MergerState, Tracked};
use crate::merge::{LostRecord, MergeOptions, MergeSummary};
use crate::records::types::{
    CALIBRATION_EVENT, EVENT, HISTOGRAMS, HISTORY, MC_EVENT, MC_INPUT_CONFIG, MC_PE_SUM,
    MC_PHOTONS, MC_RUN_HEADER, MC_RUN_STATISTICS, MC_SHOWER, RUN_HEADER, RUN_STATISTICS,
    TRIGGER_MASKS,
};
use crate::records::{
    FullEvent, McEvent, McPeSum, McShower, RunHeader, TelescopeBlock, WithTelescopeId,
};
use crate::remap::{Source, TelescopeMap, MAX_TELESCOPES};
use crate::trgmask::{TriggerMaskIndex, TriggerMaskSet};

/// Merges two block streams of the same simulated showers into one, with
/// telescopes renamed according to a [`TelescopeMap`].
pub struct StreamMerger<'m> {
    map: &'m mut TelescopeMap,
    options: MergeOptions,
    state: MergerState,
    summary: MergeSummary,
}

impl<'m> StreamMerger<'m> {
    pub fn new(map: &'m mut TelescopeMap, options: MergeOptions) -> Self {
        let state = MergerState::new(map.len());
        Self {
            map,
            options,
            state,
            summary: MergeSummary::default(),
        }
    }

    /// Trigger-mask corrections for one input, e.g. from a side file.
    pub fn set_trigger_masks(&mut self, source: Source, index: TriggerMaskIndex) {
        info!(
            source = %source,
            run = index.run(),
            entries = index.set().len(),
            "trigger mask corrections enabled"
        );
        self.state.cursor_mut(source).trgmask = Some(index);
    }

    pub fn state(&self) -> &MergerState {
        &self.state
    }

    /// Drain both inputs into `out`. `stop` is checked once per block; when
    /// it is set the loop ends after the current block and anything still
    /// pending is reported as lost.
    pub fn run<S1, S2, W>(
        mut self,
        first: &mut S1,
        second: &mut S2,
        out: &mut BlockWriter<W>,
        stop: &AtomicBool,
    ) -> Result<MergeSummary>
    where
        S1: BlockSource + ?Sized,
        S2: BlockSource + ?Sized,
        W: Write,
    {
        loop {
            if stop.load(Ordering::Relaxed) {
                self.summary.cancelled = true;
                break;
            }
            self.state.cursors[0].refill(first)?;
            self.state.cursors[1].refill(second)?;
            let Some(source) = self.state.pick() else {
                break;
            };
            let Some((block, _)) = self.state.cursor_mut(source).current.take() else {
                return Err(EventIoError::Internal(format!(
                    "{} was picked without a waiting block",
                    source
                )));
            };
            self.step(source, block, out)?;
        }

        if self.summary.cancelled {
            warn!("merge interrupted");
            self.report_lost();
        } else {
            self.flush_all(out)?;
        }
        out.flush()?;

        for c in &self.state.cursors {
            let i = c.source.index();
            self.summary.blocks_read[i] = c.blocks_read;
            self.summary.events_read[i] = c.events_read;
            debug!(source = %c.source, last_type = ?c.last_type, "last processed block type");
        }
        self.summary.blocks_written = out.blocks_written();
        info!(
            written = self.summary.events_written,
            dropped = self.summary.events_dropped,
            from_first = self.summary.events_read[0],
            from_second = self.summary.events_read[1],
            lost = self.summary.lost.len(),
            "merge finished"
        );
        Ok(self.summary)
    }

    fn step<W: Write>(&mut self, source: Source, block: Block, out: &mut BlockWriter<W>) -> Result<()> {
        let type_code = block.type_code();
        debug!(
            source = %source,
            type_code,
            ident = block.ident(),
            "processing block"
        );

        match classify(&block) {
            BlockClass::RunScope { .. } | BlockClass::EndOfRun => self.flush_all(out)?,
            BlockClass::PerEvent { key, .. } if type_code != MC_PHOTONS => {
                self.flush_before(key, out)?
            }
            _ => {}
        }

        match type_code {
            RUN_HEADER => self.run_header(source, &block, out)?,
            MC_RUN_HEADER | MC_INPUT_CONFIG | HISTORY => out.write_block(&block)?,
            MC_SHOWER => self.mc_shower(source, &block, out)?,
            MC_EVENT => self.mc_event(source, &block, out)?,
            MC_PE_SUM => self.pe_sum(source, &block)?,
            EVENT => self.event(source, &block)?,
            MC_PHOTONS => trace!(source = %source, "ignoring photon bunches"),
            CALIBRATION_EVENT => warn!(
                source = %source,
                ident = block.ident(),
                "calibration events are not merged, ignoring"
            ),
            TRIGGER_MASKS => self.trigger_masks(source, &block)?,
            HISTOGRAMS | RUN_STATISTICS | MC_RUN_STATISTICS => {
                self.end_of_run(source, &block, out)?
            }
            t if TelescopeBlock::is_per_telescope(t) => self.telescope_block(source, block, out)?,
            t => warn!(
                source = %source,
                type_code = t,
                ident = block.ident(),
                "unhandled block type ignored"
            ),
        }

        self.state.cursor_mut(source).last_type = Some(type_code);
        Ok(())
    }

    // ---- delayed commit ----

    fn flush_before<W: Write>(&mut self, key: i64, out: &mut BlockWriter<W>) -> Result<()> {
        if self.state.pending_pe_sum.map_or(false, |id| id < key) {
            self.write_pe_sum(out)?;
        }
        if self.state.pending_event.map_or(false, |id| id < key) {
            self.write_event(out)?;
        }
        Ok(())
    }

    fn flush_all<W: Write>(&mut self, out: &mut BlockWriter<W>) -> Result<()> {
        if self.state.pending_pe_sum.is_some() {
            self.write_pe_sum(out)?;
        }
        if self.state.pending_event.is_some() {
            self.write_event(out)?;
        }
        Ok(())
    }

    fn write_pe_sum<W: Write>(&mut self, out: &mut BlockWriter<W>) -> Result<()> {
        if let Some(id) = self.state.pending_pe_sum.take() {
            debug!(event = id, "writing delayed p.e. sums");
            self.state.last_written_pe_sum = Some(id);
            self.state.output.pe_sum.sum().write(out)?;
            self.summary.pe_sums_written += 1;
        }
        Ok(())
    }

    fn write_event<W: Write>(&mut self, out: &mut BlockWriter<W>) -> Result<()> {
        let Some(id) = self.state.pending_event.take() else {
            return Ok(());
        };
        if let Some(prev) = self.state.last_written_event {
            if id <= prev {
                return Err(EventIoError::Order(format!(
                    "event {} would be written after event {}",
                    id, prev
                )));
            }
        }
        self.state.last_written_event = Some(id);

        let agg = &self.state.output.event;
        if agg.passes(self.options.min_telescopes) {
            debug!(event = id, "writing delayed event data");
            let ev = agg.to_event();
            if let Some(order) = ev.component_order()? {
                if order != out.byte_order() {
                    debug!(event = id, order = ?order, "switching output byte order for pixel data");
                    out.set_byte_order(order)?;
                }
            }
            ev.write(out)?;
            self.summary.events_written += 1;
        } else {
            let c = agg.counts();
            debug!(
                event = id,
                triggered = c.triggered,
                tel_events = c.tel_events,
                min = self.options.min_telescopes,
                "event below telescope threshold, dropped"
            );
            self.summary.events_dropped += 1;
        }
        Ok(())
    }

    fn report_lost(&mut self) {
        if let Some(id) = self.state.pending_pe_sum.take() {
            warn!(event = id, "unwritten p.e. sums get lost");
            self.summary.lost.push(LostRecord::PeSum(id));
        }
        if let Some(id) = self.state.pending_event.take() {
            warn!(event = id, "unwritten event data gets lost");
            self.summary.lost.push(LostRecord::Event(id));
        }
    }

    // ---- run scope ----

    fn run_header<W: Write>(&mut self, source: Source, block: &Block, out: &mut BlockWriter<W>) -> Result<()> {
        let rh = RunHeader::read(block)?;
        info!(
            source = %source,
            run = rh.run,
            telescopes = rh.num_tel(),
            time = rh.time.seconds,
            "input starting run"
        );
        if rh.num_tel() > MAX_TELESCOPES {
            return Err(EventIoError::Config(format!(
                "run {} of {} has {} telescopes, supporting only up to {}",
                rh.run,
                source,
                rh.num_tel(),
                MAX_TELESCOPES
            )));
        }

        match source {
            Source::First => {
                if out.byte_order() != block.byte_order() {
                    info!(order = ?block.byte_order(), "output follows the byte order of input 1");
                    out.set_byte_order(block.byte_order())?;
                }
                self.state.output.new_run(self.map);
                self.state.last_shower = None;
                self.state.last_mc_event = None;
                self.state.last_written_event = None;
                self.state.last_written_pe_sum = None;
            }
            Source::Second => {
                let first = self.state.first_header.as_ref().ok_or_else(|| {
                    EventIoError::Order(format!(
                        "run header for run {} from input 2 before any run header from input 1",
                        rh.run
                    ))
                })?;
                if first.run != rh.run {
                    return Err(EventIoError::Mismatch(format!(
                        "run numbers differ: input 1 has run {}, input 2 has run {}",
                        first.run, rh.run
                    )));
                }
                if let Some((field, a, b)) = first.core_mismatch(&rh) {
                    return Err(EventIoError::Mismatch(format!(
                        "run {} headers differ in {}: input 1 has {}, input 2 has {}",
                        rh.run, field, a, b
                    )));
                }
                if first.time != rh.time {
                    info!(
                        first = first.time.seconds,
                        second = rh.time.seconds,
                        "inputs were simulated at different times"
                    );
                }
                if first.min_tel_trig != rh.min_tel_trig {
                    warn!(
                        first = first.min_tel_trig,
                        second = rh.min_tel_trig,
                        "inputs differ in default array trigger multiplicity"
                    );
                }
            }
        }

        self.map.bind_run(source, &rh.tel_ids)?;
        self.state.cursor_mut(source).start_run(rh.run);

        match source {
            Source::First => self.state.first_header = Some(rh),
            Source::Second => self.merged_header(&rh).write(out)?,
        }
        Ok(())
    }

    /// Run header of the merged output: input 1's configuration, output
    /// telescope ids 1..N with positions copied from their own input.
    fn merged_header(&self, second: &RunHeader) -> RunHeader {
        let mut rh = self.state.first_header.clone().unwrap_or_default();
        rh.tel_ids = self.map.entries().iter().map(|e| e.output_id).collect();
        rh.tel_pos = self
            .map
            .entries()
            .iter()
            .map(|e| {
                let input = match e.source {
                    Source::First => self.state.first_header.as_ref(),
                    Source::Second => Some(second),
                };
                e.input_slot
                    .zip(input)
                    .and_then(|(itel, h)| h.tel_pos.get(itel).copied())
                    .unwrap_or([0.0; 3])
            })
            .collect();
        rh
    }

    // ---- per telescope ----

    fn telescope_block<W: Write>(&mut self, source: Source, block: Block, out: &mut BlockWriter<W>) -> Result<()> {
        let tb = TelescopeBlock::from_block(block)?;
        let tel_id = tb.telescope_id();
        let Some(slot) = self.map.run_slot(source, tel_id)? else {
            debug!(
                source = %source,
                tel_id,
                type_code = tb.type_code(),
                "telescope not mapped, skipping"
            );
            return Ok(());
        };
        let entry = self.map.entry_mut(slot).ok_or_else(|| {
            EventIoError::Internal(format!("output slot {} vanished", slot))
        })?;
        if entry.received.mark(tb.type_code()) {
            debug!(
                tel_id = entry.output_id,
                type_code = tb.type_code(),
                "repeated settings block"
            );
        }
        let out_id = entry.output_id;
        trace!(tel_id, out_id, type_code = tb.type_code(), "remapped telescope block");
        out.write_block(tb.with_telescope_id(out_id).block())
    }

    // ---- per shower / event ----

    fn mc_shower<W: Write>(&mut self, source: Source, block: &Block, out: &mut BlockWriter<W>) -> Result<()> {
        let sh = McShower::read(block)?;
        self.state
            .cursor_mut(source)
            .advance(Tracked::Shower, sh.shower_num as i64)?;
        match &self.state.last_shower {
            Some(prev) if prev.shower_num == sh.shower_num => {
                if !prev.same_shower(&sh) {
                    return Err(EventIoError::Mismatch(format!(
                        "shower {} differs: input 1 has primary {} at {} TeV from ({}, {}), \
                         {} has primary {} at {} TeV from ({}, {})",
                        sh.shower_num,
                        prev.primary_id,
                        prev.energy,
                        prev.azimuth,
                        prev.altitude,
                        source,
                        sh.primary_id,
                        sh.energy,
                        sh.azimuth,
                        sh.altitude
                    )));
                }
            }
            Some(prev) if prev.shower_num > sh.shower_num => {
                return Err(EventIoError::Order(format!(
                    "shower {} from {} arrives after shower {}",
                    sh.shower_num, source, prev.shower_num
                )));
            }
            _ => {
                out.write_block(block)?;
                self.summary.showers_written += 1;
                self.state.last_shower = Some(sh);
            }
        }
        Ok(())
    }

    fn mc_event<W: Write>(&mut self, source: Source, block: &Block, out: &mut BlockWriter<W>) -> Result<()> {
        let ev = McEvent::read(block)?;
        self.state
            .cursor_mut(source)
            .advance(Tracked::McEvent, ev.event as i64)?;
        match &self.state.last_mc_event {
            Some(prev) if prev.event == ev.event => {
                if !prev.same_core(&ev) {
                    return Err(EventIoError::Mismatch(format!(
                        "MC event {} differs: core at ({}, {}) in input 1, ({}, {}) in {}",
                        ev.event, prev.xcore, prev.ycore, ev.xcore, ev.ycore, source
                    )));
                }
            }
            Some(prev) if prev.event > ev.event => {
                return Err(EventIoError::Order(format!(
                    "MC event {} from {} arrives after MC event {}",
                    ev.event, source, prev.event
                )));
            }
            _ => {
                out.write_block(block)?;
                self.state.last_mc_event = Some(ev);
            }
        }
        Ok(())
    }

    fn pe_sum(&mut self, source: Source, block: &Block) -> Result<()> {
        let pe = McPeSum::read(block)?;
        let id = block.ident();
        self.state
            .cursor_mut(source)
            .advance(Tracked::PeSum, id)?;
        match self.state.pending_pe_sum {
            Some(p) if p == id => {}
            Some(p) => {
                return Err(EventIoError::Order(format!(
                    "p.e. sums for event {} from {} arrive while event {} is pending",
                    id, source, p
                )));
            }
            None => {
                let written = self
                    .state
                    .last_written_pe_sum
                    .max(self.state.last_written_event);
                if let Some(prev) = written {
                    if id <= prev {
                        return Err(EventIoError::Order(format!(
                            "p.e. sums for event {} from {} arrive after event {} was written",
                            id, source, prev
                        )));
                    }
                }
                self.state.output.pe_sum.reset(id, pe.shower_num);
                self.state.pending_pe_sum = Some(id);
            }
        }
        let n = self.state.output.pe_sum.merge(&pe, source, self.map)?;
        debug!(event = id, source = %source, telescopes = n, "merged p.e. sums");
        Ok(())
    }

    fn event(&mut self, source: Source, block: &Block) -> Result<()> {
        let mut ev = FullEvent::read(block)?;
        let id = block.ident();
        {
            let cursor = self.state.cursor_mut(source);
            cursor.advance(Tracked::Event, id)?;
            cursor.events_read += 1;
        }

        match self.state.pending_event {
            Some(p) if p == id => {}
            Some(p) => {
                return Err(EventIoError::Order(format!(
                    "event data for event {} from {} arrive while event {} is pending",
                    id, source, p
                )));
            }
            None => {
                if let Some(prev) = self.state.last_written_event {
                    if id <= prev {
                        return Err(EventIoError::Order(format!(
                            "event {} from {} arrives after event {} was written",
                            id, source, prev
                        )));
                    }
                }
                self.state.output.event.reset(id);
                self.state.pending_event = Some(id);
            }
        }

        if let Some(ix) = self.state.cursor(source).trgmask_for_current_run() {
            for trg in &mut ev.central.triggered {
                let mask = ix.lookup(id, trg.tel_id);
                match mask {
                    Some(m) => trace!(
                        tel_id = trg.tel_id,
                        from = trg.type_mask,
                        to = m,
                        "fixing trigger type bits"
                    ),
                    None => warn!(
                        event = id,
                        tel_id = trg.tel_id,
                        from = trg.type_mask,
                        "no trigger type mask found, setting to 0"
                    ),
                }
                trg.correct_mask(mask);
            }
        }

        let c = self.state.output.event.merge(&ev, source, self.map)?;
        let n = self.state.listed_events;
        if self.options.announces_sparse_listing(n) {
            info!("listing only every 1000th event from here on");
        }
        if self.options.lists_event(n) {
            info!(
                event = id,
                source = %source,
                ntrg = c.triggered,
                ndata = c.with_data,
                ndt = c.tel_events,
                "event data merged"
            );
        }
        self.state.listed_events += 1;
        Ok(())
    }

    // ---- side tables and end of run ----

    fn trigger_masks(&mut self, source: Source, block: &Block) -> Result<()> {
        let set = TriggerMaskSet::read(block)?;
        let index = TriggerMaskIndex::build(set);
        if index.dropped() > 0 {
            warn!(
                source = %source,
                dropped = index.dropped(),
                "trigger mask entries could not be indexed"
            );
        }
        self.set_trigger_masks(source, index);
        Ok(())
    }

    fn end_of_run<W: Write>(&mut self, source: Source, block: &Block, out: &mut BlockWriter<W>) -> Result<()> {
        let run_index = self.state.cursor(source).run_index;
        let owner = *self
            .state
            .end_of_run_owner
            .entry((run_index, block.type_code()))
            .or_insert(source);
        if owner == source {
            out.write_block(block)
        } else {
            debug!(
                source = %source,
                type_code = block.type_code(),
                "end-of-run block already taken from the other input, dropped"
            );
            Ok(())
        }
    }
}
