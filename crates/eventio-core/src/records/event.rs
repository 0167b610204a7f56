// crates/eventio-core/src/records/event.rs
//
// Triggered event (block 2010). Central trigger data, tracking and the
// per-telescope header are decoded; pixel-level blocks (ADC sums and
// samples, pulse timing, pixel lists, images) are carried as opaque
// components that only get their telescope identity rewritten.

use std::io::Write;

use tracing::trace;

use crate::block::{Block, BlockHeader, BlockWriter, ItemCursor};
use crate::codec::ByteOrder;
use crate::error::{EventIoError, Result};
use crate::records::types::{
    has_packed_tel_ident, repack_tel_ident, tel_event_tel_id, tel_event_type,
    track_event_tel_id, track_event_type, unpack_tel_ident, ADC_SAMPLES, ADC_SUMS, CENTRAL_EVENT,
    EVENT, PIXEL_LIST, PIXEL_TIMING, TEL_EVENT_HEADER,
};
use crate::records::{check_block, check_header, HTime, WithTelescopeId};

/// Trigger time-by-type value meaning "not measured".
pub const TIME_NOT_MEASURED: f32 = 9999.0;

/// One entry of the central trigger list.
#[derive(Clone, Debug, PartialEq)]
pub struct TelTrigger {
    pub tel_id: i32,
    pub time: f32,
    /// Bit 0 majority, bit 1 analog sum, bit 2 digital sum.
    pub type_mask: i32,
    pub time_by_type: [f32; 3],
}

impl TelTrigger {
    /// Apply a trigger-type mask from a correction table. Times of trigger
    /// types whose bit is absent are lost.
    pub fn correct_mask(&mut self, mask: Option<i32>) {
        match mask {
            None => {
                self.type_mask = 0;
                self.time_by_type = [TIME_NOT_MEASURED; 3];
            }
            Some(m) => {
                for (bit, t) in self.time_by_type.iter_mut().enumerate() {
                    if m & (1 << bit) == 0 {
                        *t = TIME_NOT_MEASURED;
                    }
                }
                self.type_mask = m;
            }
        }
    }
}

impl WithTelescopeId for TelTrigger {
    fn telescope_id(&self) -> i32 {
        self.tel_id
    }

    fn with_telescope_id(&self, tel_id: i32) -> Self {
        Self {
            tel_id,
            time: self.time,
            type_mask: self.type_mask,
            time_by_type: self.time_by_type,
        }
    }
}

/// Central trigger data (sub-block 2009, ident = global count).
///
/// Layout: cpu_time:HTime gps_time:HTime
/// ntrg:count { tel_id:scount time:f32 type_mask:count time_by_type:f32[3] }*ntrg
/// ndata:count { tel_id:scount }*ndata
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CentralEvent {
    pub glob_count: i32,
    pub cpu_time: HTime,
    pub gps_time: HTime,
    pub triggered: Vec<TelTrigger>,
    pub with_data: Vec<i32>,
}

impl CentralEvent {
    fn read(c: &mut ItemCursor<'_>, h: &BlockHeader) -> Result<Self> {
        check_header(h, CENTRAL_EVENT, 2)?;
        let cpu_time = HTime::read(c)?;
        let gps_time = HTime::read(c)?;
        let ntrg = c.get_count32()? as usize;
        if ntrg > c.remaining() {
            return Err(EventIoError::Format(format!(
                "central trigger lists {} telescopes in {} bytes",
                ntrg,
                c.remaining()
            )));
        }
        let mut triggered = Vec::with_capacity(ntrg);
        for _ in 0..ntrg {
            triggered.push(TelTrigger {
                tel_id: c.get_scount32()?,
                time: c.get()?,
                type_mask: c.get_count32()? as i32,
                time_by_type: [c.get()?, c.get()?, c.get()?],
            });
        }
        let ndata = c.get_count32()? as usize;
        if ndata > c.remaining() {
            return Err(EventIoError::Format(format!(
                "central trigger lists {} telescopes with data in {} bytes",
                ndata,
                c.remaining()
            )));
        }
        let with_data = (0..ndata)
            .map(|_| c.get_scount32())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            glob_count: h.ident as i32,
            cpu_time,
            gps_time,
            triggered,
            with_data,
        })
    }

    fn write<W: Write>(&self, w: &mut BlockWriter<W>) -> Result<()> {
        let h = w.begin_block(CENTRAL_EVENT, 2, self.glob_count as i64)?;
        self.cpu_time.write(w)?;
        self.gps_time.write(w)?;
        w.put_count(self.triggered.len() as u64)?;
        for t in &self.triggered {
            w.put_scount(t.tel_id as i64)?;
            w.put(t.time)?;
            let mask = u64::try_from(t.type_mask).map_err(|_| {
                EventIoError::Format(format!(
                    "telescope {} in event {} has negative trigger type mask {}",
                    t.tel_id, self.glob_count, t.type_mask
                ))
            })?;
            w.put_count(mask)?;
            w.put_slice(&t.time_by_type)?;
        }
        w.put_count(self.with_data.len() as u64)?;
        for &id in &self.with_data {
            w.put_scount(id as i64)?;
        }
        w.end_block(h)
    }
}

/// Telescope pointing for one event (sub-block 2100 + telescope, ident =
/// telescope id).
///
/// Layout: flags:u8 (bit 0 raw, bit 1 corrected)
/// [raw] azimuth:f32 altitude:f32  [corrected] azimuth:f32 altitude:f32
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackEvent {
    pub tel_id: i32,
    pub raw: Option<(f32, f32)>,
    pub corrected: Option<(f32, f32)>,
}

impl TrackEvent {
    fn read(c: &mut ItemCursor<'_>, h: &BlockHeader, tel_id: i32) -> Result<Self> {
        if h.version > 0 {
            return Err(EventIoError::Format(format!(
                "unsupported tracking event version {} for telescope {}",
                h.version, tel_id
            )));
        }
        let flags = c.get::<u8>()?;
        let raw = if flags & 1 != 0 {
            Some((c.get()?, c.get()?))
        } else {
            None
        };
        let corrected = if flags & 2 != 0 {
            Some((c.get()?, c.get()?))
        } else {
            None
        };
        Ok(Self {
            tel_id,
            raw,
            corrected,
        })
    }

    fn write<W: Write>(&self, w: &mut BlockWriter<W>) -> Result<()> {
        let h = w.begin_block(track_event_type(self.tel_id), 0, self.tel_id as i64)?;
        let flags = self.raw.is_some() as u8 | (self.corrected.is_some() as u8) << 1;
        w.put(flags)?;
        if let Some((az, alt)) = self.raw {
            w.put(az)?;
            w.put(alt)?;
        }
        if let Some((az, alt)) = self.corrected {
            w.put(az)?;
            w.put(alt)?;
        }
        w.end_block(h)
    }
}

impl WithTelescopeId for TrackEvent {
    fn telescope_id(&self) -> i32 {
        self.tel_id
    }

    fn with_telescope_id(&self, tel_id: i32) -> Self {
        Self {
            tel_id,
            raw: self.raw,
            corrected: self.corrected,
        }
    }
}

/// What a per-telescope component block holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentKind {
    AdcSums,
    AdcSamples,
    PixelTiming,
    PixelList,
    Other(u32),
}

/// Pixel-level sub-block of a telescope event, kept as raw bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct AdcData {
    pub type_code: u32,
    pub version: u16,
    pub ident: i64,
    pub only_sub_blocks: bool,
    pub byte_order: ByteOrder,
    pub payload: Vec<u8>,
}

impl AdcData {
    pub fn kind(&self) -> ComponentKind {
        match self.type_code {
            ADC_SUMS => ComponentKind::AdcSums,
            ADC_SAMPLES => ComponentKind::AdcSamples,
            PIXEL_TIMING => ComponentKind::PixelTiming,
            PIXEL_LIST => ComponentKind::PixelList,
            other => ComponentKind::Other(other),
        }
    }

    fn header(&self) -> BlockHeader {
        BlockHeader {
            type_code: self.type_code,
            version: self.version,
            ident: self.ident,
            user_flag: false,
            extended: false,
            only_sub_blocks: self.only_sub_blocks,
            length: self.payload.len(),
            byte_order: self.byte_order,
            depth: 2,
            payload_offset: 0,
        }
    }
}

impl WithTelescopeId for AdcData {
    fn telescope_id(&self) -> i32 {
        if has_packed_tel_ident(self.type_code) {
            unpack_tel_ident(self.ident)
        } else if self.type_code == PIXEL_LIST {
            (self.ident % 1_000_000) as i32
        } else {
            self.ident as i32
        }
    }

    fn with_telescope_id(&self, tel_id: i32) -> Self {
        let ident = if has_packed_tel_ident(self.type_code) {
            repack_tel_ident(self.ident, tel_id)
        } else if self.type_code == PIXEL_LIST {
            (self.ident / 1_000_000) * 1_000_000 + tel_id as i64
        } else {
            tel_id as i64
        };
        Self {
            type_code: self.type_code,
            version: self.version,
            ident,
            only_sub_blocks: self.only_sub_blocks,
            byte_order: self.byte_order,
            payload: self.payload.clone(),
        }
    }
}

/// Data of one telescope in one event (container 2200 + telescope,
/// ident = global count).
///
/// The leading header sub-block (2011, ident = telescope id) has the layout:
/// loc_count:i32 glob_count:i32 cpu_time:HTime gps_time:HTime
/// trg_source:i16 nsect:count { sector:count time:f32 }*nsect
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TelEvent {
    pub tel_id: i32,
    pub loc_count: i32,
    pub glob_count: i32,
    pub cpu_time: HTime,
    pub gps_time: HTime,
    pub trg_source: i16,
    pub list_trgsect: Vec<i32>,
    pub time_trgsect: Vec<f32>,
    pub components: Vec<AdcData>,
}

impl TelEvent {
    fn read(c: &mut ItemCursor<'_>, h: &BlockHeader, tel_id: i32) -> Result<Self> {
        let head = c.open_sub_block(TEL_EVENT_HEADER)?;
        if head.ident as i32 != tel_id {
            return Err(EventIoError::Format(format!(
                "telescope event block for telescope {} carries a header for telescope {}",
                tel_id, head.ident
            )));
        }
        let loc_count = c.get::<i32>()?;
        let glob_count = c.get::<i32>()?;
        let cpu_time = HTime::read(c)?;
        let gps_time = HTime::read(c)?;
        let trg_source = c.get::<i16>()?;
        let nsect = c.get_count32()? as usize;
        if nsect > c.remaining() {
            return Err(EventIoError::Format(format!(
                "telescope {} lists {} trigger sectors in {} bytes",
                tel_id,
                nsect,
                c.remaining()
            )));
        }
        let mut list_trgsect = Vec::with_capacity(nsect);
        let mut time_trgsect = Vec::with_capacity(nsect);
        for _ in 0..nsect {
            list_trgsect.push(c.get_count32()? as i32);
            time_trgsect.push(c.get::<f32>()?);
        }
        c.close_sub_block(&head)?;

        let mut components = Vec::new();
        while let Some(sub) = c.skip_sub_block()? {
            components.push(AdcData {
                type_code: sub.type_code,
                version: sub.version,
                ident: sub.ident,
                only_sub_blocks: sub.only_sub_blocks,
                byte_order: sub.byte_order,
                payload: c.payload_of(&sub)?.to_vec(),
            });
        }
        trace!(
            tel_id,
            glob = h.ident,
            components = components.len(),
            "telescope event"
        );
        Ok(Self {
            tel_id,
            loc_count,
            glob_count,
            cpu_time,
            gps_time,
            trg_source,
            list_trgsect,
            time_trgsect,
            components,
        })
    }

    fn write<W: Write>(&self, w: &mut BlockWriter<W>) -> Result<()> {
        let outer = w.begin_container(tel_event_type(self.tel_id), 1, self.glob_count as i64)?;
        let h = w.begin_block(TEL_EVENT_HEADER, 2, self.tel_id as i64)?;
        w.put(self.loc_count)?;
        w.put(self.glob_count)?;
        self.cpu_time.write(w)?;
        self.gps_time.write(w)?;
        w.put(self.trg_source)?;
        w.put_count(self.list_trgsect.len() as u64)?;
        for (s, t) in self.list_trgsect.iter().zip(&self.time_trgsect) {
            let sector = u64::try_from(*s).map_err(|_| {
                EventIoError::Format(format!(
                    "telescope {} in event {} has negative trigger sector {}",
                    self.tel_id, self.glob_count, s
                ))
            })?;
            w.put_count(sector)?;
            w.put(*t)?;
        }
        w.end_block(h)?;
        for comp in &self.components {
            w.put_sub_block(&comp.header(), &comp.payload)?;
        }
        w.end_block(outer)
    }
}

impl WithTelescopeId for TelEvent {
    fn telescope_id(&self) -> i32 {
        self.tel_id
    }

    fn with_telescope_id(&self, tel_id: i32) -> Self {
        Self {
            tel_id,
            loc_count: self.loc_count,
            glob_count: self.glob_count,
            cpu_time: self.cpu_time,
            gps_time: self.gps_time,
            trg_source: self.trg_source,
            list_trgsect: self.list_trgsect.clone(),
            time_trgsect: self.time_trgsect.clone(),
            components: self
                .components
                .iter()
                .map(|comp| comp.with_telescope_id(tel_id))
                .collect(),
        }
    }
}

/// Full triggered event (container 2010, ident = event number).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FullEvent {
    pub event: i32,
    pub central: CentralEvent,
    pub tracks: Vec<TrackEvent>,
    pub tels: Vec<TelEvent>,
}

impl FullEvent {
    pub fn read(block: &Block) -> Result<Self> {
        check_block(block, EVENT, 0)?;
        let mut c = block.cursor();
        let mut ev = FullEvent {
            event: block.ident() as i32,
            ..Default::default()
        };
        while let Some(sub) = c.open_next()? {
            if sub.type_code == CENTRAL_EVENT {
                ev.central = CentralEvent::read(&mut c, &sub)?;
            } else if let Some(tel_id) = track_event_tel_id(sub.type_code) {
                ev.tracks.push(TrackEvent::read(&mut c, &sub, tel_id)?);
            } else if let Some(tel_id) = tel_event_tel_id(sub.type_code) {
                ev.tels.push(TelEvent::read(&mut c, &sub, tel_id)?);
            } else {
                trace!(
                    event = ev.event,
                    type_code = sub.type_code,
                    "skipping event sub-block"
                );
            }
            c.close_sub_block(&sub)?;
        }
        Ok(ev)
    }

    pub fn write<W: Write>(&self, w: &mut BlockWriter<W>) -> Result<()> {
        let h = w.begin_container(EVENT, 0, self.event as i64)?;
        self.central.write(w)?;
        for t in &self.tracks {
            t.write(w)?;
        }
        for t in &self.tels {
            t.write(w)?;
        }
        w.end_block(h)
    }

    /// Telescopes with event data.
    pub fn num_teldata(&self) -> usize {
        self.tels.len()
    }

    /// Byte order the opaque components were recorded in, which the whole
    /// event has to be written in. `None` without components.
    pub fn component_order(&self) -> Result<Option<ByteOrder>> {
        let mut found: Option<&AdcData> = None;
        for comp in self.tels.iter().flat_map(|t| &t.components) {
            match found {
                None => found = Some(comp),
                Some(first) if first.byte_order != comp.byte_order => {
                    return Err(EventIoError::Format(format!(
                        "event {} mixes {:?} component type {} (id {}) with {:?} component type {} (id {})",
                        self.event,
                        first.byte_order,
                        first.type_code,
                        first.ident,
                        comp.byte_order,
                        comp.type_code,
                        comp.ident
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(found.map(|c| c.byte_order))
    }
}
