// Shared fixtures for the integration tests. Not every test file uses
// every helper.
#![allow(dead_code)]

use std::sync::atomic::AtomicBool;

use eventio_core::block::{Block, BlockReader, BlockWriter};
use eventio_core::records::types::{ADC_SAMPLES, CAMERA_SETTINGS, PIXEL_LIST, TEL_MONITORING};
use eventio_core::records::{
    AdcData, CentralEvent, FullEvent, McEvent, McPeSum, McShower, RunHeader, TelEvent, TelPeSum,
    TelTrigger,
};
use eventio_core::{ByteOrder, MergeOptions, MergeSummary, Result, StreamMerger, TelescopeMap};
use eventio_core::TriggerMaskSet;

pub fn blocks_of(bytes: &[u8]) -> Vec<Block> {
    let mut r = BlockReader::new(bytes);
    let mut out = Vec::new();
    while let Some(b) = r.next_block().unwrap() {
        out.push(b);
    }
    out
}

pub fn run_header(run: i32, tel_ids: &[i32], x_offset: f32) -> RunHeader {
    RunHeader {
        run,
        run_type: -1,
        tracking_mode: 0,
        direction: [0.0, 1.2],
        conv_depth: 0.0,
        tel_ids: tel_ids.to_vec(),
        tel_pos: tel_ids
            .iter()
            .map(|&t| [x_offset + 10.0 * t as f32, 0.0, 5.0])
            .collect(),
        min_tel_trig: 2,
        target: "sim".to_string(),
        observer: "nobody".to_string(),
        ..Default::default()
    }
}

pub fn shower(n: i32) -> McShower {
    McShower {
        shower_num: n,
        primary_id: 1,
        energy: 0.5 * n as f32,
        azimuth: 0.0,
        altitude: 1.2,
        ..Default::default()
    }
}

pub fn mc_event(event: i32) -> McEvent {
    McEvent {
        event,
        shower_num: event / 100,
        xcore: event as f32,
        ycore: -(event as f32),
        aweight: 1.0,
    }
}

pub fn event(event: i32, tels: &[i32]) -> FullEvent {
    FullEvent {
        event,
        central: CentralEvent {
            glob_count: event,
            triggered: tels
                .iter()
                .map(|&t| TelTrigger {
                    tel_id: t,
                    time: 1.0,
                    type_mask: 1,
                    time_by_type: [5.0, 6.0, 7.0],
                })
                .collect(),
            with_data: tels.to_vec(),
            ..Default::default()
        },
        tracks: Vec::new(),
        tels: tels
            .iter()
            .map(|&t| TelEvent {
                tel_id: t,
                loc_count: event,
                glob_count: event,
                ..Default::default()
            })
            .collect(),
    }
}

/// Flag bit kept next to the packed telescope id of pixel components.
pub const SAMPLES_FLAG: i64 = 0x100;

/// Like [`event`], with ADC samples and a pixel list per telescope,
/// recorded in `order`.
pub fn event_with_pixels(event_num: i32, tels: &[i32], order: ByteOrder) -> FullEvent {
    let mut ev = event(event_num, tels);
    for tel in &mut ev.tels {
        let t = tel.tel_id as i64;
        tel.components = vec![
            AdcData {
                type_code: ADC_SAMPLES,
                version: 3,
                ident: SAMPLES_FLAG | t,
                only_sub_blocks: false,
                byte_order: order,
                payload: vec![t as u8; 6],
            },
            AdcData {
                type_code: PIXEL_LIST,
                version: 0,
                ident: 2_000_000 + t,
                only_sub_blocks: false,
                byte_order: order,
                payload: vec![0, 1, 2, t as u8],
            },
        ];
    }
    ev
}

pub fn pe_sum(event: i32, tels: &[i32]) -> McPeSum {
    McPeSum {
        event,
        shower_num: event / 100,
        tels: tels
            .iter()
            .map(|&t| TelPeSum {
                num_pe: 10 * t,
                pix_pe: vec![t as u32; 3],
                ..TelPeSum::empty(t)
            })
            .collect(),
    }
}

/// Builds a block stream in memory, one record at a time.
pub struct Stream {
    w: BlockWriter<Vec<u8>>,
}

impl Stream {
    pub fn new() -> Self {
        Self {
            w: BlockWriter::new(Vec::new()),
        }
    }

    pub fn with_order(order: ByteOrder) -> Self {
        Self {
            w: BlockWriter::new(Vec::new()).with_byte_order(order),
        }
    }

    pub fn run_header(mut self, rh: &RunHeader) -> Self {
        rh.write(&mut self.w).unwrap();
        self
    }

    pub fn settings(mut self, tel_id: i32, tag: i32) -> Self {
        let h = self.w.begin_block(CAMERA_SETTINGS, 0, tel_id as i64).unwrap();
        self.w.put(tag).unwrap();
        self.w.end_block(h).unwrap();
        self
    }

    pub fn monitoring(mut self, ident: i64, tag: i32) -> Self {
        let h = self.w.begin_block(TEL_MONITORING, 0, ident).unwrap();
        self.w.put(tag).unwrap();
        self.w.end_block(h).unwrap();
        self
    }

    pub fn raw(mut self, type_code: u32, ident: i64, tag: i32) -> Self {
        let h = self.w.begin_block(type_code, 0, ident).unwrap();
        self.w.put(tag).unwrap();
        self.w.end_block(h).unwrap();
        self
    }

    pub fn shower(mut self, n: i32) -> Self {
        shower(n).write(&mut self.w).unwrap();
        self
    }

    pub fn mc_event(mut self, ev: i32) -> Self {
        mc_event(ev).write(&mut self.w).unwrap();
        self
    }

    pub fn event(mut self, ev: i32, tels: &[i32]) -> Self {
        event(ev, tels).write(&mut self.w).unwrap();
        self
    }

    pub fn full_event(mut self, ev: &FullEvent) -> Self {
        ev.write(&mut self.w).unwrap();
        self
    }

    pub fn pe_sum(mut self, ev: i32, tels: &[i32]) -> Self {
        pe_sum(ev, tels).write(&mut self.w).unwrap();
        self
    }

    pub fn trigger_masks(mut self, set: &TriggerMaskSet) -> Self {
        set.write(&mut self.w).unwrap();
        self
    }

    pub fn bytes(self) -> Vec<u8> {
        self.w.into_inner().unwrap()
    }

    pub fn blocks(self) -> Vec<Block> {
        blocks_of(&self.bytes())
    }
}

/// Merge two in-memory streams and decode the output.
pub fn merge(
    map_text: &str,
    first: Vec<Block>,
    second: Vec<Block>,
    options: MergeOptions,
) -> Result<(MergeSummary, Vec<Block>)> {
    let mut map = TelescopeMap::load(map_text)?;
    let mut out = BlockWriter::new(Vec::new());
    let stop = AtomicBool::new(false);
    let summary = StreamMerger::new(&mut map, options).run(
        &mut first.into_iter(),
        &mut second.into_iter(),
        &mut out,
        &stop,
    )?;
    let bytes = out.into_inner()?;
    Ok((summary, blocks_of(&bytes)))
}

pub fn idents_of(blocks: &[Block], type_code: u32) -> Vec<i64> {
    blocks
        .iter()
        .filter(|b| b.type_code() == type_code)
        .map(|b| b.ident())
        .collect()
}

/// Two telescopes from each input: input 1 -> 1, 2 and input 2 -> 3, 4.
pub const MAP_2X2: &str = "# two telescopes from each input\n1 1-2\n2 1,2\n";
