mod common;

use std::sync::atomic::{AtomicBool, Ordering};

use common::*;
use eventio_core::block::{Block, BlockSource, BlockWriter};
use eventio_core::records::types::{
    ADC_SAMPLES, CAMERA_SETTINGS, EVENT, HISTOGRAMS, MC_EVENT, MC_PE_SUM, MC_SHOWER, PIXEL_LIST,
    RUN_HEADER, RUN_STATISTICS, TEL_MONITORING,
};
use eventio_core::records::{FullEvent, McPeSum, RunHeader, TIME_NOT_MEASURED};
use eventio_core::{
    ByteOrder, EventIoError, LostRecord, MergeOptions, StreamMerger, TelescopeMap,
    TriggerMaskSet,
};

fn first_input(events: &[i32]) -> Stream {
    let mut s = Stream::new()
        .run_header(&run_header(7, &[1, 2], 0.0))
        .settings(1, 11)
        .settings(2, 12)
        .shower(1);
    for &ev in events {
        s = s.mc_event(ev).event(ev, &[1, 2]);
    }
    s
}

fn second_input(events: &[i32]) -> Stream {
    let mut s = Stream::new()
        .run_header(&run_header(7, &[1, 2], 500.0))
        .settings(1, 21)
        .settings(2, 22)
        .shower(1);
    for &ev in events {
        s = s.mc_event(ev).event(ev, &[1, 2]);
    }
    s
}

fn events_of(blocks: &[Block]) -> Vec<FullEvent> {
    blocks
        .iter()
        .filter(|b| b.type_code() == EVENT)
        .map(|b| FullEvent::read(b).unwrap())
        .collect()
}

#[test]
fn interleaves_events_by_number() {
    let s1 = first_input(&[101, 102, 104]).blocks();
    let s2 = second_input(&[101, 103, 104]).blocks();
    let (summary, out) = merge(MAP_2X2, s1, s2, MergeOptions::default()).unwrap();

    assert_eq!(idents_of(&out, EVENT), vec![101, 102, 103, 104]);
    assert_eq!(idents_of(&out, MC_EVENT), vec![101, 102, 103, 104]);
    assert_eq!(idents_of(&out, MC_SHOWER), vec![1]);
    assert_eq!(idents_of(&out, RUN_HEADER), vec![7]);
    assert_eq!(summary.events_written, 4);
    assert_eq!(summary.events_dropped, 0);
    assert!(summary.lost.is_empty());
    assert!(!summary.cancelled);

    let events = events_of(&out);
    let ids = |e: &FullEvent| e.tels.iter().map(|t| t.tel_id).collect::<Vec<_>>();
    assert_eq!(ids(&events[0]), vec![1, 2, 3, 4]);
    assert_eq!(ids(&events[1]), vec![1, 2]);
    assert_eq!(ids(&events[2]), vec![3, 4]);
    assert_eq!(events[0].central.with_data, vec![1, 2, 3, 4]);
    assert_eq!(
        events[2]
            .central
            .triggered
            .iter()
            .map(|t| t.tel_id)
            .collect::<Vec<_>>(),
        vec![3, 4]
    );
}

#[test]
fn merged_run_header_numbers_telescopes_from_one() {
    let s1 = first_input(&[101]).blocks();
    let s2 = second_input(&[101]).blocks();
    let (_, out) = merge(MAP_2X2, s1, s2, MergeOptions::default()).unwrap();

    let rh = out
        .iter()
        .find(|b| b.type_code() == RUN_HEADER)
        .map(|b| RunHeader::read(b).unwrap())
        .unwrap();
    assert_eq!(rh.tel_ids, vec![1, 2, 3, 4]);
    let xs: Vec<f32> = rh.tel_pos.iter().map(|p| p[0]).collect();
    assert_eq!(xs, vec![10.0, 20.0, 510.0, 520.0]);
}

#[test]
fn settings_blocks_get_output_ids() {
    let s1 = first_input(&[]).blocks();
    let s2 = second_input(&[]).blocks();
    let (_, out) = merge(MAP_2X2, s1, s2, MergeOptions::default()).unwrap();

    let settings: Vec<(i64, i32)> = out
        .iter()
        .filter(|b| b.type_code() == CAMERA_SETTINGS)
        .map(|b| (b.ident(), b.cursor().get::<i32>().unwrap()))
        .collect();
    assert_eq!(settings, vec![(1, 11), (2, 12), (3, 21), (4, 22)]);
}

#[test]
fn unmapped_telescopes_are_left_out() {
    let s1 = first_input(&[101]).blocks();
    let s2 = second_input(&[101]).blocks();
    let (_, out) = merge("1 1\n2 2\n", s1, s2, MergeOptions::default()).unwrap();

    assert_eq!(idents_of(&out, CAMERA_SETTINGS), vec![1, 2]);
    let events = events_of(&out);
    assert_eq!(events.len(), 1);
    let tels: Vec<i32> = events[0].tels.iter().map(|t| t.tel_id).collect();
    assert_eq!(tels, vec![1, 2]);
}

#[test]
fn packed_monitoring_ident_keeps_flag_bits() {
    let s1 = first_input(&[]).blocks();
    let s2 = Stream::new()
        .run_header(&run_header(7, &[1, 2], 0.0))
        .monitoring(0x0000_0500 | 2, 99)
        .blocks();
    let (_, out) = merge(MAP_2X2, s1, s2, MergeOptions::default()).unwrap();
    assert_eq!(idents_of(&out, TEL_MONITORING), vec![0x0000_0504]);
}

#[test]
fn events_below_threshold_are_dropped() {
    let s1 = first_input(&[101, 102, 104]).blocks();
    let s2 = second_input(&[101, 103, 104]).blocks();
    let options = MergeOptions {
        min_telescopes: 3,
        ..MergeOptions::default()
    };
    let (summary, out) = merge(MAP_2X2, s1, s2, options).unwrap();

    assert_eq!(idents_of(&out, EVENT), vec![101, 104]);
    assert_eq!(summary.events_written, 2);
    assert_eq!(summary.events_dropped, 2);
}

#[test]
fn threshold_is_inclusive() {
    let s1 = first_input(&[102]).blocks();
    let s2 = second_input(&[]).blocks();
    let options = MergeOptions {
        min_telescopes: 2,
        ..MergeOptions::default()
    };
    let (_, out) = merge(MAP_2X2, s1, s2, options).unwrap();
    assert_eq!(idents_of(&out, EVENT), vec![102]);
}

#[test]
fn pe_sums_are_merged_and_written_before_their_event() {
    let s1 = Stream::new()
        .run_header(&run_header(7, &[1, 2], 0.0))
        .shower(1)
        .mc_event(101)
        .pe_sum(101, &[1, 2])
        .event(101, &[1, 2])
        .blocks();
    let s2 = Stream::new()
        .run_header(&run_header(7, &[1, 2], 0.0))
        .shower(1)
        .mc_event(101)
        .pe_sum(101, &[1])
        .event(101, &[1])
        .blocks();
    let (summary, out) = merge(MAP_2X2, s1, s2, MergeOptions::default()).unwrap();

    let order: Vec<u32> = out
        .iter()
        .map(|b| b.type_code())
        .filter(|&t| t == MC_PE_SUM || t == EVENT)
        .collect();
    assert_eq!(order, vec![MC_PE_SUM, EVENT]);
    assert_eq!(summary.pe_sums_written, 1);

    let pe = out
        .iter()
        .find(|b| b.type_code() == MC_PE_SUM)
        .map(|b| McPeSum::read(b).unwrap())
        .unwrap();
    assert_eq!(pe.event, 101);
    let got: Vec<(i32, i32)> = pe.tels.iter().map(|t| (t.tel_id, t.num_pe)).collect();
    assert_eq!(got, vec![(1, 10), (2, 20), (3, 10), (4, 0)]);
}

#[test]
fn pe_sum_waits_for_a_later_event() {
    let s1 = Stream::new()
        .run_header(&run_header(7, &[1, 2], 0.0))
        .shower(1)
        .pe_sum(101, &[1, 2])
        .event(101, &[1, 2])
        .pe_sum(102, &[1])
        .event(102, &[1, 2])
        .blocks();
    let s2 = Stream::new()
        .run_header(&run_header(7, &[1, 2], 0.0))
        .shower(1)
        .pe_sum(102, &[2])
        .event(102, &[2])
        .blocks();
    let (summary, out) = merge(MAP_2X2, s1, s2, MergeOptions::default()).unwrap();

    let seq: Vec<(u32, i64)> = out
        .iter()
        .filter(|b| b.type_code() == MC_PE_SUM || b.type_code() == EVENT)
        .map(|b| (b.type_code(), b.ident()))
        .collect();
    assert_eq!(
        seq,
        vec![(MC_PE_SUM, 101), (EVENT, 101), (MC_PE_SUM, 102), (EVENT, 102)]
    );
    assert_eq!(summary.pe_sums_written, 2);

    let pe102 = out
        .iter()
        .filter(|b| b.type_code() == MC_PE_SUM)
        .nth(1)
        .map(|b| McPeSum::read(b).unwrap())
        .unwrap();
    let filled: Vec<i32> = pe102
        .tels
        .iter()
        .filter(|t| t.num_pe > 0)
        .map(|t| t.tel_id)
        .collect();
    assert_eq!(filled, vec![1, 4]);
}

#[test]
fn different_run_numbers_are_fatal() {
    let s1 = first_input(&[]).blocks();
    let s2 = Stream::new()
        .run_header(&run_header(8, &[1, 2], 0.0))
        .blocks();
    match merge(MAP_2X2, s1, s2, MergeOptions::default()) {
        Err(EventIoError::Mismatch(msg)) => assert!(msg.contains("run")),
        other => panic!("expected mismatch, got {:?}", other.map(|(s, _)| s)),
    }
}

#[test]
fn different_pointing_is_fatal() {
    let s1 = first_input(&[]).blocks();
    let mut rh = run_header(7, &[1, 2], 0.0);
    rh.direction = [0.5, 1.0];
    let s2 = Stream::new().run_header(&rh).blocks();
    assert!(matches!(
        merge(MAP_2X2, s1, s2, MergeOptions::default()),
        Err(EventIoError::Mismatch(_))
    ));
}

#[test]
fn different_showers_are_fatal() {
    let s1 = first_input(&[]).blocks();
    let mut w = BlockWriter::new(Vec::new());
    run_header(7, &[1, 2], 0.0).write(&mut w).unwrap();
    let mut sh = shower(1);
    sh.energy = 42.0;
    sh.write(&mut w).unwrap();
    let s2 = blocks_of(&w.into_inner().unwrap());
    assert!(matches!(
        merge(MAP_2X2, s1, s2, MergeOptions::default()),
        Err(EventIoError::Mismatch(_))
    ));
}

#[test]
fn decreasing_event_numbers_are_fatal() {
    let s1 = Stream::new()
        .run_header(&run_header(7, &[1, 2], 0.0))
        .event(102, &[1, 2])
        .event(101, &[1, 2])
        .blocks();
    let s2 = second_input(&[]).blocks();
    assert!(matches!(
        merge(MAP_2X2, s1, s2, MergeOptions::default()),
        Err(EventIoError::Order(_))
    ));
}

#[test]
fn decreasing_pe_sums_in_one_input_are_fatal() {
    let s1 = Stream::new()
        .run_header(&run_header(7, &[1, 2], 0.0))
        .pe_sum(105, &[1, 2])
        .event(105, &[1, 2])
        .event(107, &[1, 2])
        .pe_sum(103, &[1])
        .blocks();
    let s2 = second_input(&[105, 107]).blocks();
    match merge(MAP_2X2, s1, s2, MergeOptions::default()) {
        Err(EventIoError::Order(msg)) => assert!(msg.contains("103")),
        other => panic!("expected order error, got {:?}", other.map(|(s, _)| s)),
    }
}

#[test]
fn pe_sum_behind_a_written_event_is_fatal() {
    let s1 = Stream::new()
        .run_header(&run_header(7, &[1, 2], 0.0))
        .pe_sum(105, &[1, 2])
        .event(105, &[1, 2])
        .event(107, &[1, 2])
        .blocks();
    let s2 = Stream::new()
        .run_header(&run_header(7, &[1, 2], 0.0))
        .event(105, &[1, 2])
        .event(107, &[1, 2])
        .pe_sum(103, &[1])
        .blocks();
    assert!(matches!(
        merge(MAP_2X2, s1, s2, MergeOptions::default()),
        Err(EventIoError::Order(_))
    ));
}

#[test]
fn pe_sum_is_held_for_the_lagging_input() {
    // Input 1 is already at event 102 when input 2 delivers its sums for 101.
    let s1 = Stream::new()
        .run_header(&run_header(7, &[1, 2], 0.0))
        .shower(1)
        .pe_sum(101, &[1])
        .event(101, &[1, 2])
        .event(102, &[1, 2])
        .blocks();
    let s2 = Stream::new()
        .run_header(&run_header(7, &[1, 2], 0.0))
        .settings(1, 21)
        .settings(2, 22)
        .shower(1)
        .mc_event(101)
        .pe_sum(101, &[2])
        .event(101, &[2])
        .blocks();
    let (summary, out) = merge(MAP_2X2, s1, s2, MergeOptions::default()).unwrap();

    let seq: Vec<(u32, i64)> = out
        .iter()
        .filter(|b| b.type_code() == MC_PE_SUM || b.type_code() == EVENT)
        .map(|b| (b.type_code(), b.ident()))
        .collect();
    assert_eq!(seq, vec![(MC_PE_SUM, 101), (EVENT, 101), (EVENT, 102)]);
    assert_eq!(summary.pe_sums_written, 1);

    let pe = out
        .iter()
        .find(|b| b.type_code() == MC_PE_SUM)
        .map(|b| McPeSum::read(b).unwrap())
        .unwrap();
    let filled: Vec<i32> = pe
        .tels
        .iter()
        .filter(|t| t.num_pe > 0)
        .map(|t| t.tel_id)
        .collect();
    assert_eq!(filled, vec![1, 4]);
}

#[test]
fn second_run_header_without_first_is_fatal() {
    let s1: Vec<Block> = Vec::new();
    let s2 = second_input(&[]).blocks();
    assert!(matches!(
        merge(MAP_2X2, s1, s2, MergeOptions::default()),
        Err(EventIoError::Order(_))
    ));
}

#[test]
fn trigger_masks_in_stream_fix_type_bits() {
    let mut set = TriggerMaskSet::new(7);
    set.push(101, 1, 2);
    let s1 = Stream::new()
        .trigger_masks(&set)
        .run_header(&run_header(7, &[1, 2], 0.0))
        .event(101, &[1, 2])
        .blocks();
    let s2 = second_input(&[]).blocks();
    let (_, out) = merge(MAP_2X2, s1, s2, MergeOptions::default()).unwrap();

    let ev = &events_of(&out)[0];
    let t1 = &ev.central.triggered[0];
    assert_eq!((t1.tel_id, t1.type_mask), (1, 2));
    assert_eq!(t1.time_by_type, [TIME_NOT_MEASURED, 6.0, TIME_NOT_MEASURED]);
    let t2 = &ev.central.triggered[1];
    assert_eq!((t2.tel_id, t2.type_mask), (2, 0));
    assert_eq!(t2.time_by_type, [TIME_NOT_MEASURED; 3]);
}

#[test]
fn trigger_masks_for_another_run_are_not_applied() {
    let mut set = TriggerMaskSet::new(8);
    set.push(101, 1, 2);
    let s1 = Stream::new()
        .trigger_masks(&set)
        .run_header(&run_header(7, &[1, 2], 0.0))
        .event(101, &[1, 2])
        .blocks();
    let s2 = second_input(&[]).blocks();
    let (_, out) = merge(MAP_2X2, s1, s2, MergeOptions::default()).unwrap();
    let ev = &events_of(&out)[0];
    assert!(ev.central.triggered.iter().all(|t| t.type_mask == 1));
}

#[test]
fn end_of_run_blocks_come_from_one_input() {
    let s1 = first_input(&[101])
        .raw(RUN_STATISTICS, 7, 1)
        .blocks();
    let s2 = second_input(&[101])
        .raw(RUN_STATISTICS, 7, 2)
        .raw(HISTOGRAMS, 0, 2)
        .blocks();
    let (_, out) = merge(MAP_2X2, s1, s2, MergeOptions::default()).unwrap();

    let stats: Vec<i32> = out
        .iter()
        .filter(|b| b.type_code() == RUN_STATISTICS)
        .map(|b| b.cursor().get::<i32>().unwrap())
        .collect();
    assert_eq!(stats, vec![1]);
    assert_eq!(idents_of(&out, HISTOGRAMS), vec![0]);

    // Statistics follow the last event.
    let pos = |t: u32| out.iter().position(|b| b.type_code() == t).unwrap();
    assert!(pos(EVENT) < pos(RUN_STATISTICS));
}

#[test]
fn second_run_is_merged_after_the_first() {
    let s1 = first_input(&[101])
        .run_header(&run_header(8, &[1, 2], 0.0))
        .shower(1)
        .event(101, &[1, 2])
        .blocks();
    let s2 = second_input(&[101])
        .run_header(&run_header(8, &[1, 2], 0.0))
        .shower(1)
        .event(101, &[1])
        .blocks();
    let (summary, out) = merge(MAP_2X2, s1, s2, MergeOptions::default()).unwrap();
    assert_eq!(idents_of(&out, RUN_HEADER), vec![7, 8]);
    assert_eq!(idents_of(&out, EVENT), vec![101, 101]);
    assert_eq!(summary.events_written, 2);
    let last = events_of(&out).pop().unwrap();
    assert_eq!(last.tels.len(), 3);
}

/// Raises the stop flag once `after` blocks were handed out.
struct StopAfter<'a> {
    blocks: std::vec::IntoIter<Block>,
    after: usize,
    given: usize,
    stop: &'a AtomicBool,
}

impl BlockSource for StopAfter<'_> {
    fn next_block(&mut self) -> eventio_core::Result<Option<Block>> {
        let b = self.blocks.next();
        if b.is_some() {
            self.given += 1;
            if self.given == self.after {
                self.stop.store(true, Ordering::Relaxed);
            }
        }
        Ok(b)
    }
}

#[test]
fn interruption_reports_pending_event_as_lost() {
    let stop = AtomicBool::new(false);
    let mut s1 = Stream::new()
        .run_header(&run_header(7, &[1, 2], 0.0))
        .event(101, &[1, 2])
        .blocks()
        .into_iter();
    let mut s2 = StopAfter {
        blocks: Stream::new()
            .run_header(&run_header(7, &[1, 2], 0.0))
            .event(101, &[1, 2])
            .blocks()
            .into_iter(),
        after: 2,
        given: 0,
        stop: &stop,
    };

    let mut map = TelescopeMap::load(MAP_2X2).unwrap();
    let mut out = BlockWriter::new(Vec::new());
    let summary = StreamMerger::new(&mut map, MergeOptions::default())
        .run(&mut s1, &mut s2, &mut out, &stop)
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.lost, vec![LostRecord::Event(101)]);
    assert_eq!(summary.events_written, 0);
    let blocks = blocks_of(&out.into_inner().unwrap());
    assert!(idents_of(&blocks, EVENT).is_empty());
}

fn pixel_input(order: ByteOrder, x_offset: f32, events: &[i32]) -> Vec<Block> {
    let mut s = Stream::with_order(order).run_header(&run_header(7, &[1, 2], x_offset));
    for &ev in events {
        s = s.full_event(&event_with_pixels(ev, &[1, 2], order));
    }
    s.blocks()
}

#[test]
fn big_endian_inputs_with_pixel_data_are_merged() {
    let s1 = pixel_input(ByteOrder::Big, 0.0, &[101]);
    let s2 = pixel_input(ByteOrder::Big, 500.0, &[101]);
    let (summary, out) = merge(MAP_2X2, s1, s2, MergeOptions::default()).unwrap();
    assert_eq!(summary.events_written, 1);

    let header = out.iter().find(|b| b.type_code() == RUN_HEADER).unwrap();
    assert_eq!(header.byte_order(), ByteOrder::Big);
    let ev_block = out.iter().find(|b| b.type_code() == EVENT).unwrap();
    assert_eq!(ev_block.byte_order(), ByteOrder::Big);

    let ev = FullEvent::read(ev_block).unwrap();
    let tel_ids: Vec<i32> = ev.tels.iter().map(|t| t.tel_id).collect();
    assert_eq!(tel_ids, vec![1, 2, 3, 4]);
    for tel in &ev.tels {
        let t = tel.tel_id as i64;
        let idents: Vec<(u32, i64)> = tel
            .components
            .iter()
            .map(|c| (c.type_code, c.ident))
            .collect();
        assert_eq!(
            idents,
            vec![(ADC_SAMPLES, SAMPLES_FLAG | t), (PIXEL_LIST, 2_000_000 + t)]
        );
        assert!(tel.components.iter().all(|c| c.byte_order == ByteOrder::Big));
    }
    // Payloads travel untouched: output 3 and 4 carry input 2's telescopes 1 and 2.
    assert_eq!(ev.tels[2].components[0].payload, vec![1u8; 6]);
    assert_eq!(ev.tels[3].components[1].payload, vec![0, 1, 2, 2]);
}

#[test]
fn output_follows_input_one_byte_order() {
    let s1 = Stream::with_order(ByteOrder::Big)
        .run_header(&run_header(7, &[1, 2], 0.0))
        .event(101, &[1, 2])
        .blocks();
    let s2 = Stream::with_order(ByteOrder::Little)
        .run_header(&run_header(7, &[1, 2], 0.0))
        .event(101, &[1, 2])
        .blocks();
    let (_, out) = merge(MAP_2X2, s1, s2, MergeOptions::default()).unwrap();
    let ev_block = out.iter().find(|b| b.type_code() == EVENT).unwrap();
    assert_eq!(ev_block.byte_order(), ByteOrder::Big);
    assert_eq!(FullEvent::read(ev_block).unwrap().tels.len(), 4);
}

#[test]
fn little_endian_pixel_data_switches_a_big_endian_output() {
    let s1 = Stream::with_order(ByteOrder::Big)
        .run_header(&run_header(7, &[1, 2], 0.0))
        .blocks();
    let s2 = pixel_input(ByteOrder::Little, 0.0, &[101]);
    let (_, out) = merge(MAP_2X2, s1, s2, MergeOptions::default()).unwrap();
    let orders: Vec<(u32, ByteOrder)> = out
        .iter()
        .filter(|b| b.type_code() == RUN_HEADER || b.type_code() == EVENT)
        .map(|b| (b.type_code(), b.byte_order()))
        .collect();
    assert_eq!(
        orders,
        vec![(RUN_HEADER, ByteOrder::Big), (EVENT, ByteOrder::Little)]
    );
    let ev = events_of(&out).pop().unwrap();
    assert_eq!(ev.tels[1].components[1].ident, 2_000_004);
}

#[test]
fn pixel_data_in_both_byte_orders_cannot_share_an_event() {
    let s1 = pixel_input(ByteOrder::Little, 0.0, &[101]);
    let s2 = pixel_input(ByteOrder::Big, 0.0, &[101]);
    assert!(matches!(
        merge(MAP_2X2, s1, s2, MergeOptions::default()),
        Err(EventIoError::Format(_))
    ));
}
