mod common;

use std::fs;
use std::io::Cursor;

use common::{blocks_of, Stream};
use eventio_core::block::BlockWriter;
use eventio_core::trgmask::{
    bucket_of, load_for_input, load_side_file, side_file_path, TriggerMaskIndex, TriggerMaskSet,
    TRGMASK_PRIME,
};
use std::path::Path;

#[test]
fn lookup_finds_colliding_entries() {
    let mut set = TriggerMaskSet::new(10);
    set.push(5, 1, 3);
    // 2 * 10000 + 5274 == 1 * 10000 + 5 + TRGMASK_PRIME
    set.push(5274, 2, 6);
    assert_eq!(bucket_of(5, 1), bucket_of(5274, 2));

    let ix = TriggerMaskIndex::build(set);
    assert_eq!(ix.lookup(5, 1), Some(3));
    assert_eq!(ix.lookup(5274, 2), Some(6));
    assert_eq!(ix.lookup(5, 2), None);
    assert_eq!(ix.longest_chain(), 2);
}

#[test]
fn first_duplicate_wins() {
    let mut set = TriggerMaskSet::new(10);
    set.push(7, 4, 1);
    set.push(7, 4, 2);
    let ix = TriggerMaskIndex::build(set);
    assert_eq!(ix.lookup(7, 4), Some(1));
}

#[test]
fn negative_keys_are_not_indexed() {
    let mut set = TriggerMaskSet::new(10);
    set.push(3, -1, 1);
    set.push(3, 1, 2);
    let ix = TriggerMaskIndex::build(set);
    assert_eq!(ix.dropped(), 1);
    assert_eq!(ix.lookup(3, -1), None);
    assert_eq!(ix.lookup(3, 1), Some(2));
    assert_eq!(ix.iter_hashed().count(), 1);
}

#[test]
fn buckets_stay_inside_the_table() {
    for (ev, tel) in [(0, 0), (1, 1), (999_999, 31), (i64::from(i32::MAX), 999)] {
        let b = bucket_of(ev, tel).unwrap();
        assert!((b as i64) < TRGMASK_PRIME);
    }
}

#[test]
fn block_round_trip_keeps_entry_order() {
    let mut set = TriggerMaskSet::new(1234);
    set.push(100, 1, 5);
    set.push(100, 3, -1);
    set.push(200_000, 2, 7);

    let mut w = BlockWriter::new(Vec::new());
    set.write(&mut w).unwrap();
    let blocks = blocks_of(&w.into_inner().unwrap());
    assert_eq!(blocks[0].ident(), 1234);
    assert_eq!(TriggerMaskSet::read(&blocks[0]).unwrap(), set);
}

#[test]
fn log_scan_collects_masks_per_event() {
    let log = "\
Run 1234 (started Mon)
Event 100 has triggered 2 telescopes
Telescope 1 triggered (majority) with mask 5
Telescope 3 triggered with mask 1
Something else
Event 101 has triggered 1 telescope
Telescope 2 triggered with mask 2
Telescope 4 did not trigger
";
    let set = TriggerMaskSet::scan_log(Cursor::new(log)).unwrap();
    assert_eq!(set.run, 1234);
    let got: Vec<(i64, i32, i32)> = set
        .entries()
        .iter()
        .map(|e| (e.event, e.tel_id, e.mask))
        .collect();
    assert_eq!(got, vec![(100, 1, 5), (100, 3, 1), (101, 2, 2)]);
}

#[test]
fn side_file_name_drops_sim_suffix() {
    assert_eq!(
        side_file_path(Path::new("/data/run1.simtel.zst")),
        Path::new("/data/run1.trgmask")
    );
    assert_eq!(side_file_path(Path::new("run2.dat")), Path::new("run2.dat.trgmask"));
}

#[test]
fn side_file_is_found_next_to_the_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("run5.simtel");
    assert!(load_for_input(&input).unwrap().is_none());

    let mut set = TriggerMaskSet::new(5);
    set.push(1, 1, 4);
    let bytes = Stream::new()
        .raw(2024, 5, 0)
        .trigger_masks(&set)
        .bytes();
    fs::write(dir.path().join("run5.trgmask"), bytes).unwrap();

    let ix = load_for_input(&input).unwrap().unwrap();
    assert_eq!(ix.run(), 5);
    assert_eq!(ix.lookup(1, 1), Some(4));
}

#[test]
fn side_file_without_masks_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.trgmask");
    fs::write(&path, Stream::new().raw(2024, 5, 0).bytes()).unwrap();
    assert!(load_side_file(&path).unwrap().is_none());
}

#[test]
fn log_file_on_disk_is_scanned() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run9.log");
    fs::write(
        &path,
        "Run 9 (started today)\nEvent 3 has triggered\nTelescope 2 triggered mask 6\n",
    )
    .unwrap();
    let set = TriggerMaskSet::scan_log_file(&path).unwrap();
    assert_eq!((set.run, set.len()), (9, 1));
    assert!(TriggerMaskSet::scan_log_file(&dir.path().join("missing.log")).is_err());
}

#[test]
fn log_scan_skips_lines_that_are_not_text() {
    let mut log = b"Run 77 (started Tue)\r\n".to_vec();
    log.extend_from_slice(b"\xff\xfe binary noise \x00\x01\n");
    log.extend_from_slice(b"Event 101 has triggered 1 telescope\r\n");
    log.extend_from_slice(b"Telescope 3 triggered (mask 5)\n");
    log.extend_from_slice(b"Telescope 4 triggered \xe9 mask 2");
    let set = TriggerMaskSet::scan_log(Cursor::new(log)).unwrap();
    assert_eq!(set.run, 77);
    let got: Vec<(i64, i32, i32)> = set
        .entries()
        .iter()
        .map(|e| (e.event, e.tel_id, e.mask))
        .collect();
    assert_eq!(got, vec![(101, 3, 5), (101, 4, 2)]);
}

#[test]
fn negative_event_numbers_are_not_written() {
    let mut set = TriggerMaskSet::new(5);
    set.push(-3, 1, 1);
    let mut w = BlockWriter::new(Vec::new());
    assert!(matches!(
        set.write(&mut w),
        Err(eventio_core::EventIoError::Format(_))
    ));
}
