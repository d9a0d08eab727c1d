/**********************************************
  > File Name		: record_management/tests.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

use tempfile::NamedTempFile;

use crate::page_management::ReplacementPolicy;

use super::file::RecordFile;

fn new_record_file() -> (NamedTempFile, RecordFile) {
    let tmp = NamedTempFile::new().expect("create temp file");
    std::fs::remove_file(tmp.path()).unwrap();
    RecordFile::create(tmp.path()).unwrap();
    let rf = RecordFile::open(tmp.path(), 8, ReplacementPolicy::Lru).unwrap();
    (tmp, rf)
}

#[test]
fn insert_get_roundtrips() {
    let (tmp, mut rf) = new_record_file();
    let rec = rf.insert_record(b"hello world").unwrap();
    let data = rf.get_record(rec).unwrap();
    assert_eq!(data, b"hello world");
    rf.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn delete_then_get_fails_and_slot_is_reused() {
    let (tmp, mut rf) = new_record_file();
    let rec1 = rf.insert_record(b"first").unwrap();
    rf.delete_record(rec1).unwrap();
    assert!(rf.get_record(rec1).is_err());

    let rec2 = rf.insert_record(b"second").unwrap();
    assert_eq!(rec2.page(), rec1.page());
    assert_eq!(rec2.slot(), rec1.slot());
    assert_eq!(rf.get_record(rec2).unwrap(), b"second");
    rf.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn double_delete_is_an_error() {
    let (tmp, mut rf) = new_record_file();
    let rec = rf.insert_record(b"x").unwrap();
    rf.delete_record(rec).unwrap();
    assert!(rf.delete_record(rec).is_err());
    rf.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn many_records_span_multiple_pages() {
    let (tmp, mut rf) = new_record_file();
    let payload = vec![7u8; 200];
    let mut recs = Vec::new();
    for _ in 0..100 {
        recs.push(rf.insert_record(&payload).unwrap());
    }
    let pages: std::collections::HashSet<_> = recs.iter().map(|r| r.page()).collect();
    assert!(pages.len() > 1, "100 records of 200 bytes should not fit on one 4096-byte page");
    for rec in recs {
        assert_eq!(rf.get_record(rec).unwrap(), payload);
    }
    rf.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn compact_page_preserves_live_records() {
    let (tmp, mut rf) = new_record_file();
    let a = rf.insert_record(b"alpha").unwrap();
    let b = rf.insert_record(b"beta").unwrap();
    let c = rf.insert_record(b"gamma").unwrap();
    rf.delete_record(b).unwrap();

    rf.compact_page(a.page()).unwrap();
    assert_eq!(rf.get_record(a).unwrap(), b"alpha");
    assert_eq!(rf.get_record(c).unwrap(), b"gamma");
    assert!(rf.get_record(b).is_err());
    rf.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn scan_visits_every_live_record_exactly_once() {
    let (tmp, mut rf) = new_record_file();
    let mut inserted = std::collections::HashSet::new();
    for i in 0..20u8 {
        let rec = rf.insert_record(&[i; 50]).unwrap();
        inserted.insert((rec.page(), rec.slot()));
    }
    let deleted = rf.insert_record(&[99; 50]).unwrap();
    rf.delete_record(deleted).unwrap();

    let mut scan = rf.scan().unwrap();
    let mut seen = std::collections::HashSet::new();
    while let Some((rec, _data)) = scan.next(&mut rf).unwrap() {
        assert!(seen.insert((rec.page(), rec.slot())), "scan must not repeat a record");
    }
    assert_eq!(seen, inserted);
    rf.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn space_utilization_reflects_deletes() {
    let (tmp, mut rf) = new_record_file();
    for _ in 0..5 {
        rf.insert_record(&[1u8; 100]).unwrap();
    }
    let before = rf.compute_space_utilization().unwrap();
    assert!(before > 0.0);

    let rec = rf.insert_record(&[1u8; 100]).unwrap();
    rf.delete_record(rec).unwrap();
    let after_delete = rf.compute_space_utilization().unwrap();
    assert!(after_delete < before + 1.0);
    rf.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn oversized_record_is_rejected() {
    let (tmp, mut rf) = new_record_file();
    let huge = vec![0u8; crate::page_management::PAGE_SIZE];
    assert!(rf.insert_record(&huge).is_err());
    rf.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}
