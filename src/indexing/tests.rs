/**********************************************
  > File Name		: indexing/tests.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

use tempfile::NamedTempFile;

use crate::page_management::ReplacementPolicy;
use crate::record_management::RecId;

use super::attr::AttrType;
use super::scan::ScanOp;
use super::tree::IndexHandle;

fn new_int_index() -> (NamedTempFile, IndexHandle) {
    let tmp = NamedTempFile::new().expect("create temp file");
    std::fs::remove_file(tmp.path()).unwrap();
    IndexHandle::create_index(tmp.path(), AttrType::Int, 4).unwrap();
    let idx = IndexHandle::open(tmp.path(), 8, ReplacementPolicy::Lru).unwrap();
    (tmp, idx)
}

fn int_key(v: i32) -> [u8; 4] {
    v.to_le_bytes()
}

#[test]
fn insert_and_scan_all_in_order() {
    let (tmp, mut idx) = new_int_index();
    let values = [5, 1, 9, 3, 7, 2, 8, 4, 6, 0];
    for &v in &values {
        idx.insert_entry(&int_key(v), RecId::new(v as u32, 0)).unwrap();
    }

    let desc = idx.open_index_scan(ScanOp::All as i32, None).unwrap();
    let mut seen = Vec::new();
    while let Some(rec) = idx.find_next_entry(desc).unwrap() {
        seen.push(rec.page() as i32);
    }
    idx.close_index_scan(desc).unwrap();

    assert_eq!(seen, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    idx.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn equal_scan_finds_duplicates() {
    let (tmp, mut idx) = new_int_index();
    idx.insert_entry(&int_key(42), RecId::new(1, 0)).unwrap();
    idx.insert_entry(&int_key(42), RecId::new(2, 0)).unwrap();
    idx.insert_entry(&int_key(42), RecId::new(3, 0)).unwrap();
    idx.insert_entry(&int_key(7), RecId::new(4, 0)).unwrap();

    let desc = idx.open_index_scan(ScanOp::Equal as i32, Some(&int_key(42))).unwrap();
    let mut pages = Vec::new();
    while let Some(rec) = idx.find_next_entry(desc).unwrap() {
        pages.push(rec.page());
    }
    idx.close_index_scan(desc).unwrap();

    pages.sort();
    assert_eq!(pages, vec![1, 2, 3]);
    idx.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn delete_removes_only_the_named_recid() {
    let (tmp, mut idx) = new_int_index();
    idx.insert_entry(&int_key(10), RecId::new(1, 0)).unwrap();
    idx.insert_entry(&int_key(10), RecId::new(2, 0)).unwrap();
    idx.delete_entry(&int_key(10), RecId::new(1, 0)).unwrap();

    let desc = idx.open_index_scan(ScanOp::Equal as i32, Some(&int_key(10))).unwrap();
    let mut pages = Vec::new();
    while let Some(rec) = idx.find_next_entry(desc).unwrap() {
        pages.push(rec.page());
    }
    idx.close_index_scan(desc).unwrap();

    assert_eq!(pages, vec![2]);
    idx.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn delete_missing_key_is_not_found() {
    let (tmp, mut idx) = new_int_index();
    idx.insert_entry(&int_key(1), RecId::new(1, 0)).unwrap();
    assert!(idx.delete_entry(&int_key(99), RecId::new(1, 0)).is_err());
    idx.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn many_inserts_force_leaf_and_internal_splits() {
    let (tmp, mut idx) = new_int_index();
    for v in 0..2000i32 {
        idx.insert_entry(&int_key(v), RecId::new(v as u32, 0)).unwrap();
    }

    let desc = idx.open_index_scan(ScanOp::All as i32, None).unwrap();
    let mut count = 0;
    let mut last = None;
    while let Some(rec) = idx.find_next_entry(desc).unwrap() {
        if let Some(p) = last {
            assert!(rec.page() as i64 > p, "scan must stay in ascending key order");
        }
        last = Some(rec.page() as i64);
        count += 1;
    }
    idx.close_index_scan(desc).unwrap();
    assert_eq!(count, 2000);
    idx.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn range_scans_respect_bounds() {
    let (tmp, mut idx) = new_int_index();
    for v in 0..50i32 {
        idx.insert_entry(&int_key(v), RecId::new(v as u32, 0)).unwrap();
    }

    let desc = idx.open_index_scan(ScanOp::LessThan as i32, Some(&int_key(10))).unwrap();
    let mut below_ten = Vec::new();
    while let Some(rec) = idx.find_next_entry(desc).unwrap() {
        below_ten.push(rec.page() as i32);
    }
    idx.close_index_scan(desc).unwrap();
    assert_eq!(below_ten, (0..10).collect::<Vec<_>>());

    let desc = idx.open_index_scan(ScanOp::GreaterThanEqual as i32, Some(&int_key(45))).unwrap();
    let mut above = Vec::new();
    while let Some(rec) = idx.find_next_entry(desc).unwrap() {
        above.push(rec.page() as i32);
    }
    idx.close_index_scan(desc).unwrap();
    assert_eq!(above, (45..50).collect::<Vec<_>>());

    idx.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn close_and_reopen_preserves_root() {
    let tmp = NamedTempFile::new().expect("create temp file");
    std::fs::remove_file(tmp.path()).unwrap();
    IndexHandle::create_index(tmp.path(), AttrType::Int, 4).unwrap();
    {
        let mut idx = IndexHandle::open(tmp.path(), 8, ReplacementPolicy::Lru).unwrap();
        for v in 0..500i32 {
            idx.insert_entry(&int_key(v), RecId::new(v as u32, 0)).unwrap();
        }
        idx.close().unwrap();
    }

    let mut idx = IndexHandle::open(tmp.path(), 8, ReplacementPolicy::Lru).unwrap();
    let desc = idx.open_index_scan(ScanOp::All as i32, None).unwrap();
    let mut count = 0;
    while idx.find_next_entry(desc).unwrap().is_some() {
        count += 1;
    }
    idx.close_index_scan(desc).unwrap();
    assert_eq!(count, 500);
    idx.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn scan_table_rejects_past_capacity() {
    let (tmp, mut idx) = new_int_index();
    idx.insert_entry(&int_key(1), RecId::new(1, 0)).unwrap();

    let mut descs = Vec::new();
    for _ in 0..super::tree::MAX_SCANS {
        descs.push(idx.open_index_scan(ScanOp::All as i32, None).unwrap());
    }
    assert!(idx.open_index_scan(ScanOp::All as i32, None).is_err());

    idx.close_index_scan(descs.pop().unwrap()).unwrap();
    assert!(idx.open_index_scan(ScanOp::All as i32, None).is_ok());

    idx.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn char_attribute_compares_lexicographically() {
    let tmp = NamedTempFile::new().expect("create temp file");
    std::fs::remove_file(tmp.path()).unwrap();
    IndexHandle::create_index(tmp.path(), AttrType::Char, 8).unwrap();
    let mut idx = IndexHandle::open(tmp.path(), 8, ReplacementPolicy::Lru).unwrap();

    let mut key = |s: &str| {
        let mut buf = [0u8; 8];
        let bytes = s.as_bytes();
        buf[..bytes.len()].copy_from_slice(bytes);
        buf
    };
    idx.insert_entry(&key("banana"), RecId::new(1, 0)).unwrap();
    idx.insert_entry(&key("apple"), RecId::new(2, 0)).unwrap();
    idx.insert_entry(&key("cherry"), RecId::new(3, 0)).unwrap();

    let desc = idx.open_index_scan(ScanOp::All as i32, None).unwrap();
    let mut pages = Vec::new();
    while let Some(rec) = idx.find_next_entry(desc).unwrap() {
        pages.push(rec.page());
    }
    idx.close_index_scan(desc).unwrap();
    assert_eq!(pages, vec![2, 1, 3]);

    idx.close().unwrap();
    std::fs::remove_file(tmp.path()).ok();
}
