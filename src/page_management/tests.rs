/**********************************************
  > File Name		: page_management/tests.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

use tempfile::NamedTempFile;

use super::page_file::PagedFile;
use super::{ReplacementPolicy, PAGE_SIZE};

fn temp_path() -> NamedTempFile {
    NamedTempFile::new().expect("create temp file")
}

#[test]
fn create_open_close_roundtrips_header() {
    let tmp = temp_path();
    std::fs::remove_file(tmp.path()).unwrap();
    let mut pf = PagedFile::new(8, ReplacementPolicy::Lru);
    pf.create_file(tmp.path()).unwrap();
    let fid = pf.open_file(tmp.path()).unwrap();
    pf.close_file(fid).unwrap();

    let fid2 = pf.open_file(tmp.path()).unwrap();
    assert!(pf.get_first_page(fid2).unwrap().is_none());
    pf.close_file(fid2).unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn alloc_write_read_back_after_eviction() {
    let tmp = temp_path();
    std::fs::remove_file(tmp.path()).unwrap();
    let mut pf = PagedFile::new(4, ReplacementPolicy::Lru);
    pf.create_file(tmp.path()).unwrap();
    let fid = pf.open_file(tmp.path()).unwrap();

    let mut pins = Vec::new();
    for i in 0..16u8 {
        let pin = pf.alloc_page(fid).unwrap();
        pf.page_data_mut(pin.file, pin.page).unwrap()[0] = i;
        pins.push((pin.page, i));
        pf.unfix_page(pin, true).unwrap();
    }

    for (page, expected) in pins {
        let pin = pf.get_this_page(fid, page).unwrap();
        assert_eq!(pf.page_data(pin.file, pin.page).unwrap()[0], expected);
        pf.unfix_page(pin, false).unwrap();
    }

    pf.close_file(fid).unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn dispose_then_alloc_reuses_page() {
    let tmp = temp_path();
    std::fs::remove_file(tmp.path()).unwrap();
    let mut pf = PagedFile::new(8, ReplacementPolicy::Lru);
    pf.create_file(tmp.path()).unwrap();
    let fid = pf.open_file(tmp.path()).unwrap();

    let p0 = pf.alloc_page(fid).unwrap();
    let p1 = pf.alloc_page(fid).unwrap();
    pf.unfix_page(p0, false).unwrap();
    pf.unfix_page(p1, false).unwrap();

    pf.dispose_page(fid, 0).unwrap();
    let reused = pf.alloc_page(fid).unwrap();
    assert_eq!(reused.page, 0);
    pf.unfix_page(reused, false).unwrap();

    pf.close_file(fid).unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn get_first_and_next_skip_free_pages() {
    let tmp = temp_path();
    std::fs::remove_file(tmp.path()).unwrap();
    let mut pf = PagedFile::new(8, ReplacementPolicy::Lru);
    pf.create_file(tmp.path()).unwrap();
    let fid = pf.open_file(tmp.path()).unwrap();

    for _ in 0..3 {
        let pin = pf.alloc_page(fid).unwrap();
        pf.unfix_page(pin, false).unwrap();
    }
    pf.dispose_page(fid, 1).unwrap();

    let first = pf.get_first_page(fid).unwrap().unwrap();
    assert_eq!(first.page, 0);
    let next = pf.get_next_page(fid, first.page).unwrap().unwrap();
    assert_eq!(next.page, 2);
    pf.unfix_page(first, false).unwrap();
    pf.unfix_page(next, false).unwrap();
    assert!(pf.get_next_page(fid, 2).unwrap().is_none());

    pf.close_file(fid).unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn with_page_mut_persists_and_always_unfixes() {
    let tmp = temp_path();
    std::fs::remove_file(tmp.path()).unwrap();
    let mut pf = PagedFile::new(4, ReplacementPolicy::Lru);
    pf.create_file(tmp.path()).unwrap();
    let fid = pf.open_file(tmp.path()).unwrap();

    let pin = pf.alloc_page(fid).unwrap();
    let page = pin.page;
    pf.unfix_page(pin, false).unwrap();

    pf.with_page_mut(fid, page, |data| {
        data[..4].copy_from_slice(&[1, 2, 3, 4]);
    })
    .unwrap();

    let seen = pf.with_page(fid, page, |data| data[..4].to_vec()).unwrap();
    assert_eq!(seen, vec![1, 2, 3, 4]);

    pf.close_file(fid).unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn unfixing_twice_is_an_error() {
    let tmp = temp_path();
    std::fs::remove_file(tmp.path()).unwrap();
    let mut pf = PagedFile::new(4, ReplacementPolicy::Lru);
    pf.create_file(tmp.path()).unwrap();
    let fid = pf.open_file(tmp.path()).unwrap();

    let pin = pf.alloc_page(fid).unwrap();
    let page = pin.page;
    pf.unfix_page(pin, false).unwrap();
    assert!(pf.unfix_page(super::PinnedPage { file: fid, page }, false).is_err());

    pf.close_file(fid).unwrap();
    std::fs::remove_file(tmp.path()).ok();
}

#[test]
fn lru_eviction_writes_back_dirty_pages() {
    let tmp = temp_path();
    std::fs::remove_file(tmp.path()).unwrap();
    let mut pf = PagedFile::new(2, ReplacementPolicy::Lru);
    pf.create_file(tmp.path()).unwrap();
    let fid = pf.open_file(tmp.path()).unwrap();

    for i in 0..6u8 {
        let pin = pf.alloc_page(fid).unwrap();
        let mut buf = [0u8; PAGE_SIZE];
        buf[0] = i;
        pf.page_data_mut(pin.file, pin.page).unwrap().copy_from_slice(&buf);
        pf.unfix_page(pin, true).unwrap();
    }

    for i in 0..6u8 {
        let pin = pf.get_this_page(fid, i as u32).unwrap();
        assert_eq!(pf.page_data(pin.file, pin.page).unwrap()[0], i);
        pf.unfix_page(pin, false).unwrap();
    }

    pf.close_file(fid).unwrap();
    std::fs::remove_file(tmp.path()).ok();
}
