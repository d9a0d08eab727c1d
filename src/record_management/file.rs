/**********************************************
  > File Name		: record_management/file.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

//! Slotted-page record file: insert/get/delete/compact/scan/utilization,
//! built directly on [`crate::page_management::page_file::PagedFile`].

use std::path::Path;

use crate::errors::SpError;
use crate::page_management::page_file::PagedFile;
use crate::page_management::{FileId, PageNum, PinnedPage, ReplacementPolicy, PAGE_SIZE};

use super::slotted_page::{self, PageHeader, RecId, SlotEntry, HEADER_SIZE, SLOT_SIZE};

pub struct RecordFile {
    pf: PagedFile,
    fid: FileId,
}

impl RecordFile {
    pub fn create(path: &Path) -> Result<(), SpError> {
        let mut pf = PagedFile::new(1, ReplacementPolicy::Lru);
        pf.create_file(path).map_err(SpError::from)
    }

    pub fn destroy(path: &Path) -> Result<(), SpError> {
        PagedFile::destroy_file(path).map_err(SpError::from)
    }

    pub fn open(path: &Path, pool_size: usize, policy: ReplacementPolicy) -> Result<Self, SpError> {
        let mut pf = PagedFile::new(pool_size, policy);
        let fid = pf.open_file(path)?;
        Ok(RecordFile { pf, fid })
    }

    pub fn close(mut self) -> Result<(), SpError> {
        self.pf.close_file(self.fid).map_err(SpError::from)
    }

    pub fn stats(&self) -> crate::page_management::BufferPoolStats {
        self.pf.stats()
    }

    /// Locate (or allocate) a page with room for a record of `len` bytes,
    /// leaving it pinned for the caller to write into.
    fn find_page_for_insert(&mut self, len: usize) -> Result<PinnedPage, SpError> {
        let mut cursor = self.pf.get_first_page(self.fid)?;
        while let Some(pin) = cursor {
            let hdr = slotted_page::read_header(self.pf.page_data(pin.file, pin.page)?);
            let found_deleted = (0..hdr.slot_count).any(|i| {
                !slotted_page::read_slot(self.pf.page_data(pin.file, pin.page).unwrap(), i).is_live()
            });
            let needed = len + if found_deleted { 0 } else { SLOT_SIZE };
            if hdr.free_space as usize >= needed {
                return Ok(pin);
            }
            let page = pin.page;
            self.pf.unfix_page(pin, false)?;
            cursor = self.pf.get_next_page(self.fid, page)?;
        }

        let pin = self.pf.alloc_page(self.fid)?;
        slotted_page::init_page(self.pf.page_data_mut(pin.file, pin.page)?, PAGE_SIZE);
        Ok(pin)
    }

    pub fn insert_record(&mut self, data: &[u8]) -> Result<RecId, SpError> {
        slotted_page::check_rec_len(data.len(), PAGE_SIZE)?;
        let pin = self.find_page_for_insert(data.len())?;
        let page = pin.page;

        let mut hdr: PageHeader = slotted_page::read_header(self.pf.page_data(pin.file, pin.page)?);

        let mut reused_slot = None;
        for i in 0..hdr.slot_count {
            let slot = slotted_page::read_slot(self.pf.page_data(pin.file, pin.page)?, i);
            if !slot.is_live() {
                reused_slot = Some(i);
                break;
            }
        }
        let reuse = reused_slot.is_some();
        let slot_index = reused_slot.unwrap_or_else(|| {
            let i = hdr.slot_count;
            hdr.slot_count += 1;
            i
        });

        let slot_dir_size = hdr.slot_count as usize * SLOT_SIZE;
        let needed = data.len() + if reuse { 0 } else { SLOT_SIZE };
        if (hdr.free_space as usize) < needed {
            self.pf.unfix_page(pin, false)?;
            return Err(SpError::IntError(
                "page chosen by find_page_for_insert lacked space on recheck",
            ));
        }

        hdr.free_offset -= data.len() as u16;
        let data_off = hdr.free_offset as usize;
        hdr.free_space = hdr.free_offset - (HEADER_SIZE + slot_dir_size) as u16;

        let buf = self.pf.page_data_mut(pin.file, pin.page)?;
        buf[data_off..data_off + data.len()].copy_from_slice(data);
        slotted_page::write_slot(
            buf,
            slot_index,
            &SlotEntry {
                offset: data_off as i16,
                length: data.len() as i16,
            },
        );
        slotted_page::write_header(buf, &hdr);

        self.pf.unfix_page(pin, true)?;
        Ok(RecId::new(page, slot_index))
    }

    pub fn get_record(&mut self, rec: RecId) -> Result<Vec<u8>, SpError> {
        let pin = self.pf.get_this_page(self.fid, rec.page())?;
        let hdr = slotted_page::read_header(self.pf.page_data(pin.file, pin.page)?);
        if rec.slot() >= hdr.slot_count {
            self.pf.unfix_page(pin, false)?;
            return Err(SpError::InvalidRecId);
        }
        let slot = slotted_page::read_slot(self.pf.page_data(pin.file, pin.page)?, rec.slot());
        if !slot.is_live() {
            self.pf.unfix_page(pin, false)?;
            return Err(SpError::NotFound);
        }
        let (off, len) = (slot.offset as usize, slot.length as usize);
        let out = self.pf.page_data(pin.file, pin.page)?[off..off + len].to_vec();
        self.pf.unfix_page(pin, false)?;
        Ok(out)
    }

    pub fn delete_record(&mut self, rec: RecId) -> Result<(), SpError> {
        let pin = self.pf.get_this_page(self.fid, rec.page())?;
        let mut hdr = slotted_page::read_header(self.pf.page_data(pin.file, pin.page)?);
        if rec.slot() >= hdr.slot_count {
            self.pf.unfix_page(pin, false)?;
            return Err(SpError::InvalidRecId);
        }
        let mut slot = slotted_page::read_slot(self.pf.page_data(pin.file, pin.page)?, rec.slot());
        if !slot.is_live() {
            self.pf.unfix_page(pin, false)?;
            return Err(SpError::NotFound);
        }

        let freed = slot.length as u16;
        slot.offset = SlotEntry::TOMBSTONE;
        slot.length = 0;
        hdr.free_space += freed;

        let buf = self.pf.page_data_mut(pin.file, pin.page)?;
        slotted_page::write_slot(buf, rec.slot(), &slot);
        slotted_page::write_header(buf, &hdr);
        self.pf.unfix_page(pin, true)?;
        log::debug!("deleted record {:?}", rec);
        Ok(())
    }

    /// Relocate all live records on a page into a contiguous region so its
    /// free space is no longer fragmented.
    pub fn compact_page(&mut self, page: PageNum) -> Result<(), SpError> {
        let pin = self.pf.get_this_page(self.fid, page)?;
        let hdr = slotted_page::read_header(self.pf.page_data(pin.file, pin.page)?);
        let snapshot: Vec<u8> = self.pf.page_data(pin.file, pin.page)?.to_vec();

        let mut cur_free = PAGE_SIZE;
        let buf = self.pf.page_data_mut(pin.file, pin.page)?;
        for i in 0..hdr.slot_count {
            let slot = slotted_page::read_slot(&snapshot, i);
            if !slot.is_live() {
                continue;
            }
            cur_free -= slot.length as usize;
            let (old_off, len) = (slot.offset as usize, slot.length as usize);
            buf[cur_free..cur_free + len].copy_from_slice(&snapshot[old_off..old_off + len]);
            slotted_page::write_slot(
                buf,
                i,
                &SlotEntry {
                    offset: cur_free as i16,
                    length: len as i16,
                },
            );
        }

        let slot_dir_size = hdr.slot_count as usize * SLOT_SIZE;
        let new_hdr = PageHeader {
            magic: hdr.magic,
            slot_count: hdr.slot_count,
            free_offset: cur_free as u16,
            free_space: (cur_free - HEADER_SIZE - slot_dir_size) as u16,
        };
        slotted_page::write_header(buf, &new_hdr);
        self.pf.unfix_page(pin, true)?;
        log::debug!("compacted page {}", page);
        Ok(())
    }

    /// Sum of live record bytes over total page capacity, as a percentage.
    pub fn compute_space_utilization(&mut self) -> Result<f64, SpError> {
        let mut pages = 0u64;
        let mut total_bytes = 0u64;
        let mut cursor = self.pf.get_first_page(self.fid)?;
        while let Some(pin) = cursor {
            let hdr = slotted_page::read_header(self.pf.page_data(pin.file, pin.page)?);
            pages += 1;
            let mut used = 0u64;
            for i in 0..hdr.slot_count {
                let slot = slotted_page::read_slot(self.pf.page_data(pin.file, pin.page)?, i);
                if slot.is_live() {
                    used += slot.length as u64;
                }
            }
            total_bytes += used;
            let page = pin.page;
            self.pf.unfix_page(pin, false)?;
            cursor = self.pf.get_next_page(self.fid, page)?;
        }
        if pages == 0 {
            return Ok(0.0);
        }
        Ok((total_bytes as f64) / (pages as f64 * PAGE_SIZE as f64) * 100.0)
    }

    pub fn scan(&mut self) -> Result<Scan, SpError> {
        Ok(Scan {
            cur_page: None,
            slot_index: 0,
            initialized: false,
        })
    }
}

/// A forward-only cursor over every live record in a file, in page/slot
/// order. Mirrors the original `SP_Scan` struct: unfixes its current page
/// before fetching the next.
pub struct Scan {
    cur_page: Option<PageNum>,
    slot_index: u16,
    initialized: bool,
}

impl Scan {
    pub fn next(&mut self, file: &mut RecordFile) -> Result<Option<(RecId, Vec<u8>)>, SpError> {
        if !self.initialized {
            match file.pf.get_first_page(file.fid)? {
                None => return Ok(None),
                Some(pin) => {
                    file.pf.unfix_page(pin, false)?;
                    self.cur_page = Some(pin.page);
                    self.slot_index = 0;
                    self.initialized = true;
                }
            }
        }

        loop {
            let page = match self.cur_page {
                Some(p) => p,
                None => return Ok(None),
            };
            let pin = file.pf.get_this_page(file.fid, page)?;
            let hdr = slotted_page::read_header(file.pf.page_data(pin.file, pin.page)?);

            while self.slot_index < hdr.slot_count {
                let slot = slotted_page::read_slot(file.pf.page_data(pin.file, pin.page)?, self.slot_index);
                if slot.is_live() {
                    let (off, len) = (slot.offset as usize, slot.length as usize);
                    let data = file.pf.page_data(pin.file, pin.page)?[off..off + len].to_vec();
                    let rec = RecId::new(page, self.slot_index);
                    self.slot_index += 1;
                    file.pf.unfix_page(pin, false)?;
                    return Ok(Some((rec, data)));
                }
                self.slot_index += 1;
            }

            file.pf.unfix_page(pin, false)?;
            match file.pf.get_next_page(file.fid, page)? {
                None => {
                    self.cur_page = None;
                    return Ok(None);
                }
                Some(next_pin) => {
                    let next_page = next_pin.page;
                    file.pf.unfix_page(next_pin, false)?;
                    self.cur_page = Some(next_page);
                    self.slot_index = 0;
                }
            }
        }
    }

    pub fn close(&mut self) {
        self.initialized = false;
        self.cur_page = None;
    }
}
