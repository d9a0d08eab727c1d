/**********************************************
  > File Name		: record_management/slotted_page.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

//! Codec for the slotted-page layout: a fixed header, a slot directory
//! growing from the end of the header, and record bytes packed from the end
//! of the page backward. All multi-byte fields are little-endian (see
//! DESIGN.md for why the on-disk byte order was pinned down explicitly).

use byteorder::{ByteOrder, LittleEndian};

use crate::errors::SpError;
use crate::page_management::PageNum;

pub const MAGIC: u32 = 0x5350_4c54; // "SPLT"
pub const HEADER_SIZE: usize = 4 + 2 + 2 + 2; // magic, slot_count, free_offset, free_space
pub const SLOT_SIZE: usize = 2 + 2; // offset, length

/// Identifies a record: the page it lives on and its slot index within that
/// page's directory, packed as `(page_num << 16) | slot_index` for parity
/// with the original layer's 32-bit `SP_RecId`. Page numbers above 2^16 are
/// not representable; this is an inherited limit, not a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecId(pub u32);

impl RecId {
    pub fn new(page: PageNum, slot: u16) -> Self {
        RecId((page << 16) | slot as u32)
    }

    pub fn page(&self) -> PageNum {
        self.0 >> 16
    }

    pub fn slot(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PageHeader {
    pub magic: u32,
    pub slot_count: u16,
    pub free_offset: u16,
    pub free_space: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct SlotEntry {
    pub offset: i16,
    pub length: i16,
}

impl SlotEntry {
    pub const TOMBSTONE: i16 = -1;

    pub fn is_live(&self) -> bool {
        self.offset != Self::TOMBSTONE
    }
}

pub fn init_page(page: &mut [u8], page_size: usize) {
    let hdr = PageHeader {
        magic: MAGIC,
        slot_count: 0,
        free_offset: page_size as u16,
        free_space: (page_size - HEADER_SIZE) as u16,
    };
    write_header(page, &hdr);
}

pub fn read_header(page: &[u8]) -> PageHeader {
    PageHeader {
        magic: LittleEndian::read_u32(&page[0..4]),
        slot_count: LittleEndian::read_u16(&page[4..6]),
        free_offset: LittleEndian::read_u16(&page[6..8]),
        free_space: LittleEndian::read_u16(&page[8..10]),
    }
}

pub fn write_header(page: &mut [u8], hdr: &PageHeader) {
    LittleEndian::write_u32(&mut page[0..4], hdr.magic);
    LittleEndian::write_u16(&mut page[4..6], hdr.slot_count);
    LittleEndian::write_u16(&mut page[6..8], hdr.free_offset);
    LittleEndian::write_u16(&mut page[8..10], hdr.free_space);
}

pub fn is_valid(page: &[u8]) -> bool {
    read_header(page).magic == MAGIC
}

fn slot_offset(index: u16) -> usize {
    HEADER_SIZE + index as usize * SLOT_SIZE
}

pub fn read_slot(page: &[u8], index: u16) -> SlotEntry {
    let off = slot_offset(index);
    SlotEntry {
        offset: LittleEndian::read_i16(&page[off..off + 2]),
        length: LittleEndian::read_i16(&page[off + 2..off + 4]),
    }
}

pub fn write_slot(page: &mut [u8], index: u16, slot: &SlotEntry) {
    let off = slot_offset(index);
    LittleEndian::write_i16(&mut page[off..off + 2], slot.offset);
    LittleEndian::write_i16(&mut page[off + 2..off + 4], slot.length);
}

pub fn check_rec_len(len: usize, page_size: usize) -> Result<(), SpError> {
    if len == 0 || len > page_size - HEADER_SIZE - SLOT_SIZE {
        return Err(SpError::InvalidRecordLength(len));
    }
    Ok(())
}
