/**********************************************
  > File Name		: indexing/node.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

//! Leaf and internal page layouts for the B+-tree, mirroring
//! `AM_LEAFHEADER` / `AM_INTHEADER`. A leaf slot holds one key plus a base
//! recid and the head of an in-page overflow chain used for duplicate keys,
//! so a duplicate insert never forces a leaf split (see DESIGN.md).

use std::cmp::Ordering;

use byteorder::{ByteOrder, LittleEndian};

use crate::page_management::PageNum;
use crate::record_management::RecId;

use super::attr::{self, AttrType};

pub const PAGE_TYPE_LEAF: u8 = 0;
pub const PAGE_TYPE_INTERNAL: u8 = 1;

pub const LEAF_HEADER_SIZE: usize = 1 + 4 + 2 + 2 + 1 + 2 + 4 + 2;
pub const INT_HEADER_SIZE: usize = 1 + 2 + 2 + 1 + 2;
pub const OVERFLOW_NODE_SIZE: usize = 4 + 4;
pub const SLOT_FIXED_SIZE: usize = 4 + 4; // base_recid + overflow_head
pub const CHILD_SIZE: usize = 4;

pub const NULL_PAGE: i32 = -1;

#[derive(Debug, Clone, Copy)]
pub struct LeafHeader {
    pub next_leaf: i32,
    pub num_keys: u16,
    pub max_keys: u16,
    pub attr_type: AttrType,
    pub attr_length: u16,
    pub free_head: i32,
    /// Next never-yet-used overflow node slot. Nodes below this mark are
    /// either live or sitting on `free_head`'s free list; nodes at or above
    /// it have never been allocated.
    pub node_hwm: u16,
}

pub fn leaf_max_keys(page_size: usize, attr_length: u16) -> u16 {
    let capacity = page_size - LEAF_HEADER_SIZE;
    let per_slot = attr_length as usize + SLOT_FIXED_SIZE + OVERFLOW_NODE_SIZE;
    (capacity / per_slot) as u16
}

pub fn init_leaf(page: &mut [u8], attr_type: AttrType, attr_length: u16, max_keys: u16) {
    let hdr = LeafHeader {
        next_leaf: NULL_PAGE,
        num_keys: 0,
        max_keys,
        attr_type,
        attr_length,
        free_head: NULL_PAGE,
        node_hwm: 0,
    };
    write_leaf_header(page, &hdr);
}

pub fn read_leaf_header(page: &[u8]) -> LeafHeader {
    LeafHeader {
        next_leaf: LittleEndian::read_i32(&page[1..5]),
        num_keys: LittleEndian::read_u16(&page[5..7]),
        max_keys: LittleEndian::read_u16(&page[7..9]),
        attr_type: AttrType::from_tag(page[9]).expect("page validated as leaf before header read"),
        attr_length: LittleEndian::read_u16(&page[10..12]),
        free_head: LittleEndian::read_i32(&page[12..16]),
        node_hwm: LittleEndian::read_u16(&page[16..18]),
    }
}

pub fn write_leaf_header(page: &mut [u8], hdr: &LeafHeader) {
    page[0] = PAGE_TYPE_LEAF;
    LittleEndian::write_i32(&mut page[1..5], hdr.next_leaf);
    LittleEndian::write_u16(&mut page[5..7], hdr.num_keys);
    LittleEndian::write_u16(&mut page[7..9], hdr.max_keys);
    page[9] = hdr.attr_type.tag();
    LittleEndian::write_u16(&mut page[10..12], hdr.attr_length);
    LittleEndian::write_i32(&mut page[12..16], hdr.free_head);
    LittleEndian::write_u16(&mut page[16..18], hdr.node_hwm);
}

pub fn is_leaf(page: &[u8]) -> bool {
    page[0] == PAGE_TYPE_LEAF
}

fn key_offset(slot: u16, attr_length: u16) -> usize {
    LEAF_HEADER_SIZE + slot as usize * attr_length as usize
}

fn slot_fixed_offset(max_keys: u16, attr_length: u16, slot: u16) -> usize {
    LEAF_HEADER_SIZE + max_keys as usize * attr_length as usize + slot as usize * SLOT_FIXED_SIZE
}

fn overflow_pool_offset(max_keys: u16, attr_length: u16) -> usize {
    LEAF_HEADER_SIZE + max_keys as usize * attr_length as usize + max_keys as usize * SLOT_FIXED_SIZE
}

pub fn leaf_key(page: &[u8], slot: u16, attr_length: u16) -> &[u8] {
    let off = key_offset(slot, attr_length);
    &page[off..off + attr_length as usize]
}

pub fn set_leaf_key(page: &mut [u8], slot: u16, attr_length: u16, value: &[u8]) {
    let off = key_offset(slot, attr_length);
    page[off..off + attr_length as usize].copy_from_slice(value);
}

pub fn leaf_base_recid(page: &[u8], hdr: &LeafHeader, slot: u16) -> RecId {
    let off = slot_fixed_offset(hdr.max_keys, hdr.attr_length, slot);
    RecId(LittleEndian::read_u32(&page[off..off + 4]))
}

pub fn leaf_overflow_head(page: &[u8], hdr: &LeafHeader, slot: u16) -> i32 {
    let off = slot_fixed_offset(hdr.max_keys, hdr.attr_length, slot) + 4;
    LittleEndian::read_i32(&page[off..off + 4])
}

pub fn set_leaf_slot_fixed(page: &mut [u8], hdr: &LeafHeader, slot: u16, base_recid: RecId, overflow_head: i32) {
    let off = slot_fixed_offset(hdr.max_keys, hdr.attr_length, slot);
    LittleEndian::write_u32(&mut page[off..off + 4], base_recid.0);
    LittleEndian::write_i32(&mut page[off + 4..off + 8], overflow_head);
}

fn node_offset(hdr: &LeafHeader, node: u16) -> usize {
    overflow_pool_offset(hdr.max_keys, hdr.attr_length) + node as usize * OVERFLOW_NODE_SIZE
}

pub fn read_overflow_node(page: &[u8], hdr: &LeafHeader, node: u16) -> (RecId, i32) {
    let off = node_offset(hdr, node);
    (
        RecId(LittleEndian::read_u32(&page[off..off + 4])),
        LittleEndian::read_i32(&page[off + 4..off + 8]),
    )
}

pub fn write_overflow_node(page: &mut [u8], hdr: &LeafHeader, node: u16, recid: RecId, next: i32) {
    let off = node_offset(hdr, node);
    LittleEndian::write_u32(&mut page[off..off + 4], recid.0);
    LittleEndian::write_i32(&mut page[off + 4..off + 8], next);
}

/// Allocate an overflow node: reuse one from the free list if any, otherwise
/// take the next never-used slot. Returns `None` if the page's overflow pool
/// is exhausted (caller must split).
pub fn alloc_overflow_node(page: &mut [u8], hdr: &mut LeafHeader) -> Option<u16> {
    if hdr.free_head != NULL_PAGE {
        let node = hdr.free_head as u16;
        let (_, next) = read_overflow_node(page, hdr, node);
        hdr.free_head = next;
        return Some(node);
    }
    if hdr.node_hwm < hdr.max_keys {
        let node = hdr.node_hwm;
        hdr.node_hwm += 1;
        return Some(node);
    }
    None
}

pub fn push_free_overflow_node(page: &mut [u8], hdr: &mut LeafHeader, node: u16) {
    write_overflow_node(page, hdr, node, RecId(0), hdr.free_head);
    hdr.free_head = node as i32;
}

/// Binary search for `key` among the leaf's sorted slots. Returns `Ok(slot)`
/// if an equal key is present, `Err(slot)` naming the insertion point
/// otherwise (the same contract as `[T]::binary_search`).
pub fn leaf_search(page: &[u8], hdr: &LeafHeader, key: &[u8]) -> Result<u16, u16> {
    let mut lo = 0i32;
    let mut hi = hdr.num_keys as i32 - 1;
    while lo <= hi {
        let mid = (lo + hi) / 2;
        let mid_key = leaf_key(page, mid as u16, hdr.attr_length);
        match attr::compare(mid_key, key, hdr.attr_type) {
            Ordering::Equal => return Ok(mid as u16),
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid - 1,
        }
    }
    Err(lo as u16)
}

#[derive(Debug, Clone, Copy)]
pub struct IntHeader {
    pub num_keys: u16,
    pub max_keys: u16,
    pub attr_type: AttrType,
    pub attr_length: u16,
}

pub fn internal_max_keys(page_size: usize, attr_length: u16) -> u16 {
    let capacity = page_size - INT_HEADER_SIZE;
    (((capacity - CHILD_SIZE) as f64) / (attr_length as f64 + CHILD_SIZE as f64)) as u16
}

pub fn init_internal(page: &mut [u8], attr_type: AttrType, attr_length: u16, max_keys: u16, left_child: PageNum) {
    let hdr = IntHeader {
        num_keys: 0,
        max_keys,
        attr_type,
        attr_length,
    };
    write_internal_header(page, &hdr);
    set_internal_child(page, &hdr, 0, left_child);
}

pub fn read_internal_header(page: &[u8]) -> IntHeader {
    IntHeader {
        num_keys: LittleEndian::read_u16(&page[1..3]),
        max_keys: LittleEndian::read_u16(&page[3..5]),
        attr_type: AttrType::from_tag(page[5]).expect("page validated as internal before header read"),
        attr_length: LittleEndian::read_u16(&page[6..8]),
    }
}

pub fn write_internal_header(page: &mut [u8], hdr: &IntHeader) {
    page[0] = PAGE_TYPE_INTERNAL;
    LittleEndian::write_u16(&mut page[1..3], hdr.num_keys);
    LittleEndian::write_u16(&mut page[3..5], hdr.max_keys);
    page[5] = hdr.attr_type.tag();
    LittleEndian::write_u16(&mut page[6..8], hdr.attr_length);
}

pub fn is_internal(page: &[u8]) -> bool {
    page[0] == PAGE_TYPE_INTERNAL
}

fn internal_key_offset(hdr: &IntHeader, index: u16) -> usize {
    INT_HEADER_SIZE + index as usize * hdr.attr_length as usize
}

fn internal_child_offset(hdr: &IntHeader, index: u16) -> usize {
    INT_HEADER_SIZE + hdr.max_keys as usize * hdr.attr_length as usize + index as usize * CHILD_SIZE
}

pub fn internal_key(page: &[u8], hdr: &IntHeader, index: u16) -> &[u8] {
    let off = internal_key_offset(hdr, index);
    &page[off..off + hdr.attr_length as usize]
}

pub fn set_internal_key(page: &mut [u8], hdr: &IntHeader, index: u16, value: &[u8]) {
    let off = internal_key_offset(hdr, index);
    page[off..off + hdr.attr_length as usize].copy_from_slice(value);
}

pub fn internal_child(page: &[u8], hdr: &IntHeader, index: u16) -> PageNum {
    let off = internal_child_offset(hdr, index);
    LittleEndian::read_u32(&page[off..off + 4])
}

pub fn set_internal_child(page: &mut [u8], hdr: &IntHeader, index: u16, child: PageNum) {
    let off = internal_child_offset(hdr, index);
    LittleEndian::write_u32(&mut page[off..off + 4], child);
}

/// Find the child slot to descend into for `key`: the index `i` such that
/// `key` belongs in the subtree rooted at child `i`.
pub fn internal_search(page: &[u8], hdr: &IntHeader, key: &[u8]) -> u16 {
    let mut lo = 0i32;
    let mut hi = hdr.num_keys as i32 - 1;
    let mut result = hdr.num_keys;
    while lo <= hi {
        let mid = (lo + hi) / 2;
        let mid_key = internal_key(page, hdr, mid as u16);
        match attr::compare(key, mid_key, hdr.attr_type) {
            Ordering::Less => {
                result = mid as u16;
                hi = mid - 1;
            }
            _ => lo = mid + 1,
        }
    }
    result
}
