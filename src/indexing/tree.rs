/**********************************************
  > File Name		: indexing/tree.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

//! B+-tree assembly: create/open/close an index file and insert/delete
//! entries. The descent path is kept in a function-local `Vec`, never
//! shared state, so concurrent inserts (were this engine multi-threaded)
//! could never corrupt each other's split propagation.

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::errors::AmError;
use crate::page_management::page_file::PagedFile;
use crate::page_management::{FileId, PageNum, ReplacementPolicy, PAGE_SIZE};
use crate::record_management::RecId;

use super::attr::{self, AttrType};
use super::node::{self, IntHeader, LeafHeader, NULL_PAGE};
use super::scan::ScanState;

const META_MAGIC: u32 = 0x414D_4254; // "AMBT"
const META_SIZE: usize = 4 + 1 + 2 + 4 + 4;
const META_PAGE: PageNum = 0;

pub const MAX_SCANS: usize = 20;

pub struct IndexHandle {
    pub(crate) pf: PagedFile,
    pub(crate) fid: FileId,
    pub attr_type: AttrType,
    pub attr_length: u16,
    pub(crate) root_page: PageNum,
    pub(crate) left_page: PageNum,
    leaf_max_keys: u16,
    internal_max_keys: u16,
    meta_dirty: bool,
    pub(crate) scans: Vec<Option<ScanState>>,
}

fn read_meta(buf: &[u8]) -> Result<(AttrType, u16, PageNum, PageNum), AmError> {
    let magic = LittleEndian::read_u32(&buf[0..4]);
    if magic != META_MAGIC {
        return Err(AmError::IntError("index file missing AM metadata magic"));
    }
    let attr_type = AttrType::from_tag(buf[4])?;
    let attr_length = LittleEndian::read_u16(&buf[5..7]);
    let root_page = LittleEndian::read_u32(&buf[7..11]);
    let left_page = LittleEndian::read_u32(&buf[11..15]);
    Ok((attr_type, attr_length, root_page, left_page))
}

fn write_meta(buf: &mut [u8], attr_type: AttrType, attr_length: u16, root_page: PageNum, left_page: PageNum) {
    LittleEndian::write_u32(&mut buf[0..4], META_MAGIC);
    buf[4] = attr_type.tag();
    LittleEndian::write_u16(&mut buf[5..7], attr_length);
    LittleEndian::write_u32(&mut buf[7..11], root_page);
    LittleEndian::write_u32(&mut buf[11..15], left_page);
}

impl IndexHandle {
    pub fn create_index(path: &Path, attr_type: AttrType, attr_length: u16) -> Result<(), AmError> {
        attr::check_attr_length(attr_type, attr_length)?;
        let mut pf = PagedFile::new(2, ReplacementPolicy::Lru);
        pf.create_file(path)?;
        let fid = pf.open_file(path)?;

        let meta_pin = pf.alloc_page(fid)?;
        let leaf_pin = pf.alloc_page(fid)?;
        let leaf_max_keys = node::leaf_max_keys(PAGE_SIZE, attr_length);
        if leaf_max_keys == 0 {
            return Err(AmError::InvalidAttrLength(attr_length as usize));
        }
        node::init_leaf(pf.page_data_mut(leaf_pin.file, leaf_pin.page)?, attr_type, attr_length, leaf_max_keys);
        pf.unfix_page(leaf_pin, true)?;

        write_meta(pf.page_data_mut(meta_pin.file, meta_pin.page)?, attr_type, attr_length, 1, 1);
        pf.unfix_page(meta_pin, true)?;

        pf.close_file(fid)?;
        log::info!("created index {} (attr_type={:?} attr_length={})", path.display(), attr_type, attr_length);
        Ok(())
    }

    pub fn destroy_index(path: &Path) -> Result<(), AmError> {
        PagedFile::destroy_file(path)?;
        Ok(())
    }

    pub fn open(path: &Path, pool_size: usize, policy: ReplacementPolicy) -> Result<Self, AmError> {
        let mut pf = PagedFile::new(pool_size, policy);
        let fid = pf.open_file(path)?;
        let meta_pin = pf.get_this_page(fid, META_PAGE)?;
        let (attr_type, attr_length, root_page, left_page) = read_meta(pf.page_data(meta_pin.file, meta_pin.page)?)?;
        pf.unfix_page(meta_pin, false)?;
        Ok(Self::finish_open(pf, fid, attr_type, attr_length, root_page, left_page))
    }

    fn finish_open(
        pf: PagedFile,
        fid: FileId,
        attr_type: AttrType,
        attr_length: u16,
        root_page: PageNum,
        left_page: PageNum,
    ) -> Self {
        IndexHandle {
            pf,
            fid,
            attr_type,
            attr_length,
            root_page,
            left_page,
            leaf_max_keys: node::leaf_max_keys(PAGE_SIZE, attr_length),
            internal_max_keys: node::internal_max_keys(PAGE_SIZE, attr_length),
            meta_dirty: false,
            scans: (0..MAX_SCANS).map(|_| None).collect(),
        }
    }

    pub fn close(mut self) -> Result<(), AmError> {
        self.flush_meta()?;
        self.pf.close_file(self.fid)?;
        Ok(())
    }

    pub fn stats(&self) -> crate::page_management::BufferPoolStats {
        self.pf.stats()
    }

    fn flush_meta(&mut self) -> Result<(), AmError> {
        if !self.meta_dirty {
            return Ok(());
        }
        let pin = self.pf.get_this_page(self.fid, META_PAGE)?;
        write_meta(
            self.pf.page_data_mut(pin.file, pin.page)?,
            self.attr_type,
            self.attr_length,
            self.root_page,
            self.left_page,
        );
        self.pf.unfix_page(pin, true)?;
        self.meta_dirty = false;
        Ok(())
    }

    fn is_leaf_page(&mut self, page: PageNum) -> Result<bool, AmError> {
        Ok(node::is_leaf(self.pf.page_data(self.fid, page)?))
    }

    /// Descend from the root to the leaf that does (or should) contain
    /// `key`, returning the leaf's page number and the stack of internal
    /// pages visited (page number, index of the child edge taken) for split
    /// propagation.
    fn find_leaf(&mut self, key: &[u8]) -> Result<(PageNum, Vec<(PageNum, u16)>), AmError> {
        let mut stack = Vec::new();
        let mut cur = self.root_page;
        loop {
            let pin = self.pf.get_this_page(self.fid, cur)?;
            let buf = self.pf.page_data(pin.file, pin.page)?;
            if node::is_leaf(buf) {
                self.pf.unfix_page(pin, false)?;
                return Ok((cur, stack));
            }
            let hdr = node::read_internal_header(buf);
            let idx = node::internal_search(buf, &hdr, key);
            let child = node::internal_child(buf, &hdr, idx);
            self.pf.unfix_page(pin, false)?;
            stack.push((cur, idx));
            cur = child;
        }
    }

    pub fn insert_entry(&mut self, value: &[u8], recid: RecId) -> Result<(), AmError> {
        if value.len() != self.attr_length as usize {
            return Err(AmError::InvalidValue);
        }
        let (leaf, stack) = self.find_leaf(value)?;
        self.leaf_insert(leaf, stack, value, recid)
    }

    fn leaf_insert(&mut self, leaf: PageNum, stack: Vec<(PageNum, u16)>, value: &[u8], recid: RecId) -> Result<(), AmError> {
        let pin = self.pf.get_this_page(self.fid, leaf)?;
        let buf = self.pf.page_data_mut(pin.file, pin.page)?;
        let mut hdr = node::read_leaf_header(buf);

        match node::leaf_search(buf, &hdr, value) {
            Ok(slot) => {
                let old_head = node::leaf_overflow_head(buf, &hdr, slot);
                match node::alloc_overflow_node(buf, &mut hdr) {
                    Some(node_idx) => {
                        node::write_overflow_node(buf, &hdr, node_idx, recid, old_head);
                        node::set_leaf_slot_fixed(buf, &hdr, slot, node::leaf_base_recid(buf, &hdr, slot), node_idx as i32);
                        node::write_leaf_header(buf, &hdr);
                        self.pf.unfix_page(pin, true)?;
                        Ok(())
                    }
                    None => {
                        self.pf.unfix_page(pin, false)?;
                        Err(AmError::IntError("duplicate overflow pool exhausted on this leaf"))
                    }
                }
            }
            Err(insert_idx) => {
                if hdr.num_keys < hdr.max_keys {
                    shift_leaf_right(buf, &hdr, insert_idx);
                    node::set_leaf_key(buf, insert_idx, hdr.attr_length, value);
                    node::set_leaf_slot_fixed(buf, &hdr, insert_idx, recid, NULL_PAGE);
                    hdr.num_keys += 1;
                    node::write_leaf_header(buf, &hdr);
                    self.pf.unfix_page(pin, true)?;
                    Ok(())
                } else {
                    self.pf.unfix_page(pin, true)?;
                    let (new_leaf, sep_key) = self.split_leaf(leaf, value, recid)?;
                    self.add_to_parent(stack, new_leaf, &sep_key)
                }
            }
        }
    }

    /// Rebuild `leaf` and a freshly-allocated sibling from the union of its
    /// current entries and the new `(value, recid)`, splitting evenly.
    /// Returns the new leaf's page number and its first key (to propagate).
    fn split_leaf(&mut self, leaf: PageNum, value: &[u8], recid: RecId) -> Result<(PageNum, Vec<u8>), AmError> {
        let attr_length = self.attr_length;
        let pin = self.pf.get_this_page(self.fid, leaf)?;
        let buf = self.pf.page_data(pin.file, pin.page)?;
        let hdr = node::read_leaf_header(buf);
        let next_leaf = hdr.next_leaf;

        let mut entries: Vec<(Vec<u8>, Vec<RecId>)> = Vec::with_capacity(hdr.num_keys as usize + 1);
        for slot in 0..hdr.num_keys {
            let key = node::leaf_key(buf, slot, attr_length).to_vec();
            let mut chain = vec![node::leaf_base_recid(buf, &hdr, slot)];
            let mut cursor = node::leaf_overflow_head(buf, &hdr, slot);
            while cursor != NULL_PAGE {
                let (rec, next) = node::read_overflow_node(buf, &hdr, cursor as u16);
                chain.push(rec);
                cursor = next;
            }
            entries.push((key, chain));
        }
        self.pf.unfix_page(pin, false)?;

        let insert_at = entries
            .binary_search_by(|(k, _)| attr::compare(k, value, self.attr_type))
            .unwrap_or_else(|idx| idx);
        entries.insert(insert_at, (value.to_vec(), vec![recid]));

        let mid = (entries.len() + 1) / 2;
        let right = entries.split_off(mid);
        let sep_key = right[0].0.clone();

        let new_pin = self.pf.alloc_page(self.fid)?;
        let new_leaf = new_pin.page;
        node::init_leaf(self.pf.page_data_mut(new_pin.file, new_pin.page)?, self.attr_type, attr_length, self.leaf_max_keys);
        self.pf.unfix_page(new_pin, true)?;

        self.rebuild_leaf(leaf, &entries, NULL_PAGE)?;
        self.rebuild_leaf(new_leaf, &right, next_leaf)?;
        self.set_leaf_next(leaf, new_leaf)?;

        Ok((new_leaf, sep_key))
    }

    fn rebuild_leaf(&mut self, page: PageNum, entries: &[(Vec<u8>, Vec<RecId>)], next_leaf: i32) -> Result<(), AmError> {
        let pin = self.pf.get_this_page(self.fid, page)?;
        let buf = self.pf.page_data_mut(pin.file, pin.page)?;
        let mut hdr = node::read_leaf_header(buf);
        node::init_leaf(buf, hdr.attr_type, hdr.attr_length, hdr.max_keys);
        hdr = node::read_leaf_header(buf);
        hdr.next_leaf = next_leaf;
        hdr.num_keys = entries.len() as u16;

        for (slot, (key, chain)) in entries.iter().enumerate() {
            let slot = slot as u16;
            node::set_leaf_key(buf, slot, hdr.attr_length, key);
            let base = chain[0];
            let mut head = NULL_PAGE;
            for rec in chain[1..].iter().rev() {
                let node_idx = node::alloc_overflow_node(buf, &mut hdr)
                    .expect("freshly split leaf always has room for its own duplicate chains");
                node::write_overflow_node(buf, &hdr, node_idx, *rec, head);
                head = node_idx as i32;
            }
            node::set_leaf_slot_fixed(buf, &hdr, slot, base, head);
        }
        node::write_leaf_header(buf, &hdr);
        self.pf.unfix_page(pin, true)
            .map_err(AmError::from)
    }

    fn set_leaf_next(&mut self, page: PageNum, next_leaf: PageNum) -> Result<(), AmError> {
        let pin = self.pf.get_this_page(self.fid, page)?;
        let buf = self.pf.page_data_mut(pin.file, pin.page)?;
        let mut hdr = node::read_leaf_header(buf);
        hdr.next_leaf = next_leaf as i32;
        node::write_leaf_header(buf, &hdr);
        self.pf.unfix_page(pin, true)?;
        Ok(())
    }

    fn add_to_parent(&mut self, mut stack: Vec<(PageNum, u16)>, mut child: PageNum, sep_key: &[u8]) -> Result<(), AmError> {
        let mut sep_key = sep_key.to_vec();
        loop {
            match stack.pop() {
                None => {
                    let new_root_pin = self.pf.alloc_page(self.fid)?;
                    let new_root = new_root_pin.page;
                    node::init_internal(
                        self.pf.page_data_mut(new_root_pin.file, new_root_pin.page)?,
                        self.attr_type,
                        self.attr_length,
                        self.internal_max_keys,
                        self.root_page,
                    );
                    let buf = self.pf.page_data_mut(new_root_pin.file, new_root_pin.page)?;
                    let mut hdr = node::read_internal_header(buf);
                    node::set_internal_key(buf, &hdr, 0, &sep_key);
                    node::set_internal_child(buf, &hdr, 1, child);
                    hdr.num_keys = 1;
                    node::write_internal_header(buf, &hdr);
                    self.pf.unfix_page(new_root_pin, true)?;
                    self.root_page = new_root;
                    self.meta_dirty = true;
                    self.flush_meta()?;
                    return Ok(());
                }
                Some((parent, child_idx)) => {
                    let pin = self.pf.get_this_page(self.fid, parent)?;
                    let buf = self.pf.page_data_mut(pin.file, pin.page)?;
                    let mut hdr = node::read_internal_header(buf);
                    if hdr.num_keys < hdr.max_keys {
                        shift_internal_right(buf, &hdr, child_idx);
                        node::set_internal_key(buf, &hdr, child_idx, &sep_key);
                        node::set_internal_child(buf, &hdr, child_idx + 1, child);
                        hdr.num_keys += 1;
                        node::write_internal_header(buf, &hdr);
                        self.pf.unfix_page(pin, true)?;
                        return Ok(());
                    }
                    self.pf.unfix_page(pin, true)?;
                    let (new_page, promoted) = self.split_internal(parent, child_idx, &sep_key, child)?;
                    child = new_page;
                    sep_key = promoted;
                }
            }
        }
    }

    fn split_internal(&mut self, page: PageNum, insert_idx: u16, sep_key: &[u8], new_child: PageNum) -> Result<(PageNum, Vec<u8>), AmError> {
        let attr_length = self.attr_length;
        let pin = self.pf.get_this_page(self.fid, page)?;
        let buf = self.pf.page_data(pin.file, pin.page)?;
        let hdr = node::read_internal_header(buf);

        let mut children: Vec<PageNum> = (0..=hdr.num_keys).map(|i| node::internal_child(buf, &hdr, i)).collect();
        let mut keys: Vec<Vec<u8>> = (0..hdr.num_keys).map(|i| node::internal_key(buf, &hdr, i).to_vec()).collect();
        self.pf.unfix_page(pin, false)?;

        keys.insert(insert_idx as usize, sep_key.to_vec());
        children.insert(insert_idx as usize + 1, new_child);

        let mid = keys.len() / 2;
        let mut right_keys = keys.split_off(mid);
        let promoted = right_keys.remove(0);
        let left_keys = keys;
        let right_children = children.split_off(mid + 1);
        let left_children = children;

        self.rebuild_internal(page, &left_children, &left_keys)?;
        let new_pin = self.pf.alloc_page(self.fid)?;
        let new_page = new_pin.page;
        node::init_internal(self.pf.page_data_mut(new_pin.file, new_pin.page)?, self.attr_type, attr_length, self.internal_max_keys, right_children[0]);
        self.pf.unfix_page(new_pin, true)?;
        self.rebuild_internal(new_page, &right_children, &right_keys)?;

        Ok((new_page, promoted))
    }

    fn rebuild_internal(&mut self, page: PageNum, children: &[PageNum], keys: &[Vec<u8>]) -> Result<(), AmError> {
        let pin = self.pf.get_this_page(self.fid, page)?;
        let buf = self.pf.page_data_mut(pin.file, pin.page)?;
        let mut hdr = node::read_internal_header(buf);
        node::set_internal_child(buf, &hdr, 0, children[0]);
        for (i, key) in keys.iter().enumerate() {
            node::set_internal_key(buf, &hdr, i as u16, key);
            node::set_internal_child(buf, &hdr, i as u16 + 1, children[i + 1]);
        }
        hdr.num_keys = keys.len() as u16;
        node::write_internal_header(buf, &hdr);
        self.pf.unfix_page(pin, true)?;
        Ok(())
    }

    pub fn delete_entry(&mut self, value: &[u8], recid: RecId) -> Result<(), AmError> {
        if value.len() != self.attr_length as usize {
            return Err(AmError::InvalidValue);
        }
        let (leaf, _stack) = self.find_leaf(value)?;
        let pin = self.pf.get_this_page(self.fid, leaf)?;
        let buf = self.pf.page_data_mut(pin.file, pin.page)?;
        let mut hdr = node::read_leaf_header(buf);

        let slot = match node::leaf_search(buf, &hdr, value) {
            Ok(slot) => slot,
            Err(_) => {
                self.pf.unfix_page(pin, false)?;
                return Err(AmError::NotFound);
            }
        };

        let base = node::leaf_base_recid(buf, &hdr, slot);
        if base.0 == recid.0 {
            let head = node::leaf_overflow_head(buf, &hdr, slot);
            if head != NULL_PAGE {
                let (next_base, next) = node::read_overflow_node(buf, &hdr, head as u16);
                node::push_free_overflow_node(buf, &mut hdr, head as u16);
                node::set_leaf_slot_fixed(buf, &hdr, slot, next_base, next);
            } else {
                shift_leaf_left(buf, &hdr, slot);
                hdr.num_keys -= 1;
            }
            node::write_leaf_header(buf, &hdr);
            self.pf.unfix_page(pin, true)?;
            return Ok(());
        }

        let mut prev: Option<u16> = None;
        let mut cursor = node::leaf_overflow_head(buf, &hdr, slot);
        while cursor != NULL_PAGE {
            let (rec, next) = node::read_overflow_node(buf, &hdr, cursor as u16);
            if rec.0 == recid.0 {
                match prev {
                    Some(p) => {
                        let (prev_rec, _) = node::read_overflow_node(buf, &hdr, p);
                        node::write_overflow_node(buf, &hdr, p, prev_rec, next);
                    }
                    None => node::set_leaf_slot_fixed(buf, &hdr, slot, base, next),
                }
                node::push_free_overflow_node(buf, &mut hdr, cursor as u16);
                node::write_leaf_header(buf, &hdr);
                self.pf.unfix_page(pin, true)?;
                return Ok(());
            }
            prev = Some(cursor as u16);
            cursor = next;
        }

        self.pf.unfix_page(pin, false)?;
        Err(AmError::NotFound)
    }
}

fn shift_leaf_right(buf: &mut [u8], hdr: &LeafHeader, from: u16) {
    let mut i = hdr.num_keys;
    while i > from {
        let key = node::leaf_key(buf, i - 1, hdr.attr_length).to_vec();
        let base = node::leaf_base_recid(buf, hdr, i - 1);
        let head = node::leaf_overflow_head(buf, hdr, i - 1);
        node::set_leaf_key(buf, i, hdr.attr_length, &key);
        node::set_leaf_slot_fixed(buf, hdr, i, base, head);
        i -= 1;
    }
}

fn shift_leaf_left(buf: &mut [u8], hdr: &LeafHeader, from: u16) {
    for i in from..hdr.num_keys.saturating_sub(1) {
        let key = node::leaf_key(buf, i + 1, hdr.attr_length).to_vec();
        let base = node::leaf_base_recid(buf, hdr, i + 1);
        let head = node::leaf_overflow_head(buf, hdr, i + 1);
        node::set_leaf_key(buf, i, hdr.attr_length, &key);
        node::set_leaf_slot_fixed(buf, hdr, i, base, head);
    }
}

fn shift_internal_right(buf: &mut [u8], hdr: &IntHeader, from: u16) {
    let mut i = hdr.num_keys;
    while i > from {
        let key = node::internal_key(buf, hdr, i - 1).to_vec();
        let child = node::internal_child(buf, hdr, i);
        node::set_internal_key(buf, hdr, i, &key);
        node::set_internal_child(buf, hdr, i + 1, child);
        i -= 1;
    }
}
