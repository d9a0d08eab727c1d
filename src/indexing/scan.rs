/**********************************************
  > File Name		: indexing/scan.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

//! Index scans: a bounded table of `MAX_SCANS` cursors over the leaf chain,
//! mirroring `AM_OpenIndexScan` / `AM_FindNextEntry` / `AM_CloseIndexScan`
//! and their `FREE`/`FIRST`/`BUSY`/`LAST`/`OVER` state machine.

use std::cmp::Ordering;

use crate::errors::AmError;
use crate::page_management::PageNum;
use crate::record_management::RecId;

use super::attr;
use super::node::{self, NULL_PAGE};
use super::tree::{IndexHandle, MAX_SCANS};

/// Comparison operator a scan filters on, mirroring `AM_OpenIndexScan`'s `op`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOp {
    All,
    Equal,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    NotEqual,
}

impl ScanOp {
    pub fn from_code(op: i32) -> Result<Self, AmError> {
        match op {
            0 => Ok(ScanOp::All),
            1 => Ok(ScanOp::Equal),
            2 => Ok(ScanOp::LessThan),
            3 => Ok(ScanOp::GreaterThan),
            4 => Ok(ScanOp::LessThanEqual),
            5 => Ok(ScanOp::GreaterThanEqual),
            6 => Ok(ScanOp::NotEqual),
            _ => Err(AmError::InvalidOpToScan),
        }
    }
}

/// Where the next `find_next_entry` call should resume: a slot within a
/// leaf, and a position within that slot's duplicate chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotCursor {
    Base,
    Node(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanStatus {
    First,
    Busy,
    Over,
}

pub struct ScanState {
    op: ScanOp,
    value: Option<Vec<u8>>,
    leaf: PageNum,
    slot: u16,
    cursor: SlotCursor,
    status: ScanStatus,
}

impl IndexHandle {
    pub fn open_index_scan(&mut self, op: i32, value: Option<&[u8]>) -> Result<usize, AmError> {
        let op = ScanOp::from_code(op)?;
        if matches!(op, ScanOp::Equal | ScanOp::GreaterThan | ScanOp::GreaterThanEqual) && value.is_none() {
            return Err(AmError::InvalidValue);
        }
        if let Some(v) = value {
            if v.len() != self.attr_length as usize {
                return Err(AmError::InvalidValue);
            }
        }

        let desc = self
            .scans
            .iter()
            .position(|s| s.is_none())
            .ok_or(AmError::ScanTabFull)?;

        let start_leaf = match (op, value) {
            (ScanOp::Equal, Some(v)) | (ScanOp::GreaterThan, Some(v)) | (ScanOp::GreaterThanEqual, Some(v)) => {
                self.find_leaf_for_scan(v)?
            }
            _ => self.left_page,
        };

        self.scans[desc] = Some(ScanState {
            op,
            value: value.map(|v| v.to_vec()),
            leaf: start_leaf,
            slot: 0,
            cursor: SlotCursor::Base,
            status: ScanStatus::First,
        });
        debug_assert!(self.scans.len() <= MAX_SCANS);
        log::debug!("opened index scan {} (op={:?})", desc, op);
        Ok(desc)
    }

    fn find_leaf_for_scan(&mut self, value: &[u8]) -> Result<PageNum, AmError> {
        let mut cur = self.root_page;
        loop {
            let pin = self.pf.get_this_page(self.fid, cur)?;
            let buf = self.pf.page_data(pin.file, pin.page)?;
            if node::is_leaf(buf) {
                self.pf.unfix_page(pin, false)?;
                return Ok(cur);
            }
            let hdr = node::read_internal_header(buf);
            let idx = node::internal_search(buf, &hdr, value);
            let child = node::internal_child(buf, &hdr, idx);
            self.pf.unfix_page(pin, false)?;
            cur = child;
        }
    }

    pub fn find_next_entry(&mut self, desc: usize) -> Result<Option<RecId>, AmError> {
        let mut state = self
            .scans
            .get(desc)
            .ok_or(AmError::InvalidScanDesc)?
            .clone_for_step()
            .ok_or(AmError::InvalidScanDesc)?;

        if state.status == ScanStatus::Over {
            self.scans[desc] = Some(state);
            return Ok(None);
        }
        state.status = ScanStatus::Busy;

        let result = self.advance(&mut state);
        self.scans[desc] = Some(state);
        result
    }

    fn advance(&mut self, state: &mut ScanState) -> Result<Option<RecId>, AmError> {
        loop {
            let pin = self.pf.get_this_page(self.fid, state.leaf)?;
            let buf = self.pf.page_data(pin.file, pin.page)?;
            let hdr = node::read_leaf_header(buf);

            while state.slot < hdr.num_keys {
                let key = node::leaf_key(buf, state.slot, hdr.attr_length);
                let cmp = state.value.as_ref().map(|v| attr::compare(key, v, hdr.attr_type));

                let action = classify(state.op, cmp);
                match action {
                    Action::Stop => {
                        self.pf.unfix_page(pin, false)?;
                        state.status = ScanStatus::Over;
                        return Ok(None);
                    }
                    Action::Skip => {
                        state.slot += 1;
                        state.cursor = SlotCursor::Base;
                        continue;
                    }
                    Action::Take => {
                        let (rec, next_cursor) = match state.cursor {
                            SlotCursor::Base => (
                                node::leaf_base_recid(buf, &hdr, state.slot),
                                SlotCursor::Node(node::leaf_overflow_head(buf, &hdr, state.slot)),
                            ),
                            SlotCursor::Node(NULL_PAGE) => {
                                state.slot += 1;
                                state.cursor = SlotCursor::Base;
                                continue;
                            }
                            SlotCursor::Node(n) => {
                                let (rec, next) = node::read_overflow_node(buf, &hdr, n as u16);
                                (rec, SlotCursor::Node(next))
                            }
                        };
                        state.cursor = next_cursor;
                        self.pf.unfix_page(pin, false)?;
                        return Ok(Some(rec));
                    }
                }
            }

            let next_leaf = hdr.next_leaf;
            self.pf.unfix_page(pin, false)?;
            if next_leaf == NULL_PAGE {
                state.status = ScanStatus::Over;
                return Ok(None);
            }
            state.leaf = next_leaf as PageNum;
            state.slot = 0;
            state.cursor = SlotCursor::Base;
        }
    }

    pub fn close_index_scan(&mut self, desc: usize) -> Result<(), AmError> {
        let slot = self.scans.get_mut(desc).ok_or(AmError::InvalidScanDesc)?;
        if slot.is_none() {
            return Err(AmError::InvalidScanDesc);
        }
        *slot = None;
        Ok(())
    }
}

enum Action {
    Take,
    Skip,
    Stop,
}

/// Decide what to do with the current slot's key given the scan's operator.
/// `cmp` is `key.cmp(value)`, or `None` for an unconditional (`ALL`) scan.
fn classify(op: ScanOp, cmp: Option<Ordering>) -> Action {
    match (op, cmp) {
        (ScanOp::All, _) => Action::Take,
        (ScanOp::Equal, Some(Ordering::Equal)) => Action::Take,
        (ScanOp::Equal, Some(Ordering::Less)) => Action::Skip,
        (ScanOp::Equal, Some(Ordering::Greater)) => Action::Stop,
        (ScanOp::LessThan, Some(Ordering::Less)) => Action::Take,
        (ScanOp::LessThan, Some(_)) => Action::Stop,
        (ScanOp::LessThanEqual, Some(Ordering::Greater)) => Action::Stop,
        (ScanOp::LessThanEqual, Some(_)) => Action::Take,
        (ScanOp::GreaterThan, Some(Ordering::Greater)) => Action::Take,
        (ScanOp::GreaterThan, Some(_)) => Action::Skip,
        (ScanOp::GreaterThanEqual, Some(Ordering::Less)) => Action::Skip,
        (ScanOp::GreaterThanEqual, Some(_)) => Action::Take,
        (ScanOp::NotEqual, Some(Ordering::Equal)) => Action::Skip,
        (ScanOp::NotEqual, Some(_)) => Action::Take,
        (_, None) => Action::Take,
    }
}

impl ScanState {
    /// Clones just enough to drive one `find_next_entry` step outside of a
    /// held `&mut` borrow on the scan table (the table entry is written back
    /// when the step completes).
    fn clone_for_step(&self) -> Option<Self> {
        Some(ScanState {
            op: self.op,
            value: self.value.clone(),
            leaf: self.leaf,
            slot: self.slot,
            cursor: self.cursor,
            status: self.status,
        })
    }
}
