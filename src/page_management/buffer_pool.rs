/**********************************************
  > File Name		: page_management/buffer_pool.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

//! Fixed-size pool of frames, doubly-linked into a replacement list by frame
//! index (not pointer, so ownership stays with the pool — see DESIGN.md).
//! A frame is either free (never used, or returned by `release_file`) or
//! resident, holding the on-disk page struct `{nextfree, data}` plus pin/dirty
//! bookkeeping. The pool never grows past `pool_size`.

use crate::errors::PfError;

use super::hash_index::HashIndex;
use super::{BufferPoolStats, FileId, PageNum, ReplacementPolicy, PAGE_SIZE};

pub(crate) struct Frame {
    pub file: Option<FileId>,
    pub page: Option<PageNum>,
    /// Mirrors the on-disk `nextfree` field of the page this frame holds.
    pub nextfree: i32,
    pub data: Box<[u8; PAGE_SIZE]>,
    pub dirty: bool,
    pub pin_count: u32,
    prev: Option<usize>,
    next: Option<usize>,
}

impl Frame {
    fn empty() -> Self {
        Frame {
            file: None,
            page: None,
            nextfree: 0,
            data: Box::new([0u8; PAGE_SIZE]),
            dirty: false,
            pin_count: 0,
            prev: None,
            next: None,
        }
    }
}

pub struct BufferPool {
    pub(crate) frames: Vec<Frame>,
    free_frames: Vec<usize>,
    hash: HashIndex,
    policy: ReplacementPolicy,
    /// Head = most recently unpinned ("hot" end), tail = least recently
    /// unpinned ("cold" end). LRU evicts the tail, MRU evicts the head.
    hot: Option<usize>,
    cold: Option<usize>,
    stats: BufferPoolStats,
}

impl BufferPool {
    pub fn new(pool_size: usize, policy: ReplacementPolicy) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_frames = Vec::with_capacity(pool_size);
        for i in 0..pool_size {
            frames.push(Frame::empty());
            free_frames.push(pool_size - 1 - i);
        }
        BufferPool {
            frames,
            free_frames,
            hash: HashIndex::new(),
            policy,
            hot: None,
            cold: None,
            stats: BufferPoolStats::default(),
        }
    }

    pub fn stats(&self) -> BufferPoolStats {
        self.stats
    }

    /// Record a page handed to the caller from the free list, the counterpart
    /// to the `page_allocations` bump `alloc` does for brand-new pages.
    pub(crate) fn record_allocation(&mut self) {
        self.stats.page_allocations += 1;
    }

    pub(crate) fn find(&self, file: FileId, page: PageNum) -> Option<usize> {
        self.hash.find(file, page)
    }

    /// Detach a frame from the replacement list (it is about to be pinned, or
    /// evicted).
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.frames[idx].prev, self.frames[idx].next);
        match prev {
            Some(p) => self.frames[p].next = next,
            None => self.hot = next,
        }
        match next {
            Some(n) => self.frames[n].prev = prev,
            None => self.cold = prev,
        }
        self.frames[idx].prev = None;
        self.frames[idx].next = None;
    }

    /// Splice a newly-unpinned frame onto the hot end of the replacement list.
    fn link_hot(&mut self, idx: usize) {
        self.frames[idx].prev = None;
        self.frames[idx].next = self.hot;
        if let Some(h) = self.hot {
            self.frames[h].prev = Some(idx);
        }
        self.hot = Some(idx);
        if self.cold.is_none() {
            self.cold = Some(idx);
        }
    }

    fn victim_slot(&self) -> Option<usize> {
        match self.policy {
            ReplacementPolicy::Lru => self.cold,
            ReplacementPolicy::Mru => self.hot,
        }
    }

    /// Evict a frame to make room: write it back if dirty, drop it from the
    /// hash index, and return its slot for reuse. Returns `NoBuf` if every
    /// frame is pinned.
    fn evict_one<W>(&mut self, mut write_back: W) -> Result<usize, PfError>
    where
        W: FnMut(FileId, PageNum, i32, &[u8; PAGE_SIZE]) -> Result<(), PfError>,
    {
        let idx = self.victim_slot().ok_or(PfError::NoBuf)?;
        debug_assert_eq!(self.frames[idx].pin_count, 0);
        self.unlink(idx);
        let (file, page) = (
            self.frames[idx].file.expect("replacement list holds only resident frames"),
            self.frames[idx].page.expect("replacement list holds only resident frames"),
        );
        if self.frames[idx].dirty {
            write_back(file, page, self.frames[idx].nextfree, &self.frames[idx].data)?;
            self.stats.physical_writes += 1;
        }
        self.hash.delete(file, page)?;
        self.frames[idx].file = None;
        self.frames[idx].page = None;
        self.frames[idx].dirty = false;
        log::debug!("evicted frame {} (file={:?} page={})", idx, file, page);
        Ok(idx)
    }

    /// Obtain a frame slot for `(file, page)`, reading its content via `read`
    /// if it is not already resident. Pins the frame and returns its index.
    pub(crate) fn get<R, W>(
        &mut self,
        file: FileId,
        page: PageNum,
        read: R,
        write_back: W,
    ) -> Result<usize, PfError>
    where
        R: FnOnce(FileId, PageNum) -> Result<(i32, Box<[u8; PAGE_SIZE]>), PfError>,
        W: FnMut(FileId, PageNum, i32, &[u8; PAGE_SIZE]) -> Result<(), PfError>,
    {
        self.stats.logical_requests += 1;
        if let Some(idx) = self.hash.find(file, page) {
            if self.frames[idx].pin_count == 0 {
                self.unlink(idx);
            }
            self.frames[idx].pin_count += 1;
            self.stats.logical_hits += 1;
            return Ok(idx);
        }

        let idx = match self.free_frames.pop() {
            Some(idx) => idx,
            None => self.evict_one(write_back)?,
        };

        let (nextfree, data) = read(file, page)?;
        self.stats.physical_reads += 1;
        self.frames[idx].file = Some(file);
        self.frames[idx].page = Some(page);
        self.frames[idx].nextfree = nextfree;
        self.frames[idx].data = data;
        self.frames[idx].dirty = false;
        self.frames[idx].pin_count = 1;
        self.hash.insert(file, page, idx)?;
        Ok(idx)
    }

    /// Install a brand-new page (contents undefined) without reading from
    /// disk. Fails with `PageInBuf` if the page is already resident.
    pub(crate) fn alloc<W>(
        &mut self,
        file: FileId,
        page: PageNum,
        nextfree: i32,
        write_back: W,
    ) -> Result<usize, PfError>
    where
        W: FnMut(FileId, PageNum, i32, &[u8; PAGE_SIZE]) -> Result<(), PfError>,
    {
        if self.hash.find(file, page).is_some() {
            return Err(PfError::PageInBuf);
        }
        let idx = match self.free_frames.pop() {
            Some(idx) => idx,
            None => self.evict_one(write_back)?,
        };
        self.frames[idx].file = Some(file);
        self.frames[idx].page = Some(page);
        self.frames[idx].nextfree = nextfree;
        for b in self.frames[idx].data.iter_mut() {
            *b = 0;
        }
        self.frames[idx].dirty = true;
        self.frames[idx].pin_count = 1;
        self.hash.insert(file, page, idx)?;
        self.stats.page_allocations += 1;
        Ok(idx)
    }

    pub(crate) fn unfix(&mut self, file: FileId, page: PageNum, dirty: bool) -> Result<(), PfError> {
        let idx = self.hash.find(file, page).ok_or(PfError::PageNotInBuf)?;
        if self.frames[idx].pin_count == 0 {
            return Err(PfError::PageUnfixed);
        }
        self.frames[idx].pin_count -= 1;
        self.frames[idx].dirty |= dirty;
        if self.frames[idx].pin_count == 0 {
            self.link_hot(idx);
        }
        Ok(())
    }

    /// Flush and evict every frame belonging to `file`. Fails with
    /// `PageFixed` if any of them is still pinned; in that case nothing is
    /// mutated.
    pub(crate) fn release_file<W>(&mut self, file: FileId, mut write_back: W) -> Result<(), PfError>
    where
        W: FnMut(FileId, PageNum, i32, &[u8; PAGE_SIZE]) -> Result<(), PfError>,
    {
        let resident: Vec<usize> = self
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.file == Some(file))
            .map(|(i, _)| i)
            .collect();

        for &idx in &resident {
            if self.frames[idx].pin_count != 0 {
                return Err(PfError::PageFixed);
            }
        }

        for idx in resident {
            let page = self.frames[idx].page.unwrap();
            if self.frames[idx].dirty {
                write_back(file, page, self.frames[idx].nextfree, &self.frames[idx].data)?;
                self.stats.physical_writes += 1;
            }
            self.unlink(idx);
            self.hash.delete(file, page)?;
            self.frames[idx].file = None;
            self.frames[idx].page = None;
            self.frames[idx].dirty = false;
            self.free_frames.push(idx);
        }
        Ok(())
    }

    pub(crate) fn mark_dirty(&mut self, file: FileId, page: PageNum) -> Result<(), PfError> {
        let idx = self.hash.find(file, page).ok_or(PfError::PageNotInBuf)?;
        if self.frames[idx].pin_count == 0 {
            return Err(PfError::PageFree);
        }
        self.frames[idx].dirty = true;
        Ok(())
    }
}
