/**********************************************
  > File Name		: page_management/mod.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

//! The page_management component virtualises fixed-size pages of OS files as
//! pinnable, dirtyable frames in a bounded buffer pool. It has three internal
//! clients: a hash index mapping resident `(file, page)` pairs to frames, a
//! file table tracking per-open-file metadata, and the buffer pool itself,
//! which owns the replacement policy. `page_file` assembles these into the
//! public paged-file API.

pub mod buffer_pool;
pub mod file_table;
pub mod hash_index;
pub mod page_file;

#[cfg(test)]
mod tests;

/// Size in bytes of a page's data area. Fixed for the lifetime of the engine;
/// variable page sizes are a non-goal.
pub const PAGE_SIZE: usize = 4096;

/// Size in bytes of the on-disk file header `{firstfree, numpages}`.
pub const PF_HDR_SIZE: usize = 8;

/// Sentinel `nextfree` values for a file page.
pub const LIST_END: i32 = -1;
pub const USED: i32 = -2;

/// Size of the open-file table, matching the original PF layer's `PF_FTAB_SIZE`.
pub const FTAB_SIZE: usize = 20;

/// Opaque handle to an open file, valid only for the `StorageEngine` that
/// produced it. Analogous to a Unix file descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub(crate) u32);

/// A 0-based index into a file's page array.
pub type PageNum = u32;

/// Replacement policy used to pick a victim frame when the pool is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementPolicy {
    /// Evict the least-recently-unpinned frame.
    Lru,
    /// Evict the most-recently-unpinned frame.
    Mru,
}

impl Default for ReplacementPolicy {
    fn default() -> Self {
        ReplacementPolicy::Lru
    }
}

/// A token naming a page that is currently pinned in the buffer pool. It
/// carries no borrow of the pool itself (the pool is free to be accessed for
/// other pages while this is alive); it must eventually be passed back to
/// `unfix_page` (directly, or through `with_page`/`with_page_mut`) exactly
/// once. Unlike a `Drop`-based guard, a `PinnedPage` that is silently dropped
/// does not auto-unpin — see DESIGN.md for why that tradeoff was made here.
#[derive(Debug)]
#[must_use = "a pinned page must be unfixed exactly once via `unfix_page` or `with_page(_mut)`"]
pub struct PinnedPage {
    pub file: FileId,
    pub page: PageNum,
}

/// Snapshot of the buffer pool's observability counters (spec §6.3 / §10.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferPoolStats {
    pub logical_requests: u64,
    pub logical_hits: u64,
    pub physical_reads: u64,
    pub physical_writes: u64,
    pub page_allocations: u64,
}

impl BufferPoolStats {
    pub fn log(&self) {
        log::info!(
            "buffer pool stats: requests={} hits={} physical_reads={} physical_writes={} allocations={}",
            self.logical_requests,
            self.logical_hits,
            self.physical_reads,
            self.physical_writes,
            self.page_allocations
        );
    }
}
