/**********************************************
  > File Name		: page_management/page_file.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

//! Public paged-file API: assembles [`super::buffer_pool::BufferPool`] and
//! [`super::file_table::FileTable`] into create/open/close/alloc/dispose/get
//! operations over fixed-size pages, mirroring the original PF layer's
//! `PF_*` function set.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::errors::PfError;

use super::buffer_pool::BufferPool;
use super::file_table::{FileHeader, FileTable};
use super::{BufferPoolStats, FileId, PageNum, PinnedPage, ReplacementPolicy, LIST_END, PAGE_SIZE, PF_HDR_SIZE, USED};

/// On-disk size of one page record: a 4-byte `nextfree` field followed by the
/// page's data area.
const PAGE_REC_SIZE: u64 = 4 + PAGE_SIZE as u64;

pub struct PagedFile {
    table: FileTable,
    pool: BufferPool,
}

impl PagedFile {
    pub fn new(pool_size: usize, policy: ReplacementPolicy) -> Self {
        PagedFile {
            table: FileTable::new(),
            pool: BufferPool::new(pool_size, policy),
        }
    }

    pub fn stats(&self) -> BufferPoolStats {
        self.pool.stats()
    }

    pub fn create_file(&mut self, path: &Path) -> Result<(), PfError> {
        log::info!("creating paged file {}", path.display());
        self.table.create(path)
    }

    pub fn destroy_file(path: &Path) -> Result<(), PfError> {
        log::info!("destroying paged file {}", path.display());
        FileTable::destroy(path)
    }

    pub fn open_file(&mut self, path: &Path) -> Result<FileId, PfError> {
        let id = self.table.open(path)?;
        log::info!("opened paged file {} as {:?}", path.display(), id);
        Ok(id)
    }

    pub fn close_file(&mut self, id: FileId) -> Result<(), PfError> {
        let table = &mut self.table;
        self.pool.release_file(id, |f, p, nextfree, data| {
            Self::write_page_raw(&mut table.get_mut(f)?.handle, p, nextfree, data)
        })?;
        self.table.close(id)
    }

    fn page_offset(page: PageNum) -> u64 {
        PF_HDR_SIZE as u64 + page as u64 * PAGE_REC_SIZE
    }

    fn read_page_raw(handle: &mut std::fs::File, page: PageNum) -> Result<(i32, Box<[u8; PAGE_SIZE]>), PfError> {
        use byteorder::{LittleEndian, ReadBytesExt};
        handle.seek(SeekFrom::Start(Self::page_offset(page)))?;
        let nextfree = handle.read_i32::<LittleEndian>().map_err(|_| PfError::IncompleteRead)?;
        let mut data = Box::new([0u8; PAGE_SIZE]);
        handle.read_exact(data.as_mut()).map_err(|_| PfError::IncompleteRead)?;
        Ok((nextfree, data))
    }

    fn write_page_raw(handle: &mut std::fs::File, page: PageNum, nextfree: i32, data: &[u8; PAGE_SIZE]) -> Result<(), PfError> {
        use byteorder::{LittleEndian, WriteBytesExt};
        handle.seek(SeekFrom::Start(Self::page_offset(page)))?;
        handle.write_i32::<LittleEndian>(nextfree).map_err(|_| PfError::IncompleteWrite)?;
        handle.write_all(data).map_err(|_| PfError::IncompleteWrite)?;
        Ok(())
    }

    /// Allocate a new page, reusing a freed page if the file's free list is
    /// non-empty, otherwise extending the file. The returned page's content
    /// is all zero bytes.
    pub fn alloc_page(&mut self, id: FileId) -> Result<PinnedPage, PfError> {
        let header = self.table.get(id)?.header;

        if header.firstfree == LIST_END {
            let page = header.numpages as PageNum;
            let table = &mut self.table;
            let frame = self.pool.alloc(id, page, USED, |f, p, nf, d| {
                Self::write_page_raw(&mut table.get_mut(f)?.handle, p, nf, d)
            })?;
            self.table.set_header(
                id,
                FileHeader {
                    firstfree: LIST_END,
                    numpages: header.numpages + 1,
                },
            )?;
            log::debug!("allocated new page {} in {:?} (frame {})", page, id, frame);
            return Ok(PinnedPage { file: id, page });
        }

        let page = header.firstfree as PageNum;
        let next_in_list = {
            let table = &mut self.table;
            let pool = &mut self.pool;
            // Always through `get`, never `find` + manual pin: `get` unlinks
            // the frame from the replacement list on a hit, which a bare pin
            // count bump would skip, leaving an unpinned-looking frame
            // reachable from `evict_one` while it is actually in use.
            let frame_idx = pool.get(
                id,
                page,
                |f, p| Self::read_page_raw(&mut table.get_mut(f)?.handle, p),
                |f, p, nf, d| Self::write_page_raw(&mut table.get_mut(f)?.handle, p, nf, d),
            )?;
            let next_in_list = pool.frames[frame_idx].nextfree;
            for b in pool.frames[frame_idx].data.iter_mut() {
                *b = 0;
            }
            pool.frames[frame_idx].nextfree = USED;
            pool.frames[frame_idx].dirty = true;
            pool.record_allocation();
            next_in_list
        };

        self.table.set_header(
            id,
            FileHeader {
                firstfree: next_in_list,
                numpages: header.numpages,
            },
        )?;
        log::debug!("reused free page {} in {:?}", page, id);
        Ok(PinnedPage { file: id, page })
    }

    /// Return a page to the file's free list. The page must not be pinned
    /// more than once (the caller's own pin is released as part of this
    /// call).
    pub fn dispose_page(&mut self, id: FileId, page: PageNum) -> Result<(), PfError> {
        let header = self.table.get(id)?.header;
        let table = &mut self.table;
        let pool = &mut self.pool;
        let frame_idx = match pool.find(id, page) {
            Some(idx) => idx,
            None => pool.get(
                id,
                page,
                |f, p| Self::read_page_raw(&mut table.get_mut(f)?.handle, p),
                |f, p, nf, d| Self::write_page_raw(&mut table.get_mut(f)?.handle, p, nf, d),
            )?,
        };
        if pool.frames[frame_idx].pin_count > 1 {
            return Err(PfError::PageFixed);
        }
        pool.frames[frame_idx].nextfree = header.firstfree;
        pool.frames[frame_idx].dirty = true;
        if pool.frames[frame_idx].pin_count == 1 {
            pool.unfix(id, page, true)?;
        }
        self.table.set_header(
            id,
            FileHeader {
                firstfree: page as i32,
                numpages: header.numpages,
            },
        )
    }

    pub fn get_this_page(&mut self, id: FileId, page: PageNum) -> Result<PinnedPage, PfError> {
        let header = self.table.get(id)?.header;
        if page >= header.numpages {
            return Err(PfError::InvalidPage);
        }
        let table = &mut self.table;
        self.pool.get(
            id,
            page,
            |f, p| Self::read_page_raw(&mut table.get_mut(f)?.handle, p),
            |f, p, nf, d| Self::write_page_raw(&mut table.get_mut(f)?.handle, p, nf, d),
        )?;
        Ok(PinnedPage { file: id, page })
    }

    fn is_used(&mut self, id: FileId, page: PageNum) -> Result<bool, PfError> {
        let table = &mut self.table;
        let pool = &mut self.pool;
        let frame_idx = match pool.find(id, page) {
            Some(idx) => idx,
            None => pool.get(
                id,
                page,
                |f, p| Self::read_page_raw(&mut table.get_mut(f)?.handle, p),
                |f, p, nf, d| Self::write_page_raw(&mut table.get_mut(f)?.handle, p, nf, d),
            )?,
        };
        let used = pool.frames[frame_idx].nextfree == USED;
        pool.unfix(id, page, false)?;
        Ok(used)
    }

    pub fn get_first_page(&mut self, id: FileId) -> Result<Option<PinnedPage>, PfError> {
        let numpages = self.table.get(id)?.header.numpages;
        for page in 0..numpages {
            if self.is_used(id, page)? {
                return self.get_this_page(id, page).map(Some);
            }
        }
        Ok(None)
    }

    pub fn get_next_page(&mut self, id: FileId, current: PageNum) -> Result<Option<PinnedPage>, PfError> {
        let numpages = self.table.get(id)?.header.numpages;
        for page in (current + 1)..numpages {
            if self.is_used(id, page)? {
                return self.get_this_page(id, page).map(Some);
            }
        }
        Ok(None)
    }

    pub fn unfix_page(&mut self, pin: PinnedPage, dirty: bool) -> Result<(), PfError> {
        self.pool.unfix(pin.file, pin.page, dirty)
    }

    pub fn mark_dirty(&mut self, file: FileId, page: PageNum) -> Result<(), PfError> {
        self.pool.mark_dirty(file, page)
    }

    pub fn page_data(&self, file: FileId, page: PageNum) -> Result<&[u8; PAGE_SIZE], PfError> {
        let idx = self.pool.find(file, page).ok_or(PfError::PageNotInBuf)?;
        Ok(&self.pool.frames[idx].data)
    }

    pub fn page_data_mut(&mut self, file: FileId, page: PageNum) -> Result<&mut [u8; PAGE_SIZE], PfError> {
        let idx = self.pool.find(file, page).ok_or(PfError::PageNotInBuf)?;
        Ok(&mut self.pool.frames[idx].data)
    }

    /// Run `f` with read-only access to a page's data, unfixing it
    /// afterwards regardless of whether `f` returns an error.
    pub fn with_page<T>(
        &mut self,
        id: FileId,
        page: PageNum,
        f: impl FnOnce(&[u8; PAGE_SIZE]) -> T,
    ) -> Result<T, PfError> {
        let pin = self.get_this_page(id, page)?;
        let result = f(self.page_data(pin.file, pin.page)?);
        self.unfix_page(pin, false)?;
        Ok(result)
    }

    /// Run `f` with mutable access to a page's data, unfixing it (and marking
    /// it dirty) afterwards regardless of whether `f` returns an error.
    pub fn with_page_mut<T>(
        &mut self,
        id: FileId,
        page: PageNum,
        f: impl FnOnce(&mut [u8; PAGE_SIZE]) -> T,
    ) -> Result<T, PfError> {
        let pin = self.get_this_page(id, page)?;
        let result = f(self.page_data_mut(pin.file, pin.page)?);
        self.unfix_page(pin, true)?;
        Ok(result)
    }
}
