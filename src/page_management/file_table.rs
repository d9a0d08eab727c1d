/**********************************************
  > File Name		: page_management/file_table.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

//! Tracks open files, mirroring the original PF layer's `PFftab_ele` array
//! (`PF_FTAB_SIZE` entries). Each entry owns the OS file handle and a cached
//! copy of the on-disk header `{firstfree, numpages}`.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::errors::PfError;

use super::{FileId, PF_HDR_SIZE, FTAB_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FileHeader {
    pub firstfree: i32,
    pub numpages: u32,
}

impl FileHeader {
    fn encode(&self) -> [u8; PF_HDR_SIZE] {
        let mut buf = [0u8; PF_HDR_SIZE];
        {
            let mut w = &mut buf[..];
            w.write_i32::<LittleEndian>(self.firstfree).unwrap();
            w.write_u32::<LittleEndian>(self.numpages).unwrap();
        }
        buf
    }

    fn decode(buf: &[u8; PF_HDR_SIZE]) -> Result<Self, PfError> {
        let mut r = &buf[..];
        let firstfree = r.read_i32::<LittleEndian>().map_err(|_| PfError::HdrRead)?;
        let numpages = r.read_u32::<LittleEndian>().map_err(|_| PfError::HdrRead)?;
        Ok(FileHeader { firstfree, numpages })
    }
}

pub(crate) struct FileEntry {
    pub path: PathBuf,
    pub handle: File,
    pub header: FileHeader,
    pub header_dirty: bool,
}

#[derive(Default)]
pub(crate) struct FileTable {
    entries: HashMap<FileId, FileEntry>,
    next_id: u32,
}

impl FileTable {
    pub fn new() -> Self {
        FileTable {
            entries: HashMap::new(),
            next_id: 1,
        }
    }

    fn alloc_id(&mut self) -> Result<FileId, PfError> {
        if self.entries.len() >= FTAB_SIZE {
            return Err(PfError::FtabFull);
        }
        let id = FileId(self.next_id);
        self.next_id += 1;
        Ok(id)
    }

    /// Create an empty file on disk with a fresh header, and register it.
    pub fn create(&mut self, path: &Path) -> Result<(), PfError> {
        if path.exists() {
            return Err(PfError::FileOpen);
        }
        let mut f = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        let hdr = FileHeader {
            firstfree: super::LIST_END,
            numpages: 0,
        };
        f.write_all(&hdr.encode())?;
        f.flush()?;
        Ok(())
    }

    pub fn destroy(path: &Path) -> Result<(), PfError> {
        std::fs::remove_file(path)?;
        Ok(())
    }

    pub fn open(&mut self, path: &Path) -> Result<FileId, PfError> {
        for entry in self.entries.values() {
            if entry.path == path {
                return Err(PfError::FileOpen);
            }
        }
        let mut f = OpenOptions::new().read(true).write(true).open(path)?;
        f.seek(SeekFrom::Start(0))?;
        let mut raw = [0u8; PF_HDR_SIZE];
        f.read_exact(&mut raw).map_err(|_| PfError::HdrRead)?;
        let header = FileHeader::decode(&raw)?;

        let id = self.alloc_id()?;
        self.entries.insert(
            id,
            FileEntry {
                path: path.to_path_buf(),
                handle: f,
                header,
                header_dirty: false,
            },
        );
        Ok(id)
    }

    pub fn close(&mut self, id: FileId) -> Result<(), PfError> {
        let mut entry = self.entries.remove(&id).ok_or(PfError::Fd)?;
        if entry.header_dirty {
            entry.handle.seek(SeekFrom::Start(0))?;
            entry.handle.write_all(&entry.header.encode())?;
            entry.handle.flush()?;
        }
        Ok(())
    }

    pub fn get(&self, id: FileId) -> Result<&FileEntry, PfError> {
        self.entries.get(&id).ok_or(PfError::Fd)
    }

    pub fn get_mut(&mut self, id: FileId) -> Result<&mut FileEntry, PfError> {
        self.entries.get_mut(&id).ok_or(PfError::Fd)
    }

    pub fn set_header(&mut self, id: FileId, header: FileHeader) -> Result<(), PfError> {
        let entry = self.get_mut(id)?;
        entry.header = header;
        entry.header_dirty = true;
        Ok(())
    }
}
