/**********************************************
  > File Name		: errors.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

//! Layered error space: one enum per subsystem (PF / SP / AM), mirroring the
//! sentinel-coded errors of the original paged-file / slotted-page / B+-tree
//! layers. Lower layers compose into higher ones through `#[from]` so a
//! buffer-pool failure propagates through `?` without manual wrapping.

use thiserror::Error;

/// Errors raised by the paged-file buffer manager (hash index, buffer pool,
/// file table, page I/O).
#[derive(Error, Debug)]
pub enum PfError {
    #[error("no memory available")]
    NoMemory,
    #[error("no unpinned buffer frame available for replacement")]
    NoBuf,
    #[error("file table is full")]
    FtabFull,
    #[error("file still has pinned pages")]
    PageFixed,
    #[error("page is not resident in the buffer pool")]
    PageNotInBuf,
    #[error("page is already unfixed")]
    PageUnfixed,
    #[error("invalid page number")]
    InvalidPage,
    #[error("invalid file descriptor")]
    Fd,
    #[error("end of file")]
    Eof,
    #[error("page is already free")]
    PageFree,
    #[error("page to be allocated is already resident in the buffer pool")]
    PageInBuf,
    #[error("hash table entry not found")]
    HashNotFound,
    #[error("page already present in hash table")]
    HashPageExist,
    #[error("incomplete read of page from file")]
    IncompleteRead,
    #[error("incomplete write of page to file")]
    IncompleteWrite,
    #[error("incomplete read of file header")]
    HdrRead,
    #[error("incomplete write of file header")]
    HdrWrite,
    #[error("file is already open")]
    FileOpen,
    #[error("internal consistency error: {0}")]
    IntError(&'static str),
    #[error("I/O error: {0}")]
    Unix(#[from] std::io::Error),
}

/// Errors raised by the slotted-page record layer, built directly on [`PfError`].
#[derive(Error, Debug)]
pub enum SpError {
    #[error("record length {0} is out of range for a slotted page")]
    InvalidRecordLength(usize),
    #[error("record id does not name a live record")]
    NotFound,
    #[error("record id encodes a slot beyond the page's slot directory")]
    InvalidRecId,
    #[error("internal consistency error: {0}")]
    IntError(&'static str),
    #[error(transparent)]
    Pf(#[from] PfError),
}

/// Errors raised by the B+-tree access method, built on [`PfError`] and [`SpError`].
#[derive(Error, Debug)]
pub enum AmError {
    #[error("attribute length {0} is invalid for the given attribute type")]
    InvalidAttrLength(usize),
    #[error("attribute type is invalid")]
    InvalidAttrType,
    #[error("key not found in index")]
    NotFound,
    #[error("scan descriptor table is full")]
    ScanTabFull,
    #[error("invalid scan descriptor")]
    InvalidScanDesc,
    #[error("comparison operator is not valid for this scan")]
    InvalidOpToScan,
    #[error("comparison value has the wrong length for this index")]
    InvalidValue,
    #[error("internal consistency error: {0}")]
    IntError(&'static str),
    #[error(transparent)]
    Pf(#[from] PfError),
    #[error(transparent)]
    Sp(#[from] SpError),
}

/// Errors raised by the `StorageEngine` facade: handle-table misuse on top of
/// whatever the SP/AM layer underneath reports.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("configured max_scans {0} exceeds the engine's compiled-in scan table bound")]
    ScanCapacityExceeded(usize),
    #[error("handle does not name a table or index open on this engine")]
    InvalidHandle,
    #[error(transparent)]
    Sp(#[from] SpError),
    #[error(transparent)]
    Am(#[from] AmError),
}
