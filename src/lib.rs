/**********************************************
  > File Name		: lib.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

//! A single-threaded, disk-backed storage engine in three layers:
//!
//! - [`page_management`]: a paged-file buffer manager — fixed-size pages,
//!   a pinnable buffer pool with LRU/MRU replacement, and a file table.
//! - [`record_management`]: variable-length records in slotted pages, built
//!   on `page_management`.
//! - [`indexing`]: a B⁺-tree secondary index over fixed-length attributes,
//!   storing record ids, built on `page_management`.
//!
//! [`engine`] ties these into a single [`engine::StorageEngine`] handle,
//! the crate's intended entry point; the layer modules are public for
//! callers that want to manage paged files or record files directly.

pub mod engine;
pub mod errors;
pub mod indexing;
pub mod page_management;
pub mod record_management;

pub use engine::{EngineConfig, IndexId, StorageEngine, TableHandle};
pub use errors::{AmError, EngineError, PfError, SpError};
