/**********************************************
  > File Name		: engine.rs
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

//! `StorageEngine`: the single entry point an embedding application talks
//! to. It owns no process-wide state of its own beyond a table of open
//! record files and indexes, each of which has its own buffer pool sized
//! and policy-configured per `EngineConfig`. There is no config file or
//! environment variable layer; the engine is constructed in-process by its
//! caller, same as the original `BufferManager::new(pool_size)` style.

use std::collections::HashMap;
use std::path::Path;

use crate::errors::EngineError;
use crate::indexing::tree::MAX_SCANS;
use crate::indexing::{AttrType, IndexHandle};
use crate::page_management::{BufferPoolStats, ReplacementPolicy};
use crate::record_management::{RecId, RecordFile};

/// Buffer pool size, replacement policy, and scan table capacity shared by
/// every table and index this engine opens. Implements `Default` since the
/// engine is an embedded library with no external config source.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub pool_size: usize,
    pub replacement_policy: ReplacementPolicy,
    pub max_scans: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            pool_size: 40,
            replacement_policy: ReplacementPolicy::Lru,
            max_scans: MAX_SCANS,
        }
    }
}

/// Opaque handle to a record file open on this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableHandle(u32);

/// Opaque handle to an index open on this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexId(u32);

pub struct StorageEngine {
    config: EngineConfig,
    tables: HashMap<u32, RecordFile>,
    indexes: HashMap<u32, IndexHandle>,
    next_table: u32,
    next_index: u32,
}

impl StorageEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        if config.max_scans > MAX_SCANS {
            return Err(EngineError::ScanCapacityExceeded(config.max_scans));
        }
        Ok(StorageEngine {
            config,
            tables: HashMap::new(),
            indexes: HashMap::new(),
            next_table: 0,
            next_index: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- record files -------------------------------------------------

    pub fn create_table(&self, path: &Path) -> Result<(), EngineError> {
        RecordFile::create(path).map_err(EngineError::from)
    }

    pub fn destroy_table(&self, path: &Path) -> Result<(), EngineError> {
        RecordFile::destroy(path).map_err(EngineError::from)
    }

    pub fn open_table(&mut self, path: &Path) -> Result<TableHandle, EngineError> {
        let rf = RecordFile::open(path, self.config.pool_size, self.config.replacement_policy)?;
        let id = self.next_table;
        self.next_table += 1;
        self.tables.insert(id, rf);
        log::info!("opened table {} as handle {}", path.display(), id);
        Ok(TableHandle(id))
    }

    pub fn close_table(&mut self, handle: TableHandle) -> Result<(), EngineError> {
        let rf = self.tables.remove(&handle.0).ok_or(EngineError::InvalidHandle)?;
        rf.close().map_err(EngineError::from)
    }

    fn table_mut(&mut self, handle: TableHandle) -> Result<&mut RecordFile, EngineError> {
        self.tables.get_mut(&handle.0).ok_or(EngineError::InvalidHandle)
    }

    pub fn insert_record(&mut self, handle: TableHandle, data: &[u8]) -> Result<RecId, EngineError> {
        Ok(self.table_mut(handle)?.insert_record(data)?)
    }

    pub fn get_record(&mut self, handle: TableHandle, rec: RecId) -> Result<Vec<u8>, EngineError> {
        Ok(self.table_mut(handle)?.get_record(rec)?)
    }

    pub fn delete_record(&mut self, handle: TableHandle, rec: RecId) -> Result<(), EngineError> {
        Ok(self.table_mut(handle)?.delete_record(rec)?)
    }

    pub fn compact_page(&mut self, handle: TableHandle, page: crate::page_management::PageNum) -> Result<(), EngineError> {
        Ok(self.table_mut(handle)?.compact_page(page)?)
    }

    pub fn compute_space_utilization(&mut self, handle: TableHandle) -> Result<f64, EngineError> {
        Ok(self.table_mut(handle)?.compute_space_utilization()?)
    }

    pub fn table_stats(&self, handle: TableHandle) -> Result<BufferPoolStats, EngineError> {
        Ok(self.tables.get(&handle.0).ok_or(EngineError::InvalidHandle)?.stats())
    }

    // ---- indexes --------------------------------------------------------

    pub fn create_index(&self, path: &Path, attr_type: AttrType, attr_length: u16) -> Result<(), EngineError> {
        IndexHandle::create_index(path, attr_type, attr_length).map_err(EngineError::from)
    }

    pub fn destroy_index(&self, path: &Path) -> Result<(), EngineError> {
        IndexHandle::destroy_index(path).map_err(EngineError::from)
    }

    pub fn open_index(&mut self, path: &Path) -> Result<IndexId, EngineError> {
        let idx = IndexHandle::open(path, self.config.pool_size, self.config.replacement_policy)?;
        let id = self.next_index;
        self.next_index += 1;
        self.indexes.insert(id, idx);
        log::info!("opened index {} as id {}", path.display(), id);
        Ok(IndexId(id))
    }

    pub fn close_index(&mut self, id: IndexId) -> Result<(), EngineError> {
        let idx = self.indexes.remove(&id.0).ok_or(EngineError::InvalidHandle)?;
        idx.close().map_err(EngineError::from)
    }

    fn index_mut(&mut self, id: IndexId) -> Result<&mut IndexHandle, EngineError> {
        self.indexes.get_mut(&id.0).ok_or(EngineError::InvalidHandle)
    }

    pub fn insert_entry(&mut self, id: IndexId, value: &[u8], recid: RecId) -> Result<(), EngineError> {
        Ok(self.index_mut(id)?.insert_entry(value, recid)?)
    }

    pub fn delete_entry(&mut self, id: IndexId, value: &[u8], recid: RecId) -> Result<(), EngineError> {
        Ok(self.index_mut(id)?.delete_entry(value, recid)?)
    }

    pub fn open_index_scan(&mut self, id: IndexId, op: i32, value: Option<&[u8]>) -> Result<usize, EngineError> {
        Ok(self.index_mut(id)?.open_index_scan(op, value)?)
    }

    pub fn find_next_entry(&mut self, id: IndexId, desc: usize) -> Result<Option<RecId>, EngineError> {
        Ok(self.index_mut(id)?.find_next_entry(desc)?)
    }

    pub fn close_index_scan(&mut self, id: IndexId, desc: usize) -> Result<(), EngineError> {
        Ok(self.index_mut(id)?.close_index_scan(desc)?)
    }

    pub fn index_stats(&self, id: IndexId) -> Result<BufferPoolStats, EngineError> {
        Ok(self.indexes.get(&id.0).ok_or(EngineError::InvalidHandle)?.stats())
    }

    /// Emits every open table's and index's buffer pool counters as a
    /// structured log record (spec's `log_stats()`).
    pub fn log_stats(&self) {
        for (id, rf) in &self.tables {
            log::info!("table {}: {:?}", id, rf.stats());
        }
        for (id, idx) in &self.indexes {
            log::info!("index {}: {:?}", id, idx.stats());
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn table_lifecycle_through_the_engine() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::remove_file(tmp.path()).unwrap();
        let mut engine = StorageEngine::new(EngineConfig::default()).unwrap();

        engine.create_table(tmp.path()).unwrap();
        let handle = engine.open_table(tmp.path()).unwrap();
        let rec = engine.insert_record(handle, b"hello").unwrap();
        assert_eq!(engine.get_record(handle, rec).unwrap(), b"hello");
        engine.close_table(handle).unwrap();
        assert!(engine.get_record(handle, rec).is_err());

        std::fs::remove_file(tmp.path()).ok();
    }

    #[test]
    fn index_lifecycle_through_the_engine() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::remove_file(tmp.path()).unwrap();
        let mut engine = StorageEngine::new(EngineConfig::default()).unwrap();

        engine.create_index(tmp.path(), AttrType::Int, 4).unwrap();
        let id = engine.open_index(tmp.path()).unwrap();
        engine.insert_entry(id, &1i32.to_le_bytes(), RecId::new(1, 0)).unwrap();

        let desc = engine.open_index_scan(id, 0, None).unwrap();
        assert!(engine.find_next_entry(id, desc).unwrap().is_some());
        assert!(engine.find_next_entry(id, desc).unwrap().is_none());
        engine.close_index_scan(id, desc).unwrap();
        engine.close_index(id).unwrap();

        std::fs::remove_file(tmp.path()).ok();
    }

    #[test]
    fn oversized_scan_capacity_is_rejected_up_front() {
        let config = EngineConfig {
            max_scans: MAX_SCANS + 1,
            ..EngineConfig::default()
        };
        assert!(StorageEngine::new(config).is_err());
    }
}
